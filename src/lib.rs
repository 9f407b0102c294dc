//! # Seal wrapper selection
//!
//! `sealwrap` turns a seal stanza from a server configuration into a ready-to-use
//! key-wrapping backend. A [`Kms`] names the seal type (`aead`, `awskms`,
//! `transit`, ...) and carries the provider settings; the [`WrapperConfigurator`]
//! picks the matching wrapper, pushes the settings into it and reports the
//! non-secret details (region, key id, endpoint) an operator wants to see at
//! startup.
//!
//! The `shamir` type yields no wrapper at all, `pkcs11` is rejected because it
//! needs the enterprise HSM build, and unknown types fail with
//! [`Error::UnsupportedType`].
//!
//! ## Basic Usage
//!
//! ```rust
//! use sealwrap::{configure_wrapper, Kms, KmsType, NoopLogger};
//! use std::collections::HashMap;
//!
//! # fn example() -> sealwrap::Result<()> {
//! let kms = Kms::new(KmsType::AwsKms)
//!     .with_config("region", "us-west-2")
//!     .with_config("kms_key_id", "alias/vault-seal");
//!
//! let mut info_keys = Vec::new();
//! let mut info = HashMap::new();
//! let wrapper = configure_wrapper(&kms, &mut info_keys, &mut info, NoopLogger::shared())?;
//!
//! assert!(wrapper.is_some());
//! assert_eq!(info["AWS KMS Region"], "us-west-2");
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! ## Remote keys
//!
//! Cloud wrappers do not talk to their provider directly. Encryption and
//! decryption go through a [`KeyClient`] registered with
//! [`WrapperConfigurator::with_key_client`]; with the `aws-kms` feature an AWS
//! SDK-backed client is available as `wrappers::aws_sdk::AwsSdkKeyClient`.
//! When a client is registered, configuration checks the seal's key through
//! [`KeyClient::verify_key`]; a missing key is tolerated for the cloud and
//! transit seals, while any other failure aborts configuration.

pub mod config;
pub mod configure;
pub mod crypto;
pub mod error;
pub mod log;
pub mod random;
pub mod wrappers;

// Re-export key types
pub use crate::config::{ConfigMap, Kms, KmsType, SharedConfig};
pub use crate::configure::{
    configure_wrapper, Configurator, ConfiguredWrapper, KmsInfo, WrapperConfigurator,
};
pub use crate::error::{Error, Result};
pub use crate::log::{LogFacade, Logger, NoopLogger};
pub use crate::random::{create_secure_random_reader, SecureRandomReader};
pub use crate::wrappers::{EncryptedBlob, KeyInfo, WrapperInfo, WrapperOptions};

use async_trait::async_trait;
use std::any::Any;
use std::fmt;

/// A configured seal backend that can wrap and unwrap data
#[async_trait]
pub trait Wrapper: Send + Sync + fmt::Debug {
    /// The seal type this wrapper implements
    fn wrapper_type(&self) -> KmsType;

    /// Identifier of the key currently used for encryption
    fn key_id(&self) -> &str;

    /// Applies provider settings and returns the raw metadata the provider reports.
    ///
    /// Metadata keys are provider-specific (e.g. `region`, `kms_key_id`).
    fn set_config(&mut self, config: &ConfigMap) -> Result<Option<WrapperInfo>>;

    /// Encrypts `plaintext`, binding the optional associated data to the result
    async fn encrypt(&self, plaintext: &[u8], aad: Option<&[u8]>) -> Result<EncryptedBlob>;

    /// Decrypts a blob produced by [`encrypt`](Wrapper::encrypt)
    async fn decrypt(&self, blob: &EncryptedBlob, aad: Option<&[u8]>) -> Result<Vec<u8>>;

    /// Convert to Any for downcasting
    fn as_any(&self) -> &(dyn Any + Send + Sync);
}

/// Client for a remote key service that holds the root key of a cloud seal
#[async_trait]
pub trait KeyClient: Send + Sync + fmt::Debug {
    /// Encrypts `plaintext` with the named remote key
    async fn encrypt(&self, key_id: &str, plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Decrypts `ciphertext` that was encrypted with the named remote key
    async fn decrypt(&self, key_id: &str, ciphertext: &[u8]) -> Result<Vec<u8>>;

    /// Checks that the named key exists and can be used.
    ///
    /// Called while a seal is being configured. The default drives an
    /// encrypt/decrypt round trip to completion on the calling thread, which
    /// suits clients whose futures do not need an I/O reactor. Clients that do
    /// network I/O should override it.
    fn verify_key(&self, key_id: &str) -> Result<()> {
        futures::executor::block_on(async {
            let ciphertext = self.encrypt(key_id, KEY_CHECK_PLAINTEXT).await?;
            let plaintext = self.decrypt(key_id, &ciphertext).await?;
            if plaintext != KEY_CHECK_PLAINTEXT {
                return Err(Error::Kms(format!(
                    "key {} did not round-trip the check value",
                    key_id
                )));
            }
            Ok(())
        })
    }
}

const KEY_CHECK_PLAINTEXT: &[u8] = b"sealwrap key check";
