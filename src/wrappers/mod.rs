//! Seal wrapper implementations
//!
//! One module per seal type:
//!
//! - `aead`: local AES-256-GCM key
//! - `alicloudkms`, `awskms`, `azurekeyvault`, `gcpckms`, `ocikms`: envelope
//!   encryption with the root key held by a cloud KMS
//! - `transit`: data encrypted directly by a Vault transit key
//!
//! Every wrapper is built from [`WrapperOptions`] and configured with
//! [`Wrapper::set_config`](crate::Wrapper::set_config). Settings missing from
//! the config map fall back to the provider's usual environment variables.

pub mod aead;
pub mod alicloudkms;
pub mod awskms;
pub mod azurekeyvault;
pub mod gcpckms;
pub mod ocikms;
pub mod transit;

#[cfg(feature = "aws-kms")]
pub mod aws_sdk;

pub use aead::AeadWrapper;
pub use alicloudkms::AliCloudKmsWrapper;
pub use awskms::AwsKmsWrapper;
pub use azurekeyvault::AzureKeyVaultWrapper;
pub use gcpckms::GcpCkmsWrapper;
pub use ocikms::OciKmsWrapper;
pub use transit::TransitWrapper;

use crate::crypto::{generate_key, Aes256GcmAead};
use crate::error::{Error, Result};
use crate::log::{Logger, NoopLogger};
use crate::KeyClient;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use zeroize::Zeroizing;

/// Free-form metadata reported by a wrapper after configuration
pub type WrapperInfo = HashMap<String, String>;

/// Options shared by every wrapper constructor
#[derive(Debug, Clone)]
pub struct WrapperOptions {
    /// Logger handed to the wrapper
    pub logger: Arc<dyn Logger>,

    /// Remote key service used by cloud wrappers
    pub key_client: Option<Arc<dyn KeyClient>>,
}

impl Default for WrapperOptions {
    fn default() -> Self {
        Self::new(NoopLogger::shared())
    }
}

impl WrapperOptions {
    /// Creates options carrying the given logger and no key client
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self {
            logger,
            key_client: None,
        }
    }

    /// Attaches a remote key client
    pub fn with_key_client(mut self, client: Arc<dyn KeyClient>) -> Self {
        self.key_client = Some(client);
        self
    }
}

/// Identifies the key material needed to decrypt an [`EncryptedBlob`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInfo {
    /// Seal type tag of the wrapper that produced the blob
    pub mechanism: String,

    /// Key identifier at encryption time
    pub key_id: String,

    /// Data key encrypted by the remote key, for envelope-encrypted blobs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrapped_key: Option<Vec<u8>>,
}

/// Output of [`Wrapper::encrypt`](crate::Wrapper::encrypt)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedBlob {
    /// Sealed payload
    pub ciphertext: Vec<u8>,

    /// Key details needed for decryption
    pub key_info: KeyInfo,
}

/// Adds `raw_key` to `info` when present
pub(crate) fn insert_if_set(info: &mut WrapperInfo, raw_key: &str, value: Option<&str>) {
    if let Some(value) = value {
        info.insert(raw_key.to_string(), value.to_string());
    }
}

/// Remote key access shared by the cloud wrappers
#[derive(Debug, Clone)]
pub(crate) struct RemoteKey {
    mechanism: &'static str,
    client: Option<Arc<dyn KeyClient>>,
}

impl RemoteKey {
    pub(crate) fn new(mechanism: &'static str, opts: &WrapperOptions) -> Self {
        Self {
            mechanism,
            client: opts.key_client.clone(),
        }
    }

    fn client(&self) -> Result<&Arc<dyn KeyClient>> {
        self.client.as_ref().ok_or_else(|| {
            Error::Kms(format!(
                "no key client attached to {} wrapper",
                self.mechanism
            ))
        })
    }

    fn check_mechanism(&self, blob: &EncryptedBlob) -> Result<()> {
        if blob.key_info.mechanism != self.mechanism {
            return Err(Error::Crypto(format!(
                "blob was sealed by {}, not {}",
                blob.key_info.mechanism, self.mechanism
            )));
        }
        Ok(())
    }

    /// Seals `plaintext` under a fresh data key and wraps the data key remotely
    pub(crate) async fn envelope_encrypt(
        &self,
        key_id: &str,
        plaintext: &[u8],
        aad: Option<&[u8]>,
    ) -> Result<EncryptedBlob> {
        let client = self.client()?;
        counter!("sealwrap.wrapper.encrypt", 1, "type" => self.mechanism);
        let start = Instant::now();

        let data_key = generate_key();
        let ciphertext = Aes256GcmAead::new().encrypt(plaintext, &data_key, aad.unwrap_or_default())?;
        let wrapped_key = client.encrypt(key_id, &data_key).await?;

        histogram!("sealwrap.wrapper.encrypt.time", start.elapsed(), "type" => self.mechanism);

        Ok(EncryptedBlob {
            ciphertext,
            key_info: KeyInfo {
                mechanism: self.mechanism.to_string(),
                key_id: key_id.to_string(),
                wrapped_key: Some(wrapped_key),
            },
        })
    }

    /// Unwraps the data key remotely and opens the payload
    pub(crate) async fn envelope_decrypt(
        &self,
        blob: &EncryptedBlob,
        aad: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        self.check_mechanism(blob)?;
        let client = self.client()?;
        let wrapped_key = blob
            .key_info
            .wrapped_key
            .as_deref()
            .ok_or_else(|| Error::Crypto("blob is missing its wrapped data key".into()))?;

        counter!("sealwrap.wrapper.decrypt", 1, "type" => self.mechanism);
        let start = Instant::now();

        let data_key = Zeroizing::new(client.decrypt(&blob.key_info.key_id, wrapped_key).await?);
        let plaintext = Aes256GcmAead::new().decrypt(&blob.ciphertext, &data_key, aad.unwrap_or_default())?;

        histogram!("sealwrap.wrapper.decrypt.time", start.elapsed(), "type" => self.mechanism);
        Ok(plaintext)
    }

    /// Sends `plaintext` straight to the remote key
    pub(crate) async fn direct_encrypt(&self, key_id: &str, plaintext: &[u8]) -> Result<EncryptedBlob> {
        let client = self.client()?;
        counter!("sealwrap.wrapper.encrypt", 1, "type" => self.mechanism);
        let start = Instant::now();

        let ciphertext = client.encrypt(key_id, plaintext).await?;

        histogram!("sealwrap.wrapper.encrypt.time", start.elapsed(), "type" => self.mechanism);
        Ok(EncryptedBlob {
            ciphertext,
            key_info: KeyInfo {
                mechanism: self.mechanism.to_string(),
                key_id: key_id.to_string(),
                wrapped_key: None,
            },
        })
    }

    /// Asks the remote key to decrypt the blob's ciphertext
    pub(crate) async fn direct_decrypt(&self, blob: &EncryptedBlob) -> Result<Vec<u8>> {
        self.check_mechanism(blob)?;
        let client = self.client()?;
        counter!("sealwrap.wrapper.decrypt", 1, "type" => self.mechanism);
        let start = Instant::now();

        let plaintext = client.decrypt(&blob.key_info.key_id, &blob.ciphertext).await?;

        histogram!("sealwrap.wrapper.decrypt.time", start.elapsed(), "type" => self.mechanism);
        Ok(plaintext)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Remote key stand-in: XORs with a fixed pad and records every key id it sees
    #[derive(Debug, Default)]
    pub(crate) struct XorKeyClient {
        pub(crate) calls: Mutex<Vec<String>>,
        pub(crate) missing_key: Option<String>,
    }

    impl XorKeyClient {
        fn apply(&self, key_id: &str, data: &[u8]) -> Result<Vec<u8>> {
            self.calls.lock().unwrap().push(key_id.to_string());
            if self.missing_key.as_deref() == Some(key_id) {
                return Err(Error::KeyNotFound(key_id.to_string()));
            }
            Ok(data.iter().map(|b| b ^ 0x5a).collect())
        }
    }

    #[async_trait]
    impl KeyClient for XorKeyClient {
        async fn encrypt(&self, key_id: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
            self.apply(key_id, plaintext)
        }

        async fn decrypt(&self, key_id: &str, ciphertext: &[u8]) -> Result<Vec<u8>> {
            self.apply(key_id, ciphertext)
        }
    }

    pub(crate) fn options_with_client(client: Arc<XorKeyClient>) -> WrapperOptions {
        WrapperOptions::default().with_key_client(client)
    }
}
