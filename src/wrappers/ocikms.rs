//! Oracle Cloud Infrastructure KMS seal

use super::{RemoteKey, WrapperInfo, WrapperOptions};
use crate::config::{lookup, parse_bool, require, ConfigMap, KmsType};
use crate::error::Result;
use crate::log::Logger;
use crate::{EncryptedBlob, Wrapper};
use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;

/// Config key naming the master encryption key OCID
pub const KMS_CONFIG_KEY_ID: &str = "key_id";
/// Config key for the vault's crypto endpoint
pub const KMS_CONFIG_CRYPTO_ENDPOINT: &str = "crypto_endpoint";
/// Config key for the vault's management endpoint
pub const KMS_CONFIG_MANAGEMENT_ENDPOINT: &str = "management_endpoint";
/// Config key selecting API-key (user principal) authentication
pub const KMS_CONFIG_AUTH_TYPE_API_KEY: &str = "auth_type_api_key";

const WRAPPER_NAME: &str = "OCI KMS";

/// Seal whose root key lives in an OCI vault
#[derive(Debug)]
pub struct OciKmsWrapper {
    logger: Arc<dyn Logger>,
    remote: RemoteKey,
    key_id: String,
    crypto_endpoint: String,
    management_endpoint: Option<String>,
    auth_type_api_key: bool,
}

impl OciKmsWrapper {
    /// Creates an unconfigured wrapper
    pub fn new(opts: &WrapperOptions) -> Self {
        Self {
            logger: opts.logger.clone(),
            remote: RemoteKey::new("ocikms", opts),
            key_id: String::new(),
            crypto_endpoint: String::new(),
            management_endpoint: None,
            auth_type_api_key: false,
        }
    }

    /// "user" for API-key auth, "instance" for instance principals
    pub fn principal_type(&self) -> &'static str {
        if self.auth_type_api_key {
            "user"
        } else {
            "instance"
        }
    }
}

#[async_trait]
impl Wrapper for OciKmsWrapper {
    fn wrapper_type(&self) -> KmsType {
        KmsType::OciKms
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }

    fn set_config(&mut self, config: &ConfigMap) -> Result<Option<WrapperInfo>> {
        let key_id = require(
            config,
            WRAPPER_NAME,
            KMS_CONFIG_KEY_ID,
            &["VAULT_OCIKMS_SEAL_KEY_ID"],
        )?;
        let crypto_endpoint = require(
            config,
            WRAPPER_NAME,
            KMS_CONFIG_CRYPTO_ENDPOINT,
            &["VAULT_OCIKMS_CRYPTO_ENDPOINT"],
        )?;
        let management_endpoint = lookup(
            config,
            KMS_CONFIG_MANAGEMENT_ENDPOINT,
            &["VAULT_OCIKMS_MANAGEMENT_ENDPOINT"],
        );
        let auth_type_api_key = lookup(config, KMS_CONFIG_AUTH_TYPE_API_KEY, &[])
            .map(|raw| parse_bool(KMS_CONFIG_AUTH_TYPE_API_KEY, &raw))
            .transpose()?
            .unwrap_or(false);

        self.key_id = key_id;
        self.crypto_endpoint = crypto_endpoint;
        self.management_endpoint = management_endpoint;
        self.auth_type_api_key = auth_type_api_key;

        self.logger.debugf(format_args!(
            "configured OCI KMS seal: key_id={} crypto_endpoint={} principal={}",
            self.key_id,
            self.crypto_endpoint,
            self.principal_type()
        ));

        let mut info = WrapperInfo::new();
        info.insert(KMS_CONFIG_KEY_ID.to_string(), self.key_id.clone());
        info.insert(
            KMS_CONFIG_CRYPTO_ENDPOINT.to_string(),
            self.crypto_endpoint.clone(),
        );
        if let Some(endpoint) = &self.management_endpoint {
            info.insert(KMS_CONFIG_MANAGEMENT_ENDPOINT.to_string(), endpoint.clone());
        }
        info.insert(
            "principal_type".to_string(),
            self.principal_type().to_string(),
        );
        Ok(Some(info))
    }

    async fn encrypt(&self, plaintext: &[u8], aad: Option<&[u8]>) -> Result<EncryptedBlob> {
        self.remote.envelope_encrypt(&self.key_id, plaintext, aad).await
    }

    async fn decrypt(&self, blob: &EncryptedBlob, aad: Option<&[u8]>) -> Result<Vec<u8>> {
        self.remote.envelope_decrypt(blob, aad).await
    }

    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }
}
