//! Google Cloud KMS seal

use super::{RemoteKey, WrapperInfo, WrapperOptions};
use crate::config::{lookup, require, ConfigMap, KmsType};
use crate::error::Result;
use crate::log::Logger;
use crate::{EncryptedBlob, Wrapper};
use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;

/// Location used when neither the config nor the environment names one
pub const DEFAULT_REGION: &str = "global";

const WRAPPER_NAME: &str = "GCP Cloud KMS";

/// Seal whose root key lives in Google Cloud KMS
#[derive(Debug)]
pub struct GcpCkmsWrapper {
    logger: Arc<dyn Logger>,
    remote: RemoteKey,
    project: String,
    region: String,
    key_ring: String,
    crypto_key: String,
    credentials: Option<String>,
    key_name: String,
}

impl GcpCkmsWrapper {
    /// Creates an unconfigured wrapper
    pub fn new(opts: &WrapperOptions) -> Self {
        Self {
            logger: opts.logger.clone(),
            remote: RemoteKey::new("gcpckms", opts),
            project: String::new(),
            region: DEFAULT_REGION.to_string(),
            key_ring: String::new(),
            crypto_key: String::new(),
            credentials: None,
            key_name: String::new(),
        }
    }

    /// Path to the service account credentials file, if configured
    pub fn credentials(&self) -> Option<&str> {
        self.credentials.as_deref()
    }
}

#[async_trait]
impl Wrapper for GcpCkmsWrapper {
    fn wrapper_type(&self) -> KmsType {
        KmsType::GcpCkms
    }

    /// Full resource name of the crypto key
    fn key_id(&self) -> &str {
        &self.key_name
    }

    fn set_config(&mut self, config: &ConfigMap) -> Result<Option<WrapperInfo>> {
        let project = require(config, WRAPPER_NAME, "project", &["GOOGLE_PROJECT"])?;
        let key_ring = require(
            config,
            WRAPPER_NAME,
            "key_ring",
            &["VAULT_GCPCKMS_SEAL_KEY_RING"],
        )?;
        let crypto_key = require(
            config,
            WRAPPER_NAME,
            "crypto_key",
            &["VAULT_GCPCKMS_SEAL_CRYPTO_KEY"],
        )?;
        let region = lookup(config, "region", &["GOOGLE_REGION"])
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        self.credentials = lookup(
            config,
            "credentials",
            &["GOOGLE_CREDENTIALS", "GOOGLE_APPLICATION_CREDENTIALS"],
        );
        self.key_name = format!(
            "projects/{}/locations/{}/keyRings/{}/cryptoKeys/{}",
            project, region, key_ring, crypto_key
        );
        self.project = project;
        self.region = region;
        self.key_ring = key_ring;
        self.crypto_key = crypto_key;

        self.logger.debugf(format_args!(
            "configured GCP Cloud KMS seal: key={}",
            self.key_name
        ));

        let mut info = WrapperInfo::new();
        info.insert("project".to_string(), self.project.clone());
        info.insert("region".to_string(), self.region.clone());
        info.insert("key_ring".to_string(), self.key_ring.clone());
        info.insert("crypto_key".to_string(), self.crypto_key.clone());
        Ok(Some(info))
    }

    async fn encrypt(&self, plaintext: &[u8], aad: Option<&[u8]>) -> Result<EncryptedBlob> {
        self.remote.envelope_encrypt(&self.key_name, plaintext, aad).await
    }

    async fn decrypt(&self, blob: &EncryptedBlob, aad: Option<&[u8]>) -> Result<Vec<u8>> {
        self.remote.envelope_decrypt(blob, aad).await
    }

    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }
}
