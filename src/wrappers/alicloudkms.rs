//! Alibaba Cloud KMS seal

use super::{insert_if_set, RemoteKey, WrapperInfo, WrapperOptions};
use crate::config::{lookup, require, ConfigMap, KmsType};
use crate::error::Result;
use crate::log::Logger;
use crate::{EncryptedBlob, Wrapper};
use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;

/// Region used when neither the config nor the environment names one
pub const DEFAULT_REGION: &str = "us-east-1";

const WRAPPER_NAME: &str = "AliCloud KMS";

/// Seal whose root key lives in Alibaba Cloud KMS
#[derive(Debug)]
pub struct AliCloudKmsWrapper {
    logger: Arc<dyn Logger>,
    remote: RemoteKey,
    region: String,
    key_id: String,
    domain: Option<String>,
}

impl AliCloudKmsWrapper {
    /// Creates an unconfigured wrapper
    pub fn new(opts: &WrapperOptions) -> Self {
        Self {
            logger: opts.logger.clone(),
            remote: RemoteKey::new("alicloudkms", opts),
            region: DEFAULT_REGION.to_string(),
            key_id: String::new(),
            domain: None,
        }
    }

    /// Configured region
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Custom KMS domain, if any
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }
}

#[async_trait]
impl Wrapper for AliCloudKmsWrapper {
    fn wrapper_type(&self) -> KmsType {
        KmsType::AliCloudKms
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }

    fn set_config(&mut self, config: &ConfigMap) -> Result<Option<WrapperInfo>> {
        self.key_id = require(
            config,
            WRAPPER_NAME,
            "kms_key_id",
            &["VAULT_ALICLOUDKMS_SEAL_KEY_ID"],
        )?;
        self.region = lookup(config, "region", &["ALICLOUD_REGION"])
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        self.domain = lookup(config, "domain", &["ALICLOUD_DOMAIN"]);

        self.logger.debugf(format_args!(
            "configured AliCloud KMS seal: region={} key_id={} domain={:?}",
            self.region, self.key_id, self.domain
        ));

        let mut info = WrapperInfo::new();
        info.insert("region".to_string(), self.region.clone());
        info.insert("kms_key_id".to_string(), self.key_id.clone());
        insert_if_set(&mut info, "domain", self.domain.as_deref());
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
