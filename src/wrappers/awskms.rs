//! AWS KMS seal

use super::{insert_if_set, RemoteKey, WrapperInfo, WrapperOptions};
use crate::config::{lookup, require, ConfigMap, KmsType};
use crate::error::{Error, Result};
use crate::log::Logger;
use crate::{EncryptedBlob, Wrapper};
use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;

/// Region used when neither the config nor the environment names one
pub const DEFAULT_REGION: &str = "us-east-1";

const WRAPPER_NAME: &str = "AWS KMS";

/// Seal whose root key lives in AWS KMS
#[derive(Debug)]
pub struct AwsKmsWrapper {
    logger: Arc<dyn Logger>,
    remote: RemoteKey,
    region: String,
    key_id: String,
    endpoint: Option<String>,
    max_retries: Option<u32>,
}

impl AwsKmsWrapper {
    /// Creates an unconfigured wrapper
    pub fn new(opts: &WrapperOptions) -> Self {
        Self {
            logger: opts.logger.clone(),
            remote: RemoteKey::new("awskms", opts),
            region: DEFAULT_REGION.to_string(),
            key_id: String::new(),
            endpoint: None,
            max_retries: None,
        }
    }

    /// Configured AWS region
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Custom KMS endpoint, if any
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Maximum retries requested for SDK calls
    pub fn max_retries(&self) -> Option<u32> {
        self.max_retries
    }
}

#[async_trait]
impl Wrapper for AwsKmsWrapper {
    fn wrapper_type(&self) -> KmsType {
        KmsType::AwsKms
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }

    fn set_config(&mut self, config: &ConfigMap) -> Result<Option<WrapperInfo>> {
        let key_id = require(config, WRAPPER_NAME, "kms_key_id", &["VAULT_AWSKMS_SEAL_KEY_ID"])?;
        let region = lookup(config, "region", &["AWS_REGION", "AWS_DEFAULT_REGION"])
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        let endpoint = lookup(config, "endpoint", &["AWS_KMS_ENDPOINT"]);
        let max_retries = lookup(config, "max_retries", &[])
            .map(|raw| {
                raw.parse::<u32>().map_err(|e| {
                    Error::InvalidConfig(format!("failed to parse max_retries {:?}: {}", raw, e))
                })
            })
            .transpose()?;

        self.key_id = key_id;
        self.region = region;
        self.endpoint = endpoint;
        self.max_retries = max_retries;

        self.logger.debugf(format_args!(
            "configured AWS KMS seal: region={} key_id={} endpoint={:?}",
            self.region, self.key_id, self.endpoint
        ));

        let mut info = WrapperInfo::new();
        info.insert("region".to_string(), self.region.clone());
        info.insert("kms_key_id".to_string(), self.key_id.clone());
        insert_if_set(&mut info, "endpoint", self.endpoint.as_deref());
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
