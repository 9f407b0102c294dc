//! [`KeyClient`] backed by the AWS SDK for Rust
//!
//! ```rust,no_run
//! use sealwrap::wrappers::aws_sdk::AwsSdkKeyClient;
//! use sealwrap::{Kms, KmsType, WrapperConfigurator};
//! use std::sync::Arc;
//!
//! # async fn example() -> sealwrap::Result<()> {
//! let kms = Kms::new(KmsType::AwsKms)
//!     .with_config("region", "us-west-2")
//!     .with_config("kms_key_id", "alias/vault-seal");
//!
//! let client = AwsSdkKeyClient::from_config(&kms.config).await?;
//! let configurator = WrapperConfigurator::new().with_key_client(KmsType::AwsKms, Arc::new(client));
//! # Ok(())
//! # }
//! ```

use super::awskms::DEFAULT_REGION;
use crate::config::{lookup, ConfigMap};
use crate::error::{Error, Result};
use crate::KeyClient;
use async_trait::async_trait;
use aws_sdk_kms::config::Credentials;
use aws_sdk_kms::error::ProvideErrorMetadata;
use aws_sdk_kms::primitives::Blob;
use aws_sdk_kms::types::EncryptionAlgorithmSpec;
use aws_sdk_kms::Client as AwsSdkKmsClient;
use aws_types::region::Region;

/// Outcome of describing the configured key when the client was built
#[derive(Debug, Clone, PartialEq, Eq)]
enum KeyState {
    Usable,
    NotFound,
    Denied(String),
    Unavailable(String),
}

/// AWS KMS client for the `awskms` seal
#[derive(Debug, Clone)]
pub struct AwsSdkKeyClient {
    client: AwsSdkKmsClient,
    region: String,
    described: Option<(String, KeyState)>,
}

impl AwsSdkKeyClient {
    /// Wraps an existing SDK client
    pub fn new(client: AwsSdkKmsClient, region: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
            described: None,
        }
    }

    /// Builds a client from the same settings the `awskms` seal reads.
    ///
    /// Static credentials are used when `access_key` and `secret_key` are both
    /// set; otherwise the SDK's default credential chain applies.
    pub async fn from_config(config: &ConfigMap) -> Result<Self> {
        let access_key = lookup(config, "access_key", &["AWS_ACCESS_KEY_ID"]);
        let secret_key = lookup(config, "secret_key", &["AWS_SECRET_ACCESS_KEY"]);
        let credentials = match (access_key, secret_key) {
            (Some(access_key), Some(secret_key)) => Some(Credentials::new(
                access_key,
                secret_key,
                lookup(config, "session_token", &["AWS_SESSION_TOKEN"]),
                None,
                "sealwrap",
            )),
            (None, None) => None,
            _ => {
                return Err(Error::Construction(
                    "access_key and secret_key must be set together for AWS KMS".into(),
                ))
            }
        };

        let region = lookup(config, "region", &["AWS_REGION", "AWS_DEFAULT_REGION"])
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let mut loader = aws_config::from_env().region(Region::new(region.clone()));
        if let Some(endpoint) = lookup(config, "endpoint", &["AWS_KMS_ENDPOINT"]) {
            loader = loader.endpoint_url(endpoint);
        }
        if let Some(credentials) = credentials {
            loader = loader.credentials_provider(credentials);
        }
        let sdk_config = loader.load().await;

        log::debug!("created AWS KMS client for region {}", region);
        let mut key_client = Self::new(AwsSdkKmsClient::new(&sdk_config), region);
        if let Some(key_id) = lookup(config, "kms_key_id", &["VAULT_AWSKMS_SEAL_KEY_ID"]) {
            let state = key_client.describe(&key_id).await;
            key_client.described = Some((key_id, state));
        }
        Ok(key_client)
    }

    async fn describe(&self, key_id: &str) -> KeyState {
        match self.client.describe_key().key_id(key_id).send().await {
            Ok(_) => KeyState::Usable,
            Err(e) => match e.as_service_error() {
                Some(err) if err.is_not_found_exception() => KeyState::NotFound,
                Some(err)
                    if matches!(
                        err.code(),
                        Some("AccessDeniedException" | "UnrecognizedClientException")
                    ) =>
                {
                    KeyState::Denied(err.to_string())
                }
                _ => KeyState::Unavailable(e.to_string()),
            },
        }
    }

    /// Region the client talks to
    pub fn region(&self) -> &str {
        &self.region
    }
}

#[async_trait]
impl KeyClient for AwsSdkKeyClient {
    async fn encrypt(&self, key_id: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
        let result = self
            .client
            .encrypt()
            .key_id(key_id)
            .encryption_algorithm(EncryptionAlgorithmSpec::SymmetricDefault)
            .plaintext(Blob::new(plaintext.to_vec()))
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(err) if err.is_not_found_exception() => Error::KeyNotFound(key_id.to_string()),
                _ => Error::Kms(format!("KMS encrypt error: {}", e)),
            })?;

        result
            .ciphertext_blob()
            .map(|b| b.as_ref().to_vec())
            .ok_or_else(|| Error::Kms("No ciphertext blob returned from KMS".into()))
    }

    async fn decrypt(&self, key_id: &str, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let result = self
            .client
            .decrypt()
            .key_id(key_id)
            .encryption_algorithm(EncryptionAlgorithmSpec::SymmetricDefault)
            .ciphertext_blob(Blob::new(ciphertext.to_vec()))
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(err) if err.is_not_found_exception() => Error::KeyNotFound(key_id.to_string()),
                _ => Error::Kms(format!("KMS decrypt error: {}", e)),
            })?;

        result
            .plaintext()
            .map(|b| b.as_ref().to_vec())
            .ok_or_else(|| Error::Kms("No plaintext returned from KMS".into()))
    }

    /// Reports the `DescribeKey` result recorded by [`from_config`](Self::from_config).
    ///
    /// Keys that were not described when the client was built are assumed usable.
    fn verify_key(&self, key_id: &str) -> Result<()> {
        match &self.described {
            Some((described, state)) if described == key_id => state.to_result(key_id),
            _ => Ok(()),
        }
    }
}

impl KeyState {
    fn to_result(&self, key_id: &str) -> Result<()> {
        match self {
            KeyState::Usable => Ok(()),
            KeyState::NotFound => Err(Error::KeyNotFound(key_id.to_string())),
            KeyState::Denied(msg) => Err(Error::Credentials(msg.clone())),
            KeyState::Unavailable(msg) => Err(Error::Kms(format!("KMS describe key error: {}", msg))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_partial_static_credentials_are_rejected() {
        let mut config = ConfigMap::new();
        config.insert("access_key".into(), "AKIAEXAMPLE".into());
        if std::env::var("AWS_SECRET_ACCESS_KEY").is_ok() {
            return;
        }
        let err = AwsSdkKeyClient::from_config(&config).await.unwrap_err();
        assert!(matches!(err, Error::Construction(_)));
    }

    #[test]
    fn test_key_state_maps_to_errors() {
        assert!(KeyState::Usable.to_result("k").is_ok());
        assert!(KeyState::NotFound.to_result("k").unwrap_err().is_key_not_found());
        assert!(matches!(
            KeyState::Denied("denied".into()).to_result("k"),
            Err(Error::Credentials(_))
        ));
        assert!(matches!(
            KeyState::Unavailable("timeout".into()).to_result("k"),
            Err(Error::Kms(_))
        ));
    }
}
