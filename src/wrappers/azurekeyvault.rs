//! Azure Key Vault seal

use super::{RemoteKey, WrapperInfo, WrapperOptions};
use crate::config::{lookup, require, ConfigMap, KmsType};
use crate::error::{Error, Result};
use crate::log::Logger;
use crate::{EncryptedBlob, Wrapper};
use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;

const WRAPPER_NAME: &str = "Azure Key Vault";

/// Azure clouds and the Key Vault DNS suffix each one uses
const ENVIRONMENTS: &[(&str, &str)] = &[
    ("AzurePublicCloud", "vault.azure.net"),
    ("AzureUSGovernmentCloud", "vault.usgovcloudapi.net"),
    ("AzureChinaCloud", "vault.azure.cn"),
    ("AzureGermanCloud", "vault.microsoftazure.de"),
];

/// Environment used when neither the config nor the environment names one
pub const DEFAULT_ENVIRONMENT: &str = "AzurePublicCloud";

/// Seal whose root key lives in Azure Key Vault
#[derive(Debug)]
pub struct AzureKeyVaultWrapper {
    logger: Arc<dyn Logger>,
    remote: RemoteKey,
    tenant_id: Option<String>,
    client_id: Option<String>,
    environment: String,
    vault_name: String,
    key_name: String,
    vault_url: String,
}

impl AzureKeyVaultWrapper {
    /// Creates an unconfigured wrapper
    pub fn new(opts: &WrapperOptions) -> Self {
        Self {
            logger: opts.logger.clone(),
            remote: RemoteKey::new("azurekeyvault", opts),
            tenant_id: None,
            client_id: None,
            environment: DEFAULT_ENVIRONMENT.to_string(),
            vault_name: String::new(),
            key_name: String::new(),
            vault_url: String::new(),
        }
    }

    /// Canonical name of the configured Azure cloud
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Base URL of the configured vault
    pub fn vault_url(&self) -> &str {
        &self.vault_url
    }

    /// Tenant used for authentication, if configured
    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    /// Client used for authentication, if configured
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }
}

fn resolve_environment(name: &str) -> Result<(&'static str, &'static str)> {
    ENVIRONMENTS
        .iter()
        .find(|(env, _)| env.eq_ignore_ascii_case(name))
        .copied()
        .ok_or_else(|| Error::InvalidConfig(format!("unknown Azure environment {:?}", name)))
}

#[async_trait]
impl Wrapper for AzureKeyVaultWrapper {
    fn wrapper_type(&self) -> KmsType {
        KmsType::AzureKeyVault
    }

    fn key_id(&self) -> &str {
        &self.key_name
    }

    fn set_config(&mut self, config: &ConfigMap) -> Result<Option<WrapperInfo>> {
        let requested = lookup(config, "environment", &["AZURE_ENVIRONMENT"])
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());
        let (environment, dns_suffix) = resolve_environment(&requested)?;

        let vault_name = require(
            config,
            WRAPPER_NAME,
            "vault_name",
            &["VAULT_AZUREKEYVAULT_VAULT_NAME"],
        )?;
        let key_name = require(
            config,
            WRAPPER_NAME,
            "key_name",
            &["VAULT_AZUREKEYVAULT_KEY_NAME"],
        )?;

        self.tenant_id = lookup(config, "tenant_id", &["AZURE_TENANT_ID"]);
        self.client_id = lookup(config, "client_id", &["AZURE_CLIENT_ID"]);
        self.environment = environment.to_string();
        self.vault_url = format!("https://{}.{}/", vault_name, dns_suffix);
        self.vault_name = vault_name;
        self.key_name = key_name;

        self.logger.debugf(format_args!(
            "configured Azure Key Vault seal: environment={} vault={} key={}",
            self.environment, self.vault_url, self.key_name
        ));

        let mut info = WrapperInfo::new();
        info.insert("environment".to_string(), self.environment.clone());
        info.insert("vault_name".to_string(), self.vault_name.clone());
        info.insert("key_name".to_string(), self.key_name.clone());
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
