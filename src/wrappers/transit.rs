//! Vault Transit seal
//!
//! Unlike the cloud seals, data is sent to the transit key as-is rather than
//! being envelope encrypted, so associated data is not supported.

use super::{insert_if_set, RemoteKey, WrapperInfo, WrapperOptions};
use crate::config::{lookup, parse_bool, require, ConfigMap, KmsType};
use crate::error::{Error, Result};
use crate::log::Logger;
use crate::{EncryptedBlob, Wrapper};
use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;

/// Address used when neither the config nor `VAULT_ADDR` names one
pub const DEFAULT_ADDRESS: &str = "https://127.0.0.1:8200";

const WRAPPER_NAME: &str = "Transit";

/// TLS settings for the connection to the transit server
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TlsSettings {
    /// CA certificate used to verify the server
    pub ca_cert: Option<String>,
    /// Client certificate for mutual TLS
    pub client_cert: Option<String>,
    /// Client key for mutual TLS
    pub client_key: Option<String>,
    /// Server name to verify instead of the address host
    pub server_name: Option<String>,
    /// Skip server certificate verification
    pub skip_verify: bool,
}

/// Seal whose data is encrypted by a key in another Vault's transit engine
#[derive(Debug)]
pub struct TransitWrapper {
    logger: Arc<dyn Logger>,
    remote: RemoteKey,
    address: String,
    mount_path: String,
    key_name: String,
    namespace: Option<String>,
    disable_renewal: bool,
    tls: TlsSettings,
}

impl TransitWrapper {
    /// Creates an unconfigured wrapper
    pub fn new(opts: &WrapperOptions) -> Self {
        Self {
            logger: opts.logger.clone(),
            remote: RemoteKey::new("transit", opts),
            address: DEFAULT_ADDRESS.to_string(),
            mount_path: String::new(),
            key_name: String::new(),
            namespace: None,
            disable_renewal: false,
            tls: TlsSettings::default(),
        }
    }

    /// Address of the transit server
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Mount path of the transit engine, without a trailing slash
    pub fn mount_path(&self) -> &str {
        &self.mount_path
    }

    /// Namespace the transit engine lives in, if any
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Whether token renewal has been disabled
    pub fn disable_renewal(&self) -> bool {
        self.disable_renewal
    }

    /// TLS settings for the transit connection
    pub fn tls(&self) -> &TlsSettings {
        &self.tls
    }
}

fn optional_bool(config: &ConfigMap, key: &str, env_vars: &[&str]) -> Result<bool> {
    lookup(config, key, env_vars)
        .map(|raw| parse_bool(key, &raw))
        .transpose()
        .map(Option::unwrap_or_default)
}

#[async_trait]
impl Wrapper for TransitWrapper {
    fn wrapper_type(&self) -> KmsType {
        KmsType::Transit
    }

    fn key_id(&self) -> &str {
        &self.key_name
    }

    fn set_config(&mut self, config: &ConfigMap) -> Result<Option<WrapperInfo>> {
        let key_name = require(
            config,
            WRAPPER_NAME,
            "key_name",
            &["VAULT_TRANSIT_SEAL_KEY_NAME"],
        )?;
        let mount_path = require(
            config,
            WRAPPER_NAME,
            "mount_path",
            &["VAULT_TRANSIT_SEAL_MOUNT_PATH"],
        )?;
        let disable_renewal = optional_bool(config, "disable_renewal", &[])?;
        let tls = TlsSettings {
            ca_cert: lookup(config, "tls_ca_cert", &["VAULT_CACERT"]),
            client_cert: lookup(config, "tls_client_cert", &["VAULT_CLIENT_CERT"]),
            client_key: lookup(config, "tls_client_key", &["VAULT_CLIENT_KEY"]),
            server_name: lookup(config, "tls_server_name", &["VAULT_TLS_SERVER_NAME"]),
            skip_verify: optional_bool(config, "tls_skip_verify", &["VAULT_SKIP_VERIFY"])?,
        };
        if tls.client_cert.is_some() != tls.client_key.is_some() {
            return Err(Error::InvalidConfig(
                "tls_client_cert and tls_client_key must be set together".into(),
            ));
        }

        self.address = lookup(config, "address", &["VAULT_ADDR"])
            .unwrap_or_else(|| DEFAULT_ADDRESS.to_string());
        self.mount_path = mount_path.trim_end_matches('/').to_string();
        self.key_name = key_name;
        self.namespace = lookup(config, "namespace", &["VAULT_NAMESPACE"]);
        self.disable_renewal = disable_renewal;
        self.tls = tls;

        self.logger.debugf(format_args!(
            "configured Transit seal: address={} mount_path={} key_name={} namespace={:?}",
            self.address, self.mount_path, self.key_name, self.namespace
        ));

        let mut info = WrapperInfo::new();
        info.insert("address".to_string(), self.address.clone());
        info.insert("mount_path".to_string(), self.mount_path.clone());
        info.insert("key_name".to_string(), self.key_name.clone());
        insert_if_set(&mut info, "namespace", self.namespace.as_deref());
        Ok(Some(info))
    }

    async fn encrypt(&self, plaintext: &[u8], aad: Option<&[u8]>) -> Result<EncryptedBlob> {
        if aad.is_some_and(|aad| !aad.is_empty()) {
            return Err(Error::Crypto(
                "transit wrapper does not support associated data".into(),
            ));
        }
        self.remote.direct_encrypt(&self.key_name, plaintext).await
    }

    async fn decrypt(&self, blob: &EncryptedBlob, aad: Option<&[u8]>) -> Result<Vec<u8>> {
        if aad.is_some_and(|aad| !aad.is_empty()) {
            return Err(Error::Crypto(
                "transit wrapper does not support associated data".into(),
            ));
        }
        self.remote.direct_decrypt(blob).await
    }

    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wrappers::testing::{options_with_client, XorKeyClient};

    fn base_config() -> ConfigMap {
        let mut config = ConfigMap::new();
        config.insert("address".into(), "https://vault.internal:8200".into());
        config.insert("mount_path".into(), "transit/".into());
        config.insert("key_name".into(), "autounseal".into());
        config
    }

    #[test]
    fn test_set_config_trims_mount_path() {
        let mut wrapper = TransitWrapper::new(&WrapperOptions::default());
        let info = wrapper.set_config(&base_config()).unwrap().unwrap();
        assert_eq!(info["address"], "https://vault.internal:8200");
        assert_eq!(info["mount_path"], "transit");
        assert_eq!(info["key_name"], "autounseal");
        assert_eq!(wrapper.key_id(), "autounseal");
    }

    #[test]
    fn test_namespace_and_flags() {
        let mut wrapper = TransitWrapper::new(&WrapperOptions::default());
        let mut config = base_config();
        config.insert("namespace".into(), "ns1/".into());
        config.insert("disable_renewal".into(), "true".into());
        config.insert("tls_skip_verify".into(), "1".into());
        config.insert("tls_server_name".into(), "vault".into());

        let info = wrapper.set_config(&config).unwrap().unwrap();
        assert_eq!(info["namespace"], "ns1/");
        assert!(wrapper.disable_renewal());
        assert!(wrapper.tls().skip_verify);
        assert_eq!(wrapper.tls().server_name.as_deref(), Some("vault"));
    }

    #[test]
    fn test_client_cert_requires_key() {
        let mut wrapper = TransitWrapper::new(&WrapperOptions::default());
        let mut config = base_config();
        config.insert("tls_client_cert".into(), "/etc/vault/client.pem".into());
        if std::env::var("VAULT_CLIENT_KEY").is_err() {
            assert!(matches!(
                wrapper.set_config(&config),
                Err(Error::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_bad_disable_renewal_is_rejected() {
        let mut wrapper = TransitWrapper::new(&WrapperOptions::default());
        let mut config = base_config();
        config.insert("disable_renewal".into(), "nope".into());
        assert!(matches!(
            wrapper.set_config(&config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_direct_round_trip_and_aad_rejected() {
        let client = Arc::new(XorKeyClient::default());
        let mut wrapper = TransitWrapper::new(&options_with_client(client));
        wrapper.set_config(&base_config()).unwrap();

        let blob = wrapper.encrypt(b"recovery key", None).await.unwrap();
        assert!(blob.key_info.wrapped_key.is_none());
        assert_eq!(blob.key_info.key_id, "autounseal");
        assert_eq!(wrapper.decrypt(&blob, Some(&[])).await.unwrap(), b"recovery key");
        assert!(matches!(
            wrapper.encrypt(b"x", Some(b"ctx")).await,
            Err(Error::Crypto(_))
        ));
    }
}
