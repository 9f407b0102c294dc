//! Seal wrapper selection
//!
//! [`WrapperConfigurator`] owns a table from [`KmsType`] to a [`Configurator`]
//! function. Each configurator builds one wrapper, applies the stanza's
//! settings and turns the wrapper's raw metadata into display labels such as
//! `AWS KMS Region`. Entries can be replaced, which is how tests substitute
//! fake providers.

use crate::config::{Kms, KmsType};
use crate::error::{Error, Result};
use crate::log::Logger;
use crate::wrappers::{
    ocikms, AeadWrapper, AliCloudKmsWrapper, AwsKmsWrapper, AzureKeyVaultWrapper, GcpCkmsWrapper,
    OciKmsWrapper, TransitWrapper, WrapperInfo, WrapperOptions,
};
use crate::{KeyClient, Wrapper};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Display labels and values, in the order they should be shown
pub type KmsInfo = Vec<(String, String)>;

/// A configured wrapper together with its display labels
pub type ConfiguredWrapper = (Box<dyn Wrapper>, KmsInfo);

/// Builds and configures the wrapper for one seal type
pub type Configurator =
    Arc<dyn Fn(&WrapperOptions, &Kms) -> Result<ConfiguredWrapper> + Send + Sync>;

/// Whether a configuration error should fail the configurator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyNotFound {
    Fail,
    Tolerate,
}

/// How one provider's wrapper metadata is handled
#[derive(Debug)]
struct Provider {
    key_not_found: KeyNotFound,
    /// Raw metadata key and the label it is displayed under
    labels: &'static [(&'static str, &'static str)],
}

const AEAD: Provider = Provider {
    key_not_found: KeyNotFound::Fail,
    labels: &[],
};

const ALICLOUD_KMS: Provider = Provider {
    key_not_found: KeyNotFound::Tolerate,
    labels: &[
        ("region", "AliCloud KMS Region"),
        ("kms_key_id", "AliCloud KMS KeyID"),
        ("domain", "AliCloud KMS Domain"),
    ],
};

const AWS_KMS: Provider = Provider {
    key_not_found: KeyNotFound::Tolerate,
    labels: &[
        ("region", "AWS KMS Region"),
        ("kms_key_id", "AWS KMS KeyID"),
        ("endpoint", "AWS KMS Endpoint"),
    ],
};

const AZURE_KEY_VAULT: Provider = Provider {
    key_not_found: KeyNotFound::Tolerate,
    labels: &[
        ("environment", "Azure Environment"),
        ("vault_name", "Azure Vault Name"),
        ("key_name", "Azure Key Name"),
    ],
};

const GCP_CKMS: Provider = Provider {
    key_not_found: KeyNotFound::Tolerate,
    labels: &[
        ("project", "GCP KMS Project"),
        ("region", "GCP KMS Region"),
        ("key_ring", "GCP KMS Key Ring"),
        ("crypto_key", "GCP KMS Crypto Key"),
    ],
};

const OCI_KMS: Provider = Provider {
    key_not_found: KeyNotFound::Fail,
    labels: &[
        (ocikms::KMS_CONFIG_KEY_ID, "OCI KMS KeyID"),
        (ocikms::KMS_CONFIG_CRYPTO_ENDPOINT, "OCI KMS Crypto Endpoint"),
        (ocikms::KMS_CONFIG_MANAGEMENT_ENDPOINT, "OCI KMS Management Endpoint"),
        ("principal_type", "OCI KMS Principal Type"),
    ],
};

const TRANSIT: Provider = Provider {
    key_not_found: KeyNotFound::Tolerate,
    labels: &[
        ("address", "Transit Address"),
        ("mount_path", "Transit Mount Path"),
        ("key_name", "Transit Key Name"),
        ("namespace", "Transit Namespace"),
    ],
};

/// Applies the stanza to `wrapper`, checks that its key is reachable and
/// returns it with the raw metadata.
///
/// The key check runs only when a [`KeyClient`] is attached. A key-not-found
/// error from either step is swallowed when the provider tolerates it; the
/// wrapper is then returned without metadata.
fn apply_config<W: Wrapper + 'static>(
    mut wrapper: W,
    opts: &WrapperOptions,
    kms: &Kms,
    provider: &Provider,
) -> Result<(Box<dyn Wrapper>, Option<WrapperInfo>)> {
    let configured = wrapper.set_config(&kms.config).and_then(|info| {
        if let Some(client) = &opts.key_client {
            client.verify_key(wrapper.key_id())?;
        }
        Ok(info)
    });

    let wrapper_info = match configured {
        Ok(info) => info,
        Err(err) if provider.key_not_found == KeyNotFound::Tolerate && err.is_key_not_found() => {
            log::warn!(
                "{} seal configured without a usable key: {}",
                kms.kms_type,
                err
            );
            None
        }
        Err(err) => return Err(err),
    };
    Ok((Box::new(wrapper), wrapper_info))
}

fn configure<W: Wrapper + 'static>(
    wrapper: W,
    opts: &WrapperOptions,
    kms: &Kms,
    provider: &Provider,
) -> Result<ConfiguredWrapper> {
    let (wrapper, wrapper_info) = apply_config(wrapper, opts, kms, provider)?;
    let info = wrapper_info
        .map(|raw| translate(&raw, provider.labels))
        .unwrap_or_default();
    Ok((wrapper, info))
}

fn translate(raw: &WrapperInfo, labels: &[(&str, &str)]) -> KmsInfo {
    labels
        .iter()
        .filter_map(|(raw_key, label)| {
            raw.get(*raw_key)
                .map(|value| (label.to_string(), value.clone()))
        })
        .collect()
}

/// Configures a local AEAD seal
///
/// The label is prefixed with the stanza's purpose, e.g. `barrier AEAD Type`.
pub fn get_aead_kms(opts: &WrapperOptions, kms: &Kms) -> Result<ConfiguredWrapper> {
    let (wrapper, wrapper_info) = apply_config(AeadWrapper::new(opts), opts, kms, &AEAD)?;
    let label = match kms.purpose_label() {
        Some(purpose) => format!("{} AEAD Type", purpose),
        None => "AEAD Type".to_string(),
    };
    let info = wrapper_info
        .map(|raw| translate(&raw, &[("aead_type", label.as_str())]))
        .unwrap_or_default();
    Ok((wrapper, info))
}

/// Configures an Alibaba Cloud KMS seal
pub fn get_alicloud_kms(opts: &WrapperOptions, kms: &Kms) -> Result<ConfiguredWrapper> {
    configure(AliCloudKmsWrapper::new(opts), opts, kms, &ALICLOUD_KMS)
}

/// Configures an AWS KMS seal
pub fn get_aws_kms(opts: &WrapperOptions, kms: &Kms) -> Result<ConfiguredWrapper> {
    configure(AwsKmsWrapper::new(opts), opts, kms, &AWS_KMS)
}

/// Configures an Azure Key Vault seal
pub fn get_azure_key_vault_kms(opts: &WrapperOptions, kms: &Kms) -> Result<ConfiguredWrapper> {
    configure(AzureKeyVaultWrapper::new(opts), opts, kms, &AZURE_KEY_VAULT)
}

/// Configures a Google Cloud KMS seal
pub fn get_gcp_ckms_kms(opts: &WrapperOptions, kms: &Kms) -> Result<ConfiguredWrapper> {
    configure(GcpCkmsWrapper::new(opts), opts, kms, &GCP_CKMS)
}

/// Configures an OCI KMS seal
pub fn get_oci_kms(opts: &WrapperOptions, kms: &Kms) -> Result<ConfiguredWrapper> {
    configure(OciKmsWrapper::new(opts), opts, kms, &OCI_KMS)
}

/// Configures a Vault Transit seal
pub fn get_transit_kms(opts: &WrapperOptions, kms: &Kms) -> Result<ConfiguredWrapper> {
    configure(TransitWrapper::new(opts), opts, kms, &TRANSIT)
}

/// Chooses and configures the wrapper for a seal stanza
#[derive(Clone)]
pub struct WrapperConfigurator {
    configurators: HashMap<KmsType, Configurator>,
    key_clients: HashMap<KmsType, Arc<dyn KeyClient>>,
}

impl fmt::Debug for WrapperConfigurator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&str> = self.configurators.keys().map(KmsType::as_str).collect();
        types.sort_unstable();
        f.debug_struct("WrapperConfigurator")
            .field("configurators", &types)
            .field("key_clients", &self.key_clients)
            .finish()
    }
}

impl Default for WrapperConfigurator {
    fn default() -> Self {
        Self::new()
    }
}

impl WrapperConfigurator {
    /// Creates a configurator with every built-in seal type registered
    pub fn new() -> Self {
        Self::empty()
            .with_configurator(KmsType::Aead, get_aead_kms)
            .with_configurator(KmsType::AliCloudKms, get_alicloud_kms)
            .with_configurator(KmsType::AwsKms, get_aws_kms)
            .with_configurator(KmsType::AzureKeyVault, get_azure_key_vault_kms)
            .with_configurator(KmsType::GcpCkms, get_gcp_ckms_kms)
            .with_configurator(KmsType::OciKms, get_oci_kms)
            .with_configurator(KmsType::Transit, get_transit_kms)
    }

    /// Creates a configurator with no seal types registered
    pub fn empty() -> Self {
        Self {
            configurators: HashMap::new(),
            key_clients: HashMap::new(),
        }
    }

    /// Registers or replaces the configurator for a seal type
    pub fn with_configurator<F>(mut self, kms_type: KmsType, configurator: F) -> Self
    where
        F: Fn(&WrapperOptions, &Kms) -> Result<ConfiguredWrapper> + Send + Sync + 'static,
    {
        self.configurators.insert(kms_type, Arc::new(configurator));
        self
    }

    /// Supplies the remote key client handed to wrappers of a seal type
    pub fn with_key_client(mut self, kms_type: KmsType, client: Arc<dyn KeyClient>) -> Self {
        self.key_clients.insert(kms_type, client);
        self
    }

    /// Builds the wrapper for `kms`.
    ///
    /// Returns `Ok(None)` for `shamir`, which needs no external wrapper. On
    /// success the wrapper's display labels are appended to `info_keys` and
    /// `info`; on error neither is touched.
    pub fn configure_wrapper(
        &self,
        kms: &Kms,
        info_keys: &mut Vec<String>,
        info: &mut HashMap<String, String>,
        logger: Arc<dyn Logger>,
    ) -> Result<Option<Box<dyn Wrapper>>> {
        let configurator = match &kms.kms_type {
            KmsType::Shamir => return Ok(None),
            KmsType::Pkcs11 => return Err(Error::EnterpriseRequired(KmsType::Pkcs11)),
            kms_type => self
                .configurators
                .get(kms_type)
                .ok_or_else(|| Error::UnsupportedType(kms_type.to_string()))?,
        };

        let mut opts = WrapperOptions::new(logger);
        if let Some(client) = self.key_clients.get(&kms.kms_type) {
            opts = opts.with_key_client(client.clone());
        }

        let (wrapper, kms_info) = configurator(&opts, kms)?;
        for (key, value) in kms_info {
            info_keys.push(key.clone());
            info.insert(key, value);
        }

        Ok(Some(wrapper))
    }
}

/// Builds the wrapper for `kms` using the built-in seal types.
///
/// See [`WrapperConfigurator::configure_wrapper`].
pub fn configure_wrapper(
    kms: &Kms,
    info_keys: &mut Vec<String>,
    info: &mut HashMap<String, String>,
    logger: Arc<dyn Logger>,
) -> Result<Option<Box<dyn Wrapper>>> {
    WrapperConfigurator::new().configure_wrapper(kms, info_keys, info, logger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::NoopLogger;
    use crate::wrappers::testing::{options_with_client, XorKeyClient};

    #[test]
    fn test_translate_keeps_label_order_and_skips_absent_keys() {
        let mut raw = WrapperInfo::new();
        raw.insert("kms_key_id".into(), "k".into());
        raw.insert("region".into(), "r".into());

        let info = translate(
            &raw,
            &[
                ("region", "AWS KMS Region"),
                ("kms_key_id", "AWS KMS KeyID"),
                ("endpoint", "AWS KMS Endpoint"),
            ],
        );
        assert_eq!(
            info,
            vec![
                ("AWS KMS Region".to_string(), "r".to_string()),
                ("AWS KMS KeyID".to_string(), "k".to_string()),
            ]
        );
    }

    #[test]
    fn test_aead_label_uses_purpose() {
        let kms = Kms::new(KmsType::Aead).with_purpose("barrier");
        let (_, info) = get_aead_kms(&WrapperOptions::default(), &kms).unwrap();
        assert_eq!(
            info,
            vec![("barrier AEAD Type".to_string(), "aes-gcm".to_string())]
        );

        let (_, info) = get_aead_kms(&WrapperOptions::default(), &Kms::new(KmsType::Aead)).unwrap();
        assert_eq!(info[0].0, "AEAD Type");
    }

    #[test]
    fn test_default_table_covers_builtin_types() {
        let configurator = WrapperConfigurator::new();
        for kms_type in [
            KmsType::Aead,
            KmsType::AliCloudKms,
            KmsType::AwsKms,
            KmsType::AzureKeyVault,
            KmsType::GcpCkms,
            KmsType::OciKms,
            KmsType::Transit,
        ] {
            assert!(configurator.configurators.contains_key(&kms_type), "{}", kms_type);
        }
        assert!(!configurator.configurators.contains_key(&KmsType::Shamir));
        assert!(!configurator.configurators.contains_key(&KmsType::Pkcs11));
    }

    #[test]
    fn test_empty_table_rejects_everything_but_shamir() {
        let configurator = WrapperConfigurator::empty();
        let mut keys = Vec::new();
        let mut info = HashMap::new();

        let shamir = configurator
            .configure_wrapper(&Kms::new(KmsType::Shamir), &mut keys, &mut info, NoopLogger::shared())
            .unwrap();
        assert!(shamir.is_none());

        let err = configurator
            .configure_wrapper(&Kms::new(KmsType::Aead), &mut keys, &mut info, NoopLogger::shared())
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedType(tag) if tag == "aead"));
        assert!(keys.is_empty() && info.is_empty());
    }

    /// Wrapper whose configuration always fails with the given error
    #[derive(Debug)]
    struct FailingWrapper {
        error: fn() -> Error,
    }

    #[async_trait::async_trait]
    impl Wrapper for FailingWrapper {
        fn wrapper_type(&self) -> KmsType {
            KmsType::Other("failing".into())
        }

        fn key_id(&self) -> &str {
            ""
        }

        fn set_config(&mut self, _config: &crate::ConfigMap) -> Result<Option<WrapperInfo>> {
            Err((self.error)())
        }

        async fn encrypt(&self, _plaintext: &[u8], _aad: Option<&[u8]>) -> Result<crate::EncryptedBlob> {
            Err(Error::Kms("not configured".into()))
        }

        async fn decrypt(&self, _blob: &crate::EncryptedBlob, _aad: Option<&[u8]>) -> Result<Vec<u8>> {
            Err(Error::Kms("not configured".into()))
        }

        fn as_any(&self) -> &(dyn std::any::Any + Send + Sync) {
            self
        }
    }

    fn key_not_found() -> Error {
        Error::KeyNotFound("projects/p/locations/global/keyRings/r/cryptoKeys/k".into())
    }

    fn invalid_credentials() -> Error {
        Error::Credentials("invalid credentials".into())
    }

    #[test]
    fn test_cloud_providers_tolerate_key_not_found() {
        for (name, provider) in [
            ("alicloudkms", &ALICLOUD_KMS),
            ("awskms", &AWS_KMS),
            ("azurekeyvault", &AZURE_KEY_VAULT),
            ("gcpckms", &GCP_CKMS),
            ("transit", &TRANSIT),
        ] {
            let kms = Kms::new(name);
            let opts = WrapperOptions::default();
            let (wrapper, info) = configure(FailingWrapper { error: key_not_found }, &opts, &kms, provider)
                .unwrap_or_else(|e| panic!("{} should tolerate key not found: {}", name, e));
            assert!(info.is_empty());
            assert_eq!(wrapper.wrapper_type(), KmsType::Other("failing".into()));

            let err = configure(FailingWrapper { error: invalid_credentials }, &opts, &kms, provider)
                .err()
                .unwrap_or_else(|| panic!("{} should propagate credential errors", name));
            assert!(matches!(err, Error::Credentials(_)));
        }
    }

    #[test]
    fn test_aead_and_oci_fail_on_key_not_found() {
        for provider in [&AEAD, &OCI_KMS] {
            let result = configure(
                FailingWrapper { error: key_not_found },
                &WrapperOptions::default(),
                &Kms::new(KmsType::OciKms),
                provider,
            );
            assert!(matches!(result, Err(Error::KeyNotFound(_))));
        }
    }

    fn aws_stanza() -> Kms {
        Kms::new(KmsType::AwsKms)
            .with_config("region", "us-west-2")
            .with_config("kms_key_id", "alias/vault-seal")
    }

    #[test]
    fn test_aws_key_check_passes_with_known_key() {
        let client = Arc::new(XorKeyClient::default());
        let (_, info) = get_aws_kms(&options_with_client(client.clone()), &aws_stanza()).unwrap();

        assert_eq!(info.len(), 2);
        assert_eq!(
            *client.calls.lock().unwrap(),
            vec!["alias/vault-seal", "alias/vault-seal"]
        );
    }

    #[test]
    fn test_aws_missing_key_is_tolerated_without_labels() {
        let client = Arc::new(XorKeyClient {
            missing_key: Some("alias/vault-seal".into()),
            ..Default::default()
        });
        let (wrapper, info) = get_aws_kms(&options_with_client(client), &aws_stanza()).unwrap();

        assert!(info.is_empty());
        assert_eq!(wrapper.key_id(), "alias/vault-seal");
    }

    struct CapturingLog {
        records: std::sync::Mutex<Vec<String>>,
    }

    impl log::Log for CapturingLog {
        fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
            metadata.level() <= log::Level::Warn
        }

        fn log(&self, record: &log::Record<'_>) {
            if self.enabled(record.metadata()) {
                self.records.lock().unwrap().push(record.args().to_string());
            }
        }

        fn flush(&self) {}
    }

    static CAPTURED: CapturingLog = CapturingLog {
        records: std::sync::Mutex::new(Vec::new()),
    };

    #[test]
    fn test_tolerated_missing_key_is_warned() {
        let _ = log::set_logger(&CAPTURED);
        log::set_max_level(log::LevelFilter::Warn);

        let kms = Kms::new(KmsType::GcpCkms)
            .with_config("project", "p")
            .with_config("region", "global")
            .with_config("key_ring", "r")
            .with_config("crypto_key", "warned-key");
        let client = Arc::new(XorKeyClient {
            missing_key: Some("projects/p/locations/global/keyRings/r/cryptoKeys/warned-key".into()),
            ..Default::default()
        });
        get_gcp_ckms_kms(&options_with_client(client), &kms).unwrap();

        let records = CAPTURED.records.lock().unwrap();
        assert!(records
            .iter()
            .any(|r| r.starts_with("gcpckms seal configured without a usable key") && r.contains("warned-key")));
    }

    #[test]
    fn test_oci_missing_key_fails() {
        let kms = Kms::new(KmsType::OciKms)
            .with_config(ocikms::KMS_CONFIG_KEY_ID, "ocid1.key.oc1.iad.example")
            .with_config(ocikms::KMS_CONFIG_CRYPTO_ENDPOINT, "https://crypto.example.com");
        let client = Arc::new(XorKeyClient {
            missing_key: Some("ocid1.key.oc1.iad.example".into()),
            ..Default::default()
        });

        let result = get_oci_kms(&options_with_client(client), &kms);
        assert!(matches!(result, Err(Error::KeyNotFound(_))));
    }

    #[test]
    fn test_debug_lists_registered_types() {
        let debug = format!("{:?}", WrapperConfigurator::new());
        assert!(debug.contains("awskms"));
        assert!(debug.contains("transit"));
    }
}
