//! Seal configuration records
//!
//! A [`Kms`] describes one seal stanza: the KMS type tag, an optional purpose
//! label and the provider-specific settings. [`SharedConfig`] holds every seal
//! stanza of a server configuration and can be loaded from JSON:
//!
//! ```json
//! {
//!   "seal": [
//!     { "type": "awskms", "config": { "region": "us-west-2", "kms_key_id": "alias/vault" } }
//!   ]
//! }
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Provider-specific settings for a seal
pub type ConfigMap = HashMap<String, String>;

/// The kind of seal a [`Kms`] stanza configures
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum KmsType {
    /// Built-in secret sharing, no external KMS
    Shamir,
    /// Local AEAD key
    Aead,
    /// Alibaba Cloud KMS
    AliCloudKms,
    /// AWS KMS
    AwsKms,
    /// Azure Key Vault
    AzureKeyVault,
    /// Google Cloud KMS
    GcpCkms,
    /// Oracle Cloud Infrastructure KMS
    OciKms,
    /// Vault Transit secrets engine
    Transit,
    /// HSM via PKCS#11
    Pkcs11,
    /// Any tag this build does not recognize
    Other(String),
}

impl KmsType {
    /// Returns the configuration tag for this type
    pub fn as_str(&self) -> &str {
        match self {
            KmsType::Shamir => "shamir",
            KmsType::Aead => "aead",
            KmsType::AliCloudKms => "alicloudkms",
            KmsType::AwsKms => "awskms",
            KmsType::AzureKeyVault => "azurekeyvault",
            KmsType::GcpCkms => "gcpckms",
            KmsType::OciKms => "ocikms",
            KmsType::Transit => "transit",
            KmsType::Pkcs11 => "pkcs11",
            KmsType::Other(tag) => tag,
        }
    }
}

impl fmt::Display for KmsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for KmsType {
    fn from(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "shamir" => KmsType::Shamir,
            "aead" => KmsType::Aead,
            "alicloudkms" => KmsType::AliCloudKms,
            "awskms" => KmsType::AwsKms,
            "azurekeyvault" => KmsType::AzureKeyVault,
            "gcpckms" => KmsType::GcpCkms,
            "ocikms" => KmsType::OciKms,
            "transit" => KmsType::Transit,
            "pkcs11" => KmsType::Pkcs11,
            _ => KmsType::Other(tag.to_string()),
        }
    }
}

impl From<String> for KmsType {
    fn from(tag: String) -> Self {
        KmsType::from(tag.as_str())
    }
}

impl From<KmsType> for String {
    fn from(kms_type: KmsType) -> Self {
        kms_type.as_str().to_string()
    }
}

impl FromStr for KmsType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(KmsType::from(s))
    }
}

/// A single seal stanza
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kms {
    /// Which seal implementation to use
    #[serde(rename = "type")]
    pub kms_type: KmsType,

    /// Role of this seal, e.g. "barrier"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,

    /// Disabled seals are kept around for seal migration only
    #[serde(default)]
    pub disabled: bool,

    /// Provider-specific settings
    #[serde(default, deserialize_with = "deserialize_config_map")]
    pub config: ConfigMap,
}

impl Kms {
    /// Creates a stanza of the given type with no purpose and no settings
    pub fn new(kms_type: impl Into<KmsType>) -> Self {
        Self {
            kms_type: kms_type.into(),
            purpose: None,
            disabled: false,
            config: ConfigMap::new(),
        }
    }

    /// Sets the purpose label
    pub fn with_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = Some(purpose.into());
        self
    }

    /// Adds a provider setting
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Marks the stanza as disabled
    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Returns the purpose label, treating an empty label as absent
    pub fn purpose_label(&self) -> Option<&str> {
        self.purpose.as_deref().filter(|p| !p.is_empty())
    }

    /// Parses a single stanza from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Seal-related portion of a server configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Every configured seal, in declaration order
    #[serde(default, rename = "seal")]
    pub seals: Vec<Kms>,
}

impl SharedConfig {
    /// Parses a configuration document from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Returns the seals that are not disabled
    pub fn enabled_seals(&self) -> impl Iterator<Item = &Kms> {
        self.seals.iter().filter(|kms| !kms.disabled)
    }

    /// Returns the first enabled seal declared for the given purpose
    pub fn seal_for_purpose(&self, purpose: &str) -> Option<&Kms> {
        self.enabled_seals()
            .find(|kms| kms.purpose_label() == Some(purpose))
    }
}

// Seal settings are written as plain scalars; numbers and booleans are kept
// in their textual form so providers parse them the same way as strings.
fn deserialize_config_map<'de, D>(deserializer: D) -> std::result::Result<ConfigMap, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as _;

    let raw = HashMap::<String, serde_json::Value>::deserialize(deserializer)?;
    let mut config = ConfigMap::with_capacity(raw.len());
    for (key, value) in raw {
        let value = match value {
            serde_json::Value::String(s) => s,
            serde_json::Value::Bool(b) => b.to_string(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Null => continue,
            _ => {
                return Err(D::Error::custom(format!(
                    "seal config value for '{}' must be a string, number or boolean",
                    key
                )))
            }
        };
        config.insert(key, value);
    }
    Ok(config)
}

/// Looks up a setting, falling back to the given environment variables in order.
///
/// Empty values are treated as unset.
pub(crate) fn lookup(config: &ConfigMap, key: &str, env_vars: &[&str]) -> Option<String> {
    if let Some(value) = config.get(key).filter(|v| !v.is_empty()) {
        return Some(value.clone());
    }
    env_vars
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.is_empty())
}

/// Like [`lookup`], but fails with [`Error::MissingConfig`] when nothing is set
pub(crate) fn require(
    config: &ConfigMap,
    wrapper: &'static str,
    key: &'static str,
    env_vars: &[&str],
) -> Result<String> {
    lookup(config, key, env_vars).ok_or(Error::MissingConfig { wrapper, key })
}

/// Parses a boolean setting using the usual textual forms
pub(crate) fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        _ => Err(Error::InvalidConfig(format!(
            "failed to parse '{}' as a boolean: {:?}",
            key, value
        ))),
    }
}
