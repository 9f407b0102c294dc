use crate::config::KmsType;
use thiserror::Error;

/// Result type for sealwrap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while selecting, configuring or using a seal wrapper
#[derive(Error, Debug)]
pub enum Error {
    /// The KMS type tag is not recognized
    #[error("Unknown KMS type {0:?}")]
    UnsupportedType(String),

    /// The KMS type is valid but needs a capability absent from this build
    #[error("KMS type '{0}' requires the Vault Enterprise HSM binary")]
    EnterpriseRequired(KmsType),

    /// The provider reported that the configured key does not exist
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// A required configuration value was not supplied
    #[error("'{key}' not found for {wrapper} wrapper configuration")]
    MissingConfig {
        /// Human-readable wrapper name
        wrapper: &'static str,
        /// Name of the missing configuration key
        key: &'static str,
    },

    /// A configuration value was present but unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The provider rejected the supplied credentials
    #[error("Invalid credentials: {0}")]
    Credentials(String),

    /// A wrapper or its client could not be built
    #[error("Construction error: {0}")]
    Construction(String),

    /// Errors returned by a remote key service
    #[error("KMS error: {0}")]
    Kms(String),

    /// Errors related to cryptographic operations
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Errors related to JSON serialization/deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors related to I/O operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true when the error means the provider could not find the key.
    ///
    /// Seal configuration treats this as recoverable for providers whose keys
    /// may be created or rotated after the seal is configured.
    pub fn is_key_not_found(&self) -> bool {
        matches!(self, Error::KeyNotFound(_))
    }
}
