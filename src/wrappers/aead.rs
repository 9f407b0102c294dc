//! Local AEAD seal
//!
//! The key is supplied directly in the configuration as base64 (`key`), so
//! this wrapper is mostly useful for testing and for recovery seals.

use super::{KeyInfo, WrapperInfo, WrapperOptions};
use crate::config::{lookup, ConfigMap, KmsType};
use crate::crypto::{Aes256GcmAead, AES256_KEY_SIZE};
use crate::error::{Error, Result};
use crate::log::Logger;
use crate::{EncryptedBlob, Wrapper};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use metrics::counter;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use zeroize::Zeroizing;

/// The only AEAD algorithm currently supported
pub const AEAD_TYPE_AES_GCM: &str = "aes-gcm";

/// Seal backed by a locally held AES-256-GCM key
pub struct AeadWrapper {
    logger: Arc<dyn Logger>,
    aead: Aes256GcmAead,
    aead_type: String,
    key_id: String,
    key: Option<Zeroizing<Vec<u8>>>,
}

impl fmt::Debug for AeadWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AeadWrapper")
            .field("aead_type", &self.aead_type)
            .field("key_id", &self.key_id)
            .field("key", &self.key.as_ref().map(|_| "<hidden>"))
            .finish()
    }
}

impl AeadWrapper {
    /// Creates an unconfigured wrapper
    pub fn new(opts: &WrapperOptions) -> Self {
        Self {
            logger: opts.logger.clone(),
            aead: Aes256GcmAead::new(),
            aead_type: AEAD_TYPE_AES_GCM.to_string(),
            key_id: String::new(),
            key: None,
        }
    }

    /// Sets the AES-256-GCM key directly
    pub fn set_aes_gcm_key_bytes(&mut self, key: &[u8]) -> Result<()> {
        if key.len() != AES256_KEY_SIZE {
            return Err(Error::InvalidConfig(format!(
                "AEAD key must be {} bytes, got {}",
                AES256_KEY_SIZE,
                key.len()
            )));
        }
        self.key = Some(Zeroizing::new(key.to_vec()));
        Ok(())
    }

    /// Configured AEAD algorithm name
    pub fn aead_type(&self) -> &str {
        &self.aead_type
    }

    fn key(&self) -> Result<&[u8]> {
        self.key
            .as_deref()
            .map(Vec::as_slice)
            .ok_or_else(|| Error::Crypto("key bytes not set for AEAD wrapper".into()))
    }
}

#[async_trait]
impl Wrapper for AeadWrapper {
    fn wrapper_type(&self) -> KmsType {
        KmsType::Aead
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }

    fn set_config(&mut self, config: &ConfigMap) -> Result<Option<WrapperInfo>> {
        let aead_type = lookup(config, "aead_type", &[])
            .unwrap_or_else(|| AEAD_TYPE_AES_GCM.to_string());
        if aead_type != AEAD_TYPE_AES_GCM {
            return Err(Error::InvalidConfig(format!(
                "unsupported aead_type {:?}",
                aead_type
            )));
        }

        if let Some(encoded) = lookup(config, "key", &[]) {
            let key = Zeroizing::new(
                general_purpose::STANDARD
                    .decode(encoded.trim())
                    .map_err(|e| Error::InvalidConfig(format!("error base64-decoding key: {}", e)))?,
            );
            self.set_aes_gcm_key_bytes(&key)?;
        }

        self.aead_type = aead_type;
        self.key_id = lookup(config, "key_id", &[]).unwrap_or_default();

        self.logger.debugf(format_args!(
            "configured AEAD seal: aead_type={} key_id={:?} key_set={}",
            self.aead_type,
            self.key_id,
            self.key.is_some()
        ));

        let mut info = WrapperInfo::new();
        info.insert("aead_type".to_string(), self.aead_type.clone());
        Ok(Some(info))
    }

    async fn encrypt(&self, plaintext: &[u8], aad: Option<&[u8]>) -> Result<EncryptedBlob> {
        let ciphertext = self
            .aead
            .encrypt(plaintext, self.key()?, aad.unwrap_or_default())?;
        counter!("sealwrap.wrapper.encrypt", 1, "type" => "aead");

        Ok(EncryptedBlob {
            ciphertext,
            key_info: KeyInfo {
                mechanism: KmsType::Aead.to_string(),
                key_id: self.key_id.clone(),
                wrapped_key: None,
            },
        })
    }

    async fn decrypt(&self, blob: &EncryptedBlob, aad: Option<&[u8]>) -> Result<Vec<u8>> {
        if blob.key_info.mechanism != KmsType::Aead.as_str() {
            return Err(Error::Crypto(format!(
                "blob was sealed by {}, not aead",
                blob.key_info.mechanism
            )));
        }
        counter!("sealwrap.wrapper.decrypt", 1, "type" => "aead");
        self.aead
            .decrypt(&blob.ciphertext, self.key()?, aad.unwrap_or_default())
    }

    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }
}
