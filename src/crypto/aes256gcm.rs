use super::fill_random;
use crate::error::{Error, Result};
use aes_gcm::{
    aead::{Aead as _, KeyInit, Payload},
    Aes256Gcm, Key as AesKey, Nonce,
};

/// Size of an AES-256 key in bytes
pub const AES256_KEY_SIZE: usize = 32;

// Constants for GCM mode
const GCM_BLOCK_SIZE: usize = 16;
pub(crate) const GCM_NONCE_SIZE: usize = 12;
pub(crate) const GCM_TAG_SIZE: usize = 16;

// Maximum message size supported by GCM
// ((1 << 32) - 2) * GCM_BLOCK_SIZE
const GCM_MAX_DATA_SIZE: u64 = ((1 << 32) - 2) * GCM_BLOCK_SIZE as u64;

/// AES-256-GCM with a random nonce prepended to the ciphertext
#[derive(Default, Debug, Clone, Copy)]
pub struct Aes256GcmAead;

impl Aes256GcmAead {
    /// Creates a new instance of the AES-256-GCM AEAD implementation
    pub fn new() -> Self {
        Self
    }

    fn cipher(key: &[u8]) -> Result<Aes256Gcm> {
        if key.len() != AES256_KEY_SIZE {
            return Err(Error::Crypto(format!(
                "invalid key size {}, must be {} bytes",
                key.len(),
                AES256_KEY_SIZE
            )));
        }
        Ok(Aes256Gcm::new(AesKey::<Aes256Gcm>::from_slice(key)))
    }

    /// Encrypts `data` under `key`, authenticating `aad` alongside it.
    ///
    /// Output layout is `nonce || ciphertext || tag`.
    pub fn encrypt(&self, data: &[u8], key: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        if data.len() as u64 > GCM_MAX_DATA_SIZE {
            return Err(Error::Crypto("Data too large for GCM".into()));
        }

        let cipher = Self::cipher(key)?;

        let mut nonce_and_cipher = vec![0_u8; GCM_NONCE_SIZE];
        fill_random(&mut nonce_and_cipher);
        let nonce = Nonce::from_slice(&nonce_and_cipher);

        let ciphertext = cipher
            .encrypt(nonce, Payload { msg: data, aad })
            .map_err(|e| Error::Crypto(format!("Encryption failed: {}", e)))?;

        nonce_and_cipher.extend_from_slice(&ciphertext);
        Ok(nonce_and_cipher)
    }

    /// Reverses [`encrypt`](Self::encrypt); fails if `aad` differs from the one used to seal
    pub fn decrypt(&self, data: &[u8], key: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        if data.len() < GCM_NONCE_SIZE + GCM_TAG_SIZE {
            // Must have at least nonce and tag
            return Err(Error::Crypto(
                "Data length is too short for GCM (nonce + tag)".into(),
            ));
        }

        let cipher = Self::cipher(key)?;
        let (nonce, ciphertext) = data.split_at(GCM_NONCE_SIZE);

        cipher
            .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext, aad })
            .map_err(|e| Error::Crypto(format!("Decryption failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_with_aad() {
        let aead = Aes256GcmAead::new();
        let key = [7_u8; AES256_KEY_SIZE];

        let sealed = aead.encrypt(b"root token", &key, b"barrier").unwrap();
        assert_eq!(sealed.len(), GCM_NONCE_SIZE + 10 + GCM_TAG_SIZE);
        assert_eq!(aead.decrypt(&sealed, &key, b"barrier").unwrap(), b"root token");
        assert!(aead.decrypt(&sealed, &key, b"recovery").is_err());
    }

    #[test]
    fn test_nonce_is_random() {
        let aead = Aes256GcmAead::new();
        let key = [1_u8; AES256_KEY_SIZE];
        let a = aead.encrypt(b"same", &key, &[]).unwrap();
        let b = aead.encrypt(b"same", &key, &[]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_rejects_bad_key_size_and_short_input() {
        let aead = Aes256GcmAead::new();
        assert!(matches!(
            aead.encrypt(b"data", &[0_u8; 16], &[]),
            Err(Error::Crypto(_))
        ));
        assert!(matches!(
            aead.decrypt(&[0_u8; GCM_NONCE_SIZE], &[0_u8; AES256_KEY_SIZE], &[]),
            Err(Error::Crypto(_))
        ));
    }
}
