//! Local cryptographic primitives used by the seal wrappers

pub mod aes256gcm;

pub use aes256gcm::{Aes256GcmAead, AES256_KEY_SIZE};

use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroizing;

/// Fills a buffer with random bytes using a cryptographically secure RNG
pub fn fill_random(buffer: &mut [u8]) {
    OsRng.fill_bytes(buffer);
}

/// Generates a fresh AES-256 key that is wiped when dropped
pub fn generate_key() -> Zeroizing<Vec<u8>> {
    let mut key = Zeroizing::new(vec![0_u8; AES256_KEY_SIZE]);
    fill_random(&mut key);
    key
}
