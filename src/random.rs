//! Entropy source for the secrets store
//!
//! This build always reads from the operating system CSPRNG, whatever seal is
//! configured.

use crate::config::SharedConfig;
use crate::error::Result;
use crate::Wrapper;
use rand::{rngs::OsRng, RngCore};
use std::io::{self, Read};

/// Reader over the operating system's cryptographically secure RNG
#[derive(Debug, Default, Clone, Copy)]
pub struct SecureRandomReader {
    rng: OsRng,
}

impl SecureRandomReader {
    /// Creates a reader over the OS RNG
    pub fn new() -> Self {
        Self { rng: OsRng }
    }
}

impl Read for SecureRandomReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.rng
            .try_fill_bytes(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(buf.len())
    }
}

/// Returns the random source the secrets store should draw from.
///
/// The configuration and the wrapper are accepted so callers do not need to
/// know whether a build derives entropy from the seal; this one never does.
pub fn create_secure_random_reader(
    _conf: &SharedConfig,
    _wrapper: Option<&dyn Wrapper>,
) -> Result<Box<dyn Read + Send>> {
    Ok(Box::new(SecureRandomReader::new()))
}
