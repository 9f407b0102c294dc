// Shared fixtures for the integration tests
#![allow(dead_code, clippy::unwrap_used)]

use async_trait::async_trait;
use sealwrap::{Error, KeyClient, Kms, KmsType, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// 32 zero bytes, base64 encoded
pub const AEAD_KEY_B64: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";

/// Smallest configuration each built-in seal accepts
pub fn minimal_kms(kms_type: KmsType) -> Kms {
    let kms = Kms::new(kms_type.clone());
    match kms_type {
        KmsType::Aead => kms.with_config("key", AEAD_KEY_B64),
        KmsType::AliCloudKms => kms
            .with_config("region", "cn-hangzhou")
            .with_config("kms_key_id", "08c33a6f-4e0a-4a1b-a3fa-7ddf0f7ea86b"),
        KmsType::AwsKms => kms
            .with_config("region", "us-west-2")
            .with_config("kms_key_id", "alias/vault-seal"),
        KmsType::AzureKeyVault => kms
            .with_config("environment", "AzurePublicCloud")
            .with_config("vault_name", "seal-vault")
            .with_config("key_name", "unseal-key"),
        KmsType::GcpCkms => kms
            .with_config("project", "vault-project")
            .with_config("region", "global")
            .with_config("key_ring", "vault-keyring")
            .with_config("crypto_key", "vault-key"),
        KmsType::OciKms => kms
            .with_config("key_id", "ocid1.key.oc1.iad.example")
            .with_config("crypto_endpoint", "https://example-crypto.kms.us-ashburn-1.oraclecloud.com")
            .with_config(
                "management_endpoint",
                "https://example-management.kms.us-ashburn-1.oraclecloud.com",
            ),
        KmsType::Transit => kms
            .with_config("address", "https://vault.example.com:8200")
            .with_config("mount_path", "transit/")
            .with_config("key_name", "autounseal"),
        _ => kms,
    }
}

/// Every seal type the default configurator supports
pub fn supported_types() -> Vec<KmsType> {
    vec![
        KmsType::Aead,
        KmsType::AliCloudKms,
        KmsType::AwsKms,
        KmsType::AzureKeyVault,
        KmsType::GcpCkms,
        KmsType::OciKms,
        KmsType::Transit,
    ]
}

/// In-memory remote key service: one XOR pad per key id
#[derive(Debug, Default)]
pub struct InMemoryKeyClient {
    pads: Mutex<HashMap<String, u8>>,
}

impl InMemoryKeyClient {
    pub fn with_key(key_id: &str, pad: u8) -> Self {
        let client = Self::default();
        client.pads.lock().unwrap().insert(key_id.to_string(), pad);
        client
    }

    fn apply(&self, key_id: &str, data: &[u8]) -> Result<Vec<u8>> {
        let pads = self.pads.lock().unwrap();
        let pad = pads
            .get(key_id)
            .ok_or_else(|| Error::KeyNotFound(key_id.to_string()))?;
        Ok(data.iter().map(|b| b ^ pad).collect())
    }
}

#[async_trait]
impl KeyClient for InMemoryKeyClient {
    async fn encrypt(&self, key_id: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.apply(key_id, plaintext)
    }

    async fn decrypt(&self, key_id: &str, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.apply(key_id, ciphertext)
    }
}

/// Remote key service that fails every call with the same error
#[derive(Debug)]
pub struct RejectingKeyClient {
    error: fn() -> Error,
    calls: AtomicUsize,
}

impl RejectingKeyClient {
    pub fn new(error: fn() -> Error) -> Self {
        Self {
            error,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn reject(&self) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err((self.error)())
    }
}

#[async_trait]
impl KeyClient for RejectingKeyClient {
    async fn encrypt(&self, _key_id: &str, _plaintext: &[u8]) -> Result<Vec<u8>> {
        self.reject()
    }

    async fn decrypt(&self, _key_id: &str, _ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.reject()
    }
}

pub fn key_not_found() -> Error {
    Error::KeyNotFound("seal key".into())
}

pub fn invalid_credentials() -> Error {
    Error::Credentials("invalid credentials".into())
}
