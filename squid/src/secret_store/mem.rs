//! In-memory secret store.
//!
//! Each asset gets a random 256-bit key on first encryption. Documents are
//! XORed with a BLAKE3 keyed-XOF keystream and hex encoded. This is a test
//! double: it does not authenticate ciphertexts and keys never leave the
//! process.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::SecretStore;
use crate::error::SquidError;

const KEYSTREAM_CONTEXT: &[u8] = b"squid document keystream";

#[derive(Default)]
pub struct InMemorySecretStore {
    keys: Mutex<HashMap<String, [u8; 32]>>,
    encrypt_calls: AtomicUsize,
    decrypt_calls: AtomicUsize,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn encrypt_calls(&self) -> usize {
        self.encrypt_calls.load(Ordering::SeqCst)
    }

    pub fn decrypt_calls(&self) -> usize {
        self.decrypt_calls.load(Ordering::SeqCst)
    }

    fn key_for(&self, asset_id: &str, create: bool) -> Option<[u8; 32]> {
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        if create {
            let key = keys.entry(asset_id.to_owned()).or_insert_with(rand::random);
            Some(*key)
        } else {
            keys.get(asset_id).copied()
        }
    }
}

fn apply_keystream(key: &[u8; 32], data: &mut [u8]) {
    let mut hasher = blake3::Hasher::new_keyed(key);
    hasher.update(KEYSTREAM_CONTEXT);
    let mut stream = vec![0u8; data.len()];
    hasher.finalize_xof().fill(&mut stream);
    for (byte, k) in data.iter_mut().zip(stream) {
        *byte ^= k;
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn encrypt_document(
        &self,
        asset_id: &str,
        locators: &[String],
    ) -> Result<String, SquidError> {
        self.encrypt_calls.fetch_add(1, Ordering::SeqCst);
        let key = self
            .key_for(asset_id, true)
            .ok_or_else(|| SquidError::Encryption(format!("no key for asset {asset_id}")))?;

        let mut data = serde_json::to_vec(locators)
            .map_err(|e| SquidError::Encryption(format!("cannot encode document: {e}")))?;
        apply_keystream(&key, &mut data);
        Ok(format!("0x{}", hex::encode(data)))
    }

    async fn decrypt_document(
        &self,
        asset_id: &str,
        ciphertext: &str,
    ) -> Result<Vec<String>, SquidError> {
        self.decrypt_calls.fetch_add(1, Ordering::SeqCst);
        let key = self
            .key_for(asset_id, false)
            .ok_or_else(|| SquidError::Encryption(format!("no key for asset {asset_id}")))?;

        let raw = ciphertext.strip_prefix("0x").unwrap_or(ciphertext);
        let mut data = hex::decode(raw)
            .map_err(|e| SquidError::Encryption(format!("ciphertext is not hex: {e}")))?;
        apply_keystream(&key, &mut data);
        serde_json::from_slice(&data)
            .map_err(|e| SquidError::Encryption(format!("cannot decode document: {e}")))
    }
}
