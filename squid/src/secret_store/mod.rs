//! Document encryption service.
//!
//! Content locators are stored encrypted inside the descriptor. Only the
//! secret store can turn the ciphertext back into locators, and the engine
//! only asks it to after access to the asset has been granted on-chain.

use async_trait::async_trait;

use crate::error::SquidError;

pub mod mem;

pub use mem::InMemorySecretStore;

#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Encrypts `locators` under a key bound to `asset_id`.
    async fn encrypt_document(
        &self,
        asset_id: &str,
        locators: &[String],
    ) -> Result<String, SquidError>;

    async fn decrypt_document(
        &self,
        asset_id: &str,
        ciphertext: &str,
    ) -> Result<Vec<String>, SquidError>;
}
