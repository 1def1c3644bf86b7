//! Ledger accounts as seen by a client.

use std::fmt;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::info;

use crate::error::SquidError;
use crate::keeper::{KeeperCall, Ledger, Receipt};
use crate::types::Address;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Balance {
    /// Native currency, in the ledger's smallest unit.
    pub native: u128,
    pub token: u64,
}

/// An address plus the ledger it lives on.
///
/// [`Account::balance`] caches the first lookup; the individual balance
/// getters always query the ledger.
pub struct Account {
    address: Address,
    ledger: Arc<dyn Ledger>,
    balance: OnceCell<Balance>,
}

impl Account {
    pub fn new(address: Address, ledger: Arc<dyn Ledger>) -> Self {
        Self {
            address,
            ledger,
            balance: OnceCell::new(),
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub async fn token_balance(&self) -> Result<u64, SquidError> {
        Ok(self.ledger.token_balance(&self.address).await?)
    }

    pub async fn native_balance(&self) -> Result<u128, SquidError> {
        Ok(self.ledger.native_balance(&self.address).await?)
    }

    pub async fn balance(&self) -> Result<Balance, SquidError> {
        self.balance
            .get_or_try_init(|| async {
                Ok::<_, SquidError>(Balance {
                    native: self.native_balance().await?,
                    token: self.token_balance().await?,
                })
            })
            .await
            .copied()
    }

    pub async fn public_key(&self) -> Result<String, SquidError> {
        Ok(self.ledger.public_key(&self.address).await?)
    }

    /// Asks the token faucet for `amount` tokens.
    pub async fn request_tokens(&self, amount: u64) -> Result<Receipt, SquidError> {
        let receipt = self
            .ledger
            .send(&self.address, KeeperCall::RequestTokens { amount })
            .await?;
        info!(account = %self.address, amount, "tokens requested");
        Ok(receipt)
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("address", &self.address)
            .field("balance", &self.balance.get())
            .finish()
    }
}
