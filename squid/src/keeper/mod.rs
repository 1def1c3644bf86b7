//! Ledger ("keeper") abstraction.
//!
//! The agreement engine never talks to a blockchain node directly. All it
//! needs from the ledger is captured by the [`Ledger`] trait: account
//! listing, balances, signing a digest under an account, submitting a typed
//! contract call and subscribing to contract events.
//!
//! [`mem::InMemoryLedger`] is a deterministic implementation used by tests
//! and the demo binary. It emits the same events a deployed set of contracts
//! would, so the orchestrator can be driven end to end without a node.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::{Address, AgreementId, Hash256, Signature};

pub mod mem;

pub use mem::{InMemoryLedger, SentCall};

/// Failure reported by a ledger implementation.
#[derive(Clone, Debug, Error)]
pub enum LedgerError {
    #[error("unknown account {0}")]
    UnknownAccount(Address),

    /// The contract rejected the call.
    #[error("{contract}.{method} reverted: {reason}")]
    Reverted {
        contract: String,
        method: String,
        reason: String,
    },

    #[error("ledger transport error: {0}")]
    Transport(String),
}

/// One decoded contract event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractEvent {
    pub contract: String,
    pub name: String,
    pub return_values: Map<String, Value>,
    pub block_number: u64,
}

impl ContractEvent {
    /// Returns a string-valued return field, if present.
    pub fn str_value(&self, key: &str) -> Option<&str> {
        self.return_values.get(key).and_then(Value::as_str)
    }
}

/// Equality filter over event return values.
///
/// An empty filter matches every event of the subscribed name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventFilter(BTreeMap<String, Value>);

impl EventFilter {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn matches(&self, event: &ContractEvent) -> bool {
        self.0
            .iter()
            .all(|(k, v)| event.return_values.get(k) == Some(v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Contract calls the engine knows how to submit.
#[derive(Clone, Debug, PartialEq)]
pub enum KeeperCall {
    /// Consumer escrows `price` tokens for the agreement.
    LockPayment {
        agreement_id: AgreementId,
        asset_id: String,
        price: u64,
    },
    /// Publisher executes a consumer-signed agreement.
    ExecuteAgreement {
        template_id: String,
        signature: Signature,
        consumer: Address,
        value_hashes: Vec<Hash256>,
        timeouts: Vec<u64>,
        agreement_id: AgreementId,
        did_id: String,
    },
    SetupAgreementTemplate {
        template_id: String,
        contract_names: Vec<String>,
        fingerprints: Vec<String>,
        dependencies: Vec<u32>,
        fulfillment_indices: Vec<u32>,
        fulfillment_operator: u8,
    },
    RegisterAttribute {
        did_id: String,
        value_type: String,
        key: String,
        value: String,
    },
    RequestTokens { amount: u64 },
    GrantAccess {
        agreement_id: AgreementId,
        asset_id: String,
        document_key_id: String,
    },
}

impl KeeperCall {
    pub fn contract_name(&self) -> &'static str {
        match self {
            KeeperCall::LockPayment { .. } => "PaymentConditions",
            KeeperCall::ExecuteAgreement { .. } | KeeperCall::SetupAgreementTemplate { .. } => {
                "ServiceAgreement"
            }
            KeeperCall::RegisterAttribute { .. } => "DIDRegistry",
            KeeperCall::RequestTokens { .. } => "OceanMarket",
            KeeperCall::GrantAccess { .. } => "AccessConditions",
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            KeeperCall::LockPayment { .. } => "lockPayment",
            KeeperCall::ExecuteAgreement { .. } => "executeAgreement",
            KeeperCall::SetupAgreementTemplate { .. } => "setupAgreementTemplate",
            KeeperCall::RegisterAttribute { .. } => "registerAttribute",
            KeeperCall::RequestTokens { .. } => "requestTokens",
            KeeperCall::GrantAccess { .. } => "grantAccess",
        }
    }
}

/// Result of a successful submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_hash: String,
    pub block_number: u64,
    pub status: bool,
}

/// Stream of events matching one subscription.
pub type EventStream = BoxStream<'static, Result<ContractEvent, LedgerError>>;

/// Everything the engine needs from the on-chain side.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn accounts(&self) -> Result<Vec<Address>, LedgerError>;

    async fn native_balance(&self, account: &Address) -> Result<u128, LedgerError>;

    async fn token_balance(&self, account: &Address) -> Result<u64, LedgerError>;

    async fn public_key(&self, account: &Address) -> Result<String, LedgerError>;

    /// Signs `digest` under `account`'s key.
    async fn sign(&self, account: &Address, digest: &Hash256) -> Result<Signature, LedgerError>;

    /// Submits `call` as a transaction from `from`.
    async fn send(&self, from: &Address, call: KeeperCall) -> Result<Receipt, LedgerError>;

    /// Streams events named `event` on `contract` that match `filter`,
    /// starting from the moment of subscription.
    async fn subscribe(
        &self,
        contract: &str,
        event: &str,
        filter: &EventFilter,
    ) -> Result<EventStream, LedgerError>;
}
