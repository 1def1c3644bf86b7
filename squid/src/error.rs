use std::time::Duration;

use thiserror::Error;

use crate::ddo::ServiceType;
use crate::keeper::LedgerError;

/// Errors surfaced by the agreement engine and its collaborators.
#[derive(Debug, Error)]
pub enum SquidError {
    #[error("invalid DID format: {0:?}")]
    InvalidDidFormat(String),

    #[error("invalid agreement id: {0:?}")]
    InvalidAgreementId(String),

    #[error("invalid signature encoding: {0}")]
    InvalidSignature(String),

    /// The descriptor has no service of the requested type.
    #[error("descriptor {did} has no {service_type} service")]
    ServiceNotFound {
        did: String,
        service_type: ServiceType,
    },

    /// Client-side fast-fail: the consumer cannot cover the asset price.
    #[error("insufficient balance: price {price}, balance {balance}")]
    InsufficientBalance { price: u64, balance: u64 },

    #[error("cannot resolve template {template}: {reason}")]
    TemplateResolution { template: String, reason: String },

    /// An off-chain service (registry, gateway) failed or answered non-2xx.
    #[error("remote service unavailable: {0}")]
    RemoteUnavailable(String),

    /// The event subscription broke before delivering an event.
    #[error("subscription to {contract}.{event} failed: {reason}")]
    SubscriptionTransport {
        contract: String,
        event: String,
        reason: String,
    },

    #[error("descriptor not found: {0}")]
    DescriptorNotFound(String),

    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("secret store error: {0}")]
    Encryption(String),

    #[error("timed out after {waited:?} waiting for {what}")]
    Timeout { waited: Duration, what: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),
}
