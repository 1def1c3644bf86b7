//! Squid library crate.
//!
//! Client-side engine for publishing data assets and buying access to them
//! through on-chain service agreements:
//!
//! - identifiers and DIDs (`types`, `id`),
//! - asset descriptors and their validity rules (`ddo`),
//! - agreement templates, conditions and the purchase flow (`agreement`),
//! - one-shot ledger event listening (`events`),
//! - collaborator interfaces with HTTP and in-memory implementations
//!   (`keeper`, `aquarius`, `brizo`, `secret_store`),
//! - Prometheus-based metrics (`metrics`),
//! - and a top-level client configuration (`config`).
//!
//! [`Ocean`] ties the collaborators together and is the usual entry point.

pub mod account;
pub mod agreement;
pub mod aquarius;
pub mod brizo;
pub mod config;
pub mod ddo;
pub mod error;
pub mod events;
pub mod id;
pub mod keeper;
pub mod metrics;
pub mod ocean;
pub mod secret_store;
pub mod types;

// Re-export top-level configuration types.
pub use config::{AgreementConfig, MetricsConfig, ServiceConfig, SquidConfig};

pub use error::SquidError;

// Re-export the client context and agreement flow types.
pub use account::{Account, Balance};
pub use agreement::{
    AgreementOrchestrator, AgreementState, AssetFile, FlowHandle, ServiceAgreement, SignedOrder,
    Template,
};
pub use ocean::{Collaborators, Ocean};

// Re-export collaborator interfaces and implementations.
pub use aquarius::{AquariusClient, InMemoryRegistry, MetadataRegistry, SearchQuery};
pub use brizo::{BrizoClient, Gateway, InitializeAgreementRequest};
pub use events::{EventListener, Subscription};
pub use keeper::{
    ContractEvent, EventFilter, InMemoryLedger, KeeperCall, Ledger, LedgerError, Receipt,
};
pub use secret_store::{InMemorySecretStore, SecretStore};

pub use metrics::{AgreementMetrics, MetricsRegistry};

// Re-export domain types at the crate root for convenience.
pub use ddo::{Ddo, MetaData, MetaDataBase, ServiceType};
pub use types::*;
