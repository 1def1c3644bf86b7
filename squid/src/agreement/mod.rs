//! Service agreements.
//!
//! This module contains:
//!
//! - condition records (`condition`) and the templates that produce them
//!   (`template`),
//! - the agreement digest signed by the consumer (`signature`),
//! - observable flow state and handles (`state`),
//! - the [`AgreementOrchestrator`] that drives purchase and delivery.

use serde::Serialize;

use crate::types::{Address, AgreementId, Did, Hash256};

pub mod condition;
pub mod orchestrator;
pub mod signature;
pub mod state;
pub mod template;

pub use condition::{ActorType, Condition, ConditionEvent, EventHandler, Parameter};
pub use orchestrator::{AgreementOrchestrator, AssetFile, SignedOrder};
pub use state::{AgreementState, FlowHandle};
pub use template::Template;

/// One agreement between a consumer and the publisher of an asset.
///
/// `conditions` is the list copied from the descriptor at signing time; it
/// is what the signature covers.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAgreement {
    pub agreement_id: AgreementId,
    pub did: Did,
    pub service_definition_id: String,
    pub template_id: String,
    pub consumer: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<Address>,
    pub conditions: Vec<Condition>,
}

impl ServiceAgreement {
    pub fn digest(&self) -> Hash256 {
        signature::agreement_digest(self)
    }

    pub fn value_hashes(&self) -> Vec<Hash256> {
        signature::value_hashes(&self.conditions)
    }

    pub fn timeouts(&self) -> Vec<u64> {
        signature::timeouts(&self.conditions)
    }
}
