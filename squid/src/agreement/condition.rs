//! On-chain condition records as embedded in the "Access" service.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Hash256;

/// Side of the agreement an event handler runs on.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorType {
    Consumer,
    Publisher,
}

/// Module/function invoked when a condition event fires.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventHandler {
    pub module_name: String,
    pub function_name: String,
    pub version: String,
}

/// An event a condition's contract emits, and who reacts to it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionEvent {
    pub name: String,
    pub actor_type: ActorType,
    pub handler: EventHandler,
}

/// A bound parameter of a condition's contract function.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    pub value: Value,
}

/// One step of an agreement.
///
/// `dependencies` name earlier conditions of the same agreement; the ledger
/// will not fulfil this condition before those are fulfilled.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub name: String,
    pub timeout: u64,
    pub condition_key: String,
    pub contract_name: String,
    pub function_name: String,
    pub index: u32,
    pub parameters: Vec<Parameter>,
    pub events: Vec<ConditionEvent>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub dependency_timeout_flags: Vec<u8>,
    #[serde(default)]
    pub is_terminal_condition: bool,
}

impl Condition {
    /// Hash of the bound parameter values, in declaration order.
    pub fn value_hash(&self) -> Hash256 {
        Hash256::compute_fields(
            self.parameters
                .iter()
                .flat_map(|p| [p.param_type.clone(), value_text(&p.value)]),
        )
    }

    /// First event handled on the consumer side, if any.
    pub fn consumer_event(&self) -> Option<&ConditionEvent> {
        self.events
            .iter()
            .find(|e| e.actor_type == ActorType::Consumer)
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
