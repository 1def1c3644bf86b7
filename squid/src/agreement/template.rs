//! Agreement templates and the condition graph they expand into.
//!
//! A template is a fixed, ordered list of condition methods. Expanding it
//! for a concrete asset binds every method parameter to a value (asset id,
//! price, document key id), which yields the [`Condition`] list embedded in
//! the descriptor and signed by the consumer.

use serde_json::{Value, json};

use super::condition::{ActorType, Condition, ConditionEvent, EventHandler, Parameter};
use crate::ddo::{MetaData, ServiceAgreementContract};
use crate::error::SquidError;
use crate::keeper::KeeperCall;
use crate::types::Hash256;

/// Contract that executes agreements for every template.
pub const AGREEMENT_CONTRACT: &str = "ServiceAgreement";

/// Handler version written into condition events.
const HANDLER_VERSION: &str = "0.1";

/// Agreement templates known to the engine.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Template {
    Access,
    Compute,
}

#[derive(Clone, Copy, Debug)]
enum ParamSource {
    AssetId,
    Price,
    DocumentKeyId,
}

#[derive(Debug)]
struct ParamSpec {
    name: &'static str,
    param_type: &'static str,
    source: ParamSource,
}

#[derive(Debug)]
struct EventSpec {
    name: &'static str,
    actor: ActorType,
    module: &'static str,
    function: &'static str,
}

#[derive(Debug)]
struct MethodDef {
    name: &'static str,
    contract_name: &'static str,
    function_name: &'static str,
    timeout: u64,
    parameters: &'static [ParamSpec],
    events: &'static [EventSpec],
    dependencies: &'static [&'static str],
    is_terminal: bool,
}

const LOCK_PAYMENT: MethodDef = MethodDef {
    name: "lockPayment",
    contract_name: "PaymentConditions",
    function_name: "lockPayment",
    timeout: 0,
    parameters: &[
        ParamSpec {
            name: "assetId",
            param_type: "bytes32",
            source: ParamSource::AssetId,
        },
        ParamSpec {
            name: "price",
            param_type: "uint256",
            source: ParamSource::Price,
        },
    ],
    events: &[EventSpec {
        name: "PaymentLocked",
        actor: ActorType::Publisher,
        module: "accessControl",
        function: "grantAccess",
    }],
    dependencies: &[],
    is_terminal: false,
};

const ACCESS_METHODS: &[MethodDef] = &[
    LOCK_PAYMENT,
    MethodDef {
        name: "grantAccess",
        contract_name: "AccessConditions",
        function_name: "grantAccess",
        timeout: 10,
        parameters: &[
            ParamSpec {
                name: "assetId",
                param_type: "bytes32",
                source: ParamSource::AssetId,
            },
            ParamSpec {
                name: "documentKeyId",
                param_type: "bytes32",
                source: ParamSource::DocumentKeyId,
            },
        ],
        events: &[
            EventSpec {
                name: "AccessGranted",
                actor: ActorType::Publisher,
                module: "payment",
                function: "releasePayment",
            },
            EventSpec {
                name: "AccessGranted",
                actor: ActorType::Consumer,
                module: "consumer",
                function: "consumeService",
            },
        ],
        dependencies: &["lockPayment"],
        is_terminal: true,
    },
];

const COMPUTE_METHODS: &[MethodDef] = &[
    LOCK_PAYMENT,
    MethodDef {
        name: "grantCompute",
        contract_name: "ComputeConditions",
        function_name: "grantCompute",
        timeout: 10,
        parameters: &[ParamSpec {
            name: "assetId",
            param_type: "bytes32",
            source: ParamSource::AssetId,
        }],
        events: &[
            EventSpec {
                name: "ComputeGranted",
                actor: ActorType::Publisher,
                module: "payment",
                function: "releasePayment",
            },
            EventSpec {
                name: "ComputeGranted",
                actor: ActorType::Consumer,
                module: "consumer",
                function: "startCompute",
            },
        ],
        dependencies: &["lockPayment"],
        is_terminal: true,
    },
];

impl Template {
    pub fn name(&self) -> &'static str {
        match self {
            Template::Access => "Access",
            Template::Compute => "Compute",
        }
    }

    fn methods(&self) -> &'static [MethodDef] {
        match self {
            Template::Access => ACCESS_METHODS,
            Template::Compute => COMPUTE_METHODS,
        }
    }

    /// Deterministic template id: digest of the template name.
    pub fn id(&self) -> String {
        Hash256::compute(self.name().as_bytes()).to_hex()
    }

    /// Operator combining the terminal conditions (1 = all must hold).
    pub fn fulfillment_operator(&self) -> u8 {
        1
    }

    /// Function name of the condition that gates delivery.
    pub fn delivery_condition(&self) -> &'static str {
        match self {
            Template::Access => "grantAccess",
            Template::Compute => "grantCompute",
        }
    }

    /// Description of the contract that executes agreements of this
    /// template. Its first event is what the consumer waits on before
    /// paying.
    pub fn agreement_contract(&self) -> ServiceAgreementContract {
        ServiceAgreementContract {
            contract_name: AGREEMENT_CONTRACT.to_string(),
            fulfillment_operator: self.fulfillment_operator(),
            events: vec![ConditionEvent {
                name: "ExecuteAgreement".to_string(),
                actor_type: ActorType::Consumer,
                handler: EventHandler {
                    module_name: "payment".to_string(),
                    function_name: "lockPayment".to_string(),
                    version: HANDLER_VERSION.to_string(),
                },
            }],
        }
    }

    pub fn condition_key(&self, contract_name: &str, function_name: &str) -> Hash256 {
        Hash256::compute_fields([self.id().as_str(), contract_name, function_name])
    }

    /// Expands the template for one asset.
    ///
    /// Fails when the price is missing or zero, or when `asset_id` is empty.
    pub fn build_conditions(
        &self,
        metadata: &MetaData,
        asset_id: &str,
    ) -> Result<Vec<Condition>, SquidError> {
        let price = match metadata.price() {
            Some(p) if p > 0 => p,
            Some(_) => return Err(self.resolution_error("price must be greater than zero")),
            None => return Err(self.resolution_error("metadata has no price")),
        };
        if asset_id.is_empty() {
            return Err(self.resolution_error("asset id is empty"));
        }

        let methods = self.methods();
        let conditions = methods
            .iter()
            .enumerate()
            .map(|(index, def)| {
                let parameters = def
                    .parameters
                    .iter()
                    .map(|p| Parameter {
                        name: p.name.to_string(),
                        param_type: p.param_type.to_string(),
                        value: bind(p.source, asset_id, price),
                    })
                    .collect();

                let events = def
                    .events
                    .iter()
                    .map(|e| ConditionEvent {
                        name: e.name.to_string(),
                        actor_type: e.actor,
                        handler: EventHandler {
                            module_name: e.module.to_string(),
                            function_name: e.function.to_string(),
                            version: HANDLER_VERSION.to_string(),
                        },
                    })
                    .collect();

                Condition {
                    name: def.name.to_string(),
                    timeout: def.timeout,
                    condition_key: self
                        .condition_key(def.contract_name, def.function_name)
                        .to_hex(),
                    contract_name: def.contract_name.to_string(),
                    function_name: def.function_name.to_string(),
                    index: index as u32,
                    parameters,
                    events,
                    dependencies: def.dependencies.iter().map(|d| d.to_string()).collect(),
                    dependency_timeout_flags: vec![0; def.dependencies.len()],
                    is_terminal_condition: def.is_terminal,
                }
            })
            .collect();

        Ok(conditions)
    }

    /// Ledger call that registers this template.
    pub fn setup_call(&self) -> KeeperCall {
        let methods = self.methods();
        let position = |name: &str| methods.iter().position(|m| m.name == name);

        let dependencies = methods
            .iter()
            .map(|m| {
                m.dependencies
                    .iter()
                    .filter_map(|d| position(*d))
                    .fold(0u32, |mask, i| mask | (1 << i))
            })
            .collect();

        let fulfillment_indices = methods
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_terminal)
            .map(|(i, _)| i as u32)
            .collect();

        KeeperCall::SetupAgreementTemplate {
            template_id: self.id(),
            contract_names: methods
                .iter()
                .map(|m| m.contract_name.to_string())
                .collect(),
            fingerprints: methods.iter().map(fingerprint).collect(),
            dependencies,
            fulfillment_indices,
            fulfillment_operator: self.fulfillment_operator(),
        }
    }

    fn resolution_error(&self, reason: &str) -> SquidError {
        SquidError::TemplateResolution {
            template: self.name().to_string(),
            reason: reason.to_string(),
        }
    }
}

fn bind(source: ParamSource, asset_id: &str, price: u64) -> Value {
    match source {
        ParamSource::AssetId | ParamSource::DocumentKeyId => json!(asset_id),
        ParamSource::Price => json!(price),
    }
}

/// Four-byte selector of the method's signature, `0x`-prefixed.
fn fingerprint(def: &MethodDef) -> String {
    let types: Vec<&str> = std::iter::once("bytes32")
        .chain(def.parameters.iter().map(|p| p.param_type))
        .collect();
    let signature = format!("{}({})", def.function_name, types.join(","));
    let digest = Hash256::compute(signature.as_bytes());
    format!("0x{}", hex::encode(&digest.as_bytes()[..4]))
}
