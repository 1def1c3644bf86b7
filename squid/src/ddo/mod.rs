//! Asset descriptors (DDOs).
//!
//! A [`Ddo`] describes one asset: its DID, the publisher's keys and the
//! services through which the asset is offered. Descriptors are validated
//! both when constructed in code and when deserialized from the registry,
//! so a `Ddo` value always satisfies:
//!
//! - service definition ids are unique,
//! - exactly one "Metadata" service exists,
//! - at most one "Access" service exists,
//! - agreement conditions are index-ordered and only depend on earlier ones.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::agreement::condition::{Condition, ConditionEvent};
use crate::error::SquidError;
use crate::types::Did;

pub mod builder;
pub mod metadata;
pub mod validity;

pub use builder::{AssetDescriptor, ServiceEndpoints};
pub use metadata::{AdditionalInformation, Curation, MetaData, MetaDataBase, StructuredMarkup};
use validity::DescriptorValidity;

/// JSON-LD context stamped on every descriptor.
pub const DDO_CONTEXT: &str = "https://w3id.org/future-method/v1";

/// Service definition ids assigned at registration.
pub const ACCESS_SERVICE_ID: &str = "0";
pub const COMPUTE_SERVICE_ID: &str = "1";
pub const METADATA_SERVICE_ID: &str = "2";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ServiceType {
    Access,
    Compute,
    Metadata,
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceType::Access => "Access",
            ServiceType::Compute => "Compute",
            ServiceType::Metadata => "Metadata",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKey {
    pub id: String,
    #[serde(rename = "type")]
    pub key_type: String,
    pub owner: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_base58: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authentication {
    #[serde(rename = "type")]
    pub auth_type: String,
    pub public_key: String,
}

/// Contract that executes the agreement, plus the events it emits.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAgreementContract {
    pub contract_name: String,
    pub fulfillment_operator: u8,
    pub events: Vec<ConditionEvent>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessService {
    pub service_definition_id: String,
    pub service_endpoint: String,
    pub purchase_endpoint: String,
    pub template_id: String,
    pub service_agreement_contract: ServiceAgreementContract,
    pub conditions: Vec<Condition>,
}

impl AccessService {
    /// Condition implemented by `function_name` (e.g. `grantAccess`).
    pub fn condition(&self, function_name: &str) -> Option<&Condition> {
        self.conditions
            .iter()
            .find(|c| c.function_name == function_name)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeService {
    pub service_definition_id: String,
    pub service_endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_agreement_contract: Option<ServiceAgreementContract>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataService {
    pub service_definition_id: String,
    pub service_endpoint: String,
    pub metadata: MetaData,
}

/// One service offered by an asset, tagged by `type` on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Service {
    Access(AccessService),
    Compute(ComputeService),
    Metadata(MetadataService),
}

impl Service {
    pub fn service_type(&self) -> ServiceType {
        match self {
            Service::Access(_) => ServiceType::Access,
            Service::Compute(_) => ServiceType::Compute,
            Service::Metadata(_) => ServiceType::Metadata,
        }
    }

    pub fn service_definition_id(&self) -> &str {
        match self {
            Service::Access(s) => &s.service_definition_id,
            Service::Compute(s) => &s.service_definition_id,
            Service::Metadata(s) => &s.service_definition_id,
        }
    }

    pub fn service_endpoint(&self) -> &str {
        match self {
            Service::Access(s) => &s.service_endpoint,
            Service::Compute(s) => &s.service_endpoint,
            Service::Metadata(s) => &s.service_endpoint,
        }
    }

    /// Agreement conditions, empty for services without an agreement.
    pub fn conditions(&self) -> &[Condition] {
        match self {
            Service::Access(s) => &s.conditions,
            Service::Compute(s) => &s.conditions,
            Service::Metadata(_) => &[],
        }
    }
}

/// Validated asset descriptor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDdo", into = "RawDdo")]
pub struct Ddo {
    context: String,
    id: Did,
    public_key: Vec<PublicKey>,
    authentication: Vec<Authentication>,
    services: Vec<Service>,
    created: Option<String>,
}

impl Ddo {
    /// Builds a descriptor, rejecting service sets that break the
    /// descriptor invariants.
    pub fn new(
        id: Did,
        public_key: Vec<PublicKey>,
        authentication: Vec<Authentication>,
        services: Vec<Service>,
    ) -> Result<Self, SquidError> {
        DescriptorValidity.validate(&services)?;
        Ok(Self {
            context: DDO_CONTEXT.to_string(),
            id,
            public_key,
            authentication,
            services,
            created: None,
        })
    }

    pub fn with_created(mut self, created: impl Into<String>) -> Self {
        self.created = Some(created.into());
        self
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn id(&self) -> &Did {
        &self.id
    }

    pub fn public_key(&self) -> &[PublicKey] {
        &self.public_key
    }

    pub fn authentication(&self) -> &[Authentication] {
        &self.authentication
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }

    pub fn created(&self) -> Option<&str> {
        self.created.as_deref()
    }

    pub fn find_service_by_id(&self, service_definition_id: &str) -> Option<&Service> {
        self.services
            .iter()
            .find(|s| s.service_definition_id() == service_definition_id)
    }

    pub fn find_service_by_type(&self, service_type: ServiceType) -> Option<&Service> {
        self.services
            .iter()
            .find(|s| s.service_type() == service_type)
    }

    pub fn access_service(&self) -> Option<&AccessService> {
        self.services.iter().find_map(|s| match s {
            Service::Access(a) => Some(a),
            _ => None,
        })
    }

    pub fn compute_service(&self) -> Option<&ComputeService> {
        self.services.iter().find_map(|s| match s {
            Service::Compute(c) => Some(c),
            _ => None,
        })
    }

    pub fn metadata_service(&self) -> Option<&MetadataService> {
        self.services.iter().find_map(|s| match s {
            Service::Metadata(m) => Some(m),
            _ => None,
        })
    }

    /// Metadata of the asset. Always present on a validated descriptor.
    pub fn metadata(&self) -> Option<&MetaData> {
        self.metadata_service().map(|m| &m.metadata)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDdo {
    #[serde(rename = "@context", default = "default_context")]
    context: String,
    id: Did,
    #[serde(default)]
    public_key: Vec<PublicKey>,
    #[serde(default)]
    authentication: Vec<Authentication>,
    #[serde(default)]
    service: Vec<Service>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created: Option<String>,
}

fn default_context() -> String {
    DDO_CONTEXT.to_string()
}

impl TryFrom<RawDdo> for Ddo {
    type Error = SquidError;

    fn try_from(raw: RawDdo) -> Result<Self, Self::Error> {
        DescriptorValidity.validate(&raw.service)?;
        Ok(Ddo {
            context: raw.context,
            id: raw.id,
            public_key: raw.public_key,
            authentication: raw.authentication,
            services: raw.service,
            created: raw.created,
        })
    }
}

impl From<Ddo> for RawDdo {
    fn from(ddo: Ddo) -> Self {
        RawDdo {
            context: ddo.context,
            id: ddo.id,
            public_key: ddo.public_key,
            authentication: ddo.authentication,
            service: ddo.services,
            created: ddo.created,
        }
    }
}
