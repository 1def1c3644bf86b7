//! Assembly of a publisher's asset descriptor.
//!
//! Pure: everything that needs a collaborator (condition expansion,
//! content encryption, endpoint lookup) happens before, and the result is
//! handed in.

use super::{
    ACCESS_SERVICE_ID, AccessService, Authentication, COMPUTE_SERVICE_ID, ComputeService, Ddo,
    METADATA_SERVICE_ID, MetaData, MetadataService, PublicKey, Service,
};
use crate::agreement::Template;
use crate::agreement::condition::Condition;
use crate::error::SquidError;
use crate::types::{Address, Did};

pub const PUBLIC_KEY_TYPE: &str = "Ed25519VerificationKey2018";
pub const AUTHENTICATION_TYPE: &str = "RsaSignatureAuthentication2018";

/// Endpoints written into the descriptor's services.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceEndpoints {
    pub purchase: String,
    pub consume: String,
    pub compute: String,
    pub metadata: String,
}

/// Inputs of a new asset descriptor.
#[derive(Clone, Debug)]
pub struct AssetDescriptor {
    pub did: Did,
    pub publisher: Address,
    pub public_key: String,
    /// Metadata with `content_urls` already replaced by the ciphertext.
    pub metadata: MetaData,
    /// Access template conditions bound to this asset.
    pub conditions: Vec<Condition>,
    pub endpoints: ServiceEndpoints,
}

impl AssetDescriptor {
    pub fn build(self) -> Result<Ddo, SquidError> {
        let key_id = format!("{}#keys-1", self.did);

        let public_key = vec![PublicKey {
            id: key_id.clone(),
            key_type: PUBLIC_KEY_TYPE.to_string(),
            owner: self.publisher.to_string(),
            public_key_base58: Some(self.public_key),
        }];
        let authentication = vec![Authentication {
            auth_type: AUTHENTICATION_TYPE.to_string(),
            public_key: key_id,
        }];

        let services = vec![
            Service::Access(AccessService {
                service_definition_id: ACCESS_SERVICE_ID.to_string(),
                service_endpoint: self.endpoints.consume,
                purchase_endpoint: self.endpoints.purchase,
                template_id: Template::Access.id(),
                service_agreement_contract: Template::Access.agreement_contract(),
                conditions: self.conditions,
            }),
            Service::Compute(ComputeService {
                service_definition_id: COMPUTE_SERVICE_ID.to_string(),
                service_endpoint: self.endpoints.compute,
                template_id: Some(Template::Compute.id()),
                service_agreement_contract: None,
                conditions: Vec::new(),
            }),
            Service::Metadata(MetadataService {
                service_definition_id: METADATA_SERVICE_ID.to_string(),
                service_endpoint: self.endpoints.metadata,
                metadata: self.metadata,
            }),
        ];

        Ddo::new(self.did, public_key, authentication, services)
    }
}
