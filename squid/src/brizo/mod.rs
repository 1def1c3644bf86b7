//! Publisher gateway ("Brizo").
//!
//! The gateway sits in front of the publisher's storage. Consumers tell it
//! about a signed agreement through the initialize endpoint and later
//! download files through the consume endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SquidError;

pub mod http;

pub use http::BrizoClient;

/// Base path of the gateway's service API.
pub const SERVICES_API_PATH: &str = "/api/v1/brizo/services";

/// Body of `POST {services}/access/initialize`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeAgreementRequest {
    pub did: String,
    pub service_agreement_id: String,
    pub service_definition_id: String,
    pub signature: String,
    pub consumer_address: String,
}

#[async_trait]
pub trait Gateway: Send + Sync {
    fn purchase_endpoint(&self) -> String;

    fn consume_endpoint(&self) -> String;

    fn compute_endpoint(&self) -> String;

    /// Hands a consumer-signed agreement to the publisher side.
    async fn initialize_agreement(
        &self,
        request: &InitializeAgreementRequest,
    ) -> Result<(), SquidError>;
}
