use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{Gateway, InitializeAgreementRequest, SERVICES_API_PATH};
use crate::error::SquidError;

/// HTTP client for a Brizo gateway.
pub struct BrizoClient {
    base_url: String,
    client: Client,
}

impl BrizoClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SquidError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SquidError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}{SERVICES_API_PATH}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl Gateway for BrizoClient {
    fn purchase_endpoint(&self) -> String {
        self.endpoint("access/initialize")
    }

    fn consume_endpoint(&self) -> String {
        self.endpoint("consume")
    }

    fn compute_endpoint(&self) -> String {
        self.endpoint("compute")
    }

    async fn initialize_agreement(
        &self,
        request: &InitializeAgreementRequest,
    ) -> Result<(), SquidError> {
        let url = self.purchase_endpoint();
        let resp = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| SquidError::RemoteUnavailable(format!("{url}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SquidError::RemoteUnavailable(format!(
                "{url} returned HTTP status {status}"
            )));
        }

        debug!(agreement_id = %request.service_agreement_id, "agreement initialized at gateway");
        Ok(())
    }
}
