//! HTTP client for an Aquarius metadata registry.
//!
//! Endpoints, relative to the configured base URL:
//!
//! ```text
//! POST /api/v1/aquarius/assets/ddo              store a descriptor
//! GET  /api/v1/aquarius/assets/ddo/{did}        retrieve (404 = not found)
//! POST /api/v1/aquarius/assets/ddo/query        structured query
//! GET  /api/v1/aquarius/assets/ddo/query?text=  free-text search
//! ```
//!
//! Any other non-2xx status and every transport failure is reported as
//! [`SquidError::RemoteUnavailable`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use super::{DDO_API_PATH, METADATA_API_PATH, MetadataRegistry, SearchQuery};
use crate::ddo::Ddo;
use crate::error::SquidError;
use crate::types::Did;

pub struct AquariusClient {
    base_url: String,
    client: Client,
}

impl AquariusClient {
    /// `base_url` is the registry root, e.g. `"http://localhost:5000"`.
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

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn ddo_endpoint(&self, suffix: &str) -> String {
        if suffix.is_empty() {
            self.endpoint(DDO_API_PATH)
        } else {
            self.endpoint(&format!("{DDO_API_PATH}/{suffix}"))
        }
    }
}

fn check_status(url: &str, resp: Response) -> Result<Response, SquidError> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        Err(SquidError::RemoteUnavailable(format!("{url} returned HTTP status {status}")))
    }
}

fn transport(url: &str, e: reqwest::Error) -> SquidError {
    SquidError::RemoteUnavailable(format!("{url}: {e}"))
}

/// Parses a result list, skipping entries that are not valid descriptors.
fn parse_results(url: &str, values: Vec<Value>) -> Vec<Ddo> {
    values
        .into_iter()
        .filter_map(|v| match serde_json::from_value::<Ddo>(v) {
            Ok(ddo) => Some(ddo),
            Err(e) => {
                warn!(%url, error = %e, "skipping invalid descriptor in query result");
                None
            }
        })
        .collect()
}

#[async_trait]
impl MetadataRegistry for AquariusClient {
    async fn store_ddo(&self, ddo: &Ddo) -> Result<Ddo, SquidError> {
        let url = self.ddo_endpoint("");
        let resp = self
            .client
            .post(&url)
            .json(ddo)
            .send()
            .await
            .map_err(|e| transport(&url, e))?;
        let resp = check_status(&url, resp)?;

        let stored = resp
            .json::<Ddo>()
            .await
            .map_err(|e| SquidError::InvalidDescriptor(format!("{url}: {e}")))?;
        debug!(did = %stored.id(), "descriptor stored");
        Ok(stored)
    }

    async fn retrieve_ddo(&self, did: &Did) -> Result<Option<Ddo>, SquidError> {
        let url = self.ddo_endpoint(&did.to_string());
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| transport(&url, e))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = check_status(&url, resp)?;

        let ddo = resp
            .json::<Ddo>()
            .await
            .map_err(|e| SquidError::InvalidDescriptor(format!("{url}: {e}")))?;
        Ok(Some(ddo))
    }

    async fn query(&self, query: &SearchQuery) -> Result<Vec<Ddo>, SquidError> {
        let url = self.ddo_endpoint("query");
        let resp = self
            .client
            .post(&url)
            .json(query)
            .send()
            .await
            .map_err(|e| transport(&url, e))?;
        let resp = check_status(&url, resp)?;

        let values = resp
            .json::<Vec<Value>>()
            .await
            .map_err(|e| transport(&url, e))?;
        Ok(parse_results(&url, values))
    }

    async fn query_by_text(&self, query: &SearchQuery) -> Result<Vec<Ddo>, SquidError> {
        let url = self.ddo_endpoint("query");
        let params = [
            ("text", query.text.clone().unwrap_or_default()),
            ("sort", query.sort.to_string()),
            ("offset", query.offset.to_string()),
            ("page", query.page.to_string()),
        ];
        let resp = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| transport(&url, e))?;
        let resp = check_status(&url, resp)?;

        let values = resp
            .json::<Vec<Value>>()
            .await
            .map_err(|e| transport(&url, e))?;
        Ok(parse_results(&url, values))
    }

    fn service_endpoint(&self, did: &Did) -> String {
        self.endpoint(&format!("{METADATA_API_PATH}/{did}"))
    }
}
