//! Metadata registry ("Aquarius").
//!
//! Descriptors live off-chain in a document store. [`MetadataRegistry`] is
//! the interface the engine uses; [`http::AquariusClient`] talks to a real
//! Aquarius instance and [`mem::InMemoryRegistry`] keeps descriptors in
//! process for tests, demos and the mock HTTP service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::ddo::Ddo;
use crate::error::SquidError;
use crate::types::Did;

pub mod http;
pub mod mem;

pub use http::AquariusClient;
pub use mem::InMemoryRegistry;

/// Base path of the descriptor API.
pub const DDO_API_PATH: &str = "/api/v1/aquarius/assets/ddo";
/// Base path under which metadata service endpoints are published.
pub const METADATA_API_PATH: &str = "/api/v1/aquarius/assets/metadata";

/// Items per page when the caller does not say otherwise.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Search request accepted by the registry.
///
/// `offset` is the page size and `page` the zero-based page number, which
/// is how the registry API names them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default = "default_offset")]
    pub offset: u32,
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_order")]
    pub query: Value,
    #[serde(default = "default_order")]
    pub sort: Value,
}

fn default_offset() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_order() -> Value {
    json!({ "value": 1 })
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            text: None,
            offset: DEFAULT_PAGE_SIZE,
            page: 0,
            query: default_order(),
            sort: default_order(),
        }
    }
}

impl SearchQuery {
    /// Free-text search with default paging and sort.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Structured search matching metadata fields.
    pub fn structured(query: Value) -> Self {
        Self {
            query,
            ..Self::default()
        }
    }

    pub fn with_page(mut self, page: u32, offset: u32) -> Self {
        self.page = page;
        self.offset = offset;
        self
    }
}

/// Off-chain descriptor store.
#[async_trait]
pub trait MetadataRegistry: Send + Sync {
    /// Stores `ddo` and returns the stored version.
    async fn store_ddo(&self, ddo: &Ddo) -> Result<Ddo, SquidError>;

    /// Fetches the descriptor for `did`. `Ok(None)` means the registry
    /// answered and has no such descriptor.
    async fn retrieve_ddo(&self, did: &Did) -> Result<Option<Ddo>, SquidError>;

    async fn query(&self, query: &SearchQuery) -> Result<Vec<Ddo>, SquidError>;

    async fn query_by_text(&self, query: &SearchQuery) -> Result<Vec<Ddo>, SquidError>;

    /// URL under which the metadata of `did` is published.
    fn service_endpoint(&self, did: &Did) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_queries_use_registry_defaults() {
        let q = SearchQuery::text("weather");
        assert_eq!(q.text.as_deref(), Some("weather"));
        assert_eq!(q.offset, 100);
        assert_eq!(q.page, 0);
        assert_eq!(q.sort, json!({ "value": 1 }));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let q: SearchQuery = serde_json::from_value(json!({ "text": "office" })).unwrap();
        assert_eq!(q, SearchQuery::text("office"));

        let value = serde_json::to_value(SearchQuery::structured(json!({"name": "x"}))).unwrap();
        assert!(value.get("text").is_none());
        assert_eq!(value["query"]["name"], "x");
    }
}
