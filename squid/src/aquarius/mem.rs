//! In-memory metadata registry.
//!
//! Descriptors are kept in a `BTreeMap` keyed by DID so query results come
//! back in a stable order. Text search matches case-insensitively against
//! the name, description, author and tags of an asset.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde_json::Value;

use super::{METADATA_API_PATH, MetadataRegistry, SearchQuery};
use crate::ddo::{Ddo, MetaData};
use crate::error::SquidError;
use crate::types::Did;

/// In-memory implementation of [`MetadataRegistry`].
pub struct InMemoryRegistry {
    base_url: String,
    ddos: RwLock<BTreeMap<String, Ddo>>,
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new("http://localhost:5000")
    }
}

impl InMemoryRegistry {
    /// `base_url` is only used to build metadata service endpoints.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ddos: RwLock::new(BTreeMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Ddo>> {
        self.ddos.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Ddo>> {
        self.ddos.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn insert(&self, ddo: Ddo) -> Ddo {
        self.write().insert(ddo.id().to_string(), ddo.clone());
        ddo
    }

    pub fn get(&self, did: &Did) -> Option<Ddo> {
        self.read().get(&did.to_string()).cloned()
    }

    /// Structured search: every key of `query.query` naming a metadata
    /// field must match. Array fields match when they contain the value.
    /// A `text` key holds search terms.
    pub fn search(&self, query: &SearchQuery) -> Vec<Ddo> {
        let hits = self
            .read()
            .values()
            .filter(|ddo| matches_structured(ddo, &query.query))
            .cloned()
            .collect();
        paginate(hits, query)
    }

    pub fn search_text(&self, query: &SearchQuery) -> Vec<Ddo> {
        let text = query.text.as_deref().unwrap_or_default();
        let hits = self
            .read()
            .values()
            .filter(|ddo| ddo.metadata().is_some_and(|m| matches_text(m, text)))
            .cloned()
            .collect();
        paginate(hits, query)
    }
}

fn paginate(hits: Vec<Ddo>, query: &SearchQuery) -> Vec<Ddo> {
    let size = query.offset as usize;
    hits.into_iter()
        .skip(size.saturating_mul(query.page as usize))
        .take(size)
        .collect()
}

fn matches_text(metadata: &MetaData, text: &str) -> bool {
    let needle = text.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    let base = &metadata.base;
    [&base.name, &base.description, &base.author]
        .into_iter()
        .chain(base.tags.iter())
        .any(|field| field.to_lowercase().contains(&needle))
}

fn matches_structured(ddo: &Ddo, query: &Value) -> bool {
    let Some(criteria) = query.as_object() else {
        return true;
    };
    let Some(metadata) = ddo.metadata() else {
        return false;
    };
    let Ok(Value::Object(base)) = serde_json::to_value(&metadata.base) else {
        return false;
    };

    criteria.iter().all(|(key, expected)| {
        if key == "text" {
            let terms: Vec<&str> = match expected {
                Value::String(s) => vec![s.as_str()],
                Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
                _ => Vec::new(),
            };
            return terms.iter().all(|t| matches_text(metadata, t));
        }
        match base.get(key) {
            Some(Value::Array(items)) => {
                items.contains(expected) || Some(items) == expected.as_array()
            }
            Some(actual) => actual == expected,
            // Not a metadata field (e.g. the `value` placeholder).
            None => true,
        }
    })
}

#[async_trait]
impl MetadataRegistry for InMemoryRegistry {
    async fn store_ddo(&self, ddo: &Ddo) -> Result<Ddo, SquidError> {
        Ok(self.insert(ddo.clone()))
    }

    async fn retrieve_ddo(&self, did: &Did) -> Result<Option<Ddo>, SquidError> {
        Ok(self.get(did))
    }

    async fn query(&self, query: &SearchQuery) -> Result<Vec<Ddo>, SquidError> {
        Ok(self.search(query))
    }

    async fn query_by_text(&self, query: &SearchQuery) -> Result<Vec<Ddo>, SquidError> {
        Ok(self.search_text(query))
    }

    fn service_endpoint(&self, did: &Did) -> String {
        format!(
            "{}{METADATA_API_PATH}/{did}",
            self.base_url.trim_end_matches('/')
        )
    }
}
