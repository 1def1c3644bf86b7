//! Metadata registry routes.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::Value;

use squid::aquarius::DEFAULT_PAGE_SIZE;
use squid::{Ddo, Did, MetaData, SearchQuery};

use crate::state::SharedState;

type ApiError = (StatusCode, String);

fn parse_did(raw: &str) -> Result<Did, ApiError> {
    Did::parse(raw).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))
}

fn not_found(did: &Did) -> ApiError {
    (StatusCode::NOT_FOUND, format!("{did} is not registered"))
}

/// `POST /api/v1/aquarius/assets/ddo`
///
/// Descriptors that break the service invariants are rejected by the
/// `Json` extractor before reaching the handler.
pub async fn store_ddo(
    State(state): State<SharedState>,
    Json(ddo): Json<Ddo>,
) -> (StatusCode, Json<Ddo>) {
    tracing::info!(did = %ddo.id(), "descriptor stored");
    (StatusCode::CREATED, Json(state.registry.insert(ddo)))
}

/// `GET /api/v1/aquarius/assets/ddo/{did}`
pub async fn retrieve_ddo(
    State(state): State<SharedState>,
    Path(did): Path<String>,
) -> Result<Json<Ddo>, ApiError> {
    let did = parse_did(&did)?;
    state
        .registry
        .get(&did)
        .map(Json)
        .ok_or_else(|| not_found(&did))
}

/// `GET /api/v1/aquarius/assets/metadata/{did}`
pub async fn retrieve_metadata(
    State(state): State<SharedState>,
    Path(did): Path<String>,
) -> Result<Json<MetaData>, ApiError> {
    let did = parse_did(&did)?;
    state
        .registry
        .get(&did)
        .and_then(|ddo| ddo.metadata().cloned())
        .map(Json)
        .ok_or_else(|| not_found(&did))
}

/// `POST /api/v1/aquarius/assets/ddo/query`
pub async fn query(
    State(state): State<SharedState>,
    Json(query): Json<SearchQuery>,
) -> Json<Vec<Ddo>> {
    Json(state.registry.search(&query))
}

/// Query string of the text search route. `sort` is a JSON document.
#[derive(Debug, Deserialize)]
pub struct TextQueryParams {
    #[serde(default)]
    pub text: String,
    pub sort: Option<String>,
    pub offset: Option<u32>,
    pub page: Option<u32>,
}

/// `GET /api/v1/aquarius/assets/ddo/query?text=&sort=&offset=&page=`
pub async fn query_by_text(
    State(state): State<SharedState>,
    Query(params): Query<TextQueryParams>,
) -> Result<Json<Vec<Ddo>>, ApiError> {
    let mut query = SearchQuery::text(params.text).with_page(
        params.page.unwrap_or(0),
        params.offset.unwrap_or(DEFAULT_PAGE_SIZE),
    );
    if let Some(sort) = params.sort {
        query.sort = serde_json::from_str::<Value>(&sort)
            .map_err(|e| (StatusCode::BAD_REQUEST, format!("invalid sort: {e}")))?;
    }
    Ok(Json(state.registry.search_text(&query)))
}
