//! In-memory HTTP stand-ins for the metadata registry (Aquarius) and the
//! publisher gateway (Brizo).
//!
//! Routes:
//!
//! - `GET /health`
//! - `POST /api/v1/aquarius/assets/ddo`
//! - `GET /api/v1/aquarius/assets/ddo/{did}`
//! - `POST /api/v1/aquarius/assets/ddo/query`
//! - `GET /api/v1/aquarius/assets/ddo/query?text=`
//! - `GET /api/v1/aquarius/assets/metadata/{did}`
//! - `POST /api/v1/brizo/services/access/initialize`
//! - `GET /api/v1/brizo/services/consume`

pub mod config;
pub mod routes;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};

use squid::aquarius::{DDO_API_PATH, METADATA_API_PATH};
use squid::brizo::SERVICES_API_PATH;

use routes::{aquarius, brizo, health};
use state::SharedState;

/// Builds the router serving both mock services.
pub fn app(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route(DDO_API_PATH, post(aquarius::store_ddo))
        .route(
            &format!("{DDO_API_PATH}/query"),
            get(aquarius::query_by_text).post(aquarius::query),
        )
        .route(
            &format!("{DDO_API_PATH}/{{did}}"),
            get(aquarius::retrieve_ddo),
        )
        .route(
            &format!("{METADATA_API_PATH}/{{did}}"),
            get(aquarius::retrieve_metadata),
        )
        .route(
            &format!("{SERVICES_API_PATH}/access/initialize"),
            post(brizo::initialize),
        )
        .route(&format!("{SERVICES_API_PATH}/consume"), get(brizo::consume))
        .with_state(state)
}
