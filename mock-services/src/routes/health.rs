use axum::{Json, http::StatusCode};
use serde::Serialize;

/// Simple health-check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub services: [&'static str; 2],
}

/// `GET /health`
pub async fn health() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            services: ["aquarius", "brizo"],
        }),
    )
}
