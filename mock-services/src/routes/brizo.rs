//! Publisher gateway routes.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use squid::{AgreementId, Did, InitializeAgreementRequest, Signature};

use crate::state::SharedState;

type ApiError = (StatusCode, String);

fn as_bad_request(e: squid::SquidError) -> ApiError {
    (StatusCode::BAD_REQUEST, e.to_string())
}

#[derive(Debug, Serialize)]
pub struct InitializeResponse {
    pub status: &'static str,
    #[serde(rename = "serviceAgreementId")]
    pub service_agreement_id: String,
}

/// `POST /api/v1/brizo/services/access/initialize`
///
/// Records the request after checking that the identifiers and the
/// signature are well formed. Agreement execution is left to whoever
/// drives the ledger.
pub async fn initialize(
    State(state): State<SharedState>,
    Json(body): Json<InitializeAgreementRequest>,
) -> Result<(StatusCode, Json<InitializeResponse>), ApiError> {
    Did::parse(&body.did).map_err(as_bad_request)?;
    AgreementId::parse(&body.service_agreement_id).map_err(as_bad_request)?;
    Signature::from_hex(&body.signature).map_err(as_bad_request)?;

    tracing::info!(
        agreement_id = %body.service_agreement_id,
        did = %body.did,
        consumer = %body.consumer_address,
        "agreement initialized"
    );

    let response = InitializeResponse {
        status: "initialized",
        service_agreement_id: body.service_agreement_id.clone(),
    };
    state.initialized.lock().await.push(body);
    Ok((StatusCode::CREATED, Json(response)))
}

/// Query string of the consume route.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumeParams {
    pub url: String,
    pub service_agreement_id: String,
    pub consumer_address: String,
}

/// `GET /api/v1/brizo/services/consume`
///
/// Answers with the locator when the agreement was initialized by the same
/// consumer; the mock does not proxy file contents.
pub async fn consume(
    State(state): State<SharedState>,
    Query(params): Query<ConsumeParams>,
) -> Result<String, ApiError> {
    let initialized = state.initialized.lock().await;
    let known = initialized.iter().any(|r| {
        r.service_agreement_id == params.service_agreement_id
            && r.consumer_address == params.consumer_address
    });
    if known {
        Ok(params.url)
    } else {
        Err((
            StatusCode::UNAUTHORIZED,
            format!(
                "agreement {} was not initialized by {}",
                params.service_agreement_id, params.consumer_address
            ),
        ))
    }
}
