//! Auth provider webhook
//!
//! - POST /api/webhooks/auth - Signed user.created / user.updated / user.deleted
//!   deliveries. The raw body is needed to check the signature, so it is read
//!   as bytes rather than through the JSON extractor.

use axum::{body::Bytes, extract::State, http::HeaderMap, routing::post, Json, Router};

use crate::api::middleware::{ApiError, AppState};
use crate::services::{SignatureHeaders, WebhookError, WebhookOutcome};

pub const HEADER_ID: &str = "svix-id";
pub const HEADER_TIMESTAMP: &str = "svix-timestamp";
pub const HEADER_SIGNATURE: &str = "svix-signature";

pub fn router() -> Router<AppState> {
    Router::new().route("/webhooks/auth", post(receive))
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, WebhookError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or(WebhookError::MissingHeader(name))
}

async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookOutcome>, ApiError> {
    let signature_headers = SignatureHeaders {
        id: header(&headers, HEADER_ID)?,
        timestamp: header(&headers, HEADER_TIMESTAMP)?,
        signature: header(&headers, HEADER_SIGNATURE)?,
    };

    let outcome = state
        .webhook_service
        .receive(signature_headers, &body)
        .await?;
    tracing::info!(outcome = ?outcome, "Auth webhook applied");
    Ok(Json(outcome))
}
