//! Configuration surface routes
//!
//! Handlers only talk to the [`ProvisioningIntake`]; they never reach the
//! orchestrator directly.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tether_core::{IdentityError, TetherError};
use tether_runtime::provisioning::SUBMISSION_ACK;
use tether_runtime::ProvisioningIntake;
use tracing::{error, warn};

const SETUP_PAGE: &str = include_str!("page.html");

/// Build the router for one portal run
pub fn router(intake: ProvisioningIntake) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/wifi-scan", get(wifi_scan))
        .route("/api/status", get(status))
        .route("/connect", post(connect))
        .with_state(intake)
}

async fn index() -> Html<&'static str> {
    Html(SETUP_PAGE)
}

/// Blocking scan; the JSON items are `{ssid, rssi, authmode}`
pub async fn wifi_scan(State(intake): State<ProvisioningIntake>) -> Response {
    match intake.scan().await {
        Ok(results) => Json(results).into_response(),
        Err(e) => {
            error!("Scan failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Scan failed").into_response()
        }
    }
}

/// `{"status": <ordinal>}`
pub async fn status(State(intake): State<ProvisioningIntake>) -> Json<serde_json::Value> {
    Json(json!({ "status": intake.status().ordinal() }))
}

/// URL-encoded identity submission
pub async fn connect(State(intake): State<ProvisioningIntake>, body: String) -> Response {
    match intake.submit_form(&body).await {
        Ok(()) => (StatusCode::OK, SUBMISSION_ACK).into_response(),
        Err(TetherError::Identity(IdentityError::RequestTooLong { .. })) => {
            (StatusCode::BAD_REQUEST, "Request too long").into_response()
        }
        Err(TetherError::Identity(
            e @ (IdentityError::MissingField { .. } | IdentityError::InvalidField { .. }),
        )) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        Err(e @ TetherError::Channel { .. }) => {
            warn!("Submission saved but not queued: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Credentials saved, device busy. Try again shortly",
            )
                .into_response()
        }
        Err(e) => {
            warn!("Submission failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to save credentials",
            )
                .into_response()
        }
    }
}
