//! Health check endpoints
//!
//! - /health: process is up
//! - /health/ready: database reachable and a signing secret is installed
//! - /health/live: always OK while the server runs

use crate::{db, state::AppState};
use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checks: Option<ReadinessChecks>,
}

impl HealthResponse {
    fn plain(status: &'static str) -> Self {
        Self {
            status,
            version: env!("CARGO_PKG_VERSION"),
            checks: None,
        }
    }
}

#[derive(Serialize)]
pub struct ReadinessChecks {
    pub database: DatabaseCheck,
    pub signing_secret: SigningSecretCheck,
}

#[derive(Serialize)]
pub struct DatabaseCheck {
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u128>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Serialize)]
pub struct SigningSecretCheck {
    pub next_rotation_at: DateTime<Utc>,
    pub has_previous_secret: bool,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::plain("healthy"))
}

/// Readiness probe; 503 while the database is unreachable
pub async fn readiness_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let database = match db::health_check(state.db()).await {
        Ok(latency) => DatabaseCheck {
            healthy: true,
            latency_ms: Some(latency.as_millis()),
            message: None,
        },
        Err(e) => DatabaseCheck {
            healthy: false,
            latency_ms: None,
            message: Some(e.to_string()),
        },
    };

    let secret = state.jwt().secret_info();
    let ready = database.healthy;
    let response = HealthResponse {
        status: if ready { "ready" } else { "not_ready" },
        version: env!("CARGO_PKG_VERSION"),
        checks: Some(ReadinessChecks {
            database,
            signing_secret: SigningSecretCheck {
                next_rotation_at: secret.next_rotation_at,
                has_previous_secret: secret.has_previous_secret,
            },
        }),
    };

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

pub async fn liveness_check() -> Json<HealthResponse> {
    Json(HealthResponse::plain("alive"))
}
