//! Health check endpoint

use chrono::{DateTime, Utc};
use hyper::StatusCode;
use serde::Serialize;

use crate::routes::{json_response, BoxBody};
use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime: u64,
    pub time: DateTime<Utc>,
}

/// Liveness probe, open to unauthenticated callers
pub fn health_check(state: &AppState) -> hyper::Response<BoxBody> {
    json_response(
        StatusCode::OK,
        &HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            uptime: state.uptime_secs(),
            time: Utc::now(),
        },
    )
}
