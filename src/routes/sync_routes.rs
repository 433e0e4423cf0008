//! Sync protocol routes
//!
//! - POST /api/v1/sync/pull - change feed since the device's bookmark
//! - POST /api/v1/sync/push - merge and commit a device's batch

use hyper::body::Incoming;
use hyper::{Request, StatusCode};
use std::sync::Arc;

use crate::auth::Claims;
use crate::routes::{
    error_response, json_response, parse_json_body, BoxBody, MAX_SYNC_BODY_BYTES,
};
use crate::server::AppState;
use crate::sync::{SyncPullRequest, SyncPushRequest};
use crate::types::{LedgerError, Result};

pub async fn handle_pull(
    req: Request<Incoming>,
    state: Arc<AppState>,
    claims: &Claims,
) -> hyper::Response<BoxBody> {
    match pull(req, state, claims).await {
        Ok(resp) => resp,
        Err(e) => error_response(&e),
    }
}

async fn pull(
    req: Request<Incoming>,
    state: Arc<AppState>,
    claims: &Claims,
) -> Result<hyper::Response<BoxBody>> {
    let body: SyncPullRequest = parse_json_body(req, MAX_SYNC_BODY_BYTES).await?;
    if body.device_id.is_empty() {
        return Err(LedgerError::Validation("device_id is required".into()));
    }

    let changes = state
        .engine
        .pull(claims.user_id, &body.device_id, body.last_sync_at)
        .await?;

    Ok(json_response(StatusCode::OK, &changes))
}

pub async fn handle_push(
    req: Request<Incoming>,
    state: Arc<AppState>,
    claims: &Claims,
) -> hyper::Response<BoxBody> {
    match push(req, state, claims).await {
        Ok(resp) => resp,
        Err(e) => error_response(&e),
    }
}

async fn push(
    req: Request<Incoming>,
    state: Arc<AppState>,
    claims: &Claims,
) -> Result<hyper::Response<BoxBody>> {
    let body: SyncPushRequest = parse_json_body(req, MAX_SYNC_BODY_BYTES).await?;
    if body.device_id.is_empty() {
        return Err(LedgerError::Validation("device_id is required".into()));
    }

    let result = state.engine.push(claims.user_id, body).await?;

    Ok(json_response(StatusCode::OK, &result))
}
