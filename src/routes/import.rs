//! Import support routes
//!
//! File parsing happens on the client; the server only answers the
//! duplicate question: "does something like this transaction already
//! exist?". The answer is a hint for the import UI, never a constraint.

use chrono::{DateTime, Utc};
use hyper::body::Incoming;
use hyper::{Request, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::Claims;
use crate::records::{Transaction, DEFAULT_CURRENCY};
use crate::routes::{error_response, json_response, parse_json_body, BoxBody, MAX_BODY_BYTES};
use crate::server::AppState;
use crate::types::{LedgerError, Result};

#[derive(Debug, Deserialize)]
pub struct DuplicateCheckRequest {
    pub transaction_date: DateTime<Utc>,
    pub amount: f64,
    pub currency: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DuplicateCheckResponse {
    pub duplicates: Vec<Transaction>,
    pub count: usize,
}

pub async fn handle_check(
    req: Request<Incoming>,
    state: Arc<AppState>,
    claims: &Claims,
) -> hyper::Response<BoxBody> {
    match check(req, state, claims).await {
        Ok(resp) => resp,
        Err(e) => error_response(&e),
    }
}

async fn check(
    req: Request<Incoming>,
    state: Arc<AppState>,
    claims: &Claims,
) -> Result<hyper::Response<BoxBody>> {
    let body: DuplicateCheckRequest = parse_json_body(req, MAX_BODY_BYTES).await?;
    if body.amount <= 0.0 {
        return Err(LedgerError::Validation(
            "amount must be greater than 0".into(),
        ));
    }

    let currency = body
        .currency
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
    let duplicates = state
        .engine
        .find_possible_duplicates(claims.user_id, body.transaction_date, body.amount, &currency)
        .await?;

    let count = duplicates.len();
    Ok(json_response(
        StatusCode::OK,
        &DuplicateCheckResponse { duplicates, count },
    ))
}
