//! Account CRUD routes
//!
//! Thin forwarding to the account store; ownership comes from the token.

use hyper::body::Incoming;
use hyper::{Request, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::Claims;
use crate::records::{AccountType, DEFAULT_CURRENCY};
use crate::routes::{
    error_response, json_response, parse_json_body, BoxBody, SuccessResponse, MAX_BODY_BYTES,
};
use crate::server::AppState;
use crate::types::{LedgerError, Result};

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub currency: Option<String>,
    pub balance: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAccountRequest {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub account_type: Option<AccountType>,
    pub currency: Option<String>,
    pub balance: Option<f64>,
}

pub async fn handle_create(
    req: Request<Incoming>,
    state: Arc<AppState>,
    claims: &Claims,
) -> hyper::Response<BoxBody> {
    match create(req, state, claims).await {
        Ok(resp) => resp,
        Err(e) => error_response(&e),
    }
}

async fn create(
    req: Request<Incoming>,
    state: Arc<AppState>,
    claims: &Claims,
) -> Result<hyper::Response<BoxBody>> {
    let body: CreateAccountRequest = parse_json_body(req, MAX_BODY_BYTES).await?;
    if body.name.trim().is_empty() {
        return Err(LedgerError::Validation("name is required".into()));
    }

    let account = state
        .stores
        .accounts
        .create(
            claims.user_id,
            body.name.trim().to_string(),
            body.account_type,
            body.currency.unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            body.balance.unwrap_or(0.0),
        )
        .await?;

    Ok(json_response(StatusCode::CREATED, &account))
}

pub async fn handle_list(state: Arc<AppState>, claims: &Claims) -> hyper::Response<BoxBody> {
    match state.stores.accounts.list(claims.user_id).await {
        Ok(accounts) => json_response(StatusCode::OK, &accounts),
        Err(e) => error_response(&e),
    }
}

pub async fn handle_get(
    state: Arc<AppState>,
    claims: &Claims,
    id: Uuid,
) -> hyper::Response<BoxBody> {
    match state.stores.accounts.get(id, claims.user_id).await {
        Ok(account) => json_response(StatusCode::OK, &account),
        Err(e) => error_response(&e),
    }
}

pub async fn handle_update(
    req: Request<Incoming>,
    state: Arc<AppState>,
    claims: &Claims,
    id: Uuid,
) -> hyper::Response<BoxBody> {
    match update(req, state, claims, id).await {
        Ok(resp) => resp,
        Err(e) => error_response(&e),
    }
}

async fn update(
    req: Request<Incoming>,
    state: Arc<AppState>,
    claims: &Claims,
    id: Uuid,
) -> Result<hyper::Response<BoxBody>> {
    let body: UpdateAccountRequest = parse_json_body(req, MAX_BODY_BYTES).await?;

    let mut account = state.stores.accounts.get(id, claims.user_id).await?;
    if let Some(name) = body.name {
        if name.trim().is_empty() {
            return Err(LedgerError::Validation("name must not be empty".into()));
        }
        account.name = name.trim().to_string();
    }
    if let Some(account_type) = body.account_type {
        account.account_type = account_type;
    }
    if let Some(currency) = body.currency {
        account.currency = currency;
    }
    if let Some(balance) = body.balance {
        account.balance = balance;
    }

    let updated = state.stores.accounts.update(&account, claims.user_id).await?;
    Ok(json_response(StatusCode::OK, &updated))
}

pub async fn handle_delete(
    state: Arc<AppState>,
    claims: &Claims,
    id: Uuid,
) -> hyper::Response<BoxBody> {
    match state.stores.accounts.soft_delete(id, claims.user_id).await {
        Ok(()) => json_response(StatusCode::OK, &SuccessResponse { success: true }),
        Err(e) => error_response(&e),
    }
}
