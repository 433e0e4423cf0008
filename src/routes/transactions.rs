//! Transaction CRUD and stats routes
//!
//! Creating, updating or deleting an income/expense transaction through
//! this surface also adjusts the owning account's balance (income adds,
//! expense subtracts). The replication path does not touch balances; a
//! device that books offline pushes its own balance edit as part of the
//! account record.

use chrono::{DateTime, Utc};
use hyper::body::Incoming;
use hyper::{Request, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::Claims;
use crate::records::{Account, TransactionType, DEFAULT_CURRENCY};
use crate::routes::{
    error_response, json_response, parse_json_body, query_param, BoxBody, SuccessResponse,
    MAX_BODY_BYTES,
};
use crate::server::AppState;
use crate::types::{LedgerError, Result};

const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub account_id: Uuid,
    pub category_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub amount: f64,
    pub currency: Option<String>,
    pub note: Option<String>,
    pub transaction_date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTransactionRequest {
    pub account_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub transaction_type: Option<TransactionType>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub note: Option<String>,
    pub transaction_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub income_total: f64,
    pub expense_total: f64,
    pub net_total: f64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
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
    let body: CreateTransactionRequest = parse_json_body(req, MAX_BODY_BYTES).await?;
    if body.amount <= 0.0 {
        return Err(LedgerError::Validation(
            "amount must be greater than 0".into(),
        ));
    }

    let account = state
        .stores
        .accounts
        .get(body.account_id, claims.user_id)
        .await
        .map_err(|_| LedgerError::Validation("invalid account".into()))?;

    if let Some(category_id) = body.category_id {
        state
            .stores
            .categories
            .get(category_id, claims.user_id)
            .await
            .map_err(|_| LedgerError::Validation("invalid category".into()))?;
    }

    let transaction = state
        .stores
        .transactions
        .create(
            claims.user_id,
            body.account_id,
            body.category_id,
            body.transaction_type,
            body.amount,
            body.currency.unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            body.note.unwrap_or_default(),
            body.transaction_date,
        )
        .await?;

    apply_balance(&state, &account, body.transaction_type, body.amount).await?;

    Ok(json_response(StatusCode::CREATED, &transaction))
}

pub async fn handle_list(
    state: Arc<AppState>,
    claims: &Claims,
    query: Option<&str>,
) -> hyper::Response<BoxBody> {
    let limit = query_param(query, "limit")
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    let offset = query_param(query, "offset")
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);

    match state
        .stores
        .transactions
        .list(claims.user_id, limit, offset)
        .await
    {
        Ok(transactions) => json_response(StatusCode::OK, &transactions),
        Err(e) => error_response(&e),
    }
}

pub async fn handle_range(
    state: Arc<AppState>,
    claims: &Claims,
    query: Option<&str>,
) -> hyper::Response<BoxBody> {
    match range(state, claims, query).await {
        Ok(resp) => resp,
        Err(e) => error_response(&e),
    }
}

async fn range(
    state: Arc<AppState>,
    claims: &Claims,
    query: Option<&str>,
) -> Result<hyper::Response<BoxBody>> {
    let (start, end) = parse_date_range(query)?;
    let transactions = state
        .stores
        .transactions
        .list_by_range(claims.user_id, start, end)
        .await?;
    Ok(json_response(StatusCode::OK, &transactions))
}

pub async fn handle_stats(
    state: Arc<AppState>,
    claims: &Claims,
    query: Option<&str>,
) -> hyper::Response<BoxBody> {
    match stats(state, claims, query).await {
        Ok(resp) => resp,
        Err(e) => error_response(&e),
    }
}

async fn stats(
    state: Arc<AppState>,
    claims: &Claims,
    query: Option<&str>,
) -> Result<hyper::Response<BoxBody>> {
    let (start, end) = parse_date_range(query)?;
    let totals = state
        .stores
        .transactions
        .totals_by_range(claims.user_id, start, end)
        .await?;

    Ok(json_response(
        StatusCode::OK,
        &StatsResponse {
            income_total: totals.income,
            expense_total: totals.expense,
            net_total: totals.income - totals.expense,
            start_date: start,
            end_date: end,
        },
    ))
}

pub async fn handle_get(
    state: Arc<AppState>,
    claims: &Claims,
    id: Uuid,
) -> hyper::Response<BoxBody> {
    match state.stores.transactions.get(id, claims.user_id).await {
        Ok(transaction) => json_response(StatusCode::OK, &transaction),
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
    let body: UpdateTransactionRequest = parse_json_body(req, MAX_BODY_BYTES).await?;

    let mut transaction = state.stores.transactions.get(id, claims.user_id).await?;
    let old_account = state
        .stores
        .accounts
        .get(transaction.account_id, claims.user_id)
        .await
        .map_err(|_| LedgerError::Validation("invalid account".into()))?;
    let old_type = transaction.transaction_type;
    let old_amount = transaction.amount;

    if let Some(account_id) = body.account_id {
        if account_id != transaction.account_id {
            state
                .stores
                .accounts
                .get(account_id, claims.user_id)
                .await
                .map_err(|_| LedgerError::Validation("invalid account".into()))?;
        }
        transaction.account_id = account_id;
    }
    if let Some(category_id) = body.category_id {
        state
            .stores
            .categories
            .get(category_id, claims.user_id)
            .await
            .map_err(|_| LedgerError::Validation("invalid category".into()))?;
        transaction.category_id = Some(category_id);
    }
    if let Some(transaction_type) = body.transaction_type {
        transaction.transaction_type = transaction_type;
    }
    if let Some(amount) = body.amount {
        if amount <= 0.0 {
            return Err(LedgerError::Validation(
                "amount must be greater than 0".into(),
            ));
        }
        transaction.amount = amount;
    }
    if let Some(currency) = body.currency {
        transaction.currency = currency;
    }
    if let Some(note) = body.note {
        transaction.note = note;
    }
    if let Some(transaction_date) = body.transaction_date {
        transaction.transaction_date = transaction_date;
    }

    let updated = state
        .stores
        .transactions
        .update(&transaction, claims.user_id)
        .await?;

    // Move the amount off the old account, then onto the (possibly
    // different) current one.
    reverse_balance(&state, &old_account, old_type, old_amount).await?;
    let new_account = state
        .stores
        .accounts
        .get(updated.account_id, claims.user_id)
        .await?;
    apply_balance(&state, &new_account, updated.transaction_type, updated.amount).await?;

    Ok(json_response(StatusCode::OK, &updated))
}

pub async fn handle_delete(
    state: Arc<AppState>,
    claims: &Claims,
    id: Uuid,
) -> hyper::Response<BoxBody> {
    match delete(state, claims, id).await {
        Ok(resp) => resp,
        Err(e) => error_response(&e),
    }
}

async fn delete(
    state: Arc<AppState>,
    claims: &Claims,
    id: Uuid,
) -> Result<hyper::Response<BoxBody>> {
    let transaction = state.stores.transactions.get(id, claims.user_id).await?;
    let account = state
        .stores
        .accounts
        .get(transaction.account_id, claims.user_id)
        .await?;

    state
        .stores
        .transactions
        .soft_delete(id, claims.user_id)
        .await?;
    reverse_balance(
        &state,
        &account,
        transaction.transaction_type,
        transaction.amount,
    )
    .await?;

    Ok(json_response(StatusCode::OK, &SuccessResponse { success: true }))
}

async fn apply_balance(
    state: &AppState,
    account: &Account,
    transaction_type: TransactionType,
    amount: f64,
) -> Result<()> {
    let delta = match transaction_type {
        TransactionType::Income => amount,
        TransactionType::Expense => -amount,
        TransactionType::Transfer => return Ok(()),
    };

    let mut updated = account.clone();
    updated.balance += delta;
    state
        .stores
        .accounts
        .update(&updated, account.user_id)
        .await?;
    Ok(())
}

async fn reverse_balance(
    state: &AppState,
    account: &Account,
    transaction_type: TransactionType,
    amount: f64,
) -> Result<()> {
    let delta = match transaction_type {
        TransactionType::Income => -amount,
        TransactionType::Expense => amount,
        TransactionType::Transfer => return Ok(()),
    };

    let mut updated = account.clone();
    updated.balance += delta;
    state
        .stores
        .accounts
        .update(&updated, account.user_id)
        .await?;
    Ok(())
}

fn parse_date_range(query: Option<&str>) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let start = query_param(query, "start_date")
        .and_then(|v| v.parse::<DateTime<Utc>>().ok())
        .ok_or_else(|| LedgerError::Validation("start_date is required (RFC 3339)".into()))?;
    let end = query_param(query, "end_date")
        .and_then(|v| v.parse::<DateTime<Utc>>().ok())
        .ok_or_else(|| LedgerError::Validation("end_date is required (RFC 3339)".into()))?;

    if end < start {
        return Err(LedgerError::Validation(
            "end_date must not be before start_date".into(),
        ));
    }

    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_range() {
        let query = Some("start_date=2024-06-01T00:00:00Z&end_date=2024-06-30T23:59:59Z");
        let (start, end) = parse_date_range(query).unwrap();
        assert!(start < end);

        assert!(parse_date_range(Some("start_date=2024-06-01T00:00:00Z")).is_err());
        assert!(parse_date_range(Some(
            "start_date=2024-06-30T00:00:00Z&end_date=2024-06-01T00:00:00Z"
        ))
        .is_err());
        assert!(parse_date_range(None).is_err());
    }
}
