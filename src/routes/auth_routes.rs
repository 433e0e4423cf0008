//! Authentication routes
//!
//! - POST /api/v1/auth/register - create a user and get a token
//! - POST /api/v1/auth/login    - authenticate and get a token
//! - GET  /api/v1/me            - identity behind the presented token
//!
//! Registration also seeds the user's default income and expense
//! categories so a fresh device has something to book against.

use hyper::body::Incoming;
use hyper::{Request, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::auth::{hash_password, verify_password, Claims};
use crate::records::{
    CategoryType, DEFAULT_EXPENSE_CATEGORIES, DEFAULT_INCOME_CATEGORIES,
};
use crate::routes::{error_response, json_response, parse_json_body, BoxBody, MAX_BODY_BYTES};
use crate::server::AppState;
use crate::types::{LedgerError, Result};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user_id: Uuid,
    pub email: String,
    pub expires_at: u64,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user_id: Uuid,
    pub email: String,
}

pub async fn handle_register(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> hyper::Response<BoxBody> {
    match register(req, state).await {
        Ok(resp) => resp,
        Err(e) => error_response(&e),
    }
}

async fn register(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<hyper::Response<BoxBody>> {
    let body: RegisterRequest = parse_json_body(req, MAX_BODY_BYTES).await?;

    let email = body.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(LedgerError::Validation("a valid email is required".into()));
    }
    if body.password.len() < 8 {
        return Err(LedgerError::Validation(
            "password must be at least 8 characters".into(),
        ));
    }

    let password_hash = hash_password(&body.password)?;
    let user = state.stores.users.create(email.clone(), password_hash).await?;
    let user_id = user.id.to_uuid_1();

    seed_default_categories(&state, user_id).await?;

    let (token, expires_at) = state.jwt.generate_token(user_id, &email)?;

    info!(%user_id, "user registered");

    Ok(json_response(
        StatusCode::CREATED,
        &AuthResponse {
            token,
            user_id,
            email,
            expires_at,
        },
    ))
}

pub async fn handle_login(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> hyper::Response<BoxBody> {
    match login(req, state).await {
        Ok(resp) => resp,
        Err(e) => error_response(&e),
    }
}

async fn login(req: Request<Incoming>, state: Arc<AppState>) -> Result<hyper::Response<BoxBody>> {
    let body: LoginRequest = parse_json_body(req, MAX_BODY_BYTES).await?;
    let email = body.email.trim().to_lowercase();

    let user = state
        .stores
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| LedgerError::Unauthorized("invalid email or password".into()))?;

    if !verify_password(&body.password, &user.password_hash)? {
        return Err(LedgerError::Unauthorized("invalid email or password".into()));
    }

    let user_id = user.id.to_uuid_1();
    let (token, expires_at) = state.jwt.generate_token(user_id, &email)?;

    Ok(json_response(
        StatusCode::OK,
        &AuthResponse {
            token,
            user_id,
            email,
            expires_at,
        },
    ))
}

pub fn handle_me(claims: &Claims) -> hyper::Response<BoxBody> {
    json_response(
        StatusCode::OK,
        &MeResponse {
            user_id: claims.user_id,
            email: claims.email.clone(),
        },
    )
}

async fn seed_default_categories(state: &AppState, user_id: Uuid) -> Result<()> {
    for name in DEFAULT_INCOME_CATEGORIES {
        state
            .stores
            .categories
            .create(
                user_id,
                (*name).to_string(),
                CategoryType::Income,
                None,
                String::new(),
            )
            .await?;
    }
    for name in DEFAULT_EXPENSE_CATEGORIES {
        state
            .stores
            .categories
            .create(
                user_id,
                (*name).to_string(),
                CategoryType::Expense,
                None,
                String::new(),
            )
            .await?;
    }
    Ok(())
}
