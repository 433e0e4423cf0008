//! Category CRUD routes
//!
//! A category's parent, when set, must be an existing category of the same
//! user with the same type.

use hyper::body::Incoming;
use hyper::{Request, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::Claims;
use crate::records::CategoryType;
use crate::routes::{
    error_response, json_response, parse_json_body, BoxBody, SuccessResponse, MAX_BODY_BYTES,
};
use crate::server::AppState;
use crate::types::{LedgerError, Result};

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub category_type: CategoryType,
    pub parent_id: Option<Uuid>,
    pub icon: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub category_type: Option<CategoryType>,
    pub parent_id: Option<Uuid>,
    pub icon: Option<String>,
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
    let body: CreateCategoryRequest = parse_json_body(req, MAX_BODY_BYTES).await?;
    if body.name.trim().is_empty() {
        return Err(LedgerError::Validation("name is required".into()));
    }

    if let Some(parent_id) = body.parent_id {
        check_parent(&state, claims.user_id, parent_id, body.category_type).await?;
    }

    let category = state
        .stores
        .categories
        .create(
            claims.user_id,
            body.name.trim().to_string(),
            body.category_type,
            body.parent_id,
            body.icon.unwrap_or_default(),
        )
        .await?;

    Ok(json_response(StatusCode::CREATED, &category))
}

pub async fn handle_list(state: Arc<AppState>, claims: &Claims) -> hyper::Response<BoxBody> {
    match state.stores.categories.list(claims.user_id).await {
        Ok(categories) => json_response(StatusCode::OK, &categories),
        Err(e) => error_response(&e),
    }
}

pub async fn handle_list_by_type(
    state: Arc<AppState>,
    claims: &Claims,
    type_name: &str,
) -> hyper::Response<BoxBody> {
    let Some(category_type) = CategoryType::parse(type_name) else {
        return error_response(&LedgerError::Validation(format!(
            "invalid category type: {}",
            type_name
        )));
    };

    match state
        .stores
        .categories
        .list_by_type(claims.user_id, category_type)
        .await
    {
        Ok(categories) => json_response(StatusCode::OK, &categories),
        Err(e) => error_response(&e),
    }
}

pub async fn handle_get(
    state: Arc<AppState>,
    claims: &Claims,
    id: Uuid,
) -> hyper::Response<BoxBody> {
    match state.stores.categories.get(id, claims.user_id).await {
        Ok(category) => json_response(StatusCode::OK, &category),
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
    let body: UpdateCategoryRequest = parse_json_body(req, MAX_BODY_BYTES).await?;

    let mut category = state.stores.categories.get(id, claims.user_id).await?;
    if let Some(name) = body.name {
        if name.trim().is_empty() {
            return Err(LedgerError::Validation("name must not be empty".into()));
        }
        category.name = name.trim().to_string();
    }
    if let Some(category_type) = body.category_type {
        category.category_type = category_type;
    }
    if let Some(parent_id) = body.parent_id {
        if parent_id == category.id {
            return Err(LedgerError::Validation(
                "category cannot be its own parent".into(),
            ));
        }
        category.parent_id = Some(parent_id);
    }
    if let Some(icon) = body.icon {
        category.icon = icon;
    }

    if let Some(parent_id) = category.parent_id {
        check_parent(&state, claims.user_id, parent_id, category.category_type).await?;
    }

    let updated = state
        .stores
        .categories
        .update(&category, claims.user_id)
        .await?;
    Ok(json_response(StatusCode::OK, &updated))
}

pub async fn handle_delete(
    state: Arc<AppState>,
    claims: &Claims,
    id: Uuid,
) -> hyper::Response<BoxBody> {
    match state.stores.categories.soft_delete(id, claims.user_id).await {
        Ok(()) => json_response(StatusCode::OK, &SuccessResponse { success: true }),
        Err(e) => error_response(&e),
    }
}

async fn check_parent(
    state: &AppState,
    user_id: Uuid,
    parent_id: Uuid,
    category_type: CategoryType,
) -> Result<()> {
    let parent = state
        .stores
        .categories
        .get(parent_id, user_id)
        .await
        .map_err(|_| LedgerError::Validation("parent category not found".into()))?;

    if parent.category_type != category_type {
        return Err(LedgerError::Validation(
            "parent category must have the same type".into(),
        ));
    }

    Ok(())
}
