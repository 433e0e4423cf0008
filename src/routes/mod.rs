//! HTTP route handlers and shared response helpers

pub mod accounts;
pub mod auth_routes;
pub mod categories;
pub mod health;
pub mod import;
pub mod sync_routes;
pub mod transactions;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::types::LedgerError;

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Body limit for ordinary JSON requests
pub const MAX_BODY_BYTES: usize = 16 * 1024;

/// Body limit for sync push/pull requests, which carry whole batches
pub const MAX_SYNC_BODY_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

pub fn empty_body() -> BoxBody {
    Full::new(Bytes::new())
        .map_err(|never| match never {})
        .boxed()
}

/// Convert a Full<Bytes> response to BoxBody
pub fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(full_body(json))
        .unwrap()
}

pub fn error_response(err: &LedgerError) -> Response<BoxBody> {
    json_response(
        err.status_code(),
        &ErrorResponse {
            error: err.to_string(),
        },
    )
}

pub fn not_found_response(path: &str) -> Response<BoxBody> {
    json_response(
        StatusCode::NOT_FOUND,
        &ErrorResponse {
            error: format!("no route for {}", path),
        },
    )
}

/// CORS preflight response
pub fn preflight_response() -> Response<BoxBody> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .header("Access-Control-Max-Age", "86400")
        .body(empty_body())
        .unwrap()
}

/// Read and decode a JSON request body, bounded by `max_bytes`
pub async fn parse_json_body<T: for<'de> Deserialize<'de>>(
    req: hyper::Request<hyper::body::Incoming>,
    max_bytes: usize,
) -> Result<T, LedgerError> {
    let body = req
        .collect()
        .await
        .map_err(|e| LedgerError::Validation(format!("failed to read body: {}", e)))?;

    let bytes = body.to_bytes();
    if bytes.len() > max_bytes {
        return Err(LedgerError::Validation("request body too large".into()));
    }

    serde_json::from_slice(&bytes)
        .map_err(|e| LedgerError::Validation(format!("invalid JSON: {}", e)))
}

/// Extract a named parameter from a query string
pub fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    let query = query?;
    for param in query.split('&') {
        if let Some((key, value)) = param.split_once('=') {
            if key == name && !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_param() {
        assert_eq!(
            query_param(Some("limit=10&offset=20"), "offset"),
            Some("20".into())
        );
        assert_eq!(query_param(Some("limit=10"), "offset"), None);
        assert_eq!(query_param(Some("offset="), "offset"), None);
        assert_eq!(query_param(None, "offset"), None);
    }

    #[test]
    fn test_error_response_status() {
        let resp = error_response(&LedgerError::NotFound("account not found".into()));
        assert_eq!(resp.status(), hyper::StatusCode::NOT_FOUND);
    }
}
