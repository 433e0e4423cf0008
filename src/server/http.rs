//! HTTP server
//!
//! hyper http1 with TokioIo, manual routing. All `/api/v1` paths except
//! the auth pair require a bearer token; `/health` and the realtime
//! endpoint sit outside that rule (the latter authenticates via query
//! parameter during its upgrade).

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth::{extract_token_from_header, Claims, JwtValidator};
use crate::config::Args;
use crate::routes::{
    self, accounts, auth_routes, categories, error_response, import, json_response,
    not_found_response, preflight_response, sync_routes, to_boxed, transactions, BoxBody,
    ErrorResponse,
};
use crate::server::websocket;
use crate::store::Stores;
use crate::sync::{self, SyncEngine};
use crate::types::{LedgerError, Result};

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub stores: Arc<Stores>,
    pub engine: Arc<SyncEngine>,
    pub jwt: JwtValidator,
    started_at: std::time::Instant,
}

impl AppState {
    pub fn new(args: Args, stores: Arc<Stores>, engine: Arc<SyncEngine>) -> Result<Self> {
        let jwt = if args.dev_mode {
            JwtValidator::new_dev()
        } else {
            JwtValidator::new(args.jwt_secret(), args.jwt_expiry_seconds)?
        };

        Ok(Self {
            args,
            stores,
            engine,
            jwt,
            started_at: std::time::Instant::now(),
        })
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

/// Run the server until a shutdown signal arrives, then drain
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!("ledgerd listening on {}", state.args.listen);
    if state.args.dev_mode {
        warn!("development mode enabled - weak JWT secret in use");
    }

    sync::spawn_sweep_task(
        state.engine.locks(),
        Duration::from_secs(state.args.lock_sweep_interval_secs),
    );

    let active = Arc::new(AtomicUsize::new(0));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received, draining connections");
                break;
            }

            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        let state = Arc::clone(&state);
                        let active = Arc::clone(&active);
                        active.fetch_add(1, Ordering::SeqCst);

                        tokio::spawn(async move {
                            let io = TokioIo::new(stream);

                            let conn_state = Arc::clone(&state);
                            let service = service_fn(move |req| {
                                let state = Arc::clone(&conn_state);
                                async move { handle_request(state, addr, req).await }
                            });

                            if let Err(err) = http1::Builder::new()
                                .serve_connection(io, service)
                                .with_upgrades()
                                .await
                            {
                                debug!("error serving connection from {}: {:?}", addr, err);
                            }

                            active.fetch_sub(1, Ordering::SeqCst);
                        });
                    }
                    Err(e) => {
                        error!("error accepting connection: {:?}", e);
                    }
                }
            }
        }
    }

    drop(listener);

    let deadline = tokio::time::Instant::now()
        + Duration::from_secs(state.args.shutdown_grace_secs);
    while active.load(Ordering::SeqCst) > 0 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    let remaining = active.load(Ordering::SeqCst);
    if remaining > 0 {
        warn!("grace period elapsed with {} connections active", remaining);
    }

    info!("ledgerd stopped");
    Ok(())
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    debug!("[{}] {} {}", addr, method, path);

    // Realtime endpoint: upgrade before any body handling, no deadline.
    if method == Method::GET && path == "/ws/sync" {
        if hyper_tungstenite::is_upgrade_request(&req) {
            return Ok(to_boxed(websocket::handle_sync_upgrade(state, req).await));
        }
        return Ok(json_response(
            StatusCode::BAD_REQUEST,
            &ErrorResponse {
                error: "WebSocket upgrade required for /ws/sync".into(),
            },
        ));
    }

    let timeout = Duration::from_secs(state.args.request_timeout_secs);
    match tokio::time::timeout(timeout, route_request(state, req, method, &path)).await {
        Ok(response) => Ok(response),
        Err(_) => {
            warn!("[{}] {} timed out", addr, path);
            Ok(json_response(
                StatusCode::GATEWAY_TIMEOUT,
                &ErrorResponse {
                    error: "request timed out".into(),
                },
            ))
        }
    }
}

async fn route_request(
    state: Arc<AppState>,
    req: Request<Incoming>,
    method: Method,
    path: &str,
) -> Response<BoxBody> {
    match (&method, path) {
        (&Method::GET, "/health") => routes::health::health_check(&state),

        (&Method::OPTIONS, _) => preflight_response(),

        (&Method::POST, "/api/v1/auth/register") => {
            auth_routes::handle_register(req, state).await
        }
        (&Method::POST, "/api/v1/auth/login") => auth_routes::handle_login(req, state).await,

        // Everything else requires a bearer token.
        _ => {
            let claims = match authenticate(&state, &req) {
                Ok(claims) => claims,
                Err(response) => return response,
            };

            route_authenticated(state, req, method, path, &claims).await
        }
    }
}

async fn route_authenticated(
    state: Arc<AppState>,
    req: Request<Incoming>,
    method: Method,
    path: &str,
    claims: &Claims,
) -> Response<BoxBody> {
    let query = req.uri().query().map(|q| q.to_string());
    let query = query.as_deref();

    match (&method, path) {
        (&Method::GET, "/api/v1/me") => auth_routes::handle_me(claims),

        // Sync protocol
        (&Method::POST, "/api/v1/sync/pull") => {
            sync_routes::handle_pull(req, state, claims).await
        }
        (&Method::POST, "/api/v1/sync/push") => {
            sync_routes::handle_push(req, state, claims).await
        }

        // Import support
        (&Method::POST, "/api/v1/import/check") => import::handle_check(req, state, claims).await,

        // Accounts
        (&Method::POST, "/api/v1/accounts") => accounts::handle_create(req, state, claims).await,
        (&Method::GET, "/api/v1/accounts") => accounts::handle_list(state, claims).await,
        (&Method::GET, p) if p.starts_with("/api/v1/accounts/") => {
            match parse_id(p, "/api/v1/accounts/") {
                Some(id) => accounts::handle_get(state, claims, id).await,
                None => invalid_id(),
            }
        }
        (&Method::PUT, p) if p.starts_with("/api/v1/accounts/") => {
            match parse_id(p, "/api/v1/accounts/") {
                Some(id) => accounts::handle_update(req, state, claims, id).await,
                None => invalid_id(),
            }
        }
        (&Method::DELETE, p) if p.starts_with("/api/v1/accounts/") => {
            match parse_id(p, "/api/v1/accounts/") {
                Some(id) => accounts::handle_delete(state, claims, id).await,
                None => invalid_id(),
            }
        }

        // Categories
        (&Method::POST, "/api/v1/categories") => {
            categories::handle_create(req, state, claims).await
        }
        (&Method::GET, "/api/v1/categories") => categories::handle_list(state, claims).await,
        (&Method::GET, p) if p.starts_with("/api/v1/categories/type/") => {
            let type_name = p.strip_prefix("/api/v1/categories/type/").unwrap_or("");
            categories::handle_list_by_type(state, claims, type_name).await
        }
        (&Method::GET, p) if p.starts_with("/api/v1/categories/") => {
            match parse_id(p, "/api/v1/categories/") {
                Some(id) => categories::handle_get(state, claims, id).await,
                None => invalid_id(),
            }
        }
        (&Method::PUT, p) if p.starts_with("/api/v1/categories/") => {
            match parse_id(p, "/api/v1/categories/") {
                Some(id) => categories::handle_update(req, state, claims, id).await,
                None => invalid_id(),
            }
        }
        (&Method::DELETE, p) if p.starts_with("/api/v1/categories/") => {
            match parse_id(p, "/api/v1/categories/") {
                Some(id) => categories::handle_delete(state, claims, id).await,
                None => invalid_id(),
            }
        }

        // Transactions
        (&Method::POST, "/api/v1/transactions") => {
            transactions::handle_create(req, state, claims).await
        }
        (&Method::GET, "/api/v1/transactions") => {
            transactions::handle_list(state, claims, query).await
        }
        (&Method::GET, "/api/v1/transactions/range") => {
            transactions::handle_range(state, claims, query).await
        }
        (&Method::GET, "/api/v1/transactions/stats") => {
            transactions::handle_stats(state, claims, query).await
        }
        (&Method::GET, p) if p.starts_with("/api/v1/transactions/") => {
            match parse_id(p, "/api/v1/transactions/") {
                Some(id) => transactions::handle_get(state, claims, id).await,
                None => invalid_id(),
            }
        }
        (&Method::PUT, p) if p.starts_with("/api/v1/transactions/") => {
            match parse_id(p, "/api/v1/transactions/") {
                Some(id) => transactions::handle_update(req, state, claims, id).await,
                None => invalid_id(),
            }
        }
        (&Method::DELETE, p) if p.starts_with("/api/v1/transactions/") => {
            match parse_id(p, "/api/v1/transactions/") {
                Some(id) => transactions::handle_delete(state, claims, id).await,
                None => invalid_id(),
            }
        }

        _ => not_found_response(path),
    }
}

/// Resolve the bearer token on a request to its claims
fn authenticate(
    state: &AppState,
    req: &Request<Incoming>,
) -> std::result::Result<Claims, Response<BoxBody>> {
    let header = req
        .headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let Some(token) = extract_token_from_header(header) else {
        return Err(error_response(&LedgerError::Unauthorized(
            "authorization header required".into(),
        )));
    };

    let result = state.jwt.verify_token(token);
    match result.claims {
        Some(claims) if result.valid => Ok(claims),
        _ => Err(error_response(&LedgerError::Unauthorized(
            result.error.unwrap_or_else(|| "invalid token".into()),
        ))),
    }
}

fn parse_id(path: &str, prefix: &str) -> Option<Uuid> {
    path.strip_prefix(prefix)?.parse().ok()
}

fn invalid_id() -> Response<BoxBody> {
    error_response(&LedgerError::Validation("invalid record id".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        let id = Uuid::new_v4();
        let path = format!("/api/v1/accounts/{}", id);
        assert_eq!(parse_id(&path, "/api/v1/accounts/"), Some(id));

        assert_eq!(parse_id("/api/v1/accounts/not-a-uuid", "/api/v1/accounts/"), None);
        assert_eq!(parse_id("/api/v1/other", "/api/v1/accounts/"), None);
    }
}
