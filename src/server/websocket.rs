//! Realtime sync notification transport
//!
//! One long-lived WebSocket per (user, device) at `GET /ws/sync`.
//!
//! Protocol:
//! - Connect with `?token=<jwt>&device_id=<id>`; a missing device_id or an
//!   invalid token rejects the upgrade.
//! - Server sends `{"type": "sync_available", "data": {"timestamp": ...}}`
//!   whenever another device of the same user commits a push. The signal
//!   carries no payload; the client reacts by issuing a pull.
//! - Client may send `{"type": "ping"}`; the server answers
//!   `{"type": "pong"}`.
//! - The server pings at the protocol level every 54 seconds and closes
//!   the connection after 60 seconds without any inbound frame.
//!
//! Closing for any reason unsubscribes the device from the notifier.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, sleep, Instant};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::extract_token_from_query;
use crate::server::AppState;
use crate::sync::ChangeNotifier;

/// WebSocket type after upgrade
type HyperWebSocket =
    hyper_tungstenite::WebSocketStream<hyper_util::rt::TokioIo<hyper::upgrade::Upgraded>>;

/// Protocol ping period; must be shorter than the idle timeout
const PING_PERIOD: Duration = Duration::from_secs(54);

/// Close the connection after this long without any inbound frame
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Maximum inbound message size
const MAX_MESSAGE_BYTES: usize = 512;

/// Message sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage {
    SyncAvailable { data: SyncAvailableData },
    Pong,
}

#[derive(Debug, Clone, Serialize)]
struct SyncAvailableData {
    timestamp: DateTime<Utc>,
}

/// Message received from client
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Ping,
}

/// Handle the WebSocket upgrade for `/ws/sync`
pub async fn handle_sync_upgrade(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let query = req.uri().query();

    let Some(device_id) = extract_token_from_query(query, "device_id") else {
        return reject(StatusCode::BAD_REQUEST, "device_id is required");
    };

    let Some(token) = extract_token_from_query(query, "token") else {
        return reject(StatusCode::UNAUTHORIZED, "token is required");
    };

    let result = state.jwt.verify_token(&token);
    let user_id = match result.claims {
        Some(claims) if result.valid => claims.user_id,
        _ => return reject(StatusCode::UNAUTHORIZED, "invalid token"),
    };

    let (response, websocket) = match hyper_tungstenite::upgrade(req, None) {
        Ok(upgrade) => upgrade,
        Err(e) => {
            warn!("sync WebSocket upgrade failed: {}", e);
            return reject(StatusCode::BAD_REQUEST, "WebSocket upgrade failed");
        }
    };

    let notifier = state.engine.notifier();
    tokio::spawn(async move {
        match websocket.await {
            Ok(ws) => {
                handle_sync_connection(notifier, ws, user_id, device_id).await;
            }
            Err(e) => {
                warn!("sync WebSocket connection failed: {}", e);
            }
        }
    });

    response.map(|_| Full::new(Bytes::new()))
}

/// Drive an established sync connection until it closes.
///
/// A single task covers both activities: the reader side consumes client
/// frames (resetting the idle deadline on every one), the writer side
/// drains notifier signals and emits the periodic ping.
async fn handle_sync_connection(
    notifier: Arc<ChangeNotifier>,
    ws: HyperWebSocket,
    user_id: Uuid,
    device_id: String,
) {
    let (mut sender, mut receiver) = ws.split();
    let (seq, mut signals) = notifier.subscribe(user_id, &device_id);

    info!(%user_id, device_id, "sync connection established");

    let mut ping = interval_at(Instant::now() + PING_PERIOD, PING_PERIOD);
    let idle = sleep(IDLE_TIMEOUT);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            signal = signals.recv() => {
                match signal {
                    Some(()) => {
                        let msg = ServerMessage::SyncAvailable {
                            data: SyncAvailableData { timestamp: Utc::now() },
                        };
                        if send_json(&mut sender, &msg).await.is_err() {
                            break;
                        }
                    }
                    // Channel closed: this subscription was replaced by a
                    // reconnect of the same device.
                    None => break,
                }
            }

            _ = ping.tick() => {
                if sender.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }

            () = &mut idle => {
                debug!(%user_id, device_id, "sync connection idle timeout");
                break;
            }

            msg = receiver.next() => {
                let msg = match msg {
                    Some(Ok(m)) => m,
                    _ => break,
                };

                idle.as_mut().reset(Instant::now() + IDLE_TIMEOUT);

                match msg {
                    Message::Text(text) => {
                        if text.len() > MAX_MESSAGE_BYTES {
                            warn!(%user_id, device_id, "oversized message, closing");
                            break;
                        }
                        if let Ok(ClientMessage::Ping) = serde_json::from_str(&text) {
                            if send_json(&mut sender, &ServerMessage::Pong).await.is_err() {
                                break;
                            }
                        }
                    }
                    Message::Binary(data) => {
                        if data.len() > MAX_MESSAGE_BYTES {
                            warn!(%user_id, device_id, "oversized message, closing");
                            break;
                        }
                    }
                    Message::Ping(data) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    }

    // The token makes this a no-op if a reconnect already replaced us.
    notifier.unsubscribe(user_id, &device_id, seq);
    let _ = sender.close().await;
    info!(%user_id, device_id, "sync connection closed");
}

async fn send_json<S>(sender: &mut S, msg: &ServerMessage) -> Result<(), ()>
where
    S: futures_util::Sink<Message> + Unpin,
{
    let json = serde_json::to_string(msg).map_err(|_| ())?;
    sender.send(Message::Text(json)).await.map_err(|_| ())
}

fn reject(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(format!(
            r#"{{"error": "{}"}}"#,
            message
        ))))
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_available_frame_shape() {
        let msg = ServerMessage::SyncAvailable {
            data: SyncAvailableData {
                timestamp: "2024-06-01T10:00:00Z".parse().unwrap(),
            },
        };

        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"sync_available\""));
        assert!(json.contains("\"timestamp\":\"2024-06-01T10:00:00Z\""));
    }

    #[test]
    fn test_pong_frame_shape() {
        let json = serde_json::to_string(&ServerMessage::Pong).unwrap();
        assert_eq!(json, "{\"type\":\"pong\"}");
    }

    #[test]
    fn test_client_ping_parses() {
        assert!(matches!(
            serde_json::from_str::<ClientMessage>("{\"type\":\"ping\"}"),
            Ok(ClientMessage::Ping)
        ));
        assert!(serde_json::from_str::<ClientMessage>("{\"type\":\"subscribe\"}").is_err());
    }

    #[test]
    fn test_timing_constants() {
        // The ping must land before the peer's idle deadline.
        assert!(PING_PERIOD < IDLE_TIMEOUT);
    }
}
