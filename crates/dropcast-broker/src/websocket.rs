//! The broker's WebSocket/HTTP surface — `spec.md` §4.1, §6 "Auxiliary
//! HTTP endpoints". Grounded on `tallow-relay`'s `websocket.rs`
//! (`ws_router`, `ws_handler`/`handle_ws_client` split, `tower_http`
//! permissive CORS), generalized from its binary/postcard relay to the
//! JSON signaling frames this system's wire format mandates (`spec.md`
//! §6: "All field names are lowercase with hyphens").

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::{mpsc, Notify};
use tower_http::cors::CorsLayer;

use crate::config::BrokerConfig;
use crate::protocol::{Role, SignalingMessage};
use crate::room::{next_session_id, PeerHandle, RoomManager, SessionId};

/// Shared application state handed to every request/connection.
pub struct AppState {
    pub room_manager: Arc<RoomManager>,
    pub config: Arc<BrokerConfig>,
    pub started_at: Instant,
}

/// Build the broker's axum [`Router`]: `/ws` for signaling, `/health`
/// and `/api/info` per `spec.md` §6.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .route("/api/info", get(info_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "rooms": state.room_manager.room_count(),
        "connections": state.room_manager.connection_count(),
        "uptime": state.started_at.elapsed().as_secs(),
        "timestamp": unix_timestamp_millis(),
    }))
}

async fn info_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let port = state
        .config
        .bind_addr
        .parse::<SocketAddr>()
        .map(|addr| addr.port())
        .unwrap_or(0);
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "environment": std::env::var("DROPCAST_ENV").unwrap_or_else(|_| "production".to_string()),
        "https": false,
        "room_expiry": state.config.room_expiry_ms,
        "max_room_size": crate::room::MAX_ROOM_SIZE,
        "network_ip": state.config.bind_addr.split(':').next().unwrap_or("0.0.0.0"),
        "port": port,
    }))
}

fn unix_timestamp_millis() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_session(socket, state))
}

/// One signaling session's whole lifecycle: connected notice, join,
/// handshake forwarding, heartbeat, detach. One task per session
/// (`spec.md` §5 "Scheduling model").
async fn handle_session(socket: WebSocket, state: Arc<AppState>) {
    let session_id = next_session_id();
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<SignalingMessage>();
    let close_notify = Arc::new(Notify::new());

    let write_task = tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            if ws_tx.send(Message::Text(message.to_json())).await.is_err() {
                break;
            }
        }
    });

    let _ = out_tx.send(SignalingMessage::Connected {
        message: "connected".to_string(),
    });

    let mut joined: Option<(String, Role)> = None;
    let mut heartbeat = tokio::time::interval(state.config.heartbeat_period());
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut awaiting_pong = false;
    let mut missed_heartbeats = 0u8;

    loop {
        tokio::select! {
            incoming = ws_rx.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        handle_frame(
                            &text,
                            session_id,
                            &state.room_manager,
                            &out_tx,
                            &close_notify,
                            &mut joined,
                            &mut awaiting_pong,
                            &mut missed_heartbeats,
                        );
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {
                        // Binary/ping/pong websocket frames carry no
                        // signaling meaning; the wire format is text-only
                        // (spec.md §6).
                    }
                    Some(Err(_)) => break,
                }
            }
            _ = close_notify.notified() => {
                tracing::debug!(session_id, "session closed by room teardown");
                break;
            }
            _ = heartbeat.tick() => {
                if awaiting_pong {
                    missed_heartbeats += 1;
                    if missed_heartbeats >= 2 {
                        tracing::info!(session_id, "session missed two consecutive heartbeats, terminating");
                        break;
                    }
                }
                awaiting_pong = true;
                let _ = out_tx.send(SignalingMessage::Pong);
            }
        }
    }

    if let Some((room_code, _role)) = joined {
        state.room_manager.detach(&room_code, session_id);
    }
    drop(out_tx);
    let _ = write_task.await;
}

/// Tags [`SignalingMessage`] knows how to deserialize, in either
/// direction. A frame whose `type` isn't one of these is not a shape
/// error — it's simply a tag this broker doesn't speak (`spec.md` §6:
/// "Unknown types are logged and ignored by the broker").
const KNOWN_SIGNALING_TAGS: &[&str] = &[
    "join",
    "offer",
    "answer",
    "ice-candidate",
    "ping",
    "joined",
    "connected",
    "error",
    "peer-disconnected",
    "room-expired",
    "pong",
];

fn handle_frame(
    text: &str,
    session_id: SessionId,
    room_manager: &RoomManager,
    out_tx: &mpsc::UnboundedSender<SignalingMessage>,
    close_notify: &Arc<Notify>,
    joined: &mut Option<(String, Role)>,
    awaiting_pong: &mut bool,
    missed_heartbeats: &mut u8,
) {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(session_id, error = %e, "malformed signaling frame: invalid json");
            let _ = out_tx.send(SignalingMessage::Error {
                message: format!("malformed frame: {e}"),
            });
            return;
        }
    };

    let tag = match value.get("type").and_then(Value::as_str) {
        Some(tag) => tag,
        None => {
            tracing::debug!(session_id, "malformed signaling frame: missing or non-string \"type\"");
            let _ = out_tx.send(SignalingMessage::Error {
                message: "malformed frame: missing or non-string \"type\"".to_string(),
            });
            return;
        }
    };

    if !KNOWN_SIGNALING_TAGS.contains(&tag) {
        tracing::debug!(session_id, tag, "unrecognized signaling frame type, ignoring");
        return;
    }

    let parsed: SignalingMessage = match serde_json::from_value(value) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::debug!(session_id, error = %e, tag, "malformed signaling frame: bad shape for recognized type");
            let _ = out_tx.send(SignalingMessage::Error {
                message: format!("malformed frame: {e}"),
            });
            return;
        }
    };

    match parsed {
        SignalingMessage::Join { create_new, room_id } => {
            if joined.is_some() {
                let _ = out_tx.send(SignalingMessage::Error {
                    message: "session has already joined a room".to_string(),
                });
                return;
            }
            handle_join(create_new, room_id, session_id, room_manager, out_tx, close_notify, joined);
        }

        SignalingMessage::Offer { offer } => match joined {
            Some((room_code, Role::Sender)) => {
                if let Err(e) = room_manager.forward_offer(room_code, offer) {
                    let _ = out_tx.send(SignalingMessage::Error { message: e.to_string() });
                }
            }
            _ => {
                let _ = out_tx.send(SignalingMessage::Error {
                    message: "only the sender may emit an offer".to_string(),
                });
            }
        },

        SignalingMessage::Answer { answer } => match joined {
            Some((room_code, Role::Receiver)) => {
                if let Err(e) = room_manager.forward_answer(room_code, answer) {
                    let _ = out_tx.send(SignalingMessage::Error { message: e.to_string() });
                }
            }
            _ => {
                let _ = out_tx.send(SignalingMessage::Error {
                    message: "only the receiver may emit an answer".to_string(),
                });
            }
        },

        SignalingMessage::IceCandidate { candidate } => {
            if let Some((room_code, _)) = joined {
                if let Err(e) = room_manager.forward_ice_candidate(room_code, session_id, candidate) {
                    tracing::debug!(session_id, error = %e, "ice candidate dropped, counterpart not attached");
                }
            }
        }

        SignalingMessage::Ping => {
            let _ = out_tx.send(SignalingMessage::Pong);
        }

        // `pong` answers this session's own heartbeat ping.
        SignalingMessage::Pong => {
            *awaiting_pong = false;
            *missed_heartbeats = 0;
        }

        // Server-to-client-only tags arriving inbound are a protocol
        // violation but not fatal to the session.
        SignalingMessage::Joined { .. }
        | SignalingMessage::Connected { .. }
        | SignalingMessage::Error { .. }
        | SignalingMessage::PeerDisconnected
        | SignalingMessage::RoomExpired => {
            let _ = out_tx.send(SignalingMessage::Error {
                message: "unexpected server-directed frame".to_string(),
            });
        }
    }
}

fn handle_join(
    create_new: bool,
    room_id: Option<String>,
    session_id: SessionId,
    room_manager: &RoomManager,
    out_tx: &mpsc::UnboundedSender<SignalingMessage>,
    close_notify: &Arc<Notify>,
    joined: &mut Option<(String, Role)>,
) {
    if create_new {
        let role = Role::Sender;
        let handle = PeerHandle::from_parts(session_id, role, out_tx.clone(), Arc::clone(close_notify));
        let room_code = room_manager.create_room(handle);
        *joined = Some((room_code.clone(), role));
        let _ = out_tx.send(SignalingMessage::Joined {
            room_id: room_code,
            role,
            peer_count: 1,
        });
        return;
    }

    let Some(room_id) = room_id else {
        let _ = out_tx.send(SignalingMessage::Error {
            message: "room_id is required when create_new is false".to_string(),
        });
        return;
    };

    let role = Role::Receiver;
    let handle = PeerHandle::from_parts(session_id, role, out_tx.clone(), Arc::clone(close_notify));
    match room_manager.join_room(&room_id, handle) {
        Ok(outcome) => {
            let canonical = crate::code::canonicalize(&room_id);
            *joined = Some((canonical.clone(), role));

            let _ = outcome.sender.send(SignalingMessage::Joined {
                room_id: canonical.clone(),
                role: Role::Sender,
                peer_count: outcome.peer_count,
            });
            let _ = out_tx.send(SignalingMessage::Joined {
                room_id: canonical,
                role,
                peer_count: outcome.peer_count,
            });

            if let Some(offer) = outcome.pending_offer {
                let _ = out_tx.send(SignalingMessage::Offer { offer });
            }
        }
        Err(e) => {
            let _ = out_tx.send(SignalingMessage::Error { message: e.to_string() });
        }
    }
}

/// Periodically tear down rooms whose age exceeds the configured
/// `ROOM_EXPIRY` (`spec.md` §4.1 "Room lifecycle: Expiry").
pub async fn run_expiry_sweep(room_manager: Arc<RoomManager>, room_expiry: Duration, sweep_period: Duration) {
    let mut ticker = tokio::time::interval(sweep_period);
    loop {
        ticker.tick().await;
        let expired = room_manager.sweep_expired(room_expiry);
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), rooms = ?expired, "expired rooms reaped");
        }
    }
}
