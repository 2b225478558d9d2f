//! Stateful WebSocket signaling broker: ephemeral two-peer rooms,
//! handshake relay, room-code generation, heartbeat liveness, and
//! expiry sweeps.
//!
//! This crate owns the rendezvous side of the system only. It never
//! sees file bytes; once two peers complete their WebRTC handshake
//! through it, the transfer itself runs client-side over the
//! `dropcast-protocol` engine, entirely outside this crate's view.

pub mod code;
pub mod config;
pub mod error;
pub mod protocol;
pub mod room;
pub mod websocket;

pub use config::BrokerConfig;
pub use error::{BrokerError, Result};
pub use protocol::{Role, SignalingMessage};
pub use room::RoomManager;
pub use websocket::{router, run_expiry_sweep, AppState};
