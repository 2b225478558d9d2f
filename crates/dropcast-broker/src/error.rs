//! Error types for the rendezvous broker — `spec.md` §7 "Error handling
//! design (broker)".

use thiserror::Error;

/// Result type alias using [`BrokerError`].
pub type Result<T> = std::result::Result<T, BrokerError>;

/// Broker-level error kinds. Each variant below is named after the kind
/// `spec.md` §7 assigns it; all but [`BrokerError::TransportDown`] keep
/// the offending session open and reply with an `error` frame.
#[derive(Error, Debug)]
pub enum BrokerError {
    /// A `join` named a room code with no matching room.
    #[error("room {0} does not exist")]
    UnknownRoom(String),

    /// A `join` targeted a room that already has two peers.
    #[error("room {0} is full")]
    RoomFull(String),

    /// A session's transport failed to accept a write; treated as an
    /// immediate disconnect for that session.
    #[error("transport write failed for session {0}")]
    TransportDown(u64),
}
