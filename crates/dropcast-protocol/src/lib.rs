//! Chunked file transfer framing, backpressure, and reassembly over a
//! reliable ordered channel.
//!
//! This crate implements the sender and receiver halves of the transfer
//! protocol that runs over an already-established peer-to-peer data
//! channel. It has no knowledge of how that channel was established —
//! see `dropcast-broker` for the signaling side that gets two browsers
//! to a connected channel in the first place.

pub mod channel;
pub mod chunking;
pub mod error;
pub mod progress;
pub mod receiver;
pub mod sender;
pub mod wire;

pub use channel::DataChannel;
pub use error::{ProtocolError, Result};
pub use progress::{ProgressEvent, TransferError, TransferErrorKind, TransferObserver};
pub use receiver::{ReceivedFile, Receiver};
pub use sender::{QueuedFile, Sender};
pub use wire::ControlFrame;
