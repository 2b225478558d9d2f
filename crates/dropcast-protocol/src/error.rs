//! Error types for the transfer protocol engine.

use thiserror::Error;

/// Result type alias using [`ProtocolError`].
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Hard failures from the transfer engine — these abort the current file
/// (and any queued files, per `spec.md` §7 `ChannelClosedDuringTransfer`).
///
/// Recoverable conditions (duplicate chunk, missing chunk, checksum
/// mismatch) are *not* modeled here — per the propagation policy in
/// `spec.md` §7 they are logged and/or surfaced via [`crate::progress::TransferError`]
/// without aborting the transfer, so they never become a `Result::Err`.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The underlying channel closed while a file was mid-transfer.
    #[error("channel closed during transfer of {file_name:?}")]
    ChannelClosed {
        /// Name of the file being sent/received when the channel closed.
        file_name: String,
    },

    /// A binary or text frame could not be decoded.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// The channel's send primitive failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// I/O error while reading a file to send.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
