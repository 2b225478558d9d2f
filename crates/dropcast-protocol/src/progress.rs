//! Progress reporting and user-visible (non-fatal) error records.
//!
//! `spec.md` §4.2 "Progress reporting" asks for `(percent,
//! bytes_transferred, start_time)` surfaced "to an external observer";
//! §7 asks for "structured error records with a kind and a message" for
//! recoverable conditions. Both are modeled as plain data handed to a
//! caller-supplied sink, rather than as panics or `Result::Err` — per
//! §7's propagation policy, these never abort the transfer.

use std::time::Instant;

/// A progress snapshot, emitted at least once per chunk by both the
/// sender and the receiver.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    /// Name of the file this progress applies to.
    pub file_name: String,
    /// Bytes transferred (sent or received) so far for this file.
    pub bytes_transferred: u64,
    /// Declared total size of the file.
    pub total_bytes: u64,
    /// `bytes_transferred / total_bytes * 100`, saturating at 100.0 for a
    /// zero-byte file.
    pub percent: f64,
    /// When this file's transfer began.
    pub start_time: Instant,
}

impl ProgressEvent {
    pub(crate) fn new(file_name: &str, bytes_transferred: u64, total_bytes: u64, start_time: Instant) -> Self {
        let percent = if total_bytes == 0 {
            100.0
        } else {
            (bytes_transferred as f64 / total_bytes as f64 * 100.0).min(100.0)
        };
        Self {
            file_name: file_name.to_string(),
            bytes_transferred,
            total_bytes,
            percent,
            start_time,
        }
    }

    /// Instantaneous throughput in bytes/second since `start_time`.
    pub fn bytes_per_second(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed <= 0.0 {
            0.0
        } else {
            self.bytes_transferred as f64 / elapsed
        }
    }
}

/// The kind of a recoverable transfer condition (`spec.md` §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferErrorKind {
    /// A chunk index was outside `[0, total_chunks)`.
    ChunkOutOfRange,
    /// A chunk index had already been received.
    DuplicateChunk,
    /// `file-complete` arrived with one or more chunk indices missing.
    MissingChunk,
    /// Reassembled byte count did not match the declared size.
    SizeMismatch,
    /// The reassembled file's SHA-256 did not match the sender's checksum.
    ChecksumMismatch,
    /// The channel closed while a file transfer was in progress.
    ChannelClosedDuringTransfer,
}

/// A structured, user-facing error record. Recoverable kinds are
/// delivered alongside (not instead of) the file; see each kind's
/// producer for exact semantics.
#[derive(Debug, Clone)]
pub struct TransferError {
    /// The kind of condition that occurred.
    pub kind: TransferErrorKind,
    /// A human-readable message for the UI collaborator to display.
    pub message: String,
}

impl TransferError {
    pub(crate) fn new(kind: TransferErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for TransferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// Observer for progress events and non-fatal transfer errors, supplied
/// by the caller (the UI collaborator in the original system).
pub trait TransferObserver: Send + Sync {
    /// Called at least once per chunk.
    fn on_progress(&self, _event: ProgressEvent) {}

    /// Called when a recoverable condition occurs.
    fn on_error(&self, _error: TransferError) {}
}

/// An observer that discards everything — useful as a default or in
/// tests that don't care about progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl TransferObserver for NullObserver {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_is_saturated_at_100() {
        let event = ProgressEvent::new("f", 200, 100, Instant::now());
        assert_eq!(event.percent, 100.0);
    }

    #[test]
    fn zero_byte_file_reports_complete() {
        let event = ProgressEvent::new("empty", 0, 0, Instant::now());
        assert_eq!(event.percent, 100.0);
    }

    #[test]
    fn halfway_reports_fifty_percent() {
        let event = ProgressEvent::new("f", 50, 100, Instant::now());
        assert_eq!(event.percent, 50.0);
    }
}
