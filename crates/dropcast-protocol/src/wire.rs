//! Text (JSON) control frames exchanged over the data channel.
//!
//! `spec.md` §4.2/§6: every control frame is a JSON object tagged by a
//! `type` field, field names lowercase with hyphens for the tag and
//! whatever casing the spec used for payload fields.

use serde::{Deserialize, Serialize};

/// A text control frame, as sent/received over the data channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ControlFrame {
    /// Announces the next file about to be transferred.
    FileMetadata {
        /// File name.
        name: String,
        /// Declared size in bytes.
        size: u64,
        /// MIME type as reported by the sender.
        mime_type: String,
        /// Sender-side last-modified timestamp (epoch millis).
        last_modified: u64,
    },

    /// Signals the end of a file.
    FileComplete {
        /// Name of the file that just finished.
        file_name: String,
        /// Total number of chunks the sender produced.
        total_chunks: u32,
        /// Lowercase hex SHA-256 of the full file, if available.
        #[serde(skip_serializing_if = "Option::is_none")]
        checksum: Option<String>,
    },

    /// Sent by the receiver for every chunk it persists, including
    /// duplicates. Informational only — not required for correctness.
    ChunkAck {
        /// Index of the chunk being acknowledged.
        chunk_index: u32,
    },
}
