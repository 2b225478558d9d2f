//! Receiver side of the transfer protocol engine — `spec.md` §4.2
//! "Receiver contract" and §7 "Error handling".

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use sha2::{Digest, Sha256};

use crate::channel::DataChannel;
use crate::chunking::BinaryFrame;
use crate::error::{ProtocolError, Result};
use crate::progress::{ProgressEvent, TransferError, TransferErrorKind, TransferObserver};
use crate::wire::ControlFrame;

/// A fully reassembled file, possibly degraded (see
/// [`ReceivedFile::degraded`]).
#[derive(Debug, Clone)]
pub struct ReceivedFile {
    /// File name as announced in `file-metadata`.
    pub name: String,
    /// MIME type as announced in `file-metadata`.
    pub mime_type: String,
    /// Sender-side last-modified timestamp (epoch millis).
    pub last_modified: u64,
    /// Reassembled bytes, in chunk order. Missing chunks are represented
    /// as zero-filled regions of the declared chunk size (`spec.md` §7
    /// "Design note" — this preserves observed behavior rather than
    /// withholding the file).
    pub data: Vec<u8>,
    /// `true` if one or more chunks were missing and zero-filled, or the
    /// checksum failed to verify.
    pub degraded: bool,
}

#[derive(Default)]
struct InFlightFile {
    name: String,
    mime_type: String,
    last_modified: u64,
    declared_size: u64,
    total_chunks: u32,
    chunks: BTreeMap<u32, Vec<u8>>,
    start_time: Option<Instant>,
}

/// Reassembles files from a stream of [`ControlFrame`]s and
/// [`BinaryFrame`]s, tolerating duplicate and out-of-order-but-present
/// chunks, and degrading (rather than failing) on missing chunks or
/// checksum mismatch.
pub struct Receiver<C: DataChannel> {
    channel: Arc<C>,
    observer: Arc<dyn TransferObserver>,
    current: Option<InFlightFile>,
}

impl<C: DataChannel> Receiver<C> {
    /// Create a new receiver that acks chunks over `channel` and reports
    /// to `observer`.
    pub fn new(channel: Arc<C>, observer: Arc<dyn TransferObserver>) -> Self {
        Self {
            channel,
            observer,
            current: None,
        }
    }

    /// Handle an inbound text control frame. Returns `Ok(Some(file))`
    /// when a `file-complete` closes out the file currently in flight.
    pub fn on_control_frame(&mut self, json: &str) -> Result<Option<ReceivedFile>> {
        let frame: ControlFrame = serde_json::from_str(json)
            .map_err(|e| ProtocolError::MalformedFrame(e.to_string()))?;

        match frame {
            ControlFrame::FileMetadata {
                name,
                size,
                mime_type,
                last_modified,
            } => {
                self.current = Some(InFlightFile {
                    name,
                    mime_type,
                    last_modified,
                    declared_size: size,
                    total_chunks: crate::chunking::chunk_count(size),
                    chunks: BTreeMap::new(),
                    start_time: Some(Instant::now()),
                });
                Ok(None)
            }

            ControlFrame::FileComplete {
                file_name,
                total_chunks,
                checksum,
            } => Ok(Some(self.finish_file(&file_name, total_chunks, checksum)?)),

            // Informational only; nothing for the receiver to act on.
            ControlFrame::ChunkAck { .. } => Ok(None),
        }
    }

    /// Handle an inbound binary frame carrying chunk data. Sends a
    /// `chunk-ack` over the channel for every chunk it persists,
    /// including duplicates (`spec.md` §4.2 "Receiver contract").
    pub async fn on_binary_frame(&mut self, bytes: &[u8]) -> Result<()> {
        let frame = BinaryFrame::decode(bytes)?;
        let BinaryFrame::DataChunk {
            chunk_index,
            total_chunks,
            data,
        } = frame
        else {
            // Legacy raw chunks rely entirely on channel ordering and
            // carry no index; append them to the file in flight if one
            // is open, in arrival order.
            if let BinaryFrame::Legacy(data) = frame {
                if let Some(file) = self.current.as_mut() {
                    let next_index = file.chunks.len() as u32;
                    file.chunks.insert(next_index, data);
                }
            }
            return Ok(());
        };

        let Some(file) = self.current.as_mut() else {
            tracing::debug!(
                chunk_index,
                total_chunks,
                "binary frame with no file-metadata in flight, dropping"
            );
            return Ok(());
        };

        if chunk_index >= total_chunks.max(file.total_chunks) {
            self.observer.on_error(TransferError::new(
                TransferErrorKind::ChunkOutOfRange,
                format!("chunk_index {chunk_index} outside [0, {total_chunks})"),
            ));
            return Ok(());
        }

        if file.chunks.contains_key(&chunk_index) {
            self.observer.on_error(TransferError::new(
                TransferErrorKind::DuplicateChunk,
                format!("chunk_index {chunk_index} received more than once"),
            ));
            // Keep the first copy; still ack-worthy, per spec.md §7.
            self.send_ack(chunk_index).await?;
            return Ok(());
        }

        let received_bytes: u64 = file.chunks.values().map(|c| c.len() as u64).sum::<u64>() + data.len() as u64;
        file.chunks.insert(chunk_index, data);

        self.observer.on_progress(ProgressEvent::new(
            &file.name,
            received_bytes,
            file.declared_size,
            file.start_time.unwrap_or_else(Instant::now),
        ));

        self.send_ack(chunk_index).await?;
        Ok(())
    }

    async fn send_ack(&self, chunk_index: u32) -> Result<()> {
        let frame = ControlFrame::ChunkAck { chunk_index };
        let text = serde_json::to_string(&frame).expect("ControlFrame serialization cannot fail");
        self.channel.send_text(text).await
    }

    fn finish_file(
        &mut self,
        file_name: &str,
        total_chunks: u32,
        checksum: Option<String>,
    ) -> Result<ReceivedFile> {
        let file = self.current.take().ok_or_else(|| {
            ProtocolError::MalformedFrame(format!(
                "file-complete for {file_name:?} with no file in flight"
            ))
        })?;

        let mut degraded = false;
        let mut data = Vec::with_capacity(file.declared_size as usize);

        for index in 0..total_chunks {
            match file.chunks.get(&index) {
                Some(chunk) => data.extend_from_slice(chunk),
                None => {
                    degraded = true;
                    self.observer.on_error(TransferError::new(
                        TransferErrorKind::MissingChunk,
                        format!("chunk {index} never arrived for {file_name:?}, zero-filling"),
                    ));
                    // Zero-fill using the declared per-chunk size, or the
                    // remainder for the final chunk.
                    let fill_len = if index + 1 == total_chunks && file.declared_size > 0 {
                        let full = (total_chunks as u64 - 1) * crate::chunking::CHUNK_SIZE as u64;
                        (file.declared_size.saturating_sub(full)) as usize
                    } else {
                        crate::chunking::CHUNK_SIZE
                    };
                    data.extend(std::iter::repeat(0u8).take(fill_len));
                }
            }
        }

        if data.len() as u64 != file.declared_size {
            degraded = true;
            self.observer.on_error(TransferError::new(
                TransferErrorKind::SizeMismatch,
                format!(
                    "reassembled {} bytes, expected {}",
                    data.len(),
                    file.declared_size
                ),
            ));
        }

        if let Some(expected) = checksum {
            let actual = hex_sha256(&data);
            if actual != expected {
                degraded = true;
                self.observer.on_error(TransferError::new(
                    TransferErrorKind::ChecksumMismatch,
                    format!("expected {expected}, computed {actual}"),
                ));
            }
        }

        Ok(ReceivedFile {
            name: file.name,
            mime_type: file.mime_type,
            last_modified: file.last_modified,
            data,
            degraded,
        })
    }

    /// Called when the underlying channel closes. If a file was mid
    /// transfer this is a hard failure (`spec.md` §7
    /// `ChannelClosedDuringTransfer`); otherwise it's a clean shutdown.
    pub fn on_channel_closed(&mut self) -> Result<()> {
        if let Some(file) = self.current.take() {
            return Err(ProtocolError::ChannelClosed { file_name: file.name });
        }
        Ok(())
    }
}

fn hex_sha256(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
