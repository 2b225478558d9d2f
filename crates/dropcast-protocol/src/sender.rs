//! Sender side of the transfer protocol engine — `spec.md` §4.2 "Sender
//! contract".

use std::sync::Arc;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

use crate::channel::DataChannel;
use crate::chunking::{chunk_count, BinaryFrame, CHUNK_SIZE};
use crate::error::Result;
use crate::progress::{ProgressEvent, TransferObserver};
use crate::wire::ControlFrame;

/// Threshold above which the sender defers further chunks
/// (`spec.md` §6).
pub const BACKPRESSURE_THRESHOLD: usize = 1024 * 1024;

/// How long the sender sleeps before re-checking the outbound buffer.
pub const BACKPRESSURE_BACKOFF: Duration = Duration::from_millis(100);

/// Pause between files in a queue (`spec.md` §4.2 step 5).
pub const INTER_FILE_PAUSE: Duration = Duration::from_millis(100);

/// A file queued for transmission. The engine treats file content as
/// already-resident bytes; reading from disk is a caller concern, out of
/// the engine's scope (`spec.md` §1 — file pickers and similar UI
/// concerns are external).
#[derive(Debug, Clone)]
pub struct QueuedFile {
    /// File name.
    pub name: String,
    /// MIME type to announce in `file-metadata`.
    pub mime_type: String,
    /// Sender-side last-modified timestamp (epoch millis).
    pub last_modified: u64,
    /// The file's full contents.
    pub data: Vec<u8>,
}

/// Drives the sender contract over a [`DataChannel`], emitting progress
/// and respecting backpressure.
pub struct Sender<C: DataChannel> {
    channel: Arc<C>,
    observer: Arc<dyn TransferObserver>,
}

impl<C: DataChannel> Sender<C> {
    /// Create a new sender over `channel`, reporting to `observer`.
    pub fn new(channel: Arc<C>, observer: Arc<dyn TransferObserver>) -> Self {
        Self { channel, observer }
    }

    /// Send every file in `files` strictly sequentially: file *n+1*
    /// starts only after file *n*'s `file-complete` has been enqueued
    /// (`spec.md` §4.2 step 5, §9 "the sender... does not wait for it to
    /// drain before enqueuing the next file's file-metadata").
    pub async fn send_files(&self, files: &[QueuedFile]) -> Result<()> {
        let mut iter = files.iter().peekable();
        while let Some(file) = iter.next() {
            self.send_one_file(file).await?;
            if iter.peek().is_some() {
                tokio::time::sleep(INTER_FILE_PAUSE).await;
            }
        }
        Ok(())
    }

    /// Send a single file: metadata, chunks, completion.
    pub async fn send_one_file(&self, file: &QueuedFile) -> Result<()> {
        let total_chunks = chunk_count(file.data.len() as u64);

        self.send_control(ControlFrame::FileMetadata {
            name: file.name.clone(),
            size: file.data.len() as u64,
            mime_type: file.mime_type.clone(),
            last_modified: file.last_modified,
        })
        .await?;

        let start = Instant::now();
        let mut sent = 0u64;

        for (index, chunk) in file.data.chunks(CHUNK_SIZE).enumerate() {
            self.wait_for_backpressure().await;

            let frame = BinaryFrame::encode_data_chunk(index as u32, total_chunks, chunk);
            self.channel.send_binary(frame).await?;

            sent += chunk.len() as u64;
            self.observer.on_progress(ProgressEvent::new(
                &file.name,
                sent,
                file.data.len() as u64,
                start,
            ));
        }

        // Hashing is always available in this implementation; the engine
        // must still not block transmission on it (spec.md §4.2 step 4),
        // which holds trivially here since it only runs after all chunks
        // have already been enqueued.
        let checksum = Some(hex_sha256(&file.data));

        self.send_control(ControlFrame::FileComplete {
            file_name: file.name.clone(),
            total_chunks,
            checksum,
        })
        .await?;

        Ok(())
    }

    async fn wait_for_backpressure(&self) {
        while self.channel.buffered_bytes() > BACKPRESSURE_THRESHOLD {
            tracing::debug!(
                buffered = self.channel.buffered_bytes(),
                "send buffer above watermark, backing off"
            );
            tokio::time::sleep(BACKPRESSURE_BACKOFF).await;
        }
    }

    async fn send_control(&self, frame: ControlFrame) -> Result<()> {
        let text = serde_json::to_string(&frame)
            .expect("ControlFrame serialization cannot fail");
        self.channel.send_text(text).await
    }
}

fn hex_sha256(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
