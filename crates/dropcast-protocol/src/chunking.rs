//! Binary data-chunk framing — `spec.md` §4.2.
//!
//! ```text
//! byte 0:       0x01 (tag)
//! bytes 1..4:   chunk_index   (u32, little-endian)
//! bytes 5..8:   total_chunks  (u32, little-endian)
//! bytes 9..12:  data_length   (u32, little-endian)
//! bytes 13..:   payload (data_length bytes)
//! ```

use crate::error::{ProtocolError, Result};

/// Size of a chunk, except the final chunk of a file which may be smaller.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Tag byte identifying a sequence-headered data chunk frame.
pub const DATA_CHUNK_TAG: u8 = 0x01;

const HEADER_LEN: usize = 1 + 4 + 4 + 4;

/// A decoded binary frame from the data channel.
#[derive(Debug, Clone, PartialEq)]
pub enum BinaryFrame {
    /// A chunk carrying its own sequence header.
    DataChunk {
        /// 0-based, contiguous position of this chunk within the file.
        chunk_index: u32,
        /// Total chunk count the sender declared for this file.
        total_chunks: u32,
        /// The chunk's payload bytes.
        data: Vec<u8>,
    },
    /// A raw, unheadered chunk from a pre-sequence-header sender
    /// (`spec.md` §4.2 "Legacy interoperability"). Correctness under
    /// this path relies entirely on the channel's ordering guarantee.
    Legacy(Vec<u8>),
}

impl BinaryFrame {
    /// Encode a sequence-headered data chunk frame.
    pub fn encode_data_chunk(chunk_index: u32, total_chunks: u32, data: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + data.len());
        buf.push(DATA_CHUNK_TAG);
        buf.extend_from_slice(&chunk_index.to_le_bytes());
        buf.extend_from_slice(&total_chunks.to_le_bytes());
        buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
        buf.extend_from_slice(data);
        buf
    }

    /// Decode a binary frame. A frame whose first byte is not
    /// [`DATA_CHUNK_TAG`] is treated as a legacy raw chunk, not an error.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        match bytes.first() {
            Some(&DATA_CHUNK_TAG) => {
                if bytes.len() < HEADER_LEN {
                    return Err(ProtocolError::MalformedFrame(format!(
                        "data chunk frame too short: {} bytes",
                        bytes.len()
                    )));
                }
                let chunk_index = u32::from_le_bytes(bytes[1..5].try_into().unwrap());
                let total_chunks = u32::from_le_bytes(bytes[5..9].try_into().unwrap());
                let data_length = u32::from_le_bytes(bytes[9..13].try_into().unwrap()) as usize;
                let payload = &bytes[HEADER_LEN..];
                if payload.len() != data_length {
                    return Err(ProtocolError::MalformedFrame(format!(
                        "declared data_length {data_length} does not match payload {} bytes",
                        payload.len()
                    )));
                }
                Ok(Self::DataChunk {
                    chunk_index,
                    total_chunks,
                    data: payload.to_vec(),
                })
            }
            _ => Ok(Self::Legacy(bytes.to_vec())),
        }
    }
}

/// Split file bytes into `CHUNK_SIZE`-sized slices, the last holding the
/// remainder. A zero-byte file has zero chunks: `file-metadata` is
/// followed directly by `file-complete` with no data frames in between.
pub fn chunk_count(total_size: u64) -> u32 {
    if total_size == 0 {
        return 0;
    }
    total_size.div_ceil(CHUNK_SIZE as u64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_chunk_round_trips() {
        let data = vec![0xABu8; 1234];
        let encoded = BinaryFrame::encode_data_chunk(3, 10, &data);
        let decoded = BinaryFrame::decode(&encoded).unwrap();
        assert_eq!(
            decoded,
            BinaryFrame::DataChunk {
                chunk_index: 3,
                total_chunks: 10,
                data,
            }
        );
    }

    #[test]
    fn non_tag_byte_decodes_as_legacy() {
        let raw = vec![0x00, 1, 2, 3];
        let decoded = BinaryFrame::decode(&raw).unwrap();
        assert_eq!(decoded, BinaryFrame::Legacy(raw));
    }

    #[test]
    fn empty_frame_decodes_as_legacy() {
        let decoded = BinaryFrame::decode(&[]).unwrap();
        assert_eq!(decoded, BinaryFrame::Legacy(vec![]));
    }

    #[test]
    fn truncated_tagged_frame_is_rejected() {
        let bytes = vec![DATA_CHUNK_TAG, 0, 0];
        assert!(BinaryFrame::decode(&bytes).is_err());
    }

    #[test]
    fn chunk_count_matches_spec_example() {
        // 100_000 bytes -> 2 chunks (65536 + 34464), per spec.md scenario 1.
        assert_eq!(chunk_count(100_000), 2);
        assert_eq!(chunk_count(200_000), 4);
        assert_eq!(chunk_count(CHUNK_SIZE as u64), 1);
        assert_eq!(chunk_count(CHUNK_SIZE as u64 + 1), 2);
        assert_eq!(chunk_count(0), 0);
    }
}
