// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Chunked firmware transfer records.
//!
//! An upgrade image travels as a stream of [`ChunkFrame`]s, each carrying at
//! most [`MAX_CHUNK_SIZE`] payload bytes plus a lowercase-hex SHA-256 of that
//! payload. Frames are postcard-encoded on the wire; the transport that moves
//! them is out of scope here.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::metadata::COMPONENT_NAME_LEN;

/// Payload bytes per chunk, matching one flash sector.
pub const MAX_CHUNK_SIZE: usize = 4096;
/// Capacity of session id strings.
pub const SESSION_ID_LEN: usize = 32;
/// Hex digits in a SHA-256 digest.
pub const CHECKSUM_LEN: usize = 64;
/// Upper bound for an encoded [`ChunkFrame`], headers included.
pub const MAX_FRAME_LEN: usize = MAX_CHUNK_SIZE + 256;

/// Lowercase-hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> heapless::String<CHECKSUM_LEN> {
    let digest = Sha256::digest(data);
    let mut hex = [0u8; CHECKSUM_LEN];
    // 32 digest bytes always fit 64 hex digits.
    let _ = hex::encode_to_slice(digest, &mut hex);
    let mut out = heapless::String::new();
    let _ = out.push_str(core::str::from_utf8(&hex).unwrap_or(""));
    out
}

/// One piece of a component upload.
///
/// `chunk_size` duplicates `data.len()` so a receiver can account for the
/// chunk before touching the payload; [`verify_checksum`](Self::verify_checksum)
/// is the authority on payload integrity.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FirmwareChunk {
    pub chunk_index: u32,
    /// Chunks making up the whole component. A session adopts this figure
    /// from the first chunk when the manifest declared none.
    pub total_chunks: u32,
    pub chunk_size: u32,
    /// CPU-mapped destination address inside the target slot.
    pub target_address: u32,
    /// Lowercase-hex SHA-256 of `data`.
    pub checksum: heapless::String<CHECKSUM_LEN>,
    pub data: heapless::Vec<u8, MAX_CHUNK_SIZE>,
}

impl FirmwareChunk {
    /// Build a chunk over `data`, stamping size and checksum. Returns `None`
    /// if `data` exceeds [`MAX_CHUNK_SIZE`].
    pub fn new(
        chunk_index: u32,
        total_chunks: u32,
        target_address: u32,
        data: &[u8],
    ) -> Option<Self> {
        let data = heapless::Vec::from_slice(data).ok()?;
        let checksum = sha256_hex(&data);
        Some(Self {
            chunk_index,
            total_chunks,
            chunk_size: data.len() as u32,
            target_address,
            checksum,
            data,
        })
    }

    /// Recompute the payload digest and compare against the carried checksum.
    pub fn verify_checksum(&self) -> bool {
        sha256_hex(&self.data).as_str() == self.checksum.as_str()
    }
}

/// Transport-level frame: addresses a chunk to a session and component.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChunkFrame {
    pub session_id: heapless::String<SESSION_ID_LEN>,
    pub component: heapless::String<COMPONENT_NAME_LEN>,
    pub chunk: FirmwareChunk,
}

/// Postcard-encode a frame into `buf`, returning the used prefix.
pub fn encode_frame<'a>(frame: &ChunkFrame, buf: &'a mut [u8]) -> postcard::Result<&'a mut [u8]> {
    postcard::to_slice(frame, buf)
}

pub fn decode_frame(buf: &[u8]) -> postcard::Result<ChunkFrame> {
    postcard::from_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_known_vector() {
        let digest = sha256_hex(b"abc");
        assert_eq!(
            digest.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_sha256_hex_empty() {
        let digest = sha256_hex(b"");
        assert_eq!(
            digest.as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_chunk_new_stamps_size_and_checksum() {
        let chunk = FirmwareChunk::new(0, 4, 0x9000_0000, &[0xAA; 512]).unwrap();
        assert_eq!(chunk.chunk_size, 512);
        assert_eq!(chunk.data.len(), 512);
        assert!(chunk.verify_checksum());
    }

    #[test]
    fn test_chunk_new_rejects_oversized_payload() {
        let data = [0u8; MAX_CHUNK_SIZE + 1];
        assert!(FirmwareChunk::new(0, 1, 0x9000_0000, &data).is_none());
    }

    #[test]
    fn test_tampered_payload_fails_checksum() {
        let mut chunk = FirmwareChunk::new(0, 1, 0x9000_0000, &[0x55; 64]).unwrap();
        chunk.data[10] ^= 0x01;
        assert!(!chunk.verify_checksum());
    }

    #[test]
    fn test_frame_round_trip() {
        let chunk = FirmwareChunk::new(2, 8, 0x902B_1000, &[0x12; 256]).unwrap();
        let frame = ChunkFrame {
            session_id: heapless::String::try_from("session-1").unwrap(),
            component: heapless::String::try_from("application").unwrap(),
            chunk,
        };

        let mut buf = [0u8; MAX_FRAME_LEN];
        let used = encode_frame(&frame, &mut buf).unwrap();
        let decoded = decode_frame(used).unwrap();
        assert_eq!(decoded, frame);
    }
}
