//! CRC-32 trailer for chunk payloads.
//!
//! The checksum is the standard reflected CRC-32 (polynomial `0xEDB88320`, as
//! used by zlib and PNG), appended little-endian. It covers the chunk bytes
//! only.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Size of the checksum trailer in bytes.
pub const CHECKSUM_SIZE: usize = 4;

/// Compute the CRC-32 of `data`.
pub fn crc32(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// CRC-32 of `data` as little-endian bytes.
pub fn crc32_le(data: &[u8]) -> [u8; CHECKSUM_SIZE] {
    crc32(data).to_le_bytes()
}

/// Append the checksum trailer: `chunk ++ crc32_le(chunk)`.
pub fn wrap(chunk: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(chunk.len() + CHECKSUM_SIZE);
    buf.put_slice(chunk);
    buf.put_slice(&crc32_le(chunk));
    buf.freeze()
}

/// Split off the trailer and report whether it matches the chunk.
pub fn unwrap(frame_payload: &[u8]) -> Result<(&[u8], bool)> {
    let (chunk, carried, computed) = split(frame_payload)?;
    Ok((chunk, carried == computed))
}

/// Split off the trailer, failing with [`FrameError::IntegrityMismatch`] if it does not match.
pub fn verify(frame_payload: &[u8]) -> Result<&[u8]> {
    let (chunk, carried, computed) = split(frame_payload)?;
    if carried != computed {
        return Err(FrameError::IntegrityMismatch {
            expected: carried,
            actual: computed,
        });
    }
    Ok(chunk)
}

fn split(frame_payload: &[u8]) -> Result<(&[u8], u32, u32)> {
    if frame_payload.len() < CHECKSUM_SIZE {
        return Err(FrameError::MissingChecksum {
            len: frame_payload.len(),
        });
    }
    let (chunk, trailer) = frame_payload.split_at(frame_payload.len() - CHECKSUM_SIZE);
    let mut carried = [0u8; CHECKSUM_SIZE];
    carried.copy_from_slice(trailer);
    Ok((chunk, u32::from_le_bytes(carried), crc32(chunk)))
}
