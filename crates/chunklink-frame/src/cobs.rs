//! Consistent Overhead Byte Stuffing.
//!
//! Rewrites a payload so that it contains no `0x00` bytes, which leaves `0x00`
//! free to act as the frame delimiter on the wire. The payload is cut into
//! blocks at every zero byte (and after 254 non-zero bytes); each block is
//! prefixed with a code byte holding the distance to the next zero. A code of
//! `0xFF` marks a full block that is not followed by an implied zero.
//!
//! Worst-case overhead is one byte per 254 payload bytes, plus one for an
//! empty payload (`[] -> [0x01]`).

use bytes::{BufMut, BytesMut};

use crate::error::{FrameError, Result};

/// Longest run of non-zero bytes a single block can carry.
pub const MAX_BLOCK_DATA: usize = 254;

const FULL_BLOCK: u8 = 0xFF;

/// Upper bound on `encode` output length for an `len`-byte payload.
pub const fn max_encoded_len(len: usize) -> usize {
    len + len / MAX_BLOCK_DATA + 1
}

/// Append the COBS encoding of `src` to `dst`. No delimiter is written.
pub fn encode(src: &[u8], dst: &mut BytesMut) {
    dst.reserve(max_encoded_len(src.len()));

    let mut code_at = dst.len();
    dst.put_u8(0);
    let mut code: u8 = 1;

    for (i, &byte) in src.iter().enumerate() {
        if byte == 0 {
            dst[code_at] = code;
            code_at = dst.len();
            dst.put_u8(0);
            code = 1;
            continue;
        }

        dst.put_u8(byte);
        code += 1;

        // A full block ends here; only open another if there is more input.
        if code == FULL_BLOCK && i + 1 < src.len() {
            dst[code_at] = code;
            code_at = dst.len();
            dst.put_u8(0);
            code = 1;
        }
    }

    dst[code_at] = code;
}

/// Decode a COBS body (delimiter already stripped).
pub fn decode(src: &[u8]) -> Result<BytesMut> {
    let mut out = BytesMut::with_capacity(src.len());
    let mut pos = 0;

    while pos < src.len() {
        let code = src[pos];
        if code == 0 {
            return Err(FrameError::Malformed {
                offset: pos,
                reason: "zero code byte",
            });
        }

        let start = pos + 1;
        let end = pos + code as usize;
        if end > src.len() {
            return Err(FrameError::Malformed {
                offset: pos,
                reason: "block length runs past end of frame",
            });
        }

        let block = &src[start..end];
        if let Some(zero) = block.iter().position(|&b| b == 0) {
            return Err(FrameError::Malformed {
                offset: start + zero,
                reason: "zero byte inside encoded block",
            });
        }
        out.put_slice(block);

        pos = end;
        if code != FULL_BLOCK && pos < src.len() {
            out.put_u8(0);
        }
    }

    Ok(out)
}
