use std::fmt;

use bytes::Bytes;

/// Receiver reply acknowledging the size message.
pub const SIZE_ACK: &[u8] = b"SIZE_ACK";
/// Receiver reply acknowledging a chunk whose checksum matched.
pub const ACK: &[u8] = b"ACK";
/// Receiver reply rejecting a chunk (checksum mismatch or overrun).
pub const ERR: &[u8] = b"ERR";

/// A decoded receiver -> sender message.
///
/// Tokens match byte-for-byte; `b"ack"` or `b"ACK\n"` are unrecognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    SizeAck,
    ChunkAck,
    /// The receiver rejected the last chunk. The sender does not retransmit,
    /// so this is handled like any unrecognized message.
    Reject,
    Unrecognized(Bytes),
}

impl Response {
    pub fn parse(payload: &[u8]) -> Self {
        match payload {
            SIZE_ACK => Response::SizeAck,
            ACK => Response::ChunkAck,
            ERR => Response::Reject,
            other => Response::Unrecognized(Bytes::copy_from_slice(other)),
        }
    }

    /// Whether this message lets the sender move on to the next chunk.
    pub fn is_ack(&self) -> bool {
        matches!(self, Response::SizeAck | Response::ChunkAck)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::SizeAck => f.write_str("SIZE_ACK"),
            Response::ChunkAck => f.write_str("ACK"),
            Response::Reject => f.write_str("ERR"),
            Response::Unrecognized(raw) => write!(f, "{}", String::from_utf8_lossy(raw)),
        }
    }
}

/// Space-separated lowercase hex, for `debug!` dumps of frames.
pub(crate) fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
