/// Errors that can occur during frame encoding/decoding and integrity checks.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The received bytes are not a valid COBS encoding.
    #[error("malformed frame at byte {offset}: {reason}")]
    Malformed { offset: usize, reason: &'static str },

    /// The frame exceeds the configured maximum wire size.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The frame payload is too short to carry a checksum.
    #[error("frame payload too short for checksum ({len} bytes)")]
    MissingChecksum { len: usize },

    /// The carried CRC-32 does not match the one computed over the chunk.
    #[error("integrity mismatch: carried {expected:#010x}, computed {actual:#010x}")]
    IntegrityMismatch { expected: u32, actual: u32 },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The link was closed by the other side.
    #[error("connection closed")]
    ConnectionClosed,

    /// The writer's cancellation token fired while a frame was in flight.
    #[error("write cancelled")]
    Cancelled,
}

impl FrameError {
    /// Errors that only affect the frame at hand; the link itself is still usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FrameError::Malformed { .. }
                | FrameError::FrameTooLarge { .. }
                | FrameError::MissingChecksum { .. }
                | FrameError::IntegrityMismatch { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
