use std::time::Duration;

use chunklink_frame::{max_chunk_payload, FrameConfig, DEFAULT_MAX_FRAME_SIZE};

use crate::error::{Result, SessionError};

/// Smallest frame that still carries one payload byte per chunk.
pub const MIN_FRAME_SIZE: usize = 7;

/// Default bound on a single link read.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Default idle wait between event-loop wakes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Configuration for a transfer session (either side).
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Nominal frame size. Default: 256.
    ///
    /// Chunks are sized as `max_frame_size - 6`, which budgets a single COBS
    /// code byte. That holds while the encoded body fits one 254-byte block,
    /// so for values up to 256 this is a hard ceiling on wire size. Above
    /// that, COBS adds one code byte per further 254 bytes and a full chunk
    /// can exceed it: at 512 a full chunk is 514 bytes on the wire. Readers
    /// accept the true worst case, so both ends agree.
    pub max_frame_size: usize,
    /// Bound on a single link read. Default: 1s.
    pub read_timeout: Duration,
    /// How long one wake waits for input before re-checking cancellation.
    pub poll_interval: Duration,
    /// Abort if no acknowledgement arrives within this bound.
    ///
    /// `None` (the default) waits forever: a dropped `ACK` stalls the
    /// session. Expiry aborts with [`SessionError::AckTimeout`]; nothing is
    /// ever retransmitted.
    pub ack_timeout: Option<Duration>,
}

impl TransferConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_frame_size < MIN_FRAME_SIZE {
            return Err(SessionError::InvalidConfig(format!(
                "max_frame_size must be at least {MIN_FRAME_SIZE} (got {})",
                self.max_frame_size
            )));
        }
        if self.read_timeout.is_zero() {
            return Err(SessionError::InvalidConfig(
                "read_timeout must be non-zero".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(SessionError::InvalidConfig(
                "poll_interval must be non-zero".to_string(),
            ));
        }
        if matches!(self.ack_timeout, Some(timeout) if timeout.is_zero()) {
            return Err(SessionError::InvalidConfig(
                "ack_timeout must be non-zero when set".to_string(),
            ));
        }
        Ok(())
    }

    /// `max_frame_size - 4 (crc) - 1 (delimiter) - 1 (code byte)`.
    pub fn max_chunk_payload(&self) -> usize {
        max_chunk_payload(self.max_frame_size)
    }

    /// Frame reader/writer settings derived from this configuration.
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_frame_size: self.max_frame_size,
            read_timeout: Some(self.read_timeout),
            write_timeout: None,
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            read_timeout: DEFAULT_READ_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            ack_timeout: None,
        }
    }
}
