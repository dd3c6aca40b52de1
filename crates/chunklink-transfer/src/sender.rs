use std::time::{Duration, Instant};

use bytes::Bytes;
use chunklink_frame::{integrity, FrameReader, FrameWriter};
use chunklink_transport::Link;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::TransferConfig;
use crate::error::{Result, SessionError};
use crate::message::{hex, Response};
use crate::state::TransferState;

/// What a call to [`TransferSession::send_next_chunk`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// A chunk covering `[offset, offset + len)` was written.
    Sent {
        offset: usize,
        len: usize,
        wire_len: usize,
    },
    /// The cursor had already passed the end; nothing was written.
    Complete,
}

/// Summary of a finished (or interrupted) transfer.
#[derive(Debug, Clone, Serialize)]
pub struct TransferReport {
    pub state: TransferState,
    pub total_bytes: usize,
    pub max_chunk_payload: usize,
    pub chunks_sent: usize,
    pub wire_bytes: usize,
    pub acks_received: usize,
    pub ignored_responses: usize,
    pub elapsed_ms: u64,
}

/// Sender side of a stop-and-wait transfer.
///
/// The session owns the payload and both halves of the link. At most one
/// frame is ever unacknowledged: a chunk is written only from
/// [`Self::on_ack_received`], after the size message or the previous chunk
/// has been acknowledged.
pub struct TransferSession<L> {
    reader: FrameReader<L>,
    writer: FrameWriter<L>,
    payload: Bytes,
    offset: usize,
    max_chunk_payload: usize,
    state: TransferState,
    config: TransferConfig,
    chunks_sent: usize,
    wire_bytes: usize,
    acks_received: usize,
    ignored_responses: usize,
    started: Option<Instant>,
    last_progress: Instant,
}

impl<L: Link> TransferSession<L> {
    /// Create an idle session for `payload` over `link`.
    pub fn new(link: L, payload: impl Into<Bytes>, config: &TransferConfig) -> Result<Self> {
        config.validate()?;
        let payload = payload.into();
        let max = u32::MAX as usize;
        if payload.len() > max {
            return Err(SessionError::PayloadTooLarge {
                len: payload.len(),
                max,
            });
        }

        let frame_config = config.frame_config();
        let reader = FrameReader::with_config_link(link.duplicate()?, frame_config.clone())?;
        let writer = FrameWriter::with_config(link, frame_config);

        Ok(Self {
            reader,
            writer,
            payload,
            offset: 0,
            max_chunk_payload: config.max_chunk_payload(),
            state: TransferState::Idle,
            config: config.clone(),
            chunks_sent: 0,
            wire_bytes: 0,
            acks_received: 0,
            ignored_responses: 0,
            started: None,
            last_progress: Instant::now(),
        })
    }

    /// Write the size message (`u32` little-endian, no checksum).
    pub fn announce_size(&mut self) -> Result<()> {
        if self.state != TransferState::Idle {
            return Err(SessionError::InvalidState {
                operation: "announce size",
                state: self.state,
            });
        }

        let size = (self.payload.len() as u32).to_le_bytes();
        debug!(size_buffer = %hex(&size), "size message");
        let wire_len = self.writer.send(&size)?;
        self.wire_bytes += wire_len;

        let now = Instant::now();
        self.started = Some(now);
        self.last_progress = now;
        self.state = TransferState::AwaitingSizeAck;
        info!(size = self.payload.len(), wire_len, "size sent");
        Ok(())
    }

    /// Write the chunk at the cursor, or complete if the cursor is past the end.
    ///
    /// The cursor always steps by the full chunk size, so after a short final
    /// chunk it ends up beyond the payload length.
    pub fn send_next_chunk(&mut self) -> Result<ChunkOutcome> {
        if self.state == TransferState::Idle {
            return Err(SessionError::InvalidState {
                operation: "send a chunk",
                state: self.state,
            });
        }

        if self.offset >= self.payload.len() {
            if self.state != TransferState::Complete {
                info!(total = self.payload.len(), chunks = self.chunks_sent, "all data sent");
                self.state = TransferState::Complete;
            }
            return Ok(ChunkOutcome::Complete);
        }

        let offset = self.offset;
        let end = (offset + self.max_chunk_payload).min(self.payload.len());
        let packet = integrity::wrap(&self.payload[offset..end]);
        debug!(packet = %hex(&packet), "chunk packet");

        let wire_len = self.writer.send(&packet)?;
        self.offset += self.max_chunk_payload;
        self.chunks_sent += 1;
        self.wire_bytes += wire_len;
        self.last_progress = Instant::now();
        self.state = TransferState::Sending;

        info!(offset, size = packet.len(), "chunk sent");
        Ok(ChunkOutcome::Sent {
            offset,
            len: end - offset,
            wire_len,
        })
    }

    /// Dispatch one decoded message from the receiver.
    ///
    /// `SIZE_ACK` and `ACK` send the next chunk. Anything else is logged and
    /// leaves the cursor and state untouched. Returns what was sent, if anything.
    pub fn on_ack_received(&mut self, message: &[u8]) -> Result<Option<ChunkOutcome>> {
        let response = Response::parse(message);
        info!(response = %response, "response received");

        if response.is_ack() {
            return match self.state {
                TransferState::Idle => {
                    warn!(response = %response, "acknowledgement before size announcement, ignored");
                    self.ignored_responses += 1;
                    Ok(None)
                }
                TransferState::Complete => {
                    self.acks_received += 1;
                    info!("all data already sent");
                    Ok(None)
                }
                TransferState::AwaitingSizeAck | TransferState::Sending => {
                    self.acks_received += 1;
                    self.send_next_chunk().map(Some)
                }
            };
        }

        match response {
            Response::Reject => {
                warn!(offset = self.offset, "receiver rejected the last chunk; not retransmitting");
            }
            other => warn!(response = %other, "unrecognized response"),
        }
        self.ignored_responses += 1;
        Ok(None)
    }

    /// One wake of the event loop.
    ///
    /// Dispatches a frame that is already buffered, or waits up to
    /// `poll_interval` for the link to become readable and dispatches at most
    /// one frame. Returns whether a frame was consumed.
    pub fn poll(&mut self) -> Result<bool> {
        if !self.reader.has_buffered_frame() {
            let readable = self.reader.get_ref().wait_readable(self.config.poll_interval)?;
            if !readable {
                self.check_ack_timeout()?;
                return Ok(false);
            }
        }

        match self.reader.read_frame() {
            Ok(Some(frame)) => {
                debug!(frame = %hex(&frame), "frame received");
                self.on_ack_received(&frame)?;
                Ok(true)
            }
            Ok(None) => {
                self.check_ack_timeout()?;
                Ok(false)
            }
            Err(err) if err.is_recoverable() => {
                warn!(error = %err, "discarding malformed response");
                self.ignored_responses += 1;
                Ok(true)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Announce the size (if still idle) and poll until the transfer completes.
    ///
    /// `cancel` is checked before anything is written, on every wake, and
    /// while a frame waits for the link to drain. Cancellation abandons any
    /// in-flight frame without notifying the peer.
    pub fn run(&mut self, cancel: &CancellationToken) -> Result<TransferReport> {
        self.writer.set_cancel_token(Some(cancel.clone()));
        let result = self.drive(cancel);
        self.writer.set_cancel_token(None);
        if matches!(result, Err(SessionError::Cancelled)) {
            info!(offset = self.offset, state = %self.state, "transfer cancelled");
        }
        result
    }

    fn drive(&mut self, cancel: &CancellationToken) -> Result<TransferReport> {
        if cancel.is_cancelled() {
            return Err(SessionError::Cancelled);
        }
        if self.state == TransferState::Idle {
            self.announce_size()?;
        }

        while self.state != TransferState::Complete {
            if cancel.is_cancelled() {
                return Err(SessionError::Cancelled);
            }
            self.poll()?;
        }

        Ok(self.report())
    }

    /// Counters and timing for the session so far.
    pub fn report(&self) -> TransferReport {
        let elapsed = self.started.map(|t| t.elapsed()).unwrap_or(Duration::ZERO);
        TransferReport {
            state: self.state,
            total_bytes: self.payload.len(),
            max_chunk_payload: self.max_chunk_payload,
            chunks_sent: self.chunks_sent,
            wire_bytes: self.wire_bytes,
            acks_received: self.acks_received,
            ignored_responses: self.ignored_responses,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    /// Cursor into the payload. May exceed [`Self::total_len`] once complete.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn total_len(&self) -> usize {
        self.payload.len()
    }

    pub fn max_chunk_payload(&self) -> usize {
        self.max_chunk_payload
    }

    pub fn is_complete(&self) -> bool {
        self.state == TransferState::Complete
    }

    fn check_ack_timeout(&self) -> Result<()> {
        let Some(limit) = self.config.ack_timeout else {
            return Ok(());
        };
        let waiting = matches!(
            self.state,
            TransferState::AwaitingSizeAck | TransferState::Sending
        );
        if waiting && self.last_progress.elapsed() >= limit {
            warn!(offset = self.offset, timeout = ?limit, "no acknowledgement, giving up");
            return Err(SessionError::AckTimeout(limit));
        }
        Ok(())
    }
}
