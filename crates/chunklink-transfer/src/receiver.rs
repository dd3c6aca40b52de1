use std::fmt;

use bytes::{Bytes, BytesMut};
use chunklink_frame::{integrity, FrameReader, FrameWriter};
use chunklink_transport::Link;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::TransferConfig;
use crate::error::{Result, SessionError};
use crate::message::{hex, ACK, ERR, SIZE_ACK};

// The announced size is untrusted; grow past this as chunks arrive.
const MAX_PREALLOCATION: usize = 64 * 1024;

/// Receiver-side session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiverState {
    WaitingForSize,
    Receiving,
    Complete,
}

impl fmt::Display for ReceiverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReceiverState::WaitingForSize => "waiting_for_size",
            ReceiverState::Receiving => "receiving",
            ReceiverState::Complete => "complete",
        })
    }
}

/// What the receiver did with one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverEvent {
    /// Size message accepted; `SIZE_ACK` sent.
    SizeAccepted { size: usize },
    /// Chunk checksum matched; `ACK` sent.
    ChunkAccepted { len: usize },
    /// Chunk discarded; `ERR` sent.
    ChunkRejected,
    /// Frame dropped without a reply.
    Ignored,
}

/// Counters for a finished receive.
#[derive(Debug, Clone, Serialize)]
pub struct ReceiveReport {
    pub state: ReceiverState,
    pub expected_bytes: usize,
    pub received_bytes: usize,
    pub chunks_accepted: usize,
    pub chunks_rejected: usize,
}

/// Receiving peer: answers the sender's size message and chunks.
///
/// A chunk whose checksum does not match (or that would overrun the announced
/// size) is answered with `ERR` and dropped; bytes already received are kept.
pub struct TransferReceiver<L> {
    reader: FrameReader<L>,
    writer: FrameWriter<L>,
    state: ReceiverState,
    expected: usize,
    data: BytesMut,
    config: TransferConfig,
    chunks_accepted: usize,
    chunks_rejected: usize,
}

impl<L: Link> TransferReceiver<L> {
    pub fn new(link: L, config: &TransferConfig) -> Result<Self> {
        config.validate()?;
        let frame_config = config.frame_config();
        let reader = FrameReader::with_config_link(link.duplicate()?, frame_config.clone())?;
        let writer = FrameWriter::with_config(link, frame_config);

        Ok(Self {
            reader,
            writer,
            state: ReceiverState::WaitingForSize,
            expected: 0,
            data: BytesMut::new(),
            config: config.clone(),
            chunks_accepted: 0,
            chunks_rejected: 0,
        })
    }

    /// Handle one decoded frame and send the matching reply.
    pub fn handle_frame(&mut self, frame: &[u8]) -> Result<ReceiverEvent> {
        match self.state {
            ReceiverState::WaitingForSize => self.handle_size(frame),
            ReceiverState::Receiving => self.handle_chunk(frame),
            ReceiverState::Complete => {
                debug!(len = frame.len(), "frame after completion ignored");
                Ok(ReceiverEvent::Ignored)
            }
        }
    }

    fn handle_size(&mut self, frame: &[u8]) -> Result<ReceiverEvent> {
        let Some(size_bytes) = frame.get(..4) else {
            warn!(len = frame.len(), "size message too short, ignored");
            return Ok(ReceiverEvent::Ignored);
        };
        let mut raw = [0u8; 4];
        raw.copy_from_slice(size_bytes);
        let size = u32::from_le_bytes(raw) as usize;

        self.expected = size;
        self.data = BytesMut::with_capacity(size.min(MAX_PREALLOCATION));
        info!(size, "size received");
        self.writer.send(SIZE_ACK)?;

        self.state = if size == 0 {
            info!("transfer complete");
            ReceiverState::Complete
        } else {
            ReceiverState::Receiving
        };
        Ok(ReceiverEvent::SizeAccepted { size })
    }

    fn handle_chunk(&mut self, frame: &[u8]) -> Result<ReceiverEvent> {
        let chunk = match integrity::verify(frame) {
            Ok(chunk) => chunk,
            Err(err) => {
                warn!(error = %err, offset = self.data.len(), "chunk rejected");
                return self.reject();
            }
        };

        if self.data.len() + chunk.len() > self.expected {
            warn!(
                offset = self.data.len(),
                len = chunk.len(),
                expected = self.expected,
                "chunk overruns announced size, rejected"
            );
            return self.reject();
        }

        debug!(chunk = %hex(chunk), "chunk accepted");
        let offset = self.data.len();
        self.data.extend_from_slice(chunk);
        self.chunks_accepted += 1;
        self.writer.send(ACK)?;
        info!(offset, len = chunk.len(), "chunk received");

        if self.data.len() >= self.expected {
            info!(total = self.data.len(), "transfer complete");
            self.state = ReceiverState::Complete;
        }
        Ok(ReceiverEvent::ChunkAccepted { len: chunk.len() })
    }

    fn reject(&mut self) -> Result<ReceiverEvent> {
        self.chunks_rejected += 1;
        self.writer.send(ERR)?;
        Ok(ReceiverEvent::ChunkRejected)
    }

    /// One wake of the event loop; see [`crate::TransferSession::poll`].
    pub fn poll(&mut self) -> Result<bool> {
        if !self.reader.has_buffered_frame()
            && !self.reader.get_ref().wait_readable(self.config.poll_interval)?
        {
            return Ok(false);
        }

        match self.reader.read_frame() {
            Ok(Some(frame)) => {
                self.handle_frame(&frame)?;
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(err) if err.is_recoverable() => {
                warn!(error = %err, "discarding malformed frame");
                Ok(true)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Poll until the announced size has been received; returns the payload.
    ///
    /// `cancel` is checked on every wake and while a reply waits for the link.
    pub fn run(&mut self, cancel: &CancellationToken) -> Result<Bytes> {
        self.writer.set_cancel_token(Some(cancel.clone()));
        while self.state != ReceiverState::Complete {
            if cancel.is_cancelled() {
                info!(received = self.data.len(), "receive cancelled");
                return Err(SessionError::Cancelled);
            }
            self.poll()?;
        }
        Ok(Bytes::copy_from_slice(&self.data))
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    /// Bytes received so far.
    pub fn payload(&self) -> &[u8] {
        &self.data
    }

    pub fn expected_len(&self) -> usize {
        self.expected
    }

    pub fn report(&self) -> ReceiveReport {
        ReceiveReport {
            state: self.state,
            expected_bytes: self.expected,
            received_bytes: self.data.len(),
            chunks_accepted: self.chunks_accepted,
            chunks_rejected: self.chunks_rejected,
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::net::UnixStream;
    use std::thread;
    use std::time::Duration;

    use chunklink_frame::integrity::wrap;

    use super::*;
    use crate::sender::TransferSession;
    use crate::state::TransferState;
    use crate::testing::MockLink;

    fn receiver() -> (TransferReceiver<MockLink>, MockLink) {
        let link = MockLink::default();
        let receiver = TransferReceiver::new(link.clone(), &TransferConfig::default()).unwrap();
        (receiver, link)
    }

    fn replies(link: &MockLink) -> Vec<Vec<u8>> {
        link.take_frames().into_iter().map(|f| f.to_vec()).collect()
    }

    #[test]
    fn accepts_size_and_chunks() {
        let (mut rx, link) = receiver();

        let event = rx.handle_frame(&6u32.to_le_bytes()).unwrap();
        assert_eq!(event, ReceiverEvent::SizeAccepted { size: 6 });
        assert_eq!(rx.state(), ReceiverState::Receiving);

        rx.handle_frame(&wrap(b"abcd")).unwrap();
        rx.handle_frame(&wrap(b"ef")).unwrap();
        assert_eq!(rx.state(), ReceiverState::Complete);
        assert_eq!(rx.payload(), b"abcdef");
        assert_eq!(replies(&link), [SIZE_ACK.to_vec(), ACK.to_vec(), ACK.to_vec()]);
    }

    #[test]
    fn corrupted_chunk_gets_err_and_keeps_prefix() {
        let (mut rx, link) = receiver();
        rx.handle_frame(&8u32.to_le_bytes()).unwrap();
        rx.handle_frame(&wrap(b"abcd")).unwrap();

        let mut bad = wrap(b"efgh").to_vec();
        bad[1] ^= 0x40;
        assert_eq!(rx.handle_frame(&bad).unwrap(), ReceiverEvent::ChunkRejected);
        assert_eq!(rx.payload(), b"abcd");
        assert_eq!(rx.state(), ReceiverState::Receiving);

        assert_eq!(rx.handle_frame(b"ab").unwrap(), ReceiverEvent::ChunkRejected);
        assert_eq!(
            replies(&link),
            [SIZE_ACK.to_vec(), ACK.to_vec(), ERR.to_vec(), ERR.to_vec()]
        );
        assert_eq!(rx.report().chunks_rejected, 2);
    }

    #[test]
    fn overrun_is_rejected() {
        let (mut rx, link) = receiver();
        rx.handle_frame(&3u32.to_le_bytes()).unwrap();
        assert_eq!(
            rx.handle_frame(&wrap(b"abcd")).unwrap(),
            ReceiverEvent::ChunkRejected
        );
        assert!(rx.payload().is_empty());
        assert_eq!(replies(&link).last().unwrap(), ERR);
    }

    #[test]
    fn zero_size_completes_immediately() {
        let (mut rx, link) = receiver();
        rx.handle_frame(&0u32.to_le_bytes()).unwrap();
        assert_eq!(rx.state(), ReceiverState::Complete);
        assert_eq!(replies(&link), [SIZE_ACK.to_vec()]);
        assert_eq!(rx.handle_frame(b"late").unwrap(), ReceiverEvent::Ignored);
    }

    #[test]
    fn short_size_message_is_ignored() {
        let (mut rx, link) = receiver();
        assert_eq!(rx.handle_frame(&[1, 2]).unwrap(), ReceiverEvent::Ignored);
        assert_eq!(rx.state(), ReceiverState::WaitingForSize);
        assert!(replies(&link).is_empty());
    }

    #[test]
    fn run_collects_payload_from_link() {
        let (mut rx, link) = receiver();
        link.push_frame(&5u32.to_le_bytes());
        link.push_frame(&wrap(b"hel"));
        link.push_frame(&wrap(b"lo"));

        let payload = rx.run(&CancellationToken::new()).unwrap();
        assert_eq!(payload.as_ref(), b"hello");
        assert_eq!(rx.report().chunks_accepted, 2);
    }

    #[test]
    fn sender_and_receiver_over_socket_pair() {
        let (left, right) = UnixStream::pair().unwrap();
        let config = TransferConfig {
            max_frame_size: 32,
            read_timeout: Duration::from_millis(200),
            poll_interval: Duration::from_millis(10),
            ..TransferConfig::default()
        };
        let payload: Vec<u8> = (0..500u32).map(|i| (i % 251) as u8).collect();

        let rx_config = config.clone();
        let receiver = thread::spawn(move || {
            let mut rx = TransferReceiver::new(right, &rx_config).unwrap();
            rx.run(&CancellationToken::new()).unwrap()
        });

        let mut session = TransferSession::new(left, payload.clone(), &config).unwrap();
        let report = session.run(&CancellationToken::new()).unwrap();

        let received = receiver.join().unwrap();
        assert_eq!(received.as_ref(), payload.as_slice());
        assert_eq!(report.state, TransferState::Complete);
        assert_eq!(report.chunks_sent, payload.len().div_ceil(26));
    }

    #[test]
    fn empty_transfer_over_socket_pair() {
        let (left, right) = UnixStream::pair().unwrap();
        let config = TransferConfig {
            poll_interval: Duration::from_millis(10),
            ..TransferConfig::default()
        };

        let rx_config = config.clone();
        let receiver = thread::spawn(move || {
            let mut rx = TransferReceiver::new(right, &rx_config).unwrap();
            rx.run(&CancellationToken::new()).unwrap()
        });

        let mut session = TransferSession::new(left, Bytes::new(), &config).unwrap();
        let report = session.run(&CancellationToken::new()).unwrap();

        assert!(receiver.join().unwrap().is_empty());
        assert_eq!(report.chunks_sent, 0);
        assert_eq!(report.acks_received, 1);
    }
}
