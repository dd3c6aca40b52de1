use std::io::{ErrorKind, Write};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use chunklink_transport::Link;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::codec::{encode_frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::reader::transport_to_frame_error;

const INITIAL_BUFFER_CAPACITY: usize = 512;
const WRITABLE_POLL: Duration = Duration::from_millis(100);
/// Upper bound on a single `write` call. A link that reports writable has at
/// least this much room, so a stalled peer blocks in the readiness wait
/// rather than inside `write(2)`.
const WRITE_SLICE: usize = 4096;

/// Writes delimiter-terminated frames to a [`Link`].
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
    cancel: Option<CancellationToken>,
}

impl<T: Link> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
            cancel: None,
        }
    }

    /// Abort sends with [`FrameError::Cancelled`] once `token` is cancelled.
    ///
    /// The token is checked before the frame is written and on every
    /// readiness wait, so a peer that stops reading cannot pin the writer.
    /// A frame cut short this way leaves a partial frame on the wire.
    pub fn set_cancel_token(&mut self, token: Option<CancellationToken>) {
        self.cancel = token;
    }

    /// Encode and send one payload as a frame. Returns the wire size.
    ///
    /// Waits for the link to report writable before every slice of the frame
    /// (bounded by `write_timeout` if set), then flushes.
    pub fn send(&mut self, payload: &[u8]) -> Result<usize> {
        let max = self.config.max_payload_len();
        if payload.len() > max {
            return Err(FrameError::FrameTooLarge {
                size: payload.len(),
                max,
            });
        }

        self.buf.clear();
        encode_frame(payload, &mut self.buf);

        let mut offset = 0usize;
        while offset < self.buf.len() {
            self.wait_writable()?;
            let end = (offset + WRITE_SLICE).min(self.buf.len());
            match self.inner.write(&self.buf[offset..end]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if matches!(err.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock) => {
                    continue
                }
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()?;
        trace!(wire_len = self.buf.len(), "frame written");
        Ok(self.buf.len())
    }

    /// Flush the underlying link.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying link.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying link.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner link.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    fn wait_writable(&self) -> Result<()> {
        let started = Instant::now();
        loop {
            if self.is_cancelled() {
                debug!("frame write cancelled");
                return Err(FrameError::Cancelled);
            }
            let ready = self
                .inner
                .wait_writable(WRITABLE_POLL)
                .map_err(transport_to_frame_error)?;
            if ready {
                return Ok(());
            }
            if let Some(limit) = self.config.write_timeout {
                if started.elapsed() >= limit {
                    return Err(FrameError::Io(std::io::Error::new(
                        ErrorKind::TimedOut,
                        "link did not become writable",
                    )));
                }
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|token| token.is_cancelled())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::Read;
    use std::os::unix::net::UnixStream;

    use super::*;
    use crate::codec::{decode_frame, DELIMITER};

    fn drain(peer: &mut UnixStream) -> BytesMut {
        peer.set_read_timeout(Some(Duration::from_millis(50))).unwrap();
        let mut out = BytesMut::new();
        let mut chunk = [0u8; 1024];
        while let Ok(n) = peer.read(&mut chunk) {
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }
        out
    }

    #[test]
    fn write_single_frame() {
        let (left, mut peer) = UnixStream::pair().unwrap();
        let mut writer = FrameWriter::new(left);

        let wire_len = writer.send(b"hello").unwrap();
        assert_eq!(wire_len, 7);

        let mut wire = drain(&mut peer);
        assert_eq!(wire.last(), Some(&DELIMITER));
        let payload = decode_frame(&mut wire, usize::MAX).unwrap().unwrap();
        assert_eq!(payload.as_ref(), b"hello");
    }

    #[test]
    fn write_multiple_frames() {
        let (left, mut peer) = UnixStream::pair().unwrap();
        let mut writer = FrameWriter::new(left);

        writer.send(&7u32.to_le_bytes()).unwrap();
        writer.send(b"one").unwrap();
        writer.send(b"").unwrap();

        let mut wire = drain(&mut peer);
        let f1 = decode_frame(&mut wire, usize::MAX).unwrap().unwrap();
        let f2 = decode_frame(&mut wire, usize::MAX).unwrap().unwrap();
        let f3 = decode_frame(&mut wire, usize::MAX).unwrap().unwrap();

        assert_eq!(f1.as_ref(), &7u32.to_le_bytes());
        assert_eq!(f2.as_ref(), b"one");
        assert!(f3.is_empty());
        assert!(wire.is_empty());
    }

    #[test]
    fn payload_too_large_rejected() {
        let (left, _peer) = UnixStream::pair().unwrap();
        let cfg = FrameConfig {
            max_frame_size: 8,
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config(left, cfg);

        writer.send(b"sixsix").unwrap();
        let err = writer.send(b"seven77").unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge { size: 7, max: 6 }));
    }

    #[test]
    fn write_after_peer_closed_fails() {
        let (left, peer) = UnixStream::pair().unwrap();
        drop(peer);
        let mut writer = FrameWriter::new(left);

        let err = writer.send(b"ACK").unwrap_err();
        assert!(matches!(err, FrameError::Io(_)));
    }

    #[test]
    fn cancelled_token_writes_nothing() {
        let (left, mut peer) = UnixStream::pair().unwrap();
        let mut writer = FrameWriter::new(left);
        let token = CancellationToken::new();
        token.cancel();
        writer.set_cancel_token(Some(token));

        let err = writer.send(b"ACK").unwrap_err();
        assert!(matches!(err, FrameError::Cancelled));
        assert!(drain(&mut peer).is_empty());
    }

    #[test]
    fn cancel_unblocks_writer_when_peer_stops_reading() {
        let (left, _peer) = UnixStream::pair().unwrap();
        let token = CancellationToken::new();
        let cfg = FrameConfig {
            max_frame_size: 8 << 20,
            ..FrameConfig::default()
        };

        let worker_token = token.clone();
        let (tx, rx) = std::sync::mpsc::channel();
        let handle = std::thread::spawn(move || {
            let mut writer = FrameWriter::with_config(left, cfg);
            writer.set_cancel_token(Some(worker_token));
            let _ = tx.send(writer.send(&vec![0x5A; 4 << 20]));
        });

        std::thread::sleep(Duration::from_millis(300));
        assert!(rx.try_recv().is_err(), "send should be stalled on the full socket");
        token.cancel();

        let result = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("send should return after cancellation");
        assert!(matches!(result, Err(FrameError::Cancelled)));
        handle.join().unwrap();
    }

    #[test]
    fn accessors_and_into_inner() {
        let (left, _peer) = UnixStream::pair().unwrap();
        let mut writer = FrameWriter::new(left);

        assert!(writer.config().write_timeout.is_none());
        let _ = writer.get_ref();
        let _ = writer.get_mut();
        let _inner = writer.into_inner();
    }
}
