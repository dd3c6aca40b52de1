use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};
use chunklink_transport::{Link, TransportError};
use tracing::trace;

use crate::codec::{decode_frame, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 1024;
const READ_CHUNK_SIZE: usize = 512;

/// Reads delimiter-terminated frames from a [`Link`].
///
/// Partial frames are kept between calls, so a frame split across several
/// reads (or several read timeouts) is still delivered whole.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Link> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    ///
    /// Does not touch the link; see [`FrameReader::with_config_link`].
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Create a frame reader and apply the configured read timeout to the link.
    pub fn with_config_link(inner: T, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }

    /// Read the next frame payload.
    ///
    /// Consumes bytes until a delimiter is seen. Returns `Ok(None)` when the
    /// bounded read expires first; buffered partial bytes are kept for the
    /// next call. Returns `Err(FrameError::ConnectionClosed)` at end of stream.
    pub fn read_frame(&mut self) -> Result<Option<Bytes>> {
        loop {
            if let Some(payload) = self.next_buffered()? {
                return Ok(Some(payload));
            }

            match self.fill() {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(_) => continue,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_timeout(&err) => return Ok(None),
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Decode a frame that is already buffered, without touching the link.
    pub fn next_buffered(&mut self) -> Result<Option<Bytes>> {
        let frame = decode_frame(&mut self.buf, self.config.max_wire_len())?;
        if let Some(payload) = &frame {
            trace!(len = payload.len(), "frame decoded");
        }
        Ok(frame)
    }

    /// Whether a complete frame is waiting in the internal buffer.
    pub fn has_buffered_frame(&self) -> bool {
        self.buf.contains(&crate::codec::DELIMITER)
    }

    /// Borrow the underlying link.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying link.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner link.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    // Drain what the link already holds; block (bounded) only when it holds nothing.
    fn fill(&mut self) -> std::io::Result<usize> {
        let pending = self.inner.read_available().map_err(transport_to_io_error)?;
        if !pending.is_empty() {
            self.buf.extend_from_slice(&pending);
            return Ok(pending.len());
        }

        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let read = self.inner.read(&mut chunk)?;
        self.buf.extend_from_slice(&chunk[..read]);
        Ok(read)
    }
}

fn is_timeout(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

fn transport_to_io_error(err: TransportError) -> std::io::Error {
    match err {
        TransportError::Io(io) | TransportError::Accept(io) => io,
        TransportError::Open { source, .. }
        | TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. } => source,
        other => std::io::Error::other(other.to_string()),
    }
}

pub(crate) fn transport_to_frame_error(err: TransportError) -> FrameError {
    FrameError::Io(transport_to_io_error(err))
}
