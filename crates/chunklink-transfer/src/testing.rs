//! In-memory [`Link`] for driving sessions without a device.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::rc::Rc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use chunklink_frame::{decode_frame, encode_frame};
use chunklink_transport::{Link, Result};

#[derive(Default)]
struct Shared {
    inbound: VecDeque<u8>,
    outbound: BytesMut,
    closed: bool,
}

/// Both handles returned by `duplicate` share one inbound queue and one
/// outbound log.
#[derive(Clone, Default)]
pub(crate) struct MockLink {
    shared: Rc<RefCell<Shared>>,
}

impl MockLink {
    /// Queue a framed message as if the peer had sent it.
    pub(crate) fn push_frame(&self, payload: &[u8]) {
        let mut wire = BytesMut::new();
        encode_frame(payload, &mut wire);
        self.push_raw(&wire);
    }

    pub(crate) fn push_raw(&self, bytes: &[u8]) {
        self.shared.borrow_mut().inbound.extend(bytes.iter().copied());
    }

    pub(crate) fn close(&self) {
        self.shared.borrow_mut().closed = true;
    }

    /// Decode and drain every frame written so far.
    pub(crate) fn take_frames(&self) -> Vec<Bytes> {
        let mut shared = self.shared.borrow_mut();
        let mut frames = Vec::new();
        while let Some(frame) = decode_frame(&mut shared.outbound, usize::MAX)
            .expect("mock peer received a malformed frame")
        {
            frames.push(frame);
        }
        frames
    }
}

impl Read for MockLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut shared = self.shared.borrow_mut();
        if shared.inbound.is_empty() {
            if shared.closed {
                return Ok(0);
            }
            return Err(io::Error::new(ErrorKind::WouldBlock, "no input"));
        }
        let n = buf.len().min(shared.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(shared.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MockLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut shared = self.shared.borrow_mut();
        if shared.closed {
            return Err(io::Error::new(ErrorKind::BrokenPipe, "closed"));
        }
        shared.outbound.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Link for MockLink {
    fn bytes_available(&self) -> Result<usize> {
        Ok(self.shared.borrow().inbound.len())
    }

    fn wait_readable(&self, _timeout: Duration) -> Result<bool> {
        let shared = self.shared.borrow();
        Ok(!shared.inbound.is_empty() || shared.closed)
    }

    fn wait_writable(&self, _timeout: Duration) -> Result<bool> {
        Ok(true)
    }

    fn set_read_timeout(&self, _timeout: Option<Duration>) -> Result<()> {
        Ok(())
    }

    fn duplicate(&self) -> Result<Self> {
        Ok(self.clone())
    }
}
