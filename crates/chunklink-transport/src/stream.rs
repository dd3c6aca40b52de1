use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::time::Duration;

use crate::error::Result;
use crate::serial::SerialPort;
use crate::traits::Link;

/// A connected link endpoint returned by [`crate::open`] and the socket listener.
pub struct LinkStream {
    inner: LinkStreamInner,
}

enum LinkStreamInner {
    Serial(SerialPort),
    Unix(UnixStream),
}

impl LinkStream {
    pub(crate) fn from_serial(port: SerialPort) -> Self {
        Self {
            inner: LinkStreamInner::Serial(port),
        }
    }

    pub(crate) fn from_unix(stream: UnixStream) -> Self {
        Self {
            inner: LinkStreamInner::Unix(stream),
        }
    }

    /// Discard input received before the session started.
    pub fn clear_input(&mut self) -> Result<usize> {
        match &mut self.inner {
            LinkStreamInner::Serial(port) => port.clear_input(),
            LinkStreamInner::Unix(stream) => {
                let mut dropped = 0;
                loop {
                    let stale = Link::read_available(stream)?;
                    if stale.is_empty() {
                        return Ok(dropped);
                    }
                    dropped += stale.len();
                }
            }
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            LinkStreamInner::Serial(_) => "serial",
            LinkStreamInner::Unix(_) => "unix-socket",
        }
    }
}

impl Read for LinkStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            LinkStreamInner::Serial(port) => port.read(buf),
            LinkStreamInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for LinkStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            LinkStreamInner::Serial(port) => port.write(buf),
            LinkStreamInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            LinkStreamInner::Serial(port) => port.flush(),
            LinkStreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl Link for LinkStream {
    fn bytes_available(&self) -> Result<usize> {
        match &self.inner {
            LinkStreamInner::Serial(port) => port.bytes_available(),
            LinkStreamInner::Unix(stream) => stream.bytes_available(),
        }
    }

    fn wait_readable(&self, timeout: Duration) -> Result<bool> {
        match &self.inner {
            LinkStreamInner::Serial(port) => port.wait_readable(timeout),
            LinkStreamInner::Unix(stream) => stream.wait_readable(timeout),
        }
    }

    fn wait_writable(&self, timeout: Duration) -> Result<bool> {
        match &self.inner {
            LinkStreamInner::Serial(port) => port.wait_writable(timeout),
            LinkStreamInner::Unix(stream) => stream.wait_writable(timeout),
        }
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            LinkStreamInner::Serial(port) => port.set_read_timeout(timeout),
            LinkStreamInner::Unix(stream) => Link::set_read_timeout(stream, timeout),
        }
    }

    fn duplicate(&self) -> Result<Self> {
        match &self.inner {
            LinkStreamInner::Serial(port) => Ok(Self::from_serial(port.duplicate()?)),
            LinkStreamInner::Unix(stream) => Ok(Self::from_unix(stream.try_clone()?)),
        }
    }
}

impl std::fmt::Debug for LinkStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkStream")
            .field("type", &self.transport_name())
            .finish()
    }
}
