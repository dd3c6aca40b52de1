use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;

/// A bidirectional byte link with no message boundaries.
///
/// Implementors are plain byte pipes (a serial tty, a socket). Framing is
/// layered on top by `chunklink-frame`. Reads are bounded by the configured
/// read timeout and report an expired timeout as `ErrorKind::TimedOut` or
/// `ErrorKind::WouldBlock`; `Ok(0)` always means the link was closed.
pub trait Link: Read + Write {
    /// Number of bytes that can be read without blocking.
    fn bytes_available(&self) -> Result<usize>;

    /// Block for at most `timeout` until the link has input (or hung up).
    fn wait_readable(&self, timeout: Duration) -> Result<bool>;

    /// Block for at most `timeout` until the link accepts output.
    fn wait_writable(&self, timeout: Duration) -> Result<bool>;

    /// Bound a single blocking read. `None` blocks indefinitely.
    fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()>;

    /// Open a second handle to the same link, for split reader/writer use.
    fn duplicate(&self) -> Result<Self>
    where
        Self: Sized;

    /// Read whatever is currently buffered, without waiting for more.
    fn read_available(&mut self) -> Result<Vec<u8>> {
        let pending = self.bytes_available()?;
        if pending == 0 {
            return Ok(Vec::new());
        }
        let mut buf = vec![0u8; pending];
        let read = self.read(&mut buf)?;
        buf.truncate(read);
        Ok(buf)
    }
}
