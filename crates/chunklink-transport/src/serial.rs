use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::fd;
use crate::traits::Link;

/// A serial tty configured for raw 8N1 byte transfer.
///
/// Reads are bounded through termios `VTIME` (tenths of a second, max 25.5s)
/// with `VMIN = 0`, so an idle line returns after the read timeout. That
/// zero-length return is surfaced as `ErrorKind::TimedOut` to keep `Ok(0)`
/// meaning end of stream.
pub struct SerialPort {
    file: File,
    path: PathBuf,
    baud_rate: u32,
}

impl SerialPort {
    /// Default line speed.
    pub const DEFAULT_BAUD_RATE: u32 = crate::DEFAULT_BAUD_RATE;

    /// Open `path` in raw mode at `baud_rate` with the given read bound.
    pub fn open(path: impl AsRef<Path>, baud_rate: u32, read_timeout: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let speed =
            baud_constant(baud_rate).ok_or(TransportError::UnsupportedBaudRate(baud_rate))?;

        // O_NONBLOCK keeps open() from waiting on carrier detect; it is cleared
        // again once CLOCAL is set.
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(&path)
            .map_err(|source| TransportError::Open {
                path: path.clone(),
                source,
            })?;

        let port = Self {
            file,
            path,
            baud_rate,
        };
        port.configure(speed, read_timeout)?;
        port.set_blocking()?;

        info!(path = ?port.path, baud_rate, "serial port opened");
        Ok(port)
    }

    /// The device path this port was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Configured line speed.
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Drop any input the kernel buffered before now. Returns how many bytes were queued.
    pub fn clear_input(&mut self) -> Result<usize> {
        let stale = fd::bytes_available(self.fd())?;

        // SAFETY: the descriptor is open for the lifetime of `self.file`.
        let rc = unsafe { libc::tcflush(self.fd(), libc::TCIFLUSH) };
        if rc != 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        debug!(path = ?self.path, stale, "input buffer flushed");
        Ok(stale)
    }

    /// Re-apply termios with a different read bound.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        let mut tio = self.termios()?;
        apply_read_timeout(&mut tio, timeout);
        self.set_termios(&tio)
    }

    /// Open a second handle on the same device.
    pub fn duplicate(&self) -> Result<Self> {
        Ok(Self {
            file: self.file.try_clone()?,
            path: self.path.clone(),
            baud_rate: self.baud_rate,
        })
    }

    fn fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }

    fn configure(&self, speed: libc::speed_t, read_timeout: Duration) -> Result<()> {
        let mut tio = self.termios()?;

        // SAFETY: `tio` is a termios value previously filled in by tcgetattr.
        unsafe {
            libc::cfmakeraw(&mut tio);
        }
        tio.c_cflag |= libc::CLOCAL | libc::CREAD;
        tio.c_cflag &= !(libc::CSTOPB | libc::PARENB);
        apply_read_timeout(&mut tio, Some(read_timeout));

        // SAFETY: as above; speed constants come from `baud_constant`.
        let rc = unsafe {
            libc::cfsetispeed(&mut tio, speed) | libc::cfsetospeed(&mut tio, speed)
        };
        if rc != 0 {
            return Err(self.configure_error(std::io::Error::last_os_error()));
        }

        self.set_termios(&tio)
    }

    fn termios(&self) -> Result<libc::termios> {
        // SAFETY: termios is plain old data; tcgetattr overwrites every field.
        let mut tio: libc::termios = unsafe { std::mem::zeroed() };
        // SAFETY: `tio` is valid and writable, the descriptor is open.
        let rc = unsafe { libc::tcgetattr(self.fd(), &mut tio) };
        if rc != 0 {
            return Err(self.configure_error(std::io::Error::last_os_error()));
        }
        Ok(tio)
    }

    fn set_termios(&self, tio: &libc::termios) -> Result<()> {
        // SAFETY: `tio` points to an initialized termios, the descriptor is open.
        let rc = unsafe { libc::tcsetattr(self.fd(), libc::TCSANOW, tio) };
        if rc != 0 {
            return Err(self.configure_error(std::io::Error::last_os_error()));
        }
        Ok(())
    }

    fn set_blocking(&self) -> Result<()> {
        // SAFETY: F_GETFL/F_SETFL on an open descriptor.
        let rc = unsafe {
            let flags = libc::fcntl(self.fd(), libc::F_GETFL);
            if flags < 0 {
                flags
            } else {
                libc::fcntl(self.fd(), libc::F_SETFL, flags & !libc::O_NONBLOCK)
            }
        };
        if rc < 0 {
            return Err(self.configure_error(std::io::Error::last_os_error()));
        }
        Ok(())
    }

    fn configure_error(&self, err: std::io::Error) -> TransportError {
        TransportError::Configure {
            path: self.path.clone(),
            reason: err.to_string(),
        }
    }
}

fn apply_read_timeout(tio: &mut libc::termios, timeout: Option<Duration>) {
    // VMIN=0/VTIME=0 would make reads non-blocking; an unbounded read waits
    // for at least one byte instead.
    let (vmin, vtime) = match timeout {
        None => (1, 0),
        Some(timeout) => (0, read_timeout_deciseconds(timeout)),
    };
    tio.c_cc[libc::VMIN] = vmin;
    tio.c_cc[libc::VTIME] = vtime;
}

/// termios `VTIME` for a read bound, clamped to 0.1s..=25.5s.
pub(crate) fn read_timeout_deciseconds(timeout: Duration) -> libc::cc_t {
    let tenths = timeout.as_millis().div_ceil(100);
    tenths.clamp(1, libc::cc_t::MAX as u128) as libc::cc_t
}

/// Map a numeric line speed to its termios constant.
pub(crate) fn baud_constant(baud_rate: u32) -> Option<libc::speed_t> {
    let speed = match baud_rate {
        1200 => libc::B1200,
        2400 => libc::B2400,
        4800 => libc::B4800,
        9600 => libc::B9600,
        19_200 => libc::B19200,
        38_400 => libc::B38400,
        57_600 => libc::B57600,
        115_200 => libc::B115200,
        230_400 => libc::B230400,
        _ => return None,
    };
    Some(speed)
}

impl Read for SerialPort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.file.read(buf)? {
            0 => Err(std::io::Error::new(ErrorKind::TimedOut, "serial read timed out")),
            n => Ok(n),
        }
    }
}

impl Write for SerialPort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        // SAFETY: the descriptor is open; tcdrain blocks until output is sent.
        let rc = unsafe { libc::tcdrain(self.fd()) };
        if rc != 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Link for SerialPort {
    fn bytes_available(&self) -> Result<usize> {
        fd::bytes_available(self.fd())
    }

    fn wait_readable(&self, timeout: Duration) -> Result<bool> {
        fd::wait_readable(self.fd(), timeout)
    }

    fn wait_writable(&self, timeout: Duration) -> Result<bool> {
        fd::wait_writable(self.fd(), timeout)
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        SerialPort::set_read_timeout(self, timeout)
    }

    fn duplicate(&self) -> Result<Self> {
        SerialPort::duplicate(self)
    }
}

impl std::fmt::Debug for SerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialPort")
            .field("path", &self.path)
            .field("baud_rate", &self.baud_rate)
            .finish()
    }
}
