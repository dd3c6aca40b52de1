use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::TransportError;

/// Prefix selecting a Unix-socket link instead of a serial device.
pub const UNIX_PREFIX: &str = "unix:";

/// Where a link lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// A serial device node such as `/dev/ttyUSB0` or `/dev/rfcomm0`.
    Serial(PathBuf),
    /// A Unix socket path, written as `unix:/path/to.sock`.
    Unix(PathBuf),
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(path) = s.strip_prefix(UNIX_PREFIX) {
            if path.is_empty() {
                return Err(TransportError::InvalidEndpoint(s.to_string()));
            }
            return Ok(Self::Unix(PathBuf::from(path)));
        }
        if s.is_empty() {
            return Err(TransportError::InvalidEndpoint(s.to_string()));
        }
        Ok(Self::Serial(PathBuf::from(s)))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Serial(path) => write!(f, "{}", path.display()),
            Endpoint::Unix(path) => write!(f, "{UNIX_PREFIX}{}", path.display()),
        }
    }
}

/// Settings for opening a link.
#[derive(Debug, Clone)]
pub struct LinkSettings {
    /// Endpoint to open.
    pub endpoint: Endpoint,
    /// Serial line speed. Ignored for socket endpoints. Default: 115200.
    pub baud_rate: u32,
    /// Bound on a single blocking read. Default: 1s.
    pub read_timeout: Duration,
}

impl LinkSettings {
    /// Default read bound.
    pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

    /// Settings for `endpoint` with default speed and read bound.
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            baud_rate: crate::DEFAULT_BAUD_RATE,
            read_timeout: Self::DEFAULT_READ_TIMEOUT,
        }
    }
}
