use std::fmt;
use std::io;

use chunklink_frame::FrameError;
use chunklink_transfer::SessionError;
use chunklink_transport::TransportError;

// sysexits-style exit codes.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;
/// 128 + SIGINT.
pub const CANCELLED: i32 = 130;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::ConnectionReset => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Open { ref source, .. }
        | TransportError::Bind { ref source, .. }
        | TransportError::Connect { ref source, .. }
            if source.kind() == io::ErrorKind::PermissionDenied =>
        {
            CliError::new(PERMISSION_DENIED, format!("{context}: {err}"))
        }
        TransportError::Accept(source) | TransportError::Io(source) => io_error(context, source),
        TransportError::InvalidEndpoint(_) | TransportError::UnsupportedBaudRate(_) => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::FrameTooLarge { .. } => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        FrameError::Cancelled => CliError::new(CANCELLED, "exiting"),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Transport(err) => transport_error(context, err),
        SessionError::Frame(err) => frame_error(context, err),
        SessionError::InvalidConfig(_) => CliError::new(USAGE, format!("{context}: {err}")),
        SessionError::PayloadTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        SessionError::AckTimeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        SessionError::Cancelled => CliError::new(CANCELLED, "exiting"),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use super::*;

    #[test]
    fn maps_session_errors_to_exit_codes() {
        let timeout = session_error("send", SessionError::AckTimeout(Duration::from_secs(1)));
        assert_eq!(timeout.code, TIMEOUT);

        let cancelled = session_error("send", SessionError::Cancelled);
        assert_eq!(cancelled.code, CANCELLED);
        assert_eq!(cancelled.message, "exiting");

        let config = session_error("send", SessionError::InvalidConfig("bad".into()));
        assert_eq!(config.code, USAGE);

        let closed = session_error("send", SessionError::Frame(FrameError::ConnectionClosed));
        assert_eq!(closed.code, FAILURE);

        let interrupted_write = frame_error("send", FrameError::Cancelled);
        assert_eq!(interrupted_write.code, CANCELLED);
    }

    #[test]
    fn maps_transport_errors_to_exit_codes() {
        let missing = transport_error(
            "open",
            TransportError::Open {
                path: PathBuf::from("/dev/missing"),
                source: io::Error::from(io::ErrorKind::NotFound),
            },
        );
        assert_eq!(missing.code, TRANSPORT_ERROR);
        assert!(missing.message.starts_with("open: "));

        let denied = transport_error(
            "open",
            TransportError::Open {
                path: PathBuf::from("/dev/ttyS0"),
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            },
        );
        assert_eq!(denied.code, PERMISSION_DENIED);

        let baud = transport_error("open", TransportError::UnsupportedBaudRate(12345));
        assert_eq!(baud.code, USAGE);
    }
}
