use std::time::Duration;

use chunklink_frame::FrameError;

use crate::state::TransferState;

/// Errors that can occur while driving a transfer.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] chunklink_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[source] FrameError),

    /// The transfer configuration cannot be used.
    #[error("invalid transfer configuration: {0}")]
    InvalidConfig(String),

    /// The payload length does not fit the 32-bit size message.
    #[error("payload too large ({len} bytes, max {max})")]
    PayloadTooLarge { len: usize, max: usize },

    /// The operation is not valid in the session's current state.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: TransferState,
    },

    /// No acknowledgement arrived within the configured bound.
    #[error("no acknowledgement within {0:?}")]
    AckTimeout(Duration),

    /// The transfer was cancelled before it completed.
    #[error("transfer cancelled")]
    Cancelled,
}

impl From<FrameError> for SessionError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Cancelled => SessionError::Cancelled,
            other => SessionError::Frame(other),
        }
    }
}

/// Why a received command was not executed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// No handler is registered under the command's name.
    #[error("no callback registered for command: {0}")]
    Unregistered(String),

    /// The handler rejected the command.
    #[error("{0}")]
    Failed(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;
