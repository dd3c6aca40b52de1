//! Stop-and-wait chunked transfer over COBS-framed links.
//!
//! A [`TransferSession`] sends one payload: a size message first, then one
//! CRC-protected chunk per acknowledgement from the peer. A
//! [`TransferReceiver`] is the matching peer that answers `SIZE_ACK`, `ACK`
//! or `ERR` and reassembles the payload.
//!
//! There is no retransmission. If an acknowledgement is lost the sender waits
//! forever unless [`TransferConfig::ack_timeout`] is set, in which case it
//! aborts.

pub mod command;
pub mod config;
pub mod error;
pub mod message;
pub mod receiver;
pub mod sender;
pub mod state;

#[cfg(test)]
mod testing;

pub use command::{
    parse_commands, Command, CommandHandler, CommandInterpreter, CommandRecord, ExecutionStatus,
};
pub use config::{TransferConfig, DEFAULT_POLL_INTERVAL, DEFAULT_READ_TIMEOUT, MIN_FRAME_SIZE};
pub use error::{CommandError, Result, SessionError};
pub use message::{Response, ACK, ERR, SIZE_ACK};
pub use receiver::{ReceiveReport, ReceiverEvent, ReceiverState, TransferReceiver};
pub use sender::{ChunkOutcome, TransferReport, TransferSession};
pub use state::TransferState;
pub use tokio_util::sync::CancellationToken;
