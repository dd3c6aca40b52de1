//! Byte-oriented link abstraction.
//!
//! Provides a unified interface over the links chunklink runs on:
//! - Serial ttys in raw mode (USB/UART adapters, Bluetooth RFCOMM)
//! - Unix domain sockets (loopback testing, local peers)
//!
//! This is the lowest layer of chunklink. Everything else builds on top of
//! the [`Link`] trait and the [`LinkStream`] type provided here.

pub mod error;
pub mod settings;
pub mod traits;

#[cfg(unix)]
mod fd;
#[cfg(unix)]
pub mod serial;
#[cfg(unix)]
pub mod stream;
#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use settings::{Endpoint, LinkSettings, UNIX_PREFIX};
pub use traits::Link;

#[cfg(unix)]
pub use serial::SerialPort;
#[cfg(unix)]
pub use stream::LinkStream;
#[cfg(unix)]
pub use uds::{connect, SocketListener};

/// Default serial line speed.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Open the link described by `settings`.
///
/// Serial endpoints are opened and configured directly. Socket endpoints
/// connect to a listening peer; use [`SocketListener`] for the accepting side.
#[cfg(unix)]
pub fn open(settings: &LinkSettings) -> Result<LinkStream> {
    match &settings.endpoint {
        Endpoint::Serial(path) => {
            let port = SerialPort::open(path, settings.baud_rate, settings.read_timeout)?;
            Ok(LinkStream::from_serial(port))
        }
        Endpoint::Unix(path) => {
            let stream = connect(path)?;
            stream.set_read_timeout(Some(settings.read_timeout))?;
            Ok(stream)
        }
    }
}
