//! Reliable chunked transfer over byte-oriented serial links.
//!
//! chunklink splits a payload into bounded frames, protects each with COBS
//! framing and a CRC-32, and sends them one at a time, waiting for the peer
//! to acknowledge each before the next.
//!
//! # Crate Structure
//!
//! - [`transport`]: the link (serial tty, Unix socket)
//! - [`frame`]: COBS frame codec and CRC-32 integrity layer
//! - [`transfer`]: stop-and-wait sender, receiver and ack messages

/// Re-export transport types.
pub mod transport {
    pub use chunklink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use chunklink_frame::*;
}

/// Re-export transfer types.
pub mod transfer {
    pub use chunklink_transfer::*;
}
