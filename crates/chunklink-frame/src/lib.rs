//! COBS framing and CRC-32 integrity for chunklink.
//!
//! Every frame on the wire is `COBS(payload) ++ 0x00`. The encoding never
//! produces a zero byte, so the single `0x00` delimiter is enough to find
//! frame boundaries in a raw byte stream. Data chunks additionally carry a
//! 4-byte little-endian CRC-32 trailer inside the payload (see [`integrity`]).
//!
//! Wire format of a data chunk:
//! ```text
//! ┌──────────────────────────────────────────┬───────────┐
//! │ COBS( chunk ++ crc32_le(chunk) )         │ 0x00      │
//! └──────────────────────────────────────────┴───────────┘
//! ```

pub mod cobs;
pub mod codec;
pub mod error;
pub mod integrity;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub use codec::CobsCodec;
pub use codec::{
    decode_frame, encode_frame, max_chunk_payload, FrameConfig, DEFAULT_MAX_FRAME_SIZE, DELIMITER,
    FRAME_OVERHEAD,
};
pub use error::{FrameError, Result};
pub use integrity::{crc32, CHECKSUM_SIZE};
pub use reader::FrameReader;
pub use writer::FrameWriter;
