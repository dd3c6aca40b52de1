use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::cobs;
use crate::error::{FrameError, Result};
use crate::integrity::CHECKSUM_SIZE;

/// Frame terminator. Never appears inside an encoded frame.
pub const DELIMITER: u8 = 0x00;

/// Default ceiling on a frame's wire size, delimiter included.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 256;

/// Per-frame overhead budgeted for the codec: one COBS code byte plus the delimiter.
pub const FRAME_OVERHEAD: usize = 2;

/// Largest chunk that fits a frame of `max_frame_size` once the checksum and
/// framing overhead are accounted for (`max_frame_size - 4 - 1 - 1`).
pub const fn max_chunk_payload(max_frame_size: usize) -> usize {
    max_frame_size.saturating_sub(CHECKSUM_SIZE + FRAME_OVERHEAD)
}

/// Append `cobs(payload) ++ DELIMITER` to `dst`.
///
/// Wire format:
/// ```text
/// ┌───────────────────────────────┬───────────┐
/// │ COBS(payload)                 │ 0x00      │
/// │ (zero-free, len + ⌈len/254⌉)  │ delimiter │
/// └───────────────────────────────┴───────────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) {
    cobs::encode(payload, dst);
    dst.put_u8(DELIMITER);
}

/// Decode one frame from the front of a receive buffer.
///
/// Returns `Ok(None)` if no delimiter has arrived yet. Otherwise the frame and
/// its delimiter are consumed, even when the body turns out to be malformed,
/// so the next call starts at a frame boundary. If `max_wire_len` bytes are
/// buffered without a delimiter the buffer is dropped and
/// [`FrameError::FrameTooLarge`] is returned.
pub fn decode_frame(src: &mut BytesMut, max_wire_len: usize) -> Result<Option<Bytes>> {
    let Some(end) = src.iter().position(|&b| b == DELIMITER) else {
        if src.len() > max_wire_len {
            let size = src.len();
            src.clear();
            return Err(FrameError::FrameTooLarge {
                size,
                max: max_wire_len,
            });
        }
        return Ok(None);
    };

    let body = src.split_to(end);
    src.advance(1);

    if body.len() + 1 > max_wire_len {
        return Err(FrameError::FrameTooLarge {
            size: body.len() + 1,
            max: max_wire_len,
        });
    }

    cobs::decode(&body).map(|payload| Some(payload.freeze()))
}

/// Configuration shared by frame readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Ceiling on a frame's wire size. Default: 256.
    pub max_frame_size: usize,
    /// Bound on a single link read. Default: 1s.
    pub read_timeout: Option<Duration>,
    /// Bound on waiting for the link to accept output. `None` waits indefinitely.
    pub write_timeout: Option<Duration>,
}

impl FrameConfig {
    /// Largest payload a writer accepts: `max_frame_size - FRAME_OVERHEAD`.
    pub fn max_payload_len(&self) -> usize {
        self.max_frame_size.saturating_sub(FRAME_OVERHEAD)
    }

    /// Largest wire frame a reader accepts: the true COBS worst case for
    /// [`Self::max_payload_len`], plus the delimiter.
    pub fn max_wire_len(&self) -> usize {
        cobs::max_encoded_len(self.max_payload_len()) + 1
    }

    /// Largest chunk that fits alongside its checksum.
    pub fn max_chunk_payload(&self) -> usize {
        max_chunk_payload(self.max_frame_size)
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            read_timeout: Some(Duration::from_secs(1)),
            write_timeout: None,
        }
    }
}

/// `tokio_util` codec with the same wire format as [`encode_frame`] / [`decode_frame`].
#[cfg(feature = "async")]
#[derive(Debug, Clone)]
pub struct CobsCodec {
    max_wire_len: usize,
}

#[cfg(feature = "async")]
impl CobsCodec {
    /// Codec enforcing the limits of `config`.
    pub fn new(config: &FrameConfig) -> Self {
        Self {
            max_wire_len: config.max_wire_len(),
        }
    }
}

#[cfg(feature = "async")]
impl Default for CobsCodec {
    fn default() -> Self {
        Self::new(&FrameConfig::default())
    }
}

#[cfg(feature = "async")]
impl tokio_util::codec::Decoder for CobsCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        decode_frame(src, self.max_wire_len)
    }
}

#[cfg(feature = "async")]
impl<T: AsRef<[u8]>> tokio_util::codec::Encoder<T> for CobsCodec {
    type Error = FrameError;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<()> {
        let payload = item.as_ref();
        let max = self.max_wire_len.saturating_sub(1);
        if cobs::max_encoded_len(payload.len()) > max {
            return Err(FrameError::FrameTooLarge {
                size: payload.len(),
                max,
            });
        }
        encode_frame(payload, dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrity::wrap;

    fn max_wire() -> usize {
        FrameConfig::default().max_wire_len()
    }

    #[test]
    fn encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        encode_frame(b"SIZE_ACK", &mut buf);

        assert_eq!(buf.last(), Some(&DELIMITER));
        assert_eq!(buf.iter().filter(|&&b| b == DELIMITER).count(), 1);

        let payload = decode_frame(&mut buf, max_wire()).unwrap().unwrap();
        assert_eq!(payload.as_ref(), b"SIZE_ACK");
        assert!(buf.is_empty());
    }

    #[test]
    fn empty_payload_roundtrip() {
        let mut buf = BytesMut::new();
        encode_frame(b"", &mut buf);
        assert_eq!(buf.as_ref(), &[0x01, 0x00]);

        let payload = decode_frame(&mut buf, max_wire()).unwrap().unwrap();
        assert!(payload.is_empty());
    }

    #[test]
    fn decode_incomplete_frame() {
        let mut buf = BytesMut::new();
        encode_frame(b"ACK", &mut buf);
        buf.truncate(buf.len() - 1);

        assert!(decode_frame(&mut buf, max_wire()).unwrap().is_none());
        assert_eq!(buf.len(), 4, "partial frame stays buffered");
    }

    #[test]
    fn multiple_frames() {
        let mut buf = BytesMut::new();
        encode_frame(b"SIZE_ACK", &mut buf);
        encode_frame(b"ACK", &mut buf);

        let f1 = decode_frame(&mut buf, max_wire()).unwrap().unwrap();
        let f2 = decode_frame(&mut buf, max_wire()).unwrap().unwrap();
        assert_eq!(f1.as_ref(), b"SIZE_ACK");
        assert_eq!(f2.as_ref(), b"ACK");
        assert!(decode_frame(&mut buf, max_wire()).unwrap().is_none());
    }

    #[test]
    fn malformed_frame_is_consumed() {
        let mut buf = BytesMut::from(&[0x05, 0x11, 0x00][..]);
        encode_frame(b"ACK", &mut buf);

        let err = decode_frame(&mut buf, max_wire()).unwrap_err();
        assert!(matches!(err, FrameError::Malformed { .. }));

        let next = decode_frame(&mut buf, max_wire()).unwrap().unwrap();
        assert_eq!(next.as_ref(), b"ACK");
    }

    #[test]
    fn runaway_frame_without_delimiter_is_dropped() {
        let mut buf = BytesMut::from(vec![0x42u8; 400].as_slice());
        let err = decode_frame(&mut buf, max_wire()).unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge { size: 400, .. }));
        assert!(buf.is_empty());
    }

    #[test]
    fn largest_chunk_fits_default_frame() {
        let config = FrameConfig::default();
        assert_eq!(config.max_chunk_payload(), 250);

        let chunk = vec![0xA5u8; config.max_chunk_payload()];
        let mut buf = BytesMut::new();
        encode_frame(&wrap(&chunk), &mut buf);
        assert!(buf.len() <= config.max_frame_size);

        let payload = decode_frame(&mut buf, config.max_wire_len()).unwrap().unwrap();
        assert_eq!(&payload[..chunk.len()], chunk.as_slice());
    }

    #[test]
    fn chunk_payload_formula() {
        assert_eq!(max_chunk_payload(256), 250);
        assert_eq!(max_chunk_payload(10), 4);
        assert_eq!(max_chunk_payload(6), 0);
        assert_eq!(max_chunk_payload(3), 0);
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn codec_reads_frames_from_async_stream() {
        use futures_util::StreamExt;
        use tokio_util::codec::{Encoder, FramedRead};

        let mut codec = CobsCodec::default();
        let mut wire = BytesMut::new();
        codec.encode(&b"SIZE_ACK"[..], &mut wire).unwrap();
        codec.encode(&b"ACK"[..], &mut wire).unwrap();

        let mut frames = FramedRead::new(&wire[..], CobsCodec::default());
        let first = frames.next().await.unwrap().unwrap();
        let second = frames.next().await.unwrap().unwrap();
        assert_eq!(first.as_ref(), b"SIZE_ACK");
        assert_eq!(second.as_ref(), b"ACK");
        assert!(frames.next().await.is_none());
    }

    #[cfg(feature = "async")]
    #[test]
    fn codec_rejects_oversized_payload() {
        use tokio_util::codec::Encoder;

        let mut codec = CobsCodec::default();
        let mut wire = BytesMut::new();
        let err = codec.encode(vec![1u8; 1024], &mut wire).unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge { .. }));
    }
}
