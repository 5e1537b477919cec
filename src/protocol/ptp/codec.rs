//! Stream codec for back-to-back 11-byte frames.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::frame::Frame;
use crate::error::PtpError;

/// `tokio_util` codec framing a byte stream as consecutive [`Frame`]s.
///
/// There is no length prefix or delimiter; every frame occupies exactly
/// [`Frame::SIZE`] bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCodec;

impl FrameCodec {
    /// Create a new frame codec
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = PtpError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < Frame::SIZE {
            src.reserve(Frame::SIZE - src.len());
            return Ok(None);
        }
        let frame = Frame::decode(&src[..Frame::SIZE])?;
        src.advance(Frame::SIZE);
        Ok(Some(frame))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if src.is_empty() {
            return Ok(None);
        }
        // Truncated trailing frame
        let have = src.len();
        src.clear();
        Err(PtpError::MalformedFrame {
            needed: Frame::SIZE,
            have,
        })
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = PtpError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(Frame::SIZE);
        dst.put_slice(&item.encode());
        Ok(())
    }
}
