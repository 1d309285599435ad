// src/core/protocol/line_codec.rs

//! Implements newline-delimited framing for requests and replies, as an
//! `Encoder`/`Decoder` pair for use with `FramedRead`/`FramedWrite`.

use crate::core::ClientError;
use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

const LF: u8 = b'\n';

/// Upper bound on a single reply line. A server that streams more than this
/// without a newline is treated as broken.
pub const MAX_LINE_LENGTH: usize = 64 * 1024 * 1024;

/// A `tokio_util::codec` implementation for the line protocol.
///
/// Requests are encoded as the command text followed by `\n`. Replies are
/// decoded one line at a time with trailing whitespace (including `\r`) trimmed.
#[derive(Debug, Default)]
pub struct LineCodec {
    // Bytes already scanned for a newline, so a long partial line is not
    // rescanned from the start on every read.
    scanned: usize,
}

impl LineCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = ClientError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(offset) = src[self.scanned..].iter().position(|b| *b == LF) else {
            self.scanned = src.len();
            if src.len() > MAX_LINE_LENGTH {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("reply line exceeds {MAX_LINE_LENGTH} bytes"),
                )
                .into());
            }
            return Ok(None);
        };

        let pos = self.scanned + offset;
        self.scanned = 0;
        let line = String::from_utf8_lossy(&src[..pos]).trim_end().to_string();
        // Advance past the line and its delimiter.
        src.advance(pos + 1);
        Ok(Some(line))
    }

    /// A partial line left over when the peer closes is dropped: the stream
    /// simply ends, which the reader reports as a closed connection.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(line) => Ok(Some(line)),
            None => {
                src.clear();
                self.scanned = 0;
                Ok(None)
            }
        }
    }
}

impl Encoder<String> for LineCodec {
    type Error = ClientError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        put_line(item.as_bytes(), dst);
        Ok(())
    }
}

impl<'a> Encoder<&'a str> for LineCodec {
    type Error = ClientError;

    fn encode(&mut self, item: &'a str, dst: &mut BytesMut) -> Result<(), Self::Error> {
        put_line(item.as_bytes(), dst);
        Ok(())
    }
}

fn put_line(line: &[u8], dst: &mut BytesMut) {
    dst.reserve(line.len() + 1);
    dst.extend_from_slice(line);
    dst.extend_from_slice(&[LF]);
}
