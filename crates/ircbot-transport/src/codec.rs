//! Line codec for IRC traffic.
//!
//! Unlike `LinesCodec` this never fails on bytes that are not valid UTF-8,
//! which IRC servers relay freely: such lines are decoded lossily. Overlong
//! lines are discarded up to the next terminator instead of ending the stream.

use std::io;

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

/// Upper bound for a single inbound line.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 8192;

#[derive(Debug, Clone)]
pub struct IrcLineCodec {
    max_length: usize,
    /// Bytes already scanned for `\n` in the current buffer.
    next_index: usize,
    discarding: bool,
}

impl IrcLineCodec {
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_LINE_LENGTH)
    }

    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarding: false,
        }
    }

    fn take_line(buf: &mut BytesMut, newline: usize) -> String {
        let line = buf.split_to(newline + 1);
        let line = &line[..newline];
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        String::from_utf8_lossy(line).into_owned()
    }
}

impl Default for IrcLineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for IrcLineCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, io::Error> {
        loop {
            let scan_to = if self.discarding {
                buf.len()
            } else {
                buf.len().min(self.max_length + 1)
            };
            let newline = buf[self.next_index.min(scan_to)..scan_to]
                .iter()
                .position(|b| *b == b'\n')
                .map(|offset| offset + self.next_index);

            match (self.discarding, newline) {
                (true, Some(at)) => {
                    // drop the tail of the overlong line and resume
                    let _ = buf.split_to(at + 1);
                    self.next_index = 0;
                    self.discarding = false;
                }
                (true, None) => {
                    buf.clear();
                    self.next_index = 0;
                    return Ok(None);
                }
                (false, Some(at)) => {
                    self.next_index = 0;
                    return Ok(Some(Self::take_line(buf, at)));
                }
                (false, None) if buf.len() > self.max_length => {
                    warn!(max = self.max_length, "inbound line too long, discarding");
                    buf.clear();
                    self.next_index = 0;
                    self.discarding = true;
                    return Ok(None);
                }
                (false, None) => {
                    self.next_index = buf.len();
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, io::Error> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        if buf.is_empty() || self.discarding {
            buf.clear();
            return Ok(None);
        }
        // unterminated final line
        self.next_index = 0;
        let len = buf.len();
        buf.put_u8(b'\n');
        Ok(Some(Self::take_line(buf, len)))
    }
}

impl<T: AsRef<str>> Encoder<T> for IrcLineCodec {
    type Error = io::Error;

    fn encode(&mut self, line: T, buf: &mut BytesMut) -> Result<(), io::Error> {
        let line = line.as_ref();
        buf.reserve(line.len() + 2);
        buf.put_slice(line.as_bytes());
        buf.put_slice(b"\r\n");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_crlf_and_lf() {
        let mut codec = IrcLineCodec::new();
        let mut buf = BytesMut::from(&b"PING :a\r\nPING :b\npartial"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("PING :a"));
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("PING :b"));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b" line\r\n");
        assert_eq!(
            codec.decode(&mut buf).unwrap().as_deref(),
            Some("partial line")
        );
    }

    #[test]
    fn test_decode_invalid_utf8_is_lossy() {
        let mut codec = IrcLineCodec::new();
        let mut buf = BytesMut::from(&b"caf\xe9\r\n"[..]);
        assert_eq!(
            codec.decode(&mut buf).unwrap().as_deref(),
            Some("caf\u{fffd}")
        );
    }

    #[test]
    fn test_overlong_line_is_skipped() {
        let mut codec = IrcLineCodec::with_max_length(8);
        let mut buf = BytesMut::from(&b"0123456789abcdef"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b"tail\nnext\n");
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("next"));
    }

    #[test]
    fn test_decode_eof_flushes_last_line() {
        let mut codec = IrcLineCodec::new();
        let mut buf = BytesMut::from(&b"ERROR :bye"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(
            codec.decode_eof(&mut buf).unwrap().as_deref(),
            Some("ERROR :bye")
        );
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_encode_appends_crlf() {
        let mut codec = IrcLineCodec::new();
        let mut buf = BytesMut::new();
        codec.encode("QUIT", &mut buf).unwrap();
        assert_eq!(&buf[..], b"QUIT\r\n");
    }
}
