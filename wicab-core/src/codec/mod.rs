//! Newline-delimited line codec for the WiThrottle wire protocol.
//!
//! The protocol is plain UTF-8 text, one command or event per line.
//! [`LineCodec`] frames inbound bytes into `String` lines with trailing
//! whitespace (including `\r`) trimmed, and appends a single `\n` to
//! every outbound line.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::CabError;

/// Upper bound on a single wire line. Anything larger is treated as a
/// protocol violation rather than buffered indefinitely.
pub const MAX_LINE_LEN: usize = 8 * 1024;

/// Framing codec for newline-terminated text lines.
#[derive(Debug, Default)]
pub struct LineCodec {
    /// Offset into the buffer already scanned for `\n`, so repeated
    /// `decode` calls on a growing buffer stay linear.
    next_index: usize,
}

impl LineCodec {
    pub fn new() -> Self {
        Self::default()
    }

    fn take_line(&mut self, src: &mut BytesMut, end: usize) -> String {
        // `end` points at the `\n`; the terminator is consumed but not
        // part of the returned line.
        let line = src.split_to(end + 1);
        self.next_index = 0;
        String::from_utf8_lossy(&line[..end]).trim_end().to_string()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = CabError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, CabError> {
        if let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') {
            let end = self.next_index + offset;
            return Ok(Some(self.take_line(src, end)));
        }
        if src.len() > MAX_LINE_LEN {
            return Err(CabError::LineTooLong {
                len: src.len(),
                max: MAX_LINE_LEN,
            });
        }
        self.next_index = src.len();
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, CabError> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        if src.is_empty() {
            return Ok(None);
        }
        // Final line without a terminator: flush it rather than error.
        let rest = src.split_to(src.len());
        self.next_index = 0;
        Ok(Some(String::from_utf8_lossy(&rest).trim_end().to_string()))
    }
}

impl Encoder<String> for LineCodec {
    type Error = CabError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), CabError> {
        dst.reserve(item.len() + 1);
        dst.put_slice(item.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(codec: &mut LineCodec, src: &mut BytesMut) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(line) = codec.decode(src).unwrap() {
            out.push(line);
        }
        out
    }

    #[test]
    fn decodes_single_line() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("PPA1\n");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some("PPA1".to_string()));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn trims_carriage_return_and_trailing_whitespace() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("*10 \r\n");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some("*10".to_string()));
    }

    #[test]
    fn decodes_multiple_lines_from_one_buffer() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("HU42\nNwicab\n*+\n");
        let lines = decode_all(&mut codec, &mut buf);
        assert_eq!(lines, vec!["HU42", "Nwicab", "*+"]);
    }

    #[test]
    fn buffers_partial_lines_across_reads() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("M0A<;>");
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b"V26\n");
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some("M0A<;>V26".to_string())
        );
    }

    #[test]
    fn rejects_oversize_line() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(vec![b'x'; MAX_LINE_LEN + 1].as_slice());
        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, CabError::LineTooLong { .. }));
    }

    #[test]
    fn decode_eof_flushes_unterminated_line() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("PPA0");
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(
            codec.decode_eof(&mut buf).unwrap(),
            Some("PPA0".to_string())
        );
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
    }

    #[test]
    fn encode_appends_newline() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();
        codec.encode("*".to_string(), &mut buf).unwrap();
        codec.encode("PPA1".to_string(), &mut buf).unwrap();
        assert_eq!(&buf[..], b"*\nPPA1\n");
    }

    #[test]
    fn non_utf8_bytes_are_replaced_not_fatal() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"PPA\xFF1\n"[..]);
        let line = codec.decode(&mut buf).unwrap().unwrap();
        assert!(line.starts_with("PPA"));
    }
}
