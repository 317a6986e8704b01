use std::io::{self, Read};

use bytes::Bytes;
use encoding_rs::{Encoding, UTF_8};

use crate::buffer::ChunkStack;
use crate::constants;

/// Wraps one pull-based raw byte source and a [`ChunkStack`], adding the
/// ability to push unconsumed bytes back to the front of the input.
///
/// Every read tries the stack first and refills it from the raw source on
/// exhaustion, one fixed-size chunk at a time. Once the source returns zero
/// bytes it is considered permanently exhausted and all reads report
/// "no data".
pub(crate) struct StreamReader<R> {
    source: R,
    stack: ChunkStack,
    chunk_size: usize,
    encoding: &'static Encoding,
    // Encoded newline, the target pattern of the line scanner.
    newline: Vec<u8>,
    eof: bool,
    bom_checked: bool,
}

impl<R: Read> StreamReader<R> {
    pub fn new(source: R) -> Self {
        StreamReader {
            source,
            stack: ChunkStack::new(),
            chunk_size: constants::DEFAULT_CHUNK_SIZE,
            encoding: UTF_8,
            newline: encode_newline(UTF_8),
            eof: false,
            bom_checked: false,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn set_chunk_size(&mut self, chunk_size: usize) {
        self.chunk_size = chunk_size;
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    pub fn set_encoding(&mut self, encoding: &'static Encoding) {
        self.encoding = encoding;
        self.newline = encode_newline(encoding);
    }

    /// Pushes `bytes` back to the front of the input so they are read before
    /// anything else. This is how the parser returns read-ahead bytes after
    /// a delimiter scan.
    pub fn buffer(&mut self, bytes: &[u8]) {
        log::trace!("rebuffering {} bytes", bytes.len());
        self.stack.push(Bytes::copy_from_slice(bytes));
    }

    /// Encodes `text` with the configured encoding and pushes it back.
    pub fn buffer_text(&mut self, text: &str) {
        let (bytes, _, _) = self.encoding.encode(text);
        self.stack.push(Bytes::copy_from_slice(&bytes));
    }

    #[allow(dead_code)]
    pub fn read_byte(&mut self) -> crate::Result<Option<u8>> {
        loop {
            if let Some(byte) = self.stack.read_byte() {
                return Ok(Some(byte));
            }
            if !self.fill()? {
                return Ok(None);
            }
        }
    }

    /// Fills `buf` from the stack and the raw source. Returns the number of
    /// bytes written; less than `buf.len()` only when the source is
    /// exhausted, 0 only on true exhaustion.
    pub fn read(&mut self, buf: &mut [u8]) -> crate::Result<usize> {
        let mut filled = 0;
        loop {
            filled += self.stack.read(&mut buf[filled..]);
            if filled == buf.len() || !self.fill()? {
                return Ok(filled);
            }
        }
    }

    /// Reads one line, transparently spanning chunk and raw-source borders.
    ///
    /// Returns `None` only when the input is exhausted and no bytes were
    /// accumulated. A final unterminated line is returned as-is; an empty
    /// terminated line is `Some("")`.
    pub fn read_line(&mut self) -> crate::Result<Option<String>> {
        let mut raw = Vec::new();
        loop {
            let hit_end = self.stack.read_line(&self.newline, &mut raw);
            if !hit_end {
                break;
            }
            if !self.fill()? {
                if raw.is_empty() {
                    return Ok(None);
                }
                break;
            }
        }

        let (text, _) = self.encoding.decode_without_bom_handling(&raw);
        Ok(Some(text.into_owned()))
    }

    // Pulls exactly one chunk from the raw source onto the stack. Returns
    // false once the source is exhausted.
    fn fill(&mut self) -> crate::Result<bool> {
        if self.eof {
            return Ok(false);
        }

        let mut chunk = vec![0u8; self.chunk_size];
        let mut filled = 0;
        while filled < chunk.len() {
            match self.source.read(&mut chunk[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }

        if filled == 0 {
            log::trace!("raw source exhausted");
            self.eof = true;
            return Ok(false);
        }

        chunk.truncate(filled);

        // Only the first physical chunk is BOM-checked, and only for the
        // configured encoding's own mark. Later chunks keep such bytes.
        let mut start = 0;
        if !self.bom_checked {
            self.bom_checked = true;
            if let Some((encoding, bom_len)) = Encoding::for_bom(&chunk) {
                if encoding == self.encoding {
                    log::trace!("stripping {} byte order mark bytes", bom_len);
                    start = bom_len;
                }
            }
        }

        log::trace!("pulled chunk of {} bytes", filled);
        self.stack.push(Bytes::from(chunk).slice(start..));
        Ok(true)
    }
}

fn encode_newline(encoding: &'static Encoding) -> Vec<u8> {
    let (bytes, _, _) = encoding.encode("\n");
    bytes.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// A source that hands out at most one byte per `read` call.
    pub(crate) struct OneByteRead<R>(pub R);

    impl<R: Read> Read for OneByteRead<R> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = buf.len().min(1);
            self.0.read(&mut buf[..n])
        }
    }

    fn reader(data: &[u8]) -> StreamReader<Cursor<Vec<u8>>> {
        StreamReader::new(Cursor::new(data.to_vec()))
    }

    fn all_lines<R: Read>(reader: &mut StreamReader<R>) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = reader.read_line().unwrap() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn test_read_line_single_chunk() {
        let mut r = reader(b"first\r\nsecond\nthird");
        assert_eq!(all_lines(&mut r), vec!["first", "second", "third"]);
        assert_eq!(r.read_line().unwrap(), None);
    }

    #[test]
    fn test_read_line_one_byte_at_a_time_matches_single_chunk() {
        let data: &[u8] = b"alpha\r\nbeta\n\ngamma\r\ndelta";

        let mut whole = reader(data);
        let mut trickle = StreamReader::new(OneByteRead(Cursor::new(data.to_vec())));

        assert_eq!(all_lines(&mut whole), all_lines(&mut trickle));
    }

    #[test]
    fn test_read_line_spans_chunk_refills() {
        let mut r = reader(b"a line longer than the chunk size\nrest");
        r.set_chunk_size(8);
        assert_eq!(
            all_lines(&mut r),
            vec!["a line longer than the chunk size", "rest"]
        );
    }

    #[test]
    fn test_buffer_round_trip() {
        let mut r = reader(b"stream data");

        let mut head = [0u8; 6];
        assert_eq!(r.read(&mut head).unwrap(), 6);
        assert_eq!(&head, b"stream");

        r.buffer(b"pushed");

        let mut back = [0u8; 6];
        assert_eq!(r.read(&mut back).unwrap(), 6);
        assert_eq!(&back, b"pushed");

        // The original stream resumes unaffected.
        let mut tail = [0u8; 5];
        assert_eq!(r.read(&mut tail).unwrap(), 5);
        assert_eq!(&tail, b" data");
    }

    #[test]
    fn test_buffer_is_read_before_refill() {
        let mut r = reader(b"later");
        r.buffer_text("now ");
        assert_eq!(all_lines(&mut r), vec!["now later"]);
    }

    #[test]
    fn test_exhausted_source_keeps_reporting_no_data() {
        let mut r = reader(b"x");
        assert_eq!(r.read_byte().unwrap(), Some(b'x'));
        assert_eq!(r.read_byte().unwrap(), None);
        assert_eq!(r.read_byte().unwrap(), None);
        let mut buf = [0u8; 4];
        assert_eq!(r.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_bom_of_configured_encoding_is_stripped() {
        let mut r = reader(b"\xef\xbb\xbfpayload");
        assert_eq!(all_lines(&mut r), vec!["payload"]);
    }

    #[test]
    fn test_foreign_bom_is_preserved() {
        // UTF-16LE mark under a UTF-8 reader: not this encoding's BOM, so
        // the bytes stay in the stream.
        let mut r = reader(b"\xff\xfepayload");
        let mut head = [0u8; 2];
        assert_eq!(r.read(&mut head).unwrap(), 2);
        assert_eq!(&head, b"\xff\xfe");
    }

    #[test]
    fn test_bom_only_stripped_on_first_chunk() {
        let mut data = b"0123".to_vec();
        data.extend_from_slice(b"\xef\xbb\xbftail");

        let mut r = StreamReader::new(Cursor::new(data));
        r.set_chunk_size(4);

        let mut head = [0u8; 4];
        assert_eq!(r.read(&mut head).unwrap(), 4);

        let mut rest = [0u8; 7];
        assert_eq!(r.read(&mut rest).unwrap(), 7);
        assert_eq!(&rest, b"\xef\xbb\xbftail");
    }

    #[test]
    fn test_io_error_propagates() {
        struct Failing;
        impl Read for Failing {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"))
            }
        }

        let mut r = StreamReader::new(Failing);
        let err = r.read_byte().unwrap_err();
        assert!(err.to_string().contains("pipe closed"));
    }
}
