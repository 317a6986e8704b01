use bytes::{Buf, Bytes};

use crate::constants;

/// A LIFO stack of in-memory byte chunks.
///
/// The most recently pushed chunk is read first, which is what makes
/// push-back work: bytes returned via [`StreamReader::buffer`] land on top
/// of the stack and are consumed before anything pulled earlier. Each chunk
/// owns its bytes until its cursor reaches the end, at which point it is
/// popped and dropped.
///
/// [`StreamReader::buffer`]: crate::reader::StreamReader::buffer
pub(crate) struct ChunkStack {
    // Top of the stack is the last element.
    chunks: Vec<Bytes>,
}

impl ChunkStack {
    pub fn new() -> Self {
        ChunkStack { chunks: Vec::new() }
    }

    /// Pushes a chunk on top of the stack. Empty chunks are ignored.
    pub fn push(&mut self, chunk: Bytes) {
        if !chunk.is_empty() {
            self.chunks.push(chunk);
        }
    }

    #[allow(dead_code)]
    pub fn has_data(&self) -> bool {
        self.chunks.iter().any(|chunk| !chunk.is_empty())
    }

    /// Reads one byte from the top chunk, popping exhausted chunks until one
    /// yields a byte. Returns `None` once the stack is empty.
    pub fn read_byte(&mut self) -> Option<u8> {
        while let Some(top) = self.chunks.last_mut() {
            if top.is_empty() {
                self.chunks.pop();
                continue;
            }

            let byte = top[0];
            top.advance(1);
            if top.is_empty() {
                self.chunks.pop();
            }
            return Some(byte);
        }

        None
    }

    /// Fills `buf` from the stack, spanning chunk borders transparently.
    /// Returns the number of bytes written; 0 only on true exhaustion.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let mut filled = 0;

        while filled < buf.len() {
            let top = match self.chunks.last_mut() {
                Some(top) => top,
                None => break,
            };

            let take = top.len().min(buf.len() - filled);
            buf[filled..filled + take].copy_from_slice(&top[..take]);
            top.advance(take);
            filled += take;

            if top.is_empty() {
                self.chunks.pop();
            }
        }

        filled
    }

    /// Scans byte-at-a-time for the newline `pattern`, appending everything
    /// before it to `out`.
    ///
    /// The scan is a small match automaton: `pos` is the running position
    /// into `pattern`. A byte equal to `pattern[pos]` advances `pos`; on a
    /// mismatch the bytes withheld for the partial match are flushed to
    /// `out`, the mismatching byte is appended, and `pos` resets to 0. A
    /// full match ends the scan without emitting the pattern bytes.
    ///
    /// `\r` bytes are always discarded and never take part in matching, so
    /// both `\r\n` and bare `\n` terminate a line and no `\r` ever reaches
    /// `out`.
    ///
    /// Returns `true` ("hit end") when the stack drained before a full
    /// match; the bytes accumulated so far are in `out` and the caller is
    /// expected to refill and continue rather than treat this as a
    /// terminated line.
    pub fn read_line(&mut self, pattern: &[u8], out: &mut Vec<u8>) -> bool {
        debug_assert!(!pattern.is_empty());

        let mut pos = 0;
        loop {
            let byte = match self.read_byte() {
                Some(byte) => byte,
                None => {
                    out.extend_from_slice(&pattern[..pos]);
                    return true;
                }
            };

            if byte == constants::CR {
                continue;
            }

            if byte == pattern[pos] {
                pos += 1;
                if pos == pattern.len() {
                    return false;
                }
            } else {
                out.extend_from_slice(&pattern[..pos]);
                pos = 0;
                out.push(byte);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(stack: &mut ChunkStack) -> (Vec<u8>, bool) {
        let mut out = Vec::new();
        let hit_end = stack.read_line(b"\n", &mut out);
        (out, hit_end)
    }

    #[test]
    fn test_newest_chunk_is_read_first() {
        let mut stack = ChunkStack::new();
        stack.push(Bytes::from_static(b"old"));
        stack.push(Bytes::from_static(b"new"));

        let mut buf = [0u8; 6];
        assert_eq!(stack.read(&mut buf), 6);
        assert_eq!(&buf, b"newold");
        assert!(!stack.has_data());
    }

    #[test]
    fn test_read_byte_spans_and_pops_chunks() {
        let mut stack = ChunkStack::new();
        stack.push(Bytes::from_static(b"b"));
        stack.push(Bytes::from_static(b"a"));

        assert_eq!(stack.read_byte(), Some(b'a'));
        assert_eq!(stack.read_byte(), Some(b'b'));
        assert_eq!(stack.read_byte(), None);
        assert_eq!(stack.read_byte(), None);
    }

    #[test]
    fn test_read_partial_fill_reports_actual_count() {
        let mut stack = ChunkStack::new();
        stack.push(Bytes::from_static(b"abc"));

        let mut buf = [0u8; 8];
        assert_eq!(stack.read(&mut buf), 3);
        assert_eq!(&buf[..3], b"abc");
        assert_eq!(stack.read(&mut buf), 0);
    }

    #[test]
    fn test_empty_chunks_are_ignored() {
        let mut stack = ChunkStack::new();
        stack.push(Bytes::new());
        assert!(!stack.has_data());
        assert_eq!(stack.read_byte(), None);
    }

    #[test]
    fn test_read_line_crlf_and_bare_lf() {
        let mut stack = ChunkStack::new();
        stack.push(Bytes::from_static(b"one\r\ntwo\nthree"));

        assert_eq!(line(&mut stack), (b"one".to_vec(), false));
        assert_eq!(line(&mut stack), (b"two".to_vec(), false));
        assert_eq!(line(&mut stack), (b"three".to_vec(), true));
    }

    #[test]
    fn test_read_line_strips_interior_cr() {
        let mut stack = ChunkStack::new();
        stack.push(Bytes::from_static(b"a\rb\r\r\n"));

        assert_eq!(line(&mut stack), (b"ab".to_vec(), false));
    }

    #[test]
    fn test_read_line_across_chunk_border() {
        let mut stack = ChunkStack::new();
        stack.push(Bytes::from_static(b"lf\ntail"));
        stack.push(Bytes::from_static(b"half"));

        assert_eq!(line(&mut stack), (b"halflf".to_vec(), false));
        assert_eq!(line(&mut stack), (b"tail".to_vec(), true));
    }

    #[test]
    fn test_read_line_flushes_partial_pattern_match() {
        // Pattern "xy": the lone "x" is provisionally withheld, then flushed
        // once the following byte mismatches.
        let mut stack = ChunkStack::new();
        stack.push(Bytes::from_static(b"axbxy rest"));

        let mut out = Vec::new();
        assert!(!stack.read_line(b"xy", &mut out));
        assert_eq!(out, b"axb");

        let mut rest = [0u8; 5];
        assert_eq!(stack.read(&mut rest), 5);
        assert_eq!(&rest, b" rest");
    }

    #[test]
    fn test_read_line_flushes_withheld_bytes_on_drain() {
        let mut stack = ChunkStack::new();
        stack.push(Bytes::from_static(b"abx"));

        let mut out = Vec::new();
        assert!(stack.read_line(b"xy", &mut out));
        assert_eq!(out, b"abx");
    }
}
