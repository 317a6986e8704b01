use std::collections::HashMap;
use std::io::Read;

use bytes::Bytes;
use encoding_rs::Encoding;

use crate::constants;
use crate::field::{FileField, FormData, TextField};
use crate::helpers;
use crate::reader::StreamReader;
use crate::search;
use crate::state::ParseState;
use crate::Error;

/// Parses a `multipart/form-data` body out of a pull-based byte source.
///
/// The source is read in bounded-size chunks, so delimiter bytes may
/// straddle chunk borders; the parser keeps a two-chunk sliding window over
/// file bodies and pushes bytes read past a delimiter back onto the input
/// for the next section's header parse.
///
/// The boundary token can be given explicitly or detected from the first
/// line of the stream.
///
/// # Examples
///
/// ```
/// use std::io::Cursor;
///
/// use formpart::Multipart;
///
/// let data = "--B\r\nContent-Disposition: form-data; name=\"doc\"; filename=\"t.txt\"\r\n\r\nhello\r\n--B--\r\n";
/// let form = Multipart::with_boundary(Cursor::new(data), "B").parse().unwrap();
///
/// assert_eq!(form.files[0].file_name, "t.txt");
/// assert_eq!(&form.files[0].data[..], b"hello");
/// ```
pub struct Multipart<R> {
    reader: StreamReader<R>,
    boundary: Option<String>,
    state: ParseState,
}

impl<R: Read> Multipart<R> {
    /// Constructs a parser that detects the boundary token from the first
    /// line of the stream.
    pub fn new(source: R) -> Multipart<R> {
        Multipart {
            reader: StreamReader::new(source),
            boundary: None,
            state: ParseState::default(),
        }
    }

    /// Constructs a parser with an explicit boundary token (without the
    /// leading `--`).
    pub fn with_boundary<B: Into<String>>(source: R, boundary: B) -> Multipart<R> {
        Multipart {
            reader: StreamReader::new(source),
            boundary: Some(boundary.into()),
            state: ParseState::default(),
        }
    }

    /// Sets the refill chunk size. Defaults to 4096 bytes.
    ///
    /// [`parse`](Multipart::parse) asserts that the chunk size is at least
    /// the end boundary length plus one CRLF, the minimum the two-buffer
    /// delimiter scan needs to make progress.
    pub fn chunk_size(mut self, chunk_size: usize) -> Multipart<R> {
        self.reader.set_chunk_size(chunk_size);
        self
    }

    /// Sets the text encoding used to decode lines and derive the newline
    /// pattern. Defaults to UTF-8.
    pub fn encoding(mut self, encoding: &'static Encoding) -> Multipart<R> {
        self.reader.set_encoding(encoding);
        self
    }

    /// Runs the parser to completion, consuming it.
    ///
    /// All malformed-input conditions are fatal; the caller must restart on
    /// a fresh source. I/O errors from the raw source propagate unmodified.
    pub fn parse(mut self) -> crate::Result<FormData> {
        let token = match self.boundary.take() {
            Some(token) => token,
            None => self.detect_boundary()?,
        };

        let delimiter = Delimiter::new(&token, self.reader.encoding());
        log::debug!("parsing multipart body with boundary {:?}", delimiter.line);

        assert!(
            self.reader.chunk_size() >= delimiter.end_bytes.len() + constants::MAX_NEWLINE_LEN,
            "chunk size must be at least the end boundary length plus a newline"
        );

        self.skip_preamble(&delimiter)?;

        let mut form = FormData::default();
        while !self.state.terminal_boundary_seen {
            self.read_section(&delimiter, &mut form)?;
        }

        Ok(form)
    }

    // The first line of the stream is the opening boundary; take its token
    // and push the line back so the main loop re-observes it normally.
    fn detect_boundary(&mut self) -> crate::Result<String> {
        let line = self
            .reader
            .read_line()?
            .ok_or(Error::Malformed(constants::BOUNDARY_NOT_FOUND))?;

        let token = line
            .strip_prefix(constants::BOUNDARY_PREFIX)
            .unwrap_or(&line)
            .to_owned();

        log::debug!("detected boundary token {:?}", token);
        let restored = format!("{}{}\n", constants::BOUNDARY_PREFIX, token);
        self.reader.buffer_text(&restored);
        Ok(token)
    }

    fn skip_preamble(&mut self, delimiter: &Delimiter) -> crate::Result<()> {
        loop {
            let line = self
                .reader
                .read_line()?
                .ok_or(Error::Malformed(constants::BOUNDARY_NOT_FOUND))?;

            if line == delimiter.line {
                return Ok(());
            }
            log::trace!("discarding preamble line ({} chars)", line.len());
        }
    }

    fn read_section(&mut self, delimiter: &Delimiter, form: &mut FormData) -> crate::Result<()> {
        let headers = self.read_section_headers(delimiter)?;

        if headers.contains_key("filename") {
            let file = self.read_file_body(delimiter, &headers)?;
            log::debug!("parsed file section {:?} ({} bytes)", file.file_name, file.data.len());
            form.files.push(file);
        } else {
            let field = self.read_parameter_body(delimiter, &headers)?;
            log::debug!("parsed parameter section {:?}", field.name);
            form.fields.push(field);
        }

        Ok(())
    }

    // Reads header lines up to the blank separator line, merging them into
    // one map with lowercased keys.
    fn read_section_headers(&mut self, delimiter: &Delimiter) -> crate::Result<HashMap<String, String>> {
        let mut headers = HashMap::new();

        loop {
            let line = self
                .reader
                .read_line()?
                .ok_or(Error::Malformed(constants::UNEXPECTED_END_OF_STREAM))?;

            if line == delimiter.line || line == delimiter.end_line {
                return Err(Error::Malformed(constants::UNEXPECTED_END_OF_SECTION));
            }

            if line.is_empty() {
                return Ok(headers);
            }

            helpers::parse_header_line(&line, &mut headers)?;
        }
    }

    fn read_parameter_body(
        &mut self,
        delimiter: &Delimiter,
        headers: &HashMap<String, String>,
    ) -> crate::Result<TextField> {
        let mut value = String::new();

        loop {
            let line = self
                .reader
                .read_line()?
                .ok_or(Error::Malformed(constants::UNEXPECTED_END_OF_SECTION))?;

            if line == delimiter.line {
                break;
            }
            if line == delimiter.end_line {
                self.state.terminal_boundary_seen = true;
                break;
            }

            // Successive body lines are concatenated with no separator.
            value.push_str(&line);
        }

        Ok(TextField {
            name: headers.get("name").cloned().unwrap_or_default(),
            value,
        })
    }

    // The double-buffer delimiter scan: a sliding window of two chunk-sized
    // buffers, re-anchored by flushing the older half whenever no delimiter
    // is in sight. Bytes past the matched delimiter belong to the next
    // section and are pushed back onto the reader.
    fn read_file_body(
        &mut self,
        delimiter: &Delimiter,
        headers: &HashMap<String, String>,
    ) -> crate::Result<FileField> {
        let chunk_size = self.reader.chunk_size();
        let mut prev = vec![0u8; chunk_size];
        let mut curr = vec![0u8; chunk_size];
        let mut data = Vec::new();

        let mut prev_len = self.reader.read(&mut prev)?;
        let mut first_window = true;

        loop {
            let curr_len = self.reader.read(&mut curr)?;

            let mut window = Vec::with_capacity(prev_len + curr_len);
            window.extend_from_slice(&prev[..prev_len]);
            window.extend_from_slice(&curr[..curr_len]);

            match delimiter.find_in(&window, first_window) {
                Some(hit) => {
                    let tail = hit.pos + hit.len;
                    // The newline after the delimiter is consumed, never
                    // emitted, never pushed back; the mandatory newline
                    // before it is protocol framing, not payload.
                    let newline_after = newline_len_at(&window, tail);
                    let trim = newline_len_before(&window, hit.pos);

                    data.extend_from_slice(&window[..hit.pos - trim]);
                    self.reader.buffer(&window[tail + newline_after..]);

                    if hit.is_end {
                        self.state.terminal_boundary_seen = true;
                    }
                    break;
                }
                None => {
                    if curr_len == 0 {
                        return Err(Error::TruncatedStream);
                    }

                    data.extend_from_slice(&prev[..prev_len]);
                    std::mem::swap(&mut prev, &mut curr);
                    prev_len = curr_len;
                    first_window = false;
                }
            }
        }

        Ok(FileField {
            name: headers.get("name").cloned().unwrap_or_default(),
            file_name: headers.get("filename").cloned().unwrap_or_default(),
            content_type: headers
                .get("content-type")
                .and_then(|value| value.parse().ok())
                .unwrap_or(mime::TEXT_PLAIN),
            content_disposition: headers
                .get("content-disposition")
                .cloned()
                .unwrap_or_else(|| constants::DEFAULT_CONTENT_DISPOSITION.to_owned()),
            data: Bytes::from(data),
        })
    }
}

// The boundary in both of its wire forms, as decoded text for line
// comparison and as encoded bytes for the window scan.
struct Delimiter {
    line: String,
    end_line: String,
    bytes: Vec<u8>,
    end_bytes: Vec<u8>,
}

struct Hit {
    pos: usize,
    len: usize,
    is_end: bool,
}

impl Delimiter {
    fn new(token: &str, encoding: &'static Encoding) -> Delimiter {
        let line = format!("{}{}", constants::BOUNDARY_PREFIX, token);
        let end_line = format!("{}{}", line, constants::BOUNDARY_PREFIX);

        let bytes = encoding.encode(&line).0.into_owned();
        let end_bytes = encoding.encode(&end_line).0.into_owned();

        Delimiter {
            line,
            end_line,
            bytes,
            end_bytes,
        }
    }

    /// Locates the earliest framed delimiter in `window`, preferring the
    /// end boundary on an exact positional tie.
    fn find_in(&self, window: &[u8], first_window: bool) -> Option<Hit> {
        let end = find_framed(window, &self.end_bytes, first_window);
        let plain = find_framed(window, &self.bytes, first_window);

        match (plain, end) {
            (Some(p), Some(e)) if e <= p => Some(Hit {
                pos: e,
                len: self.end_bytes.len(),
                is_end: true,
            }),
            (Some(p), _) => Some(Hit {
                pos: p,
                len: self.bytes.len(),
                is_end: false,
            }),
            (None, Some(e)) => Some(Hit {
                pos: e,
                len: self.end_bytes.len(),
                is_end: true,
            }),
            (None, None) => None,
        }
    }
}

// A delimiter only counts when framed as its own line: at the window origin
// on the body's first window (right after the header blank line), or right
// after an LF. Boundary bytes embedded in payload are skipped and the scan
// resumes past them.
fn find_framed(window: &[u8], needle: &[u8], first_window: bool) -> Option<usize> {
    let mut from = 0;
    while from < window.len() {
        let pos = from + search::search(&window[from..], needle)?;

        let framed = match pos {
            0 => first_window,
            _ => window[pos - 1] == constants::LF,
        };
        if framed {
            return Some(pos);
        }

        from = pos + 1;
    }

    None
}

fn newline_len_at(window: &[u8], offset: usize) -> usize {
    if window[offset..].starts_with(constants::CRLF) {
        2
    } else if window.get(offset) == Some(&constants::LF) {
        1
    } else {
        0
    }
}

fn newline_len_before(window: &[u8], pos: usize) -> usize {
    if pos >= 2 && &window[pos - 2..pos] == constants::CRLF {
        2
    } else if pos >= 1 && window[pos - 1] == constants::LF {
        1
    } else {
        0
    }
}
