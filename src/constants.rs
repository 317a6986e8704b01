pub(crate) const DEFAULT_CHUNK_SIZE: usize = 4096;

pub(crate) const BOUNDARY_PREFIX: &'static str = "--";
pub(crate) const CR: u8 = b'\r';
pub(crate) const LF: u8 = b'\n';
pub(crate) const CRLF: &'static [u8] = b"\r\n";

/// The longest newline sequence the wire format produces (CRLF).
pub(crate) const MAX_NEWLINE_LEN: usize = 2;

pub(crate) const DEFAULT_CONTENT_DISPOSITION: &'static str = "form-data";

// Reason strings for `Error::Malformed`. Every malformed-input condition is
// fatal; the caller must restart parsing on a fresh source.
pub(crate) const BOUNDARY_NOT_FOUND: &'static str = "could not find expected boundary";
pub(crate) const UNEXPECTED_END_OF_STREAM: &'static str = "unexpected end of stream";
pub(crate) const UNEXPECTED_END_OF_SECTION: &'static str = "unexpected end of section";
pub(crate) const DUPLICATE_FIELD: &'static str = "duplicate field in section";
