//! A synchronous streaming parser for `multipart/form-data` bodies.
//!
//! The body is pulled from any [`std::io::Read`] source in bounded-size
//! chunks, so arbitrarily large streams are parsed with a fixed amount of
//! read-ahead. Delimiters that straddle chunk borders are handled by a
//! two-chunk sliding window, and bytes read past a delimiter are pushed
//! back onto the input for the next section.
//!
//! # Examples
//!
//! ```
//! use std::io::Cursor;
//!
//! use formpart::Multipart;
//!
//! # fn run() -> formpart::Result<()> {
//! let data = "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"my_text_field\"\r\n\r\nabcd\r\n--X-BOUNDARY--\r\n";
//! let form = Multipart::with_boundary(Cursor::new(data), "X-BOUNDARY").parse()?;
//!
//! assert_eq!(form.field("my_text_field").unwrap().value, "abcd");
//! # Ok(())
//! # }
//! # run().unwrap();
//! ```

pub use error::Error;
pub use field::{FileField, FormData, TextField};
pub use multipart::Multipart;

mod buffer;
mod constants;
mod error;
mod field;
mod helpers;
mod multipart;
mod reader;
mod search;
mod state;

/// A Result type often returned from methods that can have `formpart`
/// errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Parses the `Content-Type` header to extract the boundary value.
pub fn parse_boundary<T: AsRef<str>>(content_type: T) -> crate::Result<String> {
    let m = content_type
        .as_ref()
        .parse::<mime::Mime>()
        .map_err(crate::Error::DecodeContentType)?;

    if !(m.type_() == mime::MULTIPART_FORM_DATA.type_() && m.subtype() == mime::MULTIPART_FORM_DATA.subtype()) {
        return Err(crate::Error::NoMultipart);
    }

    m.get_param(mime::BOUNDARY)
        .map(|name| name.as_str().to_owned())
        .ok_or(crate::Error::NoBoundary)
}
