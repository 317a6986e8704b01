use std::collections::HashMap;

use crate::constants;

/// Merges one section header line into `map`.
///
/// The line is split on `;`; each token is split on its first `:` or `=`;
/// keys and values are trimmed and stripped of `"` characters and keys are
/// lowercased, so `Content-Disposition: form-data; name="foo"` contributes
/// the entries `content-disposition`, `name`. Tokens with no separator are
/// skipped. A key already present in `map` is a fatal error.
pub(crate) fn parse_header_line(line: &str, map: &mut HashMap<String, String>) -> crate::Result<()> {
    for token in line.split(';') {
        let idx = match token.find(|c| c == ':' || c == '=') {
            Some(idx) => idx,
            None => continue,
        };

        let key = clean(&token[..idx]).to_lowercase();
        let value = clean(&token[idx + 1..]);

        if map.insert(key, value).is_some() {
            return Err(crate::Error::Malformed(constants::DUPLICATE_FIELD));
        }
    }

    Ok(())
}

fn clean(raw: &str) -> String {
    raw.trim().replace('"', "")
}
