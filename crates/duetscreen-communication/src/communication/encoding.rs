//! Query-string encoding for free-form text
//!
//! G-code lines and file paths travel as URL query parameters. ASCII
//! alphanumerics and `-_.!~*'()` pass through, a space becomes `+` and every
//! other byte becomes `%XX` with uppercase hex digits.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Bytes escaped in a query value
const QUERY: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encode `text` for use as a query parameter value
pub fn percent_encode(text: &str) -> String {
    // A literal '%' is always escaped, so every "%20" left is a space.
    utf8_percent_encode(text, QUERY)
        .to_string()
        .replace("%20", "+")
}
