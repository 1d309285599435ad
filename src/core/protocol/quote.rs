// src/core/protocol/quote.rs

//! Helpers for building command text: string literal quoting and identifier checks.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref IDENTIFIER: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid");
}

/// Quotes `value` as a double-quoted string literal.
///
/// Backslash, double quote, and the `\n`, `\r`, `\t` control characters are
/// escaped, so the result never contains a raw newline and cannot break the
/// one-line-per-request framing.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

/// Returns true if `name` is a bare identifier (`[A-Za-z_][A-Za-z0-9_]*`).
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}
