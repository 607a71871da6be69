//! LMS CLI wire format
//!
//! The CLI (TCP port 9090) speaks newline-delimited, space-separated lines.
//! Every token is percent-encoded, so a literal space or colon inside a value
//! never collides with the token or key/value separators:
//!
//! ```text
//! 00%3A04%3A20%3Aaa%3Abb%3Acc status - 1 mode%3Aplay title%3AHello%20World
//! ```
//!
//! This module holds the stateless codec; the submodules interpret whole lines.

pub mod line;
pub mod players;
pub mod status;

pub use line::{classify_line, PlayerEvent, PushLine};
pub use players::{parse_player_list, PlayerListing};
pub use status::{parse_status_line, PlayMode, StatusField, StatusLine};

/// Encoded `:` separating a key from its value inside one token
pub const KEY_VALUE_SEPARATOR: &str = "%3A";

/// Percent-decode a token as UTF-8.
///
/// `+` decodes to a space. Malformed escapes or invalid UTF-8 yield an empty
/// string rather than an error.
pub fn decode(token: &str) -> String {
    if !has_well_formed_escapes(token) {
        return String::new();
    }
    let token = token.replace('+', " ");
    urlencoding::decode(&token)
        .map(|s| s.into_owned())
        .unwrap_or_default()
}

/// Percent-encode a value for use as a single CLI token
pub fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Split `key%3Avalue` at the first separator, decoding both halves.
///
/// Returns `None` when the token carries no separator.
pub fn split_key_value(token: &str) -> Option<(String, String)> {
    let (key, value) = token.split_once(KEY_VALUE_SEPARATOR)?;
    Some((decode(key), decode(value)))
}

fn has_well_formed_escapes(token: &str) -> bool {
    let bytes = token.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            match bytes.get(i + 1..i + 3) {
                Some(hex) if hex.iter().all(u8::is_ascii_hexdigit) => i += 3,
                _ => return false,
            }
        } else {
            i += 1;
        }
    }
    true
}

/// Split a raw line on single spaces, dropping trailing empty tokens
pub(crate) fn split_tokens(line: &str) -> Vec<&str> {
    let mut tokens: Vec<&str> = line.split(' ').collect();
    while tokens.last().is_some_and(|t| t.is_empty()) {
        tokens.pop();
    }
    tokens
}

/// Parse the integral part of a decimal number, `0` when unparseable.
///
/// LMS reports times as fractional seconds (`time:99.803`), so the fraction is
/// truncated rather than rejected.
pub(crate) fn parse_decimal_or_zero(value: &str) -> i32 {
    let value = value.trim();
    let integral = value.split_once('.').map_or(value, |(whole, _)| whole);
    integral.parse().unwrap_or(0)
}
