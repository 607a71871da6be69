//! Status line parsing
//!
//! A status push looks like:
//!
//! ```text
//! <playerid> status - 1 tags%3AylqwaJ mode%3Aplay time%3A99.803 duration%3A224.705
//!     title%3ASong artist%3AArtist album%3AAlbum artwork_track_id%3A1234 ...
//! ```
//!
//! Only the fields the client tracks are kept; they are returned in wire order
//! so the caller can apply them one by one.

use super::{parse_decimal_or_zero, split_key_value};
use crate::error::ProtocolError;

/// Tokens 0 and 1 are the player id and the `status` command
const FIRST_FIELD_INDEX: usize = 2;

/// Early tokens such as `-` and `1` (the start/count arguments echoed back by
/// the server) carry no separator and are skipped up to this index.
const LENIENT_PREFIX_END: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayMode {
    Play,
    Pause,
}

/// One tracked key/value pair from a status line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusField {
    Mode(PlayMode),
    Artist(String),
    Title(String),
    Album(String),
    ArtworkTrackId(String),
    /// Elapsed seconds, truncated
    Time(i32),
    /// Track duration in seconds, truncated
    Duration(i32),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusLine {
    /// Fields seen before the end of the line or the first bad token
    pub fields: Vec<StatusField>,
    /// Set when the scan stopped at a token without a separator
    pub malformed: Option<ProtocolError>,
}

impl StatusLine {
    /// Elapsed seconds reported by this line (last occurrence wins, 0 if absent)
    pub fn time(&self) -> i32 {
        self.fields
            .iter()
            .rev()
            .find_map(|f| match f {
                StatusField::Time(t) => Some(*t),
                _ => None,
            })
            .unwrap_or(0)
    }

    /// Duration reported by this line (last occurrence wins, 0 if absent)
    pub fn duration(&self) -> i32 {
        self.fields
            .iter()
            .rev()
            .find_map(|f| match f {
                StatusField::Duration(d) => Some(*d),
                _ => None,
            })
            .unwrap_or(0)
    }
}

/// Parse the tokens of a status line (including the leading player id and
/// command tokens).
///
/// A token past the lenient prefix that lacks a key/value separator stops
/// the scan; the fields before it are kept and `malformed` is set.
pub fn parse_status_line(tokens: &[&str]) -> StatusLine {
    let mut fields = Vec::new();

    for (index, token) in tokens.iter().enumerate().skip(FIRST_FIELD_INDEX) {
        if token.is_empty() {
            continue;
        }
        let Some((key, value)) = split_key_value(token) else {
            if index <= LENIENT_PREFIX_END {
                continue;
            }
            return StatusLine {
                fields,
                malformed: Some(ProtocolError::StatusToken {
                    index,
                    token: token.to_string(),
                }),
            };
        };

        let field = match key.as_str() {
            "mode" => match value.as_str() {
                "play" => StatusField::Mode(PlayMode::Play),
                "pause" => StatusField::Mode(PlayMode::Pause),
                _ => continue,
            },
            "artist" => StatusField::Artist(value),
            "title" => StatusField::Title(value),
            "album" => StatusField::Album(value),
            "artwork_track_id" => StatusField::ArtworkTrackId(value),
            "time" => StatusField::Time(parse_decimal_or_zero(&value)),
            "duration" => StatusField::Duration(parse_decimal_or_zero(&value)),
            // mixer volume, playlist state, player info...
            _ => continue,
        };
        fields.push(field);
    }

    StatusLine {
        fields,
        malformed: None,
    }
}
