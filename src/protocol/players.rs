//! Player enumeration response parsing
//!
//! The reply to `players 0 100` is a single line of repeating groups:
//!
//! ```text
//! players 0 100 count%3A2 playerindex%3A0 playerid%3A00%3A04%3A20%3Aaa%3Abb%3Acc
//!     name%3AKitchen model%3Areceiver playerindex%3A1 playerid%3A... name%3AOffice
//! ```

use std::collections::HashMap;

use super::{decode, KEY_VALUE_SEPARATOR};
use crate::error::ProtocolError;

/// `players`, `0`, `100` come first
const FIRST_FIELD_INDEX: usize = 3;

/// Result of one player enumeration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerListing {
    /// Player id → display name, complete groups only
    pub players: HashMap<String, String>,
    /// The last non-empty `playerid` seen on the line
    pub last_player_id: Option<String>,
}

/// Parse the tokens of a player enumeration line.
///
/// A new `playerindex` starts a new group; groups missing an id or a name are
/// dropped. Any token without a separator rejects the line.
pub fn parse_player_list(tokens: &[&str]) -> Result<PlayerListing, ProtocolError> {
    let mut listing = PlayerListing::default();
    let mut id: Option<String> = None;
    let mut name: Option<String> = None;

    for token in tokens.iter().skip(FIRST_FIELD_INDEX) {
        let Some((key, value)) = token.split_once(KEY_VALUE_SEPARATOR) else {
            return Err(ProtocolError::PlayerListToken(token.to_string()));
        };
        let value = decode(value);
        match key {
            "playerindex" => flush_group(id.take(), name.take(), &mut listing.players),
            "playerid" => {
                if !value.is_empty() {
                    listing.last_player_id = Some(value.clone());
                }
                id = Some(value);
            }
            "name" => name = Some(value),
            _ => {}
        }
    }
    flush_group(id, name, &mut listing.players);

    Ok(listing)
}

fn flush_group(id: Option<String>, name: Option<String>, players: &mut HashMap<String, String>) {
    if let (Some(id), Some(name)) = (id, name) {
        if !id.is_empty() && !name.is_empty() {
            tracing::debug!("Adding player: {}, {}", id, name);
            players.insert(id, name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::split_tokens;

    fn parse(line: &str) -> Result<PlayerListing, ProtocolError> {
        parse_player_list(&split_tokens(line))
    }

    #[test]
    fn parses_two_players() {
        let listing = parse(
            "players 0 100 count%3A2 playerindex%3A0 playerid%3AA name%3AKitchen \
             playerindex%3A1 playerid%3AB name%3AOffice",
        )
        .unwrap();

        assert_eq!(listing.players.len(), 2);
        assert_eq!(listing.players["A"], "Kitchen");
        assert_eq!(listing.players["B"], "Office");
        assert_eq!(listing.last_player_id.as_deref(), Some("B"));
    }

    #[test]
    fn decodes_ids_and_names() {
        let listing = parse(
            "players 0 100 count%3A1 playerindex%3A0 \
             playerid%3A00%253A04%253A20%253Aaa%253Abb%253Acc name%3ALiving%20Room",
        )
        .unwrap();

        assert_eq!(listing.players["00%3A04%3A20%3Aaa%3Abb%3Acc"], "Living Room");
    }

    #[test]
    fn group_order_may_vary() {
        let listing = parse(
            "players 0 100 count%3A2 playerindex%3A0 name%3AKitchen playerid%3AA \
             playerindex%3A1 playerid%3AB model%3Asqueezelite name%3AOffice",
        )
        .unwrap();

        assert_eq!(listing.players["A"], "Kitchen");
        assert_eq!(listing.players["B"], "Office");
    }

    #[test]
    fn drops_incomplete_groups() {
        let listing = parse(
            "players 0 100 count%3A3 playerindex%3A0 playerid%3AA \
             playerindex%3A1 name%3ANameless playerindex%3A2 playerid%3AC name%3A",
        )
        .unwrap();

        assert!(listing.players.is_empty());
        assert_eq!(listing.last_player_id.as_deref(), Some("C"));
    }

    #[test]
    fn empty_listing() {
        let listing = parse("players 0 100 count%3A0").unwrap();
        assert!(listing.players.is_empty());
        assert_eq!(listing.last_player_id, None);
    }

    #[test]
    fn rejects_token_without_separator() {
        let err = parse("players 0 100 count%3A1 playerindex%3A0 oops").unwrap_err();
        assert_eq!(err, ProtocolError::PlayerListToken("oops".to_string()));
    }
}
