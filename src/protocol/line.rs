//! Push line classification
//!
//! Every inbound line is routed by its leading tokens. First match wins:
//!
//! - `players 0 100 count...` is the player enumeration reply
//! - `pref httpport <n>` is the HTTP port reply
//! - anything else is `<playerid> <command> <args...>`
//!
//! Example player lines:
//! - `00%3A04%3A20%3Axx%3Ayy%3Azz playlist newsong Track%20Name 5`
//! - `00%3A04%3A20%3Axx%3Ayy%3Azz pause 1`
//! - `00%3A04%3A20%3Axx%3Ayy%3Azz prefset server volume 40`

use super::players::{parse_player_list, PlayerListing};
use super::status::{parse_status_line, StatusLine};
use super::{decode, parse_decimal_or_zero, split_tokens};
use crate::error::ProtocolError;

const PLAYER_LIST_PREFIX: &str = "players 0 100 count";
const VOLUME_MARKER: &str = "prefset server volume";

/// A classified inbound line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushLine {
    PlayerList(Result<PlayerListing, ProtocolError>),
    /// Reply to `pref httpport ?`; 0 when the value does not parse
    HttpPort(u16),
    /// A line addressed to one player; the caller decides whether it matters
    Player {
        player_id: String,
        event: PlayerEvent,
    },
    /// Fewer than two tokens
    Ignored,
}

/// What a player line means for the playback state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    /// `prefset server volume <n>`, 0 when unparseable
    Volume(i32),
    Play,
    Stop,
    /// `pause [0|1]`: `Some(true)` resumes, `Some(false)` pauses, `None` toggles
    Pause { playing: Option<bool> },
    Status(StatusLine),
    /// `playlist newsong <title> ...`
    NewSong(String),
    /// Any other command (`mixer`, `power`, `client`, `playlist index`, ...)
    Other,
}

/// Classify one raw line (without the trailing newline).
pub fn classify_line(line: &str) -> PushLine {
    let tokens = split_tokens(line);
    if tokens.len() < 2 {
        return PushLine::Ignored;
    }

    if line.starts_with(PLAYER_LIST_PREFIX) {
        return PushLine::PlayerList(parse_player_list(&tokens));
    }

    if tokens[0] == "pref" && tokens[1] == "httpport" {
        if let Some(port) = tokens.get(2) {
            return PushLine::HttpPort(port.trim().parse().unwrap_or(0));
        }
    }

    PushLine::Player {
        player_id: decode(tokens[0]),
        event: PlayerEvent::parse(&tokens, line),
    }
}

impl PlayerEvent {
    fn parse(tokens: &[&str], raw: &str) -> Self {
        if raw.contains(VOLUME_MARKER) {
            return match tokens.get(4) {
                Some(volume) => PlayerEvent::Volume(parse_decimal_or_zero(&decode(volume))),
                None => {
                    tracing::debug!("Volume line without a value: {}", raw);
                    PlayerEvent::Other
                }
            };
        }

        match tokens[1] {
            "play" => PlayerEvent::Play,
            "stop" => PlayerEvent::Stop,
            "pause" => {
                let playing = match tokens.get(2).copied() {
                    Some("0") => Some(true),
                    Some("1") => Some(false),
                    _ => None,
                };
                PlayerEvent::Pause { playing }
            }
            "status" => PlayerEvent::Status(parse_status_line(tokens)),
            "playlist" if tokens.len() >= 4 && tokens[2] == "newsong" => {
                PlayerEvent::NewSong(decode(tokens[3]))
            }
            _ => PlayerEvent::Other,
        }
    }
}
