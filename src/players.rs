//! Discovered players and active-player selection

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use serde::{Deserialize, Serialize};

use crate::protocol::PlayerListing;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: String,
    pub name: String,
}

/// Player id → name mapping, replaced wholesale on every enumeration.
#[derive(Default)]
pub struct PlayerRegistry {
    players: ArcSwapOption<HashMap<String, String>>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&self, players: HashMap<String, String>) {
        self.players.store(Some(Arc::new(players)));
    }

    /// `None` until the first enumeration arrives
    pub fn snapshot(&self) -> Option<Vec<PlayerInfo>> {
        let players = self.players.load_full()?;
        let mut list: Vec<PlayerInfo> = players
            .iter()
            .map(|(id, name)| PlayerInfo {
                id: id.clone(),
                name: name.clone(),
            })
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Some(list)
    }

    pub fn name_of(&self, id: &str) -> Option<String> {
        let players = self.players.load();
        let players = Option::as_ref(&players)?;
        players.get(id).cloned()
    }
}

/// Pick the player to steer after an enumeration: the last connected player
/// if it is still listed, otherwise the last id the server reported.
pub fn select_active(listing: &PlayerListing, last_connected: Option<&str>) -> Option<String> {
    last_connected
        .filter(|id| listing.players.contains_key(*id))
        .map(str::to_string)
        .or_else(|| listing.last_player_id.clone())
}
