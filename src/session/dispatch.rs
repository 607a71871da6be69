//! Applies classified push lines to the session state and tells the observer.

use std::sync::atomic::Ordering;

use tracing::{debug, warn};

use super::connection::ConnectionSession;
use super::Inner;
use crate::hooks::NowPlaying;
use crate::players::select_active;
use crate::protocol::{
    classify_line, PlayMode, PlayerEvent, PlayerListing, PushLine, StatusField, StatusLine,
};

/// Asks for the full status of the active player after a track change
const STATUS_QUERY: &str = "status - 1 tags:ylqwaJ";

impl Inner {
    pub(super) fn handle_line(&self, session: &ConnectionSession, line: &str) {
        if self.debug_logging.load(Ordering::Relaxed) {
            debug!("LINE: {}", line);
        }

        match classify_line(line) {
            PushLine::Ignored => {}
            PushLine::PlayerList(Ok(listing)) => self.handle_player_list(session, listing),
            PushLine::PlayerList(Err(e)) => warn!("Ignoring player list: {}", e),
            PushLine::HttpPort(port) => {
                self.state.set_http_port(port);
                debug!("HTTP port is now: {}", port);
            }
            PushLine::Player { player_id, event } => {
                // Only the active player matters
                let is_active = session
                    .active_player()
                    .is_some_and(|active| !active.is_empty() && *active == player_id);
                if is_active {
                    self.handle_player_event(session, event);
                }
            }
        }
    }

    fn handle_player_event(&self, session: &ConnectionSession, event: PlayerEvent) {
        match event {
            PlayerEvent::Volume(volume) => {
                debug!("New volume is: {}", volume);
                self.state.set_volume(volume);
                self.notify(|sink| sink.on_volume_change(volume));
            }
            PlayerEvent::Play => self.set_playing_state(true),
            PlayerEvent::Stop => self.set_playing_state(false),
            PlayerEvent::Pause { playing } => {
                let playing = playing.unwrap_or(!self.state.is_playing());
                self.set_playing_state(playing);
            }
            PlayerEvent::Status(status) => self.apply_status(&status),
            PlayerEvent::NewSong(song) => {
                self.state.update_song(&song);
                self.update_indicator();
                self.notify(|sink| sink.on_music_changed());
                if !session.send_player_command(STATUS_QUERY) {
                    debug!("Status query for new song not sent");
                }
            }
            PlayerEvent::Other => {}
        }
    }

    fn apply_status(&self, status: &StatusLine) {
        let mut music_changed = false;
        let mut saw_artwork_id = false;
        let mut time = 0;
        let mut duration = 0;

        for field in &status.fields {
            match field {
                StatusField::Mode(PlayMode::Play) => self.set_playing_state(true),
                StatusField::Mode(PlayMode::Pause) => self.set_playing_state(false),
                StatusField::Artist(artist) => music_changed |= self.state.update_artist(artist),
                StatusField::Title(title) => music_changed |= self.state.update_song(title),
                StatusField::Album(album) => music_changed |= self.state.update_album(album),
                StatusField::ArtworkTrackId(id) => {
                    self.state.set_artwork_track_id(Some(id.clone()));
                    saw_artwork_id = true;
                }
                StatusField::Time(t) => time = *t,
                StatusField::Duration(d) => duration = *d,
            }
        }

        // What was read so far stays applied, but a broken line reports nothing
        if let Some(e) = &status.malformed {
            warn!("Status line cut short: {}", e);
            return;
        }

        if music_changed {
            // Streams without artwork ids fall back to the current-cover URL
            if !saw_artwork_id {
                self.state.set_artwork_track_id(None);
            }
            self.update_indicator();
            self.notify(|sink| sink.on_music_changed());
        }
        if music_changed || time != self.state.elapsed_seconds() {
            self.state.set_time(time, duration);
            self.notify(|sink| sink.on_time_in_song_change(time, duration));
        }
    }

    fn handle_player_list(&self, session: &ConnectionSession, listing: PlayerListing) {
        let last_player = self.settings.last_player();
        debug!(
            "Parsed {} players, last connected player was: {:?}",
            listing.players.len(),
            last_player
        );
        let active = select_active(&listing, last_player.as_deref());

        self.players.replace(listing.players);
        self.notify(|sink| sink.on_players_discovered());

        session.set_active_player(active);
        self.subscribe(session);
    }

    pub(super) fn set_playing_state(&self, playing: bool) {
        self.hooks.set_power_lock(playing);
        self.state.set_playing(playing);
        self.update_indicator();
        self.notify(|sink| sink.on_play_status_changed(playing));
    }

    pub(super) fn update_indicator(&self) {
        let playing = self.state.is_playing();
        let connected = self.connected.load(Ordering::SeqCst);
        if !connected || (!playing && !self.settings.notify_on_connection()) {
            self.hooks.clear_now_playing();
        } else if playing {
            self.hooks.show_now_playing(NowPlaying::Playing {
                song: self.state.song(),
            });
        } else {
            self.hooks.show_now_playing(NowPlaying::Connected);
        }
    }

    /// Subscribe to second-by-second status pushes while someone is watching
    pub(super) fn update_subscription(&self) {
        if let Some(session) = self.session.load_full() {
            self.subscribe(&session);
        }
    }

    fn subscribe(&self, session: &ConnectionSession) {
        let command = if self.observers.is_attached() {
            "status - 1 subscribe:1"
        } else {
            "status - 1 subscribe:0"
        };
        if !session.send_player_command(command) {
            debug!("No active player to apply '{}' to", command);
        }
    }
}
