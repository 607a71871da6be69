//! Derived playback state
//!
//! Written only from the read loop, read from any task. Every field is an
//! atomic or an `ArcSwap` so readers never wait on the writer.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU16, Ordering};
use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};

#[derive(Default)]
pub struct PlaybackState {
    playing: AtomicBool,
    artist: ArcSwap<String>,
    album: ArcSwap<String>,
    song: ArcSwap<String>,
    artwork_track_id: ArcSwapOption<String>,
    elapsed_seconds: AtomicI32,
    duration_seconds: AtomicI32,
    volume: AtomicI32,
    /// 0 until the server answers `pref httpport ?`
    http_port: AtomicU16,
    host: ArcSwap<String>,
}

/// Store `value` if it differs from the current one, returning whether it changed.
fn compare_and_set(slot: &ArcSwap<String>, value: &str) -> bool {
    let mut changed = false;
    slot.rcu(|current| {
        changed = current.as_str() != value;
        if changed {
            Arc::new(value.to_string())
        } else {
            Arc::clone(current)
        }
    });
    changed
}

impl PlaybackState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    pub(crate) fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::SeqCst);
    }

    pub fn artist(&self) -> String {
        self.artist.load().as_ref().clone()
    }

    pub fn album(&self) -> String {
        self.album.load().as_ref().clone()
    }

    pub fn song(&self) -> String {
        self.song.load().as_ref().clone()
    }

    pub(crate) fn update_artist(&self, artist: &str) -> bool {
        compare_and_set(&self.artist, artist)
    }

    pub(crate) fn update_album(&self, album: &str) -> bool {
        compare_and_set(&self.album, album)
    }

    pub(crate) fn update_song(&self, song: &str) -> bool {
        compare_and_set(&self.song, song)
    }

    pub fn artwork_track_id(&self) -> Option<String> {
        self.artwork_track_id.load_full().map(|id| id.as_ref().clone())
    }

    pub(crate) fn set_artwork_track_id(&self, id: Option<String>) {
        self.artwork_track_id.store(id.map(Arc::new));
    }

    pub fn elapsed_seconds(&self) -> i32 {
        self.elapsed_seconds.load(Ordering::SeqCst)
    }

    pub fn duration_seconds(&self) -> i32 {
        self.duration_seconds.load(Ordering::SeqCst)
    }

    pub(crate) fn set_time(&self, elapsed: i32, duration: i32) {
        self.elapsed_seconds.store(elapsed, Ordering::SeqCst);
        self.duration_seconds.store(duration, Ordering::SeqCst);
    }

    pub fn volume(&self) -> i32 {
        self.volume.load(Ordering::SeqCst)
    }

    pub(crate) fn set_volume(&self, volume: i32) {
        self.volume.store(volume, Ordering::SeqCst);
    }

    pub fn http_port(&self) -> Option<u16> {
        match self.http_port.load(Ordering::SeqCst) {
            0 => None,
            port => Some(port),
        }
    }

    pub(crate) fn set_http_port(&self, port: u16) {
        self.http_port.store(port, Ordering::SeqCst);
    }

    pub fn host(&self) -> String {
        self.host.load().as_ref().clone()
    }

    pub(crate) fn set_host(&self, host: &str) {
        self.host.store(Arc::new(host.to_string()));
    }

    /// Cover art URL for the current track.
    ///
    /// Empty until the HTTP port is known. Without an artwork id the URL
    /// points at the player's current cover, with the song title appended so
    /// a new track yields a new URL.
    pub fn album_art_url(&self, active_player_id: Option<&str>) -> String {
        let Some(port) = self.http_port() else {
            return String::new();
        };
        let host = self.host();
        match self.artwork_track_id() {
            Some(id) => format!("http://{}:{}/music/{}/cover.jpg", host, port, id),
            None => format!(
                "http://{}:{}/music/current/cover?player={}&song={}",
                host,
                port,
                active_player_id.unwrap_or_default(),
                urlencoding::encode(&self.song())
            ),
        }
    }
}
