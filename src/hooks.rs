//! Side effects the session manager asks its host to perform.
//!
//! The core never talks to a notification area or a power manager directly;
//! the host injects an implementation of [`SessionHooks`].

use std::sync::atomic::{AtomicBool, Ordering};

/// What the ongoing indicator should display
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NowPlaying {
    Playing { song: String },
    /// Connected to the server but nothing playing
    Connected,
}

pub trait SessionHooks: Send + Sync {
    /// Hold or release whatever keeps the network up while audio plays
    fn set_power_lock(&self, held: bool);

    fn show_now_playing(&self, now_playing: NowPlaying);

    fn clear_now_playing(&self);
}

/// Hooks that do nothing
#[derive(Debug, Default)]
pub struct NoHooks;

impl SessionHooks for NoHooks {
    fn set_power_lock(&self, _held: bool) {}

    fn show_now_playing(&self, _now_playing: NowPlaying) {}

    fn clear_now_playing(&self) {}
}

/// Hooks for headless hosts: the indicator becomes log output and the power
/// lock is a flag.
#[derive(Debug, Default)]
pub struct LoggingHooks {
    lock_held: AtomicBool,
}

impl LoggingHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_lock_held(&self) -> bool {
        self.lock_held.load(Ordering::SeqCst)
    }
}

impl SessionHooks for LoggingHooks {
    fn set_power_lock(&self, held: bool) {
        let was_held = self.lock_held.swap(held, Ordering::SeqCst);
        if held && !was_held {
            tracing::debug!("Acquiring power lock while playing");
        } else if !held && was_held {
            tracing::debug!("Releasing power lock");
        }
    }

    fn show_now_playing(&self, now_playing: NowPlaying) {
        match now_playing {
            NowPlaying::Playing { song } => tracing::info!("Now playing: {}", song),
            NowPlaying::Connected => tracing::info!("Connected, nothing playing"),
        }
    }

    fn clear_now_playing(&self) {
        tracing::debug!("Clearing now-playing indicator");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logging_hooks_track_lock() {
        let hooks = LoggingHooks::new();
        assert!(!hooks.is_lock_held());
        hooks.set_power_lock(true);
        hooks.set_power_lock(true);
        assert!(hooks.is_lock_held());
        hooks.set_power_lock(false);
        assert!(!hooks.is_lock_held());
    }
}
