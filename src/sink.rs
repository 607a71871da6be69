//! Observer interface and the single-slot registration holding it

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;

/// Receives every externally visible state change of a session.
///
/// Calls happen on the read-loop or connect-worker task, in the order the
/// state changed. Implementations must not block.
pub trait EventSink: Send + Sync {
    fn on_connection_changed(&self, _connected: bool, _post_connect: bool) {}

    fn on_music_changed(&self) {}

    fn on_play_status_changed(&self, _playing: bool) {}

    fn on_volume_change(&self, _volume: i32) {}

    fn on_time_in_song_change(&self, _elapsed: i32, _duration: i32) {}

    fn on_players_discovered(&self) {}
}

/// Identifies one `attach` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverToken(u64);

struct Registration {
    token: ObserverToken,
    sink: Arc<dyn EventSink>,
}

/// Holds at most one observer. Attach swaps the slot; detach clears it only
/// while the caller's registration is still current.
#[derive(Default)]
pub struct ObserverSlot {
    current: ArcSwapOption<Registration>,
    next_token: AtomicU64,
}

impl ObserverSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, sink: Arc<dyn EventSink>) -> ObserverToken {
        let token = ObserverToken(self.next_token.fetch_add(1, Ordering::SeqCst));
        self.current.store(Some(Arc::new(Registration { token, sink })));
        token
    }

    /// Returns whether `token` was the current registration
    pub fn detach(&self, token: ObserverToken) -> bool {
        let mut detached = false;
        self.current.rcu(|current| match current {
            Some(registration) if registration.token == token => {
                detached = true;
                None
            }
            other => {
                detached = false;
                other.clone()
            }
        });
        detached
    }

    pub fn current(&self) -> Option<Arc<dyn EventSink>> {
        self.current
            .load_full()
            .map(|registration| Arc::clone(&registration.sink))
    }

    pub fn is_attached(&self) -> bool {
        self.current.load().is_some()
    }

    pub fn clear(&self) {
        self.current.store(None);
    }
}
