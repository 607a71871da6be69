//! Event bus for session events
//!
//! Uses tokio::sync::broadcast for pub/sub pattern.
//! [`BusSink`] publishes every observer callback so any number of consumers
//! (the command-line host, tests) can follow a session.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::sink::EventSink;

/// Session events as published on the bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientEvent {
    ConnectionChanged { connected: bool, post_connect: bool },
    MusicChanged,
    PlayStatusChanged { playing: bool },
    VolumeChanged { volume: i32 },
    TimeInSongChanged { elapsed: i32, duration: i32 },
    PlayersDiscovered,
}

/// Event bus handle for publishing and subscribing
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ClientEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: ClientEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    /// 256 events
    fn default() -> Self {
        Self::new(256)
    }
}

/// Shared event bus wrapped in Arc for thread-safe sharing
pub type SharedBus = Arc<EventBus>;

pub fn create_bus() -> SharedBus {
    Arc::new(EventBus::default())
}

/// Observer that republishes every callback on the bus
pub struct BusSink {
    bus: SharedBus,
}

impl BusSink {
    pub fn new(bus: SharedBus) -> Self {
        Self { bus }
    }
}

impl EventSink for BusSink {
    fn on_connection_changed(&self, connected: bool, post_connect: bool) {
        self.bus.publish(ClientEvent::ConnectionChanged {
            connected,
            post_connect,
        });
    }

    fn on_music_changed(&self) {
        self.bus.publish(ClientEvent::MusicChanged);
    }

    fn on_play_status_changed(&self, playing: bool) {
        self.bus.publish(ClientEvent::PlayStatusChanged { playing });
    }

    fn on_volume_change(&self, volume: i32) {
        self.bus.publish(ClientEvent::VolumeChanged { volume });
    }

    fn on_time_in_song_change(&self, elapsed: i32, duration: i32) {
        self.bus
            .publish(ClientEvent::TimeInSongChanged { elapsed, duration });
    }

    fn on_players_discovered(&self) {
        self.bus.publish(ClientEvent::PlayersDiscovered);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pubsub() {
        let bus = create_bus();
        let mut rx = bus.subscribe();

        bus.publish(ClientEvent::VolumeChanged { volume: 40 });

        let event = rx.recv().await.unwrap();
        assert_eq!(event, ClientEvent::VolumeChanged { volume: 40 });
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = create_bus();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(ClientEvent::MusicChanged);

        assert_eq!(rx1.recv().await.unwrap(), ClientEvent::MusicChanged);
        assert_eq!(rx2.recv().await.unwrap(), ClientEvent::MusicChanged);
    }

    #[tokio::test]
    async fn test_bus_sink_forwards_callbacks() {
        let bus = create_bus();
        let mut rx = bus.subscribe();
        let sink = BusSink::new(bus.clone());

        sink.on_connection_changed(true, true);
        sink.on_time_in_song_change(12, 240);

        assert_eq!(
            rx.recv().await.unwrap(),
            ClientEvent::ConnectionChanged {
                connected: true,
                post_connect: true
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            ClientEvent::TimeInSongChanged {
                elapsed: 12,
                duration: 240
            }
        );
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(ClientEvent::PlayStatusChanged { playing: true }).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "PlayStatusChanged", "payload": {"playing": true}})
        );
        let json = serde_json::to_value(ClientEvent::MusicChanged).unwrap();
        assert_eq!(json, serde_json::json!({"type": "MusicChanged"}));
    }
}
