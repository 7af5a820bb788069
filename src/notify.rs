use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::Event;

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub for duty events, one channel per duty. Soldier intake
/// events are not broadcast; subscribers care about assignment changes.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<Event>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to events for a duty. Creates the channel if needed.
    pub fn subscribe(&self, duty_id: Ulid) -> broadcast::Receiver<Event> {
        let sender = self
            .channels
            .entry(duty_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send a notification. No-op if nobody is listening.
    pub fn send(&self, duty_id: Ulid, event: &Event) {
        if let Some(sender) = self.channels.get(&duty_id) {
            let _ = sender.send(event.clone());
        }
    }

    /// Remove a channel (e.g. when a duty is deleted).
    pub fn remove(&self, duty_id: &Ulid) {
        self.channels.remove(duty_id);
    }
}
