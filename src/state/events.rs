use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::dto::events::PartyEvent;

/// Broadcast hub fanning coordination events out to the loops and the
/// embedding application.
pub struct EventHub {
    sender: broadcast::Sender<PartyEvent>,
}

impl EventHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<PartyEvent> {
        self.sender.subscribe()
    }

    /// Subscribe as a stream, for embedders driving UI updates from events.
    pub fn stream(&self) -> BroadcastStream<PartyEvent> {
        BroadcastStream::new(self.sender.subscribe())
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: PartyEvent) {
        let _ = self.sender.send(event);
    }
}
