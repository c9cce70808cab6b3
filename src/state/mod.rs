//! Shared, possibly-stale in-memory view of one party.

mod events;
pub mod queue;

pub use events::EventHub;
pub use queue::Queue;

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::dao::models::PartySettingsEntity;

/// Handle to the shared party view.
pub type SharedView = Arc<PartyView>;

/// Read-only facts about the party, cached from the store.
#[derive(Debug, Clone, Default)]
pub struct PartyState {
    /// Whether this client created the party.
    pub is_owner: bool,
    /// Whether another client is currently acting as playback master.
    pub has_other_playback_master: bool,
    /// Party behaviour toggles.
    pub settings: PartySettingsEntity,
}

/// Central shared state for one party view.
///
/// Every field is a transient cache of the store; the store remains the
/// single source of truth.
pub struct PartyView {
    party_id: String,
    party: RwLock<PartyState>,
    queue: RwLock<Queue>,
    current_uid: RwLock<Option<String>>,
    events: EventHub,
}

impl PartyView {
    /// Construct a view wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(party_id: impl Into<String>, event_capacity: usize) -> SharedView {
        Arc::new(Self {
            party_id: party_id.into(),
            party: RwLock::new(PartyState::default()),
            queue: RwLock::new(Queue::default()),
            current_uid: RwLock::new(None),
            events: EventHub::new(event_capacity),
        })
    }

    /// Id of the party this view observes.
    pub fn party_id(&self) -> &str {
        &self.party_id
    }

    /// Broadcast hub for coordination events.
    pub fn events(&self) -> &EventHub {
        &self.events
    }

    /// Snapshot of the cached party facts.
    pub async fn party(&self) -> PartyState {
        self.party.read().await.clone()
    }

    /// Replace the cached party facts.
    pub async fn set_party(&self, party: PartyState) {
        *self.party.write().await = party;
    }

    /// Snapshot of the cached queue.
    pub async fn queue(&self) -> Queue {
        self.queue.read().await.clone()
    }

    /// Replace the cached queue snapshot.
    pub async fn set_queue(&self, queue: Queue) {
        *self.queue.write().await = queue;
    }

    /// Uid of the locally signed-in user, once known.
    pub async fn current_uid(&self) -> Option<String> {
        self.current_uid.read().await.clone()
    }

    /// Record the locally signed-in uid.
    pub async fn set_current_uid(&self, uid: impl Into<String>) {
        *self.current_uid.write().await = Some(uid.into());
    }
}
