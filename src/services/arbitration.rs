//! Reactive pinning of the top track, restricted to the party owner.
//!
//! Among all clients viewing the same party, only the owner without a
//! competing playback master originates pins. Ownership plus the
//! single-master liveness flag approximate a leader election without a
//! consensus protocol; redundant pins of the same track are idempotent.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use crate::{
    dao::{models::TrackReference, store::SharedStore},
    dto::events::PartyEvent,
    services::queue_service,
    state::{PartyView, SharedView},
};

/// Inputs for one arbitration decision, captured fresh per notification.
#[derive(Debug, Clone, Default)]
pub struct ArbiterContext {
    /// Whether the local client owns the party.
    pub is_owner: bool,
    /// Whether another client is already acting as playback master.
    pub has_other_playback_master: bool,
    /// Reference of the current top track, when any is queued.
    pub top_track: Option<TrackReference>,
}

impl ArbiterContext {
    /// Capture the decision inputs from the shared view caches.
    pub async fn capture(view: &PartyView) -> Self {
        let party = view.party().await;
        let queue = view.queue().await;
        Self {
            is_owner: party.is_owner,
            has_other_playback_master: party.has_other_playback_master,
            top_track: queue.top_track().map(|entry| entry.reference.clone()),
        }
    }
}

/// Decide whether the local client should pin the current top track.
///
/// Skips when the client is not the owner, another playback master is live,
/// no candidate exists, or the candidate is the track pinned last.
pub fn decide(
    ctx: &ArbiterContext,
    last_pinned: Option<&TrackReference>,
) -> Option<TrackReference> {
    if !ctx.is_owner || ctx.has_other_playback_master {
        return None;
    }
    let candidate = ctx.top_track.as_ref()?;
    if last_pinned == Some(candidate) {
        return None;
    }
    Some(candidate.clone())
}

/// Drive pin arbitration from queue-change notifications until the hub closes.
///
/// Pins are spawned fire-and-forget: the loop moves on to the next
/// notification without awaiting its own writes. Overlapping in-flight pins
/// are tolerated because pins are idempotent.
pub async fn run(view: SharedView, store: Arc<dyn SharedStore>) {
    let mut notifications = view.events().subscribe();
    let mut last_pinned: Option<TrackReference> = None;

    loop {
        match notifications.recv().await {
            Ok(PartyEvent::TrackListUpdated) => {}
            Ok(_) => continue,
            // A lagged receiver still means the queue changed at some point;
            // coalesce the missed notifications into one pass.
            Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => break,
        }

        let ctx = ArbiterContext::capture(&view).await;
        let Some(next) = decide(&ctx, last_pinned.as_ref()) else {
            continue;
        };
        last_pinned = Some(next.clone());

        let store = Arc::clone(&store);
        let party = view.party_id().to_string();
        tokio::spawn(async move {
            if let Err(err) = queue_service::pin(store.as_ref(), &party, &next).await {
                warn!(error = %err, track = %next.key(), "background pin failed");
            }
        });
    }
}
