use serde::Deserialize;
use validator::Validate;

use crate::dao::models::TrackReference;

/// Ask the core to record the caller's vote on a track.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SetVoteRequest {
    /// Track the vote applies to.
    #[validate(nested)]
    pub reference: TrackReference,
    /// New vote value.
    pub vote: bool,
}

/// Ask the core to remove a track from the active queue.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RemoveTrackRequest {
    /// Track to remove.
    #[validate(nested)]
    pub reference: TrackReference,
    /// Whether to archive the removed track into the play history.
    pub move_to_history: bool,
}

/// Ask the core to link an additional auth provider to the session.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LinkProviderRequest {
    /// Provider to link (e.g. `google`, `github`).
    #[validate(length(min = 1))]
    pub provider: String,
}

/// UI-originated intents consumed by the dispatcher loop.
#[derive(Debug, Clone)]
pub enum PartyCommand {
    /// Record a vote.
    SetVote(SetVoteRequest),
    /// Remove a track from the queue.
    RemoveTrack(RemoveTrackRequest),
    /// Link an additional auth provider.
    LinkProvider(LinkProviderRequest),
}
