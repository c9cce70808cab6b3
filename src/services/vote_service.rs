//! The vote ledger: one fact written through two denormalized indices.

use futures::future::try_join;
use serde_json::Value;

use crate::{
    auth::AuthProvider,
    dao::store::{SharedStore, paths},
    dto::{events::PartyEvent, requests::SetVoteRequest},
    error::ServiceError,
    state::PartyView,
};

/// Outcome of a vote request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// Both index writes settled.
    Applied,
    /// The party requires a signed-in voter; a login prompt was requested.
    NeedsLogin,
}

/// Record `vote` for the current user on both vote indices.
///
/// The two writes target disjoint keys per user and are issued concurrently;
/// either failure fails the call and may leave the indices divergent until a
/// retry of the same vote converges them again.
pub async fn set_vote(
    view: &PartyView,
    store: &dyn SharedStore,
    auth: &dyn AuthProvider,
    request: &SetVoteRequest,
) -> Result<VoteOutcome, ServiceError> {
    let settings = view.party().await.settings;
    let identity = auth.current_session().await?;
    if !settings.allow_anonymous_voters && identity.is_anonymous {
        view.events().broadcast(PartyEvent::LoginPromptRequested);
        return Ok(VoteOutcome::NeedsLogin);
    }

    let party = view.party_id();
    let track_key = request.reference.key();

    // Announce the vote before the index writes settle so the UI reflects it
    // immediately.
    view.events().broadcast(PartyEvent::VoteApplied {
        reference: request.reference.clone(),
        vote: request.vote,
    });

    let by_track = store.set(
        &paths::vote(party, &track_key, &identity.uid),
        Value::from(request.vote),
    );
    let by_user = store.set(
        &paths::user_vote(party, &identity.uid, &track_key),
        Value::from(request.vote),
    );
    try_join(by_track, by_user).await?;
    Ok(VoteOutcome::Applied)
}
