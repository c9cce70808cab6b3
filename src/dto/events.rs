use crate::{auth::Identity, dao::models::TrackReference};

/// Events broadcast on the party hub for the embedding application and the
/// coordination loops.
#[derive(Debug, Clone, PartialEq)]
pub enum PartyEvent {
    /// The active queue snapshot changed.
    TrackListUpdated,
    /// A vote was applied locally and its index writes are in flight.
    VoteApplied {
        /// Track the vote applies to.
        reference: TrackReference,
        /// Vote value.
        vote: bool,
    },
    /// The user must sign in before the intent can proceed.
    LoginPromptRequested,
    /// The session identity is known and non-anonymous.
    AuthStatusKnown {
        /// Normalized provider id (trailing domain suffix stripped).
        provider: String,
        /// The authenticated identity.
        identity: Identity,
    },
    /// An OAuth exchange failed in a classified way.
    OAuthExchangeFailed {
        /// Provider the failure is attributed to.
        provider: String,
        /// Human-readable failure description.
        message: String,
    },
    /// A user-visible failure notice.
    ToastRequested {
        /// Message to present.
        message: String,
    },
}
