use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;
use validator::Validate;

/// Stable reference to a track at its music provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Validate)]
pub struct TrackReference {
    /// Music provider hosting the track (e.g. `spotify`).
    #[validate(length(min = 1))]
    pub provider: String,
    /// Provider-native track id.
    #[validate(length(min = 1))]
    pub id: String,
}

impl TrackReference {
    /// Store key for this track, shared by the queue and both vote indices.
    pub fn key(&self) -> String {
        format!("{}-{}", self.provider, self.id)
    }
}

/// Queue entry persisted under `/tracks/<party>`.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackEntity {
    /// Reference to the underlying track.
    pub reference: TrackReference,
    /// Queue position; lower sorts earlier.
    pub order: i64,
    /// Milliseconds timestamp at which the track was queued.
    pub added_at: i64,
    /// Whether the entry came from the fallback playlist rather than a vote.
    #[serde(default)]
    pub is_fallback: bool,
    /// Denormalized count of positive votes on the track.
    #[serde(default)]
    pub vote_count: i64,
    /// Milliseconds timestamp set once playback of the track started.
    pub played_at: Option<i64>,
    /// Opaque display metadata (title, artist, artwork, ...).
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, Value>,
}

impl TrackEntity {
    /// Whether the track still counts as queued (never marked played).
    pub fn is_unplayed(&self) -> bool {
        self.played_at.is_none()
    }
}

/// Party metadata persisted under `/parties/<party>`; read-only for this core.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartyEntity {
    /// Uid of the client that created the party.
    #[serde(default)]
    pub created_by: String,
    /// Uid of the client currently driving playback, when one announced
    /// itself. Liveness of this flag is maintained externally.
    pub playback_master: Option<String>,
    /// Party behaviour toggles.
    pub settings: Option<PartySettingsEntity>,
}

/// Party behaviour toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartySettingsEntity {
    /// Whether guests without a full account may vote.
    #[serde(default = "default_allow_anonymous")]
    pub allow_anonymous_voters: bool,
}

impl Default for PartySettingsEntity {
    fn default() -> Self {
        Self {
            allow_anonymous_voters: true,
        }
    }
}

fn default_allow_anonymous() -> bool {
    true
}
