//! Keeps the shared view caches fresh from the store and fans out
//! queue-change notifications.

use std::{sync::Arc, time::Duration};

use futures::StreamExt;
use serde_json::Value;
use tokio::time::sleep;
use tracing::warn;

use crate::{
    dao::{
        models::PartyEntity,
        store::{SharedStore, paths},
    },
    dto::events::PartyEvent,
    state::{PartyState, Queue, SharedView},
};

/// Delay before a failed watch subscription is re-entered.
const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(1);

/// Mirror the store into the shared view for the lifetime of the party view.
pub async fn run(view: SharedView, store: Arc<dyn SharedStore>) {
    tokio::join!(
        watch_queue(view.clone(), store.clone()),
        watch_party(view, store),
    );
}

async fn watch_queue(view: SharedView, store: Arc<dyn SharedStore>) {
    let path = paths::tracks(view.party_id());
    loop {
        let mut updates = store.watch(&path);
        while let Some(update) = updates.next().await {
            match update {
                Ok(value) => match Queue::from_value(&value) {
                    Ok(queue) => {
                        view.set_queue(queue).await;
                        view.events().broadcast(PartyEvent::TrackListUpdated);
                    }
                    Err(err) => warn!(error = %err, "ignoring malformed queue snapshot"),
                },
                Err(err) => {
                    warn!(error = %err, "queue watch failed; resubscribing");
                    break;
                }
            }
        }
        sleep(RESUBSCRIBE_DELAY).await;
    }
}

async fn watch_party(view: SharedView, store: Arc<dyn SharedStore>) {
    let path = paths::party(view.party_id());
    loop {
        let mut updates = store.watch(&path);
        while let Some(update) = updates.next().await {
            match update {
                Ok(value) => match parse_party(&value) {
                    Ok(entity) => {
                        let uid = view.current_uid().await;
                        view.set_party(derive_party_state(&entity, uid.as_deref()))
                            .await;
                    }
                    Err(err) => warn!(error = %err, "ignoring malformed party snapshot"),
                },
                Err(err) => {
                    warn!(error = %err, "party watch failed; resubscribing");
                    break;
                }
            }
        }
        sleep(RESUBSCRIBE_DELAY).await;
    }
}

fn parse_party(value: &Value) -> Result<PartyEntity, serde_json::Error> {
    if value.is_null() {
        Ok(PartyEntity::default())
    } else {
        serde_json::from_value(value.clone())
    }
}

/// Derive the cached party facts from the raw entity and the local uid.
pub fn derive_party_state(entity: &PartyEntity, current_uid: Option<&str>) -> PartyState {
    let is_owner = current_uid.is_some_and(|uid| uid == entity.created_by);
    let has_other_playback_master = entity
        .playback_master
        .as_deref()
        .is_some_and(|master| current_uid != Some(master));
    PartyState {
        is_owner,
        has_other_playback_master,
        settings: entity.settings.unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::{models::PartySettingsEntity, store::memory::MemoryStore},
        state::PartyView,
    };
    use serde_json::json;
    use tokio::time::timeout;

    #[test]
    fn ownership_requires_a_matching_uid() {
        let entity = PartyEntity {
            created_by: "uid-1".into(),
            ..PartyEntity::default()
        };
        assert!(derive_party_state(&entity, Some("uid-1")).is_owner);
        assert!(!derive_party_state(&entity, Some("uid-2")).is_owner);
        assert!(!derive_party_state(&entity, None).is_owner);
    }

    #[test]
    fn the_local_client_is_not_its_own_contender() {
        let entity = PartyEntity {
            created_by: "uid-1".into(),
            playback_master: Some("uid-2".into()),
            ..PartyEntity::default()
        };
        assert!(derive_party_state(&entity, Some("uid-1")).has_other_playback_master);
        assert!(!derive_party_state(&entity, Some("uid-2")).has_other_playback_master);

        let unclaimed = PartyEntity {
            created_by: "uid-1".into(),
            ..PartyEntity::default()
        };
        assert!(!derive_party_state(&unclaimed, Some("uid-1")).has_other_playback_master);
    }

    #[test]
    fn absent_settings_fall_back_to_defaults() {
        let state = derive_party_state(&PartyEntity::default(), None);
        assert_eq!(state.settings, PartySettingsEntity::default());
    }

    #[tokio::test]
    async fn queue_updates_refresh_the_cache_and_notify() {
        let store = Arc::new(MemoryStore::new());
        let view = PartyView::new("p1", 16);
        let mut events = view.events().subscribe();

        tokio::spawn(run(view.clone(), store.clone() as Arc<dyn SharedStore>));

        // Initial (empty) snapshot.
        let first = timeout(Duration::from_secs(1), events.recv()).await;
        assert_eq!(first.unwrap().unwrap(), PartyEvent::TrackListUpdated);

        store
            .set(
                "tracks/p1/spotify-a",
                json!({
                    "reference": { "provider": "spotify", "id": "a" },
                    "order": 1,
                    "added_at": 1_600_000_000_000i64,
                }),
            )
            .await
            .unwrap();

        let second = timeout(Duration::from_secs(1), events.recv()).await;
        assert_eq!(second.unwrap().unwrap(), PartyEvent::TrackListUpdated);
        assert_eq!(view.queue().await.len(), 1);
    }

    #[tokio::test]
    async fn party_updates_refresh_the_cached_flags() {
        let store = Arc::new(MemoryStore::new());
        let view = PartyView::new("p1", 16);
        view.set_current_uid("uid-1").await;

        tokio::spawn(run(view.clone(), store.clone() as Arc<dyn SharedStore>));

        store
            .set(
                "parties/p1",
                json!({
                    "created_by": "uid-1",
                    "settings": { "allow_anonymous_voters": false },
                }),
            )
            .await
            .unwrap();

        timeout(Duration::from_secs(1), async {
            loop {
                let party = view.party().await;
                if party.is_owner && !party.settings.allow_anonymous_voters {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }
}
