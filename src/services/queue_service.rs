//! Pin, removal, and played-marking operations on the active queue.

use futures::future::try_join4;
use serde_json::Value;

use crate::{
    dao::{
        models::{TrackEntity, TrackReference},
        storage::StoreError,
        store::{SharedStore, paths, server_timestamp},
    },
    error::ServiceError,
};

/// Order value that forces a track to the front of the queue.
///
/// One above the numeric floor; the floor itself stays unreachable so a
/// pinned track sorts before every naturally assigned order.
pub const PINNED_ORDER: i64 = i64::MIN + 1;

/// Force `track` to the front of the queue.
///
/// Idempotent: repeated pins rewrite the same order value.
pub async fn pin(
    store: &dyn SharedStore,
    party: &str,
    track: &TrackReference,
) -> Result<(), ServiceError> {
    let path = paths::track_order(party, &track.key());
    store.set(&path, Value::from(PINNED_ORDER)).await?;
    Ok(())
}

/// Stamp `track` with the server clock once playback of it started.
pub async fn mark_played(
    store: &dyn SharedStore,
    party: &str,
    track: &TrackReference,
) -> Result<(), ServiceError> {
    let path = paths::track_played_at(party, &track.key());
    store.set(&path, server_timestamp()).await?;
    Ok(())
}

/// Remove `track` from the queue and cascade across both vote indices and,
/// optionally, the play history.
///
/// The four parts run concurrently and the call fails if any of them fails.
/// There is no compensating rollback: a partial failure can leave the track
/// gone from the queue with, say, the history entry missing, and the caller
/// surfaces that as a plain failure.
pub async fn remove(
    store: &dyn SharedStore,
    party: &str,
    track: &TrackEntity,
    move_to_history: bool,
) -> Result<(), ServiceError> {
    let track_key = track.reference.key();

    let archived = if move_to_history {
        Some(
            serde_json::to_value(track).map_err(|source| StoreError::Codec {
                path: paths::history(party),
                source,
            })?,
        )
    } else {
        None
    };

    let filter_key = track_key.clone();
    let drop_user_votes = store.transaction(
        &paths::votes_by_user(party),
        Box::new(move |votes| strip_track_votes(votes, &filter_key)),
    );

    let history_path = paths::history(party);
    let archive = async {
        match archived {
            Some(value) => store.push(&history_path, value).await.map(|_key| ()),
            None => Ok(()),
        }
    };

    try_join4(
        store.delete(&paths::track(party, &track_key)),
        store.delete(&paths::votes_by_track(party, &track_key)),
        drop_user_votes,
        archive,
    )
    .await?;
    Ok(())
}

/// Drop `track_key` from every per-user vote map.
fn strip_track_votes(votes: Value, track_key: &str) -> Value {
    match votes {
        Value::Object(users) => Value::Object(
            users
                .into_iter()
                .map(|(uid, mut user_votes)| {
                    if let Value::Object(map) = &mut user_votes {
                        map.remove(track_key);
                    }
                    (uid, user_votes)
                })
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::store::memory::MemoryStore;
    use serde_json::json;

    fn track(id: &str, order: i64) -> TrackEntity {
        TrackEntity {
            reference: TrackReference {
                provider: "spotify".into(),
                id: id.into(),
            },
            order,
            added_at: 1_600_000_000_000,
            is_fallback: false,
            vote_count: 3,
            played_at: None,
            metadata: serde_json::Map::new(),
        }
    }

    async fn seed(store: &MemoryStore, entity: &TrackEntity) {
        let key = entity.reference.key();
        store
            .set(
                &paths::track("p1", &key),
                serde_json::to_value(entity).unwrap(),
            )
            .await
            .unwrap();
        store
            .set(&paths::vote("p1", &key, "u1"), json!(true))
            .await
            .unwrap();
        store
            .set(&paths::user_vote("p1", "u1", &key), json!(true))
            .await
            .unwrap();
        store
            .set(&paths::user_vote("p1", "u2", &key), json!(false))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn pinning_twice_leaves_the_same_order() {
        let store = MemoryStore::new();
        let entity = track("a", 17);
        seed(&store, &entity).await;

        pin(&store, "p1", &entity.reference).await.unwrap();
        let once = store
            .get(&paths::track_order("p1", &entity.reference.key()))
            .await
            .unwrap();

        pin(&store, "p1", &entity.reference).await.unwrap();
        let twice = store
            .get(&paths::track_order("p1", &entity.reference.key()))
            .await
            .unwrap();

        assert_eq!(once, json!(PINNED_ORDER));
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn remove_with_history_cleans_indices_and_archives() {
        let store = MemoryStore::new();
        let entity = track("a", 5);
        let other = track("b", 6);
        seed(&store, &entity).await;
        seed(&store, &other).await;

        remove(&store, "p1", &entity, true).await.unwrap();

        let key = entity.reference.key();
        assert_eq!(
            store.get(&paths::track("p1", &key)).await.unwrap(),
            Value::Null
        );
        assert_eq!(
            store.get(&paths::votes_by_track("p1", &key)).await.unwrap(),
            Value::Null
        );
        // The by-user transaction dropped this track for every voter but
        // left votes on other tracks alone.
        let by_user = store.get(&paths::votes_by_user("p1")).await.unwrap();
        assert_eq!(
            by_user,
            json!({
                "u1": { "spotify-b": true },
                "u2": { "spotify-b": false },
            })
        );

        let history = store.get(&paths::history("p1")).await.unwrap();
        let entries: Vec<&Value> = history.as_object().unwrap().values().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(*entries[0], serde_json::to_value(&entity).unwrap());
    }

    #[tokio::test]
    async fn remove_without_history_leaves_no_archive() {
        let store = MemoryStore::new();
        let entity = track("a", 5);
        seed(&store, &entity).await;

        remove(&store, "p1", &entity, false).await.unwrap();

        assert_eq!(
            store.get(&paths::history("p1")).await.unwrap(),
            Value::Null
        );
    }

    #[tokio::test]
    async fn mark_played_assigns_a_server_timestamp() {
        let store = MemoryStore::new();
        let entity = track("a", 5);
        seed(&store, &entity).await;

        mark_played(&store, "p1", &entity.reference).await.unwrap();

        let stamped = store
            .get(&paths::track_played_at("p1", &entity.reference.key()))
            .await
            .unwrap();
        assert!(stamped.as_i64().unwrap() > 1_500_000_000_000);
    }

    #[test]
    fn strip_track_votes_keeps_unrelated_entries() {
        let stripped = strip_track_votes(
            json!({
                "u1": { "t1": true, "t2": false },
                "u2": { "t1": false },
            }),
            "t1",
        );
        assert_eq!(
            stripped,
            json!({
                "u1": { "t2": false },
                "u2": {},
            })
        );
    }
}
