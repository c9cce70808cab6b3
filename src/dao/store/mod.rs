//! Hierarchical shared store abstraction.
//!
//! The store is an external key-value service addressed by `/`-separated
//! paths. `set` is last-write-wins, `transaction` is the only read-modify-write
//! primitive, and `watch` delivers subtree snapshots on every overlapping
//! mutation. The coordination core never assumes stronger isolation than that.

#[cfg(feature = "memory-store")]
pub mod memory;
#[cfg(feature = "rest-store")]
pub mod rest;
#[cfg(any(feature = "memory-store", feature = "rest-store"))]
pub(crate) mod tree;

use futures::{future::BoxFuture, stream::BoxStream};
use rand::Rng;
use serde_json::{Value, json};

use crate::dao::storage::StoreResult;

/// Pure subtree rewrite applied inside [`SharedStore::transaction`].
///
/// The updater may run more than once when the backend retries a lost
/// compare-and-set race, so it must not carry side effects.
pub type TransactionUpdater = Box<dyn Fn(Value) -> Value + Send + Sync>;

/// Abstraction over the shared hierarchical store.
pub trait SharedStore: Send + Sync {
    /// Read the current value of the subtree at `path` (`Null` when absent).
    fn get(&self, path: &str) -> BoxFuture<'static, StoreResult<Value>>;

    /// Overwrite the subtree at `path`; writing `Null` deletes it.
    fn set(&self, path: &str, value: Value) -> BoxFuture<'static, StoreResult<()>>;

    /// Append `value` under a generated, chronologically sortable key and
    /// return that key.
    fn push(&self, path: &str, value: Value) -> BoxFuture<'static, StoreResult<String>>;

    /// Atomically rewrite the subtree at `path` through `updater`.
    fn transaction(
        &self,
        path: &str,
        updater: TransactionUpdater,
    ) -> BoxFuture<'static, StoreResult<()>>;

    /// Subscribe to the subtree at `path`.
    ///
    /// The stream yields the current value immediately, then a fresh snapshot
    /// after every overlapping mutation.
    fn watch(&self, path: &str) -> BoxStream<'static, StoreResult<Value>>;

    /// Delete the subtree at `path`, expressed as a null write.
    fn delete(&self, path: &str) -> BoxFuture<'static, StoreResult<()>> {
        self.set(path, Value::Null)
    }
}

/// Sentinel resolved by the backends to the server clock at write time.
pub fn server_timestamp() -> Value {
    json!({ ".sv": "timestamp" })
}

/// Whether `value` is the [`server_timestamp`] sentinel.
pub(crate) fn is_server_timestamp(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|map| map.len() == 1 && map.get(".sv").and_then(Value::as_str) == Some("timestamp"))
}

/// Store path builders for the collections used by the coordination core.
pub mod paths {
    /// Active queue subtree for a party.
    pub fn tracks(party: &str) -> String {
        format!("tracks/{party}")
    }

    /// A single queue entry.
    pub fn track(party: &str, track_key: &str) -> String {
        format!("tracks/{party}/{track_key}")
    }

    /// The `order` field of a queue entry.
    pub fn track_order(party: &str, track_key: &str) -> String {
        format!("tracks/{party}/{track_key}/order")
    }

    /// The `played_at` field of a queue entry.
    pub fn track_played_at(party: &str, track_key: &str) -> String {
        format!("tracks/{party}/{track_key}/played_at")
    }

    /// By-track vote index subtree for one track.
    pub fn votes_by_track(party: &str, track_key: &str) -> String {
        format!("votes/{party}/{track_key}")
    }

    /// One user's vote in the by-track index.
    pub fn vote(party: &str, track_key: &str, uid: &str) -> String {
        format!("votes/{party}/{track_key}/{uid}")
    }

    /// By-user vote index for the whole party.
    pub fn votes_by_user(party: &str) -> String {
        format!("votes_by_user/{party}")
    }

    /// One user's vote in the by-user index.
    pub fn user_vote(party: &str, uid: &str, track_key: &str) -> String {
        format!("votes_by_user/{party}/{uid}/{track_key}")
    }

    /// Play-history log for a party.
    pub fn history(party: &str) -> String {
        format!("tracks_played/{party}")
    }

    /// Party metadata subtree.
    pub fn party(party: &str) -> String {
        format!("parties/{party}")
    }
}

/// Alphabet for generated push keys; ASCII-ordered so keys sort by time.
const PUSH_ALPHABET: &[u8; 64] =
    b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

/// Generate a push key: 8 chars of millisecond timestamp, 12 random chars.
pub(crate) fn generate_push_id(now_ms: i64) -> String {
    let mut id = String::with_capacity(20);
    let mut stamp = [0u8; 8];
    let mut remaining = now_ms;
    for slot in stamp.iter_mut().rev() {
        *slot = PUSH_ALPHABET[(remaining % 64) as usize];
        remaining /= 64;
    }
    id.extend(stamp.iter().map(|byte| *byte as char));

    let mut rng = rand::rng();
    for _ in 0..12 {
        id.push(PUSH_ALPHABET[rng.random_range(0..64)] as char);
    }
    id
}
