//! In-process tree implementation of [`SharedStore`], used by the crate's
//! tests and by single-process embedders.

use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use futures::{FutureExt, future::BoxFuture, stream::BoxStream};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;

use crate::dao::{
    storage::StoreResult,
    store::{
        SharedStore, TransactionUpdater, generate_push_id, is_server_timestamp,
        tree::{segments, subtree, write_subtree},
    },
};

/// In-memory [`SharedStore`] backed by a single JSON tree.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    root: Mutex<Value>,
    watchers: DashMap<Uuid, Watcher>,
    // Last millisecond handed to a push key; keeps keys strictly ordered
    // even when pushes land within the same clock tick.
    push_clock: Mutex<i64>,
}

struct Watcher {
    path: String,
    tx: mpsc::UnboundedSender<StoreResult<Value>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn apply(&self, path: &str, value: Value) {
        let mut value = value;
        resolve_server_timestamps(&mut value, now_ms());
        let value = sanitize(value);
        {
            let mut root = self.inner.root.lock().unwrap();
            write_subtree(&mut root, path, value);
        }
        self.notify(path);
    }

    fn notify(&self, changed: &str) {
        let mut dead = Vec::new();
        for entry in self.inner.watchers.iter() {
            if !overlaps(&entry.path, changed) {
                continue;
            }
            let snapshot = {
                let root = self.inner.root.lock().unwrap();
                subtree(&root, &entry.path)
            };
            if entry.tx.send(Ok(snapshot)).is_err() {
                dead.push(*entry.key());
            }
        }
        for id in dead {
            self.inner.watchers.remove(&id);
        }
    }

    fn next_push_ms(&self) -> i64 {
        let mut clock = self.inner.push_clock.lock().unwrap();
        let ms = now_ms().max(*clock + 1);
        *clock = ms;
        ms
    }
}

impl SharedStore for MemoryStore {
    fn get(&self, path: &str) -> BoxFuture<'static, StoreResult<Value>> {
        let snapshot = {
            let root = self.inner.root.lock().unwrap();
            subtree(&root, path)
        };
        async move { Ok(snapshot) }.boxed()
    }

    fn set(&self, path: &str, value: Value) -> BoxFuture<'static, StoreResult<()>> {
        self.apply(path, value);
        async move { Ok(()) }.boxed()
    }

    fn push(&self, path: &str, value: Value) -> BoxFuture<'static, StoreResult<String>> {
        let key = generate_push_id(self.next_push_ms());
        let child = format!("{}/{key}", path.trim_end_matches('/'));
        self.apply(&child, value);
        async move { Ok(key) }.boxed()
    }

    fn transaction(
        &self,
        path: &str,
        updater: TransactionUpdater,
    ) -> BoxFuture<'static, StoreResult<()>> {
        {
            let mut root = self.inner.root.lock().unwrap();
            let current = subtree(&root, path);
            let mut next = updater(current);
            resolve_server_timestamps(&mut next, now_ms());
            write_subtree(&mut root, path, sanitize(next));
        }
        self.notify(path);
        async move { Ok(()) }.boxed()
    }

    fn watch(&self, path: &str) -> BoxStream<'static, StoreResult<Value>> {
        let (tx, rx) = mpsc::unbounded_channel();
        // Register before snapshotting so no mutation can fall between the
        // initial snapshot and the first notification.
        self.inner.watchers.insert(
            Uuid::new_v4(),
            Watcher {
                path: path.to_string(),
                tx: tx.clone(),
            },
        );
        let snapshot = {
            let root = self.inner.root.lock().unwrap();
            subtree(&root, path)
        };
        let _ = tx.send(Ok(snapshot));
        Box::pin(UnboundedReceiverStream::new(rx))
    }
}

fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Drop nulls and collapse emptied maps before they land in the tree.
fn sanitize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut cleaned = Map::new();
            for (key, child) in map {
                let child = sanitize(child);
                if !child.is_null() {
                    cleaned.insert(key, child);
                }
            }
            if cleaned.is_empty() {
                Value::Null
            } else {
                Value::Object(cleaned)
            }
        }
        other => other,
    }
}

/// Replace every server-timestamp sentinel in `value` with `now_ms`.
fn resolve_server_timestamps(value: &mut Value, now_ms: i64) {
    if is_server_timestamp(value) {
        *value = Value::from(now_ms);
        return;
    }
    if let Value::Object(map) = value {
        for child in map.values_mut() {
            resolve_server_timestamps(child, now_ms);
        }
    }
}

/// Whether a mutation at `changed` is visible to a watcher of `watched`.
fn overlaps(watched: &str, changed: &str) -> bool {
    let mut lhs = segments(watched);
    let mut rhs = segments(changed);
    loop {
        match (lhs.next(), rhs.next()) {
            (Some(a), Some(b)) if a == b => continue,
            (Some(_), Some(_)) => return false,
            _ => return true,
        }
    }
}
