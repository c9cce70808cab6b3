use indexmap::IndexMap;
use serde_json::Value;

use crate::dao::models::TrackEntity;

/// Materialized view of `/tracks/<party>`, in store key order.
#[derive(Debug, Clone, Default)]
pub struct Queue {
    entries: IndexMap<String, TrackEntity>,
}

impl Queue {
    /// Parse a queue snapshot from the raw store value.
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        if value.is_null() {
            return Ok(Self::default());
        }
        let entries = serde_json::from_value(value.clone())?;
        Ok(Self { entries })
    }

    /// Entry for `track_key`, when present.
    pub fn get(&self, track_key: &str) -> Option<&TrackEntity> {
        self.entries.get(track_key)
    }

    /// Number of entries, played ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest-priority unplayed track: minimum `order`, ties broken by store
    /// key order (chronological for generated keys).
    pub fn top_track(&self) -> Option<&TrackEntity> {
        self.entries
            .values()
            .enumerate()
            .filter(|(_, entry)| entry.is_unplayed())
            .min_by_key(|(index, entry)| (entry.order, *index))
            .map(|(_, entry)| entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::TrackReference;
    use serde_json::json;

    fn entry(id: &str, order: i64, played_at: Option<i64>) -> Value {
        json!({
            "reference": { "provider": "spotify", "id": id },
            "order": order,
            "added_at": 1_600_000_000_000i64,
            "played_at": played_at,
        })
    }

    #[test]
    fn null_snapshot_is_an_empty_queue() {
        let queue = Queue::from_value(&Value::Null).unwrap();
        assert!(queue.is_empty());
        assert!(queue.top_track().is_none());
    }

    #[test]
    fn top_track_has_the_lowest_order() {
        let queue = Queue::from_value(&json!({
            "spotify-a": entry("a", 10, None),
            "spotify-b": entry("b", 3, None),
            "spotify-c": entry("c", 7, None),
        }))
        .unwrap();

        let top = queue.top_track().unwrap();
        assert_eq!(
            top.reference,
            TrackReference {
                provider: "spotify".into(),
                id: "b".into()
            }
        );
    }

    #[test]
    fn played_tracks_are_not_candidates() {
        let queue = Queue::from_value(&json!({
            "spotify-a": entry("a", 1, Some(1_600_000_100_000)),
            "spotify-b": entry("b", 5, None),
        }))
        .unwrap();

        assert_eq!(queue.top_track().unwrap().reference.id, "b");
    }

    #[test]
    fn order_ties_break_by_key_order() {
        let queue = Queue::from_value(&json!({
            "spotify-a": entry("a", 4, None),
            "spotify-b": entry("b", 4, None),
        }))
        .unwrap();

        // Store keys arrive sorted, so `spotify-a` was queued first.
        assert_eq!(queue.top_track().unwrap().reference.id, "a");
        assert_eq!(queue.len(), 2);
    }
}
