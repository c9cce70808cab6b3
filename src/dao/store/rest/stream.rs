//! SSE change-stream plumbing for the REST store.
//!
//! The hosted store speaks the event-stream protocol: `put` frames replace a
//! subtree, `patch` frames merge children into one. A local shadow tree is
//! kept so watchers receive whole-subtree snapshots, matching the trait
//! contract.

use async_stream::stream;
use futures::{StreamExt, stream::BoxStream};
use reqwest::{Client, header};
use serde::Deserialize;
use serde_json::Value;

use super::error::RestDaoError;
use crate::dao::{
    storage::{StoreError, StoreResult},
    store::tree,
};

/// One server-sent frame, after `event:`/`data:` reassembly.
#[derive(Debug, PartialEq)]
pub(super) enum StreamEvent {
    /// Replace the subtree at `path` with `data`.
    Put { path: String, data: Value },
    /// Merge the children in `data` into the subtree at `path`.
    Patch { path: String, data: Value },
    /// Connection heartbeat.
    KeepAlive,
    /// Server revoked the stream; the watcher must resubscribe.
    Cancel,
}

#[derive(Deserialize)]
struct EventPayload {
    path: String,
    data: Value,
}

/// Parse one reassembled frame into a [`StreamEvent`].
pub(super) fn parse_event(name: &str, data: &str) -> Option<StreamEvent> {
    match name {
        "put" => serde_json::from_str::<EventPayload>(data)
            .ok()
            .map(|payload| StreamEvent::Put {
                path: payload.path,
                data: payload.data,
            }),
        "patch" => serde_json::from_str::<EventPayload>(data)
            .ok()
            .map(|payload| StreamEvent::Patch {
                path: payload.path,
                data: payload.data,
            }),
        "keep-alive" => Some(StreamEvent::KeepAlive),
        "cancel" | "auth_revoked" => Some(StreamEvent::Cancel),
        _ => None,
    }
}

/// Apply a `put`/`patch` frame to the local shadow tree.
pub(super) fn apply_event(shadow: &mut Value, event: &StreamEvent) {
    match event {
        StreamEvent::Put { path, data } => tree::write_subtree(shadow, path, data.clone()),
        StreamEvent::Patch { path, data } => {
            if let Value::Object(children) = data {
                for (key, child) in children {
                    let child_path = format!("{}/{key}", path.trim_end_matches('/'));
                    tree::write_subtree(shadow, &child_path, child.clone());
                }
            }
        }
        StreamEvent::KeepAlive | StreamEvent::Cancel => {}
    }
}

/// Reassemble `\n`-terminated lines out of raw transport chunks.
#[derive(Default)]
pub(super) struct LineBuffer {
    partial: String,
}

impl LineBuffer {
    /// Feed a chunk, returning every line it completed.
    pub(super) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.partial.push_str(&String::from_utf8_lossy(chunk));
        let mut lines = Vec::new();
        while let Some(index) = self.partial.find('\n') {
            let line = self.partial[..index].trim_end_matches('\r').to_string();
            self.partial.drain(..=index);
            lines.push(line);
        }
        lines
    }
}

/// Open the change stream for `url` and adapt it to subtree snapshots.
pub(super) fn watch_stream(
    client: Client,
    url: String,
    path: String,
) -> BoxStream<'static, StoreResult<Value>> {
    Box::pin(stream! {
        let response = match client
            .get(&url)
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                yield Err(StoreError::from(RestDaoError::RequestStatus {
                    path,
                    status: response.status(),
                }));
                return;
            }
            Err(source) => {
                yield Err(StoreError::from(RestDaoError::RequestSend { path, source }));
                return;
            }
        };

        let mut shadow = Value::Null;
        let mut buffer = LineBuffer::default();
        let mut pending_event: Option<String> = None;
        let mut chunks = response.bytes_stream();

        while let Some(chunk) = chunks.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(source) => {
                    yield Err(StoreError::from(RestDaoError::RequestSend {
                        path: path.clone(),
                        source,
                    }));
                    return;
                }
            };

            for line in buffer.push(&chunk) {
                if let Some(name) = line.strip_prefix("event:") {
                    pending_event = Some(name.trim().to_string());
                    continue;
                }
                let Some(data) = line.strip_prefix("data:") else {
                    continue;
                };
                let Some(name) = pending_event.take() else {
                    continue;
                };
                match parse_event(&name, data.trim()) {
                    Some(StreamEvent::KeepAlive) | None => {}
                    Some(StreamEvent::Cancel) => {
                        yield Err(StoreError::from(RestDaoError::Stream {
                            path: path.clone(),
                            message: "stream revoked by server".into(),
                        }));
                        return;
                    }
                    Some(event) => {
                        apply_event(&mut shadow, &event);
                        yield Ok(shadow.clone());
                    }
                }
            }
        }

        yield Err(StoreError::from(RestDaoError::Stream {
            path,
            message: "stream ended".into(),
        }));
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_put_patch_and_control_frames() {
        let put = parse_event("put", r#"{"path":"/","data":{"a":1}}"#).unwrap();
        assert_eq!(
            put,
            StreamEvent::Put {
                path: "/".into(),
                data: json!({ "a": 1 })
            }
        );

        let patch = parse_event("patch", r#"{"path":"/t1","data":{"order":2}}"#).unwrap();
        assert_eq!(
            patch,
            StreamEvent::Patch {
                path: "/t1".into(),
                data: json!({ "order": 2 })
            }
        );

        assert_eq!(parse_event("keep-alive", "null"), Some(StreamEvent::KeepAlive));
        assert_eq!(parse_event("cancel", "null"), Some(StreamEvent::Cancel));
        assert_eq!(parse_event("mystery", "null"), None);
    }

    #[test]
    fn shadow_tree_follows_put_then_patch() {
        let mut shadow = Value::Null;

        apply_event(
            &mut shadow,
            &StreamEvent::Put {
                path: "/".into(),
                data: json!({ "t1": { "order": 1 }, "t2": { "order": 2 } }),
            },
        );
        apply_event(
            &mut shadow,
            &StreamEvent::Patch {
                path: "/t1".into(),
                data: json!({ "order": 9, "played_at": 1000 }),
            },
        );
        apply_event(
            &mut shadow,
            &StreamEvent::Put {
                path: "/t2".into(),
                data: Value::Null,
            },
        );

        assert_eq!(shadow, json!({ "t1": { "order": 9, "played_at": 1000 } }));
    }

    #[test]
    fn line_buffer_survives_split_frames() {
        let mut buffer = LineBuffer::default();
        assert!(buffer.push(b"event: pu").is_empty());
        let lines = buffer.push(b"t\r\ndata: {}\n");
        assert_eq!(lines, vec!["event: put".to_string(), "data: {}".to_string()]);
    }
}
