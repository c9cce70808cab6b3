//! Fan-out of UI-originated intents to their handlers.
//!
//! Every intent is handled in its own task so a slow store write never blocks
//! the intake of later intents; handler failures surface as toasts, never as
//! loop termination.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;
use validator::Validate;

use crate::{
    auth::AuthProvider,
    dao::store::SharedStore,
    dto::{
        events::PartyEvent,
        requests::{PartyCommand, RemoveTrackRequest, SetVoteRequest},
    },
    error::ServiceError,
    services::{queue_service, session_service, vote_service},
    state::{PartyView, SharedView},
};

/// Consume intents until the channel closes, spawning one handler per intent.
pub async fn run(
    view: SharedView,
    store: Arc<dyn SharedStore>,
    auth: Arc<dyn AuthProvider>,
    mut commands: mpsc::Receiver<PartyCommand>,
) {
    while let Some(command) = commands.recv().await {
        let view = Arc::clone(&view);
        let store = Arc::clone(&store);
        let auth = Arc::clone(&auth);
        tokio::spawn(async move {
            handle(view, store, auth, command).await;
        });
    }
}

/// Route one intent, converting failures into user-visible toasts.
async fn handle(
    view: SharedView,
    store: Arc<dyn SharedStore>,
    auth: Arc<dyn AuthProvider>,
    command: PartyCommand,
) {
    match command {
        PartyCommand::SetVote(request) => {
            if let Err(err) = set_vote(&view, store.as_ref(), auth.as_ref(), &request).await {
                toast(&view, format!("Failed to toggle vote: {err}"));
            }
        }
        PartyCommand::RemoveTrack(request) => {
            if let Err(err) = remove_track(&view, store.as_ref(), &request).await {
                toast(&view, format!("Failed to remove track: {err}"));
            }
        }
        PartyCommand::LinkProvider(request) => match request.validate() {
            Ok(()) => session_service::link_provider(&view, auth.as_ref(), &request).await,
            Err(err) => warn!(error = %err, "ignoring invalid link request"),
        },
    }
}

async fn set_vote(
    view: &PartyView,
    store: &dyn SharedStore,
    auth: &dyn AuthProvider,
    request: &SetVoteRequest,
) -> Result<(), ServiceError> {
    request.validate()?;
    vote_service::set_vote(view, store, auth, request).await?;
    Ok(())
}

async fn remove_track(
    view: &PartyView,
    store: &dyn SharedStore,
    request: &RemoveTrackRequest,
) -> Result<(), ServiceError> {
    request.validate()?;
    let track_key = request.reference.key();
    let queue = view.queue().await;
    let track = queue
        .get(&track_key)
        .cloned()
        .ok_or(ServiceError::UnknownTrack(track_key))?;
    queue_service::remove(store, view.party_id(), &track, request.move_to_history).await
}

fn toast(view: &PartyView, message: String) {
    view.events().broadcast(PartyEvent::ToastRequested { message });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::testing::StubAuth,
        dao::{
            models::TrackReference,
            store::{memory::MemoryStore, paths},
        },
        state::Queue,
    };
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::timeout;

    fn reference(id: &str) -> TrackReference {
        TrackReference {
            provider: "spotify".into(),
            id: id.into(),
        }
    }

    async fn spawn_dispatcher(
        view: SharedView,
        store: Arc<MemoryStore>,
    ) -> mpsc::Sender<PartyCommand> {
        let (tx, rx) = mpsc::channel(8);
        let auth = Arc::new(StubAuth::anonymous());
        tokio::spawn(run(
            view,
            store as Arc<dyn SharedStore>,
            auth as Arc<dyn AuthProvider>,
            rx,
        ));
        tx
    }

    #[tokio::test]
    async fn votes_flow_through_to_both_indices() {
        let view = PartyView::new("p1", 16);
        let store = Arc::new(MemoryStore::new());
        let commands = spawn_dispatcher(view.clone(), store.clone()).await;

        commands
            .send(PartyCommand::SetVote(SetVoteRequest {
                reference: reference("a"),
                vote: true,
            }))
            .await
            .unwrap();

        timeout(Duration::from_secs(1), async {
            loop {
                let by_track = store.get(&paths::vote("p1", "spotify-a", "guest-1")).await;
                if by_track.unwrap() == json!(true) {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(
            store
                .get(&paths::user_vote("p1", "guest-1", "spotify-a"))
                .await
                .unwrap(),
            json!(true)
        );
    }

    #[tokio::test]
    async fn removing_an_unknown_track_surfaces_a_toast() {
        let view = PartyView::new("p1", 16);
        view.set_queue(Queue::default()).await;
        let store = Arc::new(MemoryStore::new());
        let mut events = view.events().subscribe();
        let commands = spawn_dispatcher(view.clone(), store).await;

        commands
            .send(PartyCommand::RemoveTrack(RemoveTrackRequest {
                reference: reference("ghost"),
                move_to_history: true,
            }))
            .await
            .unwrap();

        let event = timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        match event {
            PartyEvent::ToastRequested { message } => {
                assert!(message.starts_with("Failed to remove track:"), "{message}");
            }
            other => panic!("expected a toast, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_requests_never_reach_the_store() {
        let view = PartyView::new("p1", 16);
        let store = Arc::new(MemoryStore::new());
        let mut events = view.events().subscribe();
        let commands = spawn_dispatcher(view.clone(), store.clone()).await;

        commands
            .send(PartyCommand::SetVote(SetVoteRequest {
                reference: TrackReference {
                    provider: "".into(),
                    id: "".into(),
                },
                vote: true,
            }))
            .await
            .unwrap();

        let event = timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        match event {
            PartyEvent::ToastRequested { message } => {
                assert!(message.starts_with("Failed to toggle vote:"), "{message}");
            }
            other => panic!("expected a toast, got {other:?}"),
        }
        assert_eq!(store.get("").await.unwrap(), serde_json::Value::Null);
    }
}
