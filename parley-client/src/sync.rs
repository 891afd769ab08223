//! Keeps the conversation store in step with the signed-in identity.

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::auth::AuthSession;
use crate::store::ConversationStore;

/// Handle to a running identity sync task.
///
/// The task holds a store, and the store holds the auth session, so the
/// identity feed never closes on its own. Dropping this handle is what stops
/// the task.
#[derive(Debug)]
#[must_use = "dropping the handle stops the sync task"]
pub struct IdentitySync {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl IdentitySync {
    /// Stop the task and wait until it has exited.
    pub async fn stop(self) {
        let IdentitySync { shutdown, task } = self;
        drop(shutdown);
        if let Err(e) = task.await {
            if e.is_panic() {
                tracing::error!(error = %e, "Identity sync task panicked");
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawn a task that follows identity changes.
///
/// Signing in loads that user's conversation list; signing out resets the
/// store. The task runs until the returned handle is dropped or stopped.
pub fn spawn_identity_sync(store: ConversationStore, auth: Arc<AuthSession>) -> IdentitySync {
    let mut identities = auth.subscribe();
    drop(auth);
    let (shutdown, mut stopped) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let mut current = identities.current().map(|identity| identity.user_id);
        if current.is_some() {
            refresh(&store).await;
        }

        loop {
            let identity = tokio::select! {
                _ = &mut stopped => break,
                identity = identities.changed() => match identity {
                    Some(identity) => identity,
                    None => break,
                },
            };
            let next = identity.map(|identity| identity.user_id);
            if next == current {
                continue;
            }

            match &next {
                Some(user_id) => {
                    tracing::debug!(user_id = %user_id, "Identity changed; loading conversations");
                    if current.is_some() {
                        store.reset();
                    }
                    refresh(&store).await;
                }
                None => {
                    tracing::debug!("Signed out; clearing conversation state");
                    store.reset();
                }
            }
            current = next;
        }
        tracing::debug!("Identity sync stopped");
    });

    IdentitySync { shutdown, task }
}

async fn refresh(store: &ConversationStore) {
    if let Err(e) = store.load_conversations().await {
        tracing::warn!(error = %e, "Conversation list refresh failed");
    }
}
