//! Conversation store.
//!
//! [`ConversationStore`] owns the message list, the known conversations, the
//! active conversation id and the busy flag. Callers never mutate that state
//! directly; they invoke operations and observe snapshots via [`subscribe`].
//!
//! Mutating round-trips (send, load, delete) are serialized by the busy flag.
//! Results that arrive after the active conversation changed underneath them
//! are dropped instead of being applied to the wrong conversation.
//!
//! [`subscribe`]: ConversationStore::subscribe

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::watch;

use crate::auth::AuthSession;
use crate::backend::ChatBackend;
use crate::error::{AuthError, StoreError};
use crate::observe::Subscription;
use crate::types::{Conversation, Message, SessionToken};

/// Snapshot of the store, as published to observers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationState {
    /// Messages of the active conversation, in local append order
    pub messages: Vec<Message>,
    /// Known conversations, in server order, unique by id
    pub conversations: Vec<Conversation>,
    /// `None` means a new, not yet persisted conversation
    pub active_conversation_id: Option<String>,
    /// A mutating round-trip is in flight
    pub busy: bool,
    /// Bumped whenever the active conversation is replaced.
    epoch: u64,
    /// Bumped per list fetch and whenever the list changes locally.
    list_generation: u64,
}

impl ConversationState {
    pub fn active_conversation(&self) -> Option<&Conversation> {
        let id = self.active_conversation_id.as_deref()?;
        self.conversations.iter().find(|c| c.id == id)
    }

    fn start_new_conversation(&mut self) {
        self.messages.clear();
        self.active_conversation_id = None;
        self.epoch += 1;
    }
}

/// What became of a `send_message` call that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank input; nothing was sent.
    Ignored,
    /// The assistant reply was appended to the active conversation.
    Applied(Message),
    /// The active conversation changed while the request was in flight; the
    /// reply was not appended.
    Stale(Message),
}

impl SendOutcome {
    pub fn reply(&self) -> Option<&Message> {
        match self {
            SendOutcome::Ignored => None,
            SendOutcome::Applied(message) | SendOutcome::Stale(message) => Some(message),
        }
    }
}

/// Clears the busy flag when dropped, including when the owning future is
/// cancelled mid-request.
struct BusyGuard<'a> {
    state: &'a watch::Sender<ConversationState>,
    released: bool,
}

impl BusyGuard<'_> {
    /// Clear the flag and apply `update` in the same notification.
    fn finish(mut self, update: impl FnOnce(&mut ConversationState)) {
        self.released = true;
        self.state.send_modify(|state| {
            state.busy = false;
            update(state);
        });
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            self.state.send_modify(|state| state.busy = false);
        }
    }
}

/// Cheaply cloneable handle to the shared conversation state.
#[derive(Clone)]
pub struct ConversationStore {
    auth: Arc<AuthSession>,
    backend: Arc<dyn ChatBackend>,
    state: Arc<watch::Sender<ConversationState>>,
}

impl ConversationStore {
    pub fn new(auth: Arc<AuthSession>, backend: Arc<dyn ChatBackend>) -> Self {
        let (state, _) = watch::channel(ConversationState::default());
        Self {
            auth,
            backend,
            state: Arc::new(state),
        }
    }

    /// Current snapshot.
    pub fn state(&self) -> ConversationState {
        self.state.borrow().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.state.borrow().busy
    }

    /// Observe state changes. Dropping the subscription unsubscribes.
    pub fn subscribe(&self) -> Subscription<ConversationState> {
        Subscription::new(self.state.subscribe())
    }

    /// Atomically take the busy flag and run `begin` on the state.
    fn try_begin<T>(
        &self,
        begin: impl FnOnce(&mut ConversationState) -> T,
    ) -> Result<(BusyGuard<'_>, T), StoreError> {
        let mut started = None;
        self.state.send_if_modified(|state| {
            if state.busy {
                return false;
            }
            state.busy = true;
            started = Some(begin(state));
            true
        });

        let value = started.ok_or(StoreError::Busy)?;
        Ok((
            BusyGuard {
                state: &self.state,
                released: false,
            },
            value,
        ))
    }

    async fn token(&self) -> Option<SessionToken> {
        self.auth.get_token().await
    }

    /// Send a user message in the active conversation.
    ///
    /// The user message is appended before the request goes out and stays in
    /// place if the request fails, so the caller can offer a retry.
    pub async fn send_message(&self, content: &str) -> Result<SendOutcome, StoreError> {
        if content.trim().is_empty() {
            return Ok(SendOutcome::Ignored);
        }
        if self.is_busy() {
            return Err(StoreError::Busy);
        }

        let token = self
            .token()
            .await
            .ok_or(StoreError::Auth(AuthError::NotSignedIn))?;

        let user_message = Message::user(content);
        let (guard, (conversation_id, epoch)) = self.try_begin(|state| {
            state.messages.push(user_message);
            (state.active_conversation_id.clone(), state.epoch)
        })?;

        tracing::debug!(
            conversation_id = conversation_id.as_deref().unwrap_or("<new>"),
            "Sending message"
        );

        let reply = match self
            .backend
            .send_message(&token, content, conversation_id.as_deref())
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "Send failed");
                drop(guard);
                return Err(e.into());
            }
        };

        let assistant = Message::assistant(reply.message_id, reply.content);
        let mut applied = false;
        guard.finish(|state| {
            if state.epoch != epoch {
                return;
            }
            state.messages.push(assistant.clone());
            if state.active_conversation_id.is_none() {
                state.active_conversation_id = Some(reply.conversation_id.clone());
            }
            applied = true;
        });

        if applied {
            Ok(SendOutcome::Applied(assistant))
        } else {
            tracing::debug!(
                conversation_id = %reply.conversation_id,
                "Active conversation changed during send; reply dropped"
            );
            Ok(SendOutcome::Stale(assistant))
        }
    }

    /// Refresh the conversation list. Failures are logged only.
    pub async fn load_conversations(&self) -> Result<(), StoreError> {
        let Some(token) = self.token().await else {
            tracing::debug!("Not signed in; skipping conversation list");
            return Ok(());
        };

        let mut generation = 0;
        self.state.send_if_modified(|state| {
            state.list_generation += 1;
            generation = state.list_generation;
            false
        });

        let conversations = match self.backend.list_conversations(&token).await {
            Ok(conversations) => dedup_by_id(conversations),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load conversations");
                return Ok(());
            }
        };

        let count = conversations.len();
        let applied = self.state.send_if_modified(|state| {
            if state.list_generation != generation {
                return false;
            }
            state.conversations = conversations;
            true
        });

        if applied {
            tracing::debug!(count, "Conversation list loaded");
        } else {
            tracing::debug!("Conversation list superseded; result dropped");
        }
        Ok(())
    }

    /// Make `id` the active conversation, replacing the message list with its
    /// history. Failures are logged only; `Busy` is the only error surfaced.
    pub async fn load_conversation(&self, id: &str) -> Result<(), StoreError> {
        let Some(token) = self.token().await else {
            tracing::debug!(conversation_id = id, "Not signed in; skipping load");
            return Ok(());
        };

        let (guard, epoch) = self.try_begin(|state| state.epoch)?;

        match self.backend.fetch_messages(&token, id).await {
            Ok(messages) => {
                let count = messages.len();
                guard.finish(|state| {
                    if state.epoch != epoch {
                        tracing::debug!(conversation_id = id, "Load superseded; result dropped");
                        return;
                    }
                    state.messages = messages;
                    state.active_conversation_id = Some(id.to_string());
                    state.epoch += 1;
                    tracing::debug!(conversation_id = id, count, "Conversation loaded");
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, conversation_id = id, "Failed to load conversation");
            }
        }
        Ok(())
    }

    /// Start a fresh, unsaved conversation. Always succeeds.
    ///
    /// A send or load still in flight keeps the busy flag until it returns,
    /// and its result is not applied here.
    pub fn create_new_conversation(&self) {
        self.state.send_modify(ConversationState::start_new_conversation);
    }

    /// Delete a conversation on the backend, then locally.
    ///
    /// Deleting the active conversation leaves the store as
    /// `create_new_conversation` would. Failures are logged and leave the
    /// state unchanged; `Busy` is the only error surfaced.
    pub async fn delete_conversation(&self, id: &str) -> Result<(), StoreError> {
        let Some(token) = self.token().await else {
            tracing::debug!(conversation_id = id, "Not signed in; skipping delete");
            return Ok(());
        };

        let (guard, ()) = self.try_begin(|_| ())?;

        match self.backend.delete_conversation(&token, id).await {
            Ok(()) => {
                guard.finish(|state| {
                    state.conversations.retain(|c| c.id != id);
                    state.list_generation += 1;
                    if state.active_conversation_id.as_deref() == Some(id) {
                        state.start_new_conversation();
                    }
                });
                tracing::info!(conversation_id = id, "Conversation deleted");
            }
            Err(e) => {
                tracing::warn!(error = %e, conversation_id = id, "Failed to delete conversation");
            }
        }
        Ok(())
    }

    /// Forget everything, including the conversation list. Used on sign-out.
    pub fn reset(&self) {
        self.state.send_modify(|state| {
            state.start_new_conversation();
            state.conversations.clear();
            state.list_generation += 1;
        });
    }
}

/// Keep the first occurrence of each id, preserving order.
fn dedup_by_id(conversations: Vec<Conversation>) -> Vec<Conversation> {
    let mut seen = HashSet::new();
    conversations
        .into_iter()
        .filter(|c| seen.insert(c.id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Identity, StaticTokenProvider};
    use crate::backend::ChatReply;
    use crate::error::NetworkError;
    use crate::types::Role;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// In-memory backend that records calls and can hold one operation open.
    #[derive(Default)]
    struct FakeBackend {
        calls: Mutex<Vec<String>>,
        conversations: Mutex<Vec<Conversation>>,
        histories: Mutex<HashMap<String, Vec<Message>>>,
        failure: Mutex<Option<NetworkError>>,
        hold: Mutex<Option<&'static str>>,
        entered: Notify,
        release: Notify,
        next_id: Mutex<u32>,
    }

    impl FakeBackend {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn fail_with(&self, error: NetworkError) {
            *self.failure.lock().unwrap() = Some(error);
        }

        fn hold(&self, op: &'static str) {
            *self.hold.lock().unwrap() = Some(op);
        }

        async fn enter(&self, op: &'static str, call: String) -> Result<(), NetworkError> {
            self.calls.lock().unwrap().push(call);
            let held = self.hold.lock().unwrap().take_if(|held| *held == op).is_some();
            if held {
                self.entered.notify_one();
                self.release.notified().await;
            }
            match self.failure.lock().unwrap().clone() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl ChatBackend for FakeBackend {
        async fn send_message(
            &self,
            token: &SessionToken,
            content: &str,
            conversation_id: Option<&str>,
        ) -> Result<ChatReply, NetworkError> {
            assert_eq!(token.expose(), "tok");
            self.enter(
                "send",
                format!("send:{}:{content}", conversation_id.unwrap_or("-")),
            )
            .await?;
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            Ok(ChatReply {
                message_id: format!("a{next}"),
                content: format!("echo {content}"),
                conversation_id: conversation_id.unwrap_or("c-new").to_string(),
            })
        }

        async fn list_conversations(
            &self,
            _token: &SessionToken,
        ) -> Result<Vec<Conversation>, NetworkError> {
            self.enter("list", "list".into()).await?;
            Ok(self.conversations.lock().unwrap().clone())
        }

        async fn fetch_messages(
            &self,
            _token: &SessionToken,
            conversation_id: &str,
        ) -> Result<Vec<Message>, NetworkError> {
            self.enter("fetch", format!("fetch:{conversation_id}")).await?;
            Ok(self
                .histories
                .lock()
                .unwrap()
                .get(conversation_id)
                .cloned()
                .unwrap_or_default())
        }

        async fn delete_conversation(
            &self,
            _token: &SessionToken,
            conversation_id: &str,
        ) -> Result<(), NetworkError> {
            self.enter("delete", format!("delete:{conversation_id}")).await
        }
    }

    fn conversation(id: &str) -> Conversation {
        Conversation {
            id: id.to_string(),
            title: format!("title {id}"),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
        }
    }

    fn history(prefix: &str) -> Vec<Message> {
        vec![
            Message {
                id: format!("{prefix}-1"),
                role: Role::User,
                content: "question".into(),
                timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
            },
            Message {
                id: format!("{prefix}-2"),
                role: Role::Assistant,
                content: "answer".into(),
                timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 5).unwrap(),
            },
        ]
    }

    async fn signed_in_store() -> (ConversationStore, Arc<FakeBackend>) {
        let (store, backend, auth) = store_with_auth();
        auth.sign_in().await.unwrap();
        (store, backend)
    }

    fn store_with_auth() -> (ConversationStore, Arc<FakeBackend>, Arc<AuthSession>) {
        let provider = Arc::new(StaticTokenProvider::new(Identity::new("u1"), "tok"));
        let auth = Arc::new(AuthSession::with_settings(
            provider,
            Duration::from_secs(60),
            Duration::from_secs(5),
        ));
        let backend = Arc::new(FakeBackend::default());
        let store = ConversationStore::new(auth.clone(), backend.clone());
        (store, backend, auth)
    }

    fn contents(state: &ConversationState) -> Vec<(Role, String)> {
        state
            .messages
            .iter()
            .map(|m| (m.role, m.content.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_blank_message_is_ignored() {
        let (store, backend) = signed_in_store().await;

        assert_eq!(store.send_message("   \n").await.unwrap(), SendOutcome::Ignored);
        assert_eq!(store.state(), ConversationState::default());
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_send_in_new_conversation_adopts_server_id() {
        let (store, backend) = signed_in_store().await;

        let outcome = store.send_message("Hello").await.unwrap();
        let reply = outcome.reply().unwrap();
        assert!(matches!(outcome, SendOutcome::Applied(_)));
        assert_eq!(reply.content, "echo Hello");

        let state = store.state();
        assert_eq!(
            contents(&state),
            vec![
                (Role::User, "Hello".to_string()),
                (Role::Assistant, "echo Hello".to_string())
            ]
        );
        assert_eq!(state.active_conversation_id.as_deref(), Some("c-new"));
        assert!(!state.busy);
        assert_eq!(backend.calls(), ["send:-:Hello"]);
    }

    #[tokio::test]
    async fn test_send_in_existing_conversation_keeps_id() {
        let (store, backend) = signed_in_store().await;
        backend
            .histories
            .lock()
            .unwrap()
            .insert("c7".into(), history("c7"));
        store.load_conversation("c7").await.unwrap();

        store.send_message("more").await.unwrap();

        let state = store.state();
        assert_eq!(state.messages.len(), 4);
        assert_eq!(state.active_conversation_id.as_deref(), Some("c7"));
        assert_eq!(backend.calls(), ["fetch:c7", "send:c7:more"]);
    }

    #[tokio::test]
    async fn test_send_without_identity_fails_without_mutation() {
        let (store, backend, _auth) = store_with_auth();
        let sub = store.subscribe();

        let err = store.send_message("Hello").await.unwrap_err();
        assert_eq!(err, StoreError::Auth(AuthError::NotSignedIn));
        assert!(err.is_auth());
        assert!(backend.calls().is_empty());
        assert_eq!(store.state(), ConversationState::default());
        assert!(!sub.has_changed());
    }

    #[tokio::test]
    async fn test_send_while_busy_is_rejected() {
        let (store, backend) = signed_in_store().await;
        backend.hold("send");

        let first = tokio::spawn({
            let store = store.clone();
            async move { store.send_message("first").await }
        });
        backend.entered.notified().await;

        let during = store.state();
        assert!(during.busy);
        assert_eq!(during.messages.len(), 1);

        let err = store.send_message("second").await.unwrap_err();
        assert!(err.is_busy());
        assert_eq!(store.state(), during);

        backend.release.notify_one();
        let outcome = first.await.unwrap().unwrap();
        assert!(matches!(outcome, SendOutcome::Applied(_)));

        let state = store.state();
        assert!(!state.busy);
        assert_eq!(
            contents(&state),
            vec![
                (Role::User, "first".to_string()),
                (Role::Assistant, "echo first".to_string())
            ]
        );
        assert_eq!(backend.calls(), ["send:-:first"]);
    }

    #[tokio::test]
    async fn test_failed_send_keeps_user_message_and_clears_busy() {
        let (store, backend) = signed_in_store().await;
        backend.fail_with(NetworkError::Server {
            status: 500,
            message: "OpenAI error".into(),
        });

        let err = store.send_message("Hello").await.unwrap_err();
        match err {
            StoreError::Network(e) => assert_eq!(e.status(), Some(500)),
            other => panic!("unexpected error: {other:?}"),
        }

        let state = store.state();
        assert_eq!(contents(&state), vec![(Role::User, "Hello".to_string())]);
        assert_eq!(state.active_conversation_id, None);
        assert!(!state.busy);

        // Retry once the backend recovers.
        *backend.failure.lock().unwrap() = None;
        store.send_message("Hello").await.unwrap();
        assert_eq!(store.state().messages.len(), 3);
    }

    #[tokio::test]
    async fn test_reply_after_new_conversation_is_dropped() {
        let (store, backend) = signed_in_store().await;
        backend.hold("send");

        let pending = tokio::spawn({
            let store = store.clone();
            async move { store.send_message("Hello").await }
        });
        backend.entered.notified().await;

        store.create_new_conversation();
        // The send still owns the busy flag.
        assert!(store.is_busy());
        backend.release.notify_one();

        let outcome = pending.await.unwrap().unwrap();
        assert!(matches!(outcome, SendOutcome::Stale(_)));

        let state = store.state();
        assert!(state.messages.is_empty());
        assert_eq!(state.active_conversation_id, None);
        assert!(!state.busy);
    }

    #[tokio::test]
    async fn test_load_after_new_conversation_is_dropped() {
        let (store, backend) = signed_in_store().await;
        backend
            .histories
            .lock()
            .unwrap()
            .insert("c2".into(), history("c2"));
        backend.hold("fetch");

        let pending = tokio::spawn({
            let store = store.clone();
            async move { store.load_conversation("c2").await }
        });
        backend.entered.notified().await;

        store.create_new_conversation();
        assert!(store.is_busy());
        backend.release.notify_one();
        pending.await.unwrap().unwrap();

        let state = store.state();
        assert!(state.messages.is_empty());
        assert_eq!(state.active_conversation_id, None);
        assert!(!state.busy);
        assert_eq!(backend.calls(), ["fetch:c2"]);
    }

    #[tokio::test]
    async fn test_cancelled_send_releases_busy() {
        let (store, backend) = signed_in_store().await;
        backend.hold("send");

        let result =
            tokio::time::timeout(Duration::from_millis(50), store.send_message("Hello")).await;
        assert!(result.is_err());

        let state = store.state();
        assert!(!state.busy);
        assert_eq!(contents(&state), vec![(Role::User, "Hello".to_string())]);
    }

    #[tokio::test]
    async fn test_load_conversation_replaces_messages() {
        let (store, backend) = signed_in_store().await;
        backend
            .histories
            .lock()
            .unwrap()
            .insert("c2".into(), history("c2"));

        store.send_message("draft").await.unwrap();
        store.load_conversation("c2").await.unwrap();

        let state = store.state();
        let ids: Vec<_> = state.messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["c2-1", "c2-2"]);
        assert_eq!(state.active_conversation_id.as_deref(), Some("c2"));
        assert!(!state.busy);
    }

    #[tokio::test]
    async fn test_failed_load_conversation_keeps_state() {
        let (store, backend) = signed_in_store().await;
        store.send_message("Hello").await.unwrap();
        let before = store.state();

        backend.fail_with(NetworkError::Timeout);
        store.load_conversation("c2").await.unwrap();

        assert_eq!(store.state(), before);
    }

    #[tokio::test]
    async fn test_load_conversation_while_busy_is_rejected() {
        let (store, backend) = signed_in_store().await;
        backend.hold("send");

        let pending = tokio::spawn({
            let store = store.clone();
            async move { store.send_message("Hello").await }
        });
        backend.entered.notified().await;

        let err = store.load_conversation("c2").await.unwrap_err();
        assert!(err.is_busy());

        backend.release.notify_one();
        pending.await.unwrap().unwrap();
        assert_eq!(backend.calls(), ["send:-:Hello"]);
    }

    #[tokio::test]
    async fn test_reads_without_identity_are_noops() {
        let (store, backend, _auth) = store_with_auth();

        store.load_conversations().await.unwrap();
        store.load_conversation("c1").await.unwrap();
        store.delete_conversation("c1").await.unwrap();

        assert!(backend.calls().is_empty());
        assert_eq!(store.state(), ConversationState::default());
    }

    #[tokio::test]
    async fn test_load_conversations_keeps_order_and_dedups() {
        let (store, backend) = signed_in_store().await;
        *backend.conversations.lock().unwrap() = vec![
            conversation("c3"),
            conversation("c1"),
            conversation("c3"),
            conversation("c2"),
        ];

        store.load_conversations().await.unwrap();

        let ids: Vec<_> = store
            .state()
            .conversations
            .iter()
            .map(|c| c.id.clone())
            .collect();
        assert_eq!(ids, ["c3", "c1", "c2"]);
    }

    #[tokio::test]
    async fn test_failed_load_conversations_keeps_list() {
        let (store, backend) = signed_in_store().await;
        *backend.conversations.lock().unwrap() = vec![conversation("c1")];
        store.load_conversations().await.unwrap();

        backend.fail_with(NetworkError::Request("connection refused".into()));
        store.load_conversations().await.unwrap();

        assert_eq!(store.state().conversations, vec![conversation("c1")]);
    }

    #[tokio::test]
    async fn test_superseded_conversation_list_is_dropped() {
        let (store, backend) = signed_in_store().await;
        *backend.conversations.lock().unwrap() = vec![conversation("c1")];
        backend.hold("list");

        let pending = tokio::spawn({
            let store = store.clone();
            async move { store.load_conversations().await }
        });
        backend.entered.notified().await;

        store.reset();
        backend.release.notify_one();
        pending.await.unwrap().unwrap();

        assert!(store.state().conversations.is_empty());
    }

    #[tokio::test]
    async fn test_delete_active_conversation_starts_new_one() {
        let (store, backend) = signed_in_store().await;
        *backend.conversations.lock().unwrap() = vec![conversation("c1"), conversation("c2")];
        backend
            .histories
            .lock()
            .unwrap()
            .insert("c1".into(), history("c1"));
        store.load_conversations().await.unwrap();
        store.load_conversation("c1").await.unwrap();

        store.delete_conversation("c1").await.unwrap();

        let state = store.state();
        assert!(state.messages.is_empty());
        assert_eq!(state.active_conversation_id, None);
        assert_eq!(state.conversations, vec![conversation("c2")]);
        assert!(!state.busy);
    }

    #[tokio::test]
    async fn test_delete_other_conversation_keeps_active() {
        let (store, backend) = signed_in_store().await;
        *backend.conversations.lock().unwrap() = vec![conversation("c1"), conversation("c2")];
        backend
            .histories
            .lock()
            .unwrap()
            .insert("c1".into(), history("c1"));
        store.load_conversations().await.unwrap();
        store.load_conversation("c1").await.unwrap();
        let before = store.state();

        store.delete_conversation("c2").await.unwrap();

        let state = store.state();
        assert_eq!(state.messages, before.messages);
        assert_eq!(state.active_conversation_id.as_deref(), Some("c1"));
        assert_eq!(state.conversations, vec![conversation("c1")]);
    }

    #[tokio::test]
    async fn test_delete_unknown_conversation_is_safe() {
        let (store, backend) = signed_in_store().await;
        *backend.conversations.lock().unwrap() = vec![conversation("c1")];
        store.load_conversations().await.unwrap();
        let before = store.state();

        store.delete_conversation("nope").await.unwrap();

        let after = store.state();
        assert_eq!(after.conversations, before.conversations);
        assert_eq!(after.messages, before.messages);
        assert_eq!(after.active_conversation_id, before.active_conversation_id);
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_conversation() {
        let (store, backend) = signed_in_store().await;
        *backend.conversations.lock().unwrap() = vec![conversation("c1")];
        store.load_conversations().await.unwrap();

        backend.fail_with(NetworkError::Server {
            status: 404,
            message: "Conversation not found".into(),
        });
        store.delete_conversation("c1").await.unwrap();

        let state = store.state();
        assert_eq!(state.conversations, vec![conversation("c1")]);
        assert!(!state.busy);
    }

    #[tokio::test]
    async fn test_create_new_conversation_clears_messages() {
        let (store, _backend) = signed_in_store().await;
        store.send_message("Hello").await.unwrap();

        store.create_new_conversation();

        let state = store.state();
        assert!(state.messages.is_empty());
        assert_eq!(state.active_conversation_id, None);
    }

    #[tokio::test]
    async fn test_subscribers_observe_updates() {
        let (store, _backend) = signed_in_store().await;
        let mut sub = store.subscribe();

        store.send_message("Hello").await.unwrap();
        let state = sub.changed().await.unwrap();
        assert_eq!(state.messages.len(), 2);
        assert!(!state.busy);
        assert_eq!(state.active_conversation().map(|c| c.id.as_str()), None);
    }

    #[test]
    fn test_dedup_by_id() {
        let deduped = dedup_by_id(vec![conversation("a"), conversation("b"), conversation("a")]);
        let ids: Vec<_> = deduped.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }
}
