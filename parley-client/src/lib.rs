//! Parley Client - Authenticated conversation session core.
//!
//! This crate provides:
//! - `AuthSession`: the signed-in identity and fresh bearer tokens
//! - `BackendClient`: the chat backend's HTTP API
//! - `ConversationStore`: message and conversation state with observable snapshots
//! - `spawn_identity_sync`: keeps the store in step with sign-in and sign-out
//!
//! A typical front end builds one `AuthSession` and one `BackendClient` at
//! startup, hands both to a `ConversationStore`, and renders whatever the
//! store's subscription publishes.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod auth;
pub mod backend;
pub mod error;
pub mod observe;
pub mod store;
pub mod sync;
pub mod types;

pub use auth::{
    provider_from_config, AuthSession, Identity, IdentityProvider, SecureTokenProvider,
    StaticTokenProvider, TokenGrant,
};
pub use backend::{BackendClient, ChatBackend, ChatReply};
pub use error::{AuthError, NetworkError, StoreError};
pub use observe::Subscription;
pub use store::{ConversationState, ConversationStore, SendOutcome};
pub use sync::{spawn_identity_sync, IdentitySync};
pub use types::{Conversation, Message, Role, SessionToken};
