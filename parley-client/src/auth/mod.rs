//! Authentication session.
//!
//! [`AuthSession`] owns the current identity and hands out bearer tokens,
//! refreshing them before they expire. It knows nothing about conversations.
//! One session is constructed at startup and shared (`Arc`) with the store.

mod provider;
mod secure_token;

pub use provider::{Identity, IdentityProvider, StaticTokenProvider, TokenGrant};
pub use secure_token::{PasswordCredentials, SecureTokenProvider};

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parley_common::config::{AuthConfig, AuthProviderKind};
use tokio::sync::{watch, Mutex};

use crate::error::AuthError;
use crate::observe::Subscription;
use crate::types::SessionToken;

/// Current identity plus cached token.
pub struct AuthSession {
    provider: Arc<dyn IdentityProvider>,
    identity: watch::Sender<Option<Identity>>,
    /// Held across refreshes so concurrent callers share a single refresh.
    credentials: Mutex<Option<TokenGrant>>,
    refresh_skew: chrono::Duration,
    timeout: Duration,
}

impl AuthSession {
    /// Create a session using the `auth` config section's freshness and timeout settings.
    pub fn new(provider: Arc<dyn IdentityProvider>, config: &AuthConfig) -> Self {
        Self::with_settings(provider, config.refresh_skew(), config.timeout())
    }

    /// Create a session with explicit refresh skew and provider timeout.
    pub fn with_settings(
        provider: Arc<dyn IdentityProvider>,
        refresh_skew: Duration,
        timeout: Duration,
    ) -> Self {
        let (identity, _) = watch::channel(None);
        Self {
            provider,
            identity,
            credentials: Mutex::new(None),
            refresh_skew: chrono::Duration::from_std(refresh_skew)
                .unwrap_or(chrono::Duration::zero()),
            timeout,
        }
    }

    /// Interactively authenticate with the provider.
    ///
    /// On failure the current identity is left untouched.
    pub async fn sign_in(&self) -> Result<Identity, AuthError> {
        // Token lookups must not wait on interactive sign-in.
        let (identity, grant) = match self.provider.sign_in().await {
            Ok(signed_in) => signed_in,
            Err(e) => {
                tracing::warn!(error = %e, "Sign-in failed");
                return Err(e);
            }
        };

        {
            let mut credentials = self.credentials.lock().await;
            *credentials = Some(grant);
            self.identity.send_replace(Some(identity.clone()));
        }

        tracing::info!(user_id = %identity.user_id, "Signed in");
        Ok(identity)
    }

    /// Clear the current identity. Idempotent: subscribers are only notified
    /// when an identity was actually active.
    pub async fn sign_out(&self) {
        let mut previous = None;
        {
            let mut credentials = self.credentials.lock().await;
            *credentials = None;
            self.identity.send_if_modified(|current| {
                previous = current.take();
                previous.is_some()
            });
        }

        if let Some(identity) = previous {
            if let Err(e) = self.provider.sign_out(&identity).await {
                tracing::warn!(error = %e, user_id = %identity.user_id, "Provider sign-out failed");
            }
            tracing::info!(user_id = %identity.user_id, "Signed out");
        }
    }

    /// A currently valid bearer token, or `None` when signed out.
    ///
    /// Expiring tokens are refreshed transparently. A refresh failure or
    /// timeout resolves to `None`; callers decide whether that is fatal.
    pub async fn get_token(&self) -> Option<SessionToken> {
        let mut credentials = self.credentials.lock().await;
        let identity = self.identity.borrow().clone()?;

        let refresh_token = match credentials.as_ref() {
            Some(grant) if grant.expires_at - self.refresh_skew > Utc::now() => {
                return Some(grant.token.clone());
            }
            Some(grant) => grant.refresh_token.clone(),
            None => None,
        };

        tracing::debug!(user_id = %identity.user_id, "Refreshing bearer token");

        let refreshed = tokio::time::timeout(
            self.timeout,
            self.provider
                .refresh(&identity, refresh_token.as_ref().map(|t| t.as_str())),
        )
        .await;

        match refreshed {
            Ok(Ok(grant)) => {
                let token = grant.token.clone();
                *credentials = Some(grant);
                Some(token)
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, user_id = %identity.user_id, "Token refresh failed");
                None
            }
            Err(_) => {
                tracing::warn!(
                    user_id = %identity.user_id,
                    timeout_secs = self.timeout.as_secs(),
                    "Token refresh timed out"
                );
                None
            }
        }
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.identity.borrow().clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.identity.borrow().is_some()
    }

    /// Observe identity changes.
    pub fn subscribe(&self) -> Subscription<Option<Identity>> {
        Subscription::new(self.identity.subscribe())
    }
}

/// Build the provider selected by `auth.provider`.
///
/// The secure token provider needs a password, which is never stored in config.
pub fn provider_from_config(
    config: &AuthConfig,
    password: Option<String>,
) -> Result<Arc<dyn IdentityProvider>, AuthError> {
    match config.provider {
        AuthProviderKind::Static => Ok(Arc::new(StaticTokenProvider::from_config(config)?)),
        AuthProviderKind::SecureToken => {
            let provider = SecureTokenProvider::from_config(config)?;
            let provider = match (config.email.as_deref(), password) {
                (Some(email), Some(password)) => provider.with_password(email, password),
                _ => provider,
            };
            Ok(Arc::new(provider))
        }
    }
}
