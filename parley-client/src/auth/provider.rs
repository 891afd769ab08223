//! Identity provider seam and the static-token provider.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parley_common::AuthConfig;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::AuthError;
use crate::types::SessionToken;

/// The signed-in user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            display_name: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// A bearer token minted by the provider, with its freshness window.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub token: SessionToken,
    pub expires_at: DateTime<Utc>,
    /// Long-lived credential used to mint the next token, if the provider has one
    pub refresh_token: Option<Zeroizing<String>>,
}

impl TokenGrant {
    /// A grant that expires `lifetime` from now.
    pub fn expiring_in(token: SessionToken, lifetime: Duration) -> Self {
        let lifetime = chrono::Duration::from_std(lifetime).unwrap_or(chrono::Duration::zero());
        Self {
            token,
            expires_at: Utc::now() + lifetime,
            refresh_token: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(Zeroizing::new(refresh_token.into()));
        self
    }
}

/// Source of identities and bearer tokens.
///
/// Implementations talk to an external identity platform; the auth session
/// owns caching, freshness, and change notification.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Authenticate the user and return their identity with an initial token.
    async fn sign_in(&self) -> Result<(Identity, TokenGrant), AuthError>;

    /// Mint a fresh token for an already signed-in identity.
    async fn refresh(
        &self,
        identity: &Identity,
        refresh_token: Option<&str>,
    ) -> Result<TokenGrant, AuthError>;

    /// Release provider-side state for the identity.
    async fn sign_out(&self, _identity: &Identity) -> Result<(), AuthError> {
        Ok(())
    }
}

/// Provider handing out one fixed token for one fixed identity.
pub struct StaticTokenProvider {
    identity: Identity,
    token: SessionToken,
    lifetime: Duration,
}

impl StaticTokenProvider {
    pub fn new(identity: Identity, token: impl Into<String>) -> Self {
        Self {
            identity,
            token: SessionToken::new(token),
            lifetime: Duration::from_secs(3600),
        }
    }

    /// How long each handed-out token is considered fresh.
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Build from `auth.token` / `auth.user_id` / `auth.email`.
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        let token = config
            .token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AuthError::Provider("auth.token is not configured".into()))?;

        let mut identity = Identity::new(config.user_id.clone());
        identity.email = config.email.clone();

        Ok(Self::new(identity, token).with_lifetime(config.token_lifetime()))
    }

    fn grant(&self) -> TokenGrant {
        TokenGrant::expiring_in(self.token.clone(), self.lifetime)
    }
}

#[async_trait]
impl IdentityProvider for StaticTokenProvider {
    async fn sign_in(&self) -> Result<(Identity, TokenGrant), AuthError> {
        Ok((self.identity.clone(), self.grant()))
    }

    async fn refresh(
        &self,
        _identity: &Identity,
        _refresh_token: Option<&str>,
    ) -> Result<TokenGrant, AuthError> {
        Ok(self.grant())
    }
}
