//! Email/password identity provider backed by the secure token REST API.
//!
//! Sign-in exchanges credentials for an id token plus a long-lived refresh
//! token (`accounts:signInWithPassword`); refresh trades the refresh token for
//! a new id token (`/v1/token`, `grant_type=refresh_token`).

use std::time::Duration;

use async_trait::async_trait;
use parley_common::AuthConfig;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::provider::{Identity, IdentityProvider, TokenGrant};
use crate::error::AuthError;
use crate::types::SessionToken;

/// Email/password pair used for non-interactive sign-in.
pub struct PasswordCredentials {
    pub email: String,
    pub password: Zeroizing<String>,
}

/// Identity provider speaking the secure token REST API.
pub struct SecureTokenProvider {
    client: reqwest::Client,
    api_key: String,
    identity_endpoint: String,
    token_endpoint: String,
    credentials: Option<PasswordCredentials>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl SecureTokenProvider {
    /// Create a provider for the given project API key and endpoints.
    pub fn new(
        api_key: impl Into<String>,
        identity_endpoint: &str,
        token_endpoint: &str,
        timeout: Duration,
    ) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            identity_endpoint: identity_endpoint.trim_end_matches('/').to_string(),
            token_endpoint: token_endpoint.trim_end_matches('/').to_string(),
            credentials: None,
        })
    }

    /// Build from the `auth` config section; credentials are attached separately.
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AuthError::Provider("auth.api_key is not configured".into()))?;

        Self::new(
            api_key,
            &config.identity_endpoint,
            &config.token_endpoint,
            config.timeout(),
        )
    }

    /// Attach the credentials used by `sign_in`.
    pub fn with_password(mut self, email: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(PasswordCredentials {
            email: email.into(),
            password: Zeroizing::new(password.into()),
        });
        self
    }

    async fn post_for<T, F>(&self, build: F) -> Result<T, AuthError>
    where
        T: serde::de::DeserializeOwned,
        F: FnOnce(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let response = build(&self.client)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AuthError::Timeout
                } else {
                    AuthError::Provider(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if !response.status().is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|env| env.error.message)
                .unwrap_or(body);
            return Err(AuthError::Rejected { status, message });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AuthError::Provider(format!("Failed to parse response: {e}")))
    }
}

fn parse_lifetime(expires_in: &str) -> Result<Duration, AuthError> {
    expires_in
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| AuthError::Provider(format!("invalid expires_in: {expires_in}")))
}

#[async_trait]
impl IdentityProvider for SecureTokenProvider {
    async fn sign_in(&self) -> Result<(Identity, TokenGrant), AuthError> {
        let credentials = self.credentials.as_ref().ok_or(AuthError::Cancelled)?;
        let url = format!("{}/v1/accounts:signInWithPassword", self.identity_endpoint);

        let request = SignInRequest {
            email: &credentials.email,
            password: credentials.password.as_str(),
            return_secure_token: true,
        };

        let response: SignInResponse = self
            .post_for(|client| client.post(&url).json(&request))
            .await?;

        let identity = Identity {
            user_id: response.local_id,
            email: response.email.or_else(|| Some(credentials.email.clone())),
            display_name: response.display_name,
        };
        let grant = TokenGrant::expiring_in(
            SessionToken::new(response.id_token),
            parse_lifetime(&response.expires_in)?,
        )
        .with_refresh_token(response.refresh_token);

        Ok((identity, grant))
    }

    async fn refresh(
        &self,
        identity: &Identity,
        refresh_token: Option<&str>,
    ) -> Result<TokenGrant, AuthError> {
        let refresh_token = refresh_token.ok_or(AuthError::NotSignedIn)?;
        let url = format!("{}/v1/token", self.token_endpoint);
        let form = [("grant_type", "refresh_token"), ("refresh_token", refresh_token)];

        let response: RefreshResponse = self
            .post_for(|client| client.post(&url).form(&form))
            .await?;

        if response.user_id != identity.user_id {
            return Err(AuthError::Provider(format!(
                "refresh token belongs to {}, expected {}",
                response.user_id, identity.user_id
            )));
        }

        Ok(TokenGrant::expiring_in(
            SessionToken::new(response.id_token),
            parse_lifetime(&response.expires_in)?,
        )
        .with_refresh_token(response.refresh_token))
    }
}
