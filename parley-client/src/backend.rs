//! HTTP client for the chat backend.
//!
//! [`BackendClient`] is stateless: every call takes the bearer token to use,
//! attaches it as `Authorization: Bearer <token>`, and maps transport and
//! non-2xx failures into [`NetworkError`]. It never retries.
//!
//! | Operation | Method/Path |
//! |---|---|
//! | Send message | `POST /chat` |
//! | List conversations | `GET /conversations` |
//! | Fetch messages | `GET /conversations/{id}/messages` |
//! | Delete conversation | `DELETE /conversations/{id}` |
//! | Health | `GET /` |

use std::time::{Duration, Instant};

use async_trait::async_trait;
use parley_common::api_call_span;
use parley_common::config::BackendConfig;
use parley_common::logging::generate_trace_id;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use url::Url;

use crate::error::NetworkError;
use crate::types::{parse_timestamp, string_or_number, Conversation, Message, Role, SessionToken};

/// Result type for backend operations.
pub type Result<T> = std::result::Result<T, NetworkError>;

/// The backend's answer to a chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub message_id: String,
    pub content: String,
    /// Conversation the exchange was stored in (newly created if none was given)
    pub conversation_id: String,
}

/// Authenticated operations the conversation store relies on.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send a user message; `conversation_id = None` asks the backend to start a new one.
    async fn send_message(
        &self,
        token: &SessionToken,
        content: &str,
        conversation_id: Option<&str>,
    ) -> Result<ChatReply>;

    /// All conversations of the signed-in user, in server order.
    async fn list_conversations(&self, token: &SessionToken) -> Result<Vec<Conversation>>;

    /// Full message history of one conversation, in server order.
    async fn fetch_messages(
        &self,
        token: &SessionToken,
        conversation_id: &str,
    ) -> Result<Vec<Message>>;

    async fn delete_conversation(&self, token: &SessionToken, conversation_id: &str)
        -> Result<()>;
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    conversation_id: Option<&'a str>,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(deserialize_with = "string_or_number")]
    message_id: String,
    response: String,
    #[serde(deserialize_with = "string_or_number")]
    conversation_id: String,
}

#[derive(Debug, Deserialize)]
struct ConversationRecord {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    #[serde(default)]
    title: Option<String>,
    created_at: String,
}

#[derive(Debug, Deserialize)]
struct MessageRecord {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    role: Role,
    content: String,
    created_at: String,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    message: String,
}

impl TryFrom<ConversationRecord> for Conversation {
    type Error = NetworkError;

    fn try_from(record: ConversationRecord) -> Result<Self> {
        let created_at = parse_timestamp(&record.created_at).ok_or_else(|| {
            NetworkError::Parse(format!(
                "invalid created_at '{}' for conversation {}",
                record.created_at, record.id
            ))
        })?;
        Ok(Self {
            id: record.id,
            title: record.title.unwrap_or_default(),
            created_at,
        })
    }
}

impl TryFrom<MessageRecord> for Message {
    type Error = NetworkError;

    fn try_from(record: MessageRecord) -> Result<Self> {
        let timestamp = parse_timestamp(&record.created_at).ok_or_else(|| {
            NetworkError::Parse(format!(
                "invalid created_at '{}' for message {}",
                record.created_at, record.id
            ))
        })?;
        Ok(Self {
            id: record.id,
            role: record.role,
            content: record.content,
            timestamp,
        })
    }
}

// ============================================================================
// HTTP client
// ============================================================================

/// reqwest-backed [`ChatBackend`].
#[derive(Clone)]
pub struct BackendClient {
    base_url: Url,
    model: String,
    client: reqwest::Client,
}

impl BackendClient {
    /// Create a client from the `backend` config section.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| NetworkError::Request(e.to_string()))?;

        Self::with_client(&config.base_url, &config.model, client)
    }

    /// Create a client around a custom reqwest client.
    ///
    /// Useful for tests or when custom client configuration is needed.
    pub fn with_client(base_url: &str, model: &str, client: reqwest::Client) -> Result<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| NetworkError::Request(format!("invalid base url '{base_url}': {e}")))?;

        Ok(Self {
            base_url,
            model: model.to_string(),
            client,
        })
    }

    /// Convenience constructor with a fixed timeout.
    pub fn with_timeout(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NetworkError::Request(e.to_string()))?;
        Self::with_client(base_url, model, client)
    }

    /// Base URL joined with percent-encoded path segments.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| NetworkError::Request(format!("cannot use {} as a base url", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Liveness check (`GET /`); returns the backend's banner message.
    pub async fn health(&self) -> Result<String> {
        let url = self.endpoint(&[])?;
        let response = self.execute(Method::GET, url, None, None).await?;
        let health: HealthResponse = response
            .json()
            .await
            .map_err(|e| NetworkError::Parse(e.to_string()))?;
        Ok(health.message)
    }

    async fn execute(
        &self,
        method: Method,
        url: Url,
        token: Option<&SessionToken>,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response> {
        let trace_id = generate_trace_id();
        let span = api_call_span!(trace_id, method = %method, path = %url.path());

        async move {
            let started = Instant::now();
            let mut request = self
                .client
                .request(method, url)
                .header("X-Request-Id", &trace_id);
            if let Some(token) = token {
                request = request.bearer_auth(token.expose());
            }
            if let Some(body) = body {
                request = request.json(&body);
            }

            let response = request.send().await.map_err(|e| {
                let err = NetworkError::from_reqwest(e);
                tracing::warn!(error = %err, "Backend request failed");
                err
            })?;

            let status = response.status();
            tracing::debug!(
                status = status.as_u16(),
                duration_ms = started.elapsed().as_millis() as u64,
                "Backend responded"
            );

            if !status.is_success() {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(NetworkError::Server {
                    status: status.as_u16(),
                    message,
                });
            }

            Ok(response)
        }
        .instrument(span)
        .await
    }

    async fn execute_json<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        token: &SessionToken,
        body: Option<serde_json::Value>,
    ) -> Result<T> {
        self.execute(method, url, Some(token), body)
            .await?
            .json::<T>()
            .await
            .map_err(|e| NetworkError::Parse(e.to_string()))
    }
}

#[async_trait]
impl ChatBackend for BackendClient {
    async fn send_message(
        &self,
        token: &SessionToken,
        content: &str,
        conversation_id: Option<&str>,
    ) -> Result<ChatReply> {
        let url = self.endpoint(&["chat"])?;
        let body = serde_json::to_value(ChatRequest {
            message: content,
            conversation_id,
            model: &self.model,
        })
        .map_err(|e| NetworkError::Request(e.to_string()))?;

        let response: ChatResponse = self
            .execute_json(Method::POST, url, token, Some(body))
            .await?;

        Ok(ChatReply {
            message_id: response.message_id,
            content: response.response,
            conversation_id: response.conversation_id,
        })
    }

    async fn list_conversations(&self, token: &SessionToken) -> Result<Vec<Conversation>> {
        let url = self.endpoint(&["conversations"])?;
        let records: Vec<ConversationRecord> =
            self.execute_json(Method::GET, url, token, None).await?;
        records.into_iter().map(Conversation::try_from).collect()
    }

    async fn fetch_messages(
        &self,
        token: &SessionToken,
        conversation_id: &str,
    ) -> Result<Vec<Message>> {
        let url = self.endpoint(&["conversations", conversation_id, "messages"])?;
        let records: Vec<MessageRecord> =
            self.execute_json(Method::GET, url, token, None).await?;
        records.into_iter().map(Message::try_from).collect()
    }

    async fn delete_conversation(
        &self,
        token: &SessionToken,
        conversation_id: &str,
    ) -> Result<()> {
        let url = self.endpoint(&["conversations", conversation_id])?;
        self.execute(Method::DELETE, url, Some(token), None).await?;
        Ok(())
    }
}
