use crate::models::{Message, SavedConversation};
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

const TABLE: &str = "chat_history";

/// Default number of saved conversations fetched by `list`.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Failure of a history operation. No raw backend error crosses this
/// boundary unclassified, and nothing here ever panics the caller.
#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("invalid user ID")]
    InvalidUserId,

    #[error("cannot save an empty conversation")]
    EmptyConversation,

    #[error("history backend error: {0}")]
    Backend(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed conversation payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
}

/// Aggregate numbers over a user's saved conversations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryStats {
    pub total_chats: u64,
    pub total_messages: u64,
    pub average_messages_per_chat: u64,
}

/// Gateway to the hosted conversation table. Saving snapshots the message
/// sequence passed in; nothing here is triggered automatically.
pub struct HistoryStore {
    client: Client,
    base_url: String,
    anon_key: String,
    access_token: Option<String>,
}

impl HistoryStore {
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            anon_key: anon_key.into(),
            access_token: None,
        }
    }

    /// Attaches the signed-in user's token so row-level policies apply.
    pub fn set_access_token(&mut self, token: Option<String>) {
        self.access_token = token;
    }

    fn endpoint(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url.trim_end_matches('/'), TABLE)
    }

    fn request(&self, method: Method) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.anon_key);
        self.client
            .request(method, self.endpoint())
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    async fn backend_error(response: reqwest::Response) -> HistoryError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        // The data API reports errors as {"message": "..."} JSON.
        let detail = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v["message"].as_str().map(|s| s.to_string()))
            .unwrap_or(body);
        HistoryError::Backend(format!("{}: {}", status, detail))
    }

    /// Saves a snapshot of the given message sequence for `user_id` and
    /// returns the created record. The payload keeps only role, content and
    /// timestamp per turn.
    pub async fn save(
        &self,
        user_id: &str,
        messages: &[Message],
    ) -> Result<SavedConversation, HistoryError> {
        if user_id.trim().is_empty() {
            return Err(HistoryError::InvalidUserId);
        }
        if messages.is_empty() {
            return Err(HistoryError::EmptyConversation);
        }

        let payload = serde_json::to_string(messages)?;
        let row = json!([{
            "user_id": user_id,
            "messages": payload,
            "message_count": messages.len(),
            "created_at": chrono::Utc::now(),
        }]);

        log::info!(
            "Saving conversation with {} messages for user {}",
            messages.len(),
            user_id
        );
        let response = self
            .request(Method::POST)
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await?;

        if !response.status().is_success() {
            let err = Self::backend_error(response).await;
            log::error!("Save conversation failed: {}", err);
            return Err(err);
        }

        let mut created: Vec<SavedConversation> = response.json().await?;
        created
            .pop()
            .ok_or_else(|| HistoryError::Backend("insert returned no record".to_string()))
    }

    /// Fetches up to `limit` saved conversations for `user_id`, most recent
    /// first. No saved conversations is an empty list, not an error.
    pub async fn list(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<SavedConversation>, HistoryError> {
        if user_id.trim().is_empty() {
            return Err(HistoryError::InvalidUserId);
        }

        log::debug!("Listing saved conversations for user {}", user_id);
        let response = self
            .request(Method::GET)
            .query(&[
                ("select", "*".to_string()),
                ("user_id", format!("eq.{}", user_id)),
                ("order", "created_at.desc".to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let err = Self::backend_error(response).await;
            log::error!("List conversations failed: {}", err);
            return Err(err);
        }

        let conversations: Vec<SavedConversation> = response.json().await?;
        log::info!(
            "Fetched {} saved conversations for user {}",
            conversations.len(),
            user_id
        );
        Ok(conversations)
    }

    /// Deletes one saved conversation. Deleting an id that no longer exists
    /// succeeds; the delete is idempotent.
    pub async fn delete_one(&self, id: Uuid) -> Result<(), HistoryError> {
        log::warn!("Deleting saved conversation {}", id);
        let response = self
            .request(Method::DELETE)
            .query(&[("id", format!("eq.{}", id))])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::backend_error(response).await);
        }
        Ok(())
    }

    /// Deletes every saved conversation owned by `user_id`. Idempotent.
    pub async fn delete_all(&self, user_id: &str) -> Result<(), HistoryError> {
        if user_id.trim().is_empty() {
            return Err(HistoryError::InvalidUserId);
        }

        log::warn!("Deleting all saved conversations for user {}", user_id);
        let response = self
            .request(Method::DELETE)
            .query(&[("user_id", format!("eq.{}", user_id))])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::backend_error(response).await);
        }
        Ok(())
    }

    /// Aggregate statistics for a user's saved conversations. A backend
    /// failure yields zeroed stats rather than an error; the caller renders
    /// these opportunistically.
    pub async fn stats(&self, user_id: &str) -> HistoryStats {
        #[derive(Deserialize)]
        struct CountRow {
            message_count: Option<i64>,
        }

        if user_id.trim().is_empty() {
            return HistoryStats::default();
        }

        let response = self
            .request(Method::GET)
            .query(&[
                ("select", "message_count,created_at".to_string()),
                ("user_id", format!("eq.{}", user_id)),
            ])
            .send()
            .await;

        let rows: Vec<CountRow> = match response {
            Ok(resp) if resp.status().is_success() => match resp.json().await {
                Ok(rows) => rows,
                Err(e) => {
                    log::error!("Failed to parse history stats: {}", e);
                    return HistoryStats::default();
                }
            },
            Ok(resp) => {
                log::error!("History stats request failed with status {}", resp.status());
                return HistoryStats::default();
            }
            Err(e) => {
                log::error!("History stats request failed: {}", e);
                return HistoryStats::default();
            }
        };

        let total_chats = rows.len() as u64;
        let total_messages: u64 = rows
            .iter()
            .map(|r| r.message_count.unwrap_or(0).max(0) as u64)
            .sum();
        let average_messages_per_chat = if total_chats > 0 {
            (total_messages as f64 / total_chats as f64).round() as u64
        } else {
            0
        };

        HistoryStats {
            total_chats,
            total_messages,
            average_messages_per_chat,
        }
    }
}
