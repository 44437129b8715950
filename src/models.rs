use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who produced a chat turn.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Uppercase form used in exported transcript headers.
    pub fn heading(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Assistant => "ASSISTANT",
        }
    }
}

// Represents a single turn in a conversation. Immutable once appended;
// insertion order is display order.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp,
        }
    }
}

// A persisted snapshot of a full session, mirroring one row of the hosted
// `chat_history` table. Created on an explicit save; never mutated in place.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SavedConversation {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub user_id: String,
    // Serialized Message sequence, stored as a transport string.
    pub messages: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_count: Option<i64>,
}

impl SavedConversation {
    /// Deserializes the stored payload back into an ordered message sequence.
    /// A payload that does not parse as a message array is an error; callers
    /// must leave the live session untouched in that case.
    pub fn decode_messages(&self) -> Result<Vec<Message>, serde_json::Error> {
        serde_json::from_str(&self.messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
    }

    #[test]
    fn decode_messages_roundtrip() {
        let turns = vec![
            Message::new(Role::User, "Hello", Utc::now()),
            Message::new(Role::Assistant, "Hi there", Utc::now()),
        ];
        let saved = SavedConversation {
            id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            messages: serde_json::to_string(&turns).unwrap(),
            created_at: Utc::now(),
            message_count: Some(2),
        };

        let decoded = saved.decode_messages().unwrap();
        assert_eq!(decoded, turns);
    }

    #[test]
    fn decode_messages_rejects_malformed_payload() {
        let saved = SavedConversation {
            id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            messages: "{\"not\": \"an array\"}".to_string(),
            created_at: Utc::now(),
            message_count: None,
        };
        assert!(saved.decode_messages().is_err());

        let garbage = SavedConversation {
            messages: "not json at all".to_string(),
            ..saved
        };
        assert!(garbage.decode_messages().is_err());
    }

    #[test]
    fn decode_messages_rejects_unknown_role() {
        let saved = SavedConversation {
            id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            messages: "[{\"role\":\"system\",\"content\":\"hi\"}]".to_string(),
            created_at: Utc::now(),
            message_count: None,
        };
        assert!(saved.decode_messages().is_err());
    }
}
