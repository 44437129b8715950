use crate::models::{Message, Role};
use anyhow::{bail, Result};
use chrono::Utc;

/// The active, in-memory ordered list of chat turns for one conversation.
///
/// Owned by the UI layer; reset on logout or an explicit clear. Mutated only
/// by append (new turns), bulk replace (load from history) or reset. After
/// initialization the session always contains at least one message, and
/// appended timestamps are monotonically non-decreasing.
#[derive(Debug)]
pub struct Session {
    messages: Vec<Message>,
}

impl Session {
    /// Creates a session seeded with the assistant greeting, personalized
    /// with the signed-in user's name when one is available.
    pub fn new(display_name: Option<&str>) -> Self {
        let name = display_name.unwrap_or("there");
        let greeting = format!(
            "Hello {}! I'm Vehi, your intelligent AI assistant. How can I help you today?",
            name
        );
        Self {
            messages: vec![Message::new(Role::Assistant, greeting, Utc::now())],
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Role::User, content.into());
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(Role::Assistant, content.into());
    }

    // Appends a turn, clamping the timestamp so ordering survives a clock
    // that steps backwards.
    fn push(&mut self, role: Role, content: String) {
        let mut timestamp = Utc::now();
        if let Some(last) = self.messages.last() {
            if timestamp < last.timestamp {
                timestamp = last.timestamp;
            }
        }
        self.messages.push(Message::new(role, content, timestamp));
    }

    /// Replaces the whole session with a loaded conversation. An empty
    /// sequence is rejected so the at-least-one-message invariant holds.
    pub fn replace(&mut self, messages: Vec<Message>) -> Result<()> {
        if messages.is_empty() {
            bail!("Cannot load an empty conversation.");
        }
        self.messages = messages;
        Ok(())
    }

    /// Resets the session to a fresh post-clear seed.
    pub fn clear(&mut self) {
        self.messages = vec![Message::new(
            Role::Assistant,
            "Chat cleared! How can I help you?",
            Utc::now(),
        )];
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> &Message {
        // Safe: the constructor, clear() and replace() all guarantee at
        // least one message.
        self.messages.last().expect("session is never empty")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_with_greeting() {
        let session = Session::new(Some("Ada"));
        assert_eq!(session.len(), 1);
        assert_eq!(session.last().role, Role::Assistant);
        assert!(session.last().content.contains("Ada"));

        let anonymous = Session::new(None);
        assert!(anonymous.last().content.contains("there"));
    }

    #[test]
    fn timestamps_are_monotonic() {
        let mut session = Session::new(None);
        session.push_user("first");
        session.push_assistant("second");
        session.push_user("third");

        let turns = session.messages();
        for pair in turns.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[test]
    fn replace_rejects_empty_sequence() {
        let mut session = Session::new(None);
        session.push_user("keep me");
        let before = session.len();

        assert!(session.replace(Vec::new()).is_err());
        assert_eq!(session.len(), before);
    }

    #[test]
    fn replace_swaps_in_loaded_turns() {
        let mut session = Session::new(None);
        let loaded = vec![
            Message::new(Role::User, "old question", Utc::now()),
            Message::new(Role::Assistant, "old answer", Utc::now()),
        ];

        session.replace(loaded.clone()).unwrap();
        assert_eq!(session.messages(), loaded.as_slice());
    }

    #[test]
    fn clear_reseeds_the_session() {
        let mut session = Session::new(Some("Ada"));
        session.push_user("hello");
        session.clear();

        assert_eq!(session.len(), 1);
        assert_eq!(session.last().role, Role::Assistant);
        assert!(session.last().content.contains("cleared"));
    }
}
