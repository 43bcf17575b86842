//! The in-memory conversation model.

use time::OffsetDateTime;
use uuid::Uuid;

use crate::types::{ChatMessage, Role};
use crate::utils::time::now;
use crate::{Error, Result};

/// One timestamped message of a conversation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: OffsetDateTime,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>, timestamp: OffsetDateTime) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp,
        }
    }
}

/// An ordered, append-only sequence of messages with identifying metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conversation {
    id: String,
    title: String,
    created_at: OffsetDateTime,
    last_updated: OffsetDateTime,
    messages: Vec<Message>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    /// Start a conversation with a fresh id and the default title derived from it.
    pub fn new() -> Self {
        let id = Uuid::new_v4().to_string();
        let title = default_title(&id);
        let created_at = now();
        Self {
            id,
            title,
            created_at,
            last_updated: created_at,
            messages: Vec::new(),
        }
    }

    /// Reassemble a conversation read back from storage.
    pub(crate) fn from_parts(
        id: String,
        title: String,
        created_at: OffsetDateTime,
        last_updated: OffsetDateTime,
        messages: Vec<Message>,
    ) -> Self {
        Self {
            id,
            title,
            created_at,
            last_updated,
            messages,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn last_updated(&self) -> OffsetDateTime {
        self.last_updated
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Rename the conversation.  Surrounding whitespace is dropped and an empty title is
    /// rejected.
    pub fn set_title(&mut self, title: &str) -> Result<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::validation(
                "conversation title must not be empty",
                Some("title".to_string()),
            ));
        }
        self.title = title.to_string();
        Ok(())
    }

    /// Append a message stamped with the current time.
    ///
    /// Timestamps never go backwards: if the clock has moved behind `last_updated`, the new
    /// message reuses `last_updated`.
    pub fn add_message(&mut self, role: Role, content: impl Into<String>) -> &Message {
        let timestamp = now().max(self.last_updated);
        self.last_updated = timestamp;
        self.messages.push(Message::new(role, content, timestamp));
        &self.messages[self.messages.len() - 1]
    }

    /// The history in wire form, without timestamps.
    pub fn api_messages(&self) -> Vec<ChatMessage> {
        self.messages
            .iter()
            .map(|m| ChatMessage::new(m.role, m.content.clone()))
            .collect()
    }
}

/// `Conversation-<first 8 characters of the id>`.
pub fn default_title(id: &str) -> String {
    let prefix: String = id.chars().take(8).collect();
    format!("Conversation-{prefix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_conversation_defaults() {
        let conversation = Conversation::new();
        assert_eq!(conversation.id().len(), 36);
        assert_eq!(
            conversation.title(),
            format!("Conversation-{}", &conversation.id()[..8])
        );
        assert!(conversation.is_empty());
        assert_eq!(conversation.created_at(), conversation.last_updated());
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(Conversation::new().id(), Conversation::new().id());
    }

    #[test]
    fn add_message_advances_last_updated() {
        let mut conversation = Conversation::new();
        let first = conversation.add_message(Role::User, "Hello").timestamp;
        let second = conversation.add_message(Role::Assistant, "Hi there").timestamp;
        assert!(second >= first);
        assert!(first >= conversation.created_at());
        assert_eq!(conversation.last_updated(), second);
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation.messages()[0].role, Role::User);
        assert_eq!(conversation.messages()[1].content, "Hi there");
    }

    #[test]
    fn set_title() {
        let mut conversation = Conversation::new();
        conversation.set_title("  Rust questions ").unwrap();
        assert_eq!(conversation.title(), "Rust questions");
        assert!(conversation.set_title("   ").is_err());
        assert_eq!(conversation.title(), "Rust questions");
    }

    #[test]
    fn api_messages_strip_timestamps() {
        let mut conversation = Conversation::new();
        conversation.add_message(Role::User, "Hello");
        conversation.add_message(Role::Assistant, "Hi there");
        assert_eq!(
            conversation.api_messages(),
            vec![ChatMessage::user("Hello"), ChatMessage::assistant("Hi there")]
        );
    }
}
