use super::ids::{ChatId, MessageId, UserId};

/// Title given to chats created without an explicit one.
pub const DEFAULT_CHAT_TITLE: &str = "New Chat";

/// Author of a message. Storage-local, so UI enums can evolve independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sender {
    User,
    Bot,
}

impl Sender {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Bot => "bot",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    pub created_at_unix_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRecord {
    pub id: ChatId,
    pub owner_id: UserId,
    pub title: String,
    pub created_at_unix_ms: u64,
    pub updated_at_unix_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChat {
    pub title: String,
}

impl NewChat {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

impl Default for NewChat {
    fn default() -> Self {
        Self::new(DEFAULT_CHAT_TITLE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub content: String,
    pub sender: Sender,
    pub created_at_unix_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub content: String,
    pub sender: Sender,
}

impl NewMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            sender: Sender::User,
        }
    }

    pub fn bot(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            sender: Sender::Bot,
        }
    }
}
