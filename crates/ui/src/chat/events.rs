use parley_storage::ChatId;

/// Emitted when the user picks a chat in the sidebar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChatSelected {
    pub chat_id: ChatId,
}

/// Emitted after a chat was created, by the sidebar button or by a first message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChatCreated {
    pub chat_id: ChatId,
}

/// Emitted after a chat was deleted in storage and the list re-fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChatDeleted {
    pub chat_id: ChatId,
}

/// Emitted when a stored message bumped a chat's last-updated time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChatTouched {
    pub chat_id: ChatId,
}

/// Emitted when the user submits non-empty input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submit {
    pub content: String,
}

impl Submit {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}
