use parley_storage::{ChatId, ChatRecord};

use crate::chat_list::next_selection_after_delete;

/// Application-level selection shared by the sidebar and the conversation pane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShellState {
    active_chat: Option<ChatId>,
}

impl ShellState {
    pub fn active_chat(&self) -> Option<ChatId> {
        self.active_chat
    }

    /// Returns true when the selection actually changed.
    pub fn select(&mut self, chat_id: ChatId) -> bool {
        let changed = self.active_chat != Some(chat_id);
        self.active_chat = Some(chat_id);
        changed
    }

    pub fn clear(&mut self) -> bool {
        self.active_chat.take().is_some()
    }

    /// Applies a successful delete. `remaining` is the refreshed list.
    pub fn after_delete(&mut self, deleted: ChatId, remaining: &[ChatRecord]) -> Option<ChatId> {
        self.active_chat = next_selection_after_delete(self.active_chat, deleted, remaining);
        self.active_chat
    }
}

#[cfg(test)]
mod tests {
    use parley_storage::UserId;

    use super::*;

    fn record(id: ChatId) -> ChatRecord {
        ChatRecord {
            id,
            owner_id: UserId::new_v7(),
            title: "chat".to_string(),
            created_at_unix_ms: 0,
            updated_at_unix_ms: 0,
        }
    }

    #[test]
    fn select_reports_changes() {
        let mut shell = ShellState::default();
        let chat_id = ChatId::new_v7();

        assert!(shell.select(chat_id));
        assert!(!shell.select(chat_id));
        assert_eq!(shell.active_chat(), Some(chat_id));
        assert!(shell.clear());
        assert!(!shell.clear());
    }

    #[test]
    fn deleting_last_chat_clears_selection() {
        let mut shell = ShellState::default();
        let only = ChatId::new_v7();
        shell.select(only);

        assert_eq!(shell.after_delete(only, &[]), None);
        assert_eq!(shell.active_chat(), None);
    }

    #[test]
    fn deleting_active_chat_falls_back_to_first_remaining() {
        let mut shell = ShellState::default();
        let active = ChatId::new_v7();
        let next = ChatId::new_v7();
        let later = ChatId::new_v7();
        shell.select(active);

        let remaining = vec![record(next), record(later)];
        assert_eq!(shell.after_delete(active, &remaining), Some(next));
    }
}
