use parley_storage::{ChatId, ChatRecord};

/// Local draft of an inline rename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameDraft {
    pub chat_id: ChatId,
    pub original: String,
    pub draft: String,
}

/// Sidebar state that never leaves the client: search term and rename draft.
#[derive(Debug, Clone, Default)]
pub struct ChatListState {
    search_term: String,
    rename: Option<RenameDraft>,
}

impl ChatListState {
    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.search_term = term.into();
    }

    /// Chats whose title contains the search term, ignoring case. Order is preserved.
    pub fn filtered<'a>(&self, chats: &'a [ChatRecord]) -> Vec<&'a ChatRecord> {
        let needle = self.search_term.trim().to_lowercase();
        if needle.is_empty() {
            return chats.iter().collect();
        }

        chats
            .iter()
            .filter(|chat| chat.title.to_lowercase().contains(&needle))
            .collect()
    }

    pub fn renaming(&self) -> Option<&RenameDraft> {
        self.rename.as_ref()
    }

    pub fn is_renaming(&self, chat_id: ChatId) -> bool {
        self.rename
            .as_ref()
            .is_some_and(|draft| draft.chat_id == chat_id)
    }

    /// Starts editing `chat`, replacing any other open draft.
    pub fn begin_rename(&mut self, chat: &ChatRecord) {
        self.rename = Some(RenameDraft {
            chat_id: chat.id,
            original: chat.title.clone(),
            draft: chat.title.clone(),
        });
    }

    pub fn edit_draft(&mut self, text: impl Into<String>) {
        if let Some(rename) = self.rename.as_mut() {
            rename.draft = text.into();
        }
    }

    /// Closes the draft. Yields the rename to perform only if the trimmed draft
    /// is non-empty and differs from the original title.
    pub fn commit_rename(&mut self) -> Option<(ChatId, String)> {
        let rename = self.rename.take()?;
        let title = rename.draft.trim();
        if title.is_empty() || title == rename.original {
            return None;
        }
        Some((rename.chat_id, title.to_string()))
    }

    pub fn cancel_rename(&mut self) {
        self.rename = None;
    }

    /// Drops a draft whose chat vanished from the list.
    pub fn retain_existing(&mut self, chats: &[ChatRecord]) {
        let vanished = self
            .rename
            .as_ref()
            .is_some_and(|rename| !chats.iter().any(|chat| chat.id == rename.chat_id));
        if vanished {
            self.rename = None;
        }
    }
}

/// Selection after `deleted` is removed: unchanged unless it was the active
/// chat, in which case the first remaining chat, or none.
pub fn next_selection_after_delete(
    active: Option<ChatId>,
    deleted: ChatId,
    remaining: &[ChatRecord],
) -> Option<ChatId> {
    if active != Some(deleted) {
        return active;
    }

    remaining
        .iter()
        .map(|chat| chat.id)
        .find(|chat_id| *chat_id != deleted)
}

#[cfg(test)]
mod tests {
    use parley_storage::UserId;

    use super::*;

    fn chat(title: &str) -> ChatRecord {
        ChatRecord {
            id: ChatId::new_v7(),
            owner_id: UserId::new_v7(),
            title: title.to_string(),
            created_at_unix_ms: 0,
            updated_at_unix_ms: 0,
        }
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let chats = vec![chat("Rust tips"), chat("Groceries"), chat("TRUSTED list")];
        let mut state = ChatListState::default();

        state.set_search_term("rust");
        let titles: Vec<_> = state
            .filtered(&chats)
            .into_iter()
            .map(|chat| chat.title.as_str())
            .collect();
        assert_eq!(titles, vec!["Rust tips", "TRUSTED list"]);

        state.set_search_term("   ");
        assert_eq!(state.filtered(&chats).len(), 3);

        state.set_search_term("zzz");
        assert!(state.filtered(&chats).is_empty());
    }

    #[test]
    fn commit_requires_a_real_change() {
        let target = chat("Original");
        let mut state = ChatListState::default();

        state.begin_rename(&target);
        assert!(state.is_renaming(target.id));
        state.edit_draft("  Original ");
        assert_eq!(state.commit_rename(), None);
        assert!(state.renaming().is_none());

        state.begin_rename(&target);
        state.edit_draft("   ");
        assert_eq!(state.commit_rename(), None);

        state.begin_rename(&target);
        state.edit_draft(" Better ");
        assert_eq!(
            state.commit_rename(),
            Some((target.id, "Better".to_string()))
        );
    }

    #[test]
    fn cancel_discards_the_draft() {
        let target = chat("Original");
        let mut state = ChatListState::default();
        state.begin_rename(&target);
        state.edit_draft("Changed");
        state.cancel_rename();

        assert!(state.renaming().is_none());
        assert_eq!(state.commit_rename(), None);
    }

    #[test]
    fn drafts_for_deleted_chats_are_dropped() {
        let gone = chat("Gone");
        let kept = chat("Kept");
        let mut state = ChatListState::default();
        state.begin_rename(&gone);

        state.retain_existing(std::slice::from_ref(&kept));
        assert!(state.renaming().is_none());
    }

    #[test]
    fn deleting_the_active_chat_selects_the_first_remaining() {
        let first = chat("first");
        let second = chat("second");
        let deleted = chat("deleted");
        let remaining = vec![first.clone(), second.clone()];

        assert_eq!(
            next_selection_after_delete(Some(deleted.id), deleted.id, &remaining),
            Some(first.id)
        );
        assert_eq!(
            next_selection_after_delete(Some(second.id), deleted.id, &remaining),
            Some(second.id)
        );
        assert_eq!(
            next_selection_after_delete(Some(deleted.id), deleted.id, &[]),
            None
        );
        assert_eq!(next_selection_after_delete(None, deleted.id, &remaining), None);
    }
}
