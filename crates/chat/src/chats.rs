use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwap;
use parley_storage::{ChatId, ChatRecord, ChatStore, NewChat};
use tracing::{debug, error};

use crate::auth::AuthSession;
use crate::notify::{Notice, Notifier};

/// Chat list access for the signed-in user.
///
/// Every call blocks on the store, so UI callers run them off the main thread.
/// Failures never escape: they are logged, surfaced as a notice, and turned into
/// `None`/`false`. Successful mutations re-fetch the list instead of patching it.
#[derive(Clone)]
pub struct ChatRepository {
    store: Arc<dyn ChatStore>,
    auth: AuthSession,
    notifier: Arc<dyn Notifier>,
    chats: Arc<ArcSwap<Vec<ChatRecord>>>,
    loading: Arc<AtomicBool>,
}

impl ChatRepository {
    pub fn new(
        store: Arc<dyn ChatStore>,
        auth: AuthSession,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            auth,
            notifier,
            chats: Arc::new(ArcSwap::from_pointee(Vec::new())),
            loading: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Last fetched list, most recently updated first.
    pub fn snapshot(&self) -> Arc<Vec<ChatRecord>> {
        self.chats.load_full()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    pub fn list(&self) -> Arc<Vec<ChatRecord>> {
        self.refresh()
    }

    pub fn refresh(&self) -> Arc<Vec<ChatRecord>> {
        let Some(owner) = self.auth.user_id() else {
            self.chats.store(Arc::new(Vec::new()));
            return self.snapshot();
        };

        self.loading.store(true, Ordering::Release);
        match self.store.list_chats(owner) {
            Ok(chats) => {
                debug!(count = chats.len(), "chats loaded");
                self.chats.store(Arc::new(chats));
            }
            Err(err) => {
                // The previous snapshot stays visible.
                error!(stage = err.stage(), "error fetching chats: {err}");
                self.notifier.notify(Notice::error("Failed to load chats"));
            }
        }
        self.loading.store(false, Ordering::Release);
        self.snapshot()
    }

    /// Drops the cached list, e.g. after sign-out.
    pub fn clear(&self) {
        self.chats.store(Arc::new(Vec::new()));
    }

    pub fn create(&self, title: Option<&str>) -> Option<ChatId> {
        let owner = self.auth.user_id()?;
        let input = title.map(NewChat::new).unwrap_or_default();

        match self.store.create_chat(owner, input) {
            Ok(chat) => {
                debug!(chat_id = %chat.id, "chat created");
                self.refresh();
                Some(chat.id)
            }
            Err(err) => {
                error!(stage = err.stage(), "error creating chat: {err}");
                self.notifier.notify(Notice::error("Failed to create chat"));
                None
            }
        }
    }

    pub fn rename(&self, chat_id: ChatId, title: &str) -> bool {
        let title = title.trim();
        if title.is_empty() {
            return false;
        }
        let Some(owner) = self.auth.user_id() else {
            return false;
        };
        if self
            .snapshot()
            .iter()
            .any(|chat| chat.id == chat_id && chat.title == title)
        {
            debug!(chat_id = %chat_id, "rename skipped, title unchanged");
            return false;
        }

        match self.store.rename_chat(owner, chat_id, title) {
            Ok(_) => {
                self.refresh();
                self.notifier
                    .notify(Notice::success("Chat renamed successfully"));
                true
            }
            Err(err) => {
                error!(stage = err.stage(), chat_id = %chat_id, "error updating chat title: {err}");
                self.notifier.notify(Notice::error("Failed to rename chat"));
                false
            }
        }
    }

    pub fn delete(&self, chat_id: ChatId) -> bool {
        let Some(owner) = self.auth.user_id() else {
            return false;
        };

        match self.store.delete_chat(owner, chat_id) {
            Ok(()) => {
                self.refresh();
                self.notifier
                    .notify(Notice::success("Chat deleted successfully"));
                true
            }
            Err(err) => {
                error!(stage = err.stage(), chat_id = %chat_id, "error deleting chat: {err}");
                self.notifier.notify(Notice::error("Failed to delete chat"));
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use parley_storage::DEFAULT_CHAT_TITLE;

    use super::*;
    use crate::notify::NoticeLevel;
    use crate::testing::Harness;

    fn titles(chats: &[ChatRecord]) -> Vec<&str> {
        chats.iter().map(|chat| chat.title.as_str()).collect()
    }

    #[test]
    fn signed_out_list_is_empty_without_store_calls() {
        let harness = Harness::signed_out();
        let chats = harness.chats();

        assert!(chats.list().is_empty());
        assert_eq!(chats.create(Some("nope")), None);
        assert_eq!(harness.store.calls("list_chats"), 0);
        assert_eq!(harness.store.calls("create_chat"), 0);
    }

    #[test]
    fn create_refreshes_newest_first() {
        let harness = Harness::signed_in();
        let chats = harness.chats();

        let first = chats.create(None).expect("first chat");
        let second = chats.create(Some("Second")).expect("second chat");

        let snapshot = chats.snapshot();
        assert_eq!(titles(&snapshot), vec!["Second", DEFAULT_CHAT_TITLE]);
        assert_eq!(snapshot[0].id, second);
        assert_eq!(snapshot[1].id, first);
    }

    #[test]
    fn rename_updates_title_and_moves_chat_up() {
        let harness = Harness::signed_in();
        let chats = harness.chats();
        let old = chats.create(Some("Old")).expect("old chat");
        chats.create(Some("Newer")).expect("newer chat");

        assert!(chats.rename(old, "  Renamed  "));
        assert_eq!(titles(&chats.snapshot()), vec!["Renamed", "Newer"]);
        assert_eq!(harness.notifier.messages(), vec!["Chat renamed successfully"]);
    }

    #[test]
    fn blank_rename_is_a_silent_no_op() {
        let harness = Harness::signed_in();
        let chats = harness.chats();
        let chat_id = chats.create(Some("Keep")).expect("chat");

        assert!(!chats.rename(chat_id, "   "));
        assert_eq!(harness.store.calls("rename_chat"), 0);
        assert!(harness.notifier.messages().is_empty());
        assert_eq!(titles(&chats.snapshot()), vec!["Keep"]);
    }

    #[test]
    fn rename_to_the_current_title_changes_nothing() {
        let harness = Harness::signed_in();
        let chats = harness.chats();
        let keep = chats.create(Some("Keep")).expect("keep chat");
        chats.create(Some("Newer")).expect("newer chat");

        assert!(!chats.rename(keep, " Keep "));
        assert_eq!(harness.store.calls("rename_chat"), 0);
        assert!(harness.notifier.messages().is_empty());
        assert_eq!(titles(&chats.snapshot()), vec!["Newer", "Keep"]);
    }

    #[test]
    fn delete_notifies_and_refreshes() {
        let harness = Harness::signed_in();
        let chats = harness.chats();
        let doomed = chats.create(Some("Doomed")).expect("chat");
        chats.create(Some("Stays")).expect("chat");

        assert!(chats.delete(doomed));
        assert_eq!(titles(&chats.snapshot()), vec!["Stays"]);
        assert_eq!(harness.notifier.levels(), vec![NoticeLevel::Success]);
    }

    #[test]
    fn failures_become_sentinels_and_notices() {
        let harness = Harness::signed_in();
        let chats = harness.chats();
        let chat_id = chats.create(Some("Existing")).expect("chat");

        harness.store.fail_next("create_chat");
        assert_eq!(chats.create(None), None);

        harness.store.fail_next("rename_chat");
        assert!(!chats.rename(chat_id, "Other"));

        harness.store.fail_next("delete_chat");
        assert!(!chats.delete(chat_id));

        harness.store.fail_next("list_chats");
        let kept = chats.refresh();
        assert_eq!(titles(&kept), vec!["Existing"]);

        assert_eq!(
            harness.notifier.messages(),
            vec![
                "Failed to create chat",
                "Failed to rename chat",
                "Failed to delete chat",
                "Failed to load chats",
            ]
        );
        assert!(!chats.is_loading());
    }

    #[test]
    fn clones_share_the_snapshot() {
        let harness = Harness::signed_in();
        let chats = harness.chats();
        let other = chats.clone();

        chats.create(Some("Shared")).expect("chat");
        assert_eq!(titles(&other.snapshot()), vec!["Shared"]);
    }
}
