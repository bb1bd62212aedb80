use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwap;
use parley_storage::{ChatId, MessageRecord, MessageStore, NewMessage, Sender};
use tracing::{debug, error};

use crate::auth::AuthSession;
use crate::notify::{Notice, Notifier};

#[derive(Debug, Default)]
struct Loaded {
    chat_id: Option<ChatId>,
    messages: Arc<Vec<MessageRecord>>,
}

/// Message access for one selected chat at a time.
///
/// Blocking, like [`crate::ChatRepository`]. The published snapshot always
/// belongs to the chat that is current when it is read; a fetch that finishes
/// after the selection moved on is thrown away.
#[derive(Clone)]
pub struct MessageRepository {
    store: Arc<dyn MessageStore>,
    auth: AuthSession,
    notifier: Arc<dyn Notifier>,
    loaded: Arc<ArcSwap<Loaded>>,
    loading: Arc<AtomicBool>,
}

impl MessageRepository {
    pub fn new(
        store: Arc<dyn MessageStore>,
        auth: AuthSession,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            auth,
            notifier,
            loaded: Arc::new(ArcSwap::from_pointee(Loaded::default())),
            loading: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn chat_id(&self) -> Option<ChatId> {
        self.loaded.load().chat_id
    }

    pub fn snapshot(&self) -> Arc<Vec<MessageRecord>> {
        Arc::clone(&self.loaded.load().messages)
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    /// Switches the selected chat. A real switch empties the snapshot right away
    /// and returns `true`; the caller re-fetches.
    pub fn set_chat(&self, chat_id: Option<ChatId>) -> bool {
        if self.chat_id() == chat_id {
            return false;
        }

        debug!(chat_id = ?chat_id, "message list switched");
        self.loaded.store(Arc::new(Loaded {
            chat_id,
            messages: Arc::new(Vec::new()),
        }));
        true
    }

    pub fn list(&self) -> Arc<Vec<MessageRecord>> {
        self.refresh()
    }

    pub fn refresh(&self) -> Arc<Vec<MessageRecord>> {
        let Some(chat_id) = self.chat_id() else {
            return self.snapshot();
        };
        let Some(owner) = self.auth.user_id() else {
            return self.snapshot();
        };

        self.loading.store(true, Ordering::Release);
        let fetched = self.store.list_messages(owner, chat_id);
        self.loading.store(false, Ordering::Release);

        match fetched {
            Ok(messages) => {
                if self.chat_id() == Some(chat_id) {
                    self.loaded.store(Arc::new(Loaded {
                        chat_id: Some(chat_id),
                        messages: Arc::new(messages),
                    }));
                } else {
                    debug!(chat_id = %chat_id, "discarding messages for a chat that is no longer selected");
                }
            }
            Err(err) => {
                error!(stage = err.stage(), chat_id = %chat_id, "error fetching messages: {err}");
                self.notifier.notify(Notice::error("Failed to load messages"));
            }
        }
        self.snapshot()
    }

    /// Appends to the selected chat. `false` when nothing is selected or the write fails.
    pub fn append(&self, content: &str, sender: Sender) -> bool {
        let Some(chat_id) = self.chat_id() else {
            return false;
        };
        self.append_to(chat_id, content, sender)
    }

    /// Appends to `chat_id` whether or not it is still selected. The snapshot is
    /// only refreshed when it is.
    pub fn append_to(&self, chat_id: ChatId, content: &str, sender: Sender) -> bool {
        let Some(owner) = self.auth.user_id() else {
            return false;
        };

        let input = NewMessage {
            content: content.to_string(),
            sender,
        };
        match self.store.append_message(owner, chat_id, input) {
            Ok(message) => {
                debug!(message_id = %message.id, sender = sender.as_str(), "message appended");
                if self.chat_id() == Some(chat_id) {
                    self.refresh();
                }
                true
            }
            Err(err) => {
                error!(stage = err.stage(), chat_id = %chat_id, "error adding message: {err}");
                self.notifier.notify(Notice::error("Failed to send message"));
                false
            }
        }
    }
}
