//! In-memory store and recording notifier shared by the crate's tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use parley_storage::{
    ChatId, ChatRecord, ChatStore, DEFAULT_CHAT_TITLE, MessageId, MessageRecord, MessageStore,
    NewChat, NewMessage, StorageError, StorageResult, UserId, UserRecord, UserStore,
};

use crate::notify::{Notice, Notifier};

type Hook = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct Tables {
    users: Vec<UserRecord>,
    chats: Vec<ChatRecord>,
    messages: Vec<MessageRecord>,
    clock: u64,
    failing: HashSet<&'static str>,
    calls: HashMap<&'static str, usize>,
}

impl Tables {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn enter(&mut self, op: &'static str) -> StorageResult<()> {
        *self.calls.entry(op).or_default() += 1;
        if self.failing.remove(op) {
            return Err(StorageError::InvariantViolation {
                stage: "memory-store-injected",
                details: format!("{op} failed on purpose"),
            });
        }
        Ok(())
    }

    fn owned_chat(&mut self, owner: UserId, chat_id: ChatId) -> StorageResult<&mut ChatRecord> {
        self.chats
            .iter_mut()
            .find(|chat| chat.id == chat_id && chat.owner_id == owner)
            .ok_or_else(|| StorageError::NotFound {
                stage: "memory-store-chat",
                entity: "chat",
                id: chat_id.to_string(),
            })
    }
}

/// Mirrors the SQLite backend's ordering and ownership rules without touching disk.
#[derive(Default)]
pub(crate) struct MemoryStore {
    tables: Mutex<Tables>,
    list_messages_hook: Mutex<Option<Hook>>,
}

impl MemoryStore {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().expect("memory store lock")
    }

    /// Makes the next call to `op` fail once.
    pub(crate) fn fail_next(&self, op: &'static str) {
        self.tables().failing.insert(op);
    }

    pub(crate) fn calls(&self, op: &'static str) -> usize {
        self.tables().calls.get(op).copied().unwrap_or_default()
    }

    /// Runs `hook` inside the next `list_messages`, before rows are read.
    pub(crate) fn on_next_list_messages(&self, hook: impl FnOnce() + Send + 'static) {
        *self.list_messages_hook.lock().expect("hook lock") = Some(Box::new(hook));
    }

    pub(crate) fn all_messages(&self) -> Vec<MessageRecord> {
        self.tables().messages.clone()
    }
}

impl UserStore for MemoryStore {
    fn sign_in(&self, email: &str) -> StorageResult<UserRecord> {
        let mut tables = self.tables();
        tables.enter("sign_in")?;
        let email = email.trim().to_lowercase();
        if let Some(user) = tables.users.iter().find(|user| user.email == email) {
            return Ok(user.clone());
        }

        let created_at_unix_ms = tables.tick();
        let user = UserRecord {
            id: UserId::new_v7(),
            email,
            created_at_unix_ms,
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    fn get_user(&self, user_id: UserId) -> StorageResult<Option<UserRecord>> {
        let mut tables = self.tables();
        tables.enter("get_user")?;
        Ok(tables.users.iter().find(|user| user.id == user_id).cloned())
    }
}

impl ChatStore for MemoryStore {
    fn list_chats(&self, owner: UserId) -> StorageResult<Vec<ChatRecord>> {
        let mut tables = self.tables();
        tables.enter("list_chats")?;
        let mut chats: Vec<ChatRecord> = tables
            .chats
            .iter()
            .filter(|chat| chat.owner_id == owner)
            .cloned()
            .collect();
        chats.reverse();
        chats.sort_by(|left, right| right.updated_at_unix_ms.cmp(&left.updated_at_unix_ms));
        Ok(chats)
    }

    fn create_chat(&self, owner: UserId, input: NewChat) -> StorageResult<ChatRecord> {
        let mut tables = self.tables();
        tables.enter("create_chat")?;
        let now = tables.tick();
        let title = match input.title.trim() {
            "" => DEFAULT_CHAT_TITLE.to_string(),
            title => title.to_string(),
        };
        let chat = ChatRecord {
            id: ChatId::new_v7(),
            owner_id: owner,
            title,
            created_at_unix_ms: now,
            updated_at_unix_ms: now,
        };
        tables.chats.push(chat.clone());
        Ok(chat)
    }

    fn get_chat(&self, owner: UserId, chat_id: ChatId) -> StorageResult<Option<ChatRecord>> {
        let mut tables = self.tables();
        tables.enter("get_chat")?;
        Ok(tables.owned_chat(owner, chat_id).ok().map(|chat| chat.clone()))
    }

    fn rename_chat(
        &self,
        owner: UserId,
        chat_id: ChatId,
        title: &str,
    ) -> StorageResult<ChatRecord> {
        let mut tables = self.tables();
        tables.enter("rename_chat")?;
        let now = tables.tick();
        let chat = tables.owned_chat(owner, chat_id)?;
        chat.title = title.trim().to_string();
        chat.updated_at_unix_ms = now;
        Ok(chat.clone())
    }

    fn delete_chat(&self, owner: UserId, chat_id: ChatId) -> StorageResult<()> {
        let mut tables = self.tables();
        tables.enter("delete_chat")?;
        tables.owned_chat(owner, chat_id)?;
        tables.chats.retain(|chat| chat.id != chat_id);
        tables.messages.retain(|message| message.chat_id != chat_id);
        Ok(())
    }
}

impl MessageStore for MemoryStore {
    fn list_messages(&self, owner: UserId, chat_id: ChatId) -> StorageResult<Vec<MessageRecord>> {
        let hook = self.list_messages_hook.lock().expect("hook lock").take();
        if let Some(hook) = hook {
            hook();
        }

        let mut tables = self.tables();
        tables.enter("list_messages")?;
        tables.owned_chat(owner, chat_id)?;
        Ok(tables
            .messages
            .iter()
            .filter(|message| message.chat_id == chat_id)
            .cloned()
            .collect())
    }

    fn append_message(
        &self,
        owner: UserId,
        chat_id: ChatId,
        input: NewMessage,
    ) -> StorageResult<MessageRecord> {
        let mut tables = self.tables();
        tables.enter("append_message")?;
        let now = tables.tick();
        let chat = tables.owned_chat(owner, chat_id)?;
        chat.updated_at_unix_ms = now;
        let message = MessageRecord {
            id: MessageId::new_v7(),
            chat_id,
            content: input.content,
            sender: input.sender,
            created_at_unix_ms: now,
        };
        tables.messages.push(message.clone());
        Ok(message)
    }
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub(crate) fn messages(&self) -> Vec<String> {
        self.notices
            .lock()
            .expect("notice lock")
            .iter()
            .map(|notice| notice.message.clone())
            .collect()
    }

    pub(crate) fn levels(&self) -> Vec<crate::notify::NoticeLevel> {
        self.notices
            .lock()
            .expect("notice lock")
            .iter()
            .map(|notice| notice.level)
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().expect("notice lock").push(notice);
    }
}

/// Store, notifier and a signed-in session wired together.
pub(crate) struct Harness {
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub auth: crate::auth::AuthSession,
}

impl Harness {
    pub(crate) fn signed_in() -> Self {
        let harness = Self::signed_out();
        harness
            .auth
            .sign_in("ada@example.com")
            .expect("memory sign in");
        harness
    }

    pub(crate) fn signed_out() -> Self {
        let store = Arc::new(MemoryStore::default());
        let auth = crate::auth::AuthSession::new(store.clone());
        auth.restore(None);
        Self {
            store,
            notifier: Arc::new(RecordingNotifier::default()),
            auth,
        }
    }

    pub(crate) fn chats(&self) -> crate::chats::ChatRepository {
        crate::chats::ChatRepository::new(self.store.clone(), self.auth.clone(), self.notifier.clone())
    }

    pub(crate) fn messages(&self) -> crate::messages::MessageRepository {
        crate::messages::MessageRepository::new(
            self.store.clone(),
            self.auth.clone(),
            self.notifier.clone(),
        )
    }
}
