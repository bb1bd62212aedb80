pub mod error;
pub mod ids;
pub mod sqlite;
pub mod types;

pub use error::{StorageError, StorageResult};
pub use ids::{ChatId, MessageId, UserId};
pub use sqlite::SqliteStorage;
pub use types::{
    ChatRecord, DEFAULT_CHAT_TITLE, MessageRecord, NewChat, NewMessage, Sender, UserRecord,
};

/// Account lookup used by the auth boundary.
pub trait UserStore: Send + Sync {
    /// Finds the account for `email`, creating it on first use.
    fn sign_in(&self, email: &str) -> StorageResult<UserRecord>;
    fn get_user(&self, user_id: UserId) -> StorageResult<Option<UserRecord>>;
}

/// Chat rows, always scoped to the requesting owner.
pub trait ChatStore: Send + Sync {
    fn list_chats(&self, owner: UserId) -> StorageResult<Vec<ChatRecord>>;
    fn create_chat(&self, owner: UserId, input: NewChat) -> StorageResult<ChatRecord>;
    fn get_chat(&self, owner: UserId, chat_id: ChatId) -> StorageResult<Option<ChatRecord>>;
    fn rename_chat(&self, owner: UserId, chat_id: ChatId, title: &str)
    -> StorageResult<ChatRecord>;
    /// Removes the chat and, through the foreign key cascade, all of its messages.
    fn delete_chat(&self, owner: UserId, chat_id: ChatId) -> StorageResult<()>;
}

/// Append-only message rows. There is deliberately no update operation.
pub trait MessageStore: Send + Sync {
    fn list_messages(&self, owner: UserId, chat_id: ChatId) -> StorageResult<Vec<MessageRecord>>;
    fn append_message(
        &self,
        owner: UserId,
        chat_id: ChatId,
        input: NewMessage,
    ) -> StorageResult<MessageRecord>;
}

pub trait Storage: UserStore + ChatStore + MessageStore {}

impl<T> Storage for T where T: UserStore + ChatStore + MessageStore {}
