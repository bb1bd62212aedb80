use std::future::Future;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use std::time::{SystemTime, UNIX_EPOCH};

use snafu::{OptionExt, ResultExt};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Connection, FromRow, SqliteConnection, SqlitePool};

use super::error::{
    CreateSqliteDirectorySnafu, SqliteConnectOptionsSnafu, SqliteConnectSnafu, SqliteMigrateSnafu,
    SqlitePragmaSnafu, StorageResult,
};
use super::error::{
    InvalidInputSnafu, InvariantViolationSnafu, NotFoundSnafu, SqliteQuerySnafu,
    SqliteRuntimeInitSnafu, SqliteThreadSpawnSnafu,
};
use super::ids::{ChatId, MessageId, UserId};
use super::types::{
    ChatRecord, DEFAULT_CHAT_TITLE, MessageRecord, NewChat, NewMessage, Sender, UserRecord,
};
use super::{ChatStore, MessageStore, UserStore};

const CHAT_COLUMNS: &str = "id, user_id, title, created_at, updated_at";
const MESSAGE_COLUMNS: &str = "id, chat_id, content, sender, created_at";

/// SQLite-backed store that plays the role of the hosted backend: it owns ids,
/// timestamps, per-user row scoping and cascading deletes.
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
    database_url: String,
}

impl SqliteStorage {
    pub async fn open(database_location: &str) -> StorageResult<Self> {
        ensure_database_directory(database_location)?;

        let database_url = normalize_database_url(database_location);
        let connect_options = SqliteConnectOptions::from_str(&database_url)
            .context(SqliteConnectOptionsSnafu {
                stage: "sqlite-open-parse-url",
                database_url: database_url.clone(),
            })?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_millis(5_000));

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(connect_options)
            .await
            .context(SqliteConnectSnafu {
                stage: "sqlite-open-connect",
                database_url: database_url.clone(),
            })?;

        // Explicit PRAGMA writes make bootstrap behavior deterministic for QA checks.
        let _: String = sqlx::query_scalar("PRAGMA journal_mode = WAL;")
            .fetch_one(&pool)
            .await
            .context(SqlitePragmaSnafu {
                stage: "sqlite-open-pragma-journal-mode",
                pragma: "journal_mode",
            })?;
        sqlx::query("PRAGMA foreign_keys = ON;")
            .execute(&pool)
            .await
            .context(SqlitePragmaSnafu {
                stage: "sqlite-open-pragma-foreign-keys",
                pragma: "foreign_keys",
            })?;
        sqlx::query("PRAGMA busy_timeout = 5000;")
            .execute(&pool)
            .await
            .context(SqlitePragmaSnafu {
                stage: "sqlite-open-pragma-busy-timeout",
                pragma: "busy_timeout",
            })?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context(SqliteMigrateSnafu {
                stage: "sqlite-open-migrate",
            })?;

        tracing::info!("opened sqlite storage at {database_url}");
        Ok(Self { pool, database_url })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    fn run_db_call<T, F>(&self, stage: &'static str, op: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: Future<Output = StorageResult<T>> + Send + 'static,
    {
        // Store traits are sync, so each call executes on a dedicated worker thread
        // with its own current-thread runtime to avoid nested-runtime blocking panics.
        let worker = std::thread::Builder::new()
            .name(format!("sqlite-store-{stage}"))
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .context(SqliteRuntimeInitSnafu {
                        stage: "sqlite-store-runtime-build",
                    })?;
                runtime.block_on(op)
            })
            .context(SqliteThreadSpawnSnafu {
                stage: "sqlite-store-spawn-worker",
            })?;

        match worker.join() {
            Ok(result) => result,
            Err(_) => InvariantViolationSnafu {
                stage,
                details: "sqlite storage worker thread panicked".to_string(),
            }
            .fail(),
        }
    }
}

impl UserStore for SqliteStorage {
    fn sign_in(&self, email: &str) -> StorageResult<UserRecord> {
        let email = normalize_email(email);
        if email.is_empty() {
            return InvalidInputSnafu {
                stage: "user-sign-in-validate",
                entity: "user",
                details: "email must not be empty".to_string(),
            }
            .fail();
        }

        let database_url = self.database_url.clone();
        self.run_db_call("user-sign-in", async move {
            let mut connection = connect_store_connection(&database_url, "user-sign-in-connect").await?;

            // First sign-in provisions the account; later ones resolve the same row.
            sqlx::query("INSERT OR IGNORE INTO users (id, email, created_at) VALUES (?, ?, ?)")
                .bind(UserId::new_v7().to_string())
                .bind(email.clone())
                .bind(unix_timestamp_millis())
                .execute(&mut connection)
                .await
                .context(SqliteQuerySnafu {
                    stage: "user-sign-in-insert",
                })?;

            let row = sqlx::query_as::<_, UserRow>(
                "SELECT id, email, created_at FROM users WHERE email = ?",
            )
            .bind(email.clone())
            .fetch_optional(&mut connection)
            .await
            .context(SqliteQuerySnafu {
                stage: "user-sign-in-load",
            })?
            .context(NotFoundSnafu {
                stage: "user-sign-in-load-missing",
                entity: "user",
                id: email,
            })?;

            user_row_to_record(row)
        })
    }

    fn get_user(&self, user_id: UserId) -> StorageResult<Option<UserRecord>> {
        let database_url = self.database_url.clone();
        self.run_db_call("user-get", async move {
            let mut connection = connect_store_connection(&database_url, "user-get-connect").await?;
            let row = sqlx::query_as::<_, UserRow>(
                "SELECT id, email, created_at FROM users WHERE id = ?",
            )
            .bind(user_id.to_string())
            .fetch_optional(&mut connection)
            .await
            .context(SqliteQuerySnafu {
                stage: "user-get-query",
            })?;

            row.map(user_row_to_record).transpose()
        })
    }
}

impl ChatStore for SqliteStorage {
    fn list_chats(&self, owner: UserId) -> StorageResult<Vec<ChatRecord>> {
        let database_url = self.database_url.clone();
        self.run_db_call("chat-list", async move {
            let mut connection = connect_store_connection(&database_url, "chat-list-connect").await?;
            let rows = sqlx::query_as::<_, ChatRow>(&format!(
                "SELECT {CHAT_COLUMNS} FROM chats WHERE user_id = ? ORDER BY updated_at DESC, rowid DESC"
            ))
            .bind(owner.to_string())
            .fetch_all(&mut connection)
            .await
            .context(SqliteQuerySnafu {
                stage: "chat-list-query",
            })?;

            rows.into_iter().map(chat_row_to_record).collect()
        })
    }

    fn create_chat(&self, owner: UserId, input: NewChat) -> StorageResult<ChatRecord> {
        let database_url = self.database_url.clone();
        self.run_db_call("chat-create", async move {
            let mut connection = connect_store_connection(&database_url, "chat-create-connect").await?;
            ensure_user_exists(&mut connection, owner, "chat-create-ensure-owner").await?;

            let title = if input.title.trim().is_empty() {
                DEFAULT_CHAT_TITLE.to_string()
            } else {
                input.title
            };
            let chat_id = ChatId::new_v7();
            let now = unix_timestamp_millis();

            sqlx::query(
                "INSERT INTO chats (id, user_id, title, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(chat_id.to_string())
            .bind(owner.to_string())
            .bind(title.clone())
            .bind(now)
            .bind(now)
            .execute(&mut connection)
            .await
            .context(SqliteQuerySnafu {
                stage: "chat-create-insert",
            })?;

            let now = i64_to_u64(now, "chat-create-timestamp")?;
            Ok(ChatRecord {
                id: chat_id,
                owner_id: owner,
                title,
                created_at_unix_ms: now,
                updated_at_unix_ms: now,
            })
        })
    }

    fn get_chat(&self, owner: UserId, chat_id: ChatId) -> StorageResult<Option<ChatRecord>> {
        let database_url = self.database_url.clone();
        self.run_db_call("chat-get", async move {
            let mut connection = connect_store_connection(&database_url, "chat-get-connect").await?;
            let row = load_owned_chat(&mut connection, owner, chat_id, "chat-get-query").await?;
            row.map(chat_row_to_record).transpose()
        })
    }

    fn rename_chat(
        &self,
        owner: UserId,
        chat_id: ChatId,
        title: &str,
    ) -> StorageResult<ChatRecord> {
        let title = title.trim().to_string();
        if title.is_empty() {
            return InvalidInputSnafu {
                stage: "chat-rename-validate",
                entity: "chat",
                details: "title must not be empty".to_string(),
            }
            .fail();
        }

        let database_url = self.database_url.clone();
        self.run_db_call("chat-rename", async move {
            let mut connection = connect_store_connection(&database_url, "chat-rename-connect").await?;
            let update_result = sqlx::query(
                "UPDATE chats SET title = ?, updated_at = ? WHERE id = ? AND user_id = ?",
            )
            .bind(title)
            .bind(unix_timestamp_millis())
            .bind(chat_id.to_string())
            .bind(owner.to_string())
            .execute(&mut connection)
            .await
            .context(SqliteQuerySnafu {
                stage: "chat-rename-apply",
            })?;

            if update_result.rows_affected() == 0 {
                return NotFoundSnafu {
                    stage: "chat-rename-missing",
                    entity: "chat",
                    id: chat_id.to_string(),
                }
                .fail();
            }

            let row = load_owned_chat(&mut connection, owner, chat_id, "chat-rename-load")
                .await?
                .context(NotFoundSnafu {
                    stage: "chat-rename-load-missing",
                    entity: "chat",
                    id: chat_id.to_string(),
                })?;

            chat_row_to_record(row)
        })
    }

    fn delete_chat(&self, owner: UserId, chat_id: ChatId) -> StorageResult<()> {
        let database_url = self.database_url.clone();
        self.run_db_call("chat-delete", async move {
            let mut connection = connect_store_connection(&database_url, "chat-delete-connect").await?;
            let result = sqlx::query("DELETE FROM chats WHERE id = ? AND user_id = ?")
                .bind(chat_id.to_string())
                .bind(owner.to_string())
                .execute(&mut connection)
                .await
                .context(SqliteQuerySnafu {
                    stage: "chat-delete-apply",
                })?;

            if result.rows_affected() == 0 {
                return NotFoundSnafu {
                    stage: "chat-delete-missing",
                    entity: "chat",
                    id: chat_id.to_string(),
                }
                .fail();
            }

            Ok(())
        })
    }
}

impl MessageStore for SqliteStorage {
    fn list_messages(&self, owner: UserId, chat_id: ChatId) -> StorageResult<Vec<MessageRecord>> {
        let database_url = self.database_url.clone();
        self.run_db_call("message-list", async move {
            let mut connection = connect_store_connection(&database_url, "message-list-connect").await?;
            ensure_chat_owned(&mut connection, owner, chat_id, "message-list-ensure-chat").await?;

            // rowid breaks ties between messages stamped in the same millisecond.
            let rows = sqlx::query_as::<_, MessageRow>(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE chat_id = ? ORDER BY created_at ASC, rowid ASC"
            ))
            .bind(chat_id.to_string())
            .fetch_all(&mut connection)
            .await
            .context(SqliteQuerySnafu {
                stage: "message-list-query",
            })?;

            rows.into_iter().map(message_row_to_record).collect()
        })
    }

    fn append_message(
        &self,
        owner: UserId,
        chat_id: ChatId,
        input: NewMessage,
    ) -> StorageResult<MessageRecord> {
        let database_url = self.database_url.clone();
        self.run_db_call("message-append", async move {
            let mut connection = connect_store_connection(&database_url, "message-append-connect").await?;
            let mut tx = connection.begin().await.context(SqliteQuerySnafu {
                stage: "message-append-begin",
            })?;

            let owned = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM chats WHERE id = ? AND user_id = ?",
            )
            .bind(chat_id.to_string())
            .bind(owner.to_string())
            .fetch_one(&mut *tx)
            .await
            .context(SqliteQuerySnafu {
                stage: "message-append-ensure-chat",
            })?;
            if owned == 0 {
                return NotFoundSnafu {
                    stage: "message-append-chat-missing",
                    entity: "chat",
                    id: chat_id.to_string(),
                }
                .fail();
            }

            let message_id = MessageId::new_v7();
            let now = unix_timestamp_millis();

            sqlx::query(
                "INSERT INTO messages (id, chat_id, content, sender, created_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(message_id.to_string())
            .bind(chat_id.to_string())
            .bind(input.content.clone())
            .bind(input.sender.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await
            .context(SqliteQuerySnafu {
                stage: "message-append-insert",
            })?;

            // Appending counts as activity so the chat rises to the top of the list.
            sqlx::query("UPDATE chats SET updated_at = MAX(updated_at, ?) WHERE id = ?")
                .bind(now)
                .bind(chat_id.to_string())
                .execute(&mut *tx)
                .await
                .context(SqliteQuerySnafu {
                    stage: "message-append-touch-chat",
                })?;

            tx.commit().await.context(SqliteQuerySnafu {
                stage: "message-append-commit",
            })?;

            Ok(MessageRecord {
                id: message_id,
                chat_id,
                content: input.content,
                sender: input.sender,
                created_at_unix_ms: i64_to_u64(now, "message-append-created-at")?,
            })
        })
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: String,
    email: String,
    created_at: i64,
}

#[derive(Debug, FromRow)]
struct ChatRow {
    id: String,
    user_id: String,
    title: String,
    created_at: i64,
    updated_at: i64,
}

#[derive(Debug, FromRow)]
struct MessageRow {
    id: String,
    chat_id: String,
    content: String,
    sender: String,
    created_at: i64,
}

fn user_row_to_record(row: UserRow) -> StorageResult<UserRecord> {
    Ok(UserRecord {
        id: UserId::parse(&row.id)?,
        email: row.email,
        created_at_unix_ms: i64_to_u64(row.created_at, "user-row-created-at")?,
    })
}

fn chat_row_to_record(row: ChatRow) -> StorageResult<ChatRecord> {
    Ok(ChatRecord {
        id: ChatId::parse(&row.id)?,
        owner_id: UserId::parse(&row.user_id)?,
        title: row.title,
        created_at_unix_ms: i64_to_u64(row.created_at, "chat-row-created-at")?,
        updated_at_unix_ms: i64_to_u64(row.updated_at, "chat-row-updated-at")?,
    })
}

fn message_row_to_record(row: MessageRow) -> StorageResult<MessageRecord> {
    Ok(MessageRecord {
        id: MessageId::parse(&row.id)?,
        chat_id: ChatId::parse(&row.chat_id)?,
        content: row.content,
        sender: sender_from_sql(&row.sender)?,
        created_at_unix_ms: i64_to_u64(row.created_at, "message-row-created-at")?,
    })
}

async fn load_owned_chat(
    connection: &mut SqliteConnection,
    owner: UserId,
    chat_id: ChatId,
    stage: &'static str,
) -> StorageResult<Option<ChatRow>> {
    sqlx::query_as::<_, ChatRow>(&format!(
        "SELECT {CHAT_COLUMNS} FROM chats WHERE id = ? AND user_id = ?"
    ))
    .bind(chat_id.to_string())
    .bind(owner.to_string())
    .fetch_optional(&mut *connection)
    .await
    .context(SqliteQuerySnafu { stage })
}

async fn ensure_chat_owned(
    connection: &mut SqliteConnection,
    owner: UserId,
    chat_id: ChatId,
    stage: &'static str,
) -> StorageResult<()> {
    // Foreign chats look exactly like missing ones, so ids never leak across accounts.
    if load_owned_chat(connection, owner, chat_id, stage).await?.is_none() {
        return NotFoundSnafu {
            stage,
            entity: "chat",
            id: chat_id.to_string(),
        }
        .fail();
    }

    Ok(())
}

async fn ensure_user_exists(
    connection: &mut SqliteConnection,
    user_id: UserId,
    stage: &'static str,
) -> StorageResult<()> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE id = ?")
        .bind(user_id.to_string())
        .fetch_one(&mut *connection)
        .await
        .context(SqliteQuerySnafu { stage })?;

    if count == 0 {
        return NotFoundSnafu {
            stage,
            entity: "user",
            id: user_id.to_string(),
        }
        .fail();
    }

    Ok(())
}

async fn connect_store_connection(
    database_url: &str,
    stage: &'static str,
) -> StorageResult<SqliteConnection> {
    let mut connection =
        SqliteConnection::connect(database_url)
            .await
            .context(SqliteConnectSnafu {
                stage,
                database_url: database_url.to_string(),
            })?;

    sqlx::query("PRAGMA foreign_keys = ON;")
        .execute(&mut connection)
        .await
        .context(SqlitePragmaSnafu {
            stage: "sqlite-store-pragma-foreign-keys",
            pragma: "foreign_keys",
        })?;
    sqlx::query("PRAGMA busy_timeout = 5000;")
        .execute(&mut connection)
        .await
        .context(SqlitePragmaSnafu {
            stage: "sqlite-store-pragma-busy-timeout",
            pragma: "busy_timeout",
        })?;

    Ok(connection)
}

fn sender_from_sql(raw: &str) -> StorageResult<Sender> {
    match raw {
        "user" => Ok(Sender::User),
        "bot" => Ok(Sender::Bot),
        _ => InvariantViolationSnafu {
            stage: "message-row-sender",
            details: format!("unknown message sender '{raw}'"),
        }
        .fail(),
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn unix_timestamp_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0_i64, |duration| duration.as_millis() as i64)
}

fn i64_to_u64(value: i64, stage: &'static str) -> StorageResult<u64> {
    value
        .try_into()
        .map_err(|_| super::error::StorageError::InvariantViolation {
            stage,
            details: format!("negative sqlite integer '{value}' cannot map to u64"),
        })
}

fn ensure_database_directory(database_location: &str) -> StorageResult<()> {
    if database_location.starts_with("sqlite:") {
        return Ok(());
    }

    let path = Path::new(database_location);
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).context(CreateSqliteDirectorySnafu {
            stage: "sqlite-open-create-directory",
            path: parent.display().to_string(),
        })?;
    }

    Ok(())
}

fn normalize_database_url(database_location: &str) -> String {
    if database_location.starts_with("sqlite:") {
        return database_location.to_string();
    }

    format!("sqlite://{database_location}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StorageError;

    struct Fixture {
        // Held so the database directory outlives the storage handle.
        _dir: tempfile::TempDir,
        storage: SqliteStorage,
    }

    async fn open_fixture() -> Fixture {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("nested").join("parley.db");
        let storage = SqliteStorage::open(&path.display().to_string())
            .await
            .expect("open sqlite storage");
        Fixture { _dir: dir, storage }
    }

    #[tokio::test]
    async fn sign_in_is_idempotent_and_case_insensitive() {
        let fixture = open_fixture().await;
        let first = fixture.storage.sign_in("  Ada@Example.com ").expect("sign in");
        let second = fixture.storage.sign_in("ada@example.com").expect("sign in again");

        assert_eq!(first.id, second.id);
        assert_eq!(first.email, "ada@example.com");
        assert_eq!(
            fixture.storage.get_user(first.id).expect("get user"),
            Some(first)
        );
        assert!(matches!(
            fixture.storage.sign_in("   "),
            Err(StorageError::InvalidInput { .. })
        ));
    }

    #[tokio::test]
    async fn chats_list_most_recently_updated_first() {
        let fixture = open_fixture().await;
        let user = fixture.storage.sign_in("ada@example.com").expect("sign in");

        let older = fixture
            .storage
            .create_chat(user.id, NewChat::new("older"))
            .expect("create older");
        std::thread::sleep(Duration::from_millis(5));
        let newer = fixture
            .storage
            .create_chat(user.id, NewChat::new("   "))
            .expect("create newer");
        assert_eq!(newer.title, DEFAULT_CHAT_TITLE);

        let listed = fixture.storage.list_chats(user.id).expect("list chats");
        let ids = listed.iter().map(|chat| chat.id).collect::<Vec<_>>();
        assert_eq!(ids, vec![newer.id, older.id]);

        std::thread::sleep(Duration::from_millis(5));
        let renamed = fixture
            .storage
            .rename_chat(user.id, older.id, "  renamed  ")
            .expect("rename");
        assert_eq!(renamed.title, "renamed");
        assert!(renamed.updated_at_unix_ms > older.updated_at_unix_ms);

        let listed = fixture.storage.list_chats(user.id).expect("list chats");
        assert_eq!(listed.first().map(|chat| chat.id), Some(older.id));
    }

    #[tokio::test]
    async fn messages_keep_insertion_order_and_touch_chat() {
        let fixture = open_fixture().await;
        let user = fixture.storage.sign_in("ada@example.com").expect("sign in");
        let chat = fixture
            .storage
            .create_chat(user.id, NewChat::default())
            .expect("create chat");

        for index in 0..6 {
            let input = if index % 2 == 0 {
                NewMessage::user(format!("question {index}"))
            } else {
                NewMessage::bot(format!("answer {index}"))
            };
            fixture
                .storage
                .append_message(user.id, chat.id, input)
                .expect("append");
        }

        let messages = fixture
            .storage
            .list_messages(user.id, chat.id)
            .expect("list messages");
        let contents = messages
            .iter()
            .map(|message| message.content.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            contents,
            vec![
                "question 0",
                "answer 1",
                "question 2",
                "answer 3",
                "question 4",
                "answer 5"
            ]
        );
        assert!(
            messages
                .windows(2)
                .all(|pair| pair[0].created_at_unix_ms <= pair[1].created_at_unix_ms)
        );
        assert_eq!(messages[1].sender, Sender::Bot);

        let touched = fixture
            .storage
            .get_chat(user.id, chat.id)
            .expect("get chat")
            .expect("chat exists");
        assert!(touched.updated_at_unix_ms >= messages[5].created_at_unix_ms);
    }

    #[tokio::test]
    async fn deleting_a_chat_cascades_to_messages() {
        let fixture = open_fixture().await;
        let user = fixture.storage.sign_in("ada@example.com").expect("sign in");
        let chat = fixture
            .storage
            .create_chat(user.id, NewChat::default())
            .expect("create chat");
        fixture
            .storage
            .append_message(user.id, chat.id, NewMessage::user("hello"))
            .expect("append");

        fixture
            .storage
            .delete_chat(user.id, chat.id)
            .expect("delete chat");

        let orphaned = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages")
            .fetch_one(fixture.storage.pool())
            .await
            .expect("count messages");
        assert_eq!(orphaned, 0);
        assert!(matches!(
            fixture.storage.delete_chat(user.id, chat.id),
            Err(StorageError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn chats_are_invisible_to_other_owners() {
        let fixture = open_fixture().await;
        let owner = fixture.storage.sign_in("owner@example.com").expect("owner");
        let intruder = fixture
            .storage
            .sign_in("intruder@example.com")
            .expect("intruder");
        let chat = fixture
            .storage
            .create_chat(owner.id, NewChat::new("private"))
            .expect("create chat");

        assert!(fixture.storage.list_chats(intruder.id).expect("list").is_empty());
        assert_eq!(fixture.storage.get_chat(intruder.id, chat.id).expect("get"), None);
        assert!(matches!(
            fixture.storage.rename_chat(intruder.id, chat.id, "mine now"),
            Err(StorageError::NotFound { .. })
        ));
        assert!(matches!(
            fixture
                .storage
                .append_message(intruder.id, chat.id, NewMessage::user("hi")),
            Err(StorageError::NotFound { .. })
        ));
        assert!(matches!(
            fixture.storage.list_messages(intruder.id, chat.id),
            Err(StorageError::NotFound { .. })
        ));
        assert!(matches!(
            fixture.storage.delete_chat(intruder.id, chat.id),
            Err(StorageError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn blank_rename_is_rejected_before_touching_sqlite() {
        let fixture = open_fixture().await;
        let user = fixture.storage.sign_in("ada@example.com").expect("sign in");
        let chat = fixture
            .storage
            .create_chat(user.id, NewChat::new("keep me"))
            .expect("create chat");

        let error = fixture
            .storage
            .rename_chat(user.id, chat.id, " \t ")
            .expect_err("blank title must fail");
        assert_eq!(error.stage(), "chat-rename-validate");

        let reloaded = fixture
            .storage
            .get_chat(user.id, chat.id)
            .expect("get")
            .expect("exists");
        assert_eq!(reloaded, chat);
    }
}
