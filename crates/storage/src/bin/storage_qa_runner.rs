use std::collections::HashSet;
use std::env;
use std::str::FromStr;

use snafu::{OptionExt, ResultExt, Snafu};

use parley_storage::{
    ChatId, ChatStore, DEFAULT_CHAT_TITLE, MessageId, MessageStore, NewChat, NewMessage,
    SqliteStorage, StorageError, UserId, UserStore,
};

#[derive(Debug, Clone)]
struct RunnerArgs {
    scenario: Scenario,
    db_path: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum Scenario {
    IdRoundtrip,
    IdInvalid,
    SchemaInit,
    ChatCrud,
    MessageOrder,
    CascadeDelete,
    OwnerGuard,
    All,
}

impl Scenario {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "id_roundtrip" => Some(Self::IdRoundtrip),
            "id_invalid" => Some(Self::IdInvalid),
            "schema_init" => Some(Self::SchemaInit),
            "chat_crud" => Some(Self::ChatCrud),
            "message_order" => Some(Self::MessageOrder),
            "cascade_delete" => Some(Self::CascadeDelete),
            "owner_guard" => Some(Self::OwnerGuard),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::IdRoundtrip => "id_roundtrip",
            Self::IdInvalid => "id_invalid",
            Self::SchemaInit => "schema_init",
            Self::ChatCrud => "chat_crud",
            Self::MessageOrder => "message_order",
            Self::CascadeDelete => "cascade_delete",
            Self::OwnerGuard => "owner_guard",
            Self::All => "all",
        }
    }
}

#[derive(Debug, Snafu)]
enum RunnerError {
    #[snafu(display("missing required --scenario argument"))]
    MissingScenario { stage: &'static str },
    #[snafu(display("missing value for argument '{arg}'"))]
    MissingArgumentValue {
        stage: &'static str,
        arg: &'static str,
    },
    #[snafu(display("unknown scenario '{raw}'"))]
    UnknownScenario { stage: &'static str, raw: String },
    #[snafu(display("unknown argument '{raw}'"))]
    UnknownArgument { stage: &'static str, raw: String },
    #[snafu(display("storage validation failed: {source}"))]
    StorageValidation {
        stage: &'static str,
        source: StorageError,
    },
    #[snafu(display("missing required --db argument for scenario '{scenario}'"))]
    MissingDbPath {
        stage: &'static str,
        scenario: &'static str,
    },
    #[snafu(display("sqlite query failed: {source}"))]
    SqliteQuery {
        stage: &'static str,
        source: sqlx::Error,
    },
    #[snafu(display("scenario '{scenario}' failed: {reason}"))]
    ScenarioFailed {
        stage: &'static str,
        scenario: &'static str,
        reason: String,
    },
}

type RunnerResult<T> = Result<T, RunnerError>;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(error) = run().await {
        println!("runner_ok=false");
        eprintln!("runner_error={error}");
        std::process::exit(1);
    }
}

async fn run() -> RunnerResult<()> {
    let args = parse_args(env::args().skip(1))?;
    println!("scenario={}", args.scenario.name());
    if let Some(db_path) = args.db_path.as_deref() {
        println!("db_path={db_path}");
    }

    match args.scenario {
        Scenario::IdRoundtrip => run_id_roundtrip(),
        Scenario::IdInvalid => run_id_invalid(),
        Scenario::SchemaInit => run_schema_init(require_db_path(&args, "schema_init")?).await,
        Scenario::ChatCrud => run_chat_crud(require_db_path(&args, "chat_crud")?).await,
        Scenario::MessageOrder => {
            run_message_order(require_db_path(&args, "message_order")?).await
        }
        Scenario::CascadeDelete => {
            run_cascade_delete(require_db_path(&args, "cascade_delete")?).await
        }
        Scenario::OwnerGuard => run_owner_guard(require_db_path(&args, "owner_guard")?).await,
        Scenario::All => run_all(args.db_path.as_deref()).await,
    }
}

fn parse_args(args: impl IntoIterator<Item = String>) -> RunnerResult<RunnerArgs> {
    let mut scenario = None;
    let mut db_path = None;
    let mut pending = args.into_iter();

    // Unknown flags fail loudly so CI never silently runs the wrong scenario.
    while let Some(argument) = pending.next() {
        match argument.as_str() {
            "--scenario" => {
                let value = pending.next().context(MissingArgumentValueSnafu {
                    stage: "parse-args-scenario-value",
                    arg: "--scenario",
                })?;

                let parsed = Scenario::parse(&value).context(UnknownScenarioSnafu {
                    stage: "parse-args-scenario",
                    raw: value,
                })?;
                scenario = Some(parsed);
            }
            "--db" => {
                let value = pending.next().context(MissingArgumentValueSnafu {
                    stage: "parse-args-db-value",
                    arg: "--db",
                })?;
                db_path = Some(value);
            }
            _ => {
                return UnknownArgumentSnafu {
                    stage: "parse-args",
                    raw: argument,
                }
                .fail();
            }
        }
    }

    Ok(RunnerArgs {
        scenario: scenario.context(MissingScenarioSnafu {
            stage: "parse-args-scenario-required",
        })?,
        db_path,
    })
}

fn run_id_roundtrip() -> RunnerResult<()> {
    assert_id_roundtrip("user_id", UserId::new_v7())?;
    assert_id_roundtrip("chat_id", ChatId::new_v7())?;
    assert_id_roundtrip("message_id", MessageId::new_v7())?;
    println!("runner_ok=true");
    Ok(())
}

fn run_id_invalid() -> RunnerResult<()> {
    let invalid_input = "not-a-valid-uuid";
    let invalid_id_error = invalid_input_is_rejected::<UserId>(invalid_input)
        && invalid_input_is_rejected::<ChatId>(invalid_input)
        && invalid_input_is_rejected::<MessageId>(invalid_input);

    println!("invalid_id_error={invalid_id_error}");
    if !invalid_id_error {
        return ScenarioFailedSnafu {
            stage: "scenario-id-invalid",
            scenario: "id_invalid",
            reason: "at least one ID wrapper accepted malformed UUID input".to_string(),
        }
        .fail();
    }

    println!("runner_ok=true");
    Ok(())
}

async fn run_all(db_path: Option<&str>) -> RunnerResult<()> {
    run_id_roundtrip()?;
    run_id_invalid()?;

    if let Some(path) = db_path {
        run_schema_init(path).await?;
        run_chat_crud(path).await?;
        run_message_order(path).await?;
        run_cascade_delete(path).await?;
        run_owner_guard(path).await?;
    }

    println!("all_passed=true");
    Ok(())
}

async fn open_storage(db_path: &str, stage: &'static str) -> RunnerResult<SqliteStorage> {
    SqliteStorage::open(db_path)
        .await
        .context(StorageValidationSnafu { stage })
}

async fn run_schema_init(db_path: &str) -> RunnerResult<()> {
    let storage = open_storage(db_path, "scenario-schema-init-open").await?;
    let pool = storage.pool();

    let discovered_tables = sqlx::query_scalar::<_, String>(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name IN ('users', 'chats', 'messages')",
    )
    .fetch_all(pool)
    .await
    .context(SqliteQuerySnafu {
        stage: "scenario-schema-init-list-tables",
    })?;

    let available_tables: HashSet<String> = discovered_tables.into_iter().collect();
    let schema_ok = ["users", "chats", "messages"]
        .iter()
        .all(|table_name| available_tables.contains(*table_name));

    let journal_mode = sqlx::query_scalar::<_, String>("PRAGMA journal_mode;")
        .fetch_one(pool)
        .await
        .context(SqliteQuerySnafu {
            stage: "scenario-schema-init-journal-mode",
        })?
        .to_lowercase();
    let foreign_keys = sqlx::query_scalar::<_, i64>("PRAGMA foreign_keys;")
        .fetch_one(pool)
        .await
        .context(SqliteQuerySnafu {
            stage: "scenario-schema-init-foreign-keys",
        })?;

    println!("schema_ok={schema_ok}");
    println!("journal_mode={journal_mode}");
    println!("foreign_keys={foreign_keys}");

    ensure(schema_ok, "schema_init", "expected migration tables are missing")?;
    ensure(
        journal_mode == "wal",
        "schema_init",
        &format!("expected journal_mode=wal but was {journal_mode}"),
    )?;
    ensure(
        foreign_keys == 1,
        "schema_init",
        &format!("expected foreign_keys=1 but was {foreign_keys}"),
    )?;

    println!("runner_ok=true");
    Ok(())
}

async fn run_chat_crud(db_path: &str) -> RunnerResult<()> {
    let storage = open_storage(db_path, "scenario-chat-crud-open").await?;
    let user = storage
        .sign_in("qa-chat-crud@parley.local")
        .context(StorageValidationSnafu {
            stage: "scenario-chat-crud-sign-in",
        })?;

    let first = storage
        .create_chat(user.id, NewChat::default())
        .context(StorageValidationSnafu {
            stage: "scenario-chat-crud-create-first",
        })?;
    let second = storage
        .create_chat(user.id, NewChat::new("second"))
        .context(StorageValidationSnafu {
            stage: "scenario-chat-crud-create-second",
        })?;
    let renamed = storage
        .rename_chat(user.id, first.id, "renamed-first")
        .context(StorageValidationSnafu {
            stage: "scenario-chat-crud-rename-first",
        })?;
    storage
        .delete_chat(user.id, second.id)
        .context(StorageValidationSnafu {
            stage: "scenario-chat-crud-delete-second",
        })?;
    let listed = storage.list_chats(user.id).context(StorageValidationSnafu {
        stage: "scenario-chat-crud-list",
    })?;

    let default_title_applied = first.title == DEFAULT_CHAT_TITLE;
    let rename_applied = listed
        .iter()
        .any(|chat| chat.id == renamed.id && chat.title == "renamed-first");
    let delete_applied = listed.iter().all(|chat| chat.id != second.id);
    let list_order_ok = listed
        .windows(2)
        .all(|pair| pair[0].updated_at_unix_ms >= pair[1].updated_at_unix_ms);

    println!("default_title_applied={default_title_applied}");
    println!("rename_applied={rename_applied}");
    println!("delete_applied={delete_applied}");
    println!("list_order_ok={list_order_ok}");

    ensure(
        default_title_applied,
        "chat_crud",
        "chat created without a title did not get the default title",
    )?;
    ensure(rename_applied, "chat_crud", "renamed title not visible in listing")?;
    ensure(delete_applied, "chat_crud", "deleted chat still visible in listing")?;
    ensure(list_order_ok, "chat_crud", "chat listing is not updated_at DESC")?;

    println!("runner_ok=true");
    Ok(())
}

async fn run_message_order(db_path: &str) -> RunnerResult<()> {
    let storage = open_storage(db_path, "scenario-message-order-open").await?;
    let user = storage
        .sign_in("qa-message-order@parley.local")
        .context(StorageValidationSnafu {
            stage: "scenario-message-order-sign-in",
        })?;
    let chat = storage
        .create_chat(user.id, NewChat::new("ordering"))
        .context(StorageValidationSnafu {
            stage: "scenario-message-order-create-chat",
        })?;

    let expected = (0..10).map(|index| format!("m{index}")).collect::<Vec<_>>();
    for (index, content) in expected.iter().enumerate() {
        let input = if index % 2 == 0 {
            NewMessage::user(content.clone())
        } else {
            NewMessage::bot(content.clone())
        };
        storage
            .append_message(user.id, chat.id, input)
            .context(StorageValidationSnafu {
                stage: "scenario-message-order-append",
            })?;
    }

    let listed = storage
        .list_messages(user.id, chat.id)
        .context(StorageValidationSnafu {
            stage: "scenario-message-order-list",
        })?;
    let actual = listed
        .iter()
        .map(|message| message.content.clone())
        .collect::<Vec<_>>();
    let order_ok = actual == expected
        && listed
            .windows(2)
            .all(|pair| pair[0].created_at_unix_ms <= pair[1].created_at_unix_ms);

    println!("message_count={}", listed.len());
    println!("message_order_ok={order_ok}");
    ensure(
        order_ok,
        "message_order",
        "messages are not returned in creation order",
    )?;

    println!("runner_ok=true");
    Ok(())
}

async fn run_cascade_delete(db_path: &str) -> RunnerResult<()> {
    let storage = open_storage(db_path, "scenario-cascade-delete-open").await?;
    let user = storage
        .sign_in("qa-cascade@parley.local")
        .context(StorageValidationSnafu {
            stage: "scenario-cascade-delete-sign-in",
        })?;
    let chat = storage
        .create_chat(user.id, NewChat::new("cascade"))
        .context(StorageValidationSnafu {
            stage: "scenario-cascade-delete-create-chat",
        })?;
    storage
        .append_message(user.id, chat.id, NewMessage::user("doomed"))
        .context(StorageValidationSnafu {
            stage: "scenario-cascade-delete-append",
        })?;
    storage
        .delete_chat(user.id, chat.id)
        .context(StorageValidationSnafu {
            stage: "scenario-cascade-delete-delete",
        })?;

    let remaining = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages WHERE chat_id = ?")
        .bind(chat.id.to_string())
        .fetch_one(storage.pool())
        .await
        .context(SqliteQuerySnafu {
            stage: "scenario-cascade-delete-count",
        })?;

    println!("remaining_messages={remaining}");
    ensure(
        remaining == 0,
        "cascade_delete",
        "messages survived deletion of their chat",
    )?;

    println!("runner_ok=true");
    Ok(())
}

async fn run_owner_guard(db_path: &str) -> RunnerResult<()> {
    let storage = open_storage(db_path, "scenario-owner-guard-open").await?;
    let owner = storage
        .sign_in("qa-owner@parley.local")
        .context(StorageValidationSnafu {
            stage: "scenario-owner-guard-sign-in-owner",
        })?;
    let intruder = storage
        .sign_in("qa-intruder@parley.local")
        .context(StorageValidationSnafu {
            stage: "scenario-owner-guard-sign-in-intruder",
        })?;
    let chat = storage
        .create_chat(owner.id, NewChat::new("private"))
        .context(StorageValidationSnafu {
            stage: "scenario-owner-guard-create-chat",
        })?;

    let read_blocked = matches!(
        storage.list_messages(intruder.id, chat.id),
        Err(StorageError::NotFound { .. })
    );
    let write_blocked = matches!(
        storage.append_message(intruder.id, chat.id, NewMessage::user("hi")),
        Err(StorageError::NotFound { .. })
    );
    let delete_blocked = matches!(
        storage.delete_chat(intruder.id, chat.id),
        Err(StorageError::NotFound { .. })
    );

    println!("read_blocked={read_blocked}");
    println!("write_blocked={write_blocked}");
    println!("delete_blocked={delete_blocked}");
    ensure(
        read_blocked && write_blocked && delete_blocked,
        "owner_guard",
        "a foreign account reached a chat it does not own",
    )?;

    println!("runner_ok=true");
    Ok(())
}

fn ensure(condition: bool, scenario: &'static str, reason: &str) -> RunnerResult<()> {
    if condition {
        return Ok(());
    }

    ScenarioFailedSnafu {
        stage: "scenario-assert",
        scenario,
        reason: reason.to_string(),
    }
    .fail()
}

fn assert_id_roundtrip<T>(label: &'static str, id: T) -> RunnerResult<()>
where
    T: Copy + Eq + FromStr<Err = StorageError> + std::fmt::Display,
{
    let encoded = id.to_string();
    let decoded = encoded.parse::<T>().context(StorageValidationSnafu {
        stage: "scenario-id-roundtrip-parse",
    })?;

    if decoded != id {
        return ScenarioFailedSnafu {
            stage: "scenario-id-roundtrip-compare",
            scenario: "id_roundtrip",
            reason: format!("{label} parse/format roundtrip mismatch"),
        }
        .fail();
    }

    println!("{label}_roundtrip=true");
    Ok(())
}

fn invalid_input_is_rejected<T>(raw: &str) -> bool
where
    T: FromStr<Err = StorageError>,
{
    matches!(raw.parse::<T>(), Err(StorageError::InvalidId { .. }))
}

fn require_db_path<'a>(args: &'a RunnerArgs, scenario: &'static str) -> RunnerResult<&'a str> {
    args.db_path.as_deref().context(MissingDbPathSnafu {
        stage: "require-db-path",
        scenario,
    })
}
