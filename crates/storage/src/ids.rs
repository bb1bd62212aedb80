use std::fmt;
use std::str::FromStr;

use snafu::ResultExt;
use uuid::Uuid;

use super::error::{InvalidIdSnafu, StorageError, StorageResult};

// All row identifiers share one shape; the macro keeps them from drifting apart.
macro_rules! define_storage_id {
    ($name:ident, $id_type:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new(raw: Uuid) -> Self {
                Self(raw)
            }

            pub fn new_v7() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn parse(raw: &str) -> StorageResult<Self> {
                let parsed = Uuid::parse_str(raw).context(InvalidIdSnafu {
                    stage: "parse-storage-id",
                    id_type: $id_type,
                    raw: raw.to_string(),
                })?;
                Ok(Self(parsed))
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(formatter, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self::new(value)
            }
        }

        impl From<$name> for Uuid {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl FromStr for $name {
            type Err = StorageError;

            fn from_str(raw: &str) -> StorageResult<Self> {
                Self::parse(raw)
            }
        }
    };
}

define_storage_id!(UserId, "user-id");
define_storage_id!(ChatId, "chat-id");
define_storage_id!(MessageId, "message-id");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_display() {
        let chat_id = ChatId::new_v7();
        let parsed: ChatId = chat_id.to_string().parse().expect("chat id parses");
        assert_eq!(parsed, chat_id);

        let message_id = MessageId::new_v7();
        assert_eq!(MessageId::parse(&message_id.to_string()).ok(), Some(message_id));
    }

    #[test]
    fn malformed_ids_report_their_type() {
        let error = UserId::parse("not-a-valid-uuid").expect_err("garbage must not parse");
        match error {
            StorageError::InvalidId { id_type, raw, .. } => {
                assert_eq!(id_type, "user-id");
                assert_eq!(raw, "not-a-valid-uuid");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
