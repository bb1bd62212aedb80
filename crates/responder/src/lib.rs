use std::sync::Arc;

use snafu::Snafu;
use tracing::info;

mod canned;
mod model;
mod random;

pub use canned::{
    CannedResponder, FILLER_REPLIES, GREETING_REPLY, HELP_REPLY, STATIC_REPLY, StaticResponder,
};
pub use model::{DEFAULT_MODEL_ID, MODELS, Model, default_model, find_model};
pub use random::{RandomSource, SeededRandom, ThreadRandom};

pub const CANNED_RESPONDER_ID: &str = "canned";
pub const STATIC_RESPONDER_ID: &str = "static";

/// Turns user text into bot text. Implementations must not block on I/O.
pub trait Responder: Send + Sync {
    fn reply(&self, input: &str) -> String;
}

impl<T: Responder + ?Sized> Responder for Arc<T> {
    fn reply(&self, input: &str) -> String {
        (**self).reply(input)
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ResponderError {
    #[snafu(display("responder '{responder_id}' is not supported"))]
    UnsupportedResponder {
        stage: &'static str,
        responder_id: String,
    },
}

pub type ResponderResult<T> = Result<T, ResponderError>;

/// Builds the responder named by configuration. Blank ids fall back to canned.
pub fn create_responder(kind: &str) -> ResponderResult<Arc<dyn Responder>> {
    let kind = kind.trim();
    let kind = if kind.is_empty() {
        CANNED_RESPONDER_ID
    } else {
        kind
    };

    match kind {
        CANNED_RESPONDER_ID => {
            info!(responder = kind, "responder created");
            Ok(Arc::new(CannedResponder::new()))
        }
        STATIC_RESPONDER_ID => {
            info!(responder = kind, "responder created");
            Ok(Arc::new(StaticResponder))
        }
        _ => UnsupportedResponderSnafu {
            stage: "create-responder",
            responder_id: kind.to_string(),
        }
        .fail(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_resolves_known_ids() {
        let canned = create_responder("").expect("blank id falls back to canned");
        assert_eq!(canned.reply("hello"), GREETING_REPLY);

        let fixed = create_responder(" static ").expect("static responder");
        assert_eq!(fixed.reply("hello"), STATIC_REPLY);
    }

    #[test]
    fn factory_rejects_unknown_ids() {
        let Err(error) = create_responder("gpt") else {
            panic!("unknown responder must be rejected");
        };
        assert!(matches!(
            error,
            ResponderError::UnsupportedResponder { ref responder_id, .. } if responder_id == "gpt"
        ));
    }
}
