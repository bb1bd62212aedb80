use std::time::Duration;

use parley_responder::RandomSource;
use parley_storage::ChatId;

/// Titles derived from a first message are cut to this many characters.
pub const MAX_DERIVED_TITLE_CHARS: usize = 50;

pub const DEFAULT_REPLY_DELAY_MIN: Duration = Duration::from_millis(1500);
pub const DEFAULT_REPLY_DELAY_MAX: Duration = Duration::from_millis(2500);

/// Send lifecycle of one conversation pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendPhase {
    #[default]
    Idle,
    /// Waiting for the reply to `chat_id`; the thinking indicator is shown.
    Sending { chat_id: ChatId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendRejection {
    EmptyText,
    AlreadySending { chat_id: ChatId },
    /// Another submit holds the conversation and has not stored its message yet.
    InFlight,
    NotSending,
}

/// Where the user's message will land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendTarget {
    Existing(ChatId),
    /// No chat is selected, so one is created with this title first.
    Create { title: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendPlan {
    pub text: String,
    pub target: SendTarget,
}

impl SendPlan {
    pub fn create_title(&self) -> Option<&str> {
        match &self.target {
            SendTarget::Create { title } => Some(title),
            SendTarget::Existing(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SendFlow {
    phase: SendPhase,
}

impl SendFlow {
    pub fn phase(&self) -> SendPhase {
        self.phase
    }

    pub fn is_sending(&self) -> bool {
        matches!(self.phase, SendPhase::Sending { .. })
    }

    /// Validates a submit without changing state.
    pub fn prepare(
        &self,
        text: &str,
        active_chat: Option<ChatId>,
    ) -> Result<SendPlan, SendRejection> {
        if let SendPhase::Sending { chat_id } = self.phase {
            return Err(SendRejection::AlreadySending { chat_id });
        }

        let text = text.trim();
        if text.is_empty() {
            return Err(SendRejection::EmptyText);
        }

        let target = match active_chat {
            Some(chat_id) => SendTarget::Existing(chat_id),
            None => SendTarget::Create {
                title: derive_title(text),
            },
        };
        Ok(SendPlan {
            text: text.to_string(),
            target,
        })
    }

    /// Enters `Sending` once the user's message is stored.
    pub fn begin(&mut self, chat_id: ChatId) -> Result<SendPhase, SendRejection> {
        match self.phase {
            SendPhase::Sending { chat_id: active } => {
                Err(SendRejection::AlreadySending { chat_id: active })
            }
            SendPhase::Idle => {
                self.phase = SendPhase::Sending { chat_id };
                Ok(self.phase)
            }
        }
    }

    /// Returns to `Idle`, yielding the chat the reply was meant for.
    pub fn finish(&mut self) -> Result<ChatId, SendRejection> {
        match self.phase {
            SendPhase::Sending { chat_id } => {
                self.phase = SendPhase::Idle;
                Ok(chat_id)
            }
            SendPhase::Idle => Err(SendRejection::NotSending),
        }
    }
}

/// Chat title for a first message: trimmed, cut on a char boundary, marked with `...` when cut.
pub fn derive_title(text: &str) -> String {
    let text = text.trim();
    match text.char_indices().nth(MAX_DERIVED_TITLE_CHARS) {
        Some((cut, _)) => format!("{}...", text[..cut].trim_end()),
        None => text.to_string(),
    }
}

/// Simulated reply latency, sampled uniformly from `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyDelay {
    pub min: Duration,
    pub max: Duration,
}

impl Default for ReplyDelay {
    fn default() -> Self {
        Self {
            min: DEFAULT_REPLY_DELAY_MIN,
            max: DEFAULT_REPLY_DELAY_MAX,
        }
    }
}

impl ReplyDelay {
    /// Swaps the bounds if they arrive reversed.
    pub fn from_millis(min_ms: u64, max_ms: u64) -> Self {
        let (low, high) = if min_ms <= max_ms {
            (min_ms, max_ms)
        } else {
            (max_ms, min_ms)
        };
        Self {
            min: Duration::from_millis(low),
            max: Duration::from_millis(high),
        }
    }

    pub fn sample(&self, random: &mut dyn RandomSource) -> Duration {
        let span = self.max.saturating_sub(self.min);
        let unit = random.next_unit();
        let unit = if unit.is_finite() {
            unit.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.min + span.mul_f64(unit)
    }
}
