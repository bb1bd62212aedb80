use std::sync::Mutex;

use tracing::debug;

use super::Responder;
use super::random::{RandomSource, ThreadRandom};

pub const GREETING_REPLY: &str = "Hello! How can I help you today?";

pub const HELP_REPLY: &str = "I'm here to help! Tell me what you're working on and I'll do my best to assist.";

pub const FILLER_REPLIES: [&str; 10] = [
    "That's an interesting thought. Could you tell me more?",
    "I see what you mean. Let's dig into that a little further.",
    "Good question! There are a few ways to look at it.",
    "Thanks for sharing. What would you like to explore next?",
    "Let me think about that for a moment.",
    "That makes sense. Is there a specific part you'd like to focus on?",
    "Interesting! I hadn't considered it from that angle.",
    "Sure, I can help with that. Where would you like to start?",
    "Noted. Anything else on your mind?",
    "I'm still learning, but I'm happy to keep the conversation going.",
];

/// Reply the app used before the canned rules existed.
pub const STATIC_REPLY: &str = "This is a simulated response. The full chatbot logic would be implemented with a backend after Supabase integration. For now, enjoy this static reply!";

/// Keyword-driven replies with a random filler fallback.
///
/// Rules are checked in order: greeting, help, filler. Matching is a lowercase
/// substring test, so "this" counts as a greeting.
pub struct CannedResponder<S = ThreadRandom> {
    random: Mutex<S>,
}

impl CannedResponder<ThreadRandom> {
    pub fn new() -> Self {
        Self::with_source(ThreadRandom)
    }
}

impl Default for CannedResponder<ThreadRandom> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: RandomSource> CannedResponder<S> {
    pub fn with_source(source: S) -> Self {
        Self {
            random: Mutex::new(source),
        }
    }

    fn pick_filler(&self) -> &'static str {
        let unit = match self.random.lock() {
            Ok(mut source) => source.next_unit(),
            // A panicked sampler leaves no partial state worth protecting.
            Err(poisoned) => poisoned.into_inner().next_unit(),
        };
        FILLER_REPLIES[filler_index(unit)]
    }
}

impl<S: RandomSource> Responder for CannedResponder<S> {
    fn reply(&self, input: &str) -> String {
        let lowered = input.to_lowercase();
        let reply = if lowered.contains("hello") || lowered.contains("hi") {
            GREETING_REPLY
        } else if lowered.contains("help") {
            HELP_REPLY
        } else {
            self.pick_filler()
        };

        debug!(input_len = input.len(), "canned reply selected");
        reply.to_string()
    }
}

/// Always answers with [`STATIC_REPLY`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticResponder;

impl Responder for StaticResponder {
    fn reply(&self, _input: &str) -> String {
        STATIC_REPLY.to_string()
    }
}

fn filler_index(unit: f64) -> usize {
    let scaled = (unit * FILLER_REPLIES.len() as f64).floor();
    if scaled.is_nan() || scaled < 0.0 {
        return 0;
    }
    (scaled as usize).min(FILLER_REPLIES.len() - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::SeededRandom;

    fn fixed(unit: f64) -> CannedResponder<impl RandomSource> {
        CannedResponder::with_source(move || unit)
    }

    #[test]
    fn greetings_win_over_help() {
        let responder = CannedResponder::with_source(SeededRandom::new(1));
        assert_eq!(responder.reply("hi there"), GREETING_REPLY);
        assert_eq!(responder.reply("HELLO"), GREETING_REPLY);
        // "hi" matches first even when help is asked for.
        assert_eq!(responder.reply("Hi, I need help"), GREETING_REPLY);
    }

    #[test]
    fn help_is_case_insensitive() {
        let responder = fixed(0.0);
        assert_eq!(responder.reply("Please HELP"), HELP_REPLY);
        assert_eq!(responder.reply("helpful?"), HELP_REPLY);
    }

    #[test]
    fn filler_index_follows_unit_value() {
        assert_eq!(fixed(0.0).reply("weather"), FILLER_REPLIES[0]);
        assert_eq!(fixed(0.55).reply("weather"), FILLER_REPLIES[5]);
        assert_eq!(fixed(0.999).reply("weather"), FILLER_REPLIES[9]);
    }

    #[test]
    fn out_of_range_units_are_clamped() {
        assert_eq!(filler_index(1.0), 9);
        assert_eq!(filler_index(-0.5), 0);
        assert_eq!(filler_index(f64::NAN), 0);
    }

    #[test]
    fn other_input_always_lands_in_the_filler_set() {
        let responder = CannedResponder::with_source(SeededRandom::new(42));
        for _ in 0..100 {
            let reply = responder.reply("tell me about rust");
            assert!(FILLER_REPLIES.contains(&reply.as_str()));
        }
    }

    #[test]
    fn static_responder_ignores_input() {
        assert_eq!(StaticResponder.reply("hello"), STATIC_REPLY);
        assert_eq!(StaticResponder.reply(""), STATIC_REPLY);
    }
}
