use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use parley_responder::{RandomSource, Responder, ThreadRandom};
use parley_storage::{ChatId, Sender};
use tracing::{debug, info, warn};

use crate::chats::ChatRepository;
use crate::messages::MessageRepository;
use crate::send_flow::{ReplyDelay, SendFlow, SendPhase, SendPlan, SendRejection, SendTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenedChat {
    pub chat_id: ChatId,
    pub created: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Rejected(SendRejection),
    ChatNotCreated,
    MessageNotSaved {
        chat: OpenedChat,
    },
    Replied {
        chat: OpenedChat,
        reply: String,
        reply_saved: bool,
    },
}

/// Exclusive hold on a [`Conversation`] for one submit, released on drop.
#[derive(Debug)]
pub struct SendClaim {
    in_flight: Arc<AtomicBool>,
}

impl Drop for SendClaim {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::Release);
    }
}

/// Drives one submit from text to stored bot reply.
///
/// The blocking steps are public so a UI can run them on a worker and update
/// its own state between them; [`Conversation::submit`] chains them in order.
#[derive(Clone)]
pub struct Conversation {
    chats: ChatRepository,
    messages: MessageRepository,
    responder: Arc<dyn Responder>,
    delay: ReplyDelay,
    flow: Arc<Mutex<SendFlow>>,
    in_flight: Arc<AtomicBool>,
    random: Arc<Mutex<Box<dyn RandomSource>>>,
}

impl Conversation {
    pub fn new(
        chats: ChatRepository,
        messages: MessageRepository,
        responder: Arc<dyn Responder>,
        delay: ReplyDelay,
    ) -> Self {
        Self {
            chats,
            messages,
            responder,
            delay,
            flow: Arc::new(Mutex::new(SendFlow::default())),
            in_flight: Arc::new(AtomicBool::new(false)),
            random: Arc::new(Mutex::new(Box::new(ThreadRandom))),
        }
    }

    pub fn with_random(mut self, source: impl RandomSource + 'static) -> Self {
        self.random = Arc::new(Mutex::new(Box::new(source)));
        self
    }

    pub fn chats(&self) -> &ChatRepository {
        &self.chats
    }

    pub fn messages(&self) -> &MessageRepository {
        &self.messages
    }

    pub fn phase(&self) -> SendPhase {
        self.flow().phase()
    }

    pub fn is_sending(&self) -> bool {
        self.flow().is_sending()
    }

    /// Reserves the conversation from validation to reply; `None` while another
    /// submit holds it.
    pub fn claim(&self) -> Option<SendClaim> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(SendClaim {
            in_flight: self.in_flight.clone(),
        })
    }

    pub fn prepare(
        &self,
        text: &str,
        active_chat: Option<ChatId>,
    ) -> Result<SendPlan, SendRejection> {
        self.flow().prepare(text, active_chat)
    }

    /// Resolves the plan's target chat, creating and selecting it when needed.
    pub fn open_chat(&self, plan: &SendPlan) -> Option<OpenedChat> {
        match &plan.target {
            SendTarget::Existing(chat_id) => Some(OpenedChat {
                chat_id: *chat_id,
                created: false,
            }),
            SendTarget::Create { title } => {
                let chat_id = self.chats.create(Some(title.as_str()))?;
                self.messages.set_chat(Some(chat_id));
                Some(OpenedChat {
                    chat_id,
                    created: true,
                })
            }
        }
    }

    pub fn post_user_message(&self, chat_id: ChatId, text: &str) -> bool {
        self.messages.append_to(chat_id, text, Sender::User)
    }

    /// Enters `Sending` and picks how long the simulated reply takes.
    pub fn begin_reply(&self, chat_id: ChatId) -> Result<Duration, SendRejection> {
        self.flow().begin(chat_id)?;
        let delay = {
            let mut random = self.random.lock().unwrap_or_else(PoisonError::into_inner);
            self.delay.sample(&mut **random)
        };
        debug!(chat_id = %chat_id, ?delay, "reply scheduled");
        Ok(delay)
    }

    /// Generates and stores the reply in the chat the send started from.
    pub fn post_reply(&self, chat_id: ChatId, text: &str) -> (String, bool) {
        let reply = self.responder.reply(text);
        if self.messages.chat_id() != Some(chat_id) {
            info!(chat_id = %chat_id, "reply lands in a chat that is no longer selected");
        }
        let saved = self.messages.append_to(chat_id, &reply, Sender::Bot);
        (reply, saved)
    }

    /// Back to `Idle`, whatever happened to the reply.
    pub fn finish(&self) -> Option<ChatId> {
        self.flow().finish().ok()
    }

    /// Runs the whole send. `wait` performs the reply delay (a timer in the app,
    /// a no-op in tests).
    pub async fn submit<W, Fut>(
        &self,
        text: &str,
        active_chat: Option<ChatId>,
        wait: W,
    ) -> SendOutcome
    where
        W: FnOnce(Duration) -> Fut,
        Fut: Future<Output = ()>,
    {
        let Some(_claim) = self.claim() else {
            return SendOutcome::Rejected(SendRejection::InFlight);
        };

        let plan = match self.prepare(text, active_chat) {
            Ok(plan) => plan,
            Err(rejection) => return SendOutcome::Rejected(rejection),
        };

        let Some(chat) = self.open_chat(&plan) else {
            return SendOutcome::ChatNotCreated;
        };

        if !self.post_user_message(chat.chat_id, &plan.text) {
            return SendOutcome::MessageNotSaved { chat };
        }

        let delay = match self.begin_reply(chat.chat_id) {
            Ok(delay) => delay,
            Err(rejection) => {
                warn!(?rejection, "another send started while this one was storing");
                return SendOutcome::Rejected(rejection);
            }
        };
        wait(delay).await;

        let (reply, reply_saved) = self.post_reply(chat.chat_id, &plan.text);
        self.finish();
        SendOutcome::Replied {
            chat,
            reply,
            reply_saved,
        }
    }

    fn flow(&self) -> MutexGuard<'_, SendFlow> {
        self.flow.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::executor::block_on;
    use parley_responder::{CannedResponder, FILLER_REPLIES, GREETING_REPLY, HELP_REPLY};
    use parley_storage::{MessageRecord, Sender};

    use super::*;
    use crate::testing::Harness;

    fn conversation(harness: &Harness) -> Conversation {
        Conversation::new(
            harness.chats(),
            harness.messages(),
            Arc::new(CannedResponder::with_source(|| 0.25)),
            ReplyDelay::from_millis(10, 20),
        )
        .with_random(|| 0.5)
    }

    fn pairs(messages: &[MessageRecord]) -> Vec<(Sender, &str)> {
        messages
            .iter()
            .map(|message| (message.sender, message.content.as_str()))
            .collect()
    }

    #[test]
    fn first_message_creates_a_chat_and_gets_a_greeting() {
        let harness = Harness::signed_in();
        let conversation = conversation(&harness);
        let mut waited = None;

        let outcome = block_on(conversation.submit("Hello", None, |delay| {
            waited = Some(delay);
            async {}
        }));

        let (chat, reply, reply_saved) = match outcome {
            SendOutcome::Replied {
                chat,
                reply,
                reply_saved,
            } => (chat, reply, reply_saved),
            other => panic!("unexpected outcome: {other:?}"),
        };
        assert!(chat.created);
        assert!(reply_saved);
        assert_eq!(reply, GREETING_REPLY);
        assert_eq!(waited, Some(Duration::from_millis(15)));

        let chats = conversation.chats().snapshot();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].title, "Hello");

        assert_eq!(
            pairs(&conversation.messages().snapshot()),
            vec![(Sender::User, "Hello"), (Sender::Bot, GREETING_REPLY)]
        );
        assert_eq!(conversation.phase(), SendPhase::Idle);
    }

    #[test]
    fn replies_follow_keyword_rules() {
        let harness = Harness::signed_in();
        let conversation = conversation(&harness);
        let chat_id = conversation.chats().create(None).expect("chat");
        conversation.messages().set_chat(Some(chat_id));

        let reply_to = |text: &str| match block_on(conversation.submit(
            text,
            Some(chat_id),
            |_| async {},
        )) {
            SendOutcome::Replied { reply, .. } => reply,
            other => panic!("unexpected outcome: {other:?}"),
        };

        assert_eq!(reply_to("hi there"), GREETING_REPLY);
        assert_eq!(reply_to("Can you HELP me"), HELP_REPLY);
        assert_eq!(reply_to("weather report"), FILLER_REPLIES[2]);
        assert_eq!(conversation.messages().snapshot().len(), 6);
    }

    #[test]
    fn reply_stays_with_the_chat_it_was_sent_from() {
        let harness = Harness::signed_in();
        let conversation = conversation(&harness);
        let origin = conversation.chats().create(Some("Origin")).expect("chat");
        let other = conversation.chats().create(Some("Other")).expect("chat");
        conversation.messages().set_chat(Some(origin));

        let messages = conversation.messages().clone();
        let outcome = block_on(conversation.submit("hello", Some(origin), move |_| {
            messages.set_chat(Some(other));
            async {}
        }));

        assert!(matches!(
            outcome,
            SendOutcome::Replied {
                reply_saved: true,
                ..
            }
        ));
        assert!(conversation.messages().snapshot().is_empty());

        let stored = harness.store.all_messages();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|message| message.chat_id == origin));
    }

    #[test]
    fn created_chat_can_be_reselected_after_a_switch_mid_create() {
        let harness = Harness::signed_in();
        let conversation = conversation(&harness);
        let other = conversation.chats().create(Some("Other")).expect("chat");

        let plan = conversation.prepare("Hello", None).expect("plan");
        let chat = conversation.open_chat(&plan).expect("created chat");
        assert_eq!(conversation.messages().chat_id(), Some(chat.chat_id));

        // The user picks another chat before the first message lands.
        assert!(conversation.messages().set_chat(Some(other)));
        assert!(conversation.post_user_message(chat.chat_id, &plan.text));
        assert!(conversation.messages().snapshot().is_empty());

        assert!(conversation.messages().set_chat(Some(chat.chat_id)));
        assert!(!conversation.messages().set_chat(Some(chat.chat_id)));
        assert_eq!(
            pairs(&conversation.messages().refresh()),
            vec![(Sender::User, "Hello")]
        );

        conversation.begin_reply(chat.chat_id).expect("reply starts");
        let (reply, saved) = conversation.post_reply(chat.chat_id, &plan.text);
        conversation.finish();
        assert!(saved);
        assert_eq!(
            pairs(&conversation.messages().snapshot()),
            vec![(Sender::User, "Hello"), (Sender::Bot, reply.as_str())]
        );
    }

    #[test]
    fn failed_chat_creation_aborts_quietly() {
        let harness = Harness::signed_in();
        let conversation = conversation(&harness);
        harness.store.fail_next("create_chat");

        let outcome = block_on(conversation.submit("Hello", None, |_| async {}));
        assert_eq!(outcome, SendOutcome::ChatNotCreated);
        assert_eq!(harness.store.calls("append_message"), 0);
        assert_eq!(conversation.phase(), SendPhase::Idle);
    }

    #[test]
    fn failed_user_message_skips_the_reply() {
        let harness = Harness::signed_in();
        let conversation = conversation(&harness);
        let chat_id = conversation.chats().create(None).expect("chat");
        harness.store.fail_next("append_message");

        let outcome = block_on(conversation.submit("Hello", Some(chat_id), |_| async {}));
        assert!(matches!(outcome, SendOutcome::MessageNotSaved { .. }));
        assert_eq!(harness.store.calls("append_message"), 1);
        assert!(!conversation.is_sending());
    }

    #[test]
    fn failed_reply_still_returns_to_idle() {
        let harness = Harness::signed_in();
        let conversation = conversation(&harness);
        let chat_id = conversation.chats().create(None).expect("chat");
        conversation.messages().set_chat(Some(chat_id));
        let store = harness.store.clone();

        let outcome = block_on(conversation.submit("hello", Some(chat_id), move |_| {
            store.fail_next("append_message");
            async {}
        }));

        assert!(matches!(
            outcome,
            SendOutcome::Replied {
                reply_saved: false,
                ..
            }
        ));
        assert_eq!(conversation.phase(), SendPhase::Idle);
        assert_eq!(
            harness.notifier.messages(),
            vec!["Failed to send message"]
        );
    }

    #[test]
    fn overlapping_submit_is_rejected_before_any_write() {
        let harness = Harness::signed_in();
        let conversation = conversation(&harness);

        let claim = conversation.claim().expect("idle conversation");
        assert!(conversation.claim().is_none());

        let outcome = block_on(conversation.submit("Hello", None, |_| async {}));
        assert_eq!(outcome, SendOutcome::Rejected(SendRejection::InFlight));
        assert_eq!(harness.store.calls("create_chat"), 0);
        assert_eq!(harness.store.calls("append_message"), 0);

        drop(claim);
        let outcome = block_on(conversation.submit("Hello", None, |_| async {}));
        assert!(matches!(outcome, SendOutcome::Replied { .. }));
        assert!(conversation.claim().is_some());
    }

    #[test]
    fn blank_submit_is_rejected_without_side_effects() {
        let harness = Harness::signed_in();
        let conversation = conversation(&harness);

        let outcome = block_on(conversation.submit("  ", None, |_| async {}));
        assert_eq!(outcome, SendOutcome::Rejected(SendRejection::EmptyText));
        assert_eq!(harness.store.calls("create_chat"), 0);
    }
}
