use gpui::*;
use gpui_component::{ActiveTheme, v_flex};
use parley_chat::{Conversation, MessageRepository, OpenedChat};
use parley_storage::ChatId;

use crate::chat::events::{ChatCreated, ChatTouched, Submit};
use crate::chat::{MessageInput, MessageList};
use crate::tasks::spawn_store_call;

/// User message stored (or not) for a submit, in the chat it went to.
struct StoredTurn {
    chat: OpenedChat,
    saved: bool,
    text: String,
}

/// Conversation pane: message history, thinking row, and the send flow.
pub struct ChatView {
    conversation: Conversation,
    messages: MessageRepository,
    message_list: Entity<MessageList>,
    message_input: Entity<MessageInput>,
    active_chat: Option<ChatId>,
    /// Chat whose reply is pending, if any.
    sending_chat: Option<ChatId>,
    busy: bool,
    reply_task: Option<Task<()>>,
}

impl EventEmitter<ChatCreated> for ChatView {}
impl EventEmitter<ChatTouched> for ChatView {}

impl ChatView {
    pub fn new(conversation: Conversation, window: &mut Window, cx: &mut Context<Self>) -> Self {
        let message_list = cx.new(MessageList::new);
        let message_input = cx.new(|cx| MessageInput::new(window, cx));

        cx.subscribe(&message_input, |this, _, event: &Submit, cx| {
            this.handle_submit(event.content.clone(), cx);
        })
        .detach();

        let messages = conversation.messages().clone();
        Self {
            conversation,
            messages,
            message_list,
            message_input,
            active_chat: None,
            sending_chat: None,
            busy: false,
            reply_task: None,
        }
    }

    pub fn active_chat(&self) -> Option<ChatId> {
        self.active_chat
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Shows `chat_id`. The old history disappears before the new one loads.
    pub fn set_active_chat(&mut self, chat_id: Option<ChatId>, cx: &mut Context<Self>) {
        if self.active_chat == chat_id {
            return;
        }

        self.active_chat = chat_id;
        self.messages.set_chat(chat_id);
        self.sync_messages(cx);

        if chat_id.is_some() {
            self.reload_messages(cx);
        }
    }

    fn reload_messages(&mut self, cx: &mut Context<Self>) {
        let messages = self.messages.clone();
        spawn_store_call(
            cx,
            move || messages.refresh(),
            |this, _, cx| this.sync_messages(cx),
        );
    }

    fn sync_messages(&mut self, cx: &mut Context<Self>) {
        let snapshot = self.messages.snapshot();
        let thinking = self.sending_chat.is_some() && self.sending_chat == self.active_chat;
        self.message_list.update(cx, |list, cx| {
            list.set_messages(snapshot, cx);
            list.set_thinking(thinking, cx);
        });
        cx.notify();
    }

    fn handle_submit(&mut self, content: String, cx: &mut Context<Self>) {
        if self.busy {
            return;
        }

        let plan = match self.conversation.prepare(&content, self.active_chat) {
            Ok(plan) => plan,
            Err(rejection) => {
                tracing::debug!(?rejection, "submit ignored");
                return;
            }
        };

        self.set_busy(true, cx);
        let conversation = self.conversation.clone();
        spawn_store_call(
            cx,
            move || {
                let chat = conversation.open_chat(&plan)?;
                let saved = conversation.post_user_message(chat.chat_id, &plan.text);
                Some(StoredTurn {
                    chat,
                    saved,
                    text: plan.text,
                })
            },
            |this, turn, cx| this.on_user_message_stored(turn, cx),
        );
    }

    fn on_user_message_stored(&mut self, turn: Option<StoredTurn>, cx: &mut Context<Self>) {
        let Some(StoredTurn { chat, saved, text }) = turn else {
            self.set_busy(false, cx);
            return;
        };

        let chat_id = chat.chat_id;
        if chat.created {
            // The created chat wins over a selection made while it was being created.
            self.active_chat = Some(chat_id);
            if self.messages.set_chat(Some(chat_id)) {
                self.reload_messages(cx);
            }
            cx.emit(ChatCreated { chat_id });
        }
        self.sync_messages(cx);

        if !saved {
            self.set_busy(false, cx);
            return;
        }
        cx.emit(ChatTouched { chat_id });

        let delay = match self.conversation.begin_reply(chat_id) {
            Ok(delay) => delay,
            Err(rejection) => {
                tracing::warn!(?rejection, "reply not started");
                self.set_busy(false, cx);
                return;
            }
        };

        self.sending_chat = Some(chat_id);
        self.sync_messages(cx);

        self.reply_task = Some(cx.spawn(async move |this, cx| {
            cx.background_executor().timer(delay).await;
            let _ = this.update(cx, |this, cx| this.post_reply(chat_id, text, cx));
        }));
    }

    fn post_reply(&mut self, chat_id: ChatId, text: String, cx: &mut Context<Self>) {
        self.reply_task = None;

        let conversation = self.conversation.clone();
        spawn_store_call(
            cx,
            move || {
                let (_, saved) = conversation.post_reply(chat_id, &text);
                conversation.finish();
                saved
            },
            move |this, saved, cx| {
                this.sending_chat = None;
                this.set_busy(false, cx);
                this.sync_messages(cx);
                if saved {
                    cx.emit(ChatTouched { chat_id });
                }
            },
        );
    }

    fn set_busy(&mut self, busy: bool, cx: &mut Context<Self>) {
        self.busy = busy;
        self.message_input.update(cx, |input, cx| {
            input.set_disabled(busy, cx);
        });
        cx.notify();
    }
}

impl Render for ChatView {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();

        v_flex()
            .id("chat-view")
            .relative()
            .size_full()
            .min_h_0()
            .overflow_hidden()
            .bg(theme.background)
            .child(
                div()
                    .id("chat-view-message-list")
                    .flex_1()
                    .min_h_0()
                    .child(self.message_list.clone()),
            )
            .child(
                div()
                    .id("chat-view-message-input")
                    .flex_shrink_0()
                    .w_full()
                    .border_t_1()
                    .border_color(theme.border)
                    .child(self.message_input.clone()),
            )
    }
}

