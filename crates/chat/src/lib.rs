//! Chat domain for parley: session, repositories over the storage traits,
//! the send flow and the client-side list and selection state. No UI toolkit here.

mod auth;
mod chat_list;
mod chats;
mod conversation;
mod messages;
mod notify;
mod send_flow;
mod shell;

#[cfg(test)]
mod testing;

pub use auth::{AuthPhase, AuthSession};
pub use chat_list::{ChatListState, RenameDraft, next_selection_after_delete};
pub use chats::ChatRepository;
pub use conversation::{Conversation, OpenedChat, SendClaim, SendOutcome};
pub use messages::MessageRepository;
pub use notify::{ChannelNotifier, Notice, NoticeLevel, Notifier, TracingNotifier};
pub use send_flow::{
    DEFAULT_REPLY_DELAY_MAX, DEFAULT_REPLY_DELAY_MIN, MAX_DERIVED_TITLE_CHARS, ReplyDelay,
    SendFlow, SendPhase, SendPlan, SendRejection, SendTarget, derive_title,
};
pub use shell::ShellState;
