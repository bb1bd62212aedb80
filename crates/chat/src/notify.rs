use std::sync::Arc;

use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Transient, user-facing status line (rendered as a toast).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Fire-and-forget sink. Implementations must never block the caller.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    fn notify(&self, notice: Notice) {
        (**self).notify(notice);
    }
}

/// Forwards notices to whoever holds the receiving half, usually the window shell.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: UnboundedSender<Notice>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, UnboundedReceiver<Notice>) {
        let (sender, receiver) = unbounded();
        (Self { sender }, receiver)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notice: Notice) {
        debug!(level = ?notice.level, message = %notice.message, "notice queued");
        if self.sender.unbounded_send(notice).is_err() {
            warn!("notice dropped, receiver is gone");
        }
    }
}

/// Logs notices without displaying them. Used by headless callers.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success => info!(message = %notice.message, "notice"),
            NoticeLevel::Error => warn!(message = %notice.message, "notice"),
        }
    }
}
