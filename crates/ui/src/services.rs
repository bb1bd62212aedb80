use std::sync::Arc;

use parley_chat::{AuthSession, ChatRepository, Conversation, MessageRepository, Notifier};
use parley_responder::Responder;
use parley_storage::Storage;

use crate::settings::SettingsStore;

/// Session, repositories and settings shared by every view of the window.
#[derive(Clone)]
pub struct AppServices {
    pub auth: AuthSession,
    pub chats: ChatRepository,
    pub messages: MessageRepository,
    pub conversation: Conversation,
    pub notifier: Arc<dyn Notifier>,
    pub settings: Arc<SettingsStore>,
}

impl AppServices {
    pub fn new<S>(
        storage: Arc<S>,
        notifier: Arc<dyn Notifier>,
        responder: Arc<dyn Responder>,
        settings: Arc<SettingsStore>,
    ) -> Self
    where
        S: Storage + 'static,
    {
        let auth = AuthSession::new(storage.clone());
        let chats = ChatRepository::new(storage.clone(), auth.clone(), notifier.clone());
        let messages = MessageRepository::new(storage, auth.clone(), notifier.clone());
        let conversation = Conversation::new(
            chats.clone(),
            messages.clone(),
            responder,
            settings.settings().reply_delay(),
        );

        Self {
            auth,
            chats,
            messages,
            conversation,
            notifier,
            settings,
        }
    }
}
