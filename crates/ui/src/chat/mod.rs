/// Events passed between the chat panes and the shell.
pub mod events;
pub mod message_input;
pub mod message_list;
pub mod scroll_manager;
pub mod sidebar;
pub mod view;

pub use events::{ChatCreated, ChatDeleted, ChatSelected, ChatTouched, Submit};
pub use message_input::MessageInput;
pub use message_list::MessageList;
pub use scroll_manager::ScrollManager;
pub use sidebar::ChatSidebar;
pub use view::ChatView;
