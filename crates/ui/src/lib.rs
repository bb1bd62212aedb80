#![deny(unsafe_code)]

/// Desktop front end for parley, built with GPUI and gpui-component.
///
/// The window shell gates on the sign-in state, then composes the chat list
/// and the conversation pane over the repositories in `parley-chat`.
pub mod app;
/// Sidebar, conversation pane, and the events between them.
pub mod chat;
/// Placeholder model dropdown for the top bar.
pub mod model_selector;
pub mod services;
/// Settings persistence.
pub mod settings;
pub mod sign_in;
pub mod tasks;
