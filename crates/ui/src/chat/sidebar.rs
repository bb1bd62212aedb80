use std::rc::Rc;
use std::sync::Arc;

use gpui::prelude::FluentBuilder as _;
use gpui::*;
use gpui_component::{
    ActiveTheme, IconName, Sizable, VirtualListScrollHandle,
    button::{Button, ButtonVariants},
    h_flex,
    input::{Input, InputEvent, InputState},
    label::Label,
    list::ListItem,
    v_flex, v_virtual_list,
};
use parley_chat::{ChatListState, ChatRepository};
use parley_storage::{ChatId, ChatRecord};

use crate::chat::events::{ChatCreated, ChatDeleted, ChatSelected};
use crate::tasks::spawn_store_call;

const CHAT_ROW_HEIGHT: f32 = 40.0;
const SEARCH_PLACEHOLDER: &str = "Search chats...";

/// Chat list with search, inline rename, and delete.
pub struct ChatSidebar {
    chats: ChatRepository,
    list_state: ChatListState,
    snapshot: Arc<Vec<ChatRecord>>,
    visible: Rc<Vec<ChatRecord>>,
    item_sizes: Rc<Vec<Size<Pixels>>>,
    selected: Option<ChatId>,
    loading: bool,
    search_input: Entity<InputState>,
    rename_input: Entity<InputState>,
    scroll_handle: VirtualListScrollHandle,
}

impl EventEmitter<ChatSelected> for ChatSidebar {}
impl EventEmitter<ChatCreated> for ChatSidebar {}
impl EventEmitter<ChatDeleted> for ChatSidebar {}

impl ChatSidebar {
    pub fn new(chats: ChatRepository, window: &mut Window, cx: &mut Context<Self>) -> Self {
        let search_input =
            cx.new(|cx| InputState::new(window, cx).placeholder(SEARCH_PLACEHOLDER));
        let rename_input = cx.new(|cx| InputState::new(window, cx));

        cx.subscribe_in(
            &search_input,
            window,
            |this, _, _event: &InputEvent, _window, cx| {
                let term = this.search_input.read(cx).value().to_string();
                if term != this.list_state.search_term() {
                    this.list_state.set_search_term(term);
                    this.rebuild_visible();
                    cx.notify();
                }
            },
        )
        .detach();

        cx.subscribe_in(
            &rename_input,
            window,
            |this, _, event: &InputEvent, _window, cx| {
                if matches!(event, InputEvent::PressEnter { .. } | InputEvent::Blur) {
                    let draft = this.rename_input.read(cx).value().to_string();
                    this.list_state.edit_draft(draft);
                    this.commit_rename(cx);
                }
            },
        )
        .detach();

        let snapshot = chats.snapshot();
        let mut sidebar = Self {
            chats,
            list_state: ChatListState::default(),
            snapshot,
            visible: Rc::new(Vec::new()),
            item_sizes: Rc::new(Vec::new()),
            selected: None,
            loading: false,
            search_input,
            rename_input,
            scroll_handle: VirtualListScrollHandle::new(),
        };
        sidebar.rebuild_visible();
        sidebar
    }

    pub fn selected(&self) -> Option<ChatId> {
        self.selected
    }

    pub fn set_selected(&mut self, chat_id: Option<ChatId>, cx: &mut Context<Self>) {
        if self.selected != chat_id {
            self.selected = chat_id;
            cx.notify();
        }
    }

    /// Re-fetches the chat list from storage.
    pub fn reload(&mut self, cx: &mut Context<Self>) {
        self.loading = true;
        cx.notify();

        let chats = self.chats.clone();
        spawn_store_call(
            cx,
            move || chats.refresh(),
            |this, _, cx| {
                this.loading = false;
                this.sync_from_repository(cx);
            },
        );
    }

    /// Picks up whatever list the repository holds now.
    pub fn sync_from_repository(&mut self, cx: &mut Context<Self>) {
        let snapshot = self.chats.snapshot();
        if Arc::ptr_eq(&self.snapshot, &snapshot) {
            return;
        }

        self.snapshot = snapshot;
        self.list_state.retain_existing(&self.snapshot);
        self.rebuild_visible();
        cx.notify();
    }

    pub fn create_chat(&mut self, cx: &mut Context<Self>) {
        let chats = self.chats.clone();
        spawn_store_call(
            cx,
            move || chats.create(None),
            |this, created, cx| {
                this.sync_from_repository(cx);
                if let Some(chat_id) = created {
                    cx.emit(ChatCreated { chat_id });
                }
            },
        );
    }

    fn select_chat(&mut self, chat_id: ChatId, cx: &mut Context<Self>) {
        if self.list_state.is_renaming(chat_id) {
            return;
        }

        self.set_selected(Some(chat_id), cx);
        cx.emit(ChatSelected { chat_id });
    }

    fn delete_chat(&mut self, chat_id: ChatId, cx: &mut Context<Self>) {
        let chats = self.chats.clone();
        spawn_store_call(
            cx,
            move || chats.delete(chat_id),
            move |this, deleted, cx| {
                if deleted {
                    this.sync_from_repository(cx);
                    cx.emit(ChatDeleted { chat_id });
                }
            },
        );
    }

    fn begin_rename(&mut self, chat_id: ChatId, window: &mut Window, cx: &mut Context<Self>) {
        let Some(chat) = self.snapshot.iter().find(|chat| chat.id == chat_id) else {
            return;
        };

        self.list_state.begin_rename(chat);
        let title = chat.title.clone();
        self.rename_input.update(cx, |state, cx| {
            state.set_value(title, window, cx);
            state.focus(window, cx);
        });
        cx.notify();
    }

    fn commit_rename(&mut self, cx: &mut Context<Self>) {
        let was_renaming = self.list_state.renaming().is_some();
        let Some((chat_id, title)) = self.list_state.commit_rename() else {
            if was_renaming {
                cx.notify();
            }
            return;
        };
        cx.notify();

        let chats = self.chats.clone();
        spawn_store_call(
            cx,
            move || chats.rename(chat_id, &title),
            |this, _, cx| this.sync_from_repository(cx),
        );
    }

    fn cancel_rename(&mut self, cx: &mut Context<Self>) {
        if self.list_state.renaming().is_some() {
            self.list_state.cancel_rename();
            cx.notify();
        }
    }

    fn rebuild_visible(&mut self) {
        let visible: Vec<ChatRecord> = self
            .list_state
            .filtered(&self.snapshot)
            .into_iter()
            .cloned()
            .collect();

        self.item_sizes = Rc::new(
            visible
                .iter()
                .map(|_| size(px(0.), px(CHAT_ROW_HEIGHT)))
                .collect(),
        );
        self.visible = Rc::new(visible);
    }

    fn render_header(&mut self, cx: &mut Context<Self>) -> impl IntoElement {
        v_flex()
            .w_full()
            .gap_3()
            .px_3()
            .pt_4()
            .pb_2()
            .child(
                h_flex()
                    .w_full()
                    .items_center()
                    .justify_between()
                    .child(Label::new("Chats").text_xl().font_weight(FontWeight::BOLD))
                    .child(
                        Button::new("new-chat")
                            .small()
                            .primary()
                            .icon(IconName::Plus)
                            .child("New Chat")
                            .on_click(cx.listener(|this, _, _window, cx| {
                                this.create_chat(cx);
                            })),
                    ),
            )
            .child(Input::new(&self.search_input).w_full().small())
    }

    fn render_status(&self, message: &'static str, cx: &mut Context<Self>) -> AnyElement {
        let theme = cx.theme();

        v_flex()
            .flex_1()
            .items_center()
            .justify_center()
            .px_4()
            .child(
                Label::new(message)
                    .text_sm()
                    .text_color(theme.muted_foreground),
            )
            .into_any_element()
    }

    fn render_row(&self, chat: &ChatRecord, index: usize, cx: &mut Context<Self>) -> AnyElement {
        let chat_id = chat.id;

        if self.list_state.is_renaming(chat_id) {
            return div()
                .w_full()
                .h(px(CHAT_ROW_HEIGHT))
                .px_2()
                .flex()
                .items_center()
                .capture_key_down(cx.listener(|this, event: &KeyDownEvent, _window, cx| {
                    if event.keystroke.key == "escape" {
                        this.cancel_rename(cx);
                        cx.stop_propagation();
                    }
                }))
                .child(Input::new(&self.rename_input).w_full().small())
                .into_any_element();
        }

        let is_selected = self.selected == Some(chat_id);
        div()
            .w_full()
            .h(px(CHAT_ROW_HEIGHT))
            .px_2()
            .child(
                ListItem::new(("chat", index))
                    .w_full()
                    .h_full()
                    .px_3()
                    .rounded_md()
                    .selected(is_selected)
                    .on_click(cx.listener(move |this, _event: &ClickEvent, _window, cx| {
                        this.select_chat(chat_id, cx);
                    }))
                    .child(
                        h_flex()
                            .w_full()
                            .items_center()
                            .gap_1()
                            .child(
                                div()
                                    .flex_1()
                                    .min_w_0()
                                    .truncate()
                                    .child(Label::new(chat.title.clone()).text_sm()),
                            )
                            .when(is_selected, |row| {
                                row.child(
                                    Button::new(("rename-chat", index))
                                        .ghost()
                                        .xsmall()
                                        .child("Rename")
                                        .on_click(cx.listener(move |this, _, window, cx| {
                                            cx.stop_propagation();
                                            this.begin_rename(chat_id, window, cx);
                                        })),
                                )
                                .child(
                                    Button::new(("delete-chat", index))
                                        .ghost()
                                        .xsmall()
                                        .icon(IconName::Delete)
                                        .on_click(cx.listener(move |this, _, _window, cx| {
                                            cx.stop_propagation();
                                            this.delete_chat(chat_id, cx);
                                        })),
                                )
                            }),
                    ),
            )
            .into_any_element()
    }

    fn render_list(&mut self, cx: &mut Context<Self>) -> AnyElement {
        if self.loading && self.snapshot.is_empty() {
            return self.render_status("Loading...", cx);
        }
        if self.visible.is_empty() {
            return self.render_status("No chats found", cx);
        }

        v_flex()
            .flex_1()
            .min_h_0()
            .child(
                v_virtual_list(
                    cx.entity().clone(),
                    "chat-list",
                    self.item_sizes.clone(),
                    |this, visible_range, _window, cx| {
                        let visible = this.visible.clone();
                        visible_range
                            .filter_map(|index| {
                                visible
                                    .get(index)
                                    .map(|chat| this.render_row(chat, index, cx))
                            })
                            .collect::<Vec<_>>()
                    },
                )
                .w_full()
                .flex_1()
                .track_scroll(&self.scroll_handle),
            )
            .into_any_element()
    }
}

impl Render for ChatSidebar {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();

        v_flex()
            .size_full()
            .min_w_0()
            .overflow_hidden()
            .bg(theme.background)
            .child(self.render_header(cx))
            .child(self.render_list(cx))
    }
}
