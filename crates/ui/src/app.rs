use std::path::PathBuf;

use futures::StreamExt;
use futures::channel::mpsc::UnboundedReceiver;
use gpui::prelude::FluentBuilder;
use gpui::*;
use gpui_component::notification::{Notification, NotificationList};
use gpui_component::{
    ActiveTheme, IconName, Sizable, ThemeMode,
    button::{Button, ButtonVariants},
    h_flex,
    label::Label,
    v_flex,
};
use parley_chat::{AuthPhase, Notice, NoticeLevel, ShellState};
use parley_storage::ChatId;

use crate::chat::{ChatCreated, ChatDeleted, ChatSelected, ChatSidebar, ChatTouched, ChatView};
use crate::model_selector::{ModelSelected, ModelSelector};
use crate::services::AppServices;
use crate::settings::SettingsStore;
use crate::sign_in::{SignInPrompt, SignInRequested};
use crate::tasks::spawn_store_call;

/// Directory watched for user themes.
pub fn default_themes_path() -> PathBuf {
    SettingsStore::default_config_dir().join("themes")
}

/// Default sidebar width when expanded.
pub const SIDEBAR_DEFAULT_WIDTH: f32 = 260.0;
/// Minimum allowed sidebar width.
pub const SIDEBAR_MIN_WIDTH: f32 = 200.0;
/// Maximum allowed sidebar width.
pub const SIDEBAR_MAX_WIDTH: f32 = 400.0;
pub const SIDEBAR_COLLAPSED_WIDTH: f32 = 56.0;
#[cfg(target_os = "macos")]
const WINDOW_TOOLBAR_LEFT_SAFE_PADDING: f32 = 78.0;
#[cfg(not(target_os = "macos"))]
const WINDOW_TOOLBAR_LEFT_SAFE_PADDING: f32 = 16.0;
#[cfg(target_os = "windows")]
const WINDOW_TOOLBAR_RIGHT_SAFE_PADDING: f32 = 120.0;
#[cfg(not(target_os = "windows"))]
const WINDOW_TOOLBAR_RIGHT_SAFE_PADDING: f32 = 16.0;
const _: () = {
    assert!(SIDEBAR_COLLAPSED_WIDTH > 0.0);
    assert!(SIDEBAR_MIN_WIDTH < SIDEBAR_DEFAULT_WIDTH);
    assert!(SIDEBAR_DEFAULT_WIDTH < SIDEBAR_MAX_WIDTH);
    assert!(SIDEBAR_MIN_WIDTH > 0.0);
};

fn window_toolbar_height(window: &Window) -> Pixels {
    (1.75 * window.rem_size()).max(px(34.0))
}

/// Clamps a drag position to [SIDEBAR_MIN_WIDTH, SIDEBAR_MAX_WIDTH].
pub fn compute_sidebar_width(drag_x: f32) -> f32 {
    drag_x.clamp(SIDEBAR_MIN_WIDTH, SIDEBAR_MAX_WIDTH)
}

pub fn toggled_theme_mode(mode: ThemeMode) -> ThemeMode {
    if mode.is_dark() {
        ThemeMode::Light
    } else {
        ThemeMode::Dark
    }
}

gpui::actions!(shell, [NewChat, ToggleSidebar, Quit,]);

#[derive(Clone)]
struct SidebarResizeDrag;

/// Invisible drag preview; only the cursor changes while resizing.
struct EmptyDragView;

impl Render for EmptyDragView {
    fn render(&mut self, _: &mut Window, _: &mut Context<Self>) -> impl IntoElement {
        div()
    }
}

/// Window root: auth gate, sidebar, conversation pane, and toasts.
///
/// Owns the active chat selection and keeps the sidebar highlight and the
/// conversation pane in step with it.
pub struct ChatAppShell {
    services: AppServices,
    shell_state: ShellState,
    focus_handle: FocusHandle,
    notification_list: Entity<NotificationList>,
    sign_in: Entity<SignInPrompt>,
    sidebar: Entity<ChatSidebar>,
    chat_view: Entity<ChatView>,
    model_selector: Entity<ModelSelector>,
    sidebar_collapsed: bool,
    sidebar_width: f32,
    title_bar_should_move: bool,
    _notice_task: Task<()>,
}

impl ChatAppShell {
    pub fn new(
        services: AppServices,
        notices: UnboundedReceiver<Notice>,
        notification_list: Entity<NotificationList>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) -> Self {
        let sign_in = cx.new(|cx| SignInPrompt::new(window, cx));
        let sidebar = cx.new(|cx| ChatSidebar::new(services.chats.clone(), window, cx));
        let chat_view = cx.new(|cx| ChatView::new(services.conversation.clone(), window, cx));
        let model_selector = cx.new(|_| ModelSelector::new());

        cx.subscribe(&sign_in, |this, _, event: &SignInRequested, cx| {
            this.sign_in(event.email.clone(), cx);
        })
        .detach();

        cx.subscribe(&sidebar, |this, _, event: &ChatSelected, cx| {
            this.select_chat(event.chat_id, cx);
        })
        .detach();

        cx.subscribe(&sidebar, |this, _, event: &ChatCreated, cx| {
            this.select_chat(event.chat_id, cx);
        })
        .detach();

        cx.subscribe(&sidebar, |this, _, event: &ChatDeleted, cx| {
            this.handle_chat_deleted(event.chat_id, cx);
        })
        .detach();

        cx.subscribe(&chat_view, |this, _, event: &ChatCreated, cx| {
            this.shell_state.select(event.chat_id);
            this.sidebar.update(cx, |sidebar, cx| {
                sidebar.sync_from_repository(cx);
                sidebar.set_selected(Some(event.chat_id), cx);
            });
        })
        .detach();

        cx.subscribe(&chat_view, |this, _, _event: &ChatTouched, cx| {
            // Appends bump the chat's recency, so the order may have changed.
            this.sidebar.update(cx, |sidebar, cx| sidebar.reload(cx));
        })
        .detach();

        cx.subscribe(&model_selector, |_, _, event: &ModelSelected, _cx| {
            tracing::info!(model_id = event.model_id, "model selected");
        })
        .detach();

        let notice_task = cx.spawn_in(window, async move |this, cx| {
            let mut notices = notices;
            while let Some(notice) = notices.next().await {
                let _ = this.update_in(cx, |this, window, cx| {
                    this.show_notice(notice, window, cx);
                });
            }
        });

        let focus_handle = cx.focus_handle();
        focus_handle.focus(window, cx);

        let mut shell = Self {
            services,
            shell_state: ShellState::default(),
            focus_handle,
            notification_list,
            sign_in,
            sidebar,
            chat_view,
            model_selector,
            sidebar_collapsed: false,
            sidebar_width: SIDEBAR_DEFAULT_WIDTH,
            title_bar_should_move: false,
            _notice_task: notice_task,
        };
        shell.restore_session(cx);
        shell
    }

    fn restore_session(&mut self, cx: &mut Context<Self>) {
        let auth = self.services.auth.clone();
        let remembered = self.services.settings.settings().last_email.clone();

        spawn_store_call(
            cx,
            move || auth.restore(remembered.as_deref()),
            |this, user, cx| {
                if user.is_none() {
                    tracing::info!("no remembered session");
                }
                this.enter_current_phase(cx);
            },
        );
    }

    fn sign_in(&mut self, email: String, cx: &mut Context<Self>) {
        let auth = self.services.auth.clone();
        let settings = self.services.settings.clone();

        spawn_store_call(
            cx,
            move || {
                let result = auth.sign_in(&email);
                if result.is_ok()
                    && let Err(err) = settings.remember_email(Some(&email))
                {
                    tracing::warn!("failed to remember sign-in email: {err}");
                }
                result
            },
            |this, result, cx| {
                if let Err(err) = result {
                    tracing::error!(stage = err.stage(), "sign-in failed: {err}");
                    this.services
                        .notifier
                        .notify(Notice::error("Failed to sign in"));
                }
                this.sign_in.update(cx, |prompt, cx| prompt.set_pending(false, cx));
                this.enter_current_phase(cx);
            },
        );
    }

    fn sign_out(&mut self, cx: &mut Context<Self>) {
        self.services.auth.sign_out();
        self.services.chats.clear();
        if let Err(err) = self.services.settings.remember_email(None) {
            tracing::warn!("failed to forget sign-in email: {err}");
        }
        self.enter_current_phase(cx);
    }

    /// Brings every pane in line with the session phase.
    fn enter_current_phase(&mut self, cx: &mut Context<Self>) {
        match self.services.auth.phase().as_ref() {
            AuthPhase::SignedIn(_) => {
                self.sidebar.update(cx, |sidebar, cx| sidebar.reload(cx));
            }
            AuthPhase::Resolving | AuthPhase::SignedOut => {
                self.shell_state.clear();
                self.apply_selection(None, cx);
                self.sidebar
                    .update(cx, |sidebar, cx| sidebar.sync_from_repository(cx));
            }
        }
        cx.notify();
    }

    fn select_chat(&mut self, chat_id: ChatId, cx: &mut Context<Self>) {
        if self.shell_state.select(chat_id) {
            self.apply_selection(Some(chat_id), cx);
        }
    }

    fn handle_chat_deleted(&mut self, chat_id: ChatId, cx: &mut Context<Self>) {
        let was_active = self.shell_state.active_chat() == Some(chat_id);
        let remaining = self.services.chats.snapshot();
        let next = self.shell_state.after_delete(chat_id, &remaining);
        if was_active {
            self.apply_selection(next, cx);
        }
    }

    fn apply_selection(&mut self, chat_id: Option<ChatId>, cx: &mut Context<Self>) {
        self.sidebar
            .update(cx, |sidebar, cx| sidebar.set_selected(chat_id, cx));
        self.chat_view
            .update(cx, |view, cx| view.set_active_chat(chat_id, cx));
    }

    fn show_notice(&mut self, notice: Notice, window: &mut Window, cx: &mut Context<Self>) {
        let notification = match notice.level {
            NoticeLevel::Success => Notification::success(notice.message),
            NoticeLevel::Error => Notification::error(notice.message),
        };
        self.notification_list.update(cx, |list, cx| {
            list.push(notification, window, cx);
        });
    }

    fn toggle_sidebar(&mut self, cx: &mut Context<Self>) {
        self.sidebar_collapsed = !self.sidebar_collapsed;
        cx.notify();
    }

    fn resize_sidebar(&mut self, new_width: f32, cx: &mut Context<Self>) {
        self.sidebar_width = compute_sidebar_width(new_width);
        cx.notify();
    }

    fn new_chat(&mut self, cx: &mut Context<Self>) {
        if self.services.auth.user_id().is_none() {
            return;
        }
        self.sidebar.update(cx, |sidebar, cx| sidebar.create_chat(cx));
    }

    fn toggle_theme(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        let next = toggled_theme_mode(cx.theme().mode);
        if let Err(err) = self.services.settings.set_theme_mode(next) {
            tracing::warn!("failed to persist theme mode: {err}");
        }
        self.services.settings.settings().apply_theme(Some(window), cx);
        cx.notify();
    }
}

impl Render for ChatAppShell {
    fn render(&mut self, window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let phase = self.services.auth.phase();

        let content = match phase.as_ref() {
            AuthPhase::Resolving => v_flex()
                .size_full()
                .items_center()
                .justify_center()
                .child(
                    Label::new("Loading...")
                        .text_sm()
                        .text_color(theme.muted_foreground),
                )
                .into_any_element(),
            AuthPhase::SignedOut => self.sign_in.clone().into_any_element(),
            AuthPhase::SignedIn(user) => {
                let email = user.email.clone();
                self.render_signed_in(email, window, cx)
            }
        };

        div()
            .id("chat-app-shell")
            .key_context("ChatAppShell")
            .track_focus(&self.focus_handle)
            .on_action(cx.listener(|this, _: &NewChat, _window, cx| this.new_chat(cx)))
            .on_action(cx.listener(|this, _: &ToggleSidebar, _window, cx| {
                this.toggle_sidebar(cx);
            }))
            .size_full()
            .relative()
            .bg(cx.theme().background)
            .child(content)
            .child(self.notification_list.clone())
    }
}

impl ChatAppShell {
    fn render_signed_in(
        &mut self,
        email: String,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) -> AnyElement {
        let toolbar_height = window_toolbar_height(window);
        let collapsed = self.sidebar_collapsed;

        div()
            .size_full()
            .relative()
            .child(
                v_flex()
                    .size_full()
                    .child(
                        h_flex()
                            .id("app-shell-body")
                            .flex_1()
                            .min_w_0()
                            .min_h_0()
                            .pt(toolbar_height)
                            .overflow_hidden()
                            .child(self.render_sidebar(cx))
                            .when(!collapsed, |el| el.child(self.render_resize_handle(cx)))
                            .child(
                                v_flex()
                                    .id("main-content")
                                    .flex_1()
                                    .h_full()
                                    .min_w_0()
                                    .min_h_0()
                                    .overflow_hidden()
                                    .child(self.chat_view.clone()),
                            ),
                    )
                    .child(self.render_bottom_bar(email, cx)),
            )
            .child(
                div()
                    .absolute()
                    .top_0()
                    .left_0()
                    .right_0()
                    .child(self.render_top_bar(window, toolbar_height, cx)),
            )
            .into_any_element()
    }

    fn render_collapsed_sidebar(&self, cx: &Context<Self>) -> AnyElement {
        v_flex()
            .id("collapsed-sidebar")
            .size_full()
            .items_center()
            .justify_start()
            .py_3()
            .px_2()
            .child(
                Button::new("new-chat-collapsed")
                    .ghost()
                    .small()
                    .icon(IconName::Plus)
                    .on_click(cx.listener(|this, _, _window, cx| {
                        this.new_chat(cx);
                    })),
            )
            .into_any_element()
    }

    fn render_top_bar(
        &self,
        window: &Window,
        toolbar_height: Pixels,
        cx: &Context<Self>,
    ) -> impl IntoElement {
        let theme = cx.theme();

        h_flex()
            .id("app-top-bar")
            .window_control_area(WindowControlArea::Drag)
            .on_mouse_down_out(cx.listener(|this, _, _window, _cx| {
                this.title_bar_should_move = false;
            }))
            .on_mouse_up(
                MouseButton::Left,
                cx.listener(|this, _, _window, _cx| {
                    this.title_bar_should_move = false;
                }),
            )
            .on_mouse_down(
                MouseButton::Left,
                cx.listener(|this, _, _window, _cx| {
                    this.title_bar_should_move = true;
                }),
            )
            .on_mouse_move(cx.listener(|this, _, window, _cx| {
                if this.title_bar_should_move {
                    this.title_bar_should_move = false;
                    window.start_window_move();
                }
            }))
            .w_full()
            .h(toolbar_height)
            .flex_shrink_0()
            .pl(px(WINDOW_TOOLBAR_LEFT_SAFE_PADDING))
            .pr(px(WINDOW_TOOLBAR_RIGHT_SAFE_PADDING))
            .items_center()
            .justify_end()
            .bg(theme.background)
            .border_b_1()
            .border_color(theme.border)
            .child(self.model_selector.clone())
            .when(
                cfg!(target_os = "linux") && window.window_controls().window_menu,
                |title_bar| {
                    title_bar.on_mouse_down(MouseButton::Right, |event, window, _| {
                        window.show_window_menu(event.position);
                    })
                },
            )
            .child(self.render_linux_window_controls(window, cx))
    }

    fn render_linux_window_controls(&self, window: &Window, cx: &Context<Self>) -> AnyElement {
        #[cfg(target_os = "linux")]
        {
            let maximize_icon = if window.is_maximized() {
                IconName::WindowRestore
            } else {
                IconName::WindowMaximize
            };

            h_flex()
                .id("linux-window-controls")
                .items_center()
                // Keep clicks from reaching the title bar's drag and double-click gestures.
                .on_mouse_down(MouseButton::Left, |_, _, cx| cx.stop_propagation())
                .on_mouse_down(MouseButton::Right, |_, _, cx| cx.stop_propagation())
                .gap_2()
                .ml_2()
                .child(
                    Button::new("linux-window-minimize")
                        .ghost()
                        .small()
                        .icon(IconName::WindowMinimize)
                        .on_click(cx.listener(|_, _, window, _| {
                            window.minimize_window();
                        })),
                )
                .child(
                    Button::new("linux-window-maximize")
                        .ghost()
                        .small()
                        .icon(maximize_icon)
                        .on_click(cx.listener(|_, _, window, _| {
                            window.zoom_window();
                        })),
                )
                .child(
                    Button::new("linux-window-close")
                        .ghost()
                        .small()
                        .icon(IconName::WindowClose)
                        .on_click(cx.listener(|_, _, window, _| {
                            window.remove_window();
                        })),
                )
                .into_any_element()
        }

        #[cfg(not(target_os = "linux"))]
        {
            let _ = (window, cx);
            div().into_any_element()
        }
    }

    fn render_bottom_bar(&self, email: String, cx: &Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let sidebar_toggle_icon = if self.sidebar_collapsed {
            IconName::PanelLeftOpen
        } else {
            IconName::PanelLeftClose
        };
        let theme_icon = if theme.mode.is_dark() {
            IconName::Sun
        } else {
            IconName::Moon
        };

        h_flex()
            .id("app-bottom-bar")
            .w_full()
            .flex_shrink_0()
            .items_center()
            .gap_1()
            .px_3()
            .py_1()
            .border_t_1()
            .border_color(theme.border)
            .child(
                Button::new("sidebar-toggle")
                    .ghost()
                    .small()
                    .icon(sidebar_toggle_icon)
                    .on_click(cx.listener(|this, _, _window, cx| {
                        this.toggle_sidebar(cx);
                    })),
            )
            .child(
                Button::new("theme-toggle")
                    .ghost()
                    .small()
                    .icon(theme_icon)
                    .on_click(cx.listener(|this, _, window, cx| {
                        this.toggle_theme(window, cx);
                    })),
            )
            .child(div().id("app-bottom-spacer").flex_1().min_w_0())
            .child(
                div()
                    .id("signed-in-email")
                    .max_w(px(240.))
                    .truncate()
                    .text_sm()
                    .text_color(theme.muted_foreground)
                    .child(email),
            )
            .child(
                Button::new("sign-out")
                    .outline()
                    .small()
                    .child("Sign Out")
                    .on_click(cx.listener(|this, _, _window, cx| {
                        this.sign_out(cx);
                    })),
            )
    }

    fn render_sidebar(&self, cx: &Context<Self>) -> impl IntoElement {
        let collapsed = self.sidebar_collapsed;
        let sidebar_width = if collapsed {
            SIDEBAR_COLLAPSED_WIDTH
        } else {
            self.sidebar_width
        };
        let sidebar_content = if collapsed {
            self.render_collapsed_sidebar(cx)
        } else {
            self.sidebar.clone().into_any_element()
        };
        let theme = cx.theme();

        div()
            .id("sidebar-container")
            .h_full()
            .min_w_0()
            .flex_shrink_0()
            .w(px(sidebar_width))
            .overflow_hidden()
            .bg(theme.background)
            .border_r_1()
            .border_color(theme.border)
            .child(sidebar_content)
    }

    fn render_resize_handle(&self, cx: &Context<Self>) -> impl IntoElement {
        let theme = cx.theme();

        div()
            .id("sidebar-resize-handle")
            .w(px(1.0))
            .h_full()
            .flex_shrink_0()
            .cursor(CursorStyle::ResizeLeftRight)
            .bg(theme.border)
            .hover(|el| el.bg(theme.primary))
            .on_drag(SidebarResizeDrag, |_, _, _, cx| cx.new(|_| EmptyDragView))
            .on_drag_move::<SidebarResizeDrag>(cx.listener(
                |this, event: &DragMoveEvent<SidebarResizeDrag>, _window, cx| {
                    let new_width: f32 = event.event.position.x.into();
                    this.resize_sidebar(new_width, cx);
                },
            ))
    }
}
