use gpui::*;
use gpui_component::{
    ActiveTheme, IconName, Sizable,
    button::{Button, ButtonVariants},
    h_flex,
    input::{Input, InputEvent, InputState},
};

use crate::chat::events::Submit;

pub const INPUT_PLACEHOLDER: &str = "Ask me anything...";

pub struct MessageInput {
    input_state: Entity<InputState>,
    disabled: bool,
}

impl EventEmitter<Submit> for MessageInput {}

impl MessageInput {
    pub fn new(window: &mut Window, cx: &mut Context<Self>) -> Self {
        let input_state = cx.new(|cx| InputState::new(window, cx).placeholder(INPUT_PLACEHOLDER));

        cx.subscribe_in(
            &input_state,
            window,
            |this, _, event: &InputEvent, window, cx| match event {
                InputEvent::PressEnter { secondary: false } => this.handle_submit(window, cx),
                // Re-render so the send button tracks whether there is text.
                _ => cx.notify(),
            },
        )
        .detach();

        Self {
            input_state,
            disabled: false,
        }
    }

    /// Blocks input while a reply is pending.
    pub fn set_disabled(&mut self, disabled: bool, cx: &mut Context<Self>) {
        self.disabled = disabled;
        cx.notify();
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn clear(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        self.input_state.update(cx, |state, cx| {
            state.set_value("", window, cx);
        });
    }

    fn handle_submit(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        if self.disabled {
            return;
        }

        let content = self.input_state.read(cx).value().to_string();
        if content.trim().is_empty() {
            return;
        }

        cx.emit(Submit::new(content));
        self.clear(window, cx);
    }
}

impl Render for MessageInput {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let disabled = self.disabled;
        let has_text = !self.input_state.read(cx).value().trim().is_empty();

        h_flex()
            .bg(theme.background)
            .gap_2()
            .p_4()
            .items_center()
            .child(
                div()
                    .flex_1()
                    .min_w_0()
                    .child(Input::new(&self.input_state).w_full().disabled(disabled)),
            )
            .child(
                Button::new("send")
                    .small()
                    .primary()
                    .icon(IconName::ArrowUp)
                    .disabled(disabled || !has_text)
                    .on_click(cx.listener(|this, _, window, cx| {
                        this.handle_submit(window, cx);
                    })),
            )
    }
}
