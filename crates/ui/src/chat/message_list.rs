use std::rc::Rc;
use std::sync::Arc;

use gpui::prelude::FluentBuilder as _;
use gpui::*;
use gpui_component::{
    ActiveTheme, IconName, Sizable,
    button::{Button, ButtonVariants},
    h_flex,
    label::Label,
    v_flex, v_virtual_list,
};
use parley_storage::{MessageRecord, Sender};

use crate::chat::scroll_manager::{PaneSnapshot, ScrollManager};

const DEFAULT_CONTENT_WIDTH: Pixels = px(680.);
const LIST_HORIZONTAL_PADDING: Pixels = px(24.);
const CONTENT_WIDTH_CHANGE_EPSILON: f32 = 1.0;
const AVATAR_SIZE: Pixels = px(32.);
const AVATAR_GAP: Pixels = px(12.);
const BUBBLE_MAX_WIDTH: Pixels = px(576.);
const BUBBLE_PADDING: Pixels = px(12.);
const ACTION_ROW_HEIGHT: Pixels = px(28.);
const ACTION_ROW_GAP: Pixels = px(8.);
const ROW_SPACING: Pixels = px(24.);
const THINKING_ROW_HEIGHT: Pixels = px(32.);
const THINKING_DOT_SIZE: Pixels = px(8.);
const ESTIMATED_TEXT_LINE_HEIGHT: Pixels = px(20.);
const ESTIMATED_CHAR_WIDTH: f32 = 7.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Row {
    Message(usize),
    Thinking,
}

/// Virtualized history of one chat plus the bot's "thinking" row.
pub struct MessageList {
    messages: Arc<Vec<MessageRecord>>,
    thinking: bool,
    rows: Vec<Row>,
    item_sizes: Rc<Vec<Size<Pixels>>>,
    scroll_manager: ScrollManager,
    content_width: Pixels,
}

impl MessageList {
    pub fn new(_cx: &mut Context<Self>) -> Self {
        Self {
            messages: Arc::new(Vec::new()),
            thinking: false,
            rows: Vec::new(),
            item_sizes: Rc::new(Vec::new()),
            scroll_manager: ScrollManager::new(),
            content_width: DEFAULT_CONTENT_WIDTH,
        }
    }

    pub fn messages(&self) -> &[MessageRecord] {
        &self.messages
    }

    pub fn is_thinking(&self) -> bool {
        self.thinking
    }

    pub fn set_messages(&mut self, messages: Arc<Vec<MessageRecord>>, cx: &mut Context<Self>) {
        if Arc::ptr_eq(&self.messages, &messages) {
            return;
        }

        self.messages = messages;
        self.rebuild_rows();
        cx.notify();
    }

    pub fn set_thinking(&mut self, thinking: bool, cx: &mut Context<Self>) {
        if self.thinking == thinking {
            return;
        }

        self.thinking = thinking;
        self.rebuild_rows();
        cx.notify();
    }

    fn rebuild_rows(&mut self) {
        let mut rows: Vec<Row> = (0..self.messages.len()).map(Row::Message).collect();
        if self.thinking {
            rows.push(Row::Thinking);
        }

        let item_sizes = rows
            .iter()
            .map(|row| {
                let height = match row {
                    Row::Message(index) => {
                        estimate_message_height(&self.messages[*index], self.content_width)
                    }
                    Row::Thinking => THINKING_ROW_HEIGHT,
                };
                size(self.content_width, height + ROW_SPACING)
            })
            .collect();

        self.rows = rows;
        self.item_sizes = Rc::new(item_sizes);
        self.scroll_manager.observe(PaneSnapshot {
            message_count: self.messages.len(),
            thinking: self.thinking,
        });
    }

    fn update_content_width(&mut self) {
        let list_width = self.scroll_manager.bounds().size.width;
        if list_width <= Pixels::ZERO {
            return;
        }

        let width = max_pixels(px(1.), list_width - LIST_HORIZONTAL_PADDING * 2);
        if (f32::from(width) - f32::from(self.content_width)).abs() > CONTENT_WIDTH_CHANGE_EPSILON
        {
            self.content_width = width;
            self.rebuild_rows();
        }
    }

    fn render_row(&self, row: Row, index: usize, cx: &mut Context<Self>) -> AnyElement {
        let content = match row {
            Row::Message(message_index) => match self.messages.get(message_index) {
                Some(message) => render_message(message, index, cx),
                None => div().into_any_element(),
            },
            Row::Thinking => render_thinking(cx),
        };

        div().w_full().pb(ROW_SPACING).child(content).into_any_element()
    }

    fn render_empty_state(&self, cx: &mut Context<Self>) -> AnyElement {
        let theme = cx.theme();

        v_flex()
            .size_full()
            .items_center()
            .justify_center()
            .child(
                Label::new("Send a message to start the conversation")
                    .text_sm()
                    .text_color(theme.muted_foreground),
            )
            .into_any_element()
    }
}

impl Render for MessageList {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        self.update_content_width();
        if self.scroll_manager.apply_pending_scroll() {
            // Height of freshly added rows lands a frame later.
            cx.notify();
        }

        if self.rows.is_empty() {
            return self.render_empty_state(cx);
        }

        v_flex()
            .size_full()
            .min_h_0()
            .child(
                v_virtual_list(
                    cx.entity().clone(),
                    "message-list",
                    self.item_sizes.clone(),
                    |this, visible_range, _window, cx| {
                        visible_range
                            .filter_map(|index| {
                                this.rows
                                    .get(index)
                                    .copied()
                                    .map(|row| this.render_row(row, index, cx))
                            })
                            .collect::<Vec<_>>()
                    },
                )
                .size_full()
                .px(LIST_HORIZONTAL_PADDING)
                .py_4()
                .track_scroll(self.scroll_manager.handle()),
            )
            .into_any_element()
    }
}

fn render_avatar(letter: &'static str, sender: Sender, cx: &App) -> Div {
    let theme = cx.theme();
    let (background, foreground) = match sender {
        Sender::Bot => (theme.primary, theme.primary_foreground),
        Sender::User => (theme.muted, theme.muted_foreground),
    };

    div()
        .flex_shrink_0()
        .size(AVATAR_SIZE)
        .rounded_full()
        .bg(background)
        .flex()
        .items_center()
        .justify_center()
        .child(
            Label::new(letter)
                .text_sm()
                .font_weight(FontWeight::BOLD)
                .text_color(foreground),
        )
}

fn render_message(message: &MessageRecord, index: usize, cx: &mut Context<MessageList>) -> AnyElement {
    let theme = cx.theme();
    let is_bot = message.sender == Sender::Bot;
    let (bubble_bg, bubble_fg) = if is_bot {
        (theme.secondary, theme.secondary_foreground)
    } else {
        (theme.primary, theme.primary_foreground)
    };

    let bubble = div()
        .max_w(BUBBLE_MAX_WIDTH)
        .p(BUBBLE_PADDING)
        .rounded_lg()
        .bg(bubble_bg)
        .text_color(bubble_fg)
        .child(Label::new(message.content.clone()).text_sm());

    let column = v_flex()
        .gap(ACTION_ROW_GAP)
        .min_w_0()
        .when(is_bot, |column| column.items_start())
        .when(!is_bot, |column| column.items_end())
        .child(bubble)
        .when(is_bot, |column| {
            let content = message.content.clone();
            column.child(
                h_flex().h(ACTION_ROW_HEIGHT).items_center().child(
                    Button::new(("copy-message", index))
                        .ghost()
                        .xsmall()
                        .icon(IconName::Copy)
                        .on_click(move |_, _, cx| {
                            cx.write_to_clipboard(ClipboardItem::new_string(content.clone()));
                        }),
                ),
            )
        });

    h_flex()
        .w_full()
        .items_start()
        .gap(AVATAR_GAP)
        .when(!is_bot, |row| row.justify_end())
        .when(is_bot, |row| row.child(render_avatar("B", Sender::Bot, cx)))
        .child(column)
        .when(!is_bot, |row| row.child(render_avatar("U", Sender::User, cx)))
        .into_any_element()
}

fn render_thinking(cx: &mut Context<MessageList>) -> AnyElement {
    let dot_color = cx.theme().muted_foreground;

    h_flex()
        .h(THINKING_ROW_HEIGHT)
        .items_center()
        .gap(AVATAR_GAP)
        .child(render_avatar("B", Sender::Bot, cx))
        .child(
            h_flex()
                .items_center()
                .gap_1()
                .children((0..3).map(|_| {
                    div()
                        .size(THINKING_DOT_SIZE)
                        .rounded_full()
                        .bg(dot_color)
                })),
        )
        .into_any_element()
}

fn estimate_message_height(message: &MessageRecord, content_width: Pixels) -> Pixels {
    let row_width = max_pixels(px(1.), content_width - AVATAR_SIZE - AVATAR_GAP);
    let bubble_width = min_pixels(row_width, BUBBLE_MAX_WIDTH);
    let text_width = max_pixels(px(1.), bubble_width - BUBBLE_PADDING * 2);
    let bubble_height = estimate_text_height(&message.content, text_width) + BUBBLE_PADDING * 2;

    let column_height = match message.sender {
        Sender::User => bubble_height,
        Sender::Bot => bubble_height + ACTION_ROW_GAP + ACTION_ROW_HEIGHT,
    };
    max_pixels(column_height, AVATAR_SIZE)
}

fn estimate_text_height(content: &str, width: Pixels) -> Pixels {
    if content.is_empty() {
        return ESTIMATED_TEXT_LINE_HEIGHT;
    }

    let chars_per_line = (f32::from(width) / ESTIMATED_CHAR_WIDTH).floor().max(1.0) as usize;

    let mut line_count = 0usize;
    for line in content.lines() {
        let char_count = line.chars().count().max(1);
        line_count += char_count.div_ceil(chars_per_line);
    }

    // A trailing newline still renders an empty line.
    if content.ends_with('\n') {
        line_count += 1;
    }

    ESTIMATED_TEXT_LINE_HEIGHT * line_count.max(1)
}

fn max_pixels(a: Pixels, b: Pixels) -> Pixels {
    if f32::from(a) >= f32::from(b) { a } else { b }
}

fn min_pixels(a: Pixels, b: Pixels) -> Pixels {
    if f32::from(a) <= f32::from(b) { a } else { b }
}

#[cfg(test)]
mod tests {
    use parley_storage::{ChatId, MessageId};

    use super::*;

    fn message(content: &str, sender: Sender) -> MessageRecord {
        MessageRecord {
            id: MessageId::new_v7(),
            chat_id: ChatId::new_v7(),
            content: content.to_string(),
            sender,
            created_at_unix_ms: 0,
        }
    }

    #[test]
    fn text_height_wraps_long_lines_and_counts_newlines() {
        let one_line = estimate_text_height("short", px(300.));
        assert_eq!(one_line, ESTIMATED_TEXT_LINE_HEIGHT);

        // 75 chars at 7.5px fit 10 per line in 75px.
        let wrapped = estimate_text_height(&"x".repeat(75), px(75.));
        assert_eq!(wrapped, ESTIMATED_TEXT_LINE_HEIGHT * 8);

        let trailing = estimate_text_height("a\nb\n", px(300.));
        assert_eq!(trailing, ESTIMATED_TEXT_LINE_HEIGHT * 3);
    }

    #[test]
    fn bot_rows_reserve_room_for_the_copy_action() {
        let width = DEFAULT_CONTENT_WIDTH;
        let user = estimate_message_height(&message("Hello", Sender::User), width);
        let bot = estimate_message_height(&message("Hello", Sender::Bot), width);

        assert_eq!(user, ESTIMATED_TEXT_LINE_HEIGHT + BUBBLE_PADDING * 2);
        assert_eq!(bot, user + ACTION_ROW_GAP + ACTION_ROW_HEIGHT);
    }

    #[test]
    fn rows_never_shrink_below_the_avatar() {
        let height = estimate_message_height(&message("", Sender::User), px(10.));
        assert!(f32::from(height) >= f32::from(AVATAR_SIZE));
    }
}
