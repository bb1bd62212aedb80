use gpui::prelude::FluentBuilder;
use gpui::*;
use gpui_component::{
    ActiveTheme, Icon, IconName, Selectable, Sizable,
    button::{Button, ButtonVariants},
    h_flex, v_flex,
};
use parley_responder::{MODELS, Model, default_model, find_model};

/// Model dropdown in the top bar. Replies never depend on the choice.
pub struct ModelSelector {
    current: Model,
    is_open: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSelected {
    pub model_id: &'static str,
}

impl EventEmitter<ModelSelected> for ModelSelector {}

impl ModelSelector {
    pub fn new() -> Self {
        Self {
            current: default_model(),
            is_open: false,
        }
    }

    pub fn current_model(&self) -> Model {
        self.current
    }

    pub fn set_model_id(&mut self, model_id: &str, cx: &mut Context<Self>) {
        match find_model(model_id) {
            Some(model) => self.current = model,
            None => tracing::warn!(model_id, "unknown model id, keeping {}", self.current.id),
        }
        cx.notify();
    }

    fn toggle_open(&mut self, _event: &ClickEvent, _window: &mut Window, cx: &mut Context<Self>) {
        self.is_open = !self.is_open;
        cx.notify();
    }

    fn select_model(&mut self, model: Model, cx: &mut Context<Self>) {
        self.current = model;
        self.is_open = false;
        cx.emit(ModelSelected { model_id: model.id });
        cx.notify();
    }
}

impl Default for ModelSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl Render for ModelSelector {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let is_open = self.is_open;
        let current_id = self.current.id;

        h_flex()
            .id("model-selector")
            .relative()
            .child(
                Button::new("model-selector-button")
                    .outline()
                    .small()
                    .w(px(180.))
                    .child(self.current.name)
                    .when(is_open, |button| button.selected(true))
                    .on_click(cx.listener(Self::toggle_open)),
            )
            .when(is_open, |element| {
                element.child(
                    v_flex()
                        .id("model-selector-dropdown")
                        .absolute()
                        .top(px(32.))
                        .right_0()
                        .w(px(220.))
                        .bg(theme.popover)
                        .rounded_md()
                        .shadow_md()
                        .border_1()
                        .border_color(theme.border)
                        .py_1()
                        .children(MODELS.iter().copied().map(|model| {
                            let is_selected = model.id == current_id;

                            h_flex()
                                .id(ElementId::Name(format!("model-option-{}", model.id).into()))
                                .px_3()
                                .py_2()
                                .gap_2()
                                .items_center()
                                .justify_between()
                                .cursor_pointer()
                                .when(is_selected, |element| {
                                    element.bg(theme.primary.opacity(0.1))
                                })
                                .when(!is_selected, |element| {
                                    element.hover(|element| element.bg(theme.muted.opacity(0.5)))
                                })
                                .on_click(cx.listener(move |this, _event, _window, cx| {
                                    this.select_model(model, cx);
                                }))
                                .child(
                                    div()
                                        .text_sm()
                                        .text_color(theme.foreground)
                                        .child(model.name),
                                )
                                .when(is_selected, |element| {
                                    element.child(
                                        Icon::new(IconName::Check)
                                            .size(px(16.))
                                            .text_color(theme.primary),
                                    )
                                })
                        })),
                )
            })
    }
}
