use gpui::*;
use gpui_component::{
    ActiveTheme, Sizable,
    button::{Button, ButtonVariants},
    input::{Input, InputEvent, InputState},
    label::Label,
    v_flex,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInRequested {
    pub email: String,
}

/// Shown instead of the app while nobody is signed in.
pub struct SignInPrompt {
    email_input: Entity<InputState>,
    pending: bool,
}

impl EventEmitter<SignInRequested> for SignInPrompt {}

impl SignInPrompt {
    pub fn new(window: &mut Window, cx: &mut Context<Self>) -> Self {
        let email_input = cx.new(|cx| InputState::new(window, cx).placeholder("you@example.com"));

        cx.subscribe_in(
            &email_input,
            window,
            |this, _, event: &InputEvent, _window, cx| match event {
                InputEvent::PressEnter { .. } => this.submit(cx),
                _ => cx.notify(),
            },
        )
        .detach();

        Self {
            email_input,
            pending: false,
        }
    }

    /// Blocks the form while a sign-in is being resolved.
    pub fn set_pending(&mut self, pending: bool, cx: &mut Context<Self>) {
        self.pending = pending;
        cx.notify();
    }

    fn submit(&mut self, cx: &mut Context<Self>) {
        if self.pending {
            return;
        }

        let Some(email) = normalize_email(&self.email_input.read(cx).value()) else {
            return;
        };

        self.set_pending(true, cx);
        cx.emit(SignInRequested { email });
    }
}

/// Trims and lowercases an email, rejecting anything without a local part and a domain.
pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some(email)
}

impl Render for SignInPrompt {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let can_submit =
            !self.pending && normalize_email(&self.email_input.read(cx).value()).is_some();

        v_flex()
            .size_full()
            .items_center()
            .justify_center()
            .bg(theme.background)
            .child(
                v_flex()
                    .w(px(360.))
                    .gap_3()
                    .p_6()
                    .rounded_lg()
                    .border_1()
                    .border_color(theme.border)
                    .child(
                        Label::new("Sign in to continue")
                            .text_lg()
                            .font_weight(FontWeight::SEMIBOLD),
                    )
                    .child(
                        Label::new("Your chats are stored on this device under your email.")
                            .text_sm()
                            .text_color(theme.muted_foreground),
                    )
                    .child(Input::new(&self.email_input).w_full().disabled(self.pending))
                    .child(
                        Button::new("sign-in")
                            .primary()
                            .small()
                            .w_full()
                            .child(if self.pending { "Signing in..." } else { "Sign in" })
                            .disabled(!can_submit)
                            .on_click(cx.listener(|this, _, _window, cx| this.submit(cx))),
                    ),
            )
    }
}
