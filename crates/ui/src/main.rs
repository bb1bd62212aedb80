use std::path::Path;
use std::sync::Arc;

use gpui::*;
use gpui_component::notification::NotificationList;
use gpui_component::{Root, ThemeRegistry};

use parley_chat::ChannelNotifier;
use parley_responder::{CANNED_RESPONDER_ID, CannedResponder, Responder, create_responder};
use parley_storage::SqliteStorage;
use parley_ui::app::{ChatAppShell, NewChat, Quit, ToggleSidebar, default_themes_path};
use parley_ui::services::AppServices;
use parley_ui::settings::SettingsStore;

/// Boots storage, settings, and the responder, then opens the main window
/// wrapped in `Root` so notifications can render.
fn main() {
    tracing_subscriber::fmt::init();

    let settings = Arc::new(SettingsStore::load());
    let current = settings.settings();
    tracing::info!(config_path = %settings.config_path().display(), "settings loaded");

    let Some(storage) = open_storage(&current.database_path) else {
        std::process::exit(1);
    };
    let responder = build_responder(&current.responder);

    let (notifier, notices) = ChannelNotifier::new();
    let services = AppServices::new(storage, Arc::new(notifier), responder, settings.clone());

    let app = Application::new().with_assets(gpui_component_assets::Assets);

    app.run(move |cx| {
        gpui_tokio_bridge::init(cx);

        // Must run before any Root is created.
        gpui_component::init(cx);

        // A missing themes directory only means the built-in themes are used.
        let theme_settings = settings.clone();
        if let Err(err) = ThemeRegistry::watch_dir(default_themes_path(), cx, move |cx| {
            theme_settings.settings().apply_theme(None, cx);
            tracing::info!("theme directory watch initialized");
        }) {
            tracing::warn!("failed to watch themes directory: {err}. Using default themes.");
        }
        settings.settings().apply_theme(None, cx);

        cx.on_action(|_: &Quit, cx| {
            cx.quit();
        });

        cx.bind_keys([
            KeyBinding::new("cmd-q", Quit, None),
            KeyBinding::new("cmd-n", NewChat, None),
            KeyBinding::new("cmd-b", ToggleSidebar, None),
        ]);

        cx.spawn(async move |cx| {
            cx.update(|cx| {
                let options = WindowOptions {
                    window_bounds: Some(WindowBounds::Windowed(Bounds::centered(
                        None,
                        size(px(1200.), px(800.)),
                        cx,
                    ))),
                    titlebar: Some(TitlebarOptions {
                        title: Some("parley".into()),
                        appears_transparent: true,
                        traffic_light_position: Some(point(px(9.), px(9.))),
                        ..Default::default()
                    }),
                    // Linux/FreeBSD get client decorations so the app draws its own title area.
                    #[cfg(any(target_os = "linux", target_os = "freebsd"))]
                    window_decorations: Some(WindowDecorations::Client),
                    #[cfg(not(any(target_os = "linux", target_os = "freebsd")))]
                    window_decorations: None,
                    ..Default::default()
                };

                cx.open_window(options, |window, cx| {
                    let notification_list = cx.new(|cx| NotificationList::new(window, cx));
                    let shell = cx.new(|cx| {
                        ChatAppShell::new(services, notices, notification_list, window, cx)
                    });
                    cx.new(|cx| Root::new(shell, window, cx))
                })
                .expect("failed to open main window");

                cx.activate(true);
            })
        })
        .detach();
    });
}

/// Opens the database on a throwaway runtime; the store runs its own per call.
fn open_storage(path: &Path) -> Option<Arc<SqliteStorage>> {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::error!("failed to initialize runtime for sqlite storage: {err}");
            return None;
        }
    };

    let location = path.to_string_lossy();
    match runtime.block_on(SqliteStorage::open(&location)) {
        Ok(storage) => Some(Arc::new(storage)),
        Err(err) => {
            tracing::error!(stage = err.stage(), "failed to open sqlite storage: {err}");
            None
        }
    }
}

fn build_responder(kind: &str) -> Arc<dyn Responder> {
    create_responder(kind).unwrap_or_else(|err| {
        tracing::warn!("{err}; falling back to '{CANNED_RESPONDER_ID}'");
        Arc::new(CannedResponder::new())
    })
}
