use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use gpui::*;
use gpui_component::{Theme, ThemeMode};
use parley_chat::ReplyDelay;
use parley_responder::CANNED_RESPONDER_ID;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use snafu::{ResultExt, Snafu};

pub const SETTINGS_DIRECTORY_NAME: &str = "parley";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const SETTINGS_ENV_PREFIX: &str = "PARLEY_";
pub const DATABASE_FILE_NAME: &str = "parley.db";
pub const DEFAULT_REPLY_DELAY_MIN_MS: u64 = 1500;
pub const DEFAULT_REPLY_DELAY_MAX_MS: u64 = 2500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default = "default_responder")]
    pub responder: String,
    #[serde(default = "default_reply_delay_min_ms")]
    pub reply_delay_min_ms: u64,
    #[serde(default = "default_reply_delay_max_ms")]
    pub reply_delay_max_ms: u64,
    #[serde(
        default = "default_theme_mode",
        serialize_with = "serialize_theme_mode",
        deserialize_with = "deserialize_theme_mode"
    )]
    pub theme_mode: ThemeMode,
    /// Email of the last signed-in account, restored on start.
    #[serde(default)]
    pub last_email: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            responder: default_responder(),
            reply_delay_min_ms: DEFAULT_REPLY_DELAY_MIN_MS,
            reply_delay_max_ms: DEFAULT_REPLY_DELAY_MAX_MS,
            theme_mode: default_theme_mode(),
            last_email: None,
        }
    }
}

impl Settings {
    pub fn normalized(mut self) -> Self {
        if self.database_path.as_os_str().is_empty() {
            self.database_path = default_database_path();
        }

        self.responder = match self.responder.trim() {
            "" => default_responder(),
            responder => responder.to_string(),
        };

        if self.reply_delay_min_ms > self.reply_delay_max_ms {
            std::mem::swap(&mut self.reply_delay_min_ms, &mut self.reply_delay_max_ms);
        }

        self.last_email = self
            .last_email
            .map(|email| email.trim().to_string())
            .filter(|email| !email.is_empty());

        self
    }

    pub fn reply_delay(&self) -> ReplyDelay {
        ReplyDelay::from_millis(self.reply_delay_min_ms, self.reply_delay_max_ms)
    }

    pub fn apply_theme(&self, window: Option<&mut Window>, cx: &mut App) {
        Theme::change(self.theme_mode, window, cx);
    }
}

/// Settings loaded from defaults, the JSON file and `PARLEY_*` variables, in that order.
pub struct SettingsStore {
    settings: Arc<ArcSwap<Settings>>,
    config_path: PathBuf,
    /// Serializes read-modify-write cycles and the file writes behind them.
    write_lock: Mutex<()>,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".parley"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    pub fn new(config_path: PathBuf) -> Self {
        let settings = Self::load_from(&config_path, Some(SETTINGS_ENV_PREFIX));
        Self::with_settings(config_path, settings)
    }

    fn with_settings(config_path: PathBuf, settings: Settings) -> Self {
        Self {
            settings: Arc::new(ArcSwap::from_pointee(settings)),
            config_path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> Arc<Settings> {
        self.settings.load_full()
    }

    pub fn update(&self, settings: Settings) -> Result<(), SettingsError> {
        self.modify(|current| *current = settings)
    }

    /// Stores (or forgets, with `None`) the account to restore next launch.
    pub fn remember_email(&self, email: Option<&str>) -> Result<(), SettingsError> {
        self.modify(|settings| settings.last_email = email.map(str::to_string))
    }

    pub fn set_theme_mode(&self, theme_mode: ThemeMode) -> Result<(), SettingsError> {
        self.modify(|settings| settings.theme_mode = theme_mode)
    }

    fn modify(&self, change: impl FnOnce(&mut Settings)) -> Result<(), SettingsError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut settings = Settings::clone(&self.settings());
        change(&mut settings);
        let normalized_settings = settings.normalized();
        self.persist(&normalized_settings)?;
        self.settings.store(Arc::new(normalized_settings));
        Ok(())
    }

    fn load_from(path: &Path, env_prefix: Option<&str>) -> Settings {
        if !path.exists() {
            tracing::info!("settings file not found at {:?}, using defaults", path);
        }

        let mut figment =
            Figment::from(Serialized::defaults(Settings::default())).merge(Json::file(path));
        if let Some(prefix) = env_prefix {
            figment = figment.merge(Env::prefixed(prefix));
        }

        match figment.extract::<Settings>() {
            Ok(settings) => settings.normalized(),
            Err(error) => {
                tracing::warn!(
                    "failed to parse settings from {:?}: {}. using defaults",
                    path,
                    error
                );
                Settings::default()
            }
        }
    }

    fn persist(&self, settings: &Settings) -> Result<(), SettingsError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).context(CreateDirSnafu {
                stage: "create-settings-directory",
                path: parent.to_path_buf(),
            })?;
        }

        let content = serde_json::to_string_pretty(settings).context(SerializeConfigSnafu {
            stage: "serialize-settings-json",
        })?;

        let temp_path = self.config_path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).context(WriteFileSnafu {
            stage: "write-temporary-settings-file",
            path: temp_path.clone(),
        })?;

        std::fs::rename(&temp_path, &self.config_path).context(RenameTempFileSnafu {
            stage: "rename-temporary-settings-file",
            from: temp_path,
            to: self.config_path.clone(),
        })?;

        tracing::info!("saved settings to {:?}", self.config_path);
        Ok(())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("failed to create settings directory at {path:?} on `{stage}`: {source}"))]
    CreateDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to serialize settings on `{stage}`: {source}"))]
    SerializeConfig {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to write settings file at {path:?} on `{stage}`: {source}"))]
    WriteFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display(
        "failed to replace settings file from {from:?} to {to:?} on `{stage}`: {source}"
    ))]
    RenameTempFile {
        stage: &'static str,
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
        .unwrap_or_else(|| PathBuf::from(".parley"))
        .join(DATABASE_FILE_NAME)
}

fn default_responder() -> String {
    CANNED_RESPONDER_ID.to_string()
}

fn default_reply_delay_min_ms() -> u64 {
    DEFAULT_REPLY_DELAY_MIN_MS
}

fn default_reply_delay_max_ms() -> u64 {
    DEFAULT_REPLY_DELAY_MAX_MS
}

fn default_theme_mode() -> ThemeMode {
    ThemeMode::Light
}

fn serialize_theme_mode<S>(value: &ThemeMode, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(value.name())
}

fn deserialize_theme_mode<'de, D>(deserializer: D) -> Result<ThemeMode, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(parse_theme_mode(&value))
}

fn parse_theme_mode(value: &str) -> ThemeMode {
    if value.trim().eq_ignore_ascii_case("dark") {
        ThemeMode::Dark
    } else {
        ThemeMode::Light
    }
}
