pub mod defaults;
pub mod settings;
pub mod user;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;

pub use settings::{Messages, MessagesFile, Settings, SettingsFile};
pub use user::{CONFIG_FILE_NAME, UserConfigResult, load_user_config, user_config_path};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingsEventKind {
    Info,
    Warning,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettingsEvent {
    pub kind: SettingsEventKind,
    pub message: String,
}

impl SettingsEvent {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: SettingsEventKind::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            kind: SettingsEventKind::Warning,
            message: message.into(),
        }
    }

    /// Forward the event to the log.
    pub fn log(&self) {
        match self.kind {
            SettingsEventKind::Info => log::info!(target: "yakusoku::settings", "{}", self.message),
            SettingsEventKind::Warning => {
                log::warn!(target: "yakusoku::settings", "{}", self.message)
            }
        }
    }
}

#[derive(Debug)]
pub struct SettingsLoadOutcome {
    pub settings: Settings,
    pub events: Vec<SettingsEvent>,
}

/// Load settings from every layer.
///
/// Layers, lowest precedence first: programmed defaults, user config,
/// `yakusoku.toml` in `root_path`, then `override_settings`. A layer that
/// fails to load is skipped with a warning event.
pub fn load_settings(
    root_path: Option<&Path>,
    override_settings: Option<SettingsFile>,
) -> SettingsLoadOutcome {
    let mut events = Vec::new();

    let defaults = Some(defaults::default_settings());
    let user_config = load_user_config_with_events(&mut events);
    let project_settings = load_project_settings(root_path, &mut events);

    let merged = merge_all(&[defaults, user_config, project_settings, override_settings])
        .map(Settings::from)
        .unwrap_or_default();

    SettingsLoadOutcome {
        settings: merged,
        events,
    }
}

fn load_user_config_with_events(events: &mut Vec<SettingsEvent>) -> Option<SettingsFile> {
    match load_user_config() {
        Ok(Some(settings)) => {
            events.push(SettingsEvent::info("Loaded user config"));
            Some(settings)
        }
        // No user config file exists - this is fine (zero-config experience)
        Ok(None) => None,
        Err(err) => {
            events.push(SettingsEvent::warning(format!(
                "Failed to load user config: {}",
                err
            )));
            None
        }
    }
}

fn load_project_settings(
    root_path: Option<&Path>,
    events: &mut Vec<SettingsEvent>,
) -> Option<SettingsFile> {
    let config_path = root_path?.join(CONFIG_FILE_NAME);
    if !config_path.exists() {
        return None;
    }

    events.push(SettingsEvent::info(format!(
        "Found config file: {}",
        config_path.display()
    )));

    match fs::read_to_string(&config_path) {
        Ok(contents) => match toml::from_str::<SettingsFile>(&contents) {
            Ok(settings) => {
                events.push(SettingsEvent::info("Successfully loaded yakusoku.toml"));
                Some(settings)
            }
            Err(err) => {
                events.push(SettingsEvent::warning(format!(
                    "Failed to parse yakusoku.toml: {}",
                    err
                )));
                None
            }
        },
        Err(err) => {
            events.push(SettingsEvent::warning(format!(
                "Failed to read yakusoku.toml: {}",
                err
            )));
            None
        }
    }
}

/// Merge settings layers; later layers override earlier ones.
pub fn merge_all(configs: &[Option<SettingsFile>]) -> Option<SettingsFile> {
    configs.iter().cloned().reduce(merge_settings).flatten()
}

/// Merge two settings layers, preferring values from `primary` over `fallback`
pub fn merge_settings(
    fallback: Option<SettingsFile>,
    primary: Option<SettingsFile>,
) -> Option<SettingsFile> {
    match (fallback, primary) {
        (None, None) => None,
        (Some(settings), None) | (None, Some(settings)) => Some(settings),
        (Some(fallback), Some(primary)) => Some(SettingsFile {
            async_timeout: primary.async_timeout.or(fallback.async_timeout),
            host_timeout: primary.host_timeout.or(fallback.host_timeout),
            development_mode: primary.development_mode.or(fallback.development_mode),
            messages: merge_messages(fallback.messages, primary.messages),
        }),
    }
}

fn merge_messages(
    fallback: Option<MessagesFile>,
    primary: Option<MessagesFile>,
) -> Option<MessagesFile> {
    match (fallback, primary) {
        (None, None) => None,
        (Some(messages), None) | (None, Some(messages)) => Some(messages),
        (Some(fallback), Some(primary)) => Some(MessagesFile {
            gateway_timeout: primary.gateway_timeout.or(fallback.gateway_timeout),
            uncaught: primary.uncaught.or(fallback.uncaught),
        }),
    }
}

/// Shared, hot-swappable settings.
///
/// Readers get a consistent snapshot without locking; `replace` publishes a
/// new snapshot for subsequent requests.
#[derive(Debug)]
pub struct SettingsStore {
    current: ArcSwap<Settings>,
}

impl SettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            current: ArcSwap::from_pointee(settings),
        }
    }

    pub fn load(&self) -> Arc<Settings> {
        self.current.load_full()
    }

    pub fn replace(&self, settings: Settings) {
        self.current.store(Arc::new(settings));
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deferred::Deadline;
    use serial_test::serial;

    fn empty_user_config<R>(f: impl FnOnce() -> R) -> R {
        let dir = tempfile::tempdir().unwrap();
        let original = std::env::var("XDG_CONFIG_HOME").ok();
        // SAFETY: env-mutating tests are serialized with #[serial]
        unsafe {
            std::env::set_var("XDG_CONFIG_HOME", dir.path());
        }
        let result = f();
        // SAFETY: Same as above - restoring original env state
        unsafe {
            match original {
                Some(val) => std::env::set_var("XDG_CONFIG_HOME", val),
                None => std::env::remove_var("XDG_CONFIG_HOME"),
            }
        }
        result
    }

    #[test]
    fn merge_prefers_primary_values() {
        let fallback = SettingsFile {
            async_timeout: Some(Deadline::from_millis(100)),
            development_mode: Some(false),
            messages: Some(MessagesFile {
                gateway_timeout: Some("slow".into()),
                uncaught: Some("oops".into()),
            }),
            ..Default::default()
        };
        let primary = SettingsFile {
            async_timeout: Some(Deadline::Unbounded),
            messages: Some(MessagesFile {
                uncaught: Some("broken".into()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let merged = merge_settings(Some(fallback), Some(primary)).unwrap();
        assert_eq!(merged.async_timeout, Some(Deadline::Unbounded));
        assert_eq!(merged.development_mode, Some(false));
        let messages = merged.messages.unwrap();
        assert_eq!(messages.gateway_timeout.as_deref(), Some("slow"));
        assert_eq!(messages.uncaught.as_deref(), Some("broken"));
    }

    #[test]
    fn merge_all_skips_missing_layers() {
        let only = SettingsFile {
            development_mode: Some(true),
            ..Default::default()
        };
        let merged = merge_all(&[None, Some(only.clone()), None]);
        assert_eq!(merged, Some(only));
        assert_eq!(merge_all(&[None, None]), None);
    }

    #[test]
    #[serial]
    fn load_settings_without_files_uses_defaults() {
        let outcome = empty_user_config(|| load_settings(None, None));
        assert_eq!(outcome.settings, Settings::default());
        assert!(outcome.events.is_empty());
    }

    #[test]
    #[serial]
    fn project_file_and_override_layer_on_defaults() {
        let root = tempfile::tempdir().unwrap();
        fs::write(
            root.path().join(CONFIG_FILE_NAME),
            "async_timeout = 250\n[messages]\ngateway_timeout = \"too slow\"\n",
        )
        .unwrap();
        let overrides = SettingsFile {
            development_mode: Some(true),
            ..Default::default()
        };

        let outcome = empty_user_config(|| load_settings(Some(root.path()), Some(overrides)));
        let settings = outcome.settings;
        assert_eq!(settings.async_timeout, Deadline::from_millis(250));
        assert_eq!(settings.messages.gateway_timeout, "too slow");
        assert_eq!(settings.messages.uncaught, "500 Internal Server Error");
        assert!(settings.development_mode);
        assert!(
            outcome
                .events
                .iter()
                .all(|event| event.kind == SettingsEventKind::Info)
        );
    }

    #[test]
    #[serial]
    fn invalid_project_file_is_skipped_with_warning() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join(CONFIG_FILE_NAME), "async_timeout = \"soon\"\n").unwrap();

        let outcome = empty_user_config(|| load_settings(Some(root.path()), None));
        assert_eq!(outcome.settings, Settings::default());
        assert!(
            outcome
                .events
                .iter()
                .any(|event| event.kind == SettingsEventKind::Warning)
        );
    }

    #[test]
    fn settings_store_replace_publishes_new_snapshot() {
        let store = SettingsStore::default();
        let before = store.load();

        store.replace(Settings {
            development_mode: true,
            ..Settings::default()
        });

        assert!(!before.development_mode, "old snapshot is unchanged");
        assert!(store.load().development_mode);
    }
}
