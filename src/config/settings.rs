use serde::{Deserialize, Serialize};

use crate::deferred::Deadline;

/// Settings as read from a file or override: every key optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsFile {
    /// Default deadline for pending computations returned without one
    pub async_timeout: Option<Deadline>,
    /// Idle timeout the host applies to a session until the coordinator arms its own
    pub host_timeout: Option<Deadline>,
    /// Include failure messages in uncaught-exception responses
    pub development_mode: Option<bool>,
    pub messages: Option<MessagesFile>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MessagesFile {
    pub gateway_timeout: Option<String>,
    pub uncaught: Option<String>,
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    pub async_timeout: Deadline,
    pub host_timeout: Deadline,
    pub development_mode: bool,
    pub messages: Messages,
}

/// Fixed response bodies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Messages {
    pub gateway_timeout: String,
    pub uncaught: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings::from(super::defaults::default_settings())
    }
}

impl From<SettingsFile> for Settings {
    /// Resolve a settings file, filling missing keys from the programmed defaults.
    fn from(file: SettingsFile) -> Self {
        let defaults = super::defaults::default_settings();
        let messages = file.messages.unwrap_or_default();
        let default_messages = defaults.messages.unwrap_or_default();

        Settings {
            async_timeout: file
                .async_timeout
                .or(defaults.async_timeout)
                .unwrap_or_default(),
            host_timeout: file
                .host_timeout
                .or(defaults.host_timeout)
                .unwrap_or_default(),
            development_mode: file
                .development_mode
                .or(defaults.development_mode)
                .unwrap_or(false),
            messages: Messages {
                gateway_timeout: messages
                    .gateway_timeout
                    .or(default_messages.gateway_timeout)
                    .unwrap_or_default(),
                uncaught: messages
                    .uncaught
                    .or(default_messages.uncaught)
                    .unwrap_or_default(),
            },
        }
    }
}
