//! Default configuration values for yakusoku.
//!
//! These are the lowest-precedence layer of the settings merge and are what
//! `config show` prints when no file overrides them.

use super::settings::{MessagesFile, SettingsFile};
use crate::deferred::Deadline;

/// Default deadline for pending computations (30 seconds).
pub const DEFAULT_ASYNC_TIMEOUT_MS: u64 = 30_000;

/// Default host idle timeout (30 seconds).
pub const DEFAULT_HOST_TIMEOUT_MS: u64 = 30_000;

/// Returns the default settings with every key populated.
pub fn default_settings() -> SettingsFile {
    SettingsFile {
        async_timeout: Some(Deadline::from_millis(DEFAULT_ASYNC_TIMEOUT_MS)),
        host_timeout: Some(Deadline::from_millis(DEFAULT_HOST_TIMEOUT_MS)),
        development_mode: Some(false),
        messages: Some(MessagesFile {
            gateway_timeout: Some("Gateway timeout".to_string()),
            uncaught: Some("500 Internal Server Error".to_string()),
        }),
    }
}
