//! Persistence collaborators consumed by [`ConfigSettings`](crate::state::ConfigSettings).
//!
//! The store only depends on these traits; [`crate::config::yaml`] provides
//! the file-backed implementations used by the application.

use super::ConfigError;
use crate::models::ViewSettings;
use indexmap::IndexMap;

#[cfg(test)]
use mockall::automock;

/// Persisted list of views, keyed by view id
#[cfg_attr(test, automock)]
pub trait ViewStore {
    /// Read all views in their configured order.
    fn read(&self) -> Result<Vec<ViewSettings>, ConfigError>;

    /// Overwrite the persisted view with the given id.
    fn write(&mut self, id: &str, view: &ViewSettings) -> Result<(), ConfigError>;
}

/// Flat key/value store for scalar settings
#[cfg_attr(test, automock)]
pub trait SettingsStore {
    /// Re-read the persisted values, discarding anything not yet flushed.
    fn reload(&mut self) -> Result<(), ConfigError>;

    /// Raw value for `key`, `None` when the key does not exist.
    fn get_property(&self, key: &str) -> Option<String>;

    /// Stage a value; nothing is persisted until [`flush`](Self::flush).
    fn set_property(&mut self, key: &str, value: &str);

    fn flush(&mut self) -> Result<(), ConfigError>;
}

/// Mapping from raw source-control user names to display names
#[cfg_attr(test, automock)]
pub trait UsernameMapStore {
    fn read(&self) -> Result<IndexMap<String, String>, ConfigError>;
}

/// Typed lookups on top of [`SettingsStore`]
pub trait SettingsStoreExt {
    /// Value for `key`, or [`ConfigError::MissingSetting`] naming the key.
    fn required_property(&self, key: &str) -> Result<String, ConfigError>;

    /// Integer value for `key`, or `default` when absent or unparseable.
    fn get_int_property(&self, key: &str, default: i64) -> i64;

    /// Required boolean; accepts `true`/`false` in any case.
    fn get_bool_property(&self, key: &str) -> Result<bool, ConfigError>;
}

impl<T: SettingsStore + ?Sized> SettingsStoreExt for T {
    fn required_property(&self, key: &str) -> Result<String, ConfigError> {
        self.get_property(key).ok_or_else(|| ConfigError::missing(key))
    }

    fn get_int_property(&self, key: &str, default: i64) -> i64 {
        match self.get_property(key) {
            Some(value) => value.trim().parse().unwrap_or_else(|_| {
                tracing::warn!("Setting {} has non-integer value {:?}, using {}", key, value, default);
                default
            }),
            None => default,
        }
    }

    fn get_bool_property(&self, key: &str) -> Result<bool, ConfigError> {
        let value = self.required_property(key)?;
        match value.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(ConfigError::InvalidSetting {
                key: key.to_string(),
                value,
            }),
        }
    }
}
