use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors raised by configuration loading and persistence
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required scalar setting is absent. Not retried: the persisted
    /// configuration is corrupt or from an incompatible version.
    #[error("Configuration setting missing: '{key}'")]
    MissingSetting { key: String },

    #[error("Invalid value for setting '{key}': {value:?}")]
    InvalidSetting { key: String, value: String },

    #[error("View '{id}' not found in view settings")]
    ViewNotFound { id: String },

    #[error("View index {index} out of range ({count} views configured)")]
    ViewIndexOutOfRange { index: usize, count: usize },

    #[error("Invalid project filter: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },

    #[error("Failed to serialize settings to YAML: {0}")]
    Serialize(#[from] serde_yaml_ng::Error),
}

impl ConfigError {
    pub fn missing(key: &str) -> Self {
        ConfigError::MissingSetting {
            key: key.to_string(),
        }
    }

    /// True for [`ConfigError::MissingSetting`]
    pub fn is_missing_setting(&self) -> bool {
        matches!(self, ConfigError::MissingSetting { .. })
    }
}
