pub mod error;
pub mod store;
pub mod yaml;

pub use error::ConfigError;
pub use store::{SettingsStore, SettingsStoreExt, UsernameMapStore, ViewStore};
pub use yaml::{YamlSettingsStore, YamlUsernameMapStore, YamlViewStore};

use crate::models::ViewSettings;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use std::fs;

/// Keys of the scalar settings in `Settings.yaml`
pub mod keys {
    pub const POLL_FREQUENCY: &str = "PollFrequency";
    pub const SHOW_COUNTDOWN: &str = "ShowCountdown";
    pub const SHOW_PROGRESS: &str = "ShowProgress";
    pub const PLAY_SOUNDS: &str = "PlaySounds";
    pub const PLAY_SPEECH: &str = "PlaySpeech";
    pub const BROKEN_BUILD_SOUND: &str = "BrokenBuildSound";
    pub const FIXED_BUILD_SOUND: &str = "FixedBuildSound";
    pub const BROKEN_BUILD_TEXT: &str = "BrokenBuildText";
    pub const FIXED_BUILD_TEXT: &str = "FixedBuildText";
    pub const SPEECH_VOICE_NAME: &str = "SpeechVoiceName";
    pub const BREAKER_GUILT_STRATEGY: &str = "BreakerGuiltStrategy";
}

/// Poll interval in seconds when the setting is absent or not a positive integer
pub const DEFAULT_POLL_FREQUENCY: u32 = 30;

/// Locates the configuration files of one installation.
///
/// Manages three files in the configuration directory:
/// - `Views.yaml`: Monitored projects, rotated in order
/// - `Settings.yaml`: Scalar preferences (poll frequency, sounds, speech)
/// - `Usernames.yaml`: Optional user name display mapping
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    views_path: Utf8PathBuf,
    settings_path: Utf8PathBuf,
    usernames_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager, creating `config_dir` if needed.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            views_path: config_dir.join("Views.yaml"),
            settings_path: config_dir.join("Settings.yaml"),
            usernames_path: config_dir.join("Usernames.yaml"),
            config_dir,
        })
    }

    pub fn view_store(&self) -> YamlViewStore {
        YamlViewStore::new(&self.views_path)
    }

    /// Open the settings file. Fails if it exists but cannot be parsed.
    pub fn settings_store(&self) -> Result<YamlSettingsStore> {
        YamlSettingsStore::open(&self.settings_path)
            .with_context(|| format!("Failed to open settings: {}", self.settings_path))
    }

    pub fn username_store(&self) -> YamlUsernameMapStore {
        YamlUsernameMapStore::new(&self.usernames_path)
    }

    /// Write default settings and a single `debug` view for any file that
    /// does not exist yet. Existing files are never touched.
    pub fn ensure_defaults(&self) -> Result<()> {
        if !self.settings_path.exists() {
            let yaml_string = serde_yaml_ng::to_string(&default_settings())
                .context("Failed to serialize default settings to YAML")?;
            fs::write(&self.settings_path, yaml_string)
                .with_context(|| format!("Failed to write settings: {}", self.settings_path))?;
            tracing::info!("Created default settings at {}", self.settings_path);
        }

        if !self.views_path.exists() {
            let view = ViewSettings::new("default", crate::services::address::DEBUG_SENTINEL)
                .with_skin("Grid");
            self.view_store()
                .write_all(&[view])
                .with_context(|| format!("Failed to write views: {}", self.views_path))?;
            tracing::info!("Created default view at {}", self.views_path);
        }

        Ok(())
    }

    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn views_path(&self) -> &Utf8Path {
        &self.views_path
    }

    pub fn settings_path(&self) -> &Utf8Path {
        &self.settings_path
    }
}

/// Every scalar key with its out-of-the-box value
pub fn default_settings() -> IndexMap<String, String> {
    let defaults = [
        (keys::POLL_FREQUENCY, DEFAULT_POLL_FREQUENCY.to_string()),
        (keys::SHOW_COUNTDOWN, "true".to_string()),
        (keys::SHOW_PROGRESS, "true".to_string()),
        (keys::PLAY_SOUNDS, "false".to_string()),
        (keys::PLAY_SPEECH, "false".to_string()),
        (keys::BROKEN_BUILD_SOUND, String::new()),
        (keys::FIXED_BUILD_SOUND, String::new()),
        (keys::BROKEN_BUILD_TEXT, "$Breaker$ broke the build".to_string()),
        (keys::FIXED_BUILD_TEXT, "The build is fixed".to_string()),
        (keys::SPEECH_VOICE_NAME, String::new()),
        (keys::BREAKER_GUILT_STRATEGY, "Last".to_string()),
    ];

    defaults
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}
