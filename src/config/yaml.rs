//! YAML file implementations of the persistence collaborators.
//!
//! A missing file reads as empty (with a warning), matching a fresh install.
//! Malformed files are errors.

use super::ConfigError;
use super::store::{SettingsStore, UsernameMapStore, ViewStore};
use crate::models::{ViewSettings, ViewsFile};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_yaml_ng::Value;
use std::fs;

fn read_yaml<T: DeserializeOwned + Default>(path: &Utf8Path) -> Result<T, ConfigError> {
    if !path.exists() {
        tracing::warn!("Config file not found at {}, using defaults", path);
        return Ok(T::default());
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    // An empty file deserializes as null rather than an empty mapping
    if contents.trim().is_empty() {
        return Ok(T::default());
    }

    serde_yaml_ng::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn write_yaml<T: Serialize>(path: &Utf8Path, value: &T) -> Result<(), ConfigError> {
    let yaml_string = serde_yaml_ng::to_string(value)?;

    fs::write(path, yaml_string).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// View list stored in `Views.yaml`
#[derive(Debug, Clone)]
pub struct YamlViewStore {
    path: Utf8PathBuf,
}

impl YamlViewStore {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Replace the whole view list.
    pub fn write_all(&self, views: &[ViewSettings]) -> Result<(), ConfigError> {
        let file = ViewsFile {
            views: views.to_vec(),
        };
        write_yaml(&self.path, &file)?;
        tracing::info!("Saved {} views to {}", views.len(), self.path);
        Ok(())
    }
}

impl ViewStore for YamlViewStore {
    fn read(&self) -> Result<Vec<ViewSettings>, ConfigError> {
        let file: ViewsFile = read_yaml(&self.path)?;
        tracing::info!("Loaded {} views from {}", file.views.len(), self.path);
        Ok(file.views)
    }

    fn write(&mut self, id: &str, view: &ViewSettings) -> Result<(), ConfigError> {
        let mut file: ViewsFile = read_yaml(&self.path)?;

        let entry = file
            .views
            .iter_mut()
            .find(|v| v.id == id)
            .ok_or_else(|| ConfigError::ViewNotFound { id: id.to_string() })?;

        *entry = ViewSettings {
            id: id.to_string(),
            ..view.clone()
        };

        write_yaml(&self.path, &file)?;
        tracing::info!("Saved view '{}' to {}", id, self.path);
        Ok(())
    }
}

/// Scalar settings stored as a flat mapping in `Settings.yaml`
///
/// Values are kept as strings in memory. Booleans and numbers written by
/// hand (`PlaySounds: true`) are accepted on read; `flush` writes strings.
/// Staged values are merged into the file as it is on disk when flushed, so
/// keys added by hand while the radiator runs are kept.
#[derive(Debug, Clone)]
pub struct YamlSettingsStore {
    path: Utf8PathBuf,
    values: IndexMap<String, String>,
    staged: IndexMap<String, String>,
}

impl YamlSettingsStore {
    /// Open the settings file, reading its current contents.
    pub fn open(path: impl Into<Utf8PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let values = scalar_values(&path, read_yaml(&path)?);

        tracing::info!("Loaded {} settings from {}", values.len(), path);
        Ok(Self {
            path,
            values,
            staged: IndexMap::new(),
        })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn values(&self) -> &IndexMap<String, String> {
        &self.values
    }
}

fn scalar_values(path: &Utf8Path, raw: IndexMap<String, Value>) -> IndexMap<String, String> {
    let mut values = IndexMap::with_capacity(raw.len());
    for (key, value) in raw {
        match scalar_to_string(&value) {
            Some(text) => {
                values.insert(key, text);
            }
            None => {
                tracing::warn!("Ignoring non-scalar setting '{}' in {}", key, path);
            }
        }
    }
    values
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

impl SettingsStore for YamlSettingsStore {
    fn reload(&mut self) -> Result<(), ConfigError> {
        self.values = scalar_values(&self.path, read_yaml(&self.path)?);
        if !self.staged.is_empty() {
            tracing::debug!("Discarding {} unsaved settings on reload", self.staged.len());
            self.staged.clear();
        }
        tracing::debug!("Reloaded {} settings from {}", self.values.len(), self.path);
        Ok(())
    }

    fn get_property(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set_property(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
        self.staged.insert(key.to_string(), value.to_string());
    }

    fn flush(&mut self) -> Result<(), ConfigError> {
        let mut on_disk: IndexMap<String, Value> = read_yaml(&self.path)?;
        for (key, value) in &self.staged {
            on_disk.insert(key.clone(), Value::String(value.clone()));
        }

        write_yaml(&self.path, &on_disk)?;
        tracing::info!("Saved {} settings to {}", self.staged.len(), self.path);

        self.staged.clear();
        self.values = scalar_values(&self.path, on_disk);
        Ok(())
    }
}

/// Username display mapping stored in `Usernames.yaml`
#[derive(Debug, Clone)]
pub struct YamlUsernameMapStore {
    path: Utf8PathBuf,
}

impl YamlUsernameMapStore {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl UsernameMapStore for YamlUsernameMapStore {
    fn read(&self) -> Result<IndexMap<String, String>, ConfigError> {
        read_yaml(&self.path)
    }
}
