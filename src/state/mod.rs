// Configuration state module
//
// This module provides ConfigSettings: the current view plus scalar
// preferences, the rotating list of views, and change notification.

use crate::config::{
    ConfigError, ConfigManager, DEFAULT_POLL_FREQUENCY, SettingsStore, SettingsStoreExt,
    UsernameMapStore, ViewStore, keys,
};
use crate::models::{GuiltStrategy, ViewSettings};
use crate::services::{CradiatorAddress, ProjectFilter};
use indexmap::IndexMap;
use std::fmt;
use std::time::Duration;

/// Writable fields of [`ConfigSettings`]
///
/// Passed to field listeners when a value actually changes. Displays as the
/// field's symbolic name, which for scalar settings is also the persisted key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConfigField {
    Url,
    SkinName,
    ProjectNameRegex,
    CategoryRegex,
    PollFrequency,
    ShowCountdown,
    ShowProgress,
    PlaySounds,
    PlaySpeech,
    BrokenBuildSound,
    FixedBuildSound,
    BrokenBuildText,
    FixedBuildText,
    SpeechVoiceName,
    BreakerGuiltStrategy,
}

impl ConfigField {
    pub fn name(&self) -> &'static str {
        match self {
            ConfigField::Url => "URL",
            ConfigField::SkinName => "SkinName",
            ConfigField::ProjectNameRegex => "ProjectNameRegEx",
            ConfigField::CategoryRegex => "CategoryRegEx",
            ConfigField::PollFrequency => keys::POLL_FREQUENCY,
            ConfigField::ShowCountdown => keys::SHOW_COUNTDOWN,
            ConfigField::ShowProgress => keys::SHOW_PROGRESS,
            ConfigField::PlaySounds => keys::PLAY_SOUNDS,
            ConfigField::PlaySpeech => keys::PLAY_SPEECH,
            ConfigField::BrokenBuildSound => keys::BROKEN_BUILD_SOUND,
            ConfigField::FixedBuildSound => keys::FIXED_BUILD_SOUND,
            ConfigField::BrokenBuildText => keys::BROKEN_BUILD_TEXT,
            ConfigField::FixedBuildText => keys::FIXED_BUILD_TEXT,
            ConfigField::SpeechVoiceName => keys::SPEECH_VOICE_NAME,
            ConfigField::BreakerGuiltStrategy => keys::BREAKER_GUILT_STRATEGY,
        }
    }
}

impl fmt::Display for ConfigField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Receives the whole configuration after a view rotation
pub trait ConfigObserver {
    fn config_updated(&self, settings: &ConfigSettings);
}

impl<F> ConfigObserver for F
where
    F: Fn(&ConfigSettings),
{
    fn config_updated(&self, settings: &ConfigSettings) {
        self(settings)
    }
}

type FieldListener = Box<dyn Fn(ConfigField)>;

/// Store `value` in `slot` and notify listeners, unless nothing changed.
fn assign<T: PartialEq>(
    slot: &mut T,
    value: T,
    field: ConfigField,
    listeners: &[FieldListener],
) -> bool {
    if *slot == value {
        return false;
    }

    *slot = value;
    tracing::trace!("Config field {} changed", field);

    for listener in listeners {
        listener(field);
    }
    true
}

/// Process-wide configuration: the current view plus scalar preferences
///
/// This is the central configuration component that:
/// - Loads views, scalar settings and the username map from its collaborators
/// - Rotates through the configured views in strict round-robin order
/// - Notifies field listeners on every actual change, and observers after
///   each rotation
/// - Saves scalar settings and, on request, the current view
///
/// # Threading
///
/// Single-threaded. Callers polling in the background must hand results
/// back to the thread owning the store before mutating it. Observers and
/// listeners run synchronously inside the mutating call.
///
/// # Usage
///
/// ```ignore
/// let mut settings = ConfigSettings::from_manager(&manager)?;
/// settings.add_observer(|s: &ConfigSettings| println!("now showing {}", s.url()));
/// settings.load()?;
/// settings.rotate_view();
/// ```
pub struct ConfigSettings {
    view_store: Box<dyn ViewStore>,
    settings_store: Box<dyn SettingsStore>,
    username_store: Box<dyn UsernameMapStore>,

    // Views and rotation cursor
    views: Vec<ViewSettings>,
    current_index: usize,
    current: ViewSettings,

    // Scalar settings
    poll_frequency: u32,
    show_countdown: bool,
    show_progress: bool,
    play_sounds: bool,
    play_speech: bool,
    broken_build_sound: String,
    fixed_build_sound: String,
    broken_build_text: String,
    fixed_build_text: String,
    speech_voice_name: String,
    breaker_guilt_strategy: GuiltStrategy,
    username_map: IndexMap<String, String>,

    observers: Vec<Box<dyn ConfigObserver>>,
    field_listeners: Vec<FieldListener>,
}

impl ConfigSettings {
    /// Create an empty store over the given collaborators. Call
    /// [`load`](Self::load) to populate it.
    pub fn new(
        view_store: impl ViewStore + 'static,
        settings_store: impl SettingsStore + 'static,
        username_store: impl UsernameMapStore + 'static,
    ) -> Self {
        Self {
            view_store: Box::new(view_store),
            settings_store: Box::new(settings_store),
            username_store: Box::new(username_store),
            views: Vec::new(),
            current_index: 0,
            current: ViewSettings::default(),
            poll_frequency: DEFAULT_POLL_FREQUENCY,
            show_countdown: false,
            show_progress: false,
            play_sounds: false,
            play_speech: false,
            broken_build_sound: String::new(),
            fixed_build_sound: String::new(),
            broken_build_text: String::new(),
            fixed_build_text: String::new(),
            speech_voice_name: String::new(),
            breaker_guilt_strategy: GuiltStrategy::default(),
            username_map: IndexMap::new(),
            observers: Vec::new(),
            field_listeners: Vec::new(),
        }
    }

    /// Create a store backed by the YAML files of a configuration directory.
    pub fn from_manager(manager: &ConfigManager) -> anyhow::Result<Self> {
        Ok(Self::new(
            manager.view_store(),
            manager.settings_store()?,
            manager.username_store(),
        ))
    }

    /// Reload views, scalar settings and the username map from the stores.
    ///
    /// Everything is read before anything is applied. On error the store
    /// keeps its previous views, current view and scalars, and no listener
    /// is notified. On success the first view becomes current.
    pub fn load(&mut self) -> Result<(), ConfigError> {
        self.settings_store.reload()?;

        let views = self.view_store.read()?;

        let store = self.settings_store.as_ref();
        let poll_frequency = store.get_int_property(keys::POLL_FREQUENCY, DEFAULT_POLL_FREQUENCY.into());
        let show_countdown = store.get_bool_property(keys::SHOW_COUNTDOWN)?;
        let show_progress = store.get_bool_property(keys::SHOW_PROGRESS)?;
        let play_sounds = store.get_bool_property(keys::PLAY_SOUNDS)?;
        let play_speech = store.get_bool_property(keys::PLAY_SPEECH)?;
        let broken_build_sound = store.required_property(keys::BROKEN_BUILD_SOUND)?;
        let fixed_build_sound = store.required_property(keys::FIXED_BUILD_SOUND)?;
        let broken_build_text = store.required_property(keys::BROKEN_BUILD_TEXT)?;
        let fixed_build_text = store.required_property(keys::FIXED_BUILD_TEXT)?;
        let speech_voice_name = store.required_property(keys::SPEECH_VOICE_NAME)?;
        let guilt_strategy = store.required_property(keys::BREAKER_GUILT_STRATEGY)?;

        let username_map = self.username_store.read()?;

        let poll_frequency = u32::try_from(poll_frequency)
            .ok()
            .filter(|seconds| *seconds > 0)
            .unwrap_or_else(|| {
                tracing::warn!(
                    "Poll frequency {} is not a positive number of seconds, using {}",
                    poll_frequency,
                    DEFAULT_POLL_FREQUENCY
                );
                DEFAULT_POLL_FREQUENCY
            });

        self.views = views;
        self.current_index = 0;
        match self.views.first().cloned() {
            Some(view) => self.apply_view(view),
            None => {
                tracing::warn!("No views configured, nothing to monitor");
                self.apply_view(ViewSettings::default());
            }
        }

        self.set_poll_frequency(poll_frequency);
        self.set_show_countdown(show_countdown);
        self.set_show_progress(show_progress);
        self.set_play_sounds(play_sounds);
        self.set_play_speech(play_speech);
        self.set_broken_build_sound(broken_build_sound);
        self.set_fixed_build_sound(fixed_build_sound);
        self.set_broken_build_text(broken_build_text);
        self.set_fixed_build_text(fixed_build_text);
        self.set_speech_voice_name(speech_voice_name);
        self.set_breaker_guilt_strategy(GuiltStrategy::from_key(&guilt_strategy));
        self.username_map = username_map;

        tracing::info!(
            "Loaded configuration: views={}, poll_frequency={}s, sounds={}, speech={}",
            self.views.len(),
            self.poll_frequency,
            self.play_sounds,
            self.play_speech
        );
        Ok(())
    }

    /// Advance to the next view (round-robin) and notify observers.
    ///
    /// Does nothing with fewer than two views.
    pub fn rotate_view(&mut self) {
        if self.views.len() < 2 {
            return;
        }

        self.current_index = (self.current_index + 1) % self.views.len();
        let view = self.views[self.current_index].clone();
        tracing::debug!("Rotating to view {} ({})", self.current_index, view.id);

        self.apply_view(view);
        self.notify_observers();
    }

    /// Make the view at `index` current without notifying observers.
    ///
    /// Rotation continues from this view.
    pub fn update_view_settings(&mut self, index: usize) -> Result<(), ConfigError> {
        let view = self
            .views
            .get(index)
            .cloned()
            .ok_or(ConfigError::ViewIndexOutOfRange {
                index,
                count: self.views.len(),
            })?;

        self.current_index = index;
        self.apply_view(view);
        Ok(())
    }

    fn apply_view(&mut self, view: ViewSettings) {
        self.current.id = view.id;
        self.set_url(view.url);
        self.set_skin_name(view.skin_name);
        self.set_project_name_regex(view.project_name_regex);
        self.set_category_regex(view.category_regex);
    }

    /// Persist scalar settings.
    ///
    /// Failures are logged and swallowed: the in-memory state stays
    /// authoritative and an unattended radiator must not go down over it.
    pub fn save(&mut self) {
        if let Err(e) = self.write_settings() {
            tracing::error!("Failed to save settings: {}", e);
        }
    }

    fn write_settings(&mut self) -> Result<(), ConfigError> {
        let values = self.scalar_values();
        let store = self.settings_store.as_mut();

        for (key, value) in &values {
            store.set_property(key, value);
        }
        store.flush()
    }

    fn scalar_values(&self) -> [(&'static str, String); 11] {
        [
            (keys::POLL_FREQUENCY, self.poll_frequency.to_string()),
            (keys::SHOW_COUNTDOWN, self.show_countdown.to_string()),
            (keys::SHOW_PROGRESS, self.show_progress.to_string()),
            (keys::PLAY_SOUNDS, self.play_sounds.to_string()),
            (keys::PLAY_SPEECH, self.play_speech.to_string()),
            (keys::BROKEN_BUILD_SOUND, self.broken_build_sound.clone()),
            (keys::FIXED_BUILD_SOUND, self.fixed_build_sound.clone()),
            (keys::BROKEN_BUILD_TEXT, self.broken_build_text.clone()),
            (keys::FIXED_BUILD_TEXT, self.fixed_build_text.clone()),
            (keys::SPEECH_VOICE_NAME, self.speech_voice_name.clone()),
            (
                keys::BREAKER_GUILT_STRATEGY,
                self.breaker_guilt_strategy.as_key().to_string(),
            ),
        ]
    }

    /// Write the current view back to view storage, keyed by its id.
    ///
    /// The in-memory view list is updated too, so later rotations show the
    /// edited values.
    pub fn persist_current_view(&mut self) -> Result<(), ConfigError> {
        let view = self.current.clone();
        self.view_store.write(&view.id, &view)?;

        if let Some(entry) = self.views.iter_mut().find(|v| v.id == view.id) {
            *entry = view;
        }

        tracing::info!("Persisted view '{}'", self.current.id);
        Ok(())
    }

    /// Register an observer for post-rotation notifications.
    pub fn add_observer<O: ConfigObserver + 'static>(&mut self, observer: O) {
        self.observers.push(Box::new(observer));
    }

    /// Register a callback invoked with each field that actually changes.
    pub fn add_field_listener<F: Fn(ConfigField) + 'static>(&mut self, listener: F) {
        self.field_listeners.push(Box::new(listener));
    }

    pub fn notify_observers(&self) {
        for observer in &self.observers {
            observer.config_updated(self);
        }
    }

    // Views

    pub fn views(&self) -> &[ViewSettings] {
        &self.views
    }

    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_view(&self) -> &ViewSettings {
        &self.current
    }

    pub fn id(&self) -> &str {
        &self.current.id
    }

    pub fn url(&self) -> &str {
        &self.current.url
    }

    pub fn skin_name(&self) -> &str {
        &self.current.skin_name
    }

    pub fn project_name_regex(&self) -> &str {
        &self.current.project_name_regex
    }

    pub fn category_regex(&self) -> &str {
        &self.current.category_regex
    }

    /// Resolve the current view's URL field
    pub fn address(&self) -> CradiatorAddress {
        CradiatorAddress::parse(&self.current.url)
    }

    pub fn project_filter(&self) -> Result<ProjectFilter, ConfigError> {
        Ok(ProjectFilter::new(
            &self.current.project_name_regex,
            &self.current.category_regex,
        )?)
    }

    pub fn set_url(&mut self, url: impl Into<String>) -> bool {
        assign(&mut self.current.url, url.into(), ConfigField::Url, &self.field_listeners)
    }

    pub fn set_skin_name(&mut self, skin_name: impl Into<String>) -> bool {
        assign(
            &mut self.current.skin_name,
            skin_name.into(),
            ConfigField::SkinName,
            &self.field_listeners,
        )
    }

    pub fn set_project_name_regex(&mut self, pattern: impl Into<String>) -> bool {
        assign(
            &mut self.current.project_name_regex,
            pattern.into(),
            ConfigField::ProjectNameRegex,
            &self.field_listeners,
        )
    }

    pub fn set_category_regex(&mut self, pattern: impl Into<String>) -> bool {
        assign(
            &mut self.current.category_regex,
            pattern.into(),
            ConfigField::CategoryRegex,
            &self.field_listeners,
        )
    }

    // Scalar settings

    /// Interval at which to poll, in seconds
    pub fn poll_frequency(&self) -> u32 {
        self.poll_frequency
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.poll_frequency))
    }

    /// Zero is not a valid interval and resets to the default.
    pub fn set_poll_frequency(&mut self, seconds: u32) -> bool {
        let seconds = if seconds == 0 {
            DEFAULT_POLL_FREQUENCY
        } else {
            seconds
        };
        assign(
            &mut self.poll_frequency,
            seconds,
            ConfigField::PollFrequency,
            &self.field_listeners,
        )
    }

    pub fn show_countdown(&self) -> bool {
        self.show_countdown
    }

    pub fn set_show_countdown(&mut self, value: bool) -> bool {
        assign(&mut self.show_countdown, value, ConfigField::ShowCountdown, &self.field_listeners)
    }

    pub fn show_progress(&self) -> bool {
        self.show_progress
    }

    pub fn set_show_progress(&mut self, value: bool) -> bool {
        assign(&mut self.show_progress, value, ConfigField::ShowProgress, &self.field_listeners)
    }

    pub fn play_sounds(&self) -> bool {
        self.play_sounds
    }

    pub fn set_play_sounds(&mut self, value: bool) -> bool {
        assign(&mut self.play_sounds, value, ConfigField::PlaySounds, &self.field_listeners)
    }

    pub fn play_speech(&self) -> bool {
        self.play_speech
    }

    pub fn set_play_speech(&mut self, value: bool) -> bool {
        assign(&mut self.play_speech, value, ConfigField::PlaySpeech, &self.field_listeners)
    }

    pub fn broken_build_sound(&self) -> &str {
        &self.broken_build_sound
    }

    pub fn set_broken_build_sound(&mut self, value: impl Into<String>) -> bool {
        assign(
            &mut self.broken_build_sound,
            value.into(),
            ConfigField::BrokenBuildSound,
            &self.field_listeners,
        )
    }

    pub fn fixed_build_sound(&self) -> &str {
        &self.fixed_build_sound
    }

    pub fn set_fixed_build_sound(&mut self, value: impl Into<String>) -> bool {
        assign(
            &mut self.fixed_build_sound,
            value.into(),
            ConfigField::FixedBuildSound,
            &self.field_listeners,
        )
    }

    pub fn broken_build_text(&self) -> &str {
        &self.broken_build_text
    }

    pub fn set_broken_build_text(&mut self, value: impl Into<String>) -> bool {
        assign(
            &mut self.broken_build_text,
            value.into(),
            ConfigField::BrokenBuildText,
            &self.field_listeners,
        )
    }

    pub fn fixed_build_text(&self) -> &str {
        &self.fixed_build_text
    }

    pub fn set_fixed_build_text(&mut self, value: impl Into<String>) -> bool {
        assign(
            &mut self.fixed_build_text,
            value.into(),
            ConfigField::FixedBuildText,
            &self.field_listeners,
        )
    }

    pub fn speech_voice_name(&self) -> &str {
        &self.speech_voice_name
    }

    pub fn set_speech_voice_name(&mut self, value: impl Into<String>) -> bool {
        assign(
            &mut self.speech_voice_name,
            value.into(),
            ConfigField::SpeechVoiceName,
            &self.field_listeners,
        )
    }

    pub fn breaker_guilt_strategy(&self) -> GuiltStrategy {
        self.breaker_guilt_strategy
    }

    pub fn set_breaker_guilt_strategy(&mut self, strategy: GuiltStrategy) -> bool {
        assign(
            &mut self.breaker_guilt_strategy,
            strategy,
            ConfigField::BreakerGuiltStrategy,
            &self.field_listeners,
        )
    }

    pub fn username_map(&self) -> &IndexMap<String, String> {
        &self.username_map
    }

    /// Display name for a source-control user, or the name itself if unmapped
    pub fn display_name<'a>(&'a self, username: &'a str) -> &'a str {
        self.username_map
            .get(username)
            .map(String::as_str)
            .unwrap_or(username)
    }
}

impl fmt::Display for ConfigSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Url={}, SkinName={}, PollFrequency={}, ProjectNameRegEx={}, CategoryRegEx={}, \
             ShowCountdown={}, ShowProgress={}, PlaySounds={}, PlaySpeech={}, \
             BrokenBuildSound={}, BrokenBuildText={}, FixedBuildSound={}, FixedBuildText={}, \
             SpeechVoiceName={}, BreakerGuiltStrategy={}",
            self.current.url,
            self.current.skin_name,
            self.poll_frequency,
            self.current.project_name_regex,
            self.current.category_regex,
            self.show_countdown,
            self.show_progress,
            self.play_sounds,
            self.play_speech,
            self.broken_build_sound,
            self.broken_build_text,
            self.fixed_build_sound,
            self.fixed_build_text,
            self.speech_voice_name,
            self.breaker_guilt_strategy
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_settings;
    use crate::config::store::{MockSettingsStore, MockUsernameMapStore, MockViewStore};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    fn test_views(count: usize) -> Vec<ViewSettings> {
        (0..count)
            .map(|i| {
                ViewSettings::new(format!("view{i}"), format!("http://server{i}/ccnet"))
                    .with_skin(format!("Skin{i}"))
            })
            .collect()
    }

    fn mock_views(views: Vec<ViewSettings>) -> MockViewStore {
        let mut store = MockViewStore::new();
        store.expect_read().returning(move || Ok(views.clone()));
        store
    }

    fn mock_settings(values: IndexMap<String, String>) -> MockSettingsStore {
        let mut store = MockSettingsStore::new();
        store.expect_reload().returning(|| Ok(()));
        store
            .expect_get_property()
            .returning(move |key| values.get(key).cloned());
        store
    }

    fn mock_usernames(map: IndexMap<String, String>) -> MockUsernameMapStore {
        let mut store = MockUsernameMapStore::new();
        store.expect_read().returning(move || Ok(map.clone()));
        store
    }

    fn loaded_settings(view_count: usize) -> ConfigSettings {
        let mut settings = ConfigSettings::new(
            mock_views(test_views(view_count)),
            mock_settings(default_settings()),
            mock_usernames(IndexMap::new()),
        );
        settings.load().unwrap();
        settings
    }

    fn record_fields(settings: &mut ConfigSettings) -> Rc<RefCell<Vec<ConfigField>>> {
        let fields = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&fields);
        settings.add_field_listener(move |field| sink.borrow_mut().push(field));
        fields
    }

    fn count_updates(settings: &mut ConfigSettings) -> Rc<Cell<usize>> {
        let count = Rc::new(Cell::new(0));
        let sink = Rc::clone(&count);
        settings.add_observer(move |_: &ConfigSettings| sink.set(sink.get() + 1));
        count
    }

    #[test]
    fn test_load_selects_first_view() {
        let settings = loaded_settings(3);

        assert_eq!(settings.view_count(), 3);
        assert_eq!(settings.current_index(), 0);
        assert_eq!(settings.id(), "view0");
        assert_eq!(settings.url(), "http://server0/ccnet");
        assert_eq!(settings.skin_name(), "Skin0");
    }

    #[test]
    fn test_load_scalar_settings() {
        let mut values = default_settings();
        values.insert(keys::POLL_FREQUENCY.to_string(), "45".to_string());
        values.insert(keys::PLAY_SPEECH.to_string(), "True".to_string());
        values.insert(keys::SPEECH_VOICE_NAME.to_string(), "Zira".to_string());
        values.insert(keys::BREAKER_GUILT_STRATEGY.to_string(), "First".to_string());

        let mut settings = ConfigSettings::new(
            mock_views(test_views(1)),
            mock_settings(values),
            mock_usernames(IndexMap::new()),
        );
        settings.load().unwrap();

        assert_eq!(settings.poll_frequency(), 45);
        assert_eq!(settings.poll_interval(), Duration::from_secs(45));
        assert!(settings.play_speech());
        assert!(!settings.play_sounds());
        assert!(settings.show_countdown());
        assert_eq!(settings.speech_voice_name(), "Zira");
        assert_eq!(settings.breaker_guilt_strategy(), GuiltStrategy::First);
    }

    #[test]
    fn test_poll_frequency_defaults() {
        for raw in [None, Some("0"), Some("-5"), Some("often")] {
            let mut values = default_settings();
            match raw {
                Some(value) => {
                    values.insert(keys::POLL_FREQUENCY.to_string(), value.to_string());
                }
                None => {
                    values.shift_remove(keys::POLL_FREQUENCY);
                }
            }

            let mut settings = ConfigSettings::new(
                mock_views(test_views(1)),
                mock_settings(values),
                mock_usernames(IndexMap::new()),
            );
            settings.load().unwrap();
            assert_eq!(settings.poll_frequency(), DEFAULT_POLL_FREQUENCY, "input {raw:?}");
        }
    }

    #[test]
    fn test_unknown_guilt_strategy_is_last() {
        let mut values = default_settings();
        values.insert(keys::BREAKER_GUILT_STRATEGY.to_string(), "Everyone".to_string());

        let mut settings = ConfigSettings::new(
            mock_views(test_views(1)),
            mock_settings(values),
            mock_usernames(IndexMap::new()),
        );
        settings.load().unwrap();
        assert_eq!(settings.breaker_guilt_strategy(), GuiltStrategy::Last);
    }

    #[test]
    fn test_load_missing_required_key() {
        let mut values = default_settings();
        values.shift_remove(keys::PLAY_SPEECH);

        let mut settings = ConfigSettings::new(
            mock_views(test_views(1)),
            mock_settings(values),
            mock_usernames(IndexMap::new()),
        );
        let err = settings.load().unwrap_err();

        assert!(matches!(err, ConfigError::MissingSetting { ref key } if key == "PlaySpeech"));
        assert!(err.to_string().contains("'PlaySpeech'"));
    }

    #[test]
    fn test_failed_load_keeps_previous_state() {
        let views = Arc::new(Mutex::new(test_views(2)));
        let values = Arc::new(Mutex::new(default_settings()));

        let mut view_store = MockViewStore::new();
        let view_source = Arc::clone(&views);
        view_store
            .expect_read()
            .returning(move || Ok(view_source.lock().unwrap().clone()));

        let mut settings_store = MockSettingsStore::new();
        settings_store.expect_reload().returning(|| Ok(()));
        let value_source = Arc::clone(&values);
        settings_store
            .expect_get_property()
            .returning(move |key| value_source.lock().unwrap().get(key).cloned());

        let mut settings =
            ConfigSettings::new(view_store, settings_store, mock_usernames(IndexMap::new()));
        settings.load().unwrap();
        settings.rotate_view();

        *views.lock().unwrap() = vec![ViewSettings::new("b", "http://b")];
        {
            let mut values = values.lock().unwrap();
            values.insert(keys::POLL_FREQUENCY.to_string(), "99".to_string());
            values.shift_remove(keys::SPEECH_VOICE_NAME);
        }

        let fields = record_fields(&mut settings);
        let err = settings.load().unwrap_err();

        assert!(matches!(err, ConfigError::MissingSetting { ref key } if key == "SpeechVoiceName"));
        assert_eq!(settings.url(), "http://server1/ccnet");
        assert_eq!(settings.view_count(), 2);
        assert_eq!(settings.current_index(), 1);
        assert_eq!(settings.poll_frequency(), DEFAULT_POLL_FREQUENCY);
        assert!(fields.borrow().is_empty());
    }

    #[test]
    fn test_failed_username_read_keeps_previous_state() {
        let fail = Arc::new(AtomicBool::new(false));

        let mut usernames = MockUsernameMapStore::new();
        let should_fail = Arc::clone(&fail);
        usernames.expect_read().returning(move || {
            if should_fail.load(Ordering::SeqCst) {
                Err(ConfigError::Read {
                    path: "Usernames.yaml".into(),
                    source: std::io::Error::other("permission denied"),
                })
            } else {
                Ok(IndexMap::new())
            }
        });

        let mut values = default_settings();
        values.insert(keys::PLAY_SOUNDS.to_string(), "true".to_string());

        let mut settings = ConfigSettings::new(
            mock_views(test_views(2)),
            mock_settings(values),
            usernames,
        );
        settings.set_url("http://before/ccnet");
        let fields = record_fields(&mut settings);

        fail.store(true, Ordering::SeqCst);
        assert!(matches!(settings.load(), Err(ConfigError::Read { .. })));

        assert_eq!(settings.url(), "http://before/ccnet");
        assert_eq!(settings.view_count(), 0);
        assert!(!settings.play_sounds());
        assert!(fields.borrow().is_empty());

        fail.store(false, Ordering::SeqCst);
        settings.load().unwrap();
        assert_eq!(settings.view_count(), 2);
        assert!(settings.play_sounds());
    }

    #[test]
    fn test_load_reloads_settings_store_first() {
        let mut store = MockSettingsStore::new();
        store.expect_reload().times(1).returning(|| {
            Err(ConfigError::Parse {
                path: "Settings.yaml".into(),
                source: serde_yaml_ng::from_str::<u32>("[").unwrap_err(),
            })
        });

        let mut views = MockViewStore::new();
        views.expect_read().never();

        let mut settings = ConfigSettings::new(views, store, mock_usernames(IndexMap::new()));
        assert!(matches!(settings.load(), Err(ConfigError::Parse { .. })));
        assert_eq!(settings.view_count(), 0);
    }

    #[test]
    fn test_load_without_views() {
        let mut settings = loaded_settings(0);
        let updates = count_updates(&mut settings);

        assert_eq!(settings.url(), "");
        assert!(!settings.address().is_valid());

        settings.rotate_view();
        assert_eq!(updates.get(), 0);
    }

    #[test]
    fn test_rotate_single_view_is_noop() {
        let mut settings = loaded_settings(1);
        let fields = record_fields(&mut settings);
        let updates = count_updates(&mut settings);

        settings.rotate_view();
        settings.rotate_view();

        assert_eq!(settings.url(), "http://server0/ccnet");
        assert!(fields.borrow().is_empty());
        assert_eq!(updates.get(), 0);
    }

    #[test]
    fn test_rotate_visits_every_view_before_repeating() {
        let mut settings = loaded_settings(3);

        let mut visited = Vec::new();
        for _ in 0..3 {
            settings.rotate_view();
            visited.push(settings.id().to_string());
        }
        assert_eq!(visited, ["view1", "view2", "view0"]);

        settings.rotate_view();
        assert_eq!(settings.id(), visited[0]);
    }

    #[test]
    fn test_rotate_notifies_fields_then_observers_once() {
        let mut settings = loaded_settings(2);

        let events = Rc::new(RefCell::new(Vec::new()));
        let field_sink = Rc::clone(&events);
        settings.add_field_listener(move |field| field_sink.borrow_mut().push(field.to_string()));
        let observer_sink = Rc::clone(&events);
        settings.add_observer(move |s: &ConfigSettings| {
            observer_sink.borrow_mut().push(format!("updated:{}", s.url()))
        });

        settings.rotate_view();

        assert_eq!(
            *events.borrow(),
            ["URL", "SkinName", "updated:http://server1/ccnet"]
        );
    }

    #[test]
    fn test_rotate_identical_views_still_broadcasts() {
        let views = vec![
            ViewSettings::new("a", "http://same"),
            ViewSettings::new("b", "http://same"),
        ];
        let mut settings = ConfigSettings::new(
            mock_views(views),
            mock_settings(default_settings()),
            mock_usernames(IndexMap::new()),
        );
        settings.load().unwrap();
        let fields = record_fields(&mut settings);
        let updates = count_updates(&mut settings);

        settings.rotate_view();

        assert_eq!(settings.id(), "b");
        assert!(fields.borrow().is_empty());
        assert_eq!(updates.get(), 1);
    }

    #[test]
    fn test_setter_only_notifies_on_change() {
        let mut settings = loaded_settings(1);
        let fields = record_fields(&mut settings);

        assert!(!settings.set_poll_frequency(30));
        assert!(!settings.set_skin_name("Skin0"));
        assert!(fields.borrow().is_empty());

        assert!(settings.set_poll_frequency(60));
        assert!(settings.set_play_sounds(true));
        assert!(!settings.set_play_sounds(true));
        assert_eq!(
            *fields.borrow(),
            [ConfigField::PollFrequency, ConfigField::PlaySounds]
        );
        assert_eq!(fields.borrow()[0].to_string(), "PollFrequency");
    }

    #[test]
    fn test_zero_poll_frequency_resets_to_default() {
        let mut settings = loaded_settings(1);
        settings.set_poll_frequency(90);

        assert!(settings.set_poll_frequency(0));
        assert_eq!(settings.poll_frequency(), DEFAULT_POLL_FREQUENCY);
    }

    #[test]
    fn test_update_view_settings_by_index() {
        let mut settings = loaded_settings(3);
        let fields = record_fields(&mut settings);
        let updates = count_updates(&mut settings);

        settings.update_view_settings(2).unwrap();

        assert_eq!(settings.id(), "view2");
        assert_eq!(*fields.borrow(), [ConfigField::Url, ConfigField::SkinName]);
        assert_eq!(updates.get(), 0);

        // Rotation carries on from the selected view
        settings.rotate_view();
        assert_eq!(settings.id(), "view0");
    }

    #[test]
    fn test_update_view_settings_out_of_range() {
        let mut settings = loaded_settings(2);
        let err = settings.update_view_settings(5).unwrap_err();

        assert!(matches!(err, ConfigError::ViewIndexOutOfRange { index: 5, count: 2 }));
        assert_eq!(settings.id(), "view0");
    }

    #[test]
    fn test_save_writes_every_scalar() {
        let written = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&written);

        let mut store = mock_settings(default_settings());
        store
            .expect_set_property()
            .times(11)
            .returning(move |key, value| {
                sink.lock().unwrap().push((key.to_string(), value.to_string()));
            });
        store.expect_flush().times(1).returning(|| Ok(()));

        let mut settings =
            ConfigSettings::new(mock_views(test_views(1)), store, mock_usernames(IndexMap::new()));
        settings.load().unwrap();
        settings.set_poll_frequency(15);
        settings.set_breaker_guilt_strategy(GuiltStrategy::First);
        settings.save();

        let written = written.lock().unwrap();
        assert!(written.contains(&("PollFrequency".to_string(), "15".to_string())));
        assert!(written.contains(&("BreakerGuiltStrategy".to_string(), "First".to_string())));
        assert!(written.contains(&("ShowCountdown".to_string(), "true".to_string())));
        assert!(!written.iter().any(|(key, _)| key == "URL"));
    }

    #[test]
    fn test_save_failure_is_swallowed() {
        let mut store = mock_settings(default_settings());
        store.expect_set_property().times(11).returning(|_, _| ());
        store.expect_flush().times(1).returning(|| {
            Err(ConfigError::Write {
                path: "Settings.yaml".into(),
                source: std::io::Error::other("read-only file system"),
            })
        });

        let mut settings =
            ConfigSettings::new(mock_views(test_views(1)), store, mock_usernames(IndexMap::new()));
        settings.load().unwrap();
        settings.set_play_sounds(true);

        // The failure is logged; the log line itself is not captured here
        settings.save();

        assert!(settings.play_sounds());
    }

    #[test]
    fn test_persist_current_view() {
        let written = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&written);

        let mut views = mock_views(test_views(2));
        views.expect_write().times(1).returning(move |id, view| {
            sink.lock()
                .unwrap()
                .push((id.to_string(), ViewSettings::clone(view)));
            Ok(())
        });

        let mut settings =
            ConfigSettings::new(views, mock_settings(default_settings()), mock_usernames(IndexMap::new()));
        settings.load().unwrap();
        settings.rotate_view();
        settings.set_url("http://edited/ccnet");
        settings.persist_current_view().unwrap();

        let written = written.lock().unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].0, "view1");
        assert_eq!(written[0].1.url, "http://edited/ccnet");
        assert_eq!(written[0].1.skin_name, "Skin1");

        // The edited view comes back around on rotation
        settings.rotate_view();
        settings.rotate_view();
        assert_eq!(settings.url(), "http://edited/ccnet");
    }

    #[test]
    fn test_display_name_mapping() {
        let mut map = IndexMap::new();
        map.insert("jdoe".to_string(), "Jane Doe".to_string());

        let mut settings = ConfigSettings::new(
            mock_views(test_views(1)),
            mock_settings(default_settings()),
            mock_usernames(map),
        );
        settings.load().unwrap();

        assert_eq!(settings.display_name("jdoe"), "Jane Doe");
        assert_eq!(settings.display_name("someone"), "someone");
    }

    #[test]
    fn test_address_and_filter_follow_current_view() {
        let views = vec![
            ViewSettings::new("a", "debug"),
            ViewSettings::new("b", "http://one http://two/cc.xml").with_filters("^Core", ""),
        ];
        let mut settings = ConfigSettings::new(
            mock_views(views),
            mock_settings(default_settings()),
            mock_usernames(IndexMap::new()),
        );
        settings.load().unwrap();
        assert!(settings.address().is_debug());

        settings.rotate_view();
        let address = settings.address();
        assert_eq!(address.addresses().len(), 2);

        let filter = settings.project_filter().unwrap();
        assert!(filter.matches("Core.Build", "anything"));
        assert!(!filter.matches("Web.Build", "anything"));

        settings.set_project_name_regex("(");
        assert!(matches!(settings.project_filter(), Err(ConfigError::InvalidPattern(_))));
    }

    #[test]
    fn test_display_summary() {
        let settings = loaded_settings(1);
        let summary = settings.to_string();

        assert!(summary.starts_with("Url=http://server0/ccnet, SkinName=Skin0, PollFrequency=30"));
        assert!(summary.ends_with("BreakerGuiltStrategy=Last"));
    }
}
