use serde::{Deserialize, Serialize};

/// One monitored project: where to fetch it and how to show it
///
/// Stored in `Views.yaml`. The `id` correlates the in-memory view with its
/// persisted entry when the current view is written back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewSettings {
    #[serde(rename = "Id")]
    pub id: String,

    /// Raw address field, resolved with [`crate::services::resolve`]
    #[serde(rename = "Url", default)]
    pub url: String,

    #[serde(rename = "SkinName", default)]
    pub skin_name: String,

    #[serde(rename = "ProjectNameRegex", default)]
    pub project_name_regex: String,

    #[serde(rename = "CategoryRegex", default)]
    pub category_regex: String,
}

impl ViewSettings {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_skin(mut self, skin_name: impl Into<String>) -> Self {
        self.skin_name = skin_name.into();
        self
    }

    pub fn with_filters(
        mut self,
        project_name_regex: impl Into<String>,
        category_regex: impl Into<String>,
    ) -> Self {
        self.project_name_regex = project_name_regex.into();
        self.category_regex = category_regex.into();
        self
    }
}

/// File layout of `Views.yaml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewsFile {
    #[serde(rename = "Views", default)]
    pub views: Vec<ViewSettings>,
}

/// Who gets blamed for a broken build: the first or the last committer
/// in the breaking changeset window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GuiltStrategy {
    First,
    #[default]
    Last,
}

impl GuiltStrategy {
    /// Map the stored setting to a strategy. Only the literal `First` selects
    /// [`GuiltStrategy::First`].
    pub fn from_key(key: &str) -> Self {
        if key == "First" {
            GuiltStrategy::First
        } else {
            GuiltStrategy::Last
        }
    }

    pub fn as_key(&self) -> &'static str {
        match self {
            GuiltStrategy::First => "First",
            GuiltStrategy::Last => "Last",
        }
    }
}

impl std::fmt::Display for GuiltStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_key())
    }
}
