use regex::Regex;

/// Project filter built from a view's project-name and category patterns
///
/// An empty pattern matches everything, so a view with no filters shows
/// every project reported by its feeds.
#[derive(Debug, Clone)]
pub struct ProjectFilter {
    project_name: Option<Regex>,
    category: Option<Regex>,
}

impl ProjectFilter {
    /// Compile both patterns. Whitespace-only patterns count as empty.
    pub fn new(project_name_regex: &str, category_regex: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            project_name: compile(project_name_regex)?,
            category: compile(category_regex)?,
        })
    }

    pub fn matches(&self, project_name: &str, category: &str) -> bool {
        let name_ok = self
            .project_name
            .as_ref()
            .is_none_or(|re| re.is_match(project_name));
        let category_ok = self.category.as_ref().is_none_or(|re| re.is_match(category));

        name_ok && category_ok
    }
}

fn compile(pattern: &str) -> Result<Option<Regex>, regex::Error> {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return Ok(None);
    }
    Regex::new(pattern).map(Some)
}
