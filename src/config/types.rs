use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ChangelogError, ChangelogResult};

pub const DEFAULT_SECTION: &str = "Other";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub issue_label_regex: Option<String>,
    pub pr_label_regex: Option<String>,
    pub template: Option<PathBuf>,
    pub default_section: String,
    pub categories: Vec<CategoryConfig>,
}

/// A named section collecting every item carrying one of `labels`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub name: String,
    pub labels: Vec<String>,
}

impl CategoryConfig {
    pub fn new(name: &str, labels: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
        }
    }

    /// Parses the `label:Name` form used on the command line. The name is
    /// whatever follows the last colon, so scoped labels like `type:bug`
    /// work, and names cannot contain a colon (those go in `[[categories]]`).
    /// A bare `label` uses the label itself as the section name.
    pub fn parse_group(group: &str) -> ChangelogResult<Self> {
        let (label, name) = match group.rsplit_once(':') {
            Some((label, name)) => (label.trim(), name.trim()),
            None => (group.trim(), group.trim()),
        };
        if label.is_empty() || name.is_empty() {
            return Err(ChangelogError::InvalidLabelGroup(group.to_string()));
        }
        Ok(Self::new(name, &[label]))
    }

    pub fn matches(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l.eq_ignore_ascii_case(label))
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            issue_label_regex: None,
            pr_label_regex: None,
            template: None,
            default_section: DEFAULT_SECTION.to_string(),
            categories: vec![
                CategoryConfig::new("Bug", &["bug"]),
                CategoryConfig::new("Feature", &["feature"]),
                CategoryConfig::new("Enhancement", &["enhancement"]),
                CategoryConfig::new("Documentation", &["documentation", "docs"]),
            ],
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> ChangelogResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| match e {
            ChangelogError::Config(msg) => {
                ChangelogError::Config(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    pub fn from_toml(content: &str) -> ChangelogResult<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| ChangelogError::Config(e.to_string()))?;
        if let Some(empty) = config.categories.iter().find(|c| c.labels.is_empty()) {
            return Err(ChangelogError::Config(format!(
                "category `{}` has no labels",
                empty.name
            )));
        }
        Ok(config)
    }
}
