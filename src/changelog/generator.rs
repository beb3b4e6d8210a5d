use chrono::{DateTime, Utc};
use handlebars::Handlebars;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;

use super::classifier::{Changelog, Partition};
use super::item::Item;
use super::resolver::QueryParams;
use crate::error::ChangelogResult;
use crate::github::RepoId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown with links to every item and author.
    Changelog,
    /// Same layout without any hyperlinks.
    Release,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "changelog" => Ok(OutputFormat::Changelog),
            "release" => Ok(OutputFormat::Release),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Document header values.
#[derive(Debug, Clone)]
pub struct DocumentHeader {
    pub repo: RepoId,
    pub version: String,
    pub close_date: String,
}

impl DocumentHeader {
    /// Falls back to `today` when the range has no release date yet.
    pub fn new(repo: RepoId, params: &QueryParams, today: DateTime<Utc>) -> Self {
        Self {
            repo,
            version: params.version.clone(),
            close_date: params
                .release_date
                .unwrap_or(today)
                .format("%Y-%m-%d")
                .to_string(),
        }
    }
}

pub struct ChangelogGenerator {
    template_engine: Handlebars<'static>,
    format: OutputFormat,
}

impl ChangelogGenerator {
    pub fn new(format: OutputFormat, template_path: Option<&Path>) -> ChangelogResult<Self> {
        let mut template_engine = Handlebars::new();
        template_engine.register_escape_fn(handlebars::no_escape);

        match template_path {
            Some(path) => {
                let template_content = std::fs::read_to_string(path)?;
                template_engine.register_template_string("custom", template_content)?;
            }
            None => {
                template_engine.register_template_string(
                    "changelog",
                    include_str!("../../templates/changelog.md.hbs"),
                )?;
                template_engine.register_template_string(
                    "release",
                    include_str!("../../templates/release.md.hbs"),
                )?;
            }
        }

        Ok(Self {
            template_engine,
            format,
        })
    }

    pub fn generate(&self, header: &DocumentHeader, changelog: &Changelog) -> ChangelogResult<String> {
        let data = self.template_data(header, changelog);

        let name = if self.template_engine.has_template("custom") {
            "custom"
        } else {
            match self.format {
                OutputFormat::Changelog => "changelog",
                OutputFormat::Release => "release",
            }
        };
        Ok(self.template_engine.render(name, &data)?)
    }

    fn template_data(&self, header: &DocumentHeader, changelog: &Changelog) -> Value {
        json!({
            "format": self.format,
            "version": header.version,
            "close_date": header.close_date,
            "repo_full_name": header.repo.to_string(),
            "repo_owner": header.repo.owner,
            "repo_name": header.repo.name,
            "issues": partition_data(self.format, &changelog.issues, "issue was", "issues were"),
            "pull_requests": partition_data(
                self.format,
                &changelog.pull_requests,
                "pull request was",
                "pull requests were",
            ),
        })
    }
}

fn partition_data(format: OutputFormat, partition: &Partition, singular: &str, plural: &str) -> Value {
    let total = partition.total();
    json!({
        "total": total,
        "summary": if total == 1 { singular } else { plural },
        "sections": partition.sections.iter().map(|section| json!({
            "name": section.name,
            "count": section.items.len(),
            "items": section.items.iter().map(|item| item_data(format, item)).collect::<Vec<_>>(),
        })).collect::<Vec<_>>(),
    })
}

fn item_data(format: OutputFormat, item: &Item) -> Value {
    let title = match format {
        OutputFormat::Changelog => item.title.clone(),
        OutputFormat::Release => escape_link_syntax(&item.title),
    };
    json!({
        "number": item.number,
        "title": title,
        "author": item.author,
        "author_url": item.author_url,
        "url": item.url,
        "labels": item.labels,
        "closed_at": item.closed_at.map(|d| d.format("%Y-%m-%d").to_string()),
    })
}

/// Backslash-escapes the characters Markdown needs to form inline links or
/// autolinks, so titles render as literal text.
fn escape_link_syntax(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '[' | ']' | '<' | '>') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
