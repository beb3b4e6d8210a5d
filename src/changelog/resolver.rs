use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::{ChangelogError, ChangelogResult};
use crate::github::types::Milestone;
use crate::github::GitHubClient;

pub const UNRELEASED_VERSION: &str = "<RELEASE_VERSION>";
const VERSION_TAG_PREFIX: &str = "v";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryRange {
    Milestone(String),
    Tags { since: String, until: Option<String> },
}

/// What the issues query and the document header need once names have been
/// resolved against the API.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParams {
    pub milestone: Option<u64>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub version: String,
    pub release_date: Option<DateTime<Utc>>,
}

impl QueryParams {
    /// `since` value for the issues listing, in the ISO 8601 form GitHub
    /// expects.
    pub fn since_param(&self) -> Option<String> {
        self.since.map(|d| d.format("%Y-%m-%dT%H:%M:%SZ").to_string())
    }

    /// Whether a close time falls inside the tag interval. Without an
    /// interval every item is in range.
    pub fn in_range(&self, closed_at: Option<DateTime<Utc>>) -> bool {
        if self.since.is_none() && self.until.is_none() {
            return true;
        }
        let Some(closed) = closed_at else {
            return false;
        };
        self.since.map_or(true, |since| closed >= since)
            && self.until.map_or(true, |until| closed <= until)
    }
}

pub struct Resolver<'a> {
    client: &'a GitHubClient,
}

impl<'a> Resolver<'a> {
    pub fn new(client: &'a GitHubClient) -> Self {
        Self { client }
    }

    pub async fn resolve(&self, range: &QueryRange) -> ChangelogResult<QueryParams> {
        match range {
            QueryRange::Milestone(title) => {
                let milestones = self.client.milestones().await?;
                let milestone = find_milestone(&milestones, title)
                    .ok_or_else(|| ChangelogError::MilestoneNotFound(title.clone()))?;
                info!("Milestone `{}` resolved to #{}", title, milestone.number);

                Ok(QueryParams {
                    milestone: Some(milestone.number),
                    since: None,
                    until: None,
                    version: version_from_milestone(&milestone.title),
                    release_date: milestone.closed_at,
                })
            }
            QueryRange::Tags { since, until } => {
                let since_date = self.tag_date(since).await?;
                let until_date = match until {
                    Some(tag) => Some(self.tag_date(tag).await?),
                    None => None,
                };
                info!(
                    "Tag range {}..{} resolved to {} - {:?}",
                    since,
                    until.as_deref().unwrap_or("HEAD"),
                    since_date,
                    until_date
                );

                Ok(QueryParams {
                    milestone: None,
                    since: Some(since_date),
                    until: until_date,
                    version: until
                        .clone()
                        .unwrap_or_else(|| UNRELEASED_VERSION.to_string()),
                    release_date: until_date,
                })
            }
        }
    }

    /// Tagger date for annotated tags, committer date for lightweight ones.
    async fn tag_date(&self, tag: &str) -> ChangelogResult<DateTime<Utc>> {
        let git_ref = self.client.tag_ref(tag).await?;
        debug!("Tag {} points at {} {}", tag, git_ref.object.kind, git_ref.object.sha);

        match git_ref.object.kind.as_str() {
            "tag" => Ok(self.client.annotated_tag(&git_ref.object.sha).await?.tagger.date),
            "commit" => Ok(self.client.commit(&git_ref.object.sha).await?.committer.date),
            other => Err(ChangelogError::MalformedResponse(format!(
                "tag `{}` points at unsupported object type `{}`",
                tag, other
            ))),
        }
    }
}

pub fn find_milestone<'m>(milestones: &'m [Milestone], title: &str) -> Option<&'m Milestone> {
    milestones.iter().find(|m| m.title == title)
}

pub fn version_from_milestone(title: &str) -> String {
    title
        .strip_prefix(VERSION_TAG_PREFIX)
        .unwrap_or(title)
        .to_string()
}
