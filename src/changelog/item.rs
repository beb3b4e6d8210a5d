use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::github::types::Issue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    Issue,
    PullRequest,
}

/// One closed issue or merged pull request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub number: u64,
    pub title: String,
    pub author: String,
    pub author_url: Option<String>,
    pub labels: Vec<String>,
    pub closed_at: Option<DateTime<Utc>>,
    pub kind: ItemKind,
    pub url: Option<String>,
}

impl Item {
    pub fn is_pull_request(&self) -> bool {
        self.kind == ItemKind::PullRequest
    }

    /// Space-joined label names, the text label regexes are matched against.
    pub fn label_text(&self) -> String {
        self.labels.join(" ")
    }
}

impl From<Issue> for Item {
    fn from(issue: Issue) -> Self {
        let labels = issue.label_names();
        let (kind, closed_at, url) = match issue.pull_request {
            Some(pr) => (
                ItemKind::PullRequest,
                pr.merged_at.or(issue.closed_at),
                issue.html_url.or(pr.html_url),
            ),
            None => (ItemKind::Issue, issue.closed_at, issue.html_url),
        };

        Item {
            number: issue.number,
            title: issue.title,
            author: issue
                .user
                .as_ref()
                .map(|u| u.login.clone())
                .unwrap_or_else(|| "ghost".to_string()),
            author_url: issue.user.and_then(|u| u.html_url),
            labels,
            closed_at,
            kind,
            url,
        }
    }
}
