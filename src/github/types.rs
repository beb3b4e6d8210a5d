use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Issue record as returned by `GET /repos/{owner}/{repo}/issues`.
///
/// Pull requests come through the same endpoint and carry a `pull_request`
/// object.
#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub html_url: Option<String>,
    pub user: Option<User>,
    #[serde(default)]
    pub labels: Vec<Label>,
    pub closed_at: Option<DateTime<Utc>>,
    pub pull_request: Option<PullRequestRef>,
}

impl Issue {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }

    pub fn label_names(&self) -> Vec<String> {
        self.labels.iter().map(|l| l.name.clone()).collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestRef {
    pub html_url: Option<String>,
    pub merged_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub login: String,
    pub html_url: Option<String>,
}

/// `GET /repos/{owner}/{repo}/pulls/{number}`, trimmed to what the merge and
/// branch checks need.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub merged_at: Option<DateTime<Utc>>,
    pub base: BranchRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BranchRef {
    #[serde(rename = "ref")]
    pub ref_field: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Milestone {
    pub number: u64,
    pub title: String,
    pub closed_at: Option<DateTime<Utc>>,
}

/// `GET /repos/{owner}/{repo}/git/ref/tags/{tag}`
#[derive(Debug, Clone, Deserialize)]
pub struct GitRef {
    #[serde(rename = "ref")]
    pub ref_field: String,
    pub object: GitObject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitObject {
    pub sha: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Annotated tag object.
#[derive(Debug, Clone, Deserialize)]
pub struct GitTag {
    pub tagger: Signature,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitCommit {
    pub committer: Signature,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Signature {
    pub date: DateTime<Utc>,
}

/// Query string for the issues listing.
#[derive(Debug, Clone, Serialize)]
pub struct IssueQuery {
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<String>,
    pub per_page: u8,
    pub page: u32,
}
