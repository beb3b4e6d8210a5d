use octocrab::{Octocrab, Page};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use super::types::{GitCommit, GitRef, GitTag, Issue, IssueQuery, Milestone, PullRequest};
use crate::error::{is_not_found, ChangelogError, ChangelogResult};

const PER_PAGE: u8 = 100;

/// `owner/name` repository identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

impl FromStr for RepoId {
    type Err = ChangelogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(RepoId {
                    owner: owner.to_string(),
                    name: name.to_string(),
                })
            }
            _ => Err(ChangelogError::InvalidRepository(s.to_string())),
        }
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone)]
pub enum Credentials {
    Anonymous,
    Basic { user: String, password: String },
    Token(String),
}

pub struct GitHubClient {
    client: Octocrab,
    repo: RepoId,
}

impl GitHubClient {
    pub fn new(repo: RepoId, credentials: Credentials, api_url: Option<&str>) -> ChangelogResult<Self> {
        let mut builder = Octocrab::builder();
        builder = match credentials {
            Credentials::Anonymous => builder,
            Credentials::Basic { user, password } => builder.basic_auth(user, password),
            Credentials::Token(token) => builder.personal_token(token),
        };
        if let Some(url) = api_url {
            builder = builder.base_uri(url)?;
        }
        let client = builder.build()?;
        Ok(Self { client, repo })
    }

    pub fn repo(&self) -> &RepoId {
        &self.repo
    }

    fn route(&self, path: &str) -> String {
        format!("/repos/{}/{}{}", self.repo.owner, self.repo.name, path)
    }

    /// Fails early with a readable error when the owner or repository does
    /// not exist.
    pub async fn check_repository(&self) -> ChangelogResult<()> {
        let owner_route = format!("/users/{}", self.repo.owner);
        match self.client.get::<serde_json::Value, _, ()>(owner_route, None).await {
            Ok(_) => {}
            Err(e) if is_not_found(&e) => {
                return Err(ChangelogError::OwnerNotFound(self.repo.owner.clone()));
            }
            Err(e) => return Err(e.into()),
        }

        match self.client.get::<serde_json::Value, _, ()>(self.route(""), None).await {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Err(ChangelogError::RepositoryNotFound {
                owner: self.repo.owner.clone(),
                name: self.repo.name.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Follows `Link: rel="next"` until the last page.
    async fn get_all_pages<T, P>(&self, route: String, params: &P) -> ChangelogResult<Vec<T>>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        let mut page: Page<T> = self.client.get(&route, Some(params)).await?;
        let mut items = page.take_items();
        let mut pages = 1;

        while let Some(mut next) = self.client.get_page::<T>(&page.next).await? {
            items.extend(next.take_items());
            page = next;
            pages += 1;
        }

        debug!("Fetched {} records in {} page(s) from {}", items.len(), pages, route);
        Ok(items)
    }

    pub async fn milestones(&self) -> ChangelogResult<Vec<Milestone>> {
        let params = [
            ("state", "all".to_string()),
            ("per_page", PER_PAGE.to_string()),
            ("page", "1".to_string()),
        ];
        self.get_all_pages(self.route("/milestones"), &params).await
    }

    pub async fn tag_ref(&self, tag: &str) -> ChangelogResult<GitRef> {
        let route = self.route(&format!("/git/ref/tags/{}", tag));
        match self.client.get::<GitRef, _, ()>(route, None).await {
            Ok(git_ref) => Ok(git_ref),
            Err(e) if is_not_found(&e) => Err(ChangelogError::TagNotFound(tag.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn annotated_tag(&self, sha: &str) -> ChangelogResult<GitTag> {
        let route = self.route(&format!("/git/tags/{}", sha));
        Ok(self.client.get::<GitTag, _, ()>(route, None).await?)
    }

    pub async fn commit(&self, sha: &str) -> ChangelogResult<GitCommit> {
        let route = self.route(&format!("/git/commits/{}", sha));
        Ok(self.client.get::<GitCommit, _, ()>(route, None).await?)
    }

    /// All closed issues and pull requests matching the query, in API order.
    pub async fn closed_issues(&self, milestone: Option<u64>, since: Option<String>) -> ChangelogResult<Vec<Issue>> {
        let query = IssueQuery {
            state: "closed",
            milestone,
            since,
            per_page: PER_PAGE,
            page: 1,
        };
        debug!("Listing closed issues for {} with {:?}", self.repo, query);
        self.get_all_pages(self.route("/issues"), &query).await
    }

    pub async fn pull(&self, number: u64) -> ChangelogResult<PullRequest> {
        let route = self.route(&format!("/pulls/{}", number));
        Ok(self.client.get::<PullRequest, _, ()>(route, None).await?)
    }
}
