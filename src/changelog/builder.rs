use tracing::{debug, info};

use super::classifier::{Changelog, Classifier, LabelFilters};
use super::item::Item;
use super::resolver::{QueryParams, QueryRange, Resolver};
use crate::error::ChangelogResult;
use crate::github::types::Issue;
use crate::github::GitHubClient;

pub struct BuilderConfig {
    /// Only keep pull requests merged into this base branch.
    pub branch: Option<String>,
    pub filters: LabelFilters,
    pub classifier: Classifier,
}

#[derive(Debug)]
pub struct ResolvedChangelog {
    pub params: QueryParams,
    pub changelog: Changelog,
}

pub struct ChangelogBuilder {
    client: GitHubClient,
    config: BuilderConfig,
}

impl ChangelogBuilder {
    pub fn new(client: GitHubClient, config: BuilderConfig) -> Self {
        Self { client, config }
    }

    pub async fn build(&self, range: &QueryRange) -> ChangelogResult<ResolvedChangelog> {
        self.client.check_repository().await?;

        let params = Resolver::new(&self.client).resolve(range).await?;
        let items = self.collect_items(&params).await?;
        info!("Collected {} closed items for {}", items.len(), self.client.repo());

        let changelog = self.config.classifier.classify(items);
        Ok(ResolvedChangelog { params, changelog })
    }

    async fn collect_items(&self, params: &QueryParams) -> ChangelogResult<Vec<Item>> {
        let issues = self
            .client
            .closed_issues(params.milestone, params.since_param())
            .await?;

        let mut items = Vec::with_capacity(issues.len());
        for issue in issues {
            if issue.is_pull_request() && !self.keep_pull_request(&issue).await? {
                continue;
            }

            let item = Item::from(issue);
            if !params.in_range(item.closed_at) {
                debug!("#{} closed outside the tag range", item.number);
                continue;
            }
            if !self.config.filters.keeps(&item) {
                debug!("#{} dropped by label filter", item.number);
                continue;
            }
            items.push(item);
        }

        Ok(items)
    }

    /// Closed-but-unmerged pull requests are dropped, as are pull requests
    /// into other branches when a branch is set.
    async fn keep_pull_request(&self, issue: &Issue) -> ChangelogResult<bool> {
        let merged_hint = issue.pull_request.as_ref().and_then(|pr| pr.merged_at);
        if merged_hint.is_some() && self.config.branch.is_none() {
            return Ok(true);
        }

        let pull = self.client.pull(issue.number).await?;
        if pull.merged_at.is_none() {
            debug!("PR #{} was closed without merging", issue.number);
            return Ok(false);
        }

        match &self.config.branch {
            Some(branch) if &pull.base.ref_field != branch => {
                debug!(
                    "PR #{} targets {} instead of {}",
                    issue.number, pull.base.ref_field, branch
                );
                Ok(false)
            }
            _ => Ok(true),
        }
    }
}
