use anyhow::{Context, Result};
use chrono::Utc;
use clap::{ArgGroup, Parser};
use std::path::PathBuf;
use tracing::info;

mod changelog;
mod config;
mod error;
mod github;

use changelog::{
    BuilderConfig, ChangelogBuilder, ChangelogGenerator, Classifier, DocumentHeader,
    LabelFilters, OutputFormat, QueryRange,
};
use config::{CategoryConfig, Config};
use github::{Credentials, GitHubClient, RepoId};

#[derive(Parser, Debug)]
#[command(name = "milestone-changelog")]
#[command(about = "Generate a changelog from the closed issues and merged pull requests of a GitHub milestone or tag range")]
#[command(group(ArgGroup::new("range").required(true).args(["milestone", "since_tag"])))]
struct Cli {
    /// Repository as `owner/name`
    repository: String,

    /// Milestone title
    #[arg(short, long)]
    milestone: Option<String>,

    /// Start of the tag range
    #[arg(long, visible_alias = "st")]
    since_tag: Option<String>,

    /// End of the tag range (open ended if not given)
    #[arg(long, visible_alias = "ut", requires = "since_tag", conflicts_with = "milestone")]
    until_tag: Option<String>,

    /// Output format: `changelog` (with links) or `release` (without)
    #[arg(short = 'f', long, default_value = "changelog")]
    format: OutputFormat,

    /// GitHub user name for basic authentication
    #[arg(short, long, requires = "password")]
    user: Option<String>,

    /// GitHub password for basic authentication
    #[arg(short, long, requires = "user")]
    password: Option<String>,

    /// GitHub token (can also be set via GITHUB_TOKEN env var)
    #[arg(short, long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Only include pull requests merged into this branch
    #[arg(short, long)]
    branch: Option<String>,

    /// Only include issues whose labels match this regex
    #[arg(long, visible_alias = "ilr")]
    issue_label_regex: Option<String>,

    /// Only include pull requests whose labels match this regex
    #[arg(long, visible_alias = "plr")]
    pr_label_regex: Option<String>,

    /// Section definition as `label:Section Name`; replaces the configured categories.
    /// The name is whatever follows the last colon, so it cannot contain one
    /// (use `[[categories]]` in the config file for that)
    #[arg(short = 'g', long = "label-group", value_name = "LABEL:NAME")]
    label_groups: Vec<String>,

    /// Handlebars template used instead of the built-in ones
    #[arg(long)]
    template: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output file path (stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// GitHub API base URL, for GitHub Enterprise
    #[arg(long, env = "GITHUB_API_URL")]
    api_url: Option<String>,
}

impl Cli {
    fn range(&self) -> QueryRange {
        match (&self.milestone, &self.since_tag) {
            (Some(milestone), _) => QueryRange::Milestone(milestone.clone()),
            (None, since) => QueryRange::Tags {
                since: since.clone().unwrap_or_default(),
                until: self.until_tag.clone(),
            },
        }
    }

    /// Explicit basic-auth flags win over a token picked up from the
    /// environment.
    fn credentials(&self) -> Credentials {
        match (&self.user, &self.password, &self.token) {
            (Some(user), Some(password), _) => Credentials::Basic {
                user: user.clone(),
                password: password.clone(),
            },
            (_, _, Some(token)) => Credentials::Token(token.clone()),
            _ => Credentials::Anonymous,
        }
    }

    /// Command-line values override the configuration file.
    fn merge_config(&self, mut config: Config) -> Result<Config> {
        if !self.label_groups.is_empty() {
            config.categories = self
                .label_groups
                .iter()
                .map(|group| CategoryConfig::parse_group(group))
                .collect::<Result<_, _>>()?;
        }
        if self.issue_label_regex.is_some() {
            config.issue_label_regex = self.issue_label_regex.clone();
        }
        if self.pr_label_regex.is_some() {
            config.pr_label_regex = self.pr_label_regex.clone();
        }
        if self.template.is_some() {
            config.template = self.template.clone();
        }
        Ok(config)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout only carries the document
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    run(cli).await
}

async fn run(cli: Cli) -> Result<()> {
    let repo: RepoId = cli.repository.parse()?;
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let config = cli.merge_config(config)?;

    let filters = LabelFilters::new(
        config.issue_label_regex.as_deref(),
        config.pr_label_regex.as_deref(),
    )?;
    let generator = ChangelogGenerator::new(cli.format, config.template.as_deref())?;

    let client = GitHubClient::new(repo.clone(), cli.credentials(), cli.api_url.as_deref())?;
    let builder = ChangelogBuilder::new(
        client,
        BuilderConfig {
            branch: cli.branch.clone(),
            filters,
            classifier: Classifier::new(config.categories, config.default_section),
        },
    );

    let resolved = builder.build(&cli.range()).await?;
    let header = DocumentHeader::new(repo, &resolved.params, Utc::now());
    let content = generator.generate(&header, &resolved.changelog)?;

    if let Some(output_path) = &cli.output {
        std::fs::write(output_path, &content)
            .with_context(|| format!("Failed to write {}", output_path.display()))?;
        info!("Changelog written to {}", output_path.display());
    } else {
        println!("{}", content);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChangelogError;
    use crate::github::client::tests::mock_repository;
    use mockito::{Matcher, Mock, Server, ServerGuard};
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("milestone-changelog").chain(args.iter().copied()))
    }

    fn cli_for(server: &ServerGuard, args: &[&str], output: &Path) -> Cli {
        let mut all = vec![
            "milestone-changelog".to_string(),
            "org/repo".to_string(),
            "--api-url".to_string(),
            server.url(),
        ];
        all.extend(args.iter().map(|a| a.to_string()));
        all.push("--output".to_string());
        all.push(output.display().to_string());
        Cli::try_parse_from(all).unwrap()
    }

    async fn mock_milestone(server: &mut ServerGuard, issues: &str) -> Vec<Mock> {
        vec![
            server
                .mock("GET", "/repos/org/repo/milestones")
                .match_query(Matcher::Any)
                .with_header("content-type", "application/json")
                .with_body(
                    r#"[{"number": 7, "title": "v1.0", "state": "closed", "closed_at": "2024-01-15T00:00:00Z"}]"#,
                )
                .create_async()
                .await,
            server
                .mock("GET", "/repos/org/repo/issues")
                .match_query(Matcher::UrlEncoded("milestone".into(), "7".into()))
                .with_header("content-type", "application/json")
                .with_body(issues)
                .create_async()
                .await,
        ]
    }

    #[test]
    fn milestone_and_since_tag_conflict() {
        assert!(parse(&["org/repo", "-m", "v1.0", "--since-tag", "v0.9"]).is_err());
        assert!(parse(&["org/repo"]).is_err());
    }

    #[test]
    fn short_tag_aliases() {
        let cli = parse(&["org/repo", "--st", "v0.9", "--ut", "v1.0", "-f", "release"]).unwrap();
        assert_eq!(
            cli.range(),
            QueryRange::Tags {
                since: "v0.9".to_string(),
                until: Some("v1.0".to_string()),
            }
        );
        assert_eq!(cli.format, OutputFormat::Release);
    }

    #[test]
    fn until_tag_needs_since_tag() {
        assert!(parse(&["org/repo", "-m", "v1.0", "--until-tag", "v1.0"]).is_err());
    }

    #[test]
    fn password_needs_user() {
        assert!(parse(&["org/repo", "-m", "v1.0", "-p", "secret"]).is_err());
        let cli = parse(&["org/repo", "-m", "v1.0", "-u", "me", "-p", "secret"]).unwrap();
        assert!(matches!(cli.credentials(), Credentials::Basic { ref user, .. } if user == "me"));
    }

    #[test]
    fn label_groups_replace_categories() {
        let cli = parse(&["org/repo", "-m", "v1.0", "-g", "type:bug:Bugs fixed"]).unwrap();
        let config = cli.merge_config(Config::default()).unwrap();
        assert_eq!(config.categories, vec![CategoryConfig::new("Bugs fixed", &["type:bug"])]);

        let cli = parse(&["org/repo", "-m", "v1.0", "-g", "bug:Bugs", "-g", "feature:New"]).unwrap();
        let names: Vec<String> = cli
            .merge_config(Config::default())
            .unwrap()
            .categories
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Bugs".to_string(), "New".to_string()]);
    }

    #[tokio::test]
    async fn milestone_changelog_end_to_end() {
        let mut server = Server::new_async().await;
        let _repo = mock_repository(&mut server).await;
        let _milestone = mock_milestone(
            &mut server,
            r#"[
                {"number": 1, "title": "Crash on start", "html_url": "https://github.com/org/repo/issues/1",
                 "user": {"login": "alice", "html_url": "https://github.com/alice"},
                 "labels": [{"name": "bug"}], "closed_at": "2024-01-10T00:00:00Z"},
                {"number": 2, "title": "Tidy readme", "html_url": "https://github.com/org/repo/issues/2",
                 "user": {"login": "bob", "html_url": "https://github.com/bob"},
                 "labels": [], "closed_at": "2024-01-11T00:00:00Z"}
            ]"#,
        )
        .await;

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("CHANGELOG.md");
        run(cli_for(&server, &["-m", "v1.0"], &output)).await.unwrap();

        let content = std::fs::read_to_string(&output).unwrap();
        assert!(content.starts_with("## Version 1.0 (2024-01-15)"));
        assert!(content.contains("#### Bug (1)"));
        assert!(content.contains("#### Other (1)"));
        assert!(content.contains("[Issue 1](https://github.com/org/repo/issues/1)"));
        assert!(content.contains("[Issue 2](https://github.com/org/repo/issues/2)"));
    }

    #[tokio::test]
    async fn empty_milestone_still_succeeds() {
        let mut server = Server::new_async().await;
        let _repo = mock_repository(&mut server).await;
        let _milestone = mock_milestone(&mut server, "[]").await;

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("CHANGELOG.md");
        run(cli_for(&server, &["-m", "v1.0", "-f", "release"], &output))
            .await
            .unwrap();

        let content = std::fs::read_to_string(&output).unwrap();
        assert_eq!(content.trim(), "## Version 1.0 (2024-01-15)");
    }

    #[tokio::test]
    async fn unknown_tag_writes_nothing() {
        let mut server = Server::new_async().await;
        let _repo = mock_repository(&mut server).await;
        let _tag = server
            .mock("GET", "/repos/org/repo/git/ref/tags/v0.0")
            .with_status(404)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message": "Not Found"}"#)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("CHANGELOG.md");
        let err = run(cli_for(&server, &["--since-tag", "v0.0"], &output))
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ChangelogError>(),
            Some(ChangelogError::TagNotFound(_))
        ));
        assert!(!output.exists());
    }
}
