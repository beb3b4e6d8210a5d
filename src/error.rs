use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChangelogError {
    #[error("Invalid repository `{0}`, expected `owner/name`")]
    InvalidRepository(String),

    #[error("Organization/user `{0}` seems to be invalid")]
    OwnerNotFound(String),

    #[error("Repository `{name}` for organization/user `{owner}` seems to be invalid")]
    RepositoryNotFound { owner: String, name: String },

    #[error("Milestone `{0}` not found")]
    MilestoneNotFound(String),

    #[error("Tag `{0}` not found")]
    TagNotFound(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("GitHub API rate limit exceeded: {0} (try again with --user/--password or --token)")]
    RateLimited(String),

    #[error("GitHub API error: {0}")]
    Api(String),

    #[error("Malformed API response: {0}")]
    MalformedResponse(String),

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Invalid label regex `{pattern}`: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid label group `{0}`, expected `label:Name`")]
    InvalidLabelGroup(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ChangelogResult<T> = Result<T, ChangelogError>;

impl From<octocrab::Error> for ChangelogError {
    fn from(err: octocrab::Error) -> Self {
        match err {
            octocrab::Error::GitHub { source, .. } => {
                let message = source.message;
                let lower = message.to_lowercase();
                if lower.contains("bad credentials") || lower.contains("requires authentication") {
                    ChangelogError::Authentication(message)
                } else if lower.contains("rate limit") {
                    ChangelogError::RateLimited(message)
                } else {
                    ChangelogError::Api(message)
                }
            }
            octocrab::Error::Serde { source, .. } => {
                ChangelogError::MalformedResponse(source.to_string())
            }
            octocrab::Error::Json { source, .. } => {
                ChangelogError::MalformedResponse(source.to_string())
            }
            other => ChangelogError::Transport(other.to_string()),
        }
    }
}

impl From<handlebars::TemplateError> for ChangelogError {
    fn from(err: handlebars::TemplateError) -> Self {
        ChangelogError::Template(err.to_string())
    }
}

impl From<handlebars::RenderError> for ChangelogError {
    fn from(err: handlebars::RenderError) -> Self {
        ChangelogError::Template(err.to_string())
    }
}

/// True when an octocrab error is GitHub's 404 response.
pub fn is_not_found(err: &octocrab::Error) -> bool {
    matches!(err, octocrab::Error::GitHub { source, .. } if source.message.contains("Not Found"))
}
