//! Pull request coordinates and states.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CleanerError;

/// GitHub repository whose pull requests back the `pr-*` tags.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PullRequestRepo {
    pub owner: String,
    pub repository: String,
}

impl PullRequestRepo {
    pub fn new(owner: &str, repository: &str) -> Self {
        PullRequestRepo {
            owner: owner.to_string(),
            repository: repository.to_string(),
        }
    }
}

impl FromStr for PullRequestRepo {
    type Err = CleanerError;

    /// Parse `owner/repository`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split('/').collect::<Vec<_>>().as_slice() {
            [owner, repository] if !owner.is_empty() && !repository.is_empty() => {
                Ok(PullRequestRepo::new(owner, repository))
            }
            _ => Err(CleanerError::Config(format!(
                "invalid repository format '{s}', must be owner/repository"
            ))),
        }
    }
}

impl fmt::Display for PullRequestRepo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repository)
    }
}

/// State of a pull request as reported by the oracle.
///
/// Only the literal `closed` state authorizes deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullRequestState {
    Open,
    Closed,
    Other(String),
}

impl PullRequestState {
    pub fn from_api(state: &str) -> Self {
        match state {
            "closed" => PullRequestState::Closed,
            "open" => PullRequestState::Open,
            other => PullRequestState::Other(other.to_string()),
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, PullRequestState::Closed)
    }
}

impl fmt::Display for PullRequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PullRequestState::Open => f.write_str("open"),
            PullRequestState::Closed => f.write_str("closed"),
            PullRequestState::Other(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_owner_repository() {
        let repo: PullRequestRepo = "pcasteran/ghcr-cleaning-action".parse().unwrap();
        assert_eq!(repo.owner, "pcasteran");
        assert_eq!(repo.repository, "ghcr-cleaning-action");
        assert_eq!(repo.to_string(), "pcasteran/ghcr-cleaning-action");
    }

    #[test]
    fn test_reject_malformed_repository() {
        assert!("just-a-name".parse::<PullRequestRepo>().is_err());
        assert!("a/b/c".parse::<PullRequestRepo>().is_err());
        assert!("/repo".parse::<PullRequestRepo>().is_err());
    }

    #[test]
    fn test_only_literal_closed_is_closed() {
        assert!(PullRequestState::from_api("closed").is_closed());
        assert!(!PullRequestState::from_api("Closed").is_closed());
        assert!(!PullRequestState::from_api("merged").is_closed());
        assert_eq!(PullRequestState::from_api("open"), PullRequestState::Open);
    }
}
