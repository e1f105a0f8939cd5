//! Cleanup run configuration.

use regex::Regex;

use crate::domain::{PackageRef, PullRequestRepo};
use crate::error::{CleanerError, CleanerResult};

/// Default pattern for pull request tags: `pr-1234`, `pr-1234-abc123`, `pr-1234.2`.
pub const DEFAULT_PR_TAG_PATTERN: &str = r"^pr-(\d+)(?:[-.].*)?$";

/// Default number of manifests fetched concurrently.
pub const DEFAULT_FETCH_CONCURRENCY: usize = 8;

/// Parameters of one cleanup run.
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    /// Package to clean
    pub package: PackageRef,
    /// Repository in which pull request states are looked up
    pub pull_requests: PullRequestRepo,
    /// Pattern with exactly one capture group yielding the PR number
    pub tag_pattern: Regex,
    /// Compute everything but delete nothing
    pub dry_run: bool,
    /// Upper bound on concurrent manifest fetches
    pub fetch_concurrency: usize,
}

impl CleanupConfig {
    /// Create a config with the default tag pattern, dry-run off.
    pub fn new(package: PackageRef, pull_requests: PullRequestRepo) -> Self {
        CleanupConfig {
            package,
            pull_requests,
            tag_pattern: default_tag_pattern(),
            dry_run: false,
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
        }
    }

    /// Replace the tag pattern. The pattern must compile and have exactly
    /// one capture group.
    pub fn with_tag_pattern(mut self, pattern: &str) -> CleanerResult<Self> {
        self.tag_pattern = compile_tag_pattern(pattern)?;
        Ok(self)
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_fetch_concurrency(mut self, concurrency: usize) -> Self {
        self.fetch_concurrency = concurrency.max(1);
        self
    }
}

/// Compile a tag pattern and check its capture group count.
pub fn compile_tag_pattern(pattern: &str) -> CleanerResult<Regex> {
    let regex = Regex::new(pattern)?;
    validate_tag_pattern(&regex)?;
    Ok(regex)
}

/// `captures_len` counts the implicit whole-match group.
pub fn validate_tag_pattern(regex: &Regex) -> CleanerResult<()> {
    let groups = regex.captures_len() - 1;
    if groups != 1 {
        return Err(CleanerError::Config(format!(
            "tag pattern '{}' must have exactly one capture group, found {groups}",
            regex.as_str()
        )));
    }
    Ok(())
}

fn default_tag_pattern() -> Regex {
    Regex::new(DEFAULT_PR_TAG_PATTERN).expect("default tag pattern is valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CleanupConfig {
        CleanupConfig::new(
            PackageRef::new("ghcr.io", "owner", "pkg"),
            PullRequestRepo::new("owner", "repo"),
        )
    }

    #[test]
    fn test_default_pattern_matches_pr_tags() {
        let re = compile_tag_pattern(DEFAULT_PR_TAG_PATTERN).unwrap();
        for tag in ["pr-1234", "pr-1234-abc123", "pr-7.2"] {
            let caps = re.captures(tag).unwrap();
            assert!(caps[1].parse::<u64>().is_ok(), "{tag}");
        }
        for tag in ["v1.2.3", "latest", "pr-", "pr-abc", "xpr-12", "pr-12abc"] {
            assert!(re.captures(tag).is_none(), "{tag}");
        }
    }

    #[test]
    fn test_pattern_requires_exactly_one_group() {
        assert!(compile_tag_pattern(r"^pr-\d+$").is_err());
        assert!(compile_tag_pattern(r"^(pr)-(\d+)$").is_err());
        assert!(compile_tag_pattern(r"^pr-(?:x)?(\d+)$").is_ok());
        assert!(compile_tag_pattern(r"^pr-(").is_err());
    }

    #[test]
    fn test_builders() {
        let cfg = config()
            .with_dry_run(true)
            .with_fetch_concurrency(0)
            .with_tag_pattern(r"^preview-(\d+)$")
            .unwrap();
        assert!(cfg.dry_run);
        assert_eq!(cfg.fetch_concurrency, 1);
        assert!(cfg.tag_pattern.is_match("preview-12"));
    }
}
