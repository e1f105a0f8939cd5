//! ghcr-cleaner - GitHub Container Registry cleaning
//!
//! Deletes the versions of a container package that are untagged, tagged
//! only for closed pull requests, or only reachable from such versions.
//! Every flag can also be set through the environment, so the binary runs
//! unchanged as a GitHub Actions step.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ghcr_cleaner_client::{ClientConfig, GitHubClient, RegistryClient, DEFAULT_API_URL};
use ghcr_cleaner_core::{
    init_tracing, Cleaner, CleanupConfig, CleanupReport, OwnerKind, PackageRef, PullRequestRepo,
    DEFAULT_FETCH_CONCURRENCY, DEFAULT_PR_TAG_PATTERN,
};
use tracing::{info, Level};

#[derive(Parser, Debug)]
#[command(name = "ghcr-cleaner")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Delete stale images from a GitHub container package", long_about = None)]
struct Cli {
    /// Enable debug logs
    #[arg(short, long, env = "GHCR_CLEANER_DEBUG")]
    debug: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, env = "GHCR_CLEANER_JSON_LOGS")]
    json: bool,

    /// Compute the deletion set without deleting anything
    #[arg(long, env = "GHCR_CLEANER_DRY_RUN")]
    dry_run: bool,

    /// Container registry host
    #[arg(long, env = "GHCR_REGISTRY", default_value = "ghcr.io")]
    registry: String,

    /// GitHub REST API base URL
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Registry user name
    #[arg(short, long, env = "GITHUB_ACTOR")]
    user: String,

    /// Registry password or GitHub token
    #[arg(short, long, env = "GITHUB_TOKEN", hide_env_values = true)]
    password: String,

    /// Package owner (default: the repository owner)
    #[arg(long, env = "GHCR_PACKAGE_OWNER")]
    owner: Option<String>,

    /// Whether the package belongs to a user or an organization
    #[arg(long, env = "GHCR_OWNER_TYPE", default_value = "user")]
    owner_type: String,

    /// Container package name
    #[arg(long, env = "GHCR_PACKAGE")]
    package: String,

    /// Repository of the pull requests, as owner/repository
    #[arg(long, env = "GITHUB_REPOSITORY")]
    repository: String,

    /// Pattern matching pull request tags, with one capture group for the id
    #[arg(long, env = "GHCR_PR_TAG_REGEX", default_value = DEFAULT_PR_TAG_PATTERN)]
    pr_tag_regex: String,

    /// Maximum number of manifests fetched concurrently
    #[arg(long, env = "GHCR_FETCH_CONCURRENCY", default_value_t = DEFAULT_FETCH_CONCURRENCY)]
    concurrency: usize,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    report_json: bool,
}

impl Cli {
    fn cleanup_config(&self) -> Result<CleanupConfig> {
        let pull_requests: PullRequestRepo = self
            .repository
            .parse()
            .context("Invalid --repository")?;
        let owner_kind: OwnerKind = self.owner_type.parse().context("Invalid --owner-type")?;
        let owner = self
            .owner
            .clone()
            .unwrap_or_else(|| pull_requests.owner.clone());
        let package =
            PackageRef::new(&self.registry, &owner, &self.package).with_owner_kind(owner_kind);

        let config = CleanupConfig::new(package, pull_requests)
            .with_tag_pattern(&self.pr_tag_regex)
            .context("Invalid --pr-tag-regex")?
            .with_dry_run(self.dry_run)
            .with_fetch_concurrency(self.concurrency);
        Ok(config)
    }

    fn client_config(&self) -> ClientConfig {
        ClientConfig::new(&self.api_url, &self.registry).with_credentials(&self.user, &self.password)
    }
}

fn print_report(report: &CleanupReport, json: bool) -> Result<()> {
    if json {
        let out = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
        println!("{out}");
    } else {
        println!("{report}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug { Level::DEBUG } else { Level::INFO };
    init_tracing(cli.json, level);

    let config = cli.cleanup_config()?;
    info!(
        package = %config.package,
        repository = %config.pull_requests,
        dry_run = config.dry_run,
        "starting registry cleaning"
    );

    let client_config = cli.client_config();
    let github = Arc::new(
        GitHubClient::new(client_config.clone()).context("Failed to create GitHub client")?,
    );
    let registry =
        Arc::new(RegistryClient::new(client_config).context("Failed to create registry client")?);

    let cleaner = Cleaner::new(config, github.clone(), registry, github);
    let report = cleaner.run().await.context("Registry cleaning failed")?;

    print_report(&report, cli.report_json)
}
