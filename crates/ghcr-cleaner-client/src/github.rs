//! GitHub REST client: container package versions and pull request states.

use async_trait::async_trait;
use ghcr_cleaner_core::{
    CleanerError, CleanerResult, Digest, PackageInventory, PackageRef, PackageVersion,
    PullRequestOracle, PullRequestRepo, PullRequestState,
};
use serde::Deserialize;
use tracing::{debug, trace, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

/// Page size used when listing package versions (GitHub's maximum).
pub const PAGE_SIZE: usize = 100;

const GITHUB_API_VERSION: &str = "2022-11-28";

#[derive(Debug, Deserialize)]
struct ApiPackageVersion {
    id: u64,
    /// The manifest digest for container packages
    name: String,
    #[serde(default)]
    metadata: Option<ApiPackageMetadata>,
}

#[derive(Debug, Deserialize)]
struct ApiPackageMetadata {
    #[serde(default)]
    container: Option<ApiContainerMetadata>,
}

#[derive(Debug, Deserialize)]
struct ApiContainerMetadata {
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ApiPullRequest {
    state: String,
}

/// Parse one page of `GET .../packages/container/{name}/versions`.
///
/// Versions whose name is not a digest are skipped.
pub fn parse_versions_page(body: &[u8]) -> Result<Vec<PackageVersion>> {
    let page: Vec<ApiPackageVersion> = serde_json::from_slice(body)?;
    Ok(page
        .into_iter()
        .filter_map(|v| match v.name.parse::<Digest>() {
            Ok(digest) => Some(PackageVersion {
                id: v.id,
                digest,
                tags: v
                    .metadata
                    .and_then(|m| m.container)
                    .map(|c| c.tags)
                    .unwrap_or_default(),
            }),
            Err(_) => {
                warn!(version_id = v.id, name = %v.name, "package version name is not a digest, ignoring it");
                None
            }
        })
        .collect())
}

/// Parse `GET /repos/{owner}/{repo}/pulls/{id}`.
pub fn parse_pull_request_state(body: &[u8]) -> Result<PullRequestState> {
    let pr: ApiPullRequest = serde_json::from_slice(body)?;
    Ok(PullRequestState::from_api(&pr.state))
}

/// GitHub REST API client
pub struct GitHubClient {
    config: ClientConfig,
    http_client: reqwest::Client,
}

impl GitHubClient {
    /// Create a new GitHub client
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(GitHubClient {
            config,
            http_client,
        })
    }

    /// URL of the versions collection of `package`.
    pub fn versions_url(&self, package: &PackageRef) -> String {
        format!(
            "{}/{}/{}/packages/container/{}/versions",
            self.config.api_url,
            package.owner_kind.api_segment(),
            package.owner,
            package.name
        )
    }

    /// URL of one pull request.
    pub fn pull_request_url(&self, repo: &PullRequestRepo, id: u64) -> String {
        format!(
            "{}/repos/{}/{}/pulls/{}",
            self.config.api_url, repo.owner, repo.repository, id
        )
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let builder = self
            .http_client
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION);
        match &self.config.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, method: reqwest::Method, url: &str) -> Result<Vec<u8>> {
        let response = self.request(method.clone(), url).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(ClientError::from_status(
                &method,
                url,
                status.as_u16(),
                &body,
            ));
        }
        Ok(body.to_vec())
    }

    /// List all the active versions of a container package.
    pub async fn list_package_versions(&self, package: &PackageRef) -> Result<Vec<PackageVersion>> {
        let url = self.versions_url(package);
        let mut versions = Vec::new();
        let mut page = 1;

        loop {
            let page_url = format!("{url}?package_type=container&state=active&per_page={PAGE_SIZE}&page={page}");
            trace!(url = %page_url, "fetching package versions page");
            let body = self.send(reqwest::Method::GET, &page_url).await?;

            let raw_count = serde_json::from_slice::<Vec<serde_json::Value>>(&body)?.len();
            versions.extend(parse_versions_page(&body)?);

            if raw_count < PAGE_SIZE {
                break;
            }
            page += 1;
        }

        debug!(package = %package, count = versions.len(), "listed package versions");
        Ok(versions)
    }

    /// Delete one package version by id.
    pub async fn delete_package_version(&self, package: &PackageRef, version_id: u64) -> Result<()> {
        let url = format!("{}/{}", self.versions_url(package), version_id);
        self.send(reqwest::Method::DELETE, &url).await?;
        Ok(())
    }

    /// Get the state (`open`, `closed`) of a pull request.
    pub async fn get_pull_request_state(
        &self,
        repo: &PullRequestRepo,
        id: u64,
    ) -> Result<PullRequestState> {
        let body = self
            .send(reqwest::Method::GET, &self.pull_request_url(repo, id))
            .await?;
        parse_pull_request_state(&body)
    }
}

#[async_trait]
impl PackageInventory for GitHubClient {
    async fn list_versions(&self, package: &PackageRef) -> CleanerResult<Vec<PackageVersion>> {
        Ok(self.list_package_versions(package).await?)
    }

    async fn delete_version(
        &self,
        package: &PackageRef,
        version: &PackageVersion,
    ) -> CleanerResult<()> {
        self.delete_package_version(package, version.id)
            .await
            .map_err(|e| CleanerError::Deletion {
                version_id: version.id,
                digest: version.digest.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl PullRequestOracle for GitHubClient {
    async fn pull_request_state(
        &self,
        repo: &PullRequestRepo,
        id: u64,
    ) -> CleanerResult<PullRequestState> {
        self.get_pull_request_state(repo, id)
            .await
            .map_err(|e| CleanerError::PullRequestLookup {
                id,
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghcr_cleaner_core::OwnerKind;

    const DIGEST: &str = "sha256:3d65e9efc7caafb46aa581c1e00ea8d423c081d31cd59af3bb07bd1d6aa5cd37";

    fn client() -> GitHubClient {
        GitHubClient::new(ClientConfig::new("https://api.github.com", "ghcr.io")).unwrap()
    }

    #[test]
    fn test_versions_url_for_user_and_org() {
        let client = client();
        let user = PackageRef::new("ghcr.io", "pcasteran", "app");
        assert_eq!(
            client.versions_url(&user),
            "https://api.github.com/users/pcasteran/packages/container/app/versions"
        );
        let org = user.with_owner_kind(OwnerKind::Organization);
        assert_eq!(
            client.versions_url(&org),
            "https://api.github.com/orgs/pcasteran/packages/container/app/versions"
        );
    }

    #[test]
    fn test_pull_request_url() {
        let url = client().pull_request_url(&PullRequestRepo::new("o", "r"), 1234);
        assert_eq!(url, "https://api.github.com/repos/o/r/pulls/1234");
    }

    #[test]
    fn test_parse_versions_page() {
        let body = format!(
            r#"[
                {{"id": 1, "name": "{DIGEST}", "metadata": {{"package_type": "container", "container": {{"tags": ["pr-12", "pr-12-abc"]}}}}}},
                {{"id": 2, "name": "{DIGEST}", "metadata": {{"package_type": "container", "container": {{"tags": []}}}}}},
                {{"id": 3, "name": "latest"}}
            ]"#
        );
        let versions = parse_versions_page(body.as_bytes()).unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].id, 1);
        assert_eq!(versions[0].tags, vec!["pr-12", "pr-12-abc"]);
        assert!(versions[1].tags.is_empty());
        assert_eq!(versions[1].digest.as_str(), DIGEST);
    }

    #[test]
    fn test_parse_pull_request_state() {
        let closed = parse_pull_request_state(br#"{"number": 12, "state": "closed"}"#).unwrap();
        assert!(closed.is_closed());
        let open = parse_pull_request_state(br#"{"number": 13, "state": "open"}"#).unwrap();
        assert_eq!(open, PullRequestState::Open);
        assert!(parse_pull_request_state(b"{}").is_err());
    }
}
