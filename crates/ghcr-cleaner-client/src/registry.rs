//! OCI distribution client, limited to fetching manifests by digest.

use async_trait::async_trait;
use ghcr_cleaner_core::{
    CleanerError, CleanerResult, Digest, FetchedManifest, ManifestSource, MediaType, PackageRef,
};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

/// Extract the bearer token from a `/token` response.
pub fn parse_token_response(body: &[u8]) -> Result<String> {
    let response: TokenResponse = serde_json::from_slice(body)?;
    response
        .token
        .or(response.access_token)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ClientError::Auth("token response carries no token".to_string()))
}

/// Registry client fetching manifests with a pull-scoped bearer token
pub struct RegistryClient {
    config: ClientConfig,
    http_client: reqwest::Client,
    token: Mutex<Option<String>>,
}

impl RegistryClient {
    /// Create a new registry client
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(RegistryClient {
            config,
            http_client,
            token: Mutex::new(None),
        })
    }

    /// URL of the token endpoint for pulling `package`.
    pub fn token_url(&self, package: &PackageRef) -> String {
        format!(
            "{}/token?scope=repository:{}:pull&service={}",
            self.config.registry_url,
            package.repository(),
            self.config.registry_host()
        )
    }

    /// URL of the manifest `digest` of `package`.
    pub fn manifest_url(&self, package: &PackageRef, digest: &Digest) -> String {
        format!(
            "{}/v2/{}/manifests/{}",
            self.config.registry_url,
            package.repository(),
            digest
        )
    }

    async fn fetch_token(&self, package: &PackageRef) -> Result<String> {
        let url = self.token_url(package);
        trace!(url = %url, "requesting registry token");

        let mut request = self.http_client.get(&url);
        if let Some(username) = &self.config.username {
            request = request.basic_auth(username, self.config.token.as_deref());
        }
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(ClientError::Auth(format!(
                "{url} returned {}: {}",
                status.as_u16(),
                String::from_utf8_lossy(&body)
            )));
        }
        parse_token_response(&body)
    }

    async fn bearer_token(&self, package: &PackageRef) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }
        let token = self.fetch_token(package).await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    async fn get_manifest(&self, package: &PackageRef, digest: &Digest, token: &str) -> Result<reqwest::Response> {
        let response = self
            .http_client
            .get(self.manifest_url(package, digest))
            .header(reqwest::header::ACCEPT, MediaType::ACCEPTED.join(", "))
            .bearer_auth(token)
            .send()
            .await?;
        Ok(response)
    }

    /// Fetch the manifest `digest`, retrying once with a fresh token on 401.
    pub async fn fetch(&self, package: &PackageRef, digest: &Digest) -> Result<FetchedManifest> {
        let token = self.bearer_token(package).await?;
        let mut response = self.get_manifest(package, digest, &token).await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            debug!(digest = %digest, "registry token rejected, requesting a new one");
            *self.token.lock().await = None;
            let token = self.bearer_token(package).await?;
            response = self.get_manifest(package, digest, &token).await?;
        }

        let status = response.status();
        let media_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(ClientError::from_status(
                &reqwest::Method::GET,
                &self.manifest_url(package, digest),
                status.as_u16(),
                &body,
            ));
        }

        Ok(FetchedManifest {
            media_type,
            body: body.to_vec(),
        })
    }
}

#[async_trait]
impl ManifestSource for RegistryClient {
    async fn fetch_manifest(
        &self,
        package: &PackageRef,
        digest: &Digest,
    ) -> CleanerResult<FetchedManifest> {
        self.fetch(package, digest)
            .await
            .map_err(|e| CleanerError::ManifestFetch {
                digest: digest.to_string(),
                reason: e.to_string(),
            })
    }
}
