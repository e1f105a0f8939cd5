//! Collaborator trait definitions for ghcr-cleaner
//!
//! These traits are the only way the core reaches the outside world:
//! - `PackageInventory`: list package versions and delete them
//! - `ManifestSource`: fetch raw manifests from the OCI registry
//! - `PullRequestOracle`: look up the state of one pull request
//!
//! All traits are async and backend-agnostic. HTTP implementations live in
//! `ghcr-cleaner-client`; in-memory fakes are provided via the `fakes` module.

use async_trait::async_trait;

use crate::domain::{
    Digest, FetchedManifest, PackageRef, PackageVersion, PullRequestRepo, PullRequestState,
};
use crate::error::CleanerResult;

/// Source of package versions and sink for their deletion.
#[async_trait]
pub trait PackageInventory: Send + Sync {
    /// List every active version of `package`. Pagination is the
    /// implementation's responsibility.
    async fn list_versions(&self, package: &PackageRef) -> CleanerResult<Vec<PackageVersion>>;

    /// Delete one package version. A not-found version is reported as an
    /// error; the caller treats it as non-fatal.
    async fn delete_version(
        &self,
        package: &PackageRef,
        version: &PackageVersion,
    ) -> CleanerResult<()>;
}

/// Source of raw registry manifests.
#[async_trait]
pub trait ManifestSource: Send + Sync {
    /// Fetch the manifest stored under `digest` in `package`'s repository.
    async fn fetch_manifest(
        &self,
        package: &PackageRef,
        digest: &Digest,
    ) -> CleanerResult<FetchedManifest>;
}

/// External, fallible pull request status lookup.
#[async_trait]
pub trait PullRequestOracle: Send + Sync {
    async fn pull_request_state(
        &self,
        repo: &PullRequestRepo,
        id: u64,
    ) -> CleanerResult<PullRequestState>;
}
