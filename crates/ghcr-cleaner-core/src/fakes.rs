//! In-memory fakes for the collaborator traits (testing only)
//!
//! `MemoryRegistry` plays the packages API, the OCI registry and the pull
//! request oracle at once. Objects get synthetic manifest bodies whose
//! SHA-256 is their digest, and every collaborator call can be made to fail.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::{
    Digest, FetchedManifest, IndexManifest, MediaType, PackageRef, PackageVersion,
    PullRequestRepo, PullRequestState,
};
use crate::error::{CleanerError, CleanerResult};
use crate::registry_traits::{ManifestSource, PackageInventory, PullRequestOracle};

#[derive(Debug, Clone)]
struct StoredObject {
    version: PackageVersion,
    manifest: FetchedManifest,
}

#[derive(Debug, Default)]
struct RegistryState {
    next_id: u64,
    objects: BTreeMap<Digest, StoredObject>,
    pull_requests: HashMap<u64, PullRequestState>,
    failing_fetches: HashSet<Digest>,
    failing_deletes: HashSet<Digest>,
    failing_listing: bool,
    deleted: Vec<Digest>,
    fetch_calls: usize,
    pull_request_calls: usize,
    delete_calls: usize,
}

/// In-memory package registry backed by a `BTreeMap<digest, object>`.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    state: Mutex<RegistryState>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an image with the given tags and return its digest.
    pub fn push_image(&self, tags: &[&str]) -> Digest {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id + 1;
        let body = serde_json::json!({
            "schemaVersion": 2,
            "mediaType": MediaType::OCI_MANIFEST,
            "config": { "digest": Digest::sha256(format!("config-{id}").as_bytes()).to_string() },
            "layers": [],
        });
        let body = serde_json::to_vec(&body).unwrap();
        Self::insert(&mut state, MediaType::OCI_MANIFEST, body, tags)
    }

    /// Add an image index referencing `children` and return its digest.
    pub fn push_index(&self, tags: &[&str], children: &[Digest]) -> Digest {
        let manifest = IndexManifest::for_children(MediaType::OciIndex, children);
        let body = serde_json::to_vec(&manifest).unwrap();
        let mut state = self.state.lock().unwrap();
        Self::insert(&mut state, MediaType::OCI_INDEX, body, tags)
    }

    /// Add an object with an arbitrary media type and body.
    pub fn push_raw(&self, media_type: &str, body: &[u8], tags: &[&str]) -> Digest {
        let mut state = self.state.lock().unwrap();
        Self::insert(&mut state, media_type, body.to_vec(), tags)
    }

    fn insert(state: &mut RegistryState, media_type: &str, body: Vec<u8>, tags: &[&str]) -> Digest {
        state.next_id += 1;
        let digest = Digest::sha256(&body);
        let version = PackageVersion {
            id: state.next_id,
            digest: digest.clone(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        };
        state.objects.insert(
            digest.clone(),
            StoredObject {
                version,
                manifest: FetchedManifest::new(media_type, body),
            },
        );
        digest
    }

    pub fn set_pull_request_state(&self, id: u64, state: PullRequestState) {
        self.state.lock().unwrap().pull_requests.insert(id, state);
    }

    pub fn fail_fetch(&self, digest: &Digest) {
        self.state
            .lock()
            .unwrap()
            .failing_fetches
            .insert(digest.clone());
    }

    pub fn fail_delete(&self, digest: &Digest) {
        self.state
            .lock()
            .unwrap()
            .failing_deletes
            .insert(digest.clone());
    }

    pub fn fail_listing(&self) {
        self.state.lock().unwrap().failing_listing = true;
    }

    /// Digests still present.
    pub fn remaining(&self) -> Vec<Digest> {
        self.state.lock().unwrap().objects.keys().cloned().collect()
    }

    /// Digests deleted so far, in deletion order.
    pub fn deleted(&self) -> Vec<Digest> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn fetch_calls(&self) -> usize {
        self.state.lock().unwrap().fetch_calls
    }

    pub fn pull_request_calls(&self) -> usize {
        self.state.lock().unwrap().pull_request_calls
    }

    pub fn delete_calls(&self) -> usize {
        self.state.lock().unwrap().delete_calls
    }
}

#[async_trait]
impl PackageInventory for MemoryRegistry {
    async fn list_versions(&self, package: &PackageRef) -> CleanerResult<Vec<PackageVersion>> {
        let state = self.state.lock().unwrap();
        if state.failing_listing {
            return Err(CleanerError::Inventory(format!(
                "listing {package} failed"
            )));
        }
        Ok(state
            .objects
            .values()
            .map(|o| o.version.clone())
            .collect())
    }

    async fn delete_version(
        &self,
        _package: &PackageRef,
        version: &PackageVersion,
    ) -> CleanerResult<()> {
        let mut state = self.state.lock().unwrap();
        state.delete_calls += 1;
        let failure = |reason: &str| CleanerError::Deletion {
            version_id: version.id,
            digest: version.digest.to_string(),
            reason: reason.to_string(),
        };
        if state.failing_deletes.contains(&version.digest) {
            return Err(failure("injected failure"));
        }
        match state.objects.remove(&version.digest) {
            Some(_) => {
                state.deleted.push(version.digest.clone());
                Ok(())
            }
            None => Err(failure("not found")),
        }
    }
}

#[async_trait]
impl ManifestSource for MemoryRegistry {
    async fn fetch_manifest(
        &self,
        _package: &PackageRef,
        digest: &Digest,
    ) -> CleanerResult<FetchedManifest> {
        let mut state = self.state.lock().unwrap();
        state.fetch_calls += 1;
        let failure = |reason: &str| CleanerError::ManifestFetch {
            digest: digest.to_string(),
            reason: reason.to_string(),
        };
        if state.failing_fetches.contains(digest) {
            return Err(failure("injected failure"));
        }
        state
            .objects
            .get(digest)
            .map(|o| o.manifest.clone())
            .ok_or_else(|| failure("manifest unknown"))
    }
}

#[async_trait]
impl PullRequestOracle for MemoryRegistry {
    async fn pull_request_state(
        &self,
        repo: &PullRequestRepo,
        id: u64,
    ) -> CleanerResult<PullRequestState> {
        let mut state = self.state.lock().unwrap();
        state.pull_request_calls += 1;
        state
            .pull_requests
            .get(&id)
            .cloned()
            .ok_or_else(|| CleanerError::PullRequestLookup {
                id,
                reason: format!("pull request not found in {repo}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package() -> PackageRef {
        PackageRef::new("ghcr.io", "owner", "pkg")
    }

    #[tokio::test]
    async fn test_pushed_objects_are_listed_and_fetchable() {
        let registry = MemoryRegistry::new();
        let image = registry.push_image(&["v1"]);
        let index = registry.push_index(&[], &[image.clone()]);

        let versions = registry.list_versions(&package()).await.unwrap();
        assert_eq!(versions.len(), 2);

        let fetched = registry.fetch_manifest(&package(), &index).await.unwrap();
        assert_eq!(Digest::sha256(&fetched.body), index);
        assert_eq!(fetched.resolve_media_type(), Some(MediaType::OciIndex));
    }

    #[tokio::test]
    async fn test_images_with_same_tags_get_distinct_digests() {
        let registry = MemoryRegistry::new();
        let a = registry.push_image(&[]);
        let b = registry.push_image(&[]);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_double_delete_fails() {
        let registry = MemoryRegistry::new();
        let image = registry.push_image(&[]);
        let version = registry.list_versions(&package()).await.unwrap()[0].clone();
        assert_eq!(version.digest, image);

        registry.delete_version(&package(), &version).await.unwrap();
        assert!(registry.delete_version(&package(), &version).await.is_err());
        assert_eq!(registry.deleted(), vec![image]);
        assert_eq!(registry.delete_calls(), 2);
    }
}
