//! Turns the package inventory into registry objects for one run.
//!
//! Fetch failures and unsupported manifest types drop the object from the
//! run. An index manifest that cannot be parsed aborts the run: no partial
//! graph is trusted.

use std::collections::BTreeMap;

use futures::stream::{self, StreamExt};
use tracing::{trace, warn};

use crate::domain::{
    Digest, FetchedManifest, IndexManifest, PackageRef, PackageVersion, RegistryObject,
};
use crate::error::{CleanerError, CleanerResult};
use crate::registry_traits::{ManifestSource, PackageInventory};
use crate::report::SkippedObject;

/// Objects resolved from the inventory, ready for graph construction.
#[derive(Debug, Default)]
pub struct LoadedInventory {
    /// Number of versions returned by the listing
    pub listed: usize,
    pub versions: BTreeMap<Digest, PackageVersion>,
    pub objects: BTreeMap<Digest, RegistryObject>,
    pub skipped: Vec<SkippedObject>,
}

/// Interpret a fetched manifest as an image or an index.
///
/// Returns `UnsupportedMediaType` for manifests we do not manage and
/// `MalformedManifest` for index bodies that cannot be read.
pub fn object_from_manifest(
    version: &PackageVersion,
    manifest: &FetchedManifest,
) -> CleanerResult<RegistryObject> {
    let media_type = manifest.resolve_media_type().ok_or_else(|| {
        CleanerError::UnsupportedMediaType {
            digest: version.digest.to_string(),
            media_type: manifest
                .raw_media_type()
                .unwrap_or_else(|| "<none>".to_string()),
        }
    })?;

    if media_type.is_index() {
        let index = IndexManifest::parse(&version.digest, &manifest.body)?;
        let children = index.child_digests(&version.digest)?;
        Ok(RegistryObject::index(version, children))
    } else {
        Ok(RegistryObject::image(version))
    }
}

/// List all package versions and fetch their manifests, at most
/// `concurrency` at a time.
pub async fn load_inventory(
    inventory: &dyn PackageInventory,
    manifests: &dyn ManifestSource,
    package: &PackageRef,
    concurrency: usize,
) -> CleanerResult<LoadedInventory> {
    let listed = inventory.list_versions(package).await?;

    let mut loaded = LoadedInventory {
        listed: listed.len(),
        ..Default::default()
    };
    for version in listed {
        if let Some(existing) = loaded.versions.get(&version.digest) {
            warn!(
                digest = %version.digest,
                kept_version = existing.id,
                ignored_version = version.id,
                "digest listed twice, ignoring the duplicate version"
            );
            continue;
        }
        loaded.versions.insert(version.digest.clone(), version);
    }

    let fetched: Vec<(Digest, CleanerResult<FetchedManifest>)> =
        stream::iter(loaded.versions.keys().cloned())
            .map(|digest| async move {
                trace!(digest = %digest, "fetching container registry object");
                let result = manifests.fetch_manifest(package, &digest).await;
                (digest, result)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

    // Restore digest order so results do not depend on completion order.
    let fetched: BTreeMap<Digest, CleanerResult<FetchedManifest>> = fetched.into_iter().collect();

    for (digest, result) in fetched {
        let Some(version) = loaded.versions.get(&digest) else {
            continue;
        };

        let object = result.and_then(|manifest| object_from_manifest(version, &manifest));
        match object {
            Ok(object) => {
                loaded.objects.insert(digest, object);
            }
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!(digest = %digest, error = %err, "unable to retrieve container registry object, skipping it");
                loaded.skipped.push(SkippedObject {
                    digest,
                    version_id: version.id,
                    reason: err.to_string(),
                });
            }
        }
    }

    Ok(loaded)
}
