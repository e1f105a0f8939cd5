//! Cleanup driver: one run from inventory to deletions.
//!
//! Sequence: list and fetch the inventory, build the reference graph
//! (classifying tags), solve for the deletion set, then delete each member
//! in marking order (indices before the children they freed) unless running
//! dry. Structural errors abort before any deletion; every
//! per-object failure is logged, recorded in the report, and skipped. An
//! object still named by an index whose deletion failed is kept.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, Instrument};

use crate::classifier::TagClassifier;
use crate::config::CleanupConfig;
use crate::domain::Digest;
use crate::error::CleanerResult;
use crate::graph::ReferenceGraph;
use crate::inventory::load_inventory;
use crate::obs;
use crate::registry_traits::{ManifestSource, PackageInventory, PullRequestOracle};
use crate::report::{CleanupReport, FailedDeletion, PlannedDeletion};
use crate::solver::{DeletionReason, LivenessSolver};

/// Runs cleanups against injected collaborators.
pub struct Cleaner {
    config: CleanupConfig,
    inventory: Arc<dyn PackageInventory>,
    manifests: Arc<dyn ManifestSource>,
    oracle: Arc<dyn PullRequestOracle>,
}

impl Cleaner {
    pub fn new(
        config: CleanupConfig,
        inventory: Arc<dyn PackageInventory>,
        manifests: Arc<dyn ManifestSource>,
        oracle: Arc<dyn PullRequestOracle>,
    ) -> Self {
        Cleaner {
            config,
            inventory,
            manifests,
            oracle,
        }
    }

    pub fn config(&self) -> &CleanupConfig {
        &self.config
    }

    /// Execute one cleanup run and return its report.
    ///
    /// Fails only when the inventory cannot be listed, the configuration is
    /// invalid, or an index manifest is malformed; in all three cases nothing
    /// has been deleted.
    pub async fn run(&self) -> CleanerResult<CleanupReport> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = obs::run_span(&run_id, &self.config.package.image_reference());
        self.run_with_id(run_id).instrument(span).await
    }

    async fn run_with_id(&self, run_id: String) -> CleanerResult<CleanupReport> {
        let package = &self.config.package;
        obs::emit_cleanup_started(&run_id, &package.image_reference(), self.config.dry_run);

        let mut report = CleanupReport::new(&run_id, &package.image_reference(), self.config.dry_run);
        let classifier = TagClassifier::from_config(&self.config, Arc::clone(&self.oracle))?;

        debug!(user = %package.owner, package = %package.name, "listing all the package versions");
        let loaded = load_inventory(
            self.inventory.as_ref(),
            self.manifests.as_ref(),
            package,
            self.config.fetch_concurrency,
        )
        .await?;
        report.versions_listed = loaded.listed;
        report.skipped = loaded.skipped;
        obs::emit_inventory_loaded(loaded.listed, loaded.objects.len(), report.skipped.len());

        let graph = ReferenceGraph::build(loaded.objects, &classifier).await;
        report.objects_in_graph = graph.len();
        report.dangling_references = graph.dangling_references().len();
        report.pinned = graph.pinned_count();

        let stats = classifier.stats();
        report.pull_request_lookups = stats.lookups;
        report.pull_request_lookup_failures = stats.lookup_failures;

        let deletion_set = LivenessSolver::solve(&graph);
        report.solver_passes = deletion_set.passes().len();
        report.untagged = deletion_set.count(DeletionReason::Untagged);
        report.closed_pull_request = deletion_set.count(DeletionReason::ClosedPullRequest);
        report.orphaned = deletion_set.count(DeletionReason::Orphaned);
        report.planned = deletion_set
            .in_deletion_order()
            .filter_map(|(digest, reason)| {
                loaded.versions.get(digest).map(|v| PlannedDeletion {
                    digest: digest.clone(),
                    version_id: v.id,
                    reason,
                })
            })
            .collect();
        for planned in &report.planned {
            obs::emit_deletion_candidate(
                planned.digest.as_str(),
                planned.version_id,
                planned.reason.as_str(),
            );
        }
        obs::emit_deletion_planned(report.planned_count(), report.pinned, report.solver_passes);

        if self.config.dry_run {
            info!("dry run mode is ON, no deletion has been performed");
        } else {
            let mut deleted = 0;
            let mut failed = Vec::new();
            // Planned objects that are still in the registry after their turn.
            let mut retained: BTreeSet<Digest> = BTreeSet::new();
            for planned in &report.planned {
                let Some(version) = loaded.versions.get(&planned.digest) else {
                    continue;
                };

                let referrer = retained
                    .iter()
                    .find(|index| {
                        graph
                            .node(index)
                            .is_some_and(|n| n.references.contains(&planned.digest))
                    })
                    .cloned();
                if let Some(index) = referrer {
                    let err = format!("still referenced by {index}, which could not be deleted");
                    obs::emit_deletion_failed(planned.digest.as_str(), version.id, &err);
                    failed.push(FailedDeletion {
                        digest: planned.digest.clone(),
                        version_id: version.id,
                        error: err,
                    });
                    retained.insert(planned.digest.clone());
                    continue;
                }

                debug!(digest = %planned.digest, version_id = version.id, "deleting package version");
                match self.inventory.delete_version(package, version).await {
                    Ok(()) => deleted += 1,
                    Err(err) => {
                        obs::emit_deletion_failed(planned.digest.as_str(), version.id, &err);
                        failed.push(FailedDeletion {
                            digest: planned.digest.clone(),
                            version_id: version.id,
                            error: err.to_string(),
                        });
                        retained.insert(planned.digest.clone());
                    }
                }
            }
            report.deleted = deleted;
            report.failed_deletions = failed;
            info!(nb_deleted = report.deleted, "registry cleaning done");
        }

        report.finish();
        obs::emit_cleanup_finished(&report);
        Ok(report)
    }
}
