//! Structured observability hooks for the cleanup run lifecycle.
//!
//! This module provides:
//! - A run-scoped tracing span via [`run_span`]
//! - Emission functions for key lifecycle events: start, inventory loaded,
//!   solver passes, deletion plan, deletion failure, finish
//!
//! Lifecycle events are emitted at `info!` level, solver passes at `debug!`,
//! failures at `warn!`.

use tracing::{debug, info, warn, Span};

use crate::report::CleanupReport;

/// Span carrying the run id and package, attached to a whole run with
/// [`tracing::Instrument`] so it survives across await points.
pub fn run_span(run_id: &str, package: &str) -> Span {
    tracing::info_span!("ghcr_cleaner.run", run_id = %run_id, package = %package)
}

/// Emit event: cleanup started.
pub fn emit_cleanup_started(run_id: &str, package: &str, dry_run: bool) {
    info!(event = "cleanup.started", run_id = %run_id, package = %package, dry_run = dry_run);
}

/// Emit event: inventory listed and manifests fetched.
pub fn emit_inventory_loaded(versions: usize, objects: usize, skipped: usize) {
    info!(
        event = "cleanup.inventory_loaded",
        versions = versions,
        objects = objects,
        skipped = skipped,
    );
}

/// Emit event: one liveness pass finished.
pub fn emit_solver_pass(pass: usize, marked: usize) {
    debug!(
        event = "solver.pass",
        pass = pass,
        nb_marked_to_delete = marked,
    );
}

/// Emit event: one object computed for deletion.
pub fn emit_deletion_candidate(digest: &str, version_id: u64, reason: &str) {
    info!(
        event = "cleanup.deletion_candidate",
        digest = %digest,
        version_id = version_id,
        reason = %reason,
        "package version computed for deletion"
    );
}

/// Emit event: deletion set computed.
pub fn emit_deletion_planned(planned: usize, pinned: usize, passes: usize) {
    info!(
        event = "cleanup.deletion_planned",
        planned = planned,
        pinned = pinned,
        passes = passes,
    );
}

/// Emit event: one deletion failed (warning level).
pub fn emit_deletion_failed(digest: &str, version_id: u64, error: &dyn std::fmt::Display) {
    warn!(
        event = "cleanup.deletion_failed",
        digest = %digest,
        version_id = version_id,
        error = %error,
        "unable to delete package version"
    );
}

/// Emit event: cleanup finished.
pub fn emit_cleanup_finished(report: &CleanupReport) {
    info!(
        event = "cleanup.finished",
        run_id = %report.run_id,
        dry_run = report.dry_run,
        planned = report.planned_count(),
        untagged = report.untagged,
        closed_pull_request = report.closed_pull_request,
        orphaned = report.orphaned,
        nb_deleted = report.deleted,
        failed = report.failed_deletions.len(),
        duration_ms = report.duration_ms().unwrap_or_default(),
    );
}
