//! Run report accumulated by the cleanup driver.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Digest;
use crate::solver::DeletionReason;

/// A package version left out of the graph because its manifest could not
/// be fetched or has an unsupported type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedObject {
    pub digest: Digest,
    pub version_id: u64,
    pub reason: String,
}

/// A member of the computed deletion set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedDeletion {
    pub digest: Digest,
    pub version_id: u64,
    pub reason: DeletionReason,
}

/// A deletion call that failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedDeletion {
    pub digest: Digest,
    pub version_id: u64,
    pub error: String,
}

/// Summary of one cleanup run.
///
/// "Computed for deletion" (`planned`) and "actually deleted" (`deleted`) are
/// kept apart: in dry-run mode `deleted` is always zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupReport {
    pub run_id: String,
    pub package: String,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Package versions listed by the inventory
    pub versions_listed: usize,
    /// Objects that made it into the reference graph
    pub objects_in_graph: usize,
    pub skipped: Vec<SkippedObject>,
    pub dangling_references: usize,
    pub pinned: usize,

    pub solver_passes: usize,
    pub planned: Vec<PlannedDeletion>,
    pub untagged: usize,
    pub closed_pull_request: usize,
    pub orphaned: usize,

    pub deleted: usize,
    pub failed_deletions: Vec<FailedDeletion>,

    pub pull_request_lookups: usize,
    pub pull_request_lookup_failures: usize,
}

impl CleanupReport {
    pub fn new(run_id: &str, package: &str, dry_run: bool) -> Self {
        CleanupReport {
            run_id: run_id.to_string(),
            package: package.to_string(),
            dry_run,
            started_at: Utc::now(),
            finished_at: None,
            versions_listed: 0,
            objects_in_graph: 0,
            skipped: Vec::new(),
            dangling_references: 0,
            pinned: 0,
            solver_passes: 0,
            planned: Vec::new(),
            untagged: 0,
            closed_pull_request: 0,
            orphaned: 0,
            deleted: 0,
            failed_deletions: Vec::new(),
            pull_request_lookups: 0,
            pull_request_lookup_failures: 0,
        }
    }

    /// Size of the computed deletion set.
    pub fn planned_count(&self) -> usize {
        self.planned.len()
    }

    pub fn planned_digests(&self) -> Vec<Digest> {
        self.planned.iter().map(|p| p.digest.clone()).collect()
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds().max(0) as u64)
    }
}

impl fmt::Display for CleanupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Package:            {}", self.package)?;
        writeln!(
            f,
            "Objects:            {} listed, {} in graph, {} skipped, {} pinned",
            self.versions_listed,
            self.objects_in_graph,
            self.skipped.len(),
            self.pinned
        )?;
        writeln!(
            f,
            "Deletion set:       {} ({} untagged, {} closed PR, {} orphaned) in {} passes",
            self.planned_count(),
            self.untagged,
            self.closed_pull_request,
            self.orphaned,
            self.solver_passes
        )?;
        for planned in &self.planned {
            writeln!(
                f,
                "  - {} (version {}, {})",
                planned.digest, planned.version_id, planned.reason
            )?;
        }
        if self.dry_run {
            write!(f, "Deleted:            0 (dry run)")
        } else {
            write!(
                f,
                "Deleted:            {} ({} failed)",
                self.deleted,
                self.failed_deletions.len()
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_marks_dry_run() {
        let mut report = CleanupReport::new("run-1", "ghcr.io/o/p", true);
        report.finish();
        let text = report.to_string();
        assert!(text.contains("ghcr.io/o/p"));
        assert!(text.contains("dry run"));
        assert!(report.duration_ms().is_some());
    }

    #[test]
    fn test_display_lists_planned_deletions() {
        let digest = Digest::sha256(b"stale");
        let mut report = CleanupReport::new("run-1", "ghcr.io/o/p", true);
        report.planned.push(PlannedDeletion {
            digest: digest.clone(),
            version_id: 12,
            reason: DeletionReason::Orphaned,
        });
        let text = report.to_string();
        assert!(text.contains(&format!("  - {digest} (version 12, orphaned)")));
    }

    #[test]
    fn test_report_serializes_reasons_in_snake_case() {
        let mut report = CleanupReport::new("run-1", "ghcr.io/o/p", false);
        report.planned.push(PlannedDeletion {
            digest: Digest::sha256(b"a"),
            version_id: 3,
            reason: DeletionReason::ClosedPullRequest,
        });
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["planned"][0]["reason"], "closed_pull_request");
        assert_eq!(json["planned"][0]["version_id"], 3);
    }
}
