//! Fixed-point mark-and-sweep over the reference graph.
//!
//! Each pass first collects every live node that is unreferenced and not
//! pinned, then removes them and decrements the counts of the live nodes they
//! reference. A node freed by a sibling removed in the same pass is picked up
//! by the next pass. The loop stops at the first pass that marks nothing, so
//! there are at most `nodes + 1` passes. Cycles and anything reachable from a
//! pinned node stay live.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::Digest;
use crate::graph::{GraphNode, ReferenceGraph};
use crate::obs;

/// Why a digest ended up in the deletion set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionReason {
    /// No tags and never referenced by any index
    Untagged,
    /// Every tag names a closed pull request
    ClosedPullRequest,
    /// No tags, referenced only by indices that were themselves deleted
    Orphaned,
}

impl DeletionReason {
    fn for_node(node: &GraphNode) -> Self {
        if !node.object.tags.is_empty() {
            DeletionReason::ClosedPullRequest
        } else if node.referenced_count > 0 {
            DeletionReason::Orphaned
        } else {
            DeletionReason::Untagged
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeletionReason::Untagged => "untagged",
            DeletionReason::ClosedPullRequest => "closed_pull_request",
            DeletionReason::Orphaned => "orphaned",
        }
    }
}

impl fmt::Display for DeletionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of nodes marked in one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassStats {
    pub pass: usize,
    pub marked: usize,
}

/// Output of the solver: the digests to delete and how they were found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionSet {
    members: BTreeMap<Digest, DeletionReason>,
    /// Members in the order they were marked: pass by pass, digest order
    /// within a pass. An index always precedes the children it freed.
    order: Vec<Digest>,
    passes: Vec<PassStats>,
}

impl DeletionSet {
    pub fn contains(&self, digest: &Digest) -> bool {
        self.members.contains_key(digest)
    }

    pub fn reason(&self, digest: &Digest) -> Option<DeletionReason> {
        self.members.get(digest).copied()
    }

    /// Digests in ascending order.
    pub fn digests(&self) -> impl Iterator<Item = &Digest> {
        self.members.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Digest, DeletionReason)> {
        self.members.iter().map(|(d, r)| (d, *r))
    }

    /// Members in marking order, the order in which they should be deleted
    /// so that no surviving index ever names a deleted child.
    pub fn in_deletion_order(&self) -> impl Iterator<Item = (&Digest, DeletionReason)> {
        self.order
            .iter()
            .filter_map(|d| self.members.get(d).map(|r| (d, *r)))
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn count(&self, reason: DeletionReason) -> usize {
        self.members.values().filter(|r| **r == reason).count()
    }

    /// Passes run, including the final empty one.
    pub fn passes(&self) -> &[PassStats] {
        &self.passes
    }
}

/// Computes the deletion set of a [`ReferenceGraph`].
pub struct LivenessSolver;

impl LivenessSolver {
    /// Run the mark-and-sweep to its fixed point. The graph is left
    /// untouched, so solving the same graph twice gives the same set.
    pub fn solve(graph: &ReferenceGraph) -> DeletionSet {
        let mut counts: HashMap<&Digest, usize> = graph
            .nodes()
            .map(|n| (n.digest(), n.referenced_count))
            .collect();
        let mut live: BTreeSet<&Digest> = graph.nodes().map(GraphNode::digest).collect();
        let mut result = DeletionSet::default();

        loop {
            let pass = result.passes.len() + 1;

            let marked: Vec<&GraphNode> = live
                .iter()
                .filter_map(|d| graph.node(d))
                .filter(|n| !n.pinned && counts.get(n.digest()).copied().unwrap_or(0) == 0)
                .collect();

            for node in &marked {
                live.remove(node.digest());
                result
                    .members
                    .insert(node.digest().clone(), DeletionReason::for_node(node));
                result.order.push(node.digest().clone());
                for reference in &node.references {
                    if !live.contains(reference) {
                        continue;
                    }
                    if let Some(count) = counts.get_mut(reference) {
                        *count = count.saturating_sub(1);
                    }
                }
            }

            obs::emit_solver_pass(pass, marked.len());
            result.passes.push(PassStats {
                pass,
                marked: marked.len(),
            });

            if marked.is_empty() {
                break;
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PackageVersion, RegistryObject};

    fn digest(name: &str) -> Digest {
        Digest::sha256(name.as_bytes())
    }

    fn object(name: &str, tags: &[&str], children: &[&str]) -> RegistryObject {
        let version = PackageVersion {
            id: 1,
            digest: digest(name),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        };
        if children.is_empty() {
            RegistryObject::image(&version)
        } else {
            RegistryObject::index(&version, children.iter().map(|c| digest(c)).collect())
        }
    }

    /// Pinned iff the object has a tag not starting with `closed-`.
    fn graph(items: Vec<RegistryObject>) -> ReferenceGraph {
        let pinned: BTreeSet<Digest> = items
            .iter()
            .filter(|o| o.tags.iter().any(|t| !t.starts_with("closed-")))
            .map(|o| o.digest.clone())
            .collect();
        ReferenceGraph::from_classified(
            items.into_iter().map(|o| (o.digest.clone(), o)).collect(),
            |d| pinned.contains(d),
        )
    }

    fn names(set: &DeletionSet, all: &[&str]) -> Vec<String> {
        all.iter()
            .filter(|n| set.contains(&digest(n)))
            .map(|n| n.to_string())
            .collect()
    }

    #[test]
    fn test_untagged_unreferenced_image_is_deleted() {
        let set = LivenessSolver::solve(&graph(vec![object("a", &[], &[])]));
        assert_eq!(set.reason(&digest("a")), Some(DeletionReason::Untagged));
        assert_eq!(set.passes().len(), 2);
    }

    #[test]
    fn test_release_tag_pins_image() {
        let set = LivenessSolver::solve(&graph(vec![object("a", &["v1.2.3"], &[])]));
        assert!(set.is_empty());
        assert_eq!(set.passes(), &[PassStats { pass: 1, marked: 0 }]);
    }

    #[test]
    fn test_index_over_untagged_and_pinned_images() {
        let set = LivenessSolver::solve(&graph(vec![
            object("a", &[], &[]),
            object("b", &["v1.2.3"], &[]),
            object("i", &[], &["a", "b"]),
        ]));
        assert_eq!(names(&set, &["a", "b", "i"]), vec!["a", "i"]);
        assert_eq!(set.reason(&digest("a")), Some(DeletionReason::Orphaned));
        assert_eq!(set.reason(&digest("i")), Some(DeletionReason::Untagged));
    }

    #[test]
    fn test_eligible_index_sweeps_children_over_two_passes() {
        let set = LivenessSolver::solve(&graph(vec![
            object("a", &[], &[]),
            object("b", &[], &[]),
            object("i", &["closed-pr"], &["a", "b"]),
        ]));
        assert_eq!(set.len(), 3);
        assert_eq!(set.reason(&digest("i")), Some(DeletionReason::ClosedPullRequest));
        assert_eq!(set.count(DeletionReason::Orphaned), 2);
        let marked: Vec<usize> = set.passes().iter().map(|p| p.marked).collect();
        assert_eq!(marked, vec![1, 2, 0]);
    }

    #[test]
    fn test_image_shared_with_pinned_index_is_kept() {
        let set = LivenessSolver::solve(&graph(vec![
            object("a", &[], &[]),
            object("eligible", &[], &["a"]),
            object("release", &["v2"], &["a"]),
        ]));
        assert_eq!(names(&set, &["a", "eligible", "release"]), vec!["eligible"]);
    }

    #[test]
    fn test_pinned_index_keeps_untagged_children() {
        let set = LivenessSolver::solve(&graph(vec![
            object("a", &[], &[]),
            object("i", &["latest"], &["a"]),
        ]));
        assert!(set.is_empty());
    }

    #[test]
    fn test_nested_indices_cascade() {
        let set = LivenessSolver::solve(&graph(vec![
            object("a", &[], &[]),
            object("inner", &[], &["a"]),
            object("outer", &["closed-1"], &["inner"]),
        ]));
        assert_eq!(set.len(), 3);
        let marked: Vec<usize> = set.passes().iter().map(|p| p.marked).collect();
        assert_eq!(marked, vec![1, 1, 1, 0]);

        let order: Vec<&Digest> = set.in_deletion_order().map(|(d, _)| d).collect();
        assert_eq!(order, vec![&digest("outer"), &digest("inner"), &digest("a")]);
    }

    #[test]
    fn test_index_comes_before_children_in_deletion_order() {
        // Pick names so the children sort before the index by digest.
        let names = ["c0", "c1", "c2", "c3", "c4", "c5"];
        let index = names
            .iter()
            .copied()
            .max_by_key(|n| digest(n))
            .unwrap_or("c0");
        let children: Vec<&str> = names.iter().copied().filter(|n| *n != index).collect();

        let mut items: Vec<RegistryObject> =
            children.iter().map(|c| object(c, &[], &[])).collect();
        items.push(object(index, &[], &children));
        let set = LivenessSolver::solve(&graph(items));

        let order: Vec<&Digest> = set.in_deletion_order().map(|(d, _)| d).collect();
        assert_eq!(order.len(), names.len());
        assert_eq!(order[0], &digest(index));
        assert_eq!(set.digests().count(), order.len());
    }

    #[test]
    fn test_cycle_is_never_collected_and_terminates() {
        let set = LivenessSolver::solve(&graph(vec![
            object("x", &[], &["y"]),
            object("y", &[], &["x"]),
            object("free", &[], &[]),
        ]));
        assert_eq!(names(&set, &["x", "y", "free"]), vec!["free"]);
    }

    #[test]
    fn test_duplicate_child_entries_need_both_parents_gone() {
        let set = LivenessSolver::solve(&graph(vec![
            object("a", &[], &[]),
            object("i", &[], &["a", "a"]),
        ]));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_solving_twice_is_idempotent() {
        let g = graph(vec![
            object("a", &[], &[]),
            object("b", &["v1"], &[]),
            object("i", &[], &["a", "b"]),
            object("j", &["closed-3"], &["i"]),
        ]);
        let first = LivenessSolver::solve(&g);
        let second = LivenessSolver::solve(&g);
        assert_eq!(first, second);
        assert_eq!(g.node(&digest("a")).unwrap().referenced_count, 1);
    }
}
