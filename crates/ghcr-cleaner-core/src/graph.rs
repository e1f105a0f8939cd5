//! Reference graph between image indices and the objects they list.
//!
//! An edge `I → C` means "index `I` names `C` in its manifest list". Each
//! node's `referenced_count` is its in-degree. Children missing from the
//! inventory are dropped with a warning rather than counted, and no cycle
//! detection is performed: the liveness solver terminates on cyclic input
//! and simply never collects a cycle.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::classifier::TagClassifier;
use crate::domain::{Digest, RegistryObject};

/// One registry object plus its run-scoped graph state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub object: RegistryObject,
    /// Number of index entries naming this node
    pub referenced_count: usize,
    /// Children of an index that resolve to known nodes, in manifest order
    pub references: Vec<Digest>,
    /// Tag classifier verdict: must be kept regardless of references
    pub pinned: bool,
}

impl GraphNode {
    fn new(object: RegistryObject, pinned: bool) -> Self {
        GraphNode {
            object,
            referenced_count: 0,
            references: Vec::new(),
            pinned,
        }
    }

    pub fn digest(&self) -> &Digest {
        &self.object.digest
    }
}

/// An index entry pointing at a digest absent from the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DanglingReference {
    pub index: Digest,
    pub child: Digest,
}

/// Immutable reference graph for one run.
#[derive(Debug, Clone, Default)]
pub struct ReferenceGraph {
    nodes: BTreeMap<Digest, GraphNode>,
    dangling: Vec<DanglingReference>,
}

impl ReferenceGraph {
    /// Build the graph, classifying each object's tags exactly once.
    pub async fn build(
        objects: BTreeMap<Digest, RegistryObject>,
        classifier: &TagClassifier,
    ) -> Self {
        let mut pinned = BTreeMap::new();
        for (digest, object) in &objects {
            let keep = !classifier.is_eligible_for_deletion(&object.tags).await;
            debug!(digest = %digest, tags = ?object.tags, pinned = keep, "classified registry object");
            pinned.insert(digest.clone(), keep);
        }
        Self::from_classified(objects, |digest| {
            pinned.get(digest).copied().unwrap_or(true)
        })
    }

    /// Build the graph from objects whose pin state is already known.
    pub fn from_classified<F>(objects: BTreeMap<Digest, RegistryObject>, is_pinned: F) -> Self
    where
        F: Fn(&Digest) -> bool,
    {
        let mut nodes: BTreeMap<Digest, GraphNode> = objects
            .into_iter()
            .map(|(digest, object)| {
                let pinned = is_pinned(&digest);
                (digest, GraphNode::new(object, pinned))
            })
            .collect();

        // Collect edges first so no node is borrowed while counts change.
        let edges: Vec<(Digest, Digest)> = nodes
            .values()
            .flat_map(|node| {
                node.object
                    .children()
                    .iter()
                    .map(move |child| (node.digest().clone(), child.clone()))
            })
            .collect();

        let mut dangling = Vec::new();
        for (index, child) in edges {
            match nodes.get_mut(&child) {
                Some(target) => target.referenced_count += 1,
                None => {
                    warn!(index = %index, child = %child, "index references an unknown object, ignoring the reference");
                    dangling.push(DanglingReference { index, child });
                    continue;
                }
            }
            if let Some(source) = nodes.get_mut(&index) {
                source.references.push(child);
            }
        }

        ReferenceGraph { nodes, dangling }
    }

    pub fn node(&self, digest: &Digest) -> Option<&GraphNode> {
        self.nodes.get(digest)
    }

    /// Nodes in digest order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn dangling_references(&self) -> &[DanglingReference] {
        &self.dangling
    }

    pub fn pinned_count(&self) -> usize {
        self.nodes.values().filter(|n| n.pinned).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PackageVersion;

    fn digest(name: &str) -> Digest {
        Digest::sha256(name.as_bytes())
    }

    fn version(name: &str) -> PackageVersion {
        PackageVersion {
            id: 1,
            digest: digest(name),
            tags: Vec::new(),
        }
    }

    fn objects(items: Vec<RegistryObject>) -> BTreeMap<Digest, RegistryObject> {
        items.into_iter().map(|o| (o.digest.clone(), o)).collect()
    }

    #[test]
    fn test_counts_in_degree_from_every_index() {
        let graph = ReferenceGraph::from_classified(
            objects(vec![
                RegistryObject::image(&version("a")),
                RegistryObject::image(&version("b")),
                RegistryObject::index(&version("i1"), vec![digest("a"), digest("b")]),
                RegistryObject::index(&version("i2"), vec![digest("a")]),
            ]),
            |_| false,
        );

        assert_eq!(graph.len(), 4);
        assert_eq!(graph.node(&digest("a")).unwrap().referenced_count, 2);
        assert_eq!(graph.node(&digest("b")).unwrap().referenced_count, 1);
        assert_eq!(graph.node(&digest("i1")).unwrap().referenced_count, 0);
        assert_eq!(
            graph.node(&digest("i1")).unwrap().references,
            vec![digest("a"), digest("b")]
        );
        assert!(graph.node(&digest("a")).unwrap().references.is_empty());
    }

    #[test]
    fn test_nested_index_is_a_node_with_in_degree() {
        let graph = ReferenceGraph::from_classified(
            objects(vec![
                RegistryObject::image(&version("a")),
                RegistryObject::index(&version("inner"), vec![digest("a")]),
                RegistryObject::index(&version("outer"), vec![digest("inner")]),
            ]),
            |_| false,
        );
        assert_eq!(graph.node(&digest("inner")).unwrap().referenced_count, 1);
        assert_eq!(graph.node(&digest("a")).unwrap().referenced_count, 1);
    }

    #[test]
    fn test_dangling_reference_is_ignored_and_recorded() {
        let graph = ReferenceGraph::from_classified(
            objects(vec![
                RegistryObject::image(&version("a")),
                RegistryObject::index(&version("i"), vec![digest("a"), digest("gone")]),
            ]),
            |_| false,
        );
        assert_eq!(graph.node(&digest("i")).unwrap().references, vec![digest("a")]);
        assert_eq!(
            graph.dangling_references(),
            &[DanglingReference {
                index: digest("i"),
                child: digest("gone"),
            }]
        );
    }

    #[test]
    fn test_pin_state_comes_from_callback() {
        let pinned = digest("a");
        let graph = ReferenceGraph::from_classified(
            objects(vec![
                RegistryObject::image(&version("a")),
                RegistryObject::image(&version("b")),
            ]),
            |d| *d == pinned,
        );
        assert!(graph.node(&digest("a")).unwrap().pinned);
        assert!(!graph.node(&digest("b")).unwrap().pinned);
        assert_eq!(graph.pinned_count(), 1);
    }

    #[test]
    fn test_self_reference_does_not_panic() {
        let graph = ReferenceGraph::from_classified(
            objects(vec![RegistryObject::index(
                &version("loop"),
                vec![digest("loop")],
            )]),
            |_| false,
        );
        assert_eq!(graph.node(&digest("loop")).unwrap().referenced_count, 1);
    }
}
