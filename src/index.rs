use std::fmt;
use std::hash::{Hash, Hasher};

use rustc_hash::{FxHashMap, FxHasher};
use smallvec::SmallVec;

use crate::model::{Node, NodeRecord, TreeModel};

/// Data-integrity problem found while building an index.
///
/// Diagnostics never abort a build: the offending entry is dropped and the rest is kept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuildDiagnostic {
    /// A node repeats the id of one of its own ancestors; the node and its subtree were pruned.
    CycleDetected { id: String, parent: Option<String> },
    /// A node repeats an id accepted elsewhere in the forest; the node and its subtree were pruned.
    DuplicateId { id: String, parent: Option<String> },
    /// An entry of the input could not be read as a node record and was skipped.
    MalformedEntry {
        parent: Option<String>,
        position: usize,
        reason: String,
    },
}

impl fmt::Display for BuildDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parent_of = |parent: &Option<String>| parent.as_deref().unwrap_or("<root>").to_owned();
        match self {
            Self::CycleDetected { id, parent } => write!(
                f,
                "cycle: node `{id}` under `{}` repeats an ancestor id, subtree pruned",
                parent_of(parent)
            ),
            Self::DuplicateId { id, parent } => write!(
                f,
                "duplicate id `{id}` under `{}`, subtree pruned",
                parent_of(parent)
            ),
            Self::MalformedEntry {
                parent,
                position,
                reason,
            } => write!(
                f,
                "malformed entry #{position} under `{}` skipped: {reason}",
                parent_of(parent)
            ),
        }
    }
}

/// Ancestor path from a root down to (and including) a node.
pub type NodePath = SmallVec<[usize; 8]>;

/// Flat identity/topology maps for one loaded forest.
///
/// Nodes live in an arena addressed by dense `usize` slots assigned in depth-first pre-order,
/// so slot order is also raw tree order. Slots are only meaningful for the index that produced
/// them.
#[derive(Clone, Debug, Default)]
pub struct TreeIndex {
    nodes: Vec<Node>,
    slots: FxHashMap<String, usize>,
    parents: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
    depths: Vec<usize>,
    roots: Vec<usize>,
    max_depth: usize,
    diagnostics: Vec<BuildDiagnostic>,
}

enum Frame<'a> {
    Enter {
        record: &'a NodeRecord,
        parent: Option<usize>,
        position: usize,
    },
    Exit(usize),
}

impl TreeIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an index from an input forest.
    pub fn build(records: &[NodeRecord]) -> Self {
        Self::build_with_diagnostics(records, Vec::new())
    }

    /// Builds an index, prepending diagnostics collected upstream (e.g. while decoding JSON).
    pub fn build_with_diagnostics(
        records: &[NodeRecord],
        diagnostics: Vec<BuildDiagnostic>,
    ) -> Self {
        let mut index = Self {
            diagnostics,
            ..Self::default()
        };
        // Membership flags for the current ancestor path, indexed by slot.
        let mut on_path: Vec<bool> = Vec::new();
        let mut stack: Vec<Frame<'_>> = records
            .iter()
            .enumerate()
            .rev()
            .map(|(position, record)| Frame::Enter {
                record,
                parent: None,
                position,
            })
            .collect();

        while let Some(frame) = stack.pop() {
            let (record, parent, position) = match frame {
                Frame::Exit(slot) => {
                    on_path[slot] = false;
                    continue;
                }
                Frame::Enter {
                    record,
                    parent,
                    position,
                } => (record, parent, position),
            };

            let id = match record.id.as_deref().filter(|id| !id.is_empty()) {
                Some(id) => id.to_owned(),
                None => index.derive_id(&record.label, parent, position),
            };

            if let Some(&existing) = index.slots.get(&id) {
                let parent_id = parent.map(|slot| index.nodes[slot].id.clone());
                let diagnostic = if on_path[existing] {
                    BuildDiagnostic::CycleDetected {
                        id,
                        parent: parent_id,
                    }
                } else {
                    BuildDiagnostic::DuplicateId {
                        id,
                        parent: parent_id,
                    }
                };
                log::warn!("tree index: {diagnostic}");
                index.diagnostics.push(diagnostic);
                continue;
            }

            let slot = index.push_node(record, id, parent);
            on_path.push(true);
            stack.push(Frame::Exit(slot));
            for (position, child) in record.children.iter().enumerate().rev() {
                stack.push(Frame::Enter {
                    record: child,
                    parent: Some(slot),
                    position,
                });
            }
        }

        log::debug!(
            "tree index: built {} nodes ({} roots, max depth {}, {} diagnostics)",
            index.nodes.len(),
            index.roots.len(),
            index.max_depth,
            index.diagnostics.len()
        );
        index
    }

    fn push_node(&mut self, record: &NodeRecord, id: String, parent: Option<usize>) -> usize {
        let slot = self.nodes.len();
        let depth = parent.map_or(0, |parent| self.depths[parent] + 1);
        self.nodes.push(Node {
            id: id.clone(),
            label: record.label.clone(),
            fields: record.fields.clone(),
        });
        self.slots.insert(id, slot);
        self.parents.push(parent);
        self.children.push(Vec::new());
        self.depths.push(depth);
        self.max_depth = self.max_depth.max(depth);
        match parent {
            Some(parent) => self.children[parent].push(slot),
            None => self.roots.push(slot),
        }
        slot
    }

    // Hash of (parent id, label, sibling position, salt); the salt is bumped until unused.
    fn derive_id(&self, label: &str, parent: Option<usize>, position: usize) -> String {
        let parent_id = parent.map(|slot| self.nodes[slot].id.as_str());
        (0_u64..)
            .map(|salt| {
                let mut hasher = FxHasher::default();
                parent_id.hash(&mut hasher);
                label.hash(&mut hasher);
                (position as u64).hash(&mut hasher);
                salt.hash(&mut hasher);
                format!("node-{:016x}", hasher.finish())
            })
            .find(|candidate| !self.slots.contains_key(candidate))
            .unwrap_or_default()
    }

    /// Number of indexed nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Resolves an id to its slot.
    #[inline]
    pub fn slot(&self, id: &str) -> Option<usize> {
        self.slots.get(id).copied()
    }

    #[inline]
    pub fn node(&self, slot: usize) -> Option<&Node> {
        self.nodes.get(slot)
    }

    /// Returns the node with the given id.
    pub fn get(&self, id: &str) -> Option<&Node> {
        self.slot(id).and_then(|slot| self.nodes.get(slot))
    }

    /// Returns the id stored at a slot.
    pub fn id(&self, slot: usize) -> Option<&str> {
        self.nodes.get(slot).map(|node| node.id.as_str())
    }

    pub fn parent(&self, slot: usize) -> Option<usize> {
        self.parents.get(slot).copied().flatten()
    }

    pub fn children(&self, slot: usize) -> &[usize] {
        self.children.get(slot).map_or(&[], Vec::as_slice)
    }

    pub fn depth(&self, slot: usize) -> Option<usize> {
        self.depths.get(slot).copied()
    }

    #[inline]
    pub fn has_children(&self, slot: usize) -> bool {
        !self.children(slot).is_empty()
    }

    /// Returns the ancestor path `root..=slot`, or an empty path for an unknown slot.
    pub fn path(&self, slot: usize) -> NodePath {
        let mut path = NodePath::new();
        if slot >= self.nodes.len() {
            return path;
        }
        let mut cursor = Some(slot);
        while let Some(current) = cursor {
            path.push(current);
            cursor = self.parents[current];
        }
        path.reverse();
        path
    }

    /// Returns `true` if `ancestor` is a strict ancestor of `slot`.
    pub fn is_ancestor(&self, ancestor: usize, slot: usize) -> bool {
        let mut cursor = self.parent(slot);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// Deepest depth in the forest (roots are depth 0).
    pub const fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Diagnostics raised while building this index.
    pub fn diagnostics(&self) -> &[BuildDiagnostic] {
        &self.diagnostics
    }

    /// Iterates nodes in raw tree order.
    pub fn nodes(&self) -> impl Iterator<Item = (usize, &Node)> {
        self.nodes.iter().enumerate()
    }

    /// Slots of every node that has at least one child.
    pub fn parent_slots(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.nodes.len()).filter(|&slot| self.has_children(slot))
    }

    pub(crate) fn set_label(&mut self, slot: usize, label: String) {
        if let Some(node) = self.nodes.get_mut(slot) {
            node.label = label;
        }
    }
}

impl TreeModel for TreeIndex {
    fn roots(&self) -> &[usize] {
        &self.roots
    }

    fn children_of(&self, slot: usize) -> &[usize] {
        self.children(slot)
    }

    fn contains(&self, slot: usize) -> bool {
        slot < self.nodes.len()
    }

    fn size_hint(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<NodeRecord> {
        vec![
            NodeRecord::with_id("A", "A")
                .child(NodeRecord::with_id("B", "B").child(NodeRecord::with_id("D", "D")))
                .child(NodeRecord::with_id("C", "C")),
            NodeRecord::with_id("E", "E"),
        ]
    }

    fn ids(index: &TreeIndex, slots: &[usize]) -> Vec<String> {
        slots
            .iter()
            .filter_map(|&slot| index.id(slot).map(str::to_owned))
            .collect()
    }

    #[test]
    fn builds_topology_maps() {
        let index = TreeIndex::build(&sample());

        assert_eq!(index.len(), 5);
        assert_eq!(ids(&index, index.roots()), ["A", "E"]);
        let a = index.slot("A").unwrap();
        let d = index.slot("D").unwrap();
        assert_eq!(ids(&index, index.children(a)), ["B", "C"]);
        assert_eq!(index.id(index.parent(d).unwrap()), Some("B"));
        assert_eq!(ids(&index, &index.path(d)), ["A", "B", "D"]);
        assert_eq!(index.depth(d), Some(2));
        assert_eq!(index.max_depth(), 2);
        assert!(index.is_ancestor(a, d));
        assert!(!index.is_ancestor(d, a));
        assert!(index.diagnostics().is_empty());
    }

    #[test]
    fn slots_follow_preorder() {
        let index = TreeIndex::build(&sample());
        let order: Vec<_> = index.nodes().map(|(_, node)| node.id.as_str()).collect();
        assert_eq!(order, ["A", "B", "D", "C", "E"]);
    }

    #[test]
    fn prunes_child_that_repeats_an_ancestor() {
        let forest = vec![NodeRecord::with_id("A", "A").child(
            NodeRecord::with_id("B", "B")
                .child(NodeRecord::with_id("A", "again").child(NodeRecord::with_id("X", "X")))
                .child(NodeRecord::with_id("C", "C")),
        )];

        let index = TreeIndex::build(&forest);

        assert_eq!(index.len(), 3);
        assert!(index.get("X").is_none());
        assert_eq!(index.get("A").map(|node| node.label.as_str()), Some("A"));
        assert_eq!(
            index.diagnostics(),
            [BuildDiagnostic::CycleDetected {
                id: "A".into(),
                parent: Some("B".into()),
            }]
        );
    }

    #[test]
    fn prunes_duplicate_ids_outside_the_path() {
        let forest = vec![
            NodeRecord::with_id("A", "A").child(NodeRecord::with_id("B", "B")),
            NodeRecord::with_id("B", "other").child(NodeRecord::with_id("Z", "Z")),
        ];

        let index = TreeIndex::build(&forest);

        assert_eq!(index.len(), 2);
        assert_eq!(index.roots().len(), 1);
        assert!(matches!(
            index.diagnostics(),
            [BuildDiagnostic::DuplicateId { id, parent: None }] if id == "B"
        ));
    }

    #[test]
    fn derived_ids_are_deterministic_and_unique() {
        let forest = vec![
            NodeRecord::new("same").child(NodeRecord::new("leaf")),
            NodeRecord::new("same"),
            NodeRecord::with_id("", "empty id"),
        ];

        let first = TreeIndex::build(&forest);
        let second = TreeIndex::build(&forest);

        let first_ids: Vec<_> = first.nodes().map(|(_, n)| n.id.clone()).collect();
        let second_ids: Vec<_> = second.nodes().map(|(_, n)| n.id.clone()).collect();
        assert_eq!(first_ids, second_ids);
        assert_eq!(first.len(), 4);
        assert!(first_ids.iter().all(|id| id.starts_with("node-")));
        assert!(first.diagnostics().is_empty());
    }

    #[test]
    fn deep_chain_builds_without_recursion() {
        let mut record = NodeRecord::with_id("leaf", "leaf");
        for depth in (0..20_000).rev() {
            record = NodeRecord::with_id(format!("n{depth}"), "n").child(record);
        }

        let index = TreeIndex::build(std::slice::from_ref(&record));
        drop(record_drop_guard(record));

        assert_eq!(index.len(), 20_001);
        assert_eq!(index.max_depth(), 20_000);
    }

    // Dropping a deeply nested record recurses; unwind it iteratively.
    fn record_drop_guard(mut record: NodeRecord) -> Vec<NodeRecord> {
        let mut flat = Vec::new();
        while let Some(child) = record.children.pop() {
            flat.push(std::mem::replace(&mut record, child));
        }
        flat
    }

    #[test]
    fn unknown_slots_are_harmless() {
        let index = TreeIndex::build(&sample());
        assert!(index.path(99).is_empty());
        assert!(index.children(99).is_empty());
        assert_eq!(index.parent(99), None);
        assert_eq!(index.depth(99), None);
    }
}
