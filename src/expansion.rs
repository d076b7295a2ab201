use rustc_hash::{FxBuildHasher, FxHashSet};

use crate::index::TreeIndex;

/// Slots whose expansion changed during a bulk operation, in tree order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExpansionDiff {
    pub expanded: Vec<usize>,
    pub collapsed: Vec<usize>,
}

impl ExpansionDiff {
    pub const fn is_empty(&self) -> bool {
        self.expanded.is_empty() && self.collapsed.is_empty()
    }
}

/// Set of open nodes. Only nodes with children are ever members.
#[derive(Clone, Debug, Default)]
pub struct ExpansionState {
    expanded: FxHashSet<usize>,
}

impl ExpansionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            expanded: FxHashSet::with_capacity_and_hasher(capacity, FxBuildHasher),
        }
    }

    #[inline]
    pub fn is_expanded(&self, slot: usize) -> bool {
        self.expanded.contains(&slot)
    }

    pub fn len(&self) -> usize {
        self.expanded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expanded.is_empty()
    }

    /// Expanded slots in tree order.
    pub fn slots(&self) -> Vec<usize> {
        let mut slots: Vec<_> = self.expanded.iter().copied().collect();
        slots.sort_unstable();
        slots
    }

    /// Opens a node; returns `true` only if the state changed.
    pub fn expand(&mut self, index: &TreeIndex, slot: usize) -> bool {
        index.has_children(slot) && self.expanded.insert(slot)
    }

    /// Closes a node; returns `true` only if the state changed.
    pub fn collapse(&mut self, slot: usize) -> bool {
        self.expanded.remove(&slot)
    }

    /// Flips a node with children; returns the new state, or `None` for a leaf.
    pub fn toggle(&mut self, index: &TreeIndex, slot: usize) -> Option<bool> {
        if !index.has_children(slot) {
            return None;
        }
        if self.expanded.remove(&slot) {
            Some(false)
        } else {
            self.expanded.insert(slot);
            Some(true)
        }
    }

    /// Opens every node with children.
    pub fn expand_all(&mut self, index: &TreeIndex) -> Vec<usize> {
        let extra = index.len().saturating_sub(self.expanded.capacity());
        if extra > 0 {
            self.expanded.reserve(extra);
        }
        index
            .parent_slots()
            .filter(|&slot| self.expanded.insert(slot))
            .collect()
    }

    /// Closes every node; returns the slots that were open.
    pub fn collapse_all(&mut self) -> Vec<usize> {
        let previous = self.slots();
        self.expanded.clear();
        previous
    }

    /// Resets to "every node with children shallower than `depth` is open".
    pub fn expand_to_depth(&mut self, index: &TreeIndex, depth: usize) -> ExpansionDiff {
        let target: FxHashSet<usize> = index
            .parent_slots()
            .filter(|&slot| index.depth(slot).is_some_and(|d| d < depth))
            .collect();
        let mut diff = ExpansionDiff {
            expanded: target.difference(&self.expanded).copied().collect(),
            collapsed: self.expanded.difference(&target).copied().collect(),
        };
        diff.expanded.sort_unstable();
        diff.collapsed.sort_unstable();
        self.expanded = target;
        diff
    }

    /// Opens every strict ancestor of a node.
    pub fn expand_ancestors(&mut self, index: &TreeIndex, slot: usize) -> Vec<usize> {
        let mut opened = Vec::new();
        let mut cursor = index.parent(slot);
        while let Some(ancestor) = cursor {
            if self.expanded.insert(ancestor) {
                opened.push(ancestor);
            }
            cursor = index.parent(ancestor);
        }
        opened.reverse();
        opened
    }

    /// Opens or closes a node and its whole subtree.
    pub fn set_recursive(&mut self, index: &TreeIndex, slot: usize, expand: bool) -> Vec<usize> {
        let mut changed = Vec::new();
        let mut stack = vec![slot];
        while let Some(current) = stack.pop() {
            let children = index.children(current);
            if children.is_empty() {
                continue;
            }
            let flipped = if expand {
                self.expanded.insert(current)
            } else {
                self.expanded.remove(&current)
            };
            if flipped {
                changed.push(current);
            }
            stack.extend(children.iter().rev().copied());
        }
        changed
    }

    pub fn clear(&mut self) {
        self.expanded.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeRecord;

    fn index() -> TreeIndex {
        // 0:A [1:B [2:D], 3:C]
        TreeIndex::build(&[NodeRecord::with_id("A", "A")
            .child(NodeRecord::with_id("B", "B").child(NodeRecord::with_id("D", "D")))
            .child(NodeRecord::with_id("C", "C"))])
    }

    #[test]
    fn expand_is_idempotent_and_ignores_leaves() {
        let index = index();
        let mut state = ExpansionState::new();

        assert!(state.expand(&index, 0));
        assert!(!state.expand(&index, 0));
        assert!(!state.expand(&index, 2));
        assert!(!state.expand(&index, 42));
        assert!(!state.collapse(2));
        assert_eq!(state.slots(), vec![0]);
    }

    #[test]
    fn toggle_reports_new_state() {
        let index = index();
        let mut state = ExpansionState::new();

        assert_eq!(state.toggle(&index, 1), Some(true));
        assert_eq!(state.toggle(&index, 1), Some(false));
        assert_eq!(state.toggle(&index, 3), None);
    }

    #[test]
    fn expand_to_depth_is_deterministic() {
        let index = index();
        let mut state = ExpansionState::new();
        state.expand(&index, 1);

        let diff = state.expand_to_depth(&index, 1);

        assert_eq!(state.slots(), vec![0]);
        assert_eq!(diff.expanded, vec![0]);
        assert_eq!(diff.collapsed, vec![1]);

        state.expand_all(&index);
        state.expand_to_depth(&index, 1);
        assert_eq!(state.slots(), vec![0]);
        assert!(state.expand_to_depth(&index, 0).collapsed == vec![0]);
        assert!(state.is_empty());
    }

    #[test]
    fn recursive_and_ancestor_expansion() {
        let index = index();
        let mut state = ExpansionState::new();

        assert_eq!(state.expand_ancestors(&index, 2), vec![0, 1]);
        assert_eq!(state.set_recursive(&index, 0, false), vec![0, 1]);
        assert!(state.is_empty());
        assert_eq!(state.set_recursive(&index, 0, true), vec![0, 1]);
        assert_eq!(state.collapse_all(), vec![0, 1]);
    }
}
