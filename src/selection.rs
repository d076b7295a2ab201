use rustc_hash::FxHashSet;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How many nodes may be selected at once.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SelectionMode {
    /// Selection is disabled; every operation is a no-op.
    None,
    /// At most one node.
    #[default]
    Single,
    /// Any number of nodes.
    Multiple,
}

/// Membership changes produced by a selection operation, in tree order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectionDelta {
    pub selected: Vec<usize>,
    pub deselected: Vec<usize>,
}

impl SelectionDelta {
    pub const fn is_empty(&self) -> bool {
        self.selected.is_empty() && self.deselected.is_empty()
    }
}

/// Selected slots under a [`SelectionMode`], plus the anchor used for range extension.
#[derive(Clone, Debug, Default)]
pub struct SelectionState {
    mode: SelectionMode,
    selected: FxHashSet<usize>,
    anchor: Option<usize>,
}

impl SelectionState {
    pub fn new(mode: SelectionMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    #[inline]
    pub const fn mode(&self) -> SelectionMode {
        self.mode
    }

    /// Changes the mode, dropping members the new mode does not allow.
    pub fn set_mode(&mut self, mode: SelectionMode) -> Vec<usize> {
        self.mode = mode;
        match mode {
            SelectionMode::None => self.clear(),
            SelectionMode::Single if self.selected.len() > 1 => {
                let keep = self
                    .anchor
                    .filter(|anchor| self.selected.contains(anchor))
                    .or_else(|| self.selected.iter().min().copied());
                let mut dropped: Vec<_> = self
                    .selected
                    .iter()
                    .copied()
                    .filter(|&slot| Some(slot) != keep)
                    .collect();
                dropped.sort_unstable();
                self.selected.retain(|&slot| Some(slot) == keep);
                dropped
            }
            SelectionMode::Single | SelectionMode::Multiple => Vec::new(),
        }
    }

    #[inline]
    pub fn is_selected(&self, slot: usize) -> bool {
        self.selected.contains(&slot)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Selected slots in tree order.
    pub fn slots(&self) -> Vec<usize> {
        let mut slots: Vec<_> = self.selected.iter().copied().collect();
        slots.sort_unstable();
        slots
    }

    /// Anchor for range extension: the last node selected without `extend`.
    pub const fn anchor(&self) -> Option<usize> {
        self.anchor
    }

    /// Selects a node. `extend` only matters in [`SelectionMode::Multiple`].
    pub fn select(&mut self, slot: usize, extend: bool) -> SelectionDelta {
        let mut delta = SelectionDelta::default();
        match self.mode {
            SelectionMode::None => return delta,
            SelectionMode::Single => {
                delta.deselected = self.clear_except(slot);
                self.anchor = Some(slot);
            }
            SelectionMode::Multiple => {
                if extend {
                    self.anchor.get_or_insert(slot);
                } else {
                    delta.deselected = self.clear_except(slot);
                    self.anchor = Some(slot);
                }
            }
        }
        if self.selected.insert(slot) {
            delta.selected.push(slot);
        }
        delta
    }

    /// Removes a node from the selection; returns `true` if it was selected.
    pub fn deselect(&mut self, slot: usize) -> bool {
        if self.mode == SelectionMode::None {
            return false;
        }
        self.selected.remove(&slot)
    }

    /// Deselects a selected node, or selects it with [`Self::select`] semantics.
    pub fn toggle(&mut self, slot: usize, extend: bool) -> SelectionDelta {
        if self.mode == SelectionMode::None {
            return SelectionDelta::default();
        }
        if self.selected.remove(&slot) {
            return SelectionDelta {
                selected: Vec::new(),
                deselected: vec![slot],
            };
        }
        self.select(slot, extend)
    }

    /// Empties the selection; returns the slots that were selected.
    pub fn clear(&mut self) -> Vec<usize> {
        let previous = self.slots();
        self.selected.clear();
        self.anchor = None;
        previous
    }

    /// Replaces the selection with the inclusive span between `a` and `b` in `order`.
    ///
    /// Symmetric in `a` and `b`. A no-op if either end is absent from `order`. In
    /// [`SelectionMode::Single`] only `b` ends up selected.
    pub fn select_range(&mut self, order: &[usize], a: usize, b: usize) -> SelectionDelta {
        match self.mode {
            SelectionMode::None => return SelectionDelta::default(),
            SelectionMode::Single => {
                return if order.contains(&b) {
                    self.select(b, false)
                } else {
                    SelectionDelta::default()
                };
            }
            SelectionMode::Multiple => {}
        }
        let (Some(pos_a), Some(pos_b)) = (
            order.iter().position(|&slot| slot == a),
            order.iter().position(|&slot| slot == b),
        ) else {
            return SelectionDelta::default();
        };
        let (start, end) = (pos_a.min(pos_b), pos_a.max(pos_b));
        let span: FxHashSet<usize> = order[start..=end].iter().copied().collect();
        self.replace_with(span)
    }

    /// Selects every slot in `order` (multiple mode only).
    pub fn select_all(&mut self, order: &[usize]) -> SelectionDelta {
        if self.mode != SelectionMode::Multiple {
            return SelectionDelta::default();
        }
        let anchor = self.anchor;
        let delta = self.replace_with(order.iter().copied().collect());
        self.anchor = anchor.or_else(|| order.first().copied());
        delta
    }

    /// Restores a set of slots, trimmed to what the mode allows.
    pub fn restore(&mut self, slots: impl IntoIterator<Item = usize>) {
        self.selected.clear();
        self.anchor = None;
        let limit = match self.mode {
            SelectionMode::None => 0,
            SelectionMode::Single => 1,
            SelectionMode::Multiple => usize::MAX,
        };
        for slot in slots.into_iter().take(limit) {
            self.selected.insert(slot);
            self.anchor.get_or_insert(slot);
        }
    }

    fn replace_with(&mut self, span: FxHashSet<usize>) -> SelectionDelta {
        let mut delta = SelectionDelta {
            selected: span.difference(&self.selected).copied().collect(),
            deselected: self.selected.difference(&span).copied().collect(),
        };
        delta.selected.sort_unstable();
        delta.deselected.sort_unstable();
        self.selected = span;
        delta
    }

    fn clear_except(&mut self, keep: usize) -> Vec<usize> {
        let mut dropped: Vec<_> = self
            .selected
            .iter()
            .copied()
            .filter(|&slot| slot != keep)
            .collect();
        dropped.sort_unstable();
        self.selected.retain(|&slot| slot == keep);
        dropped
    }
}
