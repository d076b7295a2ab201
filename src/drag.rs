use crate::index::TreeIndex;

/// Returns `true` if `source` may be reparented under `target`.
///
/// Rejects unknown slots, a node dropped onto itself, and a node dropped onto one of its own
/// descendants. Never mutates anything.
pub fn validate_move(index: &TreeIndex, source: usize, target: usize) -> bool {
    if source == target || index.node(source).is_none() || index.node(target).is_none() {
        return false;
    }
    !index.is_ancestor(source, target)
}

/// Reparent request produced by a successful drop; applying it is the data owner's job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveRequest {
    pub source: String,
    pub target: String,
}

/// Ephemeral state of one drag gesture.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DragContext {
    pub(crate) source: usize,
    pub(crate) target: Option<usize>,
    pub(crate) valid: bool,
}

impl DragContext {
    pub(crate) const fn new(source: usize) -> Self {
        Self {
            source,
            target: None,
            valid: false,
        }
    }

    /// Updates the hovered target; returns whether a drop there would be accepted.
    pub(crate) fn hover(&mut self, index: &TreeIndex, target: Option<usize>) -> bool {
        self.target = target;
        self.valid = target.is_some_and(|target| validate_move(index, self.source, target));
        self.valid
    }

    pub const fn is_valid(&self) -> bool {
        self.valid
    }
}
