pub use crate::{
    BuildDiagnostic, CommandDispatcher, EditOutcome, ForestError, MoveRequest, NavDirection,
    Node, NodeRecord, ObservableState, PrefixRule, SearchOptions, SelectionMode, TreeCommand,
    TreeConfig, TreeController, TreeEvent, TreeGlyphs, TreeNotification, TreeScrollPolicy,
    TreeSnapshot, TreeStats, TreeView, TreeViewState, TreeViewStyle,
};

#[cfg(feature = "keymap")]
pub use crate::{KeymapProfile, TreeKeyBindings};
