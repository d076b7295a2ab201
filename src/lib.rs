//! Hierarchical tree controller with a ratatui renderer.
//!
//! [`TreeController`] owns a flattened index of a forest plus every piece of interaction state
//! (expansion, selection, search, focus, inline edit, drag) and reports changes as
//! [`TreeNotification`]s. [`TreeView`] draws it as a stateful widget.
//!
//! Feature flags:
//! - `keymap`: crossterm-based key bindings resolving to [`TreeCommand`]s.
//! - `serde`: serde support for [`TreeSnapshot`], [`SelectionMode`] and [`SearchOptions`].

mod action;
mod config;
mod context;
mod drag;
mod edit;
mod error;
mod event;
mod expansion;
mod glyphs;
mod index;
pub mod json;
#[cfg(feature = "keymap")]
mod keymap;
mod model;
pub mod prelude;
mod search;
mod selection;
mod state;
mod style;
mod widget;

pub use action::{CommandDispatcher, NavDirection, TreeCommand, TreeEvent};
pub use config::TreeConfig;
pub use context::TreeRowContext;
pub use drag::{DragContext, MoveRequest, validate_move};
pub use edit::{EditOutcome, EditSession, LabelParts, PrefixRule, join_label};
pub use error::ForestError;
pub use event::{NotificationQueue, ObservableState, TreeNotification};
pub use expansion::{ExpansionDiff, ExpansionState};
pub use glyphs::{TreeGlyphs, tree_label_line};
pub use index::{BuildDiagnostic, NodePath, TreeIndex};
pub use json::{Forest, parse_forest};
#[cfg(feature = "keymap")]
pub use keymap::{KeymapProfile, TreeKeyBindings};
pub use model::{LABEL_FIELD, Node, NodeRecord, TreeModel};
pub use search::{DEFAULT_SEARCH_FIELDS, SearchOptions, SearchState};
pub use selection::{SelectionDelta, SelectionMode, SelectionState};
pub use state::{TreeController, TreeSnapshot, TreeStats, VisibleNode, flatten_visible};
pub use style::{TreeScrollPolicy, TreeViewStyle};
pub use widget::{TreeView, TreeViewState};
