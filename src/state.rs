use smallvec::SmallVec;

use crate::action::{CommandDispatcher, NavDirection, TreeCommand, TreeEvent};
use crate::config::TreeConfig;
use crate::drag::{self, DragContext, MoveRequest};
use crate::edit::{EditOutcome, EditSession};
use crate::error::ForestError;
use crate::event::{NotificationQueue, ObservableState, TreeNotification};
use crate::expansion::ExpansionState;
use crate::index::{BuildDiagnostic, TreeIndex};
use crate::json::{self, Forest};
use crate::model::{Node, NodeRecord, TreeModel};
use crate::search::{SearchOptions, SearchState};
use crate::selection::{SelectionDelta, SelectionMode, SelectionState};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A visible node row with metadata used for rendering and navigation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VisibleNode {
    pub(crate) slot: usize,
    pub(crate) level: u16,
    pub(crate) parent: Option<usize>,
    pub(crate) has_children: bool,
    pub(crate) is_tail_stack: SmallVec<[bool; 8]>,
}

impl VisibleNode {
    pub const fn slot(&self) -> usize {
        self.slot
    }

    pub const fn level(&self) -> u16 {
        self.level
    }

    pub const fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub const fn has_children(&self) -> bool {
        self.has_children
    }

    /// For each ancestor level, whether that ancestor is the last of its siblings.
    pub fn is_tail_stack(&self) -> &[bool] {
        &self.is_tail_stack
    }
}

/// Depth-first, parent-before-children flattening that descends only into expanded nodes.
pub fn flatten_visible<T, F>(model: &T, is_expanded: F) -> Vec<VisibleNode>
where
    T: TreeModel,
    F: Fn(usize) -> bool,
{
    let mut rows = Vec::with_capacity(model.size_hint());
    let mut stack: Vec<(usize, Option<usize>, SmallVec<[bool; 8]>)> = model
        .roots()
        .iter()
        .rev()
        .map(|&root| (root, None, SmallVec::new()))
        .collect();

    while let Some((slot, parent, is_tail_stack)) = stack.pop() {
        if !model.contains(slot) {
            continue;
        }
        let children = model.children_of(slot);
        let has_children = !children.is_empty();
        let expanded = has_children && is_expanded(slot);
        if expanded {
            let last_idx = children.len() - 1;
            for (idx, &child) in children.iter().enumerate().rev() {
                let mut child_tail = is_tail_stack.clone();
                child_tail.push(idx == last_idx);
                stack.push((child, Some(slot), child_tail));
            }
        }
        rows.push(VisibleNode {
            slot,
            level: u16::try_from(is_tail_stack.len()).unwrap_or(u16::MAX),
            parent,
            has_children,
            is_tail_stack,
        });
    }
    rows
}

/// Counters exposed to collaborators.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub total: usize,
    pub roots: usize,
    pub expanded: usize,
    pub selected: usize,
    pub search_matches: usize,
    pub max_depth: usize,
    pub visible: usize,
}

/// Snapshot of interaction state (expansion, selection, focus, search).
///
/// With the `serde` feature enabled, this type derives `Serialize`/`Deserialize`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeSnapshot {
    pub expanded_ids: Vec<String>,
    pub selected_ids: Vec<String>,
    pub focus_id: Option<String>,
    pub search_query: String,
    pub search_result_ids: Vec<String>,
}

/// Hierarchical data controller: index, expansion, selection, search, focus, edit and drag.
#[derive(Debug, Default)]
pub struct TreeController {
    config: TreeConfig,
    index: TreeIndex,
    expansion: ExpansionState,
    selection: SelectionState,
    search: SearchState,
    focus: Option<usize>,
    edit: Option<EditSession>,
    drag: Option<DragContext>,
    notifications: NotificationQueue,
}

impl TreeController {
    /// Creates an empty controller with the default configuration.
    pub fn new() -> Self {
        Self::with_config(TreeConfig::default())
    }

    pub fn with_config(config: TreeConfig) -> Self {
        Self {
            selection: SelectionState::new(config.selection_mode),
            config,
            ..Self::default()
        }
    }

    /// Creates a controller loaded with a forest.
    pub fn from_records(records: &[NodeRecord], config: TreeConfig) -> Self {
        let mut controller = Self::with_config(config);
        controller.set_tree_data(records);
        controller.notifications.drain();
        controller
    }

    pub const fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub const fn index(&self) -> &TreeIndex {
        &self.index
    }

    // ---- data lifecycle ------------------------------------------------------------------

    /// Replaces the forest, rebuilding the index and resetting derived state.
    pub fn set_tree_data(&mut self, records: &[NodeRecord]) {
        self.replace_index(TreeIndex::build(records));
    }

    /// Replaces the forest with one decoded by [`crate::json`].
    pub fn set_forest(&mut self, forest: Forest) {
        self.replace_index(forest.into_index());
    }

    /// Replaces the forest from a JSON value; fails only if the top level is not a forest.
    pub fn set_tree_json(&mut self, value: &serde_json::Value) -> Result<(), ForestError> {
        let forest = json::forest_from_value(value)?;
        self.set_forest(forest);
        Ok(())
    }

    fn replace_index(&mut self, index: TreeIndex) {
        let focus_id = self.focused().map(str::to_owned);
        self.index = index;
        self.expansion = ExpansionState::with_capacity(self.index.len());
        self.selection = SelectionState::new(self.selection.mode());
        self.search = SearchState::new();
        self.edit = None;
        self.drag = None;
        self.focus = focus_id.as_deref().and_then(|id| self.index.slot(id));

        self.notifications.emit(TreeNotification::DataReplaced {
            total: self.index.len(),
            diagnostics: self.index.diagnostics().len(),
        });
        if focus_id.is_some() && self.focus.is_none() {
            self.notifications
                .emit(TreeNotification::FocusChanged { id: None });
        }
    }

    /// Diagnostics from the last build.
    pub fn diagnostics(&self) -> &[BuildDiagnostic] {
        self.index.diagnostics()
    }

    // ---- queries -------------------------------------------------------------------------

    pub fn get_node(&self, id: &str) -> Option<&Node> {
        self.index.get(id)
    }

    /// Child ids in display order (empty for leaves and unknown ids).
    pub fn children(&self, id: &str) -> Vec<&str> {
        self.index
            .slot(id)
            .map(|slot| self.ids(self.index.children(slot)))
            .unwrap_or_default()
    }

    pub fn parent(&self, id: &str) -> Option<&str> {
        let slot = self.index.slot(id)?;
        self.index.parent(slot).and_then(|parent| self.index.id(parent))
    }

    /// Ancestor path `root..=id` (empty for unknown ids).
    pub fn path(&self, id: &str) -> Vec<&str> {
        self.index
            .slot(id)
            .map(|slot| self.ids(&self.index.path(slot)))
            .unwrap_or_default()
    }

    pub fn depth(&self, id: &str) -> Option<usize> {
        self.index.slot(id).and_then(|slot| self.index.depth(slot))
    }

    pub fn has_children(&self, id: &str) -> bool {
        self.index
            .slot(id)
            .is_some_and(|slot| self.index.has_children(slot))
    }

    pub fn is_expanded(&self, id: &str) -> bool {
        self.index
            .slot(id)
            .is_some_and(|slot| self.expansion.is_expanded(slot))
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.index
            .slot(id)
            .is_some_and(|slot| self.selection.is_selected(slot))
    }

    pub fn is_search_result(&self, id: &str) -> bool {
        self.index
            .slot(id)
            .is_some_and(|slot| self.search.is_match(slot))
    }

    #[inline]
    pub(crate) fn slot_is_expanded(&self, slot: usize) -> bool {
        self.expansion.is_expanded(slot)
    }

    #[inline]
    pub(crate) fn slot_is_selected(&self, slot: usize) -> bool {
        self.selection.is_selected(slot)
    }

    #[inline]
    pub(crate) fn slot_is_match(&self, slot: usize) -> bool {
        self.search.is_match(slot)
    }

    /// Visible rows with rendering metadata, recomputed on every call.
    pub fn visible_rows(&self) -> Vec<VisibleNode> {
        flatten_visible(&self.index, |slot| self.expansion.is_expanded(slot))
    }

    /// Ids in visible order, recomputed on every call.
    pub fn visible_order(&self) -> Vec<&str> {
        self.visible_slots()
            .into_iter()
            .filter_map(|slot| self.index.id(slot))
            .collect()
    }

    fn visible_slots(&self) -> Vec<usize> {
        self.visible_rows().into_iter().map(|row| row.slot).collect()
    }

    pub fn stats(&self) -> TreeStats {
        TreeStats {
            total: self.index.len(),
            roots: self.index.roots().len(),
            expanded: self.expansion.len(),
            selected: self.selection.len(),
            search_matches: self.search.len(),
            max_depth: self.index.max_depth(),
            visible: self.visible_rows().len(),
        }
    }

    /// Currently focused id.
    pub fn focused(&self) -> Option<&str> {
        self.focus.and_then(|slot| self.index.id(slot))
    }

    pub(crate) const fn focused_slot(&self) -> Option<usize> {
        self.focus
    }

    /// Selected ids in tree order.
    pub fn selected_ids(&self) -> Vec<&str> {
        self.ids(&self.selection.slots())
    }

    /// Expanded ids in tree order.
    pub fn expanded_ids(&self) -> Vec<&str> {
        self.ids(&self.expansion.slots())
    }

    /// Matching ids of the current search in tree order.
    pub fn search_results(&self) -> Vec<&str> {
        self.ids(&self.search.slots())
    }

    pub fn search_query(&self) -> &str {
        self.search.query()
    }

    pub const fn selection_mode(&self) -> SelectionMode {
        self.selection.mode()
    }

    fn ids(&self, slots: &[usize]) -> Vec<&str> {
        slots.iter().filter_map(|&slot| self.index.id(slot)).collect()
    }

    fn slots_of(&self, ids: &[String]) -> Vec<usize> {
        ids.iter().filter_map(|id| self.index.slot(id)).collect()
    }

    fn id_of(&self, slot: usize) -> String {
        self.index.id(slot).unwrap_or_default().to_owned()
    }

    // ---- expansion -----------------------------------------------------------------------

    /// Expands a node; no-op for leaves, unknown ids, and already expanded nodes.
    pub fn expand(&mut self, id: &str) -> bool {
        self.index
            .slot(id)
            .is_some_and(|slot| self.expand_slot(slot))
    }

    pub fn collapse(&mut self, id: &str) -> bool {
        self.index
            .slot(id)
            .is_some_and(|slot| self.collapse_slot(slot))
    }

    /// Flips expansion; returns `false` for leaves and unknown ids.
    pub fn toggle(&mut self, id: &str) -> bool {
        self.index
            .slot(id)
            .is_some_and(|slot| self.toggle_slot(slot))
    }

    fn expand_slot(&mut self, slot: usize) -> bool {
        let changed = self.expansion.expand(&self.index, slot);
        if changed {
            let id = self.id_of(slot);
            self.notifications
                .emit(TreeNotification::NodeExpanded { id });
        }
        changed
    }

    fn collapse_slot(&mut self, slot: usize) -> bool {
        let changed = self.expansion.collapse(slot);
        if changed {
            let id = self.id_of(slot);
            self.notifications
                .emit(TreeNotification::NodeCollapsed { id });
        }
        changed
    }

    fn toggle_slot(&mut self, slot: usize) -> bool {
        let Some(expanded) = self.expansion.toggle(&self.index, slot) else {
            return false;
        };
        let id = self.id_of(slot);
        self.notifications.emit(if expanded {
            TreeNotification::NodeExpanded { id }
        } else {
            TreeNotification::NodeCollapsed { id }
        });
        true
    }

    pub fn expand_all(&mut self) {
        self.begin_batch();
        for slot in self.expansion.expand_all(&self.index) {
            let id = self.id_of(slot);
            self.notifications
                .emit(TreeNotification::NodeExpanded { id });
        }
        self.end_batch();
    }

    pub fn collapse_all(&mut self) {
        self.begin_batch();
        if !self.expansion.collapse_all().is_empty() {
            self.notifications.emit(TreeNotification::AllCollapsed);
        }
        self.end_batch();
    }

    /// Collapses everything, then expands every node with children shallower than `depth`.
    pub fn expand_to_depth(&mut self, depth: usize) {
        self.begin_batch();
        let diff = self.expansion.expand_to_depth(&self.index, depth);
        for slot in diff.collapsed {
            let id = self.id_of(slot);
            self.notifications
                .emit(TreeNotification::NodeCollapsed { id });
        }
        for slot in diff.expanded {
            let id = self.id_of(slot);
            self.notifications
                .emit(TreeNotification::NodeExpanded { id });
        }
        self.end_batch();
    }

    /// Expands every strict ancestor so the node becomes visible.
    pub fn expand_to(&mut self, id: &str) -> bool {
        let Some(slot) = self.index.slot(id) else {
            return false;
        };
        let opened = self.expansion.expand_ancestors(&self.index, slot);
        self.emit_expanded(&opened);
        true
    }

    /// Expands a node and its whole subtree.
    pub fn expand_recursive(&mut self, id: &str) -> bool {
        self.set_recursive(id, true)
    }

    /// Collapses a node and its whole subtree.
    pub fn collapse_recursive(&mut self, id: &str) -> bool {
        self.set_recursive(id, false)
    }

    fn set_recursive(&mut self, id: &str, expand: bool) -> bool {
        let Some(slot) = self.index.slot(id) else {
            return false;
        };
        self.set_recursive_slot(slot, expand)
    }

    fn set_recursive_slot(&mut self, slot: usize, expand: bool) -> bool {
        self.begin_batch();
        let changed = self.expansion.set_recursive(&self.index, slot, expand);
        if expand {
            self.emit_expanded(&changed);
        } else {
            for &slot in &changed {
                let id = self.id_of(slot);
                self.notifications
                    .emit(TreeNotification::NodeCollapsed { id });
            }
        }
        self.end_batch();
        !changed.is_empty()
    }

    fn emit_expanded(&mut self, slots: &[usize]) {
        for &slot in slots {
            let id = self.id_of(slot);
            self.notifications
                .emit(TreeNotification::NodeExpanded { id });
        }
    }

    // ---- selection -----------------------------------------------------------------------

    /// Selects a node. `extend` adds to the selection in multiple mode.
    pub fn select(&mut self, id: &str, extend: bool) -> bool {
        let Some(slot) = self.index.slot(id) else {
            return false;
        };
        let delta = self.selection.select(slot, extend);
        self.emit_selection(delta)
    }

    pub fn deselect(&mut self, id: &str) -> bool {
        let Some(slot) = self.index.slot(id) else {
            return false;
        };
        let changed = self.selection.deselect(slot);
        if changed {
            self.notifications.emit(TreeNotification::NodeDeselected {
                id: id.to_owned(),
            });
        }
        changed
    }

    /// Deselects a selected node or selects an unselected one.
    pub fn toggle_selection(&mut self, id: &str, extend: bool) -> bool {
        let Some(slot) = self.index.slot(id) else {
            return false;
        };
        let delta = self.selection.toggle(slot, extend);
        self.emit_selection(delta)
    }

    pub fn clear_selection(&mut self) -> bool {
        let cleared = !self.selection.clear().is_empty();
        if cleared {
            self.notifications.emit(TreeNotification::SelectionCleared);
        }
        cleared
    }

    /// Selects exactly the inclusive span between two nodes in visible order.
    pub fn range_select(&mut self, anchor_id: &str, target_id: &str) -> bool {
        let (Some(anchor), Some(target)) = (self.index.slot(anchor_id), self.index.slot(target_id))
        else {
            return false;
        };
        self.range_select_slots(anchor, target)
    }

    fn range_select_slots(&mut self, anchor: usize, target: usize) -> bool {
        let order = self.visible_slots();
        let delta = self.selection.select_range(&order, anchor, target);
        self.emit_selection(delta)
    }

    /// Selects every visible node (multiple mode only).
    pub fn select_all(&mut self) -> bool {
        let order = self.visible_slots();
        self.begin_batch();
        let delta = self.selection.select_all(&order);
        let changed = self.emit_selection(delta);
        self.end_batch();
        changed
    }

    /// Changes the selection mode, trimming the selection to fit.
    pub fn set_selection_mode(&mut self, mode: SelectionMode) {
        for slot in self.selection.set_mode(mode) {
            let id = self.id_of(slot);
            self.notifications
                .emit(TreeNotification::NodeDeselected { id });
        }
    }

    fn emit_selection(&mut self, delta: SelectionDelta) -> bool {
        let changed = !delta.is_empty();
        for slot in delta.deselected {
            let id = self.id_of(slot);
            self.notifications
                .emit(TreeNotification::NodeDeselected { id });
        }
        for slot in delta.selected {
            let id = self.id_of(slot);
            self.notifications
                .emit(TreeNotification::NodeSelected { id });
        }
        changed
    }

    // ---- search --------------------------------------------------------------------------

    /// Recomputes matches for `query` as given; an empty query behaves like [`Self::clear_search`].
    ///
    /// With `expand_results`, every strict ancestor of every match is expanded.
    pub fn search(&mut self, query: &str, options: SearchOptions) -> usize {
        if query.is_empty() {
            self.clear_search();
            return 0;
        }
        let expand_results = options.expand_results;
        let matches = self.search.run(&self.index, query, options);
        log::debug!("search `{query}`: {matches} matches");

        let batched = expand_results && matches > 0;
        if batched {
            self.begin_batch();
            for slot in self.search.slots() {
                let opened = self.expansion.expand_ancestors(&self.index, slot);
                self.emit_expanded(&opened);
            }
        }
        self.notifications.emit(TreeNotification::SearchPerformed {
            query: query.to_owned(),
            matches,
        });
        if batched {
            self.end_batch();
        }
        matches
    }

    /// Searches with the configured default options.
    pub fn search_default(&mut self, query: &str) -> usize {
        let options = self.config.search.clone();
        self.search(query, options)
    }

    /// Drops the query and matches; expansions made by the search are kept.
    pub fn clear_search(&mut self) -> bool {
        let cleared = self.search.clear();
        if cleared {
            self.notifications.emit(TreeNotification::SearchCleared);
        }
        cleared
    }

    // ---- focus & navigation --------------------------------------------------------------

    /// Focuses an existing node; unknown ids are ignored.
    pub fn focus(&mut self, id: &str) -> bool {
        let Some(slot) = self.index.slot(id) else {
            return false;
        };
        self.set_focus(Some(slot))
    }

    pub fn clear_focus(&mut self) -> bool {
        self.set_focus(None)
    }

    fn set_focus(&mut self, slot: Option<usize>) -> bool {
        if self.focus == slot {
            return false;
        }
        self.focus = slot;
        let id = slot.map(|slot| self.id_of(slot));
        self.notifications
            .emit(TreeNotification::FocusChanged { id });
        true
    }

    // Position of the focused node in `order`, or of its nearest visible ancestor.
    fn focus_position(&self, order: &[usize]) -> Option<usize> {
        let focus = self.focus?;
        self.index
            .path(focus)
            .iter()
            .rev()
            .find_map(|slot| order.iter().position(|candidate| candidate == slot))
    }

    /// Moves focus over the visible order. Returns `true` if focus or expansion changed.
    pub fn navigate(&mut self, direction: NavDirection) -> bool {
        let order = self.visible_slots();
        let (Some(&first), Some(&last)) = (order.first(), order.last()) else {
            return false;
        };
        let Some(pos) = self.focus_position(&order) else {
            let target = match direction {
                NavDirection::Up | NavDirection::End => last,
                _ => first,
            };
            return self.set_focus(Some(target));
        };
        let current = order[pos];
        log::trace!("navigate {direction:?} from slot {current}");

        match direction {
            NavDirection::Up => pos
                .checked_sub(1)
                .is_some_and(|prev| self.set_focus(Some(order[prev]))),
            NavDirection::Down => order
                .get(pos + 1)
                .is_some_and(|&next| self.set_focus(Some(next))),
            NavDirection::Home => self.set_focus(Some(first)),
            NavDirection::End => self.set_focus(Some(last)),
            NavDirection::Left => {
                if self.expansion.is_expanded(current) {
                    let collapsed = self.collapse_slot(current);
                    self.set_focus(Some(current)) || collapsed
                } else if let Some(parent) = self.index.parent(current) {
                    self.set_focus(Some(parent))
                } else {
                    self.set_focus(Some(current))
                }
            }
            NavDirection::Right => {
                if !self.index.has_children(current) {
                    self.set_focus(Some(current))
                } else if self.expansion.is_expanded(current) {
                    let first_child = self.index.children(current)[0];
                    self.set_focus(Some(first_child))
                } else {
                    let expanded = self.expand_slot(current);
                    self.set_focus(Some(current)) || expanded
                }
            }
        }
    }

    /// Moves focus and updates the selection to follow it.
    ///
    /// With `extend` in multiple mode, the selection becomes the span from the anchor to the
    /// new focus; otherwise the new focus alone is selected.
    pub fn navigate_selecting(&mut self, direction: NavDirection, extend: bool) -> bool {
        let moved = self.navigate(direction);
        let Some(focus) = self.focus else {
            return moved;
        };
        let selected = if extend && self.selection.mode() == SelectionMode::Multiple {
            let anchor = self.selection.anchor().unwrap_or(focus);
            self.range_select_slots(anchor, focus)
        } else {
            let delta = self.selection.select(focus, false);
            self.emit_selection(delta)
        };
        moved || selected
    }

    /// Toggles expansion (for nodes with children) and selects the node if not yet selected.
    pub fn activate(&mut self, id: &str) -> bool {
        let Some(slot) = self.index.slot(id) else {
            return false;
        };
        self.activate_slot(slot)
    }

    fn activate_slot(&mut self, slot: usize) -> bool {
        let toggled = self.index.has_children(slot) && self.toggle_slot(slot);
        let selected = if self.selection.is_selected(slot) {
            false
        } else {
            let delta = self.selection.select(slot, false);
            self.emit_selection(delta)
        };
        toggled || selected
    }

    // ---- inline edit ---------------------------------------------------------------------

    /// Starts editing a node, first finishing (not cancelling) any active session.
    pub fn start_edit(&mut self, id: &str) -> bool {
        let Some(slot) = self.index.slot(id) else {
            return false;
        };
        if let Some(active) = self.edit.take() {
            let active_slot = active.slot();
            self.apply_edit(active_slot, active.finish(None));
        }
        let label = self
            .index
            .node(slot)
            .map(|node| node.label.clone())
            .unwrap_or_default();
        self.edit = Some(EditSession::start(
            slot,
            id,
            &label,
            self.config.prefix_rule,
        ));
        true
    }

    pub const fn edit_session(&self) -> Option<&EditSession> {
        self.edit.as_ref()
    }

    /// Replaces the draft text of the active session.
    pub fn set_edit_draft(&mut self, text: impl Into<String>) -> bool {
        match self.edit.as_mut() {
            Some(session) => {
                session.set_draft(text);
                true
            }
            None => false,
        }
    }

    /// Commits the active session with `value` (or its draft).
    pub fn finish_edit(&mut self, value: Option<&str>) -> Option<EditOutcome> {
        let session = self.edit.take()?;
        let slot = session.slot();
        Some(self.apply_edit(slot, session.finish(value)))
    }

    /// Abandons the active session; the label is left untouched.
    pub fn cancel_edit(&mut self) -> Option<EditOutcome> {
        self.edit.take().map(EditSession::cancel)
    }

    fn apply_edit(&mut self, slot: usize, outcome: EditOutcome) -> EditOutcome {
        if outcome.changed {
            self.index.set_label(slot, outcome.label.clone());
            self.notifications.emit(TreeNotification::EditCommitted {
                id: outcome.id.clone(),
                previous: outcome.original.clone(),
                label: outcome.label.clone(),
            });
        }
        outcome
    }

    // ---- drag & drop ---------------------------------------------------------------------

    /// Returns `true` if `source` may be reparented under `target`.
    pub fn validate_move(&self, source_id: &str, target_id: &str) -> bool {
        match (self.index.slot(source_id), self.index.slot(target_id)) {
            (Some(source), Some(target)) => drag::validate_move(&self.index, source, target),
            _ => false,
        }
    }

    /// Starts a drag gesture, replacing any previous one.
    pub fn begin_drag(&mut self, source_id: &str) -> bool {
        let Some(source) = self.index.slot(source_id) else {
            return false;
        };
        self.drag = Some(DragContext::new(source));
        true
    }

    /// Updates the hovered target; returns whether dropping there would be accepted.
    pub fn drag_over(&mut self, target_id: Option<&str>) -> bool {
        let target = target_id.and_then(|id| self.index.slot(id));
        match self.drag.as_mut() {
            Some(drag) => drag.hover(&self.index, target),
            None => false,
        }
    }

    pub fn drag_source(&self) -> Option<&str> {
        self.drag
            .as_ref()
            .and_then(|drag| self.index.id(drag.source))
    }

    pub fn drag_target(&self) -> Option<&str> {
        self.drag
            .as_ref()
            .and_then(|drag| drag.target)
            .and_then(|slot| self.index.id(slot))
    }

    /// Ends the gesture; yields a move request if the last hovered target was valid.
    pub fn drop_drag(&mut self) -> Option<MoveRequest> {
        let drag = self.drag.take()?;
        let target = drag.target.filter(|_| drag.is_valid())?;
        Some(MoveRequest {
            source: self.id_of(drag.source),
            target: self.id_of(target),
        })
    }

    pub fn cancel_drag(&mut self) -> bool {
        self.drag.take().is_some()
    }

    // ---- snapshot ------------------------------------------------------------------------

    /// Captures a snapshot of the current state for persistence or restore.
    pub fn export_state(&self) -> TreeSnapshot {
        let owned =
            |ids: Vec<&str>| -> Vec<String> { ids.into_iter().map(str::to_owned).collect() };
        TreeSnapshot {
            expanded_ids: owned(self.expanded_ids()),
            selected_ids: owned(self.selected_ids()),
            focus_id: self.focused().map(str::to_owned),
            search_query: self.search.query().to_owned(),
            search_result_ids: owned(self.search_results()),
        }
    }

    /// Restores a snapshot against the current index; unknown ids are dropped.
    pub fn import_state(&mut self, snapshot: &TreeSnapshot) {
        let expanded = self.slots_of(&snapshot.expanded_ids);
        let selected = self.slots_of(&snapshot.selected_ids);
        let matches = self.slots_of(&snapshot.search_result_ids);
        let focus = snapshot
            .focus_id
            .as_deref()
            .and_then(|id| self.index.slot(id));

        self.begin_batch();
        self.expansion.clear();
        for slot in expanded {
            self.expansion.expand(&self.index, slot);
        }
        self.selection.restore(selected);
        self.search.restore(snapshot.search_query.clone(), matches);
        self.set_focus(focus);
        self.end_batch();
    }
}

impl ObservableState for TreeController {
    fn notifications(&self) -> &NotificationQueue {
        &self.notifications
    }

    fn notifications_mut(&mut self) -> &mut NotificationQueue {
        &mut self.notifications
    }
}

impl<C> CommandDispatcher<C> for TreeController {
    fn dispatch(&mut self, command: TreeCommand<C>) -> TreeEvent<C> {
        log::trace!("dispatch {}", command.name());
        if matches!(&command, TreeCommand::Custom(_)) {
            return TreeEvent::Command(command);
        }

        let focus = self.focus;
        let handled = match command {
            TreeCommand::Navigate(direction) => self.navigate(direction),
            TreeCommand::NavigateSelecting { direction, extend } => {
                self.navigate_selecting(direction, extend)
            }
            TreeCommand::Activate => focus.is_some_and(|slot| self.activate_slot(slot)),
            TreeCommand::ToggleExpand => focus.is_some_and(|slot| self.toggle_slot(slot)),
            TreeCommand::ToggleRecursive => focus.is_some_and(|slot| {
                let expand = !self.expansion.is_expanded(slot);
                self.set_recursive_slot(slot, expand)
            }),
            TreeCommand::ToggleSelection => focus.is_some_and(|slot| {
                let delta = self.selection.toggle(slot, true);
                self.emit_selection(delta)
            }),
            TreeCommand::ExpandAll => {
                self.expand_all();
                true
            }
            TreeCommand::CollapseAll => {
                self.collapse_all();
                true
            }
            TreeCommand::SelectAll => self.select_all(),
            TreeCommand::ClearSelection => self.clear_selection(),
            TreeCommand::StartEdit => focus.is_some_and(|slot| {
                let id = self.id_of(slot);
                self.start_edit(&id)
            }),
            TreeCommand::FinishEdit => self.finish_edit(None).is_some(),
            TreeCommand::CancelEdit => self.cancel_edit().is_some(),
            TreeCommand::ClearSearch => self.clear_search(),
            TreeCommand::Custom(_) => false,
        };

        if handled {
            TreeEvent::Handled
        } else {
            TreeEvent::Unhandled
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A [B [D], C]
    fn sample() -> Vec<NodeRecord> {
        vec![
            NodeRecord::with_id("A", "A")
                .child(NodeRecord::with_id("B", "B").child(NodeRecord::with_id("D", "D")))
                .child(NodeRecord::with_id("C", "C")),
        ]
    }

    fn controller(mode: SelectionMode) -> TreeController {
        TreeController::from_records(&sample(), TreeConfig::new().selection_mode(mode))
    }

    #[test]
    fn builds_visible_order_with_expansion() {
        let mut tree = controller(SelectionMode::Single);
        assert_eq!(tree.visible_order(), ["A"]);

        tree.expand("A");
        tree.expand("B");
        assert_eq!(tree.visible_order(), ["A", "B", "D", "C"]);

        let levels: Vec<_> = tree.visible_rows().iter().map(VisibleNode::level).collect();
        assert_eq!(levels, vec![0, 1, 2, 1]);

        tree.collapse("B");
        assert_eq!(tree.visible_order(), ["A", "B", "C"]);
    }

    #[test]
    fn tail_stack_marks_last_children() {
        let mut tree = controller(SelectionMode::Single);
        tree.expand_all();

        let tails: Vec<Vec<bool>> = tree
            .visible_rows()
            .iter()
            .map(|row| row.is_tail_stack().to_vec())
            .collect();
        assert_eq!(
            tails,
            vec![vec![], vec![false], vec![false, true], vec![true]]
        );
    }

    #[test]
    fn range_select_follows_visible_order() {
        let mut tree = controller(SelectionMode::Multiple);
        tree.expand("A");
        tree.expand("B");

        tree.select("B", false);
        tree.range_select("B", "D");
        assert_eq!(tree.selected_ids(), ["B", "D"]);

        tree.range_select("C", "A");
        assert_eq!(tree.selected_ids(), ["A", "B", "D", "C"]);
    }

    #[test]
    fn range_select_ignores_hidden_nodes() {
        let mut tree = controller(SelectionMode::Multiple);
        tree.expand("A");

        assert!(!tree.range_select("A", "D"));
        assert!(tree.selected_ids().is_empty());
    }

    #[test]
    fn single_mode_replaces_selection() {
        let mut tree = controller(SelectionMode::Single);
        tree.select("A", false);
        tree.select("C", true);

        assert_eq!(tree.selected_ids(), ["C"]);
    }

    #[test]
    fn unknown_ids_are_noops() {
        let mut tree = controller(SelectionMode::Multiple);

        assert!(!tree.expand("nope"));
        assert!(!tree.select("nope", false));
        assert!(!tree.focus("nope"));
        assert!(!tree.activate("nope"));
        assert!(!tree.start_edit("nope"));
        assert!(!tree.validate_move("nope", "A"));
        assert!(tree.children("nope").is_empty());
        assert!(tree.path("nope").is_empty());
        assert!(tree.drain_notifications().is_empty());
    }

    #[test]
    fn search_expands_strict_ancestors() {
        let mut tree = controller(SelectionMode::Single);

        assert_eq!(tree.search("d", SearchOptions::default()), 1);
        assert!(tree.is_search_result("D"));
        assert!(tree.is_expanded("A"));
        assert!(tree.is_expanded("B"));
        assert!(!tree.is_expanded("D"));

        assert!(tree.clear_search());
        assert!(tree.search_results().is_empty());
        assert!(tree.is_expanded("B"));
    }

    #[test]
    fn padded_query_is_stored_and_matched_as_given() {
        let records = vec![
            NodeRecord::with_id("a", "alpha"),
            NodeRecord::with_id("b", "beta gamma"),
            NodeRecord::with_id("c", "Alpha Beta"),
        ];
        let mut tree = TreeController::from_records(&records, TreeConfig::new());

        assert_eq!(tree.search("a ", SearchOptions::default()), 2);
        assert_eq!(tree.search_query(), "a ");
        assert_eq!(tree.search_results(), ["b", "c"]);
        assert!(!tree.is_search_result("a"));

        assert_eq!(tree.search(" ", SearchOptions::default()), 2);
        assert_eq!(tree.search_results(), ["b", "c"]);

        let whole_word = SearchOptions::default().whole_word(true);
        assert_eq!(tree.search("alpha beta", whole_word), 1);
        assert_eq!(tree.search_results(), ["c"]);

        assert_eq!(tree.search("", SearchOptions::default()), 0);
        assert!(tree.search_query().is_empty());
    }

    #[test]
    fn search_without_expansion_leaves_tree_closed() {
        let mut tree = controller(SelectionMode::Single);

        tree.search("d", SearchOptions::default().expand_results(false));
        assert!(tree.expanded_ids().is_empty());
        assert_eq!(
            tree.drain_notifications(),
            vec![TreeNotification::SearchPerformed {
                query: "d".into(),
                matches: 1,
            }]
        );
    }

    #[test]
    fn navigation_moves_over_visible_order() {
        let mut tree = controller(SelectionMode::Single);
        tree.expand_all();

        assert!(tree.navigate(NavDirection::Down));
        assert_eq!(tree.focused(), Some("A"));
        assert!(!tree.navigate(NavDirection::Up));

        tree.navigate(NavDirection::End);
        assert_eq!(tree.focused(), Some("C"));
        assert!(!tree.navigate(NavDirection::Down));

        tree.navigate(NavDirection::Up);
        assert_eq!(tree.focused(), Some("D"));
        tree.navigate(NavDirection::Home);
        assert_eq!(tree.focused(), Some("A"));
    }

    #[test]
    fn left_and_right_collapse_expand_and_descend() {
        let mut tree = controller(SelectionMode::Single);
        tree.focus("A");

        tree.navigate(NavDirection::Right);
        assert!(tree.is_expanded("A"));
        assert_eq!(tree.focused(), Some("A"));

        tree.navigate(NavDirection::Right);
        assert_eq!(tree.focused(), Some("B"));

        tree.navigate(NavDirection::Left);
        assert_eq!(tree.focused(), Some("A"));

        tree.navigate(NavDirection::Left);
        assert!(!tree.is_expanded("A"));
        assert_eq!(tree.focused(), Some("A"));
    }

    #[test]
    fn hidden_focus_navigates_from_visible_ancestor() {
        let mut tree = controller(SelectionMode::Single);
        tree.expand_all();
        tree.focus("D");
        tree.collapse("A");

        tree.navigate(NavDirection::Right);
        assert_eq!(tree.focused(), Some("A"));
        assert!(tree.is_expanded("A"));

        tree.navigate(NavDirection::Right);
        assert_eq!(tree.focused(), Some("B"));
    }

    #[test]
    fn shift_navigation_extends_from_anchor() {
        let mut tree = controller(SelectionMode::Multiple);
        tree.expand_all();
        tree.focus("B");
        tree.select("B", false);

        tree.navigate_selecting(NavDirection::Down, true);
        tree.navigate_selecting(NavDirection::Down, true);
        assert_eq!(tree.selected_ids(), ["B", "D", "C"]);

        tree.navigate_selecting(NavDirection::Up, false);
        assert_eq!(tree.selected_ids(), ["D"]);
    }

    #[test]
    fn activate_toggles_and_selects() {
        let mut tree = controller(SelectionMode::Single);
        tree.drain_notifications();

        assert!(tree.activate("A"));
        assert!(tree.is_expanded("A"));
        assert!(tree.is_selected("A"));
        assert_eq!(
            tree.drain_notifications(),
            vec![
                TreeNotification::NodeExpanded { id: "A".into() },
                TreeNotification::NodeSelected { id: "A".into() },
            ]
        );

        assert!(tree.activate("A"));
        assert!(!tree.is_expanded("A"));
        assert!(tree.is_selected("A"));
    }

    #[test]
    fn bulk_operations_notify_once() {
        let mut tree = controller(SelectionMode::Single);
        tree.expand_all();
        tree.collapse_all();
        tree.expand_to_depth(1);

        let notifications = tree.drain_notifications();
        assert_eq!(notifications.len(), 3);
        assert!(
            notifications
                .iter()
                .all(|n| matches!(n, TreeNotification::BatchChanged { .. }))
        );
        assert_eq!(
            notifications[1],
            TreeNotification::BatchChanged {
                notifications: vec![TreeNotification::AllCollapsed],
            }
        );
        assert_eq!(tree.expanded_ids(), ["A"]);
    }

    #[test]
    fn explicit_batches_nest() {
        let mut tree = controller(SelectionMode::Multiple);
        tree.begin_batch();
        tree.expand("A");
        tree.batch(|tree| tree.select("C", true));
        assert!(tree.notifications().pending().is_empty());
        tree.end_batch();

        assert_eq!(
            tree.drain_notifications(),
            vec![TreeNotification::BatchChanged {
                notifications: vec![
                    TreeNotification::NodeExpanded { id: "A".into() },
                    TreeNotification::NodeSelected { id: "C".into() },
                ],
            }]
        );
    }

    #[test]
    fn edit_session_commits_with_prefix() {
        let records = vec![NodeRecord::with_id("docs", "📁 Documents")];
        let mut tree = TreeController::from_records(&records, TreeConfig::new());

        assert!(tree.start_edit("docs"));
        assert_eq!(tree.edit_session().map(EditSession::draft), Some("Documents"));

        let outcome = tree.finish_edit(Some("My Docs")).unwrap();
        assert!(outcome.changed);
        assert_eq!(tree.get_node("docs").unwrap().label, "📁 My Docs");
        assert_eq!(
            tree.drain_notifications(),
            vec![TreeNotification::EditCommitted {
                id: "docs".into(),
                previous: "📁 Documents".into(),
                label: "📁 My Docs".into(),
            }]
        );
    }

    #[test]
    fn untouched_edit_keeps_tab_separated_label() {
        let records = vec![NodeRecord::with_id("docs", "📁\tDocs")];
        let mut tree = TreeController::from_records(&records, TreeConfig::new());

        assert!(tree.start_edit("docs"));
        let outcome = tree.finish_edit(None).unwrap();

        assert!(!outcome.changed);
        assert_eq!(tree.get_node("docs").unwrap().label, "📁\tDocs");
        assert!(tree.drain_notifications().is_empty());
    }

    #[test]
    fn starting_a_new_edit_finishes_the_previous_one() {
        let mut tree = controller(SelectionMode::Single);
        tree.start_edit("B");
        tree.set_edit_draft("Beta");

        tree.start_edit("C");

        assert_eq!(tree.get_node("B").unwrap().label, "Beta");
        assert_eq!(tree.edit_session().map(EditSession::id), Some("C"));
    }

    #[test]
    fn cancel_never_commits() {
        let mut tree = controller(SelectionMode::Single);
        tree.start_edit("B");
        tree.set_edit_draft("Beta");

        let outcome = tree.cancel_edit().unwrap();

        assert!(outcome.cancelled);
        assert!(!outcome.changed);
        assert_eq!(tree.get_node("B").unwrap().label, "B");
        assert!(tree.drain_notifications().is_empty());
        assert!(tree.edit_session().is_none());
    }

    #[test]
    fn drag_gesture_yields_move_request_only_when_valid() {
        let mut tree = controller(SelectionMode::Single);

        assert!(tree.begin_drag("A"));
        assert!(!tree.drag_over(Some("D")));
        assert_eq!(tree.drop_drag(), None);

        tree.begin_drag("D");
        assert!(tree.drag_over(Some("C")));
        assert_eq!(tree.drag_target(), Some("C"));
        assert_eq!(
            tree.drop_drag(),
            Some(MoveRequest {
                source: "D".into(),
                target: "C".into(),
            })
        );
        assert!(!tree.cancel_drag());
    }

    #[test]
    fn snapshot_round_trip() {
        let mut tree = controller(SelectionMode::Multiple);
        tree.search("d", SearchOptions::default());
        tree.select("D", false);
        tree.select("A", true);
        tree.focus("B");

        let snapshot = tree.export_state();
        let mut other = controller(SelectionMode::Multiple);
        other.import_state(&snapshot);

        assert_eq!(other.export_state(), snapshot);
        assert_eq!(snapshot.expanded_ids, ["A", "B"]);
        assert_eq!(snapshot.selected_ids, ["A", "D"]);
        assert_eq!(snapshot.search_result_ids, ["D"]);
        assert!(other.is_search_result("D"));
    }

    #[test]
    fn import_drops_unknown_ids() {
        let mut tree = controller(SelectionMode::Multiple);
        tree.import_state(&TreeSnapshot {
            expanded_ids: vec!["A".into(), "ghost".into(), "D".into()],
            selected_ids: vec!["ghost".into(), "C".into()],
            focus_id: Some("ghost".into()),
            search_query: String::new(),
            search_result_ids: vec!["ghost".into()],
        });

        assert_eq!(tree.expanded_ids(), ["A"]);
        assert_eq!(tree.selected_ids(), ["C"]);
        assert_eq!(tree.focused(), None);
        assert!(tree.search_results().is_empty());
    }

    #[test]
    fn reload_resets_state_and_revalidates_focus() {
        let mut tree = controller(SelectionMode::Multiple);
        tree.expand_all();
        tree.select("B", false);
        tree.search("c", SearchOptions::default());
        tree.focus("C");
        tree.start_edit("B");
        tree.drain_notifications();

        tree.set_tree_data(&sample());
        assert_eq!(tree.focused(), Some("C"));
        assert!(tree.expanded_ids().is_empty());
        assert!(tree.selected_ids().is_empty());
        assert!(tree.search_results().is_empty());
        assert!(tree.edit_session().is_none());

        tree.set_tree_data(&[NodeRecord::with_id("Z", "Z")]);
        assert_eq!(tree.focused(), None);
        assert_eq!(
            tree.drain_notifications(),
            vec![
                TreeNotification::DataReplaced {
                    total: 4,
                    diagnostics: 0,
                },
                TreeNotification::DataReplaced {
                    total: 1,
                    diagnostics: 0,
                },
                TreeNotification::FocusChanged { id: None },
            ]
        );
    }

    #[test]
    fn stats_count_everything() {
        let mut tree = controller(SelectionMode::Multiple);
        tree.expand("A");
        tree.select("C", false);
        tree.search("b", SearchOptions::default().expand_results(false));

        assert_eq!(
            tree.stats(),
            TreeStats {
                total: 4,
                roots: 1,
                expanded: 1,
                selected: 1,
                search_matches: 1,
                max_depth: 2,
                visible: 3,
            }
        );
    }

    #[test]
    fn dispatch_routes_commands() {
        let mut tree = controller(SelectionMode::Multiple);

        assert_eq!(
            tree.dispatch(TreeCommand::<()>::Navigate(NavDirection::Home)),
            TreeEvent::Handled
        );
        assert_eq!(
            tree.dispatch(TreeCommand::<()>::Activate),
            TreeEvent::Handled
        );
        assert!(tree.is_expanded("A"));
        assert_eq!(
            tree.dispatch(TreeCommand::Custom(7_u8)),
            TreeEvent::Command(TreeCommand::Custom(7))
        );
        assert_eq!(
            tree.dispatch(TreeCommand::<()>::CancelEdit),
            TreeEvent::Unhandled
        );
    }

    #[test]
    fn loads_json_with_diagnostics() {
        let mut tree = TreeController::new();
        tree.set_tree_json(&serde_json::json!([
            { "id": "a", "label": "A", "children": [ { "id": "a" }, 3 ] },
        ]))
        .unwrap();

        assert_eq!(tree.stats().total, 1);
        assert_eq!(tree.diagnostics().len(), 2);
        assert!(tree.set_tree_json(&serde_json::json!("nope")).is_err());
    }
}
