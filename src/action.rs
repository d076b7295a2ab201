/// Direction for focus movement over the visible order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavDirection {
    /// Previous visible row.
    Up,
    /// Next visible row.
    Down,
    /// Collapse the focused node, or move to its parent.
    Left,
    /// Expand the focused node, or move to its first child.
    Right,
    /// First visible row.
    Home,
    /// Last visible row.
    End,
}

/// Commands that a user or application can dispatch against the focused node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TreeCommand<Custom = ()> {
    /// Move focus without touching the selection.
    Navigate(NavDirection),
    /// Move focus and select the new row; `extend` range-selects from the anchor.
    NavigateSelecting { direction: NavDirection, extend: bool },
    /// Toggle expansion and select the focused node.
    Activate,
    /// Toggle expansion of the focused node only.
    ToggleExpand,
    /// Toggle expansion of the focused subtree.
    ToggleRecursive,
    /// Toggle selection of the focused node, keeping other members.
    ToggleSelection,
    ExpandAll,
    CollapseAll,
    /// Select every visible row (multiple mode).
    SelectAll,
    ClearSelection,
    /// Begin an inline edit of the focused node.
    StartEdit,
    /// Commit the active edit with its current draft.
    FinishEdit,
    CancelEdit,
    ClearSearch,
    /// Custom command forwarded to the caller without internal handling.
    Custom(Custom),
}

impl<Custom> TreeCommand<Custom> {
    /// Stable name of the command variant, for logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Navigate(_) => "navigate",
            Self::NavigateSelecting { .. } => "navigate-selecting",
            Self::Activate => "activate",
            Self::ToggleExpand => "toggle-expand",
            Self::ToggleRecursive => "toggle-recursive",
            Self::ToggleSelection => "toggle-selection",
            Self::ExpandAll => "expand-all",
            Self::CollapseAll => "collapse-all",
            Self::SelectAll => "select-all",
            Self::ClearSelection => "clear-selection",
            Self::StartEdit => "start-edit",
            Self::FinishEdit => "finish-edit",
            Self::CancelEdit => "cancel-edit",
            Self::ClearSearch => "clear-search",
            Self::Custom(_) => "custom",
        }
    }
}

/// Result of dispatching a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TreeEvent<Custom = ()> {
    /// The command was handled internally and state was updated.
    Handled,
    /// The command was ignored (e.g., nothing focused / nothing to do).
    Unhandled,
    /// The command is forwarded to the caller for handling.
    Command(TreeCommand<Custom>),
}

/// Executes [`TreeCommand`]s against some state.
pub trait CommandDispatcher<Custom = ()> {
    fn dispatch(&mut self, command: TreeCommand<Custom>) -> TreeEvent<Custom>;
}
