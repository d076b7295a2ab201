use crate::edit::PrefixRule;
use crate::search::SearchOptions;
use crate::selection::SelectionMode;

/// Construction-time settings for a [`crate::TreeController`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeConfig {
    /// Initial selection mode.
    pub selection_mode: SelectionMode,
    /// Options used by [`crate::TreeController::search_default`].
    pub search: SearchOptions,
    /// Label prefix detection for inline edits and rendering.
    pub prefix_rule: PrefixRule,
}

impl TreeConfig {
    /// Creates the default configuration: single selection, default search, prefix split on.
    pub fn new() -> Self {
        Self {
            selection_mode: SelectionMode::Single,
            search: SearchOptions::default(),
            prefix_rule: PrefixRule::new(),
        }
    }

    #[must_use]
    pub const fn selection_mode(mut self, mode: SelectionMode) -> Self {
        self.selection_mode = mode;
        self
    }

    #[must_use]
    pub fn search(mut self, options: SearchOptions) -> Self {
        self.search = options;
        self
    }

    #[must_use]
    pub const fn prefix_rule(mut self, rule: PrefixRule) -> Self {
        self.prefix_rule = rule;
        self
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self::new()
    }
}
