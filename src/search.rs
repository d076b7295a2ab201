use rustc_hash::FxHashSet;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::index::TreeIndex;
use crate::model::{LABEL_FIELD, Node};

/// Fields tested when a search does not name its own.
pub const DEFAULT_SEARCH_FIELDS: [&str; 3] = [LABEL_FIELD, "name", "title"];

/// Match options for [`SearchState::run`].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchOptions {
    /// Label-like fields to test.
    pub fields: Vec<String>,
    /// When `false`, both sides are lowercased before comparing.
    pub case_sensitive: bool,
    /// When `true`, the query's words must appear as a contiguous run of the text's words.
    pub whole_word: bool,
    /// When `true`, every strict ancestor of a match is expanded.
    pub expand_results: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            fields: DEFAULT_SEARCH_FIELDS.iter().map(|&f| f.to_owned()).collect(),
            case_sensitive: false,
            whole_word: false,
            expand_results: true,
        }
    }
}

impl SearchOptions {
    #[must_use]
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub const fn case_sensitive(mut self, value: bool) -> Self {
        self.case_sensitive = value;
        self
    }

    #[must_use]
    pub const fn whole_word(mut self, value: bool) -> Self {
        self.whole_word = value;
        self
    }

    #[must_use]
    pub const fn expand_results(mut self, value: bool) -> Self {
        self.expand_results = value;
        self
    }

    /// Tests a node against an already normalized query and its words.
    fn is_match(&self, node: &Node, needle: &str, words: &[&str]) -> bool {
        self.fields
            .iter()
            .filter_map(|field| node.field(field))
            .any(|text| {
                let text = if self.case_sensitive {
                    text.to_owned()
                } else {
                    text.to_lowercase()
                };
                if self.whole_word {
                    if words.is_empty() {
                        return false;
                    }
                    let tokens: Vec<&str> = text.split_whitespace().collect();
                    tokens.windows(words.len()).any(|run| run == words)
                } else {
                    text.contains(needle)
                }
            })
    }
}

/// Current query and its match set.
#[derive(Clone, Debug, Default)]
pub struct SearchState {
    query: String,
    options: SearchOptions,
    matches: FxHashSet<usize>,
}

impl SearchState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recomputes the match set from scratch; returns the match count.
    ///
    /// The query is matched as given; an empty query leaves the state cleared.
    pub fn run(&mut self, index: &TreeIndex, query: &str, options: SearchOptions) -> usize {
        self.matches.clear();
        if query.is_empty() {
            self.query.clear();
            self.options = options;
            return 0;
        }
        let needle = if options.case_sensitive {
            query.to_owned()
        } else {
            query.to_lowercase()
        };
        let words: Vec<&str> = needle.split_whitespace().collect();
        self.matches.extend(
            index
                .nodes()
                .filter(|(_, node)| options.is_match(node, &needle, &words))
                .map(|(slot, _)| slot),
        );
        self.query = query.to_owned();
        self.options = options;
        self.matches.len()
    }

    /// Empties query and matches; returns `true` if a search was active.
    pub fn clear(&mut self) -> bool {
        let active = !self.query.is_empty() || !self.matches.is_empty();
        self.query.clear();
        self.matches.clear();
        active
    }

    /// Restores a query and match set without re-running it.
    pub fn restore(&mut self, query: String, slots: impl IntoIterator<Item = usize>) {
        self.query = query;
        self.matches.clear();
        self.matches.extend(slots);
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub const fn options(&self) -> &SearchOptions {
        &self.options
    }

    #[inline]
    pub fn is_match(&self, slot: usize) -> bool {
        self.matches.contains(&slot)
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Matching slots in tree order.
    pub fn slots(&self) -> Vec<usize> {
        let mut slots: Vec<_> = self.matches.iter().copied().collect();
        slots.sort_unstable();
        slots
    }
}
