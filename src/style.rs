use ratatui::style::{Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::Borders;

/// Scroll policy applied when the focused row changes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TreeScrollPolicy {
    #[default]
    KeepInView,
    CenterOnSelect,
}

/// Visual settings of [`crate::TreeView`].
#[derive(Clone, Debug)]
pub struct TreeViewStyle<'a> {
    pub title: Option<Line<'a>>,
    pub block_style: Style,
    pub border_style: Style,
    /// Focused row.
    pub focus_style: Style,
    pub selected_style: Style,
    pub match_style: Style,
    /// Draft text of the row being edited.
    pub edit_style: Style,
    pub line_style: Style,
    pub highlight_symbol: &'a str,
    pub borders: Borders,
    pub draw_lines: bool,
    pub virtualize_rows: bool,
    pub scroll_policy: TreeScrollPolicy,
}

impl Default for TreeViewStyle<'_> {
    fn default() -> Self {
        Self {
            title: None,
            block_style: Style::default(),
            border_style: Style::default(),
            focus_style: Style::default().add_modifier(Modifier::REVERSED),
            selected_style: Style::default().add_modifier(Modifier::BOLD),
            match_style: Style::default().add_modifier(Modifier::UNDERLINED),
            edit_style: Style::default().add_modifier(Modifier::ITALIC),
            line_style: Style::default(),
            highlight_symbol: ">> ",
            borders: Borders::ALL,
            draw_lines: true,
            virtualize_rows: false,
            scroll_policy: TreeScrollPolicy::KeepInView,
        }
    }
}
