use ratatui::style::Style;
use ratatui::text::{Line, Span};

use crate::context::TreeRowContext;
use crate::edit::LabelParts;

/// Guide, expander and cursor glyphs used by [`tree_label_line`].
#[derive(Clone, Copy, Debug)]
pub struct TreeGlyphs<'a> {
    pub indent: &'a str,
    pub branch_last: &'a str,
    pub branch: &'a str,
    pub vert: &'a str,
    pub empty: &'a str,
    pub leaf: &'a str,
    pub expanded: &'a str,
    pub collapsed: &'a str,
    pub cursor: &'a str,
}

impl TreeGlyphs<'static> {
    pub const fn unicode() -> Self {
        Self {
            indent: "   ",
            branch_last: "└──",
            branch: "├──",
            vert: "│  ",
            empty: "   ",
            leaf: "•",
            expanded: "▼",
            collapsed: "▶",
            cursor: "▏",
        }
    }

    pub const fn ascii() -> Self {
        Self {
            indent: "   ",
            branch_last: "`--",
            branch: "|--",
            vert: "|  ",
            empty: "   ",
            leaf: "*",
            expanded: "v",
            collapsed: ">",
            cursor: "_",
        }
    }
}

impl Default for TreeGlyphs<'static> {
    fn default() -> Self {
        Self::unicode()
    }
}

const fn expander<'a>(ctx: &TreeRowContext<'_>, glyphs: &TreeGlyphs<'a>) -> &'a str {
    if ctx.has_children {
        if ctx.is_expanded {
            glyphs.expanded
        } else {
            glyphs.collapsed
        }
    } else if ctx.level == 0 {
        ""
    } else {
        glyphs.leaf
    }
}

/// Builds a row label: guides, expander, optional prefix, then the (possibly draft) text.
///
/// The prefix is kept out of `text_style` so an edited row shows its icon unchanged.
pub fn tree_label_line<'a>(
    ctx: &TreeRowContext<'_>,
    parts: LabelParts<'a>,
    text_style: Style,
    glyphs: &TreeGlyphs<'a>,
) -> Line<'a> {
    let mut spans = Vec::with_capacity(ctx.is_tail_stack.len() + 6);

    if ctx.draw_lines && ctx.level > 0 {
        let last = ctx.is_tail_stack.len().saturating_sub(1);
        for (depth, &is_tail) in ctx.is_tail_stack.iter().enumerate() {
            let part = match (depth == last, is_tail) {
                (true, true) => glyphs.branch_last,
                (true, false) => glyphs.branch,
                (false, true) => glyphs.indent,
                (false, false) => glyphs.vert,
            };
            spans.push(Span::styled(part, ctx.line_style));
        }
    } else {
        spans.extend((0..ctx.level).map(|_| Span::raw(glyphs.empty)));
    }

    let expander = expander(ctx, glyphs);
    if !expander.is_empty() {
        spans.push(Span::raw(expander));
        spans.push(Span::raw(" "));
    }
    if let Some(prefix) = parts.prefix.filter(|prefix| !prefix.is_empty()) {
        spans.push(Span::raw(prefix));
        spans.push(Span::raw(" "));
    }
    spans.push(Span::styled(parts.text, text_style));
    if ctx.is_editing {
        spans.push(Span::styled(glyphs.cursor, text_style));
    }
    Line::from(spans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::PrefixRule;

    fn ctx(tails: &[bool]) -> TreeRowContext<'_> {
        TreeRowContext {
            level: u16::try_from(tails.len()).unwrap(),
            is_tail_stack: tails,
            is_expanded: false,
            has_children: false,
            is_selected: false,
            is_match: false,
            is_focused: false,
            is_editing: false,
            draw_lines: true,
            line_style: Style::default(),
        }
    }

    fn text(line: &Line<'_>) -> String {
        line.spans.iter().map(|span| span.content.as_ref()).collect()
    }

    #[test]
    fn draws_guides_for_nested_rows() {
        let parts = PrefixRule::new().split("leaf");
        let line = tree_label_line(
            &ctx(&[false, true]),
            parts,
            Style::default(),
            &TreeGlyphs::ascii(),
        );

        assert_eq!(text(&line), "|  `--* leaf");
    }

    #[test]
    fn root_rows_show_expander_and_prefix() {
        let mut row = ctx(&[]);
        row.has_children = true;
        row.is_expanded = true;
        let parts = PrefixRule::new().split("📁 Documents");
        let line = tree_label_line(&row, parts, Style::default(), &TreeGlyphs::unicode());

        assert_eq!(text(&line), "▼ 📁 Documents");
    }

    #[test]
    fn plain_indent_when_guides_are_off() {
        let mut row = ctx(&[true]);
        row.draw_lines = false;
        row.is_editing = true;
        let parts = PrefixRule::new().split("draft");
        let line = tree_label_line(&row, parts, Style::default(), &TreeGlyphs::ascii());

        assert_eq!(text(&line), "   * draft_");
    }
}
