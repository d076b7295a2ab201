use ratatui::layout::{Constraint, Rect};
use ratatui::prelude::Buffer;
use ratatui::style::Style;
use ratatui::widgets::{
    Block, Borders, Cell, Row, Scrollbar, ScrollbarOrientation, ScrollbarState, StatefulWidget,
    Table, TableState,
};

use crate::context::TreeRowContext;
use crate::edit::LabelParts;
use crate::glyphs::{TreeGlyphs, tree_label_line};
use crate::state::{TreeController, VisibleNode};
use crate::style::{TreeScrollPolicy, TreeViewStyle};

/// Viewport state of [`TreeView`]: scroll offset and the highlighted row.
#[derive(Clone, Debug, Default)]
pub struct TreeViewState {
    table: TableState,
}

impl TreeViewState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the first visible row.
    pub fn offset(&self) -> usize {
        self.table.offset()
    }

    pub fn set_offset(&mut self, offset: usize) {
        *self.table.offset_mut() = offset;
    }

    /// Row index (into the visible order) under a line of the widget body.
    pub fn row_at(&self, body_y: u16) -> usize {
        self.offset() + usize::from(body_y)
    }

    /// Highlighted row from the last render.
    pub fn cursor(&self) -> Option<usize> {
        self.table.selected()
    }

    pub(crate) fn scroll_to_cursor(
        &mut self,
        cursor: Option<usize>,
        total: usize,
        viewport_height: usize,
        policy: TreeScrollPolicy,
    ) {
        let viewport_height = viewport_height.max(1);
        let max_offset = total.saturating_sub(viewport_height);
        self.table.select(cursor);
        let current = self.table.offset();
        let offset = match (cursor, policy) {
            (None, _) => current,
            (Some(cursor), TreeScrollPolicy::KeepInView) => {
                if cursor < current {
                    cursor
                } else if cursor >= current + viewport_height {
                    cursor + 1 - viewport_height
                } else {
                    current
                }
            }
            (Some(cursor), TreeScrollPolicy::CenterOnSelect) => {
                cursor.saturating_sub(viewport_height / 2)
            }
        };
        *self.table.offset_mut() = offset.min(max_offset);
    }
}

/// Stateful tree widget drawing a [`TreeController`]'s visible rows.
pub struct TreeView<'a> {
    controller: &'a TreeController,
    style: TreeViewStyle<'a>,
    glyphs: TreeGlyphs<'a>,
}

impl<'a> TreeView<'a> {
    pub const fn new(controller: &'a TreeController, style: TreeViewStyle<'a>) -> Self {
        Self {
            controller,
            style,
            glyphs: TreeGlyphs::unicode(),
        }
    }

    pub const fn glyphs(mut self, glyphs: TreeGlyphs<'a>) -> Self {
        self.glyphs = glyphs;
        self
    }

    // Focused row, or the row of its nearest visible ancestor.
    fn cursor(&self, nodes: &[VisibleNode]) -> Option<usize> {
        let focus = self.controller.focused_slot()?;
        self.controller
            .index()
            .path(focus)
            .iter()
            .rev()
            .find_map(|&slot| nodes.iter().position(|node| node.slot == slot))
    }

    fn build_rows(&self, nodes: &[VisibleNode]) -> Vec<Row<'a>> {
        let controller = self.controller;
        let rule = controller.config().prefix_rule;
        let editing = controller.edit_session();
        let focus = controller.focused_slot();

        let mut rows = Vec::with_capacity(nodes.len());
        for node in nodes {
            let label = controller
                .index()
                .node(node.slot)
                .map_or("", |node| node.label.as_str());
            let session = editing.filter(|session| session.slot() == node.slot);
            let (parts, text_style) = match session {
                Some(session) => (
                    LabelParts {
                        prefix: session.prefix(),
                        text: session.draft(),
                    },
                    self.style.edit_style,
                ),
                None => (rule.split(label), Style::default()),
            };

            let ctx = TreeRowContext {
                level: node.level,
                is_tail_stack: node.is_tail_stack.as_slice(),
                is_expanded: controller.slot_is_expanded(node.slot),
                has_children: node.has_children,
                is_selected: controller.slot_is_selected(node.slot),
                is_match: controller.slot_is_match(node.slot),
                is_focused: focus == Some(node.slot),
                is_editing: session.is_some(),
                draw_lines: self.style.draw_lines,
                line_style: self.style.line_style,
            };
            let line = tree_label_line(&ctx, parts, text_style, &self.glyphs);

            let mut row_style = Style::default();
            if ctx.is_selected {
                row_style = row_style.patch(self.style.selected_style);
            }
            if ctx.is_match {
                row_style = row_style.patch(self.style.match_style);
            }
            rows.push(Row::new([Cell::from(line)]).style(row_style));
        }
        rows
    }

    fn render_scrollbar(
        area: Rect,
        buf: &mut Buffer,
        offset: usize,
        inner_height: usize,
        scroll_rows: usize,
    ) {
        let scroll_len = scroll_rows.saturating_add(1);
        let mut scrollbar_state = ScrollbarState::new(scroll_len)
            .position(offset.min(scroll_rows))
            .viewport_content_length(inner_height);
        Scrollbar::default()
            .orientation(ScrollbarOrientation::VerticalRight)
            .render(area, buf, &mut scrollbar_state);
    }
}

impl StatefulWidget for TreeView<'_> {
    type State = TreeViewState;

    fn render(self, area: Rect, buf: &mut Buffer, state: &mut Self::State) {
        let nodes = self.controller.visible_rows();

        let mut block = Block::default().borders(self.style.borders);
        if let Some(title) = self.style.title.clone() {
            block = block.title(title);
        }
        block = block
            .style(self.style.block_style)
            .border_style(self.style.border_style);

        let inner_height = block.inner(area).height as usize;
        let total_rows = nodes.len();
        state.scroll_to_cursor(
            self.cursor(&nodes),
            total_rows,
            inner_height,
            self.style.scroll_policy,
        );

        let (range_start, range_end) = if self.style.virtualize_rows {
            let start = state.offset().min(total_rows);
            (start, (start + inner_height).min(total_rows))
        } else {
            (0, total_rows)
        };
        let rows = self.build_rows(&nodes[range_start..range_end]);
        let scroll_rows = total_rows.saturating_sub(inner_height);
        let offset = state.offset();

        let mut local_state = self.style.virtualize_rows.then(|| {
            let mut local = state.table;
            *local.offset_mut() = 0;
            let selected = local
                .selected()
                .filter(|&row| (range_start..range_end).contains(&row))
                .map(|row| row - range_start);
            local.select(selected);
            local
        });
        let table_state: &mut TableState = match local_state.as_mut() {
            Some(local) => local,
            None => &mut state.table,
        };

        let (table_area, table_block, scrollbar_area) = if scroll_rows > 0 {
            let table_area = Rect {
                width: area.width.saturating_sub(1),
                ..area
            };
            let scrollbar_area = Rect {
                x: area.x + area.width.saturating_sub(1),
                y: area.y,
                width: 1,
                height: area.height,
            };
            let mut table_borders = self.style.borders;
            table_borders.remove(Borders::RIGHT);
            (table_area, block.borders(table_borders), Some(scrollbar_area))
        } else {
            (area, block, None)
        };

        let table = Table::new(rows, [Constraint::Percentage(100)])
            .style(self.style.block_style)
            .block(table_block)
            .row_highlight_style(self.style.focus_style)
            .highlight_symbol(self.style.highlight_symbol);
        table.render(table_area, buf, table_state);

        if let Some(scrollbar_area) = scrollbar_area {
            Self::render_scrollbar(scrollbar_area, buf, offset, inner_height, scroll_rows);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TreeConfig;
    use crate::model::NodeRecord;

    fn controller(children: usize) -> TreeController {
        let root = NodeRecord::with_id("root", "root")
            .children((1..=children).map(|idx| NodeRecord::new(format!("node-{idx}"))));
        let mut controller = TreeController::from_records(&[root], TreeConfig::new());
        controller.expand("root");
        controller
    }

    fn screen(buffer: &Buffer) -> String {
        buffer.content().iter().map(|cell| cell.symbol()).collect()
    }

    #[test]
    fn render_smoke_with_scrollbar() {
        let controller = controller(12);
        let widget = TreeView::new(&controller, TreeViewStyle::default());
        let mut state = TreeViewState::new();

        let area = Rect::new(0, 0, 20, 6);
        let mut buffer = Buffer::empty(area);
        widget.render(area, &mut buffer, &mut state);

        assert!(screen(&buffer).contains("root"));
    }

    #[test]
    fn focused_row_is_scrolled_into_view() {
        let mut controller = controller(12);
        let last = controller.visible_order().last().map(|id| (*id).to_owned());
        controller.focus(last.as_deref().unwrap());

        let mut state = TreeViewState::new();
        let area = Rect::new(0, 0, 30, 6);
        let mut buffer = Buffer::empty(area);
        TreeView::new(&controller, TreeViewStyle::default()).render(area, &mut buffer, &mut state);

        assert_eq!(state.cursor(), Some(12));
        assert_eq!(state.offset(), 9);
        assert!(screen(&buffer).contains("node-12"));
    }

    #[test]
    fn edit_draft_replaces_label() {
        let mut controller = controller(2);
        controller.start_edit("root");
        controller.set_edit_draft("renamed");

        let mut state = TreeViewState::new();
        let area = Rect::new(0, 0, 30, 6);
        let mut buffer = Buffer::empty(area);
        TreeView::new(&controller, TreeViewStyle::default())
            .glyphs(TreeGlyphs::ascii())
            .render(area, &mut buffer, &mut state);

        assert!(screen(&buffer).contains("renamed_"));
    }

    #[test]
    fn scroll_policies() {
        let mut state = TreeViewState::new();

        state.scroll_to_cursor(Some(7), 20, 5, TreeScrollPolicy::KeepInView);
        assert_eq!(state.offset(), 3);
        state.scroll_to_cursor(Some(5), 20, 5, TreeScrollPolicy::KeepInView);
        assert_eq!(state.offset(), 3);
        state.scroll_to_cursor(Some(1), 20, 5, TreeScrollPolicy::KeepInView);
        assert_eq!(state.offset(), 1);

        state.scroll_to_cursor(Some(10), 20, 5, TreeScrollPolicy::CenterOnSelect);
        assert_eq!(state.offset(), 8);
        state.scroll_to_cursor(Some(19), 20, 5, TreeScrollPolicy::CenterOnSelect);
        assert_eq!(state.offset(), 15);
        assert_eq!(state.row_at(2), 17);
    }
}
