use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::layout::{Constraint, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::Paragraph;
use ratatui::{DefaultTerminal, Frame};

use tui_treestate::prelude::*;
use tui_treestate::parse_forest;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DemoCommand {
    Quit,
    Search,
    PickUp,
    Drop,
    CycleMode,
}

enum Mode {
    Browse,
    Search(String),
}

struct App {
    records: Vec<NodeRecord>,
    tree: TreeController,
    view: TreeViewState,
    bindings: TreeKeyBindings,
    mode: Mode,
    status: String,
}

impl App {
    fn new(records: Vec<NodeRecord>, diagnostics: usize) -> Self {
        let config = TreeConfig::new().selection_mode(SelectionMode::Multiple);
        let mut tree = TreeController::from_records(&records, config);
        tree.expand_to_depth(1);
        tree.navigate(NavDirection::Home);
        tree.drain_notifications();
        Self {
            records,
            tree,
            view: TreeViewState::new(),
            bindings: TreeKeyBindings::new(),
            mode: Mode::Browse,
            status: format!("{diagnostics} input problems"),
        }
    }

    fn on_key(&mut self, key: KeyEvent) -> bool {
        if let Mode::Search(query) = &mut self.mode {
            match key.code {
                KeyCode::Enter => {
                    let query = std::mem::take(query);
                    let matches = self.tree.search_default(&query);
                    self.status = format!("`{query}`: {matches} matches");
                    self.mode = Mode::Browse;
                }
                KeyCode::Esc => self.mode = Mode::Browse,
                KeyCode::Backspace => {
                    query.pop();
                }
                KeyCode::Char(ch) => query.push(ch),
                _ => {}
            }
            return true;
        }

        if self.tree.edit_session().is_some() {
            let command = self.bindings.resolve_editing::<()>(key);
            match (command, key.code) {
                (Some(command), _) => {
                    self.tree.dispatch(command);
                }
                (None, KeyCode::Backspace) => {
                    let mut draft = self.draft();
                    draft.pop();
                    self.tree.set_edit_draft(draft);
                }
                (None, KeyCode::Char(ch)) => {
                    let mut draft = self.draft();
                    draft.push(ch);
                    self.tree.set_edit_draft(draft);
                }
                _ => {}
            }
            return true;
        }

        let command = self.bindings.resolve_with(key, |key| match key.code {
            KeyCode::Char('q') => Some(DemoCommand::Quit),
            KeyCode::Char('/') => Some(DemoCommand::Search),
            KeyCode::Char('x') => Some(DemoCommand::PickUp),
            KeyCode::Char('p') => Some(DemoCommand::Drop),
            KeyCode::Char('m') => Some(DemoCommand::CycleMode),
            _ => None,
        });
        let Some(command) = command else {
            return true;
        };
        if let TreeEvent::Command(TreeCommand::Custom(custom)) = self.tree.dispatch(command) {
            return self.on_custom(custom);
        }
        true
    }

    fn on_custom(&mut self, command: DemoCommand) -> bool {
        match command {
            DemoCommand::Quit => return false,
            DemoCommand::Search => self.mode = Mode::Search(String::new()),
            DemoCommand::PickUp => {
                if let Some(id) = self.tree.focused().map(str::to_owned) {
                    self.tree.begin_drag(&id);
                    self.status = format!("carrying {id}");
                }
            }
            DemoCommand::Drop => {
                let target = self.tree.focused().map(str::to_owned);
                let valid = self.tree.drag_over(target.as_deref());
                match self.tree.drop_drag() {
                    Some(request) => {
                        move_record(&mut self.records, &request);
                        let snapshot = self.tree.export_state();
                        self.tree.set_tree_data(&self.records);
                        self.tree.import_state(&snapshot);
                        self.tree.expand_to(&request.source);
                        self.status = format!("moved {} under {}", request.source, request.target);
                    }
                    None if !valid => self.status = "cannot drop here".to_owned(),
                    None => {}
                }
            }
            DemoCommand::CycleMode => {
                let mode = match self.tree.selection_mode() {
                    SelectionMode::None => SelectionMode::Single,
                    SelectionMode::Single => SelectionMode::Multiple,
                    SelectionMode::Multiple => SelectionMode::None,
                };
                self.tree.set_selection_mode(mode);
                self.status = format!("selection mode {mode:?}");
            }
        }
        true
    }

    fn draft(&self) -> String {
        self.tree
            .edit_session()
            .map(|session| session.draft().to_owned())
            .unwrap_or_default()
    }

    fn status_line(&self) -> Line<'_> {
        let stats = self.tree.stats();
        let prompt = match &self.mode {
            Mode::Search(query) => format!("/{query}"),
            Mode::Browse => self.status.clone(),
        };
        Line::from(format!(
            " {} nodes | {} visible | {} selected | {} matches | {prompt}",
            stats.total, stats.visible, stats.selected, stats.search_matches
        ))
    }
}

fn move_record(records: &mut Vec<NodeRecord>, request: &MoveRequest) {
    let Some(node) = take_record(records, &request.source) else {
        return;
    };
    match find_record(records, &request.target) {
        Some(target) => target.children.push(node),
        None => records.push(node),
    }
}

fn take_record(records: &mut Vec<NodeRecord>, id: &str) -> Option<NodeRecord> {
    if let Some(pos) = records.iter().position(|r| r.id.as_deref() == Some(id)) {
        return Some(records.remove(pos));
    }
    records
        .iter_mut()
        .find_map(|record| take_record(&mut record.children, id))
}

fn find_record<'a>(records: &'a mut [NodeRecord], id: &str) -> Option<&'a mut NodeRecord> {
    for record in records {
        if record.id.as_deref() == Some(id) {
            return Some(record);
        }
        if let Some(found) = find_record(&mut record.children, id) {
            return Some(found);
        }
    }
    None
}

fn scan_dir(path: &Path, depth: usize, max_depth: usize) -> NodeRecord {
    let name = path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().to_string(),
    );
    let is_dir = path.is_dir();
    let icon = if is_dir { "📁" } else { "📄" };
    let mut record = NodeRecord::with_id(path.display().to_string(), format!("{icon} {name}"));
    if let Ok(metadata) = fs::symlink_metadata(path) {
        record = record.field("size", metadata.len().to_string());
    }
    if !is_dir || depth >= max_depth {
        return record;
    }

    let mut entries: Vec<PathBuf> = match fs::read_dir(path) {
        Ok(read_dir) => read_dir.filter_map(Result::ok).map(|e| e.path()).collect(),
        Err(_) => return record,
    };
    entries.sort_by_key(|entry| (!entry.is_dir(), entry.file_name().map(ToOwned::to_owned)));
    record.children(
        entries
            .iter()
            .map(|entry| scan_dir(entry, depth + 1, max_depth)),
    )
}

fn load(arg: Option<String>) -> io::Result<(Vec<NodeRecord>, usize)> {
    let path = arg.map_or_else(env::current_dir, |arg| Ok(PathBuf::from(arg)))?;
    if path.extension().is_some_and(|ext| ext == "json") {
        let text = fs::read_to_string(&path)?;
        let forest = parse_forest(&text).map_err(io::Error::other)?;
        let problems = forest.diagnostics.len();
        return Ok((forest.records, problems));
    }
    Ok((vec![scan_dir(&path, 0, 2)], 0))
}

fn render(frame: &mut Frame, app: &mut App, style: &TreeViewStyle<'_>) {
    let [tree_area, status_area] =
        Layout::vertical([Constraint::Fill(1), Constraint::Length(1)]).areas(frame.area());
    let widget = TreeView::new(&app.tree, style.clone());
    frame.render_stateful_widget(widget, tree_area, &mut app.view);
    frame.render_widget(Paragraph::new(app.status_line()), status_area);
}

fn run_app(
    mut terminal: DefaultTerminal,
    mut app: App,
    style: &TreeViewStyle<'_>,
) -> io::Result<()> {
    loop {
        terminal.draw(|frame| render(frame, &mut app, style))?;

        if event::poll(Duration::from_millis(200))? {
            if let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
                && !app.on_key(key)
            {
                break;
            }
            for notification in app.tree.drain_notifications() {
                if let TreeNotification::EditCommitted { label, .. } = notification {
                    app.status = format!("renamed to {label}");
                }
            }
        }
    }
    Ok(())
}

fn main() -> io::Result<()> {
    let (records, problems) = load(env::args().nth(1))?;
    let app = App::new(records, problems);

    let mut style = TreeViewStyle::default();
    style.block_style = Style::default()
        .fg(Color::Rgb(221, 227, 235))
        .bg(Color::Rgb(24, 28, 36));
    style.border_style = Style::default().fg(Color::Rgb(92, 110, 140));
    style.line_style = Style::default().fg(Color::Rgb(86, 98, 120));
    style.selected_style = Style::default()
        .fg(Color::Rgb(136, 192, 208))
        .add_modifier(Modifier::BOLD);
    style.match_style = Style::default().fg(Color::Rgb(229, 201, 133));
    style.focus_style = Style::default()
        .fg(Color::Rgb(255, 255, 255))
        .bg(Color::Rgb(52, 66, 96))
        .add_modifier(Modifier::BOLD);
    style.title = Some(Line::from(
        " tree  [/] search  [e] rename  [x]/[p] move  [m] mode  [q] quit ",
    ));

    let terminal = ratatui::init();
    let result = run_app(terminal, app, &style);
    ratatui::restore();
    result
}
