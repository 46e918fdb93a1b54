//! Shared UI primitives for tree rendering.
//!
//! Used by `treemodel browse` and by the plain-text output of `show`/`exec`.

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Clear, ListItem, ListState, Paragraph};

use crate::model::TreeModel;
use crate::rows::TreeRow;

// ── Rendering helpers ──────────────────────────────────────────────────

/// Build the tree connector prefix string for a row.
pub fn tree_prefix(row: &TreeRow) -> String {
    let mut prefix = String::new();
    for d in 1..row.depth + 1 {
        if d == row.depth {
            if row.is_last_at_depth[d] {
                prefix.push_str("└── ");
            } else {
                prefix.push_str("├── ");
            }
        } else if row.is_last_at_depth[d] {
            prefix.push_str("    ");
        } else {
            prefix.push_str("│   ");
        }
    }
    prefix
}

/// `v ` for expanded nodes, `> ` for collapsed ones, blank for leaves.
pub fn expansion_indicator(row: &TreeRow) -> &'static str {
    if !row.has_children {
        "  "
    } else if row.expanded {
        "v "
    } else {
        "> "
    }
}

/// Center a rectangle within an area.
pub fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}

/// Split a row's name into spans, emphasizing characters matched by the
/// active filter.
fn name_spans(row: &TreeRow) -> Vec<Span<'static>> {
    let base = if row.selectable {
        Style::default().bold()
    } else {
        Style::default().dim()
    };
    if row.highlight.is_empty() {
        return vec![Span::styled(row.name.clone(), base)];
    }

    let hit = base.fg(Color::Yellow).underlined();
    let mut spans = Vec::new();
    let mut run = String::new();
    let mut run_is_hit = false;
    for (i, c) in row.name.chars().enumerate() {
        let is_hit = row.highlight.contains(&i);
        if is_hit != run_is_hit && !run.is_empty() {
            let style = if run_is_hit { hit } else { base };
            spans.push(Span::styled(std::mem::take(&mut run), style));
        }
        run_is_hit = is_hit;
        run.push(c);
    }
    if !run.is_empty() {
        spans.push(Span::styled(run, if run_is_hit { hit } else { base }));
    }
    spans
}

/// Build ListItems for all tree rows.
pub fn build_tree_items(rows: &[TreeRow]) -> Vec<ListItem<'static>> {
    rows.iter()
        .map(|row| {
            let mut spans = vec![
                Span::raw(tree_prefix(row)),
                Span::raw(expansion_indicator(row)),
            ];
            spans.extend(name_spans(row));
            if row.selected {
                spans.push(Span::styled(" *", Style::default().fg(Color::Green)));
            }
            if let Some(desc) = &row.description {
                spans.push(Span::styled(
                    format!("  {desc}"),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            ListItem::new(Line::from(spans))
        })
        .collect()
}

/// Render a centered popup with a bordered title.
pub fn render_popup(frame: &mut Frame, title: &str, lines: Vec<Line<'static>>) {
    let term = frame.area();
    let width = 56.min(term.width.saturating_sub(4));
    let height = (lines.len() as u16 + 2).min(term.height.saturating_sub(2));
    let area = centered_rect(width, height, term);
    frame.render_widget(Clear, area);

    let block = ratatui::widgets::Block::default()
        .borders(ratatui::widgets::Borders::ALL)
        .title(format!(" {title} "))
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(area);
    frame.render_widget(block, area);
    frame.render_widget(Paragraph::new(lines), inner);
}

// ── Tree view state ────────────────────────────────────────────────────

/// Modal state for the tree view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeMode {
    Normal,
    Help,
    /// Typing a search query; the filter follows every keystroke.
    Search,
}

/// Action returned by `TreeView::handle_key()`.
#[derive(Debug, PartialEq, Eq)]
pub enum TreeKeyAction {
    /// Quit the application.
    Quit,
    /// Caller should re-resolve the tree from its source.
    Refresh,
    /// Key was not handled; caller should check app-specific bindings.
    Unhandled,
    /// Handled, no further action needed.
    Continue,
}

/// A [`TreeModel`] plus the cursor and modal state of its on-screen list.
pub struct TreeView {
    pub model: TreeModel,
    pub rows: Vec<TreeRow>,
    pub list_state: ListState,
    pub mode: TreeMode,
    pub query: String,
    pub error: Option<String>,
}

impl TreeView {
    pub fn new(mut model: TreeModel) -> Self {
        if model.selection().most_recent().is_none() {
            model.select_first();
        }
        let mut view = Self {
            model,
            rows: Vec::new(),
            list_state: ListState::default(),
            mode: TreeMode::Normal,
            query: String::new(),
            error: None,
        };
        view.sync();
        view
    }

    /// Rebuild rows from the model and move the list cursor to the most
    /// recent selection.
    pub fn sync(&mut self) {
        self.rows = self.model.rows();
        let focus = self.model.selection().most_recent();
        let cursor = focus.and_then(|f| self.rows.iter().position(|r| r.id == f));
        self.list_state.select(cursor);
        if let Some(err) = self.model.last_error() {
            self.error = Some(err.to_string());
            self.model.clear_error();
        }
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.model.selection().most_recent()
    }

    /// Handle a key press. Returns an action for the caller.
    pub fn handle_key(&mut self, key: KeyEvent) -> TreeKeyAction {
        let action = match self.mode {
            TreeMode::Help => {
                if matches!(
                    key.code,
                    KeyCode::Char('?') | KeyCode::Esc | KeyCode::Char('q')
                ) {
                    self.mode = TreeMode::Normal;
                }
                TreeKeyAction::Continue
            }
            TreeMode::Search => self.handle_search_key(key),
            TreeMode::Normal => {
                self.error = None;
                self.handle_normal_key(key)
            }
        };
        self.sync();
        action
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> TreeKeyAction {
        let m = &mut self.model;
        match key.code {
            KeyCode::Char('q') => return TreeKeyAction::Quit,
            KeyCode::Char('j') | KeyCode::Down => {
                m.select_next();
            }
            KeyCode::Char('k') | KeyCode::Up => {
                m.select_prev();
            }
            KeyCode::Char('g') | KeyCode::Home => {
                m.select_first();
            }
            KeyCode::Char('G') | KeyCode::End => {
                m.select_last();
            }
            KeyCode::Char('h') | KeyCode::Left => {
                m.collapse_or_select_parent();
            }
            KeyCode::Char('l') | KeyCode::Right => {
                m.expand_or_select_first_child();
            }
            KeyCode::Char('p') => {
                m.select_parent();
            }
            KeyCode::Char(' ') | KeyCode::Enter => {
                m.toggle_node_expansion(None);
            }
            KeyCode::Char('C') => {
                m.collapse_all(None);
            }
            KeyCode::Char('E') => {
                m.expand_all(None);
            }
            KeyCode::Char('/') => {
                self.query = m.filter().map(|f| f.query().to_string()).unwrap_or_default();
                self.mode = TreeMode::Search;
            }
            KeyCode::Char('n') => {
                m.select_next_match();
            }
            KeyCode::Char('N') => {
                m.select_prev_match();
            }
            KeyCode::Esc if m.filter().is_some() => {
                m.set_filter(None);
                self.query.clear();
            }
            KeyCode::Char('r') => return TreeKeyAction::Refresh,
            KeyCode::Char('?') => self.mode = TreeMode::Help,
            _ => return TreeKeyAction::Unhandled,
        }
        TreeKeyAction::Continue
    }

    fn handle_search_key(&mut self, key: KeyEvent) -> TreeKeyAction {
        match key.code {
            KeyCode::Esc => {
                self.query.clear();
                self.model.set_filter(None);
                self.mode = TreeMode::Normal;
            }
            KeyCode::Enter => {
                self.mode = TreeMode::Normal;
                self.model.select_next_match();
            }
            KeyCode::Backspace => {
                self.query.pop();
                self.model.set_filter(Some(&self.query));
            }
            KeyCode::Char(c) => {
                self.query.push(c);
                self.model.set_filter(Some(&self.query));
            }
            _ => {}
        }
        TreeKeyAction::Continue
    }
}
