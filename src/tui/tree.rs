use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, Paragraph, Wrap};

use super::app::App;
use crate::ui;

pub fn render(frame: &mut Frame, app: &mut App) {
    let area = frame.area();
    if app.show_details {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(area);
        render_tree(frame, app, chunks[0]);
        render_details(frame, app, chunks[1]);
    } else {
        render_tree(frame, app, area);
    }

    if app.tree.mode == ui::TreeMode::Help {
        render_help(frame);
    }
}

fn render_tree(frame: &mut Frame, app: &mut App, area: Rect) {
    let status = status_line(app);
    let (tree_area, status_area) = match status {
        Some(_) => {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(0), Constraint::Length(1)])
                .split(area);
            (chunks[0], Some(chunks[1]))
        }
        None => (area, None),
    };

    if let (Some(line), Some(status_area)) = (status, status_area) {
        frame.render_widget(Paragraph::new(line), status_area);
    }

    let items = ui::build_tree_items(&app.tree.rows);
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" {} ", app.title)),
        )
        .highlight_style(Style::default().bg(Color::DarkGray));
    frame.render_stateful_widget(list, tree_area, &mut app.tree.list_state);
}

/// Errors win over the search prompt.
fn status_line(app: &App) -> Option<Line<'static>> {
    if let Some(err) = &app.tree.error {
        return Some(Line::styled(err.clone(), Style::default().fg(Color::Red)));
    }
    let query = match app.tree.mode {
        ui::TreeMode::Search => app.tree.query.clone(),
        _ => app.tree.model.filter()?.query().to_string(),
    };
    let count = app
        .tree
        .model
        .filter()
        .map_or(0, |f| f.matches().len());
    Some(Line::from(vec![
        Span::styled("/", Style::default().fg(Color::Cyan)),
        Span::raw(query),
        Span::styled(
            format!("  ({count} matches)"),
            Style::default().fg(Color::DarkGray),
        ),
    ]))
}

fn render_details(frame: &mut Frame, app: &App, area: Rect) {
    let model = &app.tree.model;
    let mut lines = Vec::new();
    if let Some(node) = app.focused_node() {
        let label = |l: &str| Span::styled(format!("{l:<13}"), Style::default().fg(Color::Cyan));
        lines.push(Line::from(vec![label("Id:"), Span::raw(node.id.clone())]));
        lines.push(Line::from(vec![label("Name:"), Span::raw(node.name.clone())]));
        if let Some(parent) = &node.parent {
            lines.push(Line::from(vec![label("Parent:"), Span::raw(parent.clone())]));
        }
        if let Some(desc) = &node.description {
            lines.push(Line::from(vec![label("Description:"), Span::raw(desc.clone())]));
        }
        if node.is_composite() {
            let state = if model.is_expanded(&node.id) {
                "expanded"
            } else {
                "collapsed"
            };
            lines.push(Line::from(vec![
                label("Children:"),
                Span::raw(format!("{} ({state})", node.child_ids().len())),
            ]));
        }
        lines.push(Line::raw(""));
    }

    let history: Vec<&str> = model.selection().history().iter().collect();
    lines.push(Line::styled("History:", Style::default().fg(Color::Cyan)));
    for id in history.iter().rev() {
        lines.push(Line::raw(format!("  {id}")));
    }

    let title = app
        .focused_node()
        .map(|n| format!(" {} ", n.name))
        .unwrap_or_else(|| " Details ".to_string());
    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn render_help(frame: &mut Frame) {
    let key = |k: &'static str, desc: &'static str| {
        Line::from(vec![
            Span::styled(format!("{k:<10}"), Style::default().fg(Color::Cyan)),
            Span::raw(desc),
        ])
    };
    let help_text = vec![
        key("j/Down", "Next row"),
        key("k/Up", "Previous row"),
        key("g/G", "First / last row"),
        key("l/Right", "Expand, or enter first child"),
        key("h/Left", "Collapse, or go to parent"),
        key("p", "Go to parent"),
        key("Space", "Toggle expansion"),
        key("E/C", "Expand / collapse subtree"),
        key("/", "Filter by name"),
        key("n/N", "Next / previous match"),
        key("d/Tab", "Toggle details"),
        key("r", "Reload"),
        key("?", "Toggle help"),
        key("q/Esc", "Quit"),
    ];
    ui::render_popup(frame, "Help", help_text);
}
