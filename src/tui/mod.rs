mod app;
mod event;
mod tree;

use std::io;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self as ct_event, Event, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use log::info;
use ratatui::prelude::*;

use crate::model::TreeModel;
use crate::watch;
use app::App;
use event::KeyAction;

/// Browse `model` interactively until the user quits. When the model's
/// source lives on disk it is reloaded whenever it changes.
pub fn run(model: TreeModel, title: String, poll_interval: u64) -> Result<()> {
    // Watch before touching the terminal so setup errors print normally.
    let watcher = match model.tree().location() {
        Some(path) => Some(watch::watch_source(path)?),
        None => None,
    };
    let mut app = App::new(model, title);

    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let rx = watcher.as_ref().map(|(_, rx)| rx);
    let result = run_loop(&mut terminal, &mut app, rx, poll_interval);

    terminal::disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;

    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    rx: Option<&std::sync::mpsc::Receiver<()>>,
    poll_interval: u64,
) -> Result<()> {
    let poll_duration = Duration::from_millis(poll_interval);

    loop {
        terminal.draw(|frame| tree::render(frame, app))?;

        if ct_event::poll(poll_duration)? {
            if let Event::Key(key) = ct_event::read()? {
                if key.kind == KeyEventKind::Press {
                    match event::handle_key(app, key) {
                        KeyAction::Quit => return Ok(()),
                        KeyAction::Refresh => app.refresh(),
                        KeyAction::Continue => {}
                    }
                }
            }
        }

        // Check for file changes (non-blocking)
        if let Some(rx) = rx {
            if watch::wait_for_change(rx, Duration::ZERO) {
                watch::drain_events(rx);
                info!("source changed, reloading");
                app.refresh();
            }
        }
    }
}
