pub mod app;
pub mod ui;

use std::io;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};

use crate::error::Result;
use crate::generation::GenerationSettings;
use crate::models::OwnerId;
use crate::storage::JsonStore;
use app::{App, InputMode, ViewMode};
use ui::ui;

/// Opens the interactive view for `owner` until the user quits.
pub fn run_tui(store: JsonStore, owner: OwnerId, settings: GenerationSettings) -> Result<()> {
    let mut app = App::new(store, owner, settings)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    res.map_err(Into::into)
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        let Event::Key(key) = event::read()? else { continue };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        match app.input_mode {
            InputMode::Normal => match (key.code, app.view_mode) {
                (KeyCode::Char('q'), _) => return Ok(()),
                (KeyCode::Down | KeyCode::Char('j'), _) => app.next(),
                (KeyCode::Up | KeyCode::Char('k'), _) => app.previous(),
                (KeyCode::Char('d') | KeyCode::Delete, _) => app.delete_selected(),
                (KeyCode::Char('v'), _) => app.toggle_view(),
                (KeyCode::Char(' '), ViewMode::Tasks) => app.complete_selected(),
                (KeyCode::Char('s'), ViewMode::Tasks) => app.snooze_selected(),
                (KeyCode::Char('a'), ViewMode::Tasks) => app.archive_selected(),
                (KeyCode::Char('r'), ViewMode::Tasks) => app.start_rename(),
                (KeyCode::Char('c'), ViewMode::Tasks) => app.toggle_completed(),
                (KeyCode::Char('p'), ViewMode::Templates) => app.toggle_selected_template(),
                (KeyCode::Char('g'), ViewMode::Templates) => app.generate_today(),
                _ => {}
            },
            InputMode::Renaming => match key.code {
                KeyCode::Enter => app.submit_rename(),
                KeyCode::Esc => app.cancel_input(),
                KeyCode::Char(c) => app.input_buffer.push(c),
                KeyCode::Backspace => {
                    app.input_buffer.pop();
                }
                _ => {}
            },
        }
    }
}
