//! Main application state and control flow.
//!
//! Hosts the terminal event loop that ties everything together: key
//! events become session transitions, the session pumps primitive
//! notifications and the rate sampler on every iteration, and the UI
//! is redrawn between polls. The loop polls with a short timeout so
//! sampling and rendering continue while the keyboard is idle.

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::info;
use ratatui::{Terminal, backend::CrosstermBackend};
use std::{
    error::Error,
    io,
    path::Path,
    time::{Duration, Instant},
};

use super::audio::AudioEngine;
use super::browser::Browser;
use super::session::PlayerSession;
use super::ui;
use crate::constants::{
    ACCELERATION_BOUNDS, MAX_RATE_BOUNDS, START_RATE_BOUNDS, TUNABLE_STEP,
};
use crate::player::rate::RateConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewMode {
    Player,
    Browser,
}

pub struct App {
    pub should_quit: bool,
    pub session: PlayerSession<AudioEngine>,
    pub browser: Browser,
    pub view_mode: ViewMode,
    pub status_message: Option<String>,
    status_timer: Option<Instant>,
}

impl App {
    pub fn new(session: PlayerSession<AudioEngine>) -> Self {
        Self {
            should_quit: false,
            session,
            browser: Browser::new(),
            view_mode: ViewMode::Player,
            status_message: None,
            status_timer: None,
        }
    }

    fn set_status(&mut self, message: String) {
        self.status_message = Some(message);
        self.status_timer = Some(Instant::now());
    }

    fn clear_stale_status(&mut self) {
        if let Some(timer) = self.status_timer
            && timer.elapsed() > Duration::from_secs(3)
        {
            self.status_message = None;
            self.status_timer.take();
        }
    }
}

pub fn run(file: Option<&str>, config: RateConfig) -> Result<(), Box<dyn Error>> {
    init_logging()?;
    info!("Starting accelerating player");

    let engine = AudioEngine::new()?;
    let mut app = App::new(PlayerSession::new(engine, config));

    info!("Scanning directory for audio files...");
    if let Err(e) = app.browser.scan_directory(Path::new(".")) {
        log::error!("Could not scan directory: {e}");
    }

    if let Some(path) = file {
        app.session.select_track(Path::new(path), Instant::now())?;
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    // Restore terminal on every exit path
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = res {
        eprintln!("Error: {e}");
        return Err(e);
    }
    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> Result<(), Box<dyn Error>> {
    loop {
        // Drain engine notifications and drive the rate sampler
        app.session.pump(Instant::now());
        app.clear_stale_status();

        terminal.draw(|f| ui::draw(f, app))?;

        // Poll with a short timeout to allow continuous sampling
        if event::poll(Duration::from_millis(50))?
            && let Event::Key(key) = event::read()?
        {
            handle_key_event(app, key);
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn handle_key_event(app: &mut App, key: event::KeyEvent) {
    match app.view_mode {
        ViewMode::Player => handle_player_keys(app, key),
        ViewMode::Browser => handle_browser_keys(app, key),
    }
}

fn handle_player_keys(app: &mut App, key: event::KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char(' ') => {
            if let Err(e) = app.session.toggle_play(Instant::now()) {
                app.set_status(e.to_string());
            }
        }
        KeyCode::Left => app.session.seek_backward(),
        KeyCode::Right => app.session.seek_forward(),
        KeyCode::Char('b') | KeyCode::Char('/') => {
            app.view_mode = ViewMode::Browser;
            app.browser.hide_search();
            if let Err(e) = app.browser.scan_directory(Path::new(".")) {
                app.set_status(format!("Could not scan directory: {e}"));
            }
        }
        KeyCode::Char('s') => adjust_start_rate(app, -TUNABLE_STEP),
        KeyCode::Char('S') => adjust_start_rate(app, TUNABLE_STEP),
        KeyCode::Char('m') => adjust_max_rate(app, -TUNABLE_STEP),
        KeyCode::Char('M') => adjust_max_rate(app, TUNABLE_STEP),
        KeyCode::Char('a') => adjust_acceleration(app, -TUNABLE_STEP),
        KeyCode::Char('A') => adjust_acceleration(app, TUNABLE_STEP),
        _ => {}
    }
}

fn handle_browser_keys(app: &mut App, key: event::KeyEvent) {
    // Search input captures printable keys while visible
    if app.browser.search_visible {
        match key.code {
            KeyCode::Esc => app.browser.hide_search(),
            KeyCode::Enter => app.browser.hide_search(),
            KeyCode::Backspace => app.browser.pop_char(),
            KeyCode::Up => app.browser.select_previous(),
            KeyCode::Down => app.browser.select_next(),
            KeyCode::Char(c) => app.browser.push_char(c),
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Esc => app.view_mode = ViewMode::Player,
        KeyCode::Char('/') => app.browser.show_search(),
        KeyCode::Up | KeyCode::Char('k') => app.browser.select_previous(),
        KeyCode::Down | KeyCode::Char('j') => app.browser.select_next(),
        KeyCode::Enter => {
            let selected = app.browser.get_selected_path().map(Path::to_path_buf);
            if let Some(path) = selected {
                match app.session.select_track(&path, Instant::now()) {
                    Ok(()) => app.view_mode = ViewMode::Player,
                    Err(e) => app.set_status(e.to_string()),
                }
            }
        }
        KeyCode::Char('q') => app.should_quit = true,
        _ => {}
    }
}

fn adjust_start_rate(app: &mut App, delta: f64) {
    let (lo, hi) = START_RATE_BOUNDS;
    let target = round_step(app.session.config().start_rate + delta).clamp(lo, hi);
    if let Err(e) = app.session.set_start_rate(target) {
        app.set_status(e.to_string());
    }
}

fn adjust_max_rate(app: &mut App, delta: f64) {
    let (lo, hi) = MAX_RATE_BOUNDS;
    let target = round_step(app.session.config().max_rate + delta).clamp(lo, hi);
    if let Err(e) = app.session.set_max_rate(target) {
        app.set_status(e.to_string());
    }
}

fn adjust_acceleration(app: &mut App, delta: f64) {
    let (lo, hi) = ACCELERATION_BOUNDS;
    let target = round_step(app.session.config().acceleration + delta).clamp(lo, hi);
    if let Err(e) = app.session.set_acceleration(target) {
        app.set_status(e.to_string());
    }
}

/// Keep tunables on a clean 0.1 grid despite float accumulation.
fn round_step(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn init_logging() -> Result<(), Box<dyn Error>> {
    use simplelog::{CombinedLogger, Config, LevelFilter, WriteLogger};
    use std::fs::File;

    let log_file = "/tmp/accelplay.log";
    CombinedLogger::init(vec![WriteLogger::new(
        LevelFilter::Debug,
        Config::default(),
        File::create(log_file)?,
    )])?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_step_snaps_to_grid() {
        assert_eq!(round_step(1.0000000000000002 + 0.1), 1.1);
        assert_eq!(round_step(0.30000000000000004), 0.3);
        assert_eq!(round_step(1.25), 1.3);
    }
}
