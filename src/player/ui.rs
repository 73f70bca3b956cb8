use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
};

use super::app::{App, ViewMode};
use super::browser::draw_browser;
use crate::player::session::Phase;

pub fn draw(f: &mut Frame, app: &App) {
    let size = f.area();

    draw_main_ui(f, app);

    if app.view_mode == ViewMode::Browser {
        draw_browser(f, size, &app.browser);
    }
}

fn draw_main_ui(f: &mut Frame, app: &App) {
    let size = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(2), // Title
            Constraint::Length(2), // Track info + status
            Constraint::Length(3), // Progress bar
            Constraint::Length(3), // Speed gauge
            Constraint::Length(2), // Tunables
            Constraint::Length(4), // Controls
        ])
        .split(size);

    let title = Paragraph::new("🚀 Accelerating Player")
        .style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .alignment(Alignment::Center);
    f.render_widget(title, chunks[0]);

    draw_track_info(f, chunks[1], app);
    draw_progress_bar(f, chunks[2], app);
    draw_speed_gauge(f, chunks[3], app);
    draw_tunables(f, chunks[4], app);
    draw_controls(f, chunks[5], app);
}

fn draw_track_info(f: &mut Frame, area: Rect, app: &App) {
    let session = &app.session;

    let mut line = if let Some(track) = session.track() {
        let mut spans = vec![
            Span::styled("♪ ", Style::default().fg(Color::Magenta)),
            Span::styled(
                track.name.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
        ];
        if track.artwork.is_some() {
            spans.push(Span::styled(" [art]", Style::default().fg(Color::DarkGray)));
        }
        spans.push(Span::styled(
            match session.phase() {
                Phase::Playing => "  playing",
                Phase::Paused => "  paused",
                Phase::Ended => "  ended",
                _ => "",
            },
            Style::default().fg(Color::DarkGray),
        ));
        spans
    } else {
        vec![Span::styled(
            "No track selected - press [/] to browse",
            Style::default().fg(Color::DarkGray),
        )]
    };

    // Transient status message takes precedence over the track line
    if let Some(message) = &app.status_message {
        line = vec![Span::styled(
            message.clone(),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )];
    }

    let widget = Paragraph::new(Line::from(line));
    f.render_widget(widget, area);

    let border = Block::default().borders(Borders::BOTTOM);
    f.render_widget(border, area);
}

/// mm:ss, rendering unknown durations as 0:00 rather than NaN.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "0:00".to_string();
    }
    let total = seconds as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

fn draw_progress_bar(f: &mut Frame, area: Rect, app: &App) {
    let state = app.session.state();
    let progress = state.progress();
    let percent = if progress.is_finite() {
        (progress * 100.0).clamp(0.0, 100.0) as u16
    } else {
        0
    };

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(10), Constraint::Length(16)])
        .split(area);

    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL))
        .gauge_style(Style::default().fg(Color::Cyan))
        .percent(percent)
        .label(Span::raw(format!("{percent}%")));
    f.render_widget(gauge, chunks[0]);

    let time = format!(
        "{} / {}",
        format_time(state.position),
        format_time(state.duration)
    );
    let time_widget = Paragraph::new(time)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(time_widget, chunks[1]);
}

fn draw_speed_gauge(f: &mut Frame, area: Rect, app: &App) {
    let config = app.session.config();
    let rate = app.session.state().current_rate;

    // Position of the current rate within the configured window
    let span = config.max_rate - config.start_rate;
    let ratio = if span > 0.0 {
        ((rate - config.start_rate) / span).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let gauge = Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Speed ")
                .border_style(Style::default().fg(Color::Magenta)),
        )
        .gauge_style(Style::default().fg(Color::Magenta))
        .ratio(ratio)
        .label(Span::styled(
            format!("{rate:.2}x"),
            Style::default().add_modifier(Modifier::BOLD),
        ));
    f.render_widget(gauge, area);
}

fn draw_tunables(f: &mut Frame, area: Rect, app: &App) {
    let config = app.session.config();
    let row = vec![
        Span::styled("[s/S]", Style::default().fg(Color::Green)),
        Span::raw(format!(" start {:.1}x  ", config.start_rate)),
        Span::styled("[m/M]", Style::default().fg(Color::Green)),
        Span::raw(format!(" max {:.1}x  ", config.max_rate)),
        Span::styled("[a/A]", Style::default().fg(Color::Green)),
        Span::raw(format!(" accel {:.1}", config.acceleration)),
    ];
    let widget = Paragraph::new(Line::from(row)).alignment(Alignment::Center);
    f.render_widget(widget, area);
}

fn draw_controls(f: &mut Frame, area: Rect, app: &App) {
    let playing = app.session.state().is_playing;

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(area);

    let row1 = vec![
        Span::styled(
            "[space]",
            Style::default().fg(if playing { Color::Yellow } else { Color::Green }),
        ),
        Span::raw(if playing { " pause  " } else { " play  " }),
        Span::styled("[←→]", Style::default().fg(Color::Magenta)),
        Span::raw(" seek ±10s  "),
        Span::styled("[/]", Style::default().fg(Color::Blue)),
        Span::raw(" browse  "),
        Span::styled("[q]", Style::default().fg(Color::Red)),
        Span::raw(" quit"),
    ];
    let row2 = vec![Span::styled(
        "lowercase decreases, uppercase increases a tunable",
        Style::default().fg(Color::DarkGray),
    )];

    let border = Block::default().borders(Borders::TOP);
    f.render_widget(border, area);
    f.render_widget(
        Paragraph::new(Line::from(row1)).alignment(Alignment::Center),
        rows[0],
    );
    f.render_widget(
        Paragraph::new(Line::from(row2)).alignment(Alignment::Center),
        rows[1],
    );
}
