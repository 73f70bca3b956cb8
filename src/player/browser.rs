//! File browser for track selection.
//!
//! Scans a directory tree for supported audio files and offers a
//! fuzzy-searchable list. Selecting an entry hands its path to the
//! session as the new track.

use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use log::warn;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
};
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{AUDIO_EXTENSIONS, SKIP_DIRECTORIES};

pub struct Browser {
    pub items: Vec<PathBuf>,
    pub filtered_indices: Vec<usize>,
    pub selected: usize,
    pub search_query: String,
    pub search_visible: bool,
    matcher: SkimMatcherV2,
}

impl Browser {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            filtered_indices: Vec::new(),
            selected: 0,
            search_query: String::new(),
            search_visible: false,
            matcher: SkimMatcherV2::default(),
        }
    }

    pub fn scan_directory(&mut self, path: &Path) -> Result<(), std::io::Error> {
        self.items.clear();
        self.scan_directory_recursive(path)?;
        self.items.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        self.filter_items();
        Ok(())
    }

    fn scan_directory_recursive(&mut self, path: &Path) -> Result<(), std::io::Error> {
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let path = entry.path();
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();

            if path.is_dir() {
                if name.starts_with('.') || SKIP_DIRECTORIES.contains(&name.as_str()) {
                    continue;
                }
                if let Err(e) = self.scan_directory_recursive(&path) {
                    warn!("Could not scan directory {path:?}: {e}");
                }
            } else if is_supported_audio_file(&path) {
                self.items.push(path);
            }
        }
        Ok(())
    }

    pub fn push_char(&mut self, c: char) {
        self.search_query.push(c);
        self.filter_items();
    }

    pub fn pop_char(&mut self) {
        self.search_query.pop();
        self.filter_items();
    }

    pub fn show_search(&mut self) {
        self.search_visible = true;
    }

    pub fn hide_search(&mut self) {
        self.search_visible = false;
    }

    pub fn clear_search(&mut self) {
        self.search_query.clear();
        self.filter_items();
    }

    fn filter_items(&mut self) {
        if self.search_query.is_empty() {
            self.filtered_indices = (0..self.items.len()).collect();
        } else {
            let mut scored: Vec<(usize, i64)> = self
                .items
                .iter()
                .enumerate()
                .filter_map(|(idx, item)| {
                    let name = item.file_name().and_then(|n| n.to_str())?;
                    self.matcher
                        .fuzzy_match(name, &self.search_query)
                        .map(|score| (idx, score))
                })
                .collect();
            scored.sort_by(|a, b| b.1.cmp(&a.1));
            self.filtered_indices = scored.into_iter().map(|(idx, _)| idx).collect();
        }

        if self.selected >= self.filtered_indices.len() {
            self.selected = 0;
        }
    }

    pub fn select_next(&mut self) {
        if !self.filtered_indices.is_empty() {
            self.selected = (self.selected + 1) % self.filtered_indices.len();
        }
    }

    pub fn select_previous(&mut self) {
        if !self.filtered_indices.is_empty() {
            self.selected = self
                .selected
                .checked_sub(1)
                .unwrap_or(self.filtered_indices.len() - 1);
        }
    }

    pub fn get_selected_path(&self) -> Option<&Path> {
        self.filtered_indices
            .get(self.selected)
            .map(|&idx| self.items[idx].as_path())
    }
}

fn is_supported_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.as_str()))
}

pub fn draw_browser(f: &mut Frame, area: Rect, browser: &Browser) {
    // Centered overlay covering most of the screen
    let overlay = centered_rect(80, 80, area);
    f.render_widget(Clear, overlay);

    let constraints = if browser.search_visible {
        vec![Constraint::Length(3), Constraint::Min(3)]
    } else {
        vec![Constraint::Min(3)]
    };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(overlay);

    if browser.search_visible {
        let search = Paragraph::new(Line::from(vec![
            Span::styled("/ ", Style::default().fg(Color::Yellow)),
            Span::raw(browser.search_query.as_str()),
        ]))
        .block(Block::default().borders(Borders::ALL).title(" Search "));
        f.render_widget(search, chunks[0]);
    }

    let list_area = if browser.search_visible {
        chunks[1]
    } else {
        chunks[0]
    };

    let items: Vec<ListItem> = browser
        .filtered_indices
        .iter()
        .map(|&idx| {
            let name = browser.items[idx]
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("?");
            ListItem::new(name.to_string())
        })
        .collect();

    let title = format!(" Tracks ({}) ", browser.filtered_indices.len());
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▶ ");

    let mut state = ListState::default();
    state.select(
        (!browser.filtered_indices.is_empty()).then_some(browser.selected),
    );
    f.render_stateful_widget(list, list_area, &mut state);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);
    horizontal[1]
}
