use std::collections::VecDeque;

use ratatui::layout::{Constraint, Direction, Layout, Margin};
use ratatui::prelude::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Row, Table, Wrap};
use ratatui::Frame;

use rune_core::{InventoryFilter, InventoryView};
use rune_runtime::FragmentPart;

use crate::app::WatchFrame;

pub struct UiState {
    pub latest: Option<WatchFrame>,
    pub refreshes: u64,
    pub logs: VecDeque<String>,
    pub max_logs: usize,
    pub storage_key: String,
    pub filter: InventoryFilter,
}

impl UiState {
    pub fn new(storage_key: String, filter: InventoryFilter) -> Self {
        Self {
            latest: None,
            refreshes: 0,
            logs: VecDeque::new(),
            max_logs: 8,
            storage_key,
            filter,
        }
    }

    pub fn push_frame(&mut self, frame: WatchFrame) {
        self.refreshes += 1;
        self.latest = Some(frame);
    }

    pub fn push_log<S: Into<String>>(&mut self, line: S) {
        let mut text: String = line.into();
        while text.ends_with('\n') || text.ends_with('\r') {
            text.pop();
        }
        if text.is_empty() {
            return;
        }
        self.logs.push_front(text);
        while self.logs.len() > self.max_logs {
            self.logs.pop_back();
        }
    }
}

pub fn draw_ui(frame: &mut Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(6),
            Constraint::Min(6),
            Constraint::Length(10),
        ])
        .split(frame.size());

    draw_header(frame, chunks[0], state);
    draw_stats(frame, chunks[1], state);
    draw_inventory(frame, chunks[2], state);
    draw_logs(frame, chunks[3], state);
}

fn inner(area: Rect) -> Rect {
    area.inner(&Margin {
        vertical: 1,
        horizontal: 1,
    })
}

fn draw_header(frame: &mut Frame, area: Rect, state: &UiState) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("Rune Registry [{}]", state.storage_key));
    let status = match &state.latest {
        Some(latest) if latest.changed => {
            Span::styled("updated", Style::default().fg(Color::Green))
        }
        Some(_) => Span::styled("up to date", Style::default().fg(Color::Cyan)),
        None => Span::styled("waiting", Style::default().fg(Color::Yellow)),
    };
    let refreshed = state
        .latest
        .as_ref()
        .map(|latest| latest.refreshed_at.as_str())
        .unwrap_or("-");
    let line = Line::from(vec![
        status,
        Span::raw(format!(" | refreshed {refreshed} ({}x)", state.refreshes)),
        Span::raw(" | r refresh, v toggle view, q exit"),
    ]);
    let text = Paragraph::new(line).wrap(Wrap { trim: true });
    frame.render_widget(block, area);
    frame.render_widget(text, inner(area));
}

fn draw_stats(frame: &mut Frame, area: Rect, state: &UiState) {
    let block = Block::default().borders(Borders::ALL).title("Stats");
    let lines = match &state.latest {
        Some(latest) => {
            let stats = &latest.stats;
            let by_rarity = stats
                .fragments_by_rarity
                .iter()
                .map(|(rarity, count)| format!("{rarity} {count}"))
                .collect::<Vec<_>>()
                .join(" | ");
            vec![
                Line::from(vec![
                    Span::styled("members ", Style::default().fg(Color::Yellow)),
                    Span::raw(format!("{:>5}", stats.members)),
                    Span::styled("  fragments ", Style::default().fg(Color::Yellow)),
                    Span::raw(format!("{:>6}", stats.total_fragments)),
                    Span::styled("  points ", Style::default().fg(Color::Yellow)),
                    Span::raw(format!(
                        "{} (avg {})",
                        stats.total_points, stats.average_points
                    )),
                ]),
                Line::from(vec![
                    Span::styled("pending exchanges ", Style::default().fg(Color::Magenta)),
                    Span::raw(stats.pending_exchanges.to_string()),
                    Span::styled("  corps sets ", Style::default().fg(Color::Magenta)),
                    Span::raw(stats.corps_complete_sets.to_string()),
                ]),
                Line::from(Span::raw(by_rarity)),
            ]
        }
        None => vec![Line::from(Span::raw("no data yet"))],
    };
    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false });
    frame.render_widget(block, area);
    frame.render_widget(paragraph, inner(area));
}

fn draw_inventory(frame: &mut Frame, area: Rect, state: &UiState) {
    let title = match state.latest.as_ref().map(|latest| latest.view) {
        Some(InventoryView::Sparse) => "Inventory (held only)",
        _ => "Inventory",
    };
    let block = Block::default().borders(Borders::ALL).title(title);

    let mut header = vec!["type".to_string(), "rarity".to_string()];
    header.extend(FragmentPart::ALL.iter().map(|part| part.label().to_string()));
    header.push("sets".to_string());
    header.push("holders".to_string());

    let rows: Vec<Row> = state
        .latest
        .iter()
        .flat_map(|latest| latest.inventory.filtered(&state.filter))
        .map(|row| {
            let sets = row.entry.complete_sets();
            let mut cells = vec![row.entry.rune_type().to_string(), row.entry.rarity().to_string()];
            cells.extend(row.entry.fragments().iter().map(|(_, count)| count.to_string()));
            cells.push(sets.to_string());
            cells.push(row.holders.to_string());
            let style = if sets > 0 {
                Style::default().fg(Color::Green)
            } else {
                Style::default()
            };
            Row::new(cells).style(style)
        })
        .collect();

    let widths = [
        Constraint::Length(22),
        Constraint::Length(11),
        Constraint::Length(5),
        Constraint::Length(5),
        Constraint::Length(5),
        Constraint::Length(5),
        Constraint::Length(5),
        Constraint::Length(8),
    ];
    let table = Table::new(rows, widths).header(
        Row::new(header).style(Style::default().add_modifier(Modifier::BOLD)),
    );
    frame.render_widget(block, area);
    frame.render_widget(table, inner(area));
}

fn draw_logs(frame: &mut Frame, area: Rect, state: &UiState) {
    let block = Block::default().borders(Borders::ALL).title("Logs");
    let lines: Vec<Line> = state
        .logs
        .iter()
        .map(|entry| Line::from(Span::raw(entry)))
        .collect();
    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false });
    frame.render_widget(block, area);
    frame.render_widget(paragraph, inner(area));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_buffer_keeps_newest_lines() {
        let mut state = UiState::new("runes".into(), InventoryFilter::default());
        for i in 0..12 {
            state.push_log(format!("line {i}\n"));
        }
        state.push_log("\n");
        assert_eq!(state.logs.len(), 8);
        assert_eq!(state.logs.front().map(String::as_str), Some("line 11"));
    }
}
