use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use color_eyre::Result;
use crossterm::event::{self, Event, KeyCode};
use ratatui::backend::CrosstermBackend;
use ratatui::prelude::*;
use rune_core::{AggregateInventory, InventoryFilter, InventoryView, RegistryStats};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{error, info};

use crate::ui::{draw_ui, UiState};

/// One refresh worth of data for the dashboard.
#[derive(Debug, Clone)]
pub struct WatchFrame {
    pub inventory: AggregateInventory,
    pub stats: RegistryStats,
    pub view: InventoryView,
    pub changed: bool,
    pub refreshed_at: String,
    pub notices: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchCommand {
    RefreshNow,
    ToggleView,
    Quit,
}

pub struct WatchApp {
    terminal: Terminal<CrosstermBackend<std::io::Stdout>>,
    ui_state: UiState,
    frame_receiver: UnboundedReceiver<WatchFrame>,
    command_sender: UnboundedSender<WatchCommand>,
    log_receiver: Receiver<String>,
}

impl WatchApp {
    pub fn new(
        frame_receiver: UnboundedReceiver<WatchFrame>,
        command_sender: UnboundedSender<WatchCommand>,
        log_receiver: Receiver<String>,
        storage_key: String,
        filter: InventoryFilter,
    ) -> Result<Self> {
        let stdout = std::io::stdout();
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        crossterm::terminal::enable_raw_mode()?;
        terminal.clear()?;
        terminal.hide_cursor()?;
        Ok(Self {
            terminal,
            ui_state: UiState::new(storage_key, filter),
            frame_receiver,
            command_sender,
            log_receiver,
        })
    }

    pub fn run(mut self) -> Result<()> {
        let mut last_draw = Instant::now();
        let drawn = self.event_loop(&mut last_draw);

        self.terminal.show_cursor()?;
        crossterm::terminal::disable_raw_mode()?;
        let _ = self.command_sender.send(WatchCommand::Quit);
        drawn
    }

    fn event_loop(&mut self, last_draw: &mut Instant) -> Result<()> {
        loop {
            while let Ok(frame) = self.frame_receiver.try_recv() {
                for notice in &frame.notices {
                    self.ui_state.push_log(format!("notice: {notice}"));
                }
                self.ui_state.push_frame(frame);
            }

            while let Ok(line) = self.log_receiver.try_recv() {
                self.ui_state.push_log(line);
            }

            if last_draw.elapsed() >= Duration::from_millis(100) {
                self.terminal.draw(|frame| draw_ui(frame, &self.ui_state))?;
                *last_draw = Instant::now();
            }

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                        KeyCode::Char('r') => self.send(WatchCommand::RefreshNow),
                        KeyCode::Char('v') => self.send(WatchCommand::ToggleView),
                        _ => {}
                    }
                }
            }
        }
    }

    fn send(&mut self, command: WatchCommand) {
        if let Err(err) = self.command_sender.send(command) {
            error!("Failed to send {:?}: {}", command, err);
            self.ui_state.push_log("refresh loop stopped, press q to exit");
        } else {
            info!(?command, "watch.command");
        }
    }
}
