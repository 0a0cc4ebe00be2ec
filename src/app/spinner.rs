//! Progress spinner driven by scan events

use crate::scanner::api::ScanEvent;
use std::io::Write;
use tokio::sync::broadcast;
use tokio::time::{interval, Duration};

const BRAILLE_FRAMES: &[char] = &['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

/// Spinner only when stderr is a terminal and info logging would not interleave
pub fn should_show_spinner() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stderr()) && !log::log_enabled!(log::Level::Info)
}

pub struct ProgressSpinner {
    frame_index: usize,
    message: String,
}

impl ProgressSpinner {
    pub fn new() -> Self {
        Self {
            frame_index: 0,
            message: String::new(),
        }
    }

    /// Status text shown after the spinner frame, `None` for events that keep the current text
    pub fn message_for(event: &ScanEvent) -> Option<String> {
        match event {
            ScanEvent::SessionStarted { scanner_id } => Some(format!("Connecting to {}", scanner_id)),
            ScanEvent::AttemptStarted { feed, fallback: false } => {
                Some(format!("Scanning from {}", feed))
            }
            ScanEvent::AttemptStarted { feed, fallback: true } => {
                Some(format!("Retrying from {}", feed))
            }
            ScanEvent::PageCollected { index, total } => {
                Some(format!("Collected page {}/{}", index, total))
            }
            _ => None,
        }
    }

    pub fn update(&mut self, event: &ScanEvent) {
        if let Some(message) = Self::message_for(event) {
            self.message = message;
        }
    }

    pub fn tick(&mut self) {
        let frame = BRAILLE_FRAMES[self.frame_index];
        self.frame_index = (self.frame_index + 1) % BRAILLE_FRAMES.len();

        eprint!("\r\x1b[2K{} {}", frame, self.message);
        let _ = std::io::stderr().flush();
    }

    pub fn finish(&self) {
        eprint!("\r\x1b[2K");
        let _ = std::io::stderr().flush();
    }
}

impl Default for ProgressSpinner {
    fn default() -> Self {
        Self::new()
    }
}

/// Animate until a terminal scan event, shutdown, or the event channel closes
pub async fn run_spinner(
    mut events: broadcast::Receiver<ScanEvent>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    if !should_show_spinner() {
        return;
    }

    let mut spinner = ProgressSpinner::new();
    let mut update_interval = interval(Duration::from_millis(100));

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            event = events.recv() => match event {
                Ok(event) if event.is_terminal() => break,
                Ok(event) => {
                    spinner.update(&event);
                    spinner.tick();
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = update_interval.tick() => spinner.tick(),
        }
    }
    spinner.finish();
}
