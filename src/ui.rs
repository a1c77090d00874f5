//! Terminal rendering and input.
//!
//! [`UiSurface`] is the controller's view of the screen: one transcript
//! line and one record toggle. [`ConsoleSurface`] renders the transcript
//! in place with a carriage return and prints a status line whenever
//! the toggle changes. [`read_input`] turns stdin lines into controller
//! events from a dedicated thread.

use crossbeam_channel::Sender;
use std::io::{self, BufRead, Write};
use tracing::debug;

use crate::controller::{ControllerEvent, MicButton};

/// Render target driven by the controller.
pub trait UiSurface {
    /// The transcript text changed; replaces anything shown before.
    fn transcript_changed(&mut self, text: &str);

    /// The record toggle's label or enabled state changed.
    fn control_changed(&mut self, button: &MicButton);
}

/// Terminal implementation of [`UiSurface`].
pub struct ConsoleSurface {
    /// True while the transcript line is open and unterminated.
    line_open: bool,
}

impl ConsoleSurface {
    pub fn new() -> Self {
        Self { line_open: false }
    }
}

impl Default for ConsoleSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl UiSurface for ConsoleSurface {
    fn transcript_changed(&mut self, text: &str) {
        // Overwrite the current line and clear to end of line
        print!("\r{}\x1b[K", text);
        let _ = io::stdout().flush();
        self.line_open = true;
    }

    fn control_changed(&mut self, button: &MicButton) {
        if self.line_open {
            println!();
            self.line_open = false;
        }
        if button.is_enabled() {
            println!("[{}] press Enter to toggle, q to quit", button.label().text());
        } else {
            println!("[{}] (waiting)", button.label().text());
        }
        let _ = io::stdout().flush();
    }
}

/// Forward stdin lines to the controller: any line toggles recording,
/// `q` quits. Runs until stdin closes or the controller goes away.
pub fn read_input(events: Sender<ControllerEvent>) {
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };
        match line.trim() {
            "q" | "quit" | "exit" => {
                let _ = events.send(ControllerEvent::Quit);
                break;
            }
            _ => {
                if events.send(ControllerEvent::Toggle).is_err() {
                    break;
                }
            }
        }
    }
    debug!("Input thread exiting");
}
