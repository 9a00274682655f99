//! Cooperative cancellation for the stream viewer.

// ============================================================================
// Imports
// ============================================================================

use std::io;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use tracing::{debug, warn};

// ============================================================================
// CancelSignal
// ============================================================================

/// Non-blocking check for an operator request to stop.
pub trait CancelSignal {
    /// Returns `true` once the loop should stop. Must not block.
    fn is_cancelled(&mut self) -> bool;
}

impl<F> CancelSignal for F
where
    F: FnMut() -> bool,
{
    #[inline]
    fn is_cancelled(&mut self) -> bool {
        self()
    }
}

// ============================================================================
// KeyCancel
// ============================================================================

/// Cancels when a key is pressed on the terminal.
///
/// Raw mode is enabled for the lifetime of the value so a single keypress is
/// seen without Enter. `Esc` and `Ctrl-C` also cancel.
#[derive(Debug)]
pub struct KeyCancel {
    key: char,
}

impl KeyCancel {
    /// Enables raw mode and watches for `key`.
    ///
    /// # Errors
    ///
    /// Returns the terminal error if raw mode cannot be enabled.
    pub fn enable(key: char) -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        debug!(key = %key, "Raw mode enabled");
        Ok(Self { key })
    }

    fn poll(&self) -> io::Result<bool> {
        while event::poll(Duration::ZERO)? {
            let Event::Key(key_event) = event::read()? else {
                continue;
            };
            if key_event.kind != KeyEventKind::Press {
                continue;
            }

            let cancelled = match key_event.code {
                KeyCode::Char(c) if key_event.modifiers.contains(KeyModifiers::CONTROL) => {
                    c == 'c'
                }
                KeyCode::Char(c) => c.eq_ignore_ascii_case(&self.key),
                KeyCode::Esc => true,
                _ => false,
            };
            if cancelled {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl CancelSignal for KeyCancel {
    fn is_cancelled(&mut self) -> bool {
        match self.poll() {
            Ok(cancelled) => cancelled,
            Err(e) => {
                warn!(error = %e, "Terminal input failed, stopping stream");
                true
            }
        }
    }
}

impl Drop for KeyCancel {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            warn!(error = %e, "Failed to restore terminal mode");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
