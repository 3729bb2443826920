//! Toast presenters
//!
//! The queue decides *when* toasts appear and disappear; a presenter
//! decides *how*. Hosts inject their own; the terminal presenter here
//! backs the demo binary, and the null presenter backs headless use.

use std::io::{self, Write};

use crossterm::style::Stylize;
use thiserror::Error;

use super::Toast;

/// Presenter failure. The queue logs it and keeps its state machine
/// moving; a broken renderer must never wedge notification delivery.
#[derive(Debug, Clone, Error)]
#[error("toast presenter failed: {0}")]
pub struct PresenterError(pub String);

/// Renders batches of toasts.
///
/// `show` receives every card of a batch in one call so the whole batch
/// can appear in the same rendered frame. `hide` and `remove` mirror the
/// staged teardown; presenters that cannot animate may ignore them.
pub trait ToastPresenter: Send + Sync {
    /// Mount and reveal every card of the batch at once.
    fn show(&self, batch: &[Toast]) -> Result<(), PresenterError>;

    /// Start hiding the whole batch together.
    fn hide(&self, _batch: &[Toast]) -> Result<(), PresenterError> {
        Ok(())
    }

    /// Tear the batch down after the hide transition.
    fn remove(&self, _batch: &[Toast]) -> Result<(), PresenterError> {
        Ok(())
    }

    /// Drop anything currently displayed (profile reset).
    fn clear(&self) -> Result<(), PresenterError> {
        Ok(())
    }
}

/// Presenter that renders nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPresenter;

impl ToastPresenter for NullPresenter {
    fn show(&self, _batch: &[Toast]) -> Result<(), PresenterError> {
        Ok(())
    }
}

/// Prints toast cards as styled terminal lines.
///
/// Printed lines cannot be unprinted, so `hide`, `remove` and `clear`
/// are no-ops.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPresenter;

impl ToastPresenter for TerminalPresenter {
    fn show(&self, batch: &[Toast]) -> Result<(), PresenterError> {
        let mut out = io::stdout();
        for toast in batch {
            let line = if toast.body.is_empty() {
                format!("  ◆ {}", toast.title)
            } else {
                format!("  ◆ {}: {}", toast.title, toast.body)
            };
            writeln!(out, "{}", line.dark_yellow().bold())
                .map_err(|e| PresenterError(e.to_string()))?;
        }
        out.flush().map_err(|e| PresenterError(e.to_string()))
    }
}
