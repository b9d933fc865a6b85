//! Terminal module: the narrow "cell grid, colors, live refresh"
//! collaborator spec §1 scopes out of the core. The dashboard view-model
//! (`dashboard`) already computes the full frame; this module's only job is
//! taking over the terminal, drawing that frame, handling resize, and
//! restoring the terminal on exit.
//!
//! Grounded on the pack's `doublegate-ProRT-IP` TUI crate for the
//! raw-mode/alternate-screen lifecycle and restore-on-drop idiom, without
//! its `ratatui` widget layer — `crossterm` is used directly since there is
//! no layout/widget tree to manage, just a grid of pre-computed cells.

use std::io::{self, Write};

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use crossterm::terminal::{Clear, ClearType};
use crossterm::{execute, queue, terminal};

use crate::dashboard::{ColorClass, Frame};
use crate::errors::TerminalError;

/// Terminal color capability, detected once at startup per SPEC_FULL §B:
/// `NO_COLOR` always wins; else `COLORTERM=truecolor|24bit`; else 256-color
/// if `$TERM` contains `256color`; else none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    TrueColor,
    Ansi256,
    None,
}

pub fn detect_color_mode() -> ColorMode {
    if std::env::var_os("NO_COLOR").map(|v| !v.is_empty()).unwrap_or(false) {
        return ColorMode::None;
    }
    if let Ok(colorterm) = std::env::var("COLORTERM") {
        if colorterm == "truecolor" || colorterm == "24bit" {
            return ColorMode::TrueColor;
        }
    }
    if let Ok(term) = std::env::var("TERM") {
        if term.contains("256color") {
            return ColorMode::Ansi256;
        }
    }
    ColorMode::None
}

fn ansi_color(class: ColorClass, mode: ColorMode) -> Option<Color> {
    if mode == ColorMode::None {
        return None;
    }
    Some(match class {
        ColorClass::Dim => Color::DarkGrey,
        ColorClass::Green => Color::Green,
        ColorClass::Yellow => Color::Yellow,
        ColorClass::Orange => Color::DarkYellow,
        ColorClass::Red => Color::Red,
    })
}

/// Owns the terminal's raw-mode/alternate-screen state and restores it on
/// drop, so a panic mid-frame still leaves the user's shell usable.
pub struct Terminal {
    color_mode: ColorMode,
    stdout: io::Stdout,
    active: bool,
}

impl Terminal {
    /// Enters raw mode and the alternate screen. Must be the last thing
    /// started before the render loop and the first thing torn down on
    /// shutdown.
    pub fn enter() -> Result<Self, TerminalError> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, terminal::EnterAlternateScreen, Hide)?;
        Ok(Self { color_mode: detect_color_mode(), stdout, active: true })
    }

    pub fn color_mode(&self) -> ColorMode {
        self.color_mode
    }

    /// Current terminal size `(columns, rows)`.
    pub fn size(&self) -> Result<(u16, u16), TerminalError> {
        Ok(terminal::size()?)
    }

    /// Draws one frame: clears the screen and writes every row, the
    /// sparkline cells, and the problems block.
    pub fn draw(&mut self, frame: &Frame) -> Result<(), TerminalError> {
        queue!(self.stdout, MoveTo(0, 0), Clear(ClearType::All))?;

        for row in &frame.rows {
            queue!(self.stdout, Print(format!("{:>width$} ", row.label, width = frame.layout.label_width)))?;

            for cell in &row.cells {
                if let Some(color) = ansi_color(cell.color, self.color_mode) {
                    queue!(self.stdout, SetForegroundColor(color))?;
                }
                queue!(self.stdout, Print(cell.character()))?;
                if self.color_mode != ColorMode::None {
                    queue!(self.stdout, ResetColor)?;
                }
            }

            queue!(self.stdout, Print(format!(" {}\r\n", row.latency_text)))?;
        }

        if !frame.problems.is_empty() {
            queue!(self.stdout, Print("\r\n"))?;
            for problem in &frame.problems {
                let line = match &problem.label {
                    Some(label) => format!("  \u{2022} {}: {}\r\n", label, problem.message),
                    None => format!("  \u{2022} {}\r\n", problem.message),
                };
                queue!(self.stdout, Print(line))?;
            }
        }

        self.stdout.flush()?;
        Ok(())
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        let _ = execute!(self.stdout, Show, terminal::LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_color_env_var_wins_over_colorterm() {
        std::env::set_var("NO_COLOR", "1");
        std::env::set_var("COLORTERM", "truecolor");
        assert_eq!(detect_color_mode(), ColorMode::None);
        std::env::remove_var("NO_COLOR");
        std::env::remove_var("COLORTERM");
    }

    #[test]
    fn colorterm_truecolor_is_detected_when_no_color_is_unset() {
        std::env::remove_var("NO_COLOR");
        std::env::set_var("COLORTERM", "truecolor");
        assert_eq!(detect_color_mode(), ColorMode::TrueColor);
        std::env::remove_var("COLORTERM");
    }
}
