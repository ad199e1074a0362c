//! Terminal backend abstraction and crossterm implementation.
//!
//! The dashboard owns the whole terminal while it runs: raw mode, alternate
//! screen, hidden hardware cursor. `TerminalGuard` restores the outer
//! session on drop so early returns and panics cannot leave the terminal
//! raw. Input and resize notifications arrive through [`poll_event`];
//! painting goes through the buffered [`Frame`] flushed once per tick.

use anyhow::Result;
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute, queue,
    style::{Attribute, Print, SetAttribute},
    terminal::{
        disable_raw_mode, enable_raw_mode, BeginSynchronizedUpdate, Clear, ClearType,
        EndSynchronizedUpdate, EnterAlternateScreen, LeaveAlternateScreen,
    },
};
use std::io::{stdout, Write};
use thiserror::Error;

mod input;
pub use input::{poll_event, Key, TermEvent};

pub trait TerminalBackend {
    fn enter(&mut self) -> Result<()>;
    fn leave(&mut self) -> Result<()>;
}

pub struct CrosstermBackend {
    entered: bool,
}

/// RAII guard ensuring terminal state restoration even if caller
/// early-returns or panics.
pub struct TerminalGuard<'a> {
    backend: &'a mut CrosstermBackend,
}

impl Default for CrosstermBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CrosstermBackend {
    pub fn new() -> Self {
        Self { entered: false }
    }

    /// Enter and return a guard that will leave on drop.
    pub fn enter_guard(&mut self) -> Result<TerminalGuard<'_>> {
        self.enter()?;
        Ok(TerminalGuard { backend: self })
    }
}

impl TerminalBackend for CrosstermBackend {
    fn enter(&mut self) -> Result<()> {
        if !self.entered {
            enable_raw_mode()?;
            execute!(stdout(), EnterAlternateScreen, Hide)?;
            self.entered = true;
        }
        Ok(())
    }

    fn leave(&mut self) -> Result<()> {
        if self.entered {
            execute!(stdout(), LeaveAlternateScreen, Show)?;
            disable_raw_mode()?;
            self.entered = false;
        }
        Ok(())
    }
}

impl Drop for CrosstermBackend {
    fn drop(&mut self) {
        let _ = self.leave();
    }
}

impl TerminalGuard<'_> {
    /// Temporarily leave the session (recover cycle); `resume` re-enters.
    pub fn suspend(&mut self) -> Result<()> {
        self.backend.leave()
    }

    pub fn resume(&mut self) -> Result<()> {
        self.backend.enter()
    }
}

impl Drop for TerminalGuard<'_> {
    fn drop(&mut self) {
        let _ = self.backend.leave();
    }
}

/// Allowed screen rectangle; measurement clamps to the maximum and fails
/// below the minimum.
#[derive(Debug, Clone, Copy)]
pub struct SizeLimits {
    pub min_cols: u16,
    pub min_rows: u16,
    pub max_cols: u16,
    pub max_rows: u16,
}

#[derive(Debug, Error)]
#[error("screen too small, need at least {min_cols}x{min_rows}")]
pub struct TooSmall {
    pub min_cols: u16,
    pub min_rows: u16,
}

/// Current terminal size clamped into `limits`.
pub fn measure(limits: SizeLimits) -> Result<(u16, u16)> {
    let (cols, rows) = crossterm::terminal::size()?;
    if cols < limits.min_cols || rows < limits.min_rows {
        return Err(TooSmall {
            min_cols: limits.min_cols,
            min_rows: limits.min_rows,
        }
        .into());
    }
    Ok((cols.min(limits.max_cols), rows.min(limits.max_rows)))
}

/// Text attributes used by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Style {
    #[default]
    Normal,
    Bold,
    Reverse,
    BoldReverse,
}

/// One styled run at an absolute position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub x: u16,
    pub y: u16,
    pub text: String,
    pub style: Style,
}

/// Offscreen paint buffer: all draws of a tick accumulate here and reach
/// the terminal in one flush, so no partial paints are ever visible.
#[derive(Debug, Default)]
pub struct Frame {
    pub cols: u16,
    pub rows: u16,
    runs: Vec<Run>,
    cursor: Option<(u16, u16)>,
}

impl Frame {
    pub fn new(cols: u16, rows: u16) -> Self {
        Frame {
            cols,
            rows,
            runs: Vec::new(),
            cursor: None,
        }
    }

    /// Queue a styled run. Positions outside the frame are dropped and
    /// text is clipped at the right edge; rows never spill over.
    pub fn put(&mut self, x: u16, y: u16, text: &str, style: Style) {
        if y >= self.rows || x >= self.cols || text.is_empty() {
            return;
        }
        let avail = (self.cols - x) as usize;
        let text = if text.chars().count() > avail {
            text.chars().take(avail).collect()
        } else {
            text.to_string()
        };
        self.runs.push(Run { x, y, text, style });
    }

    /// Fill a whole row with a styled blank bar.
    pub fn bar(&mut self, y: u16, style: Style) {
        let text = " ".repeat(self.cols as usize);
        self.put(0, y, &text, style);
    }

    /// Place (and show) the hardware cursor for this frame.
    pub fn set_cursor(&mut self, x: u16, y: u16) {
        self.cursor = Some((x, y));
    }

    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    pub fn cursor(&self) -> Option<(u16, u16)> {
        self.cursor
    }

    /// Plain text of one row, assembled from its runs (test support).
    pub fn row_text(&self, y: u16) -> String {
        let mut chars: Vec<char> = vec![' '; self.cols as usize];
        for run in self.runs.iter().filter(|r| r.y == y) {
            for (i, c) in run.text.chars().enumerate() {
                let x = run.x as usize + i;
                if x < chars.len() {
                    chars[x] = c;
                }
            }
        }
        chars.into_iter().collect()
    }

    /// Flush to the terminal inside a synchronized update.
    pub fn flush(&self) -> Result<()> {
        let mut out = stdout();
        queue!(out, BeginSynchronizedUpdate, Hide, Clear(ClearType::All))?;
        for run in &self.runs {
            queue!(out, MoveTo(run.x, run.y))?;
            match run.style {
                Style::Normal => {}
                Style::Bold => queue!(out, SetAttribute(Attribute::Bold))?,
                Style::Reverse => queue!(out, SetAttribute(Attribute::Reverse))?,
                Style::BoldReverse => queue!(
                    out,
                    SetAttribute(Attribute::Bold),
                    SetAttribute(Attribute::Reverse)
                )?,
            }
            queue!(out, Print(&run.text), SetAttribute(Attribute::Reset))?;
        }
        if let Some((x, y)) = self.cursor {
            queue!(out, MoveTo(x, y), Show)?;
        }
        queue!(out, EndSynchronizedUpdate)?;
        out.flush()?;
        Ok(())
    }
}
