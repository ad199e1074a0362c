//! Embedded command-line pane for the admin socket.
//!
//! Output and command history live in bounded rings; the input line is a
//! flat char buffer with a movable caret and a horizontal viewport for
//! overlong input. Session-management commands (`prompt`,
//! `set timeout cli`, `quit`) are denied per `;`-separated statement; the
//! check is word-bounded, so e.g. `promptly` passes. Editing failures are
//! never errors: they surface as diagnostic lines in the output buffer or
//! are silently dropped.

use chrono::Local;
use regex::Regex;
use tracing::debug;

use core_proto::{Console, ProtoError};

use crate::ring::Ring;

pub const CLI_MAXLINES: usize = 1000;
pub const CLI_MAXHIST: usize = 100;
pub const CLI_INPUT_LIMIT: usize = 200;

const CMD_SEP: char = ';';
const DENY_COMMANDS: [&str; 3] = ["prompt", "set timeout cli", "quit"];

const WELCOME_TEXT: &str = "\
             Welcome on the embedded interactive admin-socket shell!

                  Type `help' to get a command reference
";

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '.' | '-' | '+' | ';' | ' ' | '/' | '#' | '%')
}

fn ctime() -> String {
    Local::now().format("%a %b %e %H:%M:%S %Y").to_string()
}

pub struct CliPane {
    obuf: Ring<String>,
    ihist: Ring<Vec<char>>,
    ibuf: Vec<char>,
    ibpos: usize,
    ibmin: usize,
    screenlines: Vec<String>,
    ypos: usize,
    cols: usize,
    ospan: usize,
    deny: Vec<Regex>,
}

impl CliPane {
    pub fn new() -> Result<Self, regex::Error> {
        let deny = DENY_COMMANDS
            .iter()
            .map(|cmd| Regex::new(&format!(r"^\s*{}(\s|$)", regex::escape(cmd))))
            .collect::<Result<Vec<_>, _>>()?;
        let mut obuf = Ring::new(CLI_MAXLINES);
        obuf.extend(WELCOME_TEXT.split('\n').map(|l| l.to_string()));
        let mut pane = CliPane {
            obuf,
            ihist: Ring::new(CLI_MAXHIST),
            ibuf: Vec::new(),
            ibpos: 0,
            ibmin: 0,
            screenlines: Vec::new(),
            ypos: 0,
            cols: 0,
            ospan: 0,
            deny,
        };
        pane.update_screenlines();
        Ok(pane)
    }

    /// Adopt the current terminal geometry and re-wrap the output.
    pub fn resize(&mut self, cols: usize, ospan: usize) {
        self.cols = cols;
        self.ospan = ospan;
        self.update_screenlines();
    }

    // Input viewport geometry: the prompt occupies two columns on the left,
    // the right edge keeps room for the overflow marker.
    fn ispan(&self) -> usize {
        self.cols.saturating_sub(6)
    }

    fn ibmax(&self) -> usize {
        self.ibmin + self.ispan()
    }

    pub fn cmdline(&self) -> String {
        self.ibuf.iter().collect()
    }

    pub fn ypos(&self) -> usize {
        self.ypos
    }

    pub fn screenlines(&self) -> &[String] {
        &self.screenlines
    }

    /// Visible slice of the wrapped output, anchored at `ypos`.
    pub fn output_view(&self) -> &[String] {
        let vmin = self.ypos.saturating_sub(self.ospan);
        let vmax = (vmin + self.ospan).min(self.screenlines.len());
        &self.screenlines[vmin..vmax]
    }

    /// Visible input text plus left/right overflow markers.
    pub fn input_view(&self) -> (String, bool, bool) {
        let end = self.ibmax().min(self.ibuf.len());
        let visible: String = self.ibuf[self.ibmin.min(end)..end].iter().collect();
        (visible, self.ibmin > 0, self.ibuf.len() > self.ibmax())
    }

    /// Caret column relative to the pane's left edge.
    pub fn cursor_x(&self) -> usize {
        2 + (self.ibpos - self.ibmin)
    }

    fn update_screenlines(&mut self) {
        self.screenlines.clear();
        for line in self.obuf.iter() {
            if self.cols > 0 && line.chars().count() > self.cols {
                self.screenlines.extend(wrap_line(line, self.cols));
            } else {
                self.screenlines.push(line.clone());
            }
        }
        // Anchor the latest output at the bottom of the viewport.
        self.ypos = self.screenlines.len();
    }

    pub fn reset_input(&mut self) {
        self.ibuf.clear();
        self.ibpos = 0;
        self.ibmin = 0;
    }

    /// Paste a string at the caret. Rejected wholesale when it would
    /// overflow the input limit or contains disallowed characters.
    pub fn puts(&mut self, s: &str) -> bool {
        let chars: Vec<char> = s.chars().collect();
        if self.ibuf.len() + chars.len() >= CLI_INPUT_LIMIT {
            return false;
        }
        if chars.iter().any(|c| !is_allowed(*c)) {
            return false;
        }
        let n = chars.len();
        self.ibuf.splice(self.ibpos..self.ibpos, chars);
        self.mvc(n as isize);
        true
    }

    /// Type one character at the caret; disallowed input is dropped.
    pub fn putc(&mut self, c: char) {
        if self.ibuf.len() == CLI_INPUT_LIMIT || !is_allowed(c) {
            return;
        }
        if self.ibpos < self.ibuf.len() {
            self.ibuf.insert(self.ibpos, c);
        } else {
            self.ibuf.push(c);
        }
        self.mvc(1);
    }

    /// Delete left (`n < 0`) or right (`n > 0`) of the caret.
    pub fn delc(&mut self, n: isize) {
        if n == 0 || self.ibuf.is_empty() {
            return;
        }
        if n < 0 && self.ibpos >= 1 {
            self.ibuf.remove(self.ibpos - 1);
            self.mvc(-1);
        } else if n > 0 && self.ibpos < self.ibuf.len() {
            self.ibuf.remove(self.ibpos);
        }
    }

    /// Move the caret, scrolling the input viewport when it leaves the
    /// visible span.
    pub fn mvc(&mut self, n: isize) {
        if n == 0 {
            return;
        }
        if n < 0 {
            self.ibpos = self.ibpos.saturating_sub(n.unsigned_abs());
            if self.ibpos < self.ibmin {
                self.ibmin = self.ibpos;
            }
        } else {
            self.ibpos = (self.ibpos + n as usize).min(self.ibuf.len());
            if self.ibpos > self.ibmax() {
                self.ibmin = self.ibpos - self.ispan();
            }
        }
    }

    pub fn mvhome(&mut self) {
        self.ibmin = 0;
        self.ibpos = 0;
    }

    pub fn mvend(&mut self) {
        self.ibmin = self.ibuf.len().saturating_sub(self.ispan());
        self.ibpos = self.ibuf.len();
    }

    /// History backwards. A modified input line is appended to the history
    /// first so it can be recalled.
    pub fn prev(&mut self) {
        if self.ihist.is_empty() {
            return;
        }
        if self.ibuf.is_empty() {
            self.ibuf = self.ihist.last().cloned().unwrap_or_default();
            self.mvend();
            return;
        }
        if self.ihist.last() != Some(&self.ibuf) {
            self.ihist.push_back(self.ibuf.clone());
        }
        self.ihist.rotate_back();
        self.ibuf = self.ihist.last().cloned().unwrap_or_default();
        self.mvend();
    }

    /// History forwards.
    pub fn next(&mut self) {
        if self.ihist.is_empty() {
            return;
        }
        self.ihist.rotate_forward();
        self.ibuf = self.ihist.last().cloned().unwrap_or_default();
        self.mvend();
    }

    /// Scroll the output viewport, clamped to `[ospan, len]`.
    pub fn mvo(&mut self, n: isize) {
        if n < 0 {
            if self.ypos > self.ospan {
                self.ypos = self
                    .ypos
                    .saturating_sub(n.unsigned_abs())
                    .max(self.ospan);
            }
        } else if n > 0 && self.ypos < self.screenlines.len() {
            self.ypos = (self.ypos + n as usize).min(self.screenlines.len());
        }
    }

    /// Page the output viewport by one span.
    pub fn page(&mut self, direction: isize) {
        self.mvo(direction * self.ospan.max(1) as isize);
    }

    /// Run the typed command line: log it, send it, capture the reply.
    pub fn execute<C: Console>(&mut self, console: &mut C) -> Result<(), ProtoError> {
        if self.ibuf.is_empty() {
            self.obuf
                .push_back(format!("- {} {}", ctime(), "-".repeat(50)));
            self.obuf.push_back(String::new());
            self.update_screenlines();
            return Ok(());
        }

        let cmdline = self.cmdline();
        for statement in cmdline.split(CMD_SEP).map(str::trim) {
            if self.deny.iter().any(|re| re.is_match(statement)) {
                self.obuf
                    .push_back(format!("* command not allowed: {statement}"));
                self.obuf.push_back(String::new());
                self.update_screenlines();
                return Ok(());
            }
        }

        self.execute_cmdline(console, &cmdline)?;

        self.ihist.push_back(self.ibuf.clone());
        self.reset_input();
        Ok(())
    }

    /// Send a raw command line and append its reply to the output buffer.
    /// Used by both the Enter path and the admin hotkeys.
    pub fn execute_cmdline<C: Console>(
        &mut self,
        console: &mut C,
        cmdline: &str,
    ) -> Result<(), ProtoError> {
        debug!(target: "cli", cmd = cmdline, "execute");
        self.obuf.push_back(format!("* {}", ctime()));
        self.obuf.push_back(format!("> {cmdline}"));
        let reply = console.execute(cmdline)?;
        self.obuf.extend(reply);
        self.update_screenlines();
        Ok(())
    }
}

/// Greedy word wrap; words longer than the width are hard-split.
fn wrap_line(line: &str, width: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    for word in line.split_whitespace() {
        let mut piece = word.to_string();
        while piece.chars().count() > width {
            if !cur.is_empty() {
                out.push(std::mem::take(&mut cur));
            }
            let head: String = piece.chars().take(width).collect();
            piece = piece.chars().skip(width).collect();
            out.push(head);
        }
        if cur.is_empty() {
            cur = piece;
        } else if cur.chars().count() + 1 + piece.chars().count() <= width {
            cur.push(' ');
            cur.push_str(&piece);
        } else {
            out.push(std::mem::take(&mut cur));
            cur = piece;
        }
    }
    if !cur.is_empty() || out.is_empty() {
        out.push(cur);
    }
    out
}
