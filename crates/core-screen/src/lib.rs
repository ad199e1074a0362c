//! Screen coordinator: display state, key routing and painting.
//!
//! The coordinator owns the data plane, the mode/column tables, the
//! embedded CLI and the help pane. Keystrokes and periodic ticks both end
//! up here; per tick the order is data refresh, view rebuild, paint, input.
//! The admin socket is used serially: the data plane and the CLI take turns
//! through the coordinator, never concurrently.

use chrono::Local;
use tracing::{debug, info};

use core_data::{DataError, DataPlane};
use core_proto::{Console, ProtoError};
use core_stat::ServiceRecord;
use core_terminal::{Frame, Key, Style};
use core_view::{
    get_cell, get_screenline, get_screenlines, modes, Align, Mode, ModeId, ScreenLine, StatusBar,
    SCREEN_HPOS, SCREEN_XMIN,
};

mod cli;
mod help;
mod ring;

pub use cli::CliPane;
pub use help::HelpPane;
pub use ring::Ring;

const PRODUCT: &str = "lbtop";

/// Result of routing one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Redraw,
    Quit,
}

/// Central display state machine.
pub struct Screen<C: Console> {
    data: DataPlane<C>,
    modes: Vec<Mode>,
    cmid: ModeId,
    pmid: ModeId,
    cols: usize,
    rows: usize,
    /// Top of the viewport within `lines`.
    vmin: usize,
    /// Cursor row within the viewport.
    cpos: usize,
    lines: Vec<ScreenLine>,
    banners: Vec<String>,
    /// Reverse-video cursor line visible?
    cursor: bool,
    /// Hotkey footer armed?
    hotkeys: bool,
    sb_conn: StatusBar,
    sb_pipe: StatusBar,
    help: HelpPane,
    cli: CliPane,
}

impl<C: Console> Screen<C> {
    pub fn new(data: DataPlane<C>, initial: ModeId, help_text: &str) -> Result<Self, DataError> {
        Ok(Screen {
            data,
            modes: modes(),
            cmid: initial,
            pmid: initial,
            cols: SCREEN_XMIN,
            rows: core_view::SCREEN_YMIN,
            vmin: 0,
            cpos: 0,
            lines: Vec::new(),
            banners: Vec::new(),
            cursor: true,
            hotkeys: false,
            sb_conn: StatusBar::default(),
            sb_pipe: StatusBar::default(),
            help: HelpPane::new(help_text),
            cli: CliPane::new().map_err(DataError::Pattern)?,
        })
    }

    // ---- geometry -------------------------------------------------------

    fn hpos(&self) -> usize {
        SCREEN_HPOS
    }

    fn smin(&self) -> usize {
        self.hpos() + 2
    }

    fn smax(&self) -> usize {
        self.rows - 3
    }

    /// Scrollable rows of the stat body minus one (cursor range).
    fn span(&self) -> usize {
        self.smax() - self.smin()
    }

    fn cmax(&self) -> usize {
        self.span().min(self.lines.len().saturating_sub(1))
    }

    fn vpos(&self) -> usize {
        self.vmin + self.cpos
    }

    fn vmax(&self) -> usize {
        (self.vmin + self.span()).min(self.lines.len().saturating_sub(1))
    }

    /// Stat record under the cursor, if the cursor line is a stat row.
    fn cstat(&self) -> Option<&ServiceRecord> {
        self.lines.get(self.vpos()).and_then(|l| l.stat.as_ref())
    }

    pub fn mode(&self) -> ModeId {
        self.cmid
    }

    pub fn data(&self) -> &DataPlane<C> {
        &self.data
    }

    pub fn cli(&self) -> &CliPane {
        &self.cli
    }

    // ---- lifecycle ------------------------------------------------------

    /// Adopt a new terminal size: re-sync the current mode's columns and
    /// re-wrap the CLI output.
    pub fn resize(&mut self, cols: usize, rows: usize) {
        self.cols = cols;
        self.rows = rows;
        let ospan = self.span() - 1;
        self.modes[self.cmid.index()].sync(cols);
        self.cli.resize(cols, ospan);
        debug!(target: "screen", cols, rows, "resized");
    }

    /// Poll the data plane; warnings become pending banners.
    pub fn update_data(&mut self) -> Result<(), DataError> {
        self.data.update_info()?;
        if let Some(warning) = self.data.update_stat()? {
            info!(target: "screen", %warning, "refresh warning");
            self.banners.push(warning.to_string());
        }
        if let Some(snapshot) = self.data.info() {
            self.sb_conn.update_max(snapshot.maxconn);
            self.sb_conn.update_cur(snapshot.curconn);
            self.sb_pipe.update_max(snapshot.maxpipes);
            self.sb_pipe.update_cur(snapshot.curpipes);
        }
        Ok(())
    }

    /// Rebuild the scrollable line list from the last refresh. Pending
    /// banners take over the body (centered, cursor hidden) until the next
    /// successful refresh replaces them.
    pub fn update_lines(&mut self) {
        if !self.banners.is_empty() {
            self.mvhome();
            self.lines = self
                .banners
                .drain(..)
                .flat_map(|b| {
                    b.lines()
                        .map(|l| ScreenLine::text(get_cell(SCREEN_XMIN, Align::Center, l)))
                        .collect::<Vec<_>>()
                })
                .collect();
            self.cursor = false;
            return;
        }
        if !self.cursor {
            self.cursor = true;
        }

        self.lines = get_screenlines(self.data.stat());
        if self.data.truncated() {
            self.lines.push(ScreenLine::default());
            for line in core_stat::STAT_LIMIT_WARNING {
                self.lines.push(ScreenLine::text(line.to_string()));
            }
        }

        // The line list may have shrunk under the viewport.
        let maxvmin = self.lines.len().saturating_sub(self.span() + 1);
        self.vmin = self.vmin.min(maxvmin);
        self.cpos = self.cpos.min(self.cmax());
    }

    // ---- mode switching -------------------------------------------------

    pub fn switch_mode(&mut self, mid: ModeId) {
        if mid == ModeId::Cli && self.data.console().read_only() {
            return;
        }
        self.modes[mid.index()].sync(self.cols);
        self.pmid = self.cmid;
        self.cmid = mid;
        debug!(target: "screen", mode = ?mid, "mode switched");
    }

    /// Jump back to the previous mode.
    pub fn toggle_mode(&mut self) {
        if self.pmid == self.cmid {
            return;
        }
        self.switch_mode(self.pmid);
    }

    /// Cycle through the stat modes (and the CLI when writable), wrapping
    /// at the border. From HELP the cycle always lands on STATUS.
    pub fn cycle_mode(&mut self, n: isize) {
        if n == 0 {
            return;
        }
        let border = if self.data.console().read_only() { 4 } else { 5 };
        let idx = self.cmid.index();
        let target = if idx == 0 {
            1
        } else if n < 0 && idx == 1 {
            border
        } else if n > 0 && idx == border {
            1
        } else {
            idx.saturating_add_signed(n)
        };
        if let Some(mid) = ModeId::from_index(target) {
            self.switch_mode(mid);
        }
    }

    // ---- cursor / viewport movement -------------------------------------

    /// Move the cursor, then the viewport once the cursor hits its bound.
    pub fn mvc(&mut self, n: isize) {
        if n == 0 {
            return;
        }
        if n > 0 {
            let step = n as usize;
            if self.cpos < self.cmax() {
                self.cpos = (self.cpos + step).min(self.cmax());
                return;
            }
            let maxvmin = self.lines.len().saturating_sub(self.span() + 1);
            if self.cpos == self.cmax() && self.vmin < maxvmin {
                self.vmin = (self.vmin + step).min(maxvmin);
            }
        } else {
            let step = n.unsigned_abs();
            if self.cpos > 0 {
                self.cpos = self.cpos.saturating_sub(step);
                return;
            }
            if self.vmin > 0 {
                self.vmin = self.vmin.saturating_sub(step);
            }
        }
    }

    pub fn mvhome(&mut self) {
        self.cpos = 0;
        self.vmin = 0;
    }

    pub fn mvend(&mut self) {
        self.cpos = self.cmax();
        self.vmin = self.lines.len().saturating_sub(self.span() + 1);
    }

    // ---- key routing ----------------------------------------------------

    /// Route one key in the current mode.
    pub fn handle_key(&mut self, key: Key) -> Result<Outcome, ProtoError> {
        let mut overlay_cleared = false;
        if self.hotkeys {
            let admin_key = matches!(key, Key::F(4..=10));
            if !admin_key {
                self.hotkeys = false;
                overlay_cleared = true;
                if key == Key::Enter {
                    return Ok(Outcome::Redraw);
                }
            }
        }

        match key {
            Key::CtrlC => return Ok(Outcome::Quit),
            Key::Tab => {
                self.cycle_mode(1);
                return Ok(Outcome::Redraw);
            }
            Key::BackTab => {
                self.cycle_mode(-1);
                return Ok(Outcome::Redraw);
            }
            Key::Alt(c) => return Ok(self.switch_key(c)),
            Key::Char(c) if self.cmid != ModeId::Cli && "qQHh?12345".contains(c) => {
                return Ok(self.switch_key(c));
            }
            _ => {}
        }

        let outcome = match self.cmid {
            ModeId::Help => self.route_help(key),
            ModeId::Cli => self.route_cli(key)?,
            _ => self.route_stat(key)?,
        };
        if outcome == Outcome::Continue && overlay_cleared {
            return Ok(Outcome::Redraw);
        }
        Ok(outcome)
    }

    /// Handle an Escape prefix: a following digit (or `h`/`q`) switches
    /// modes, a bare or doubled Escape jumps back to the previous mode.
    pub fn handle_escape(&mut self, follow: Option<Key>) -> Outcome {
        match follow {
            None | Some(Key::Esc) => {
                self.toggle_mode();
                Outcome::Redraw
            }
            Some(Key::Char(c)) if "qQHh?12345".contains(c) => self.switch_key(c),
            Some(_) => Outcome::Continue,
        }
    }

    fn switch_key(&mut self, c: char) -> Outcome {
        if c == 'q' || c == 'Q' {
            return Outcome::Quit;
        }
        let target = match c {
            'h' | 'H' | '?' => ModeId::Help,
            '1'..='5' => match ModeId::from_index(c as usize - '0' as usize) {
                Some(mid) => mid,
                None => return Outcome::Continue,
            },
            _ => return Outcome::Continue,
        };
        if target == self.cmid {
            return Outcome::Continue;
        }
        self.switch_mode(target);
        Outcome::Redraw
    }

    fn route_help(&mut self, key: Key) -> Outcome {
        let span = self.span();
        match key {
            Key::Up => self.help.mvc(-1, span),
            Key::Down => self.help.mvc(1, span),
            Key::PageUp => self.help.mvc(-10, span),
            Key::PageDown => self.help.mvc(10, span),
            Key::Home => self.help.mvhome(),
            Key::End => self.help.mvend(span),
            _ => return Outcome::Continue,
        }
        Outcome::Redraw
    }

    fn route_cli(&mut self, key: Key) -> Result<Outcome, ProtoError> {
        match key {
            Key::Enter => self.cli.execute(self.data.console_mut())?,
            Key::Left => self.cli.mvc(-1),
            Key::Right => self.cli.mvc(1),
            Key::Home => self.cli.mvhome(),
            Key::End => self.cli.mvend(),
            Key::Delete => self.cli.delc(1),
            Key::Backspace => self.cli.delc(-1),
            Key::Up => self.cli.prev(),
            Key::Down => self.cli.next(),
            Key::PageUp => self.cli.page(-1),
            Key::PageDown => self.cli.page(1),
            Key::Char(c) => self.cli.putc(c),
            _ => return Ok(Outcome::Continue),
        }
        Ok(Outcome::Redraw)
    }

    fn route_stat(&mut self, key: Key) -> Result<Outcome, ProtoError> {
        match key {
            Key::Up => self.mvc(-1),
            Key::Down => self.mvc(1),
            Key::PageUp => self.mvc(-10),
            Key::PageDown => self.mvc(10),
            Key::Home => self.mvhome(),
            Key::End => self.mvend(),
            Key::Enter | Key::Char(' ') | Key::F(4..=10) => return self.route_admin(key),
            _ => return Ok(Outcome::Continue),
        }
        Ok(Outcome::Redraw)
    }

    /// Admin actions against the selected server row. Every command runs
    /// through the CLI execute path so the reply lands in its output
    /// buffer; the acted-upon row shows `updating...` until the next
    /// refresh.
    fn route_admin(&mut self, key: Key) -> Result<Outcome, ProtoError> {
        if self.data.console().read_only() {
            return Ok(Outcome::Continue);
        }
        let (iid, sid, pxname, svname, weight) = {
            let Some(stat) = self.cstat() else {
                return Ok(Outcome::Continue);
            };
            (
                stat.iid(),
                stat.sid(),
                stat.pxname().to_string(),
                stat.svname().to_string(),
                stat.weight(),
            )
        };

        if key == Key::Enter {
            self.hotkeys = true;
            return Ok(Outcome::Redraw);
        }

        if iid <= 0 || sid <= 0 {
            return Ok(Outcome::Continue);
        }
        if pxname.is_empty() || svname.is_empty() {
            return Ok(Outcome::Continue);
        }

        if key == Key::Char(' ') {
            if self.cli.puts(&format!("{pxname}/{svname}")) {
                self.switch_mode(ModeId::Cli);
                return Ok(Outcome::Redraw);
            }
            return Ok(Outcome::Continue);
        }

        let cmdline = match key {
            Key::F(4) => format!("set weight {pxname}/{svname} 100%"),
            Key::F(5 | 6) => {
                if weight <= 0 {
                    return Ok(Outcome::Continue);
                }
                let delta = if key == Key::F(5) { 10 } else { 1 };
                format!("set weight {pxname}/{svname} {}", (weight - delta).max(0))
            }
            Key::F(7 | 8) => {
                if weight >= 256 {
                    return Ok(Outcome::Continue);
                }
                let delta = if key == Key::F(7) { 1 } else { 10 };
                format!("set weight {pxname}/{svname} {}", (weight + delta).min(256))
            }
            Key::F(9) => format!("enable server {pxname}/{svname}"),
            Key::F(10) => format!("disable server {pxname}/{svname}"),
            _ => return Ok(Outcome::Continue),
        };

        info!(target: "screen", cmd = %cmdline, "admin action");
        self.cli
            .execute_cmdline(self.data.console_mut(), &cmdline)?;

        let vpos = self.vpos();
        if let Some(stat) = self.lines.get_mut(vpos).and_then(|l| l.stat.as_mut()) {
            stat.message = Some("updating...".to_string());
        }
        Ok(Outcome::Redraw)
    }

    // ---- painting -------------------------------------------------------

    /// Paint the whole screen into an offscreen frame.
    pub fn render(&self) -> Frame {
        let mut frame = Frame::new(self.cols as u16, self.rows as u16);
        self.draw_head(&mut frame);
        self.draw_info(&mut frame);
        self.draw_cols(&mut frame);
        self.draw_mode(&mut frame);
        self.draw_foot(&mut frame);
        frame
    }

    fn draw_head(&self, frame: &mut Frame) {
        frame.bar(0, Style::Reverse);
        let clock = Local::now().format("%a %b %e %H:%M:%S %Y").to_string();
        let x = (self.cols.saturating_sub(clock.len() + 1)) as u16;
        frame.put(x, 0, &clock, Style::BoldReverse);
        let title = format!("{PRODUCT} version {}", env!("CARGO_PKG_VERSION"));
        frame.put(1, 0, &title, Style::BoldReverse);
    }

    fn draw_info(&self, frame: &mut Frame) {
        let Some(info) = self.data.info() else {
            return;
        };
        frame.put(
            2,
            2,
            &format!(
                "{} Version: {}  (released: {})",
                info.software_name, info.software_version, info.software_release
            ),
            Style::Bold,
        );
        frame.put(
            56,
            2,
            &format!("PID: {} (proc {})", info.pid, info.procn),
            Style::Bold,
        );
        let node = if info.node.is_empty() {
            "unknown"
        } else {
            info.node.as_str()
        };
        frame.put(
            2,
            4,
            &format!("       Node: {} (uptime {})", node, info.uptime),
            Style::Normal,
        );
        frame.put(2, 6, &format!("      Pipes: {}", self.sb_pipe), Style::Normal);
        frame.put(
            2,
            7,
            &format!("Connections: {}", self.sb_conn),
            Style::Normal,
        );
        frame.put(
            2,
            9,
            &format!(
                "Procs: {:3}   Tasks: {:5}    Queue: {:5}    Proxies: {:3}   Services: {:4}",
                info.nproc,
                info.tasks,
                info.runqueue,
                self.data.pxcount(),
                self.data.svcount()
            ),
            Style::Normal,
        );
    }

    fn draw_cols(&self, frame: &mut Frame) {
        frame.bar(self.hpos() as u16, Style::BoldReverse);
        let head = self.modes[self.cmid.index()].head();
        frame.put(0, self.hpos() as u16, &head, Style::BoldReverse);
    }

    fn draw_mode(&self, frame: &mut Frame) {
        match self.cmid {
            ModeId::Help => self.draw_help(frame),
            ModeId::Cli => self.draw_cli(frame),
            _ => self.draw_stat(frame),
        }
    }

    fn draw_help(&self, frame: &mut Frame) {
        let smin = self.smin() as u16;
        for (idx, line) in self.help.visible(self.span() + 1).iter().enumerate() {
            frame.put(1, smin + idx as u16, line, Style::Normal);
        }
    }

    fn draw_cli(&self, frame: &mut Frame) {
        let smin = self.smin() as u16;
        for (idx, line) in self.cli.output_view().iter().enumerate() {
            frame.put(0, smin + idx as u16, line, Style::Normal);
        }
        let input_row = self.smax() as u16;
        frame.put(0, input_row, "> ", Style::Bold);
        let (visible, more_left, more_right) = self.cli.input_view();
        frame.put(2, input_row, &visible, Style::Normal);
        if more_left {
            frame.put(1, input_row, "<", Style::Normal);
        }
        if more_right {
            frame.put((self.cols - 4) as u16, input_row, ">", Style::Normal);
        }
        frame.set_cursor(self.cli.cursor_x() as u16, input_row);
    }

    fn draw_stat(&self, frame: &mut Frame) {
        if self.lines.is_empty() {
            return;
        }
        let mode = &self.modes[self.cmid.index()];
        let smin = self.smin();
        for (idx, line) in self.lines[self.vmin..=self.vmax()].iter().enumerate() {
            let selected = self.cursor && idx == self.cpos;
            let style = match (line.bold, selected) {
                (false, false) => Style::Normal,
                (true, false) => Style::Bold,
                (false, true) => Style::Reverse,
                (true, true) => Style::BoldReverse,
            };
            let text = match &line.stat {
                Some(stat) => match &stat.message {
                    Some(message) => get_cell(self.cols, Align::Left, message),
                    None => get_screenline(mode, stat),
                },
                None => get_cell(self.cols, Align::Left, &line.text),
            };
            frame.put(0, (smin + idx) as u16, &text, style);
        }
    }

    fn draw_foot(&self, frame: &mut Frame) {
        let y = (self.rows - 1) as u16;
        frame.bar(y, Style::Reverse);

        let selected = self.cstat();
        let selected_server = selected
            .map(|s| (s.iid(), s.sid()))
            .filter(|(iid, sid)| *iid > 0 && *sid > 0);

        // Armed hotkey overlay takes over the whole footer.
        if self.hotkeys && self.cmid.is_stat() && selected_server.is_some() {
            frame.put(1, y, "HOTKEYS:", Style::BoldReverse);
            frame.put(
                11,
                y,
                "F4=W-RESET  F5=W-10  F6=W-1  F7=W+1  F8=W+10  F9=ENABLE  F10=DISABLE",
                Style::Reverse,
            );
            return;
        }

        let read_only = self.data.console().read_only();
        let mut x = 0u16;
        for mode in &self.modes {
            if mode.id == ModeId::Help {
                continue;
            }
            if mode.id == ModeId::Cli && read_only {
                continue;
            }
            let label = format!(" {}-{} ", mode.id.index(), mode.name);
            let style = if mode.id == self.cmid {
                Style::Bold
            } else {
                Style::BoldReverse
            };
            frame.put(x, y, &label, style);
            x += label.len() as u16;
        }

        let hint = if self.cmid.is_stat() && selected.is_some() {
            let (iid, sid) = selected.map(|s| (s.iid(), s.sid())).unwrap_or((0, 0));
            if read_only {
                format!("READ-ONLY [#{iid}/#{sid}]")
            } else if selected_server.is_some() {
                format!("ENTER=MENU SPACE=SEL [#{iid}/#{sid}]")
            } else {
                format!("[#{iid}/#{sid}]")
            }
        } else if self.cmid == ModeId::Cli {
            "PGUP/PGDOWN=SCROLL".to_string()
        } else {
            "UP/DOWN=SCROLL H=HELP Q=QUIT".to_string()
        };
        let x = (self.cols.saturating_sub(hint.len() + 1)) as u16;
        frame.put(x, y, &hint, Style::BoldReverse);
    }
}
