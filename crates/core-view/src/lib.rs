//! View model: display modes, column layout and screen-line assembly.
//!
//! Each stat mode is an ordered column table with width bounds, alignment
//! and display-filter pipelines. The tables are immutable configuration
//! built once at startup; only the effective column widths change, on
//! resize. Rendering maps the stat table to a flat list of screen lines
//! that the coordinator scrolls over.

use std::collections::BTreeMap;

use unicode_width::UnicodeWidthStr;

use core_stat::{ProxyServices, ServiceRecord, Value};

pub mod filters;

mod bars;
pub use bars::StatusBar;

use filters::{human_binary, human_metric, human_seconds, trim};

/// Minimum and maximum screen rectangle the dashboard operates in.
pub const SCREEN_XMIN: usize = 78;
pub const SCREEN_YMIN: usize = 20;
pub const SCREEN_XMAX: usize = 200;
pub const SCREEN_YMAX: usize = 100;
/// Fixed row of the column header bar.
pub const SCREEN_HPOS: usize = 11;

/// Display mode identifiers. The numeric value is the hotkey digit; HELP is
/// reachable only via `h`/`?`, CLI only when the session is writable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeId {
    Help = 0,
    Status = 1,
    Traffic = 2,
    Http = 3,
    Errors = 4,
    Cli = 5,
}

impl ModeId {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(idx: usize) -> Option<ModeId> {
        match idx {
            0 => Some(ModeId::Help),
            1 => Some(ModeId::Status),
            2 => Some(ModeId::Traffic),
            3 => Some(ModeId::Http),
            4 => Some(ModeId::Errors),
            5 => Some(ModeId::Cli),
            _ => None,
        }
    }

    /// True for the scrollable stat table modes (1-4).
    pub fn is_stat(self) -> bool {
        matches!(
            self,
            ModeId::Status | ModeId::Traffic | ModeId::Http | ModeId::Errors
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

/// Display-filter pipeline entry; re-derives the cell text from the raw
/// counter.
pub type NumFilter = fn(i64) -> String;

/// One column of a stat mode. `maxwidth == 0` means unbounded.
pub struct Column {
    pub field: usize,
    pub header: &'static str,
    pub minwidth: usize,
    pub maxwidth: usize,
    pub align: Align,
    pub always: &'static [NumFilter],
    pub ondemand: &'static [NumFilter],
    width: usize,
}

const METRIC: &[NumFilter] = &[human_metric];
const BINARY: &[NumFilter] = &[human_binary];
const SECONDS: &[NumFilter] = &[human_seconds];
const PLAIN: &[NumFilter] = &[];

impl Column {
    fn new(field: usize, header: &'static str, minwidth: usize, maxwidth: usize, align: Align) -> Self {
        Column {
            field,
            header,
            minwidth,
            maxwidth,
            align,
            always: PLAIN,
            ondemand: PLAIN,
            width: minwidth,
        }
    }

    fn ondemand(mut self, pipeline: &'static [NumFilter]) -> Self {
        self.ondemand = pipeline;
        self
    }

    fn always(mut self, pipeline: &'static [NumFilter]) -> Self {
        self.always = pipeline;
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    fn set_width(&mut self, n: usize) {
        let mut w = n.max(self.minwidth);
        if self.maxwidth > 0 {
            w = w.min(self.maxwidth);
        }
        self.width = w;
    }
}

/// One display mode: name plus its column table.
pub struct Mode {
    pub id: ModeId,
    pub name: &'static str,
    pub columns: Vec<Column>,
}

impl Mode {
    /// Re-distribute column widths for the given terminal width.
    ///
    /// The excess over [`SCREEN_XMIN`] is spread evenly, the rounding
    /// remainder goes one column at a time from the left, and every result
    /// is clamped into the column's bounds.
    pub fn sync(&mut self, xmax: usize) {
        let ncols = self.columns.len();
        for idx in 0..ncols {
            let minwidth = self.columns[idx].minwidth;
            let mut width = minwidth;
            if xmax > SCREEN_XMIN && ncols > 0 {
                let xdiff = xmax - SCREEN_XMIN;
                width += xdiff / ncols;
                if idx < xdiff % ncols {
                    width += 1;
                }
            }
            self.columns[idx].set_width(width);
        }
    }

    /// Column header line.
    pub fn head(&self) -> String {
        let cells: Vec<String> = self
            .columns
            .iter()
            .map(|col| get_cell(col.width, col.align, col.header))
            .collect();
        cells.join(" ")
    }
}

/// Build the full mode table. Widths start at their minimums; callers sync
/// against the real terminal width before drawing.
pub fn modes() -> Vec<Mode> {
    use core_stat::field::*;
    use Align::{Left, Right};

    vec![
        Mode {
            id: ModeId::Help,
            name: "HELP",
            columns: vec![Column::new(SVNAME, " lbtop online help ", SCREEN_XMIN, 0, Left)],
        },
        Mode {
            id: ModeId::Status,
            name: "STATUS",
            columns: vec![
                Column::new(SVNAME, "NAME", 10, 50, Left),
                Column::new(WEIGHT, "W", 4, 6, Right),
                Column::new(STATUS, "STATUS", 6, 10, Left),
                Column::new(CHECK_STATUS, "CHECK", 7, 20, Left),
                Column::new(ACT, "ACT", 3, 0, Right).ondemand(METRIC),
                Column::new(BCK, "BCK", 3, 0, Right).ondemand(METRIC),
                Column::new(QCUR, "QCUR", 5, 0, Right).ondemand(METRIC),
                Column::new(QMAX, "QMAX", 5, 0, Right).ondemand(METRIC),
                Column::new(SCUR, "SCUR", 6, 0, Right).ondemand(METRIC),
                Column::new(SMAX, "SMAX", 6, 0, Right).ondemand(METRIC),
                Column::new(SLIM, "SLIM", 6, 0, Right).ondemand(METRIC),
                Column::new(STOT, "STOT", 6, 0, Right).ondemand(METRIC),
            ],
        },
        Mode {
            id: ModeId::Traffic,
            name: "TRAFFIC",
            columns: vec![
                Column::new(SVNAME, "NAME", 10, 50, Left),
                Column::new(WEIGHT, "W", 4, 6, Right),
                Column::new(STATUS, "STATUS", 6, 10, Left),
                Column::new(LBTOT, "LBTOT", 8, 0, Right).ondemand(METRIC),
                Column::new(RATE, "RATE", 6, 0, Right).ondemand(METRIC),
                Column::new(RATE_LIM, "RLIM", 6, 0, Right).ondemand(METRIC),
                Column::new(RATE_MAX, "RMAX", 6, 0, Right).ondemand(METRIC),
                Column::new(BIN, "BIN", 12, 0, Right).always(BINARY),
                Column::new(BOUT, "BOUT", 12, 0, Right).always(BINARY),
            ],
        },
        Mode {
            id: ModeId::Http,
            name: "HTTP",
            columns: vec![
                Column::new(SVNAME, "NAME", 10, 50, Left),
                Column::new(WEIGHT, "W", 4, 6, Right),
                Column::new(STATUS, "STATUS", 6, 10, Left),
                Column::new(REQ_RATE, "RATE", 5, 0, Right).ondemand(METRIC),
                Column::new(REQ_RATE_MAX, "RMAX", 5, 0, Right).ondemand(METRIC),
                Column::new(REQ_TOT, "RTOT", 7, 0, Right).ondemand(METRIC),
                Column::new(HRSP_1XX, "1xx", 5, 0, Right).ondemand(METRIC),
                Column::new(HRSP_2XX, "2xx", 5, 0, Right).ondemand(METRIC),
                Column::new(HRSP_3XX, "3xx", 5, 0, Right).ondemand(METRIC),
                Column::new(HRSP_4XX, "4xx", 5, 0, Right).ondemand(METRIC),
                Column::new(HRSP_5XX, "5xx", 5, 0, Right).ondemand(METRIC),
                Column::new(HRSP_OTHER, "?xx", 5, 0, Right).ondemand(METRIC),
            ],
        },
        Mode {
            id: ModeId::Errors,
            name: "ERRORS",
            columns: vec![
                Column::new(SVNAME, "NAME", 10, 50, Left),
                Column::new(WEIGHT, "W", 4, 6, Right),
                Column::new(STATUS, "STATUS", 6, 10, Left),
                Column::new(CHECK_STATUS, "CHECK", 7, 20, Left),
                Column::new(CHKFAIL, "CF", 3, 0, Right).ondemand(METRIC),
                Column::new(CHKDOWN, "CD", 3, 0, Right).ondemand(METRIC),
                Column::new(LASTCHG, "CL", 3, 0, Right).always(SECONDS),
                Column::new(ECON, "ECONN", 5, 0, Right).ondemand(METRIC),
                Column::new(EREQ, "EREQ", 5, 0, Right).ondemand(METRIC),
                Column::new(ERESP, "ERSP", 5, 0, Right).ondemand(METRIC),
                Column::new(DREQ, "DREQ", 5, 0, Right).ondemand(METRIC),
                Column::new(DRESP, "DRSP", 5, 0, Right).ondemand(METRIC),
                Column::new(DOWNTIME, "DOWN", 5, 0, Right).always(SECONDS),
            ],
        },
        Mode {
            id: ModeId::Cli,
            name: "CLI",
            columns: vec![Column::new(
                SVNAME,
                " admin socket command line                          use ALT-n / ESC-n to escape",
                SCREEN_XMIN,
                0,
                Left,
            )],
        },
    ]
}

/// Pad `value` into a `width`-column cell honoring the alignment.
pub fn get_cell(width: usize, align: Align, value: &str) -> String {
    let pad = width.saturating_sub(UnicodeWidthStr::width(value));
    match align {
        Align::Left => format!("{value}{}", " ".repeat(pad)),
        Align::Right => format!("{}{value}", " ".repeat(pad)),
        Align::Center => {
            let left = pad / 2;
            format!("{}{value}{}", " ".repeat(left), " ".repeat(pad - left))
        }
    }
}

/// Render one stat row under the given mode's column table.
pub fn get_screenline(mode: &Mode, record: &ServiceRecord) -> String {
    let mut cells = Vec::with_capacity(mode.columns.len());
    for col in &mode.columns {
        let value = record.get(col.field);
        let mut text = match value {
            Value::Count(n) => {
                let mut t = n.to_string();
                for f in col.always {
                    t = f(*n);
                }
                t
            }
            Value::Text(t) => t.clone(),
        };
        if UnicodeWidthStr::width(text.as_str()) > col.width {
            if let Value::Count(n) = value {
                for f in col.ondemand {
                    text = f(*n);
                }
            }
        }
        let text = trim(&text, col.width);
        cells.push(get_cell(col.width, col.align, &text));
    }
    cells.join(" ")
}

/// One line of the scrollable body: either a stat row (rendered on demand
/// so mode switches do not rebuild the list) or literal text.
#[derive(Debug, Clone, Default)]
pub struct ScreenLine {
    pub stat: Option<ServiceRecord>,
    pub text: String,
    pub bold: bool,
}

impl ScreenLine {
    pub fn text(text: String) -> Self {
        ScreenLine {
            stat: None,
            text,
            bold: false,
        }
    }

    pub fn heading(text: String) -> Self {
        ScreenLine {
            stat: None,
            text,
            bold: true,
        }
    }

    pub fn stat(record: ServiceRecord) -> Self {
        ScreenLine {
            stat: Some(record),
            text: String::new(),
            bold: false,
        }
    }
}

/// Flatten the stat table into screen lines: per proxy a bold
/// `>>> <pxname>` heading, the frontend aggregate, servers by ascending id,
/// the backend aggregate, then a blank separator (trailing one removed).
pub fn get_screenlines(stat: &BTreeMap<i64, ProxyServices>) -> Vec<ScreenLine> {
    let mut lines = Vec::new();
    for services in stat.values() {
        let Some(first) = services.values().next() else {
            continue;
        };
        lines.push(ScreenLine::heading(format!(">>> {}", first.pxname())));
        for record in services.values() {
            lines.push(ScreenLine::stat(record.clone()));
        }
        lines.push(ScreenLine::default());
    }
    if lines.len() > 1 {
        lines.pop();
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_stat::{parse_stat, ServiceKey, FIELD_COUNT};
    use proptest::prelude::*;

    fn csv_line(cells: &[(&str, &str)]) -> String {
        let mut fields = vec![String::new(); FIELD_COUNT];
        for (name, value) in cells {
            let idx = core_stat::field_index(name).expect("known field");
            fields[idx] = (*value).to_string();
        }
        let mut line = fields.join(",");
        line.push(',');
        line
    }

    fn sample_stat() -> BTreeMap<i64, ProxyServices> {
        let lines = vec![
            csv_line(&[
                ("pxname", "web"),
                ("svname", "FRONTEND"),
                ("iid", "1"),
                ("sid", "0"),
                ("type", "0"),
                ("status", "OPEN"),
            ]),
            csv_line(&[
                ("pxname", "web"),
                ("svname", "app2"),
                ("iid", "1"),
                ("sid", "2"),
                ("type", "2"),
                ("status", "UP"),
                ("weight", "100"),
            ]),
            csv_line(&[
                ("pxname", "web"),
                ("svname", "app1"),
                ("iid", "1"),
                ("sid", "1"),
                ("type", "2"),
                ("status", "UP"),
                ("weight", "100"),
            ]),
            csv_line(&[
                ("pxname", "web"),
                ("svname", "BACKEND"),
                ("iid", "1"),
                ("sid", "0"),
                ("type", "1"),
                ("status", "UP"),
            ]),
        ];
        parse_stat(lines).expect("parse").proxies
    }

    fn stat_mode() -> Mode {
        modes().into_iter().nth(1).expect("status mode")
    }

    #[test]
    fn mode_ids_roundtrip() {
        for idx in 0..=5 {
            let id = ModeId::from_index(idx).expect("mode");
            assert_eq!(id.index(), idx);
        }
        assert_eq!(ModeId::from_index(6), None);
    }

    #[test]
    fn base_widths_fill_the_minimum_screen() {
        for mode in modes() {
            if !mode.id.is_stat() {
                continue;
            }
            let widths: usize = mode.columns.iter().map(|c| c.minwidth).sum();
            let seps = mode.columns.len() - 1;
            assert_eq!(widths + seps, SCREEN_XMIN, "mode {}", mode.name);
        }
    }

    #[test]
    fn sync_distributes_excess_left_to_right() {
        let mut mode = stat_mode();
        mode.sync(SCREEN_XMIN + 5);
        // 12 columns, 5 excess: the first five get one extra column each.
        for (idx, col) in mode.columns.iter().enumerate() {
            let expected = col.minwidth + usize::from(idx < 5);
            let expected = if col.maxwidth > 0 {
                expected.min(col.maxwidth)
            } else {
                expected
            };
            assert_eq!(col.width(), expected, "column {idx}");
        }
    }

    proptest! {
        #[test]
        fn sync_respects_bounds_and_screen_width(xmax in SCREEN_XMIN..=SCREEN_XMAX) {
            for mut mode in modes() {
                if !mode.id.is_stat() {
                    continue;
                }
                mode.sync(xmax);
                let mut total = mode.columns.len() - 1; // separators
                for col in &mode.columns {
                    prop_assert!(col.width() >= col.minwidth);
                    if col.maxwidth > 0 {
                        prop_assert!(col.width() <= col.maxwidth);
                    }
                    total += col.width();
                }
                prop_assert!(total <= xmax);
            }
        }
    }

    #[test]
    fn cell_padding_honors_alignment() {
        assert_eq!(get_cell(6, Align::Left, "ab"), "ab    ");
        assert_eq!(get_cell(6, Align::Right, "ab"), "    ab");
        assert_eq!(get_cell(6, Align::Center, "ab"), "  ab  ");
        assert_eq!(get_cell(2, Align::Left, "abc"), "abc");
    }

    #[test]
    fn head_joins_padded_headers() {
        let mut mode = stat_mode();
        mode.sync(SCREEN_XMIN);
        let head = mode.head();
        assert!(head.starts_with("NAME       "), "{head:?}");
        assert!(head.contains(" STATUS "), "{head:?}");
        assert_eq!(head.len(), SCREEN_XMIN);
    }

    #[test]
    fn screenline_applies_ondemand_filter_when_too_wide() {
        let mut mode = stat_mode();
        mode.sync(SCREEN_XMIN);
        let lines = vec![csv_line(&[
            ("pxname", "web"),
            ("svname", "app1"),
            ("iid", "1"),
            ("sid", "1"),
            ("type", "2"),
            ("status", "UP"),
            ("weight", "100"),
            ("stot", "12345678"),
        ])];
        let stat = parse_stat(lines).expect("parse").proxies;
        let rec = &stat[&1][&ServiceKey::Server(1)];
        let line = get_screenline(&mode, rec);
        // stot (min width 6) does not fit as 12345678, shows as 12M.
        assert!(line.contains("12M"), "{line:?}");
        assert!(!line.contains("12345678"), "{line:?}");
    }

    #[test]
    fn screenline_always_filter_applies_unconditionally() {
        let mut mode = modes().into_iter().nth(2).expect("traffic mode");
        mode.sync(SCREEN_XMIN);
        let lines = vec![csv_line(&[
            ("pxname", "web"),
            ("svname", "app1"),
            ("iid", "1"),
            ("sid", "1"),
            ("type", "2"),
            ("status", "UP"),
            ("weight", "100"),
            ("bin", "1024"),
        ])];
        let stat = parse_stat(lines).expect("parse").proxies;
        let rec = &stat[&1][&ServiceKey::Server(1)];
        let line = get_screenline(&mode, rec);
        assert!(line.contains("1.00K"), "{line:?}");
    }

    #[test]
    fn screenlines_follow_render_order() {
        let stat = sample_stat();
        let lines = get_screenlines(&stat);
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0].text, ">>> web");
        assert!(lines[0].bold);
        let svnames: Vec<&str> = lines[1..]
            .iter()
            .map(|l| l.stat.as_ref().expect("stat row").svname())
            .collect();
        assert_eq!(svnames, vec!["FRONTEND", "app1", "app2", "BACKEND"]);
    }

    #[test]
    fn trailing_blank_separator_is_removed() {
        let stat = sample_stat();
        let lines = get_screenlines(&stat);
        let last = lines.last().expect("lines");
        assert!(last.stat.is_some());
    }
}
