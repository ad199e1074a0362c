//! Display filters for stat cells.
//!
//! Large session/request counters use metric prefixes; byte counters use
//! binary prefixes; durations use the largest time unit whose quotient is at
//! least one. Filters apply per column: `always` pipelines run
//! unconditionally, `ondemand` pipelines only when the plain rendering would
//! not fit the column.

/// Time units, largest first.
const PREFIX_TIME: [(i64, char); 3] = [(60 * 60 * 24, 'd'), (60 * 60, 'h'), (60, 'm')];
/// Metric prefixes (base 1000), largest first.
const PREFIX_METRIC: [(i64, char); 3] = [(1_000_000_000, 'G'), (1_000_000, 'M'), (1_000, 'k')];
/// Binary prefixes (base 1024), largest first.
const PREFIX_BINARY: [(i64, char); 2] = [(1024 * 1024, 'M'), (1024, 'K')];

pub fn human_seconds(n: i64) -> String {
    for (unit, prefix) in PREFIX_TIME {
        if n / unit >= 1 {
            return format!("{}{}", n / unit, prefix);
        }
    }
    format!("{n}s")
}

pub fn human_metric(n: i64) -> String {
    for (unit, prefix) in PREFIX_METRIC {
        if n / unit >= 1 {
            return format!("{}{}", n / unit, prefix);
        }
    }
    n.to_string()
}

pub fn human_binary(n: i64) -> String {
    for (unit, prefix) in PREFIX_BINARY {
        if n / unit >= 1 {
            return format!("{:.2}{}", n as f64 / unit as f64, prefix);
        }
    }
    format!("{n}B")
}

/// Shorten `s` to at most `width` characters, keeping the tail visible.
///
/// The result is exactly `min(len, width)` characters long for `width >= 1`.
pub fn trim(s: &str, width: usize) -> String {
    let len = s.chars().count();
    if len <= width {
        return s.to_string();
    }
    match width {
        0 => String::new(),
        1 => s.chars().take(1).collect(),
        2 | 3 => "...".chars().take(width).collect(),
        _ => {
            let suffix: String = s
                .chars()
                .skip(len - (width - 2))
                .collect();
            format!("..{suffix}")
        }
    }
}
