//! Data plane: owns the most recent info and stat snapshots.
//!
//! A refresh replaces the previous snapshot atomically; partial state is
//! never observable. Registered filters scope `show stat` to specific
//! `(iid, type, sid)` triples; proxy-name filters are resolved to triples
//! once, at registration, never per tick.
//!
//! Non-fatal conditions (remote reconfigured, empty tick) surface as typed
//! warnings for the coordinator to display; everything else propagates as a
//! typed error.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use regex::Regex;
use thiserror::Error;
use tracing::debug;

use core_proto::{Console, ProtoError};
use core_stat::{parse_stat, InfoParser, InfoSnapshot, ParseError, ProxyServices, StatSnapshot};

const STAT_FILTER_PATTERN: &str = r"^(?P<iid>-?\d+)\s+(?P<type>-?\d+)\s+(?P<sid>-?\d+)$";
const PROXY_FILTER_PATTERN: &str = r"^[a-zA-Z0-9_:.\-]+$";

/// Fatal data-plane failures.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("invalid stat filter: {0}")]
    InvalidStatFilter(String),
    #[error("invalid proxy filter: {0}")]
    InvalidProxyFilter(String),
    #[error("proxy not found: {0}")]
    ProxyNotFound(String),
    /// A registered filter no longer matches any proxy on the remote side.
    #[error("stale stat filter: {0} {1} {2}")]
    StaleFilter(i64, i64, i64),
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error(transparent)]
    Proto(#[from] ProtoError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Non-fatal refresh outcomes, rendered as view banners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataWarning {
    NoStatData,
    ConfigChanged { pxdiff: i64, svdiff: i64 },
}

impl fmt::Display for DataWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataWarning::NoStatData => f.write_str("no stat data available"),
            DataWarning::ConfigChanged { pxdiff, svdiff } => write!(
                f,
                "config changed: proxy {pxdiff:+}, service {svdiff:+} (reloading...)"
            ),
        }
    }
}

/// Most recent snapshots plus the registered filter set.
pub struct DataPlane<C: Console> {
    console: C,
    info_parser: InfoParser,
    stat_filter_re: Regex,
    proxy_filter_re: Regex,
    filters: BTreeSet<(i64, i64, i64)>,
    info: Option<InfoSnapshot>,
    stat: BTreeMap<i64, ProxyServices>,
    pxcount: usize,
    svcount: usize,
}

impl<C: Console> DataPlane<C> {
    pub fn new(console: C) -> Result<Self, DataError> {
        Ok(DataPlane {
            console,
            info_parser: InfoParser::new()?,
            stat_filter_re: Regex::new(STAT_FILTER_PATTERN)?,
            proxy_filter_re: Regex::new(PROXY_FILTER_PATTERN)?,
            filters: BTreeSet::new(),
            info: None,
            stat: BTreeMap::new(),
            pxcount: 0,
            svcount: 0,
        })
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn console_mut(&mut self) -> &mut C {
        &mut self.console
    }

    pub fn info(&self) -> Option<&InfoSnapshot> {
        self.info.as_ref()
    }

    pub fn stat(&self) -> &BTreeMap<i64, ProxyServices> {
        &self.stat
    }

    /// Total proxies seen on the last refresh, including non-materialized.
    pub fn pxcount(&self) -> usize {
        self.pxcount
    }

    pub fn svcount(&self) -> usize {
        self.svcount
    }

    /// True when the last refresh hit the materialization cap.
    pub fn truncated(&self) -> bool {
        self.svcount >= core_stat::MAX_SERVICES
    }

    /// Register explicit `(iid, type, sid)` filters, one per entry.
    pub fn register_stat_filter(&mut self, entries: &[String]) -> Result<(), DataError> {
        for entry in entries {
            let caps = self
                .stat_filter_re
                .captures(entry)
                .ok_or_else(|| DataError::InvalidStatFilter(entry.clone()))?;
            // The pattern guarantees integer captures.
            let triple = (
                caps["iid"]
                    .parse()
                    .map_err(|_| DataError::InvalidStatFilter(entry.clone()))?,
                caps["type"]
                    .parse()
                    .map_err(|_| DataError::InvalidStatFilter(entry.clone()))?,
                caps["sid"]
                    .parse()
                    .map_err(|_| DataError::InvalidStatFilter(entry.clone()))?,
            );
            self.filters.insert(triple);
        }
        Ok(())
    }

    /// Resolve proxy names to `(iid, -1, -1)` filters with one unfiltered
    /// `show stat` lookup.
    pub fn register_proxy_filter(&mut self, names: &[String]) -> Result<(), DataError> {
        if names.is_empty() {
            return Ok(());
        }
        for name in names {
            if !self.proxy_filter_re.is_match(name) {
                return Err(DataError::InvalidProxyFilter(name.clone()));
            }
        }

        let lines = self.console.execute("show stat")?;
        let snap = parse_stat(lines)?;

        for name in names {
            let iid = snap
                .proxies
                .iter()
                .find(|(_, services)| {
                    services
                        .values()
                        .next()
                        .is_some_and(|rec| rec.pxname() == name.as_str())
                })
                .map(|(iid, _)| *iid)
                .ok_or_else(|| DataError::ProxyNotFound(name.clone()))?;
            self.filters.insert((iid, -1, -1));
        }
        Ok(())
    }

    /// Refresh the info snapshot.
    pub fn update_info(&mut self) -> Result<(), DataError> {
        let lines = self.console.execute("show info")?;
        self.info = Some(self.info_parser.parse(lines)?);
        Ok(())
    }

    /// Refresh the stat snapshot, honoring registered filters.
    ///
    /// Returns at most one warning per refresh; a zero-proxy tick suppresses
    /// the delta comparison the same way the snapshot replacement suppresses
    /// the previous data.
    pub fn update_stat(&mut self) -> Result<Option<DataWarning>, DataError> {
        let pxcount_old = self.pxcount;
        let svcount_old = self.svcount;

        self.stat = BTreeMap::new();
        self.pxcount = 0;
        self.svcount = 0;

        if self.filters.is_empty() {
            let lines = self.console.execute("show stat")?;
            let snap = parse_stat(lines)?;
            self.pxcount = snap.pxcount;
            self.svcount = snap.svcount;
            self.stat = snap.proxies;
        } else {
            let filters: Vec<_> = self.filters.iter().copied().collect();
            for (iid, ftype, sid) in filters {
                let lines = self
                    .console
                    .execute(&format!("show stat {iid} {ftype} {sid}"))?;
                let snap: StatSnapshot = parse_stat(lines)?;
                if snap.pxcount == 0 {
                    return Err(DataError::StaleFilter(iid, ftype, sid));
                }
                self.pxcount += snap.pxcount;
                self.svcount += snap.svcount;
                self.stat.extend(snap.proxies);
            }
        }

        debug!(
            target: "data",
            proxies = self.pxcount,
            services = self.svcount,
            "stat refreshed"
        );

        if self.pxcount == 0 {
            return Ok(Some(DataWarning::NoStatData));
        }

        // Warn when the remote configuration changed on the fly. Growth only
        // counts when the previous refresh saw data at all.
        let mut pxdiff = 0i64;
        let mut svdiff = 0i64;
        if self.pxcount < pxcount_old {
            pxdiff -= (pxcount_old - self.pxcount) as i64;
        }
        if pxcount_old > 0 && self.pxcount > pxcount_old {
            pxdiff += (self.pxcount - pxcount_old) as i64;
        }
        if self.svcount < svcount_old {
            svdiff -= (svcount_old - self.svcount) as i64;
        }
        if svcount_old > 0 && self.svcount > svcount_old {
            svdiff += (self.svcount - svcount_old) as i64;
        }
        if pxdiff != 0 || svdiff != 0 {
            return Ok(Some(DataWarning::ConfigChanged { pxdiff, svdiff }));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Scripted console: canned reply lines per command, call log kept.
    struct FakeConsole {
        replies: HashMap<String, Vec<String>>,
        pub log: Vec<String>,
    }

    impl FakeConsole {
        fn new() -> Self {
            FakeConsole {
                replies: HashMap::new(),
                log: Vec::new(),
            }
        }

        fn script(mut self, cmd: &str, lines: &[&str]) -> Self {
            self.replies
                .insert(cmd.to_string(), lines.iter().map(|s| s.to_string()).collect());
            self
        }
    }

    impl Console for FakeConsole {
        fn execute(&mut self, cmd: &str) -> Result<Vec<String>, ProtoError> {
            self.log.push(cmd.to_string());
            self.replies
                .get(cmd)
                .cloned()
                .ok_or(ProtoError::UnexpectedEof)
        }

        fn read_only(&self) -> bool {
            false
        }
    }

    fn csv_line(px: &str, sv: &str, iid: i64, sid: i64, stype: i64) -> String {
        let mut cells = vec![String::new(); core_stat::FIELD_COUNT];
        cells[core_stat::field::PXNAME] = px.to_string();
        cells[core_stat::field::SVNAME] = sv.to_string();
        cells[core_stat::field::IID] = iid.to_string();
        cells[core_stat::field::SID] = sid.to_string();
        cells[core_stat::field::TYPE] = stype.to_string();
        let mut line = cells.join(",");
        line.push(',');
        line
    }

    fn proxy_block(px: &str, iid: i64, servers: i64) -> Vec<String> {
        let mut lines = vec![csv_line(px, "FRONTEND", iid, 0, 0)];
        for sid in 1..=servers {
            lines.push(csv_line(px, &format!("srv{sid}"), iid, sid, 2));
        }
        lines.push(csv_line(px, "BACKEND", iid, 0, 1));
        lines
    }

    #[test]
    fn stat_filter_syntax_is_validated() {
        let mut plane = DataPlane::new(FakeConsole::new()).expect("plane");
        plane
            .register_stat_filter(&["1 -1 -1".to_string(), "-1 2 3".to_string()])
            .expect("valid");
        let err = plane
            .register_stat_filter(&["1 2".to_string()])
            .expect_err("must fail");
        assert_eq!(err.to_string(), "invalid stat filter: 1 2");
    }

    #[test]
    fn proxy_filter_resolves_names_once() {
        let mut reply: Vec<&str> = Vec::new();
        let web = proxy_block("web", 1, 1);
        let api = proxy_block("api", 2, 1);
        reply.extend(web.iter().map(|s| s.as_str()));
        reply.extend(api.iter().map(|s| s.as_str()));

        let console = FakeConsole::new().script("show stat", &reply);
        let mut plane = DataPlane::new(console).expect("plane");
        plane
            .register_proxy_filter(&["api".to_string()])
            .expect("resolve");
        assert_eq!(plane.console().log, vec!["show stat"]);

        // Subsequent refreshes use the resolved triple.
        let console = plane.console_mut();
        console.replies.insert(
            "show stat 2 -1 -1".to_string(),
            api.iter().map(|s| s.to_string()).collect(),
        );
        let warning = plane.update_stat().expect("refresh");
        assert_eq!(warning, None);
        assert_eq!(plane.pxcount(), 1);
        assert_eq!(plane.svcount(), 3);
        assert!(plane.stat().contains_key(&2));
    }

    #[test]
    fn unresolved_proxy_name_is_fatal() {
        let web = proxy_block("web", 1, 1);
        let reply: Vec<&str> = web.iter().map(|s| s.as_str()).collect();
        let console = FakeConsole::new().script("show stat", &reply);
        let mut plane = DataPlane::new(console).expect("plane");
        let err = plane
            .register_proxy_filter(&["missing".to_string()])
            .expect_err("must fail");
        assert_eq!(err.to_string(), "proxy not found: missing");
    }

    #[test]
    fn bad_proxy_name_syntax_is_rejected_before_lookup() {
        let mut plane = DataPlane::new(FakeConsole::new()).expect("plane");
        let err = plane
            .register_proxy_filter(&["bad name".to_string()])
            .expect_err("must fail");
        assert!(matches!(err, DataError::InvalidProxyFilter(_)));
    }

    #[test]
    fn stale_filter_is_fatal() {
        let console = FakeConsole::new().script("show stat 1 -1 -1", &[]);
        let mut plane = DataPlane::new(console).expect("plane");
        plane
            .register_stat_filter(&["1 -1 -1".to_string()])
            .expect("register");
        let err = plane.update_stat().expect_err("must fail");
        assert_eq!(err.to_string(), "stale stat filter: 1 -1 -1");
    }

    #[test]
    fn empty_unfiltered_tick_warns_without_data() {
        let console = FakeConsole::new().script("show stat", &[]);
        let mut plane = DataPlane::new(console).expect("plane");
        let warning = plane.update_stat().expect("refresh");
        assert_eq!(warning, Some(DataWarning::NoStatData));
        assert!(plane.stat().is_empty());
    }

    #[test]
    fn shrinking_config_raises_delta_warning() {
        let mut first: Vec<String> = Vec::new();
        for (px, iid) in [("a", 1), ("b", 2), ("c", 3)] {
            first.extend(proxy_block(px, iid, 1));
        }
        let mut second: Vec<String> = Vec::new();
        for (px, iid) in [("a", 1), ("b", 2)] {
            second.extend(proxy_block(px, iid, 1));
        }

        let first_ref: Vec<&str> = first.iter().map(|s| s.as_str()).collect();
        let console = FakeConsole::new().script("show stat", &first_ref);
        let mut plane = DataPlane::new(console).expect("plane");
        assert_eq!(plane.update_stat().expect("first"), None);
        assert_eq!(plane.pxcount(), 3);

        let second_ref: Vec<String> = second;
        plane
            .console_mut()
            .replies
            .insert("show stat".to_string(), second_ref);
        let warning = plane.update_stat().expect("second");
        assert_eq!(
            warning,
            Some(DataWarning::ConfigChanged {
                pxdiff: -1,
                svdiff: -3
            })
        );
        assert_eq!(
            warning.map(|w| w.to_string()),
            Some("config changed: proxy -1, service -3 (reloading...)".to_string())
        );
    }

    #[test]
    fn growth_from_cold_start_does_not_warn() {
        let block = proxy_block("web", 1, 2);
        let reply: Vec<&str> = block.iter().map(|s| s.as_str()).collect();
        let console = FakeConsole::new().script("show stat", &reply);
        let mut plane = DataPlane::new(console).expect("plane");
        // First refresh ever: old counters are zero, growth is expected.
        assert_eq!(plane.update_stat().expect("refresh"), None);
        assert_eq!(plane.pxcount(), 1);
        assert_eq!(plane.svcount(), 4);
    }

    #[test]
    fn update_info_replaces_snapshot() {
        let console = FakeConsole::new().script(
            "show info",
            &[
                "Name: lbd",
                "Version: 1.4.18",
                "Release_date: 2011/09/16",
                "Nbproc: 1",
                "Process_num: 1",
                "Pid: 77",
                "Uptime: 0d 0h01m02s",
                "Maxconn: 2000",
                "CurrConns: 3",
                "Maxpipes: 0",
                "PipesUsed: 0",
                "Tasks: 5",
                "Run_queue: 1",
                "node: lb01",
            ],
        );
        let mut plane = DataPlane::new(console).expect("plane");
        plane.update_info().expect("info");
        assert_eq!(plane.info().map(|i| i.pid), Some(77));
    }
}
