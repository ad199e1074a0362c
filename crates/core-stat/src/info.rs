//! `show info` key/value decoding.
//!
//! The reply is a list of `Key: value` lines. Every key below must be
//! present; a missing key aborts the refresh.

use std::collections::HashMap;

use regex::Regex;

use crate::ParseError;

/// Process information reported by the remote endpoint.
#[derive(Debug, Clone, Default)]
pub struct InfoSnapshot {
    pub software_name: String,
    pub software_version: String,
    pub software_release: String,
    pub nproc: i64,
    pub procn: i64,
    pub pid: i64,
    pub uptime: String,
    pub maxconn: i64,
    pub curconn: i64,
    pub maxpipes: i64,
    pub curpipes: i64,
    pub tasks: i64,
    pub runqueue: i64,
    pub node: String,
}

/// Compiled field patterns, built once at startup.
pub struct InfoParser {
    patterns: Vec<(&'static str, Regex)>,
}

const PATTERNS: &[(&str, &str)] = &[
    ("software_name", r"^Name:\s*(?P<value>\S+)"),
    ("software_version", r"^Version:\s*(?P<value>\S+)"),
    ("software_release", r"^Release_date:\s*(?P<value>\S+)"),
    ("nproc", r"^Nbproc:\s*(?P<value>\d+)"),
    ("procn", r"^Process_num:\s*(?P<value>\d+)"),
    ("pid", r"^Pid:\s*(?P<value>\d+)"),
    ("uptime", r"^Uptime:\s*(?P<value>[\S ]+)$"),
    ("maxconn", r"^Maxconn:\s*(?P<value>\d+)"),
    ("curconn", r"^CurrConns:\s*(?P<value>\d+)"),
    ("maxpipes", r"^Maxpipes:\s*(?P<value>\d+)"),
    ("curpipes", r"^PipesUsed:\s*(?P<value>\d+)"),
    ("tasks", r"^Tasks:\s*(?P<value>\d+)"),
    ("runqueue", r"^Run_queue:\s*(?P<value>\d+)"),
    ("node", r"^node:\s*(?P<value>\S+)"),
];

impl InfoParser {
    pub fn new() -> Result<Self, regex::Error> {
        let patterns = PATTERNS
            .iter()
            .map(|(key, pattern)| Regex::new(pattern).map(|re| (*key, re)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(InfoParser { patterns })
    }

    pub fn parse<I, S>(&self, lines: I) -> Result<InfoSnapshot, ParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut found: HashMap<&'static str, String> = HashMap::new();
        for line in lines {
            let line = line.as_ref().trim();
            if line.is_empty() {
                continue;
            }
            for (key, re) in &self.patterns {
                if let Some(caps) = re.captures(line) {
                    found.insert(key, caps["value"].to_string());
                    break;
                }
            }
        }

        Ok(InfoSnapshot {
            software_name: take(&mut found, "software_name")?,
            software_version: take(&mut found, "software_version")?,
            software_release: take(&mut found, "software_release")?,
            nproc: take_count(&mut found, "nproc")?,
            procn: take_count(&mut found, "procn")?,
            pid: take_count(&mut found, "pid")?,
            uptime: take(&mut found, "uptime")?,
            maxconn: take_count(&mut found, "maxconn")?,
            curconn: take_count(&mut found, "curconn")?,
            maxpipes: take_count(&mut found, "maxpipes")?,
            curpipes: take_count(&mut found, "curpipes")?,
            tasks: take_count(&mut found, "tasks")?,
            runqueue: take_count(&mut found, "runqueue")?,
            node: take(&mut found, "node")?,
        })
    }
}

fn take(found: &mut HashMap<&'static str, String>, key: &'static str) -> Result<String, ParseError> {
    found.remove(key).ok_or(ParseError::MissingKey(key))
}

fn take_count(
    found: &mut HashMap<&'static str, String>,
    key: &'static str,
) -> Result<i64, ParseError> {
    let raw = take(found, key)?;
    raw.parse::<i64>().map_err(|_| ParseError::GarbageField {
        field: key,
        value: raw,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_reply() -> Vec<String> {
        vec![
            "Name: lbd".to_string(),
            "Version: 1.4.18".to_string(),
            "Release_date: 2011/09/16".to_string(),
            "Nbproc: 1".to_string(),
            "Process_num: 1".to_string(),
            "Pid: 4321".to_string(),
            "Uptime: 0d 2h34m56s".to_string(),
            "Maxconn: 4096".to_string(),
            "CurrConns: 12".to_string(),
            "Maxpipes: 0".to_string(),
            "PipesUsed: 0".to_string(),
            "Tasks: 7".to_string(),
            "Run_queue: 1".to_string(),
            "node: lb01".to_string(),
        ]
    }

    #[test]
    fn parses_full_reply() {
        let parser = InfoParser::new().expect("patterns");
        let info = parser.parse(full_reply()).expect("parse");
        assert_eq!(info.software_name, "lbd");
        assert_eq!(info.software_version, "1.4.18");
        assert_eq!(info.software_release, "2011/09/16");
        assert_eq!(info.pid, 4321);
        assert_eq!(info.procn, 1);
        assert_eq!(info.uptime, "0d 2h34m56s");
        assert_eq!(info.maxconn, 4096);
        assert_eq!(info.curconn, 12);
        assert_eq!(info.tasks, 7);
        assert_eq!(info.runqueue, 1);
        assert_eq!(info.node, "lb01");
    }

    #[test]
    fn missing_key_is_fatal_with_key_name() {
        let parser = InfoParser::new().expect("patterns");
        let reply: Vec<String> = full_reply()
            .into_iter()
            .filter(|l| !l.starts_with("Nbproc:"))
            .collect();
        let err = parser.parse(reply).expect_err("must fail");
        assert_eq!(err.to_string(), "missing \"nproc\" in info data");
    }

    #[test]
    fn unknown_lines_are_ignored() {
        let mut reply = full_reply();
        reply.push("SslFrontendKeyRate: 0".to_string());
        reply.push("".to_string());
        let parser = InfoParser::new().expect("patterns");
        assert!(parser.parse(reply).is_ok());
    }

    #[test]
    fn surrounding_whitespace_is_tolerated() {
        let parser = InfoParser::new().expect("patterns");
        let mut reply = full_reply();
        reply[5] = "  Pid: 99  ".to_string();
        let info = parser.parse(reply).expect("parse");
        assert_eq!(info.pid, 99);
    }
}
