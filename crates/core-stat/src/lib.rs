//! Typed decoding of the admin-socket stat and info replies.
//!
//! `show stat` replies are CSV with a `#` comment preamble and a fixed
//! column order; `show info` replies are `Key: value` lines. Both decoders
//! are schema-driven: the column schema and the info field patterns are
//! immutable tables built once and carried by the caller, never process
//! globals.

use std::collections::BTreeMap;
use std::fmt;

mod error;
pub mod info;
mod schema;
mod stat;

pub use error::ParseError;
pub use info::{InfoParser, InfoSnapshot};
pub use schema::{field, field_index, FieldKind, FieldSpec, FIELD_COUNT, SCHEMA};
pub use stat::{parse_stat, MAX_SERVICES, STAT_LIMIT_WARNING};

/// One decoded stat cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Count(i64),
}

impl Value {
    pub fn count(&self) -> i64 {
        match self {
            Value::Count(n) => *n,
            Value::Text(_) => 0,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Value::Text(s) => s,
            Value::Count(_) => "",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Count(n) => write!(f, "{n}"),
        }
    }
}

/// Identity of a service row inside its proxy.
///
/// The variant order is deliberate: map iteration over `ServiceKey` yields
/// the frontend aggregate, then servers by ascending id, then the backend
/// aggregate, which is exactly the render order of a proxy block.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ServiceKey {
    Frontend,
    Server(i64),
    Backend,
}

/// One stat row, holding every schema column plus a transient display
/// message (set by the coordinator while an admin command is pending).
#[derive(Debug, Clone)]
pub struct ServiceRecord {
    values: Vec<Value>,
    pub message: Option<String>,
}

impl ServiceRecord {
    pub(crate) fn new(values: Vec<Value>) -> Self {
        debug_assert_eq!(values.len(), FIELD_COUNT);
        ServiceRecord {
            values,
            message: None,
        }
    }

    /// Cell by schema index (see [`field`]).
    pub fn get(&self, idx: usize) -> &Value {
        &self.values[idx]
    }

    pub fn pxname(&self) -> &str {
        self.values[field::PXNAME].text()
    }

    pub fn svname(&self) -> &str {
        self.values[field::SVNAME].text()
    }

    pub fn status(&self) -> &str {
        self.values[field::STATUS].text()
    }

    pub fn check_status(&self) -> &str {
        self.values[field::CHECK_STATUS].text()
    }

    pub fn iid(&self) -> i64 {
        self.values[field::IID].count()
    }

    pub fn sid(&self) -> i64 {
        self.values[field::SID].count()
    }

    pub fn weight(&self) -> i64 {
        self.values[field::WEIGHT].count()
    }

    pub fn service_type(&self) -> i64 {
        self.values[field::TYPE].count()
    }
}

/// Services of one proxy, keyed and ordered for rendering.
pub type ProxyServices = BTreeMap<ServiceKey, ServiceRecord>;

/// Decoded `show stat` reply.
///
/// `svcount`/`pxcount` keep counting past the materialization cap; the
/// `proxies` table holds at most [`MAX_SERVICES`] records.
#[derive(Debug, Clone, Default)]
pub struct StatSnapshot {
    pub proxies: BTreeMap<i64, ProxyServices>,
    pub pxcount: usize,
    pub svcount: usize,
}

impl StatSnapshot {
    /// True when the materialization cap was reached and rows were dropped.
    pub fn truncated(&self) -> bool {
        self.svcount >= MAX_SERVICES
    }
}
