//! Fixed column schema of the `show stat` CSV reply.
//!
//! Columns must stay in wire order; decoding is positional.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Count,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

const fn text(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Text,
    }
}

const fn count(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Count,
    }
}

pub const SCHEMA: &[FieldSpec] = &[
    text("pxname"),          // proxy name
    text("svname"),          // service name (FRONTEND / BACKEND / server)
    count("qcur"),           // current queued requests
    count("qmax"),           // max queued requests
    count("scur"),           // current sessions
    count("smax"),           // max sessions
    count("slim"),           // sessions limit
    count("stot"),           // total sessions
    count("bin"),            // bytes in
    count("bout"),           // bytes out
    count("dreq"),           // denied requests
    count("dresp"),          // denied responses
    count("ereq"),           // request errors
    count("econ"),           // connection errors
    count("eresp"),          // response errors
    count("wretr"),          // retries
    count("wredis"),         // redispatches
    text("status"),          // UP/DOWN/NOLB/MAINT/MAINT(via)...
    count("weight"),         // server weight (server), total weight (backend)
    count("act"),            // active flag (server), active count (backend)
    count("bck"),            // backup flag (server), backup count (backend)
    count("chkfail"),        // failed checks
    count("chkdown"),        // UP->DOWN transitions
    count("lastchg"),        // seconds since last status change
    count("downtime"),       // total downtime seconds
    count("qlimit"),         // queue limit
    count("pid"),            // process id
    count("iid"),            // unique proxy id
    count("sid"),            // service id (unique inside a proxy)
    count("throttle"),       // warm-up status
    count("lbtot"),          // times a server was selected
    text("tracked"),         // tracked proxy/server id
    count("type"),           // 0=frontend, 1=backend, 2=server, 3=socket
    count("rate"),           // sessions per second over the last second
    count("rate_lim"),       // limit on new sessions per second
    count("rate_max"),       // max sessions per second
    text("check_status"),    // status of last health check
    count("check_code"),     // layer 5-7 code, if available
    count("check_duration"), // last health check duration (ms)
    count("hrsp_1xx"),
    count("hrsp_2xx"),
    count("hrsp_3xx"),
    count("hrsp_4xx"),
    count("hrsp_5xx"),
    count("hrsp_other"),
    text("hanafail"),        // failed health check details
    count("req_rate"),       // HTTP requests per second
    count("req_rate_max"),   // max HTTP requests per second
    count("req_tot"),        // total HTTP requests
    count("cli_abrt"),       // transfers aborted by client
    count("srv_abrt"),       // transfers aborted by server
];

pub const FIELD_COUNT: usize = SCHEMA.len();

/// Schema index by field name.
pub fn field_index(name: &str) -> Option<usize> {
    SCHEMA.iter().position(|f| f.name == name)
}

/// Schema indexes of the fields referenced by name across the crates.
pub mod field {
    pub const PXNAME: usize = 0;
    pub const SVNAME: usize = 1;
    pub const QCUR: usize = 2;
    pub const QMAX: usize = 3;
    pub const SCUR: usize = 4;
    pub const SMAX: usize = 5;
    pub const SLIM: usize = 6;
    pub const STOT: usize = 7;
    pub const BIN: usize = 8;
    pub const BOUT: usize = 9;
    pub const DREQ: usize = 10;
    pub const DRESP: usize = 11;
    pub const EREQ: usize = 12;
    pub const ECON: usize = 13;
    pub const ERESP: usize = 14;
    pub const STATUS: usize = 17;
    pub const WEIGHT: usize = 18;
    pub const ACT: usize = 19;
    pub const BCK: usize = 20;
    pub const CHKFAIL: usize = 21;
    pub const CHKDOWN: usize = 22;
    pub const LASTCHG: usize = 23;
    pub const DOWNTIME: usize = 24;
    pub const IID: usize = 27;
    pub const SID: usize = 28;
    pub const LBTOT: usize = 30;
    pub const TYPE: usize = 32;
    pub const RATE: usize = 33;
    pub const RATE_LIM: usize = 34;
    pub const RATE_MAX: usize = 35;
    pub const CHECK_STATUS: usize = 36;
    pub const HRSP_1XX: usize = 39;
    pub const HRSP_2XX: usize = 40;
    pub const HRSP_3XX: usize = 41;
    pub const HRSP_4XX: usize = 42;
    pub const HRSP_5XX: usize = 43;
    pub const HRSP_OTHER: usize = 44;
    pub const REQ_RATE: usize = 46;
    pub const REQ_RATE_MAX: usize = 47;
    pub const REQ_TOT: usize = 48;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_indexes_match_schema() {
        let cases = [
            (field::PXNAME, "pxname"),
            (field::SVNAME, "svname"),
            (field::QCUR, "qcur"),
            (field::QMAX, "qmax"),
            (field::SCUR, "scur"),
            (field::SMAX, "smax"),
            (field::SLIM, "slim"),
            (field::STOT, "stot"),
            (field::BIN, "bin"),
            (field::BOUT, "bout"),
            (field::DREQ, "dreq"),
            (field::DRESP, "dresp"),
            (field::EREQ, "ereq"),
            (field::ECON, "econ"),
            (field::ERESP, "eresp"),
            (field::STATUS, "status"),
            (field::WEIGHT, "weight"),
            (field::ACT, "act"),
            (field::BCK, "bck"),
            (field::CHKFAIL, "chkfail"),
            (field::CHKDOWN, "chkdown"),
            (field::LASTCHG, "lastchg"),
            (field::DOWNTIME, "downtime"),
            (field::IID, "iid"),
            (field::SID, "sid"),
            (field::LBTOT, "lbtot"),
            (field::TYPE, "type"),
            (field::RATE, "rate"),
            (field::RATE_LIM, "rate_lim"),
            (field::RATE_MAX, "rate_max"),
            (field::CHECK_STATUS, "check_status"),
            (field::HRSP_1XX, "hrsp_1xx"),
            (field::HRSP_2XX, "hrsp_2xx"),
            (field::HRSP_3XX, "hrsp_3xx"),
            (field::HRSP_4XX, "hrsp_4xx"),
            (field::HRSP_5XX, "hrsp_5xx"),
            (field::HRSP_OTHER, "hrsp_other"),
            (field::REQ_RATE, "req_rate"),
            (field::REQ_RATE_MAX, "req_rate_max"),
            (field::REQ_TOT, "req_tot"),
        ];
        for (idx, name) in cases {
            assert_eq!(SCHEMA[idx].name, name, "index {idx}");
            assert_eq!(field_index(name), Some(idx));
        }
    }

    #[test]
    fn schema_names_are_unique() {
        for (i, spec) in SCHEMA.iter().enumerate() {
            assert_eq!(field_index(spec.name), Some(i), "duplicate {}", spec.name);
        }
    }
}
