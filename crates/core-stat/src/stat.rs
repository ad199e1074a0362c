//! `show stat` CSV decoding.

use std::collections::BTreeSet;

use crate::schema::{field, FieldKind, FIELD_COUNT, SCHEMA};
use crate::{ParseError, ServiceKey, ServiceRecord, StatSnapshot, Value};

/// Hard cap on materialized service records per reply.
pub const MAX_SERVICES: usize = 100;

/// Banner appended to the view when the cap is reached.
pub const STAT_LIMIT_WARNING: [&str; 2] = [
    "Warning: You have reached the stat parser limit! (100)",
    "Use --filter to parse specific service stats only.",
];

const COMMENT: char = '#';
const SEP: char = ',';

/// Decode a `show stat` reply.
///
/// Blank lines and `#` comments are skipped; a line qualifies only when it
/// carries at least [`FIELD_COUNT`] separators (the wire format ends each
/// record with a trailing separator, and extras are tolerated past the last
/// field). Past [`MAX_SERVICES`] materialized records only `iid`/`sid`/`type`
/// of further lines are decoded to keep the totals accurate, deduplicated by
/// `(iid, key)`.
pub fn parse_stat<I, S>(lines: I) -> Result<StatSnapshot, ParseError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut snap = StatSnapshot::default();
    // Lazily seeded on the first overflow line.
    let mut seen_keys: Option<BTreeSet<(i64, ServiceKey)>> = None;
    let mut seen_proxies: BTreeSet<i64> = BTreeSet::new();

    for line in lines {
        let line = line.as_ref();
        if line.is_empty() || line.starts_with(COMMENT) {
            continue;
        }
        if line.matches(SEP).count() < FIELD_COUNT {
            continue; // unknown format
        }
        let cells: Vec<&str> = line.splitn(FIELD_COUNT + 1, SEP).collect();

        if snap.svcount >= MAX_SERVICES {
            let seen = seen_keys.get_or_insert_with(|| {
                seen_proxies = snap.proxies.keys().copied().collect();
                snap.proxies
                    .iter()
                    .flat_map(|(iid, svcs)| svcs.keys().map(|k| (*iid, k.clone())))
                    .collect()
            });
            let iid = parse_count(cells[field::IID], "iid")?;
            let sid = parse_count(cells[field::SID], "sid")?;
            let stype = parse_count(cells[field::TYPE], "type")?;
            if seen.insert((iid, service_key(stype, sid))) {
                snap.svcount += 1;
            }
            if seen_proxies.insert(iid) {
                snap.pxcount += 1;
            }
            continue;
        }

        let record = decode_record(&cells)?;
        let iid = record.iid();
        let key = service_key(record.service_type(), record.sid());

        if !snap.proxies.contains_key(&iid) {
            snap.pxcount += 1;
        }
        snap.proxies.entry(iid).or_default().insert(key, record);
        snap.svcount += 1;
    }

    Ok(snap)
}

fn service_key(stype: i64, sid: i64) -> ServiceKey {
    match stype {
        0 => ServiceKey::Frontend,
        1 => ServiceKey::Backend,
        _ => ServiceKey::Server(sid),
    }
}

fn decode_record(cells: &[&str]) -> Result<ServiceRecord, ParseError> {
    let mut values: Vec<Value> = Vec::with_capacity(FIELD_COUNT);
    for (idx, spec) in SCHEMA.iter().enumerate() {
        let raw = cells[idx];
        let value = match spec.kind {
            FieldKind::Count => Value::Count(parse_count(raw, spec.name)?),
            FieldKind::Text => {
                let mut text = raw.to_string();
                if idx == field::STATUS && text == "no check" {
                    text = "-".to_string();
                } else if idx == field::CHECK_STATUS && values[field::STATUS].text() == "-" {
                    text = "none".to_string();
                }
                Value::Text(text)
            }
        };
        values.push(value);
    }
    Ok(ServiceRecord::new(values))
}

fn parse_count(raw: &str, name: &'static str) -> Result<i64, ParseError> {
    if raw.is_empty() {
        return Ok(0);
    }
    raw.parse::<i64>().map_err(|_| ParseError::GarbageField {
        field: name,
        value: raw.to_string(),
    })
}
