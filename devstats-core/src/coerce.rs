//! Raw string → typed value coercion.
//!
//! Every parser here is total: it either yields a value or `None`, and the
//! caller decides which default to keep. Lists are comma separated; empty
//! entries are skipped everywhere.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Tokens that read as `false` even though the variable is non-empty.
const FALSE_TOKENS: &[&str] = &["0", "false", "no", "n", "off"];

/// Truthy-string convention shared by every boolean variable.
///
/// Empty is false; anything else, whitespace included, is true unless it is
/// one of the false tokens (`0`, `false`, `no`, `n`, `off`, case-insensitive,
/// surrounding whitespace ignored).
pub fn parse_bool(raw: &str) -> bool {
    if raw.is_empty() {
        return false;
    }
    let value = raw.trim();
    !FALSE_TOKENS.iter().any(|t| value.eq_ignore_ascii_case(t))
}

/// Base-10 signed integer; `None` for anything unparsable.
pub fn parse_int<T: FromStr>(raw: &str) -> Option<T> {
    raw.trim().parse().ok()
}

/// Integer that must be `>= 0`. Negative or unparsable input yields `None`
/// so the caller keeps its default.
pub fn parse_non_negative(raw: &str) -> Option<u32> {
    let value: i64 = parse_int(raw)?;
    u32::try_from(value).ok()
}

/// Comma separated list of `T`.
///
/// `None` when any entry fails to parse or the input holds only separators.
pub fn parse_list<T: FromStr>(raw: &str) -> Option<Vec<T>> {
    let list = entries(raw)
        .map(|e| e.parse().ok())
        .collect::<Option<Vec<T>>>()?;
    non_empty(list)
}

/// Comma separated list of strings; `None` when there are no entries.
pub fn parse_string_list(raw: &str) -> Option<Vec<String>> {
    non_empty(entries(raw).map(str::to_owned).collect())
}

/// Comma separated set of strings (`repo1,org/repo2` → `{repo1, org/repo2}`).
pub fn parse_string_set(raw: &str) -> BTreeSet<String> {
    entries(raw).map(str::to_owned).collect()
}

/// Signed override set: `+name` force-enables, `-name` force-disables.
///
/// Only the first character is treated as the sign, so `+-pro4` is the key
/// `-pro4` enabled. Unsigned and sign-only entries are dropped; a repeated
/// key keeps its last value.
pub fn parse_signed_overrides(raw: &str) -> BTreeMap<String, bool> {
    let mut overrides = BTreeMap::new();
    for entry in entries(raw) {
        let (enabled, key) = match entry.as_bytes()[0] {
            b'+' => (true, &entry[1..]),
            b'-' => (false, &entry[1..]),
            _ => continue,
        };
        if key.is_empty() {
            continue;
        }
        overrides.insert(key.to_owned(), enabled);
    }
    overrides
}

/// Date or date-time in UTC.
///
/// Accepts `YYYY`, `YYYY-MM`, `YYYY-MM-DD`, `YYYY-MM-DD HH`,
/// `YYYY-MM-DD HH:MM`, `YYYY-MM-DD HH:MM:SS` (space or `T` separated) and
/// RFC 3339.
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    let naive = match value.len() {
        4 => NaiveDate::from_ymd_opt(value.parse().ok()?, 1, 1)?.and_hms_opt(0, 0, 0),
        7 => date_at_midnight(&format!("{value}-01")),
        10 => date_at_midnight(value),
        13 => parse_naive(&format!("{value}:00:00")),
        16 => parse_naive(&format!("{value}:00")),
        _ => parse_naive(value),
    }?;
    Some(Utc.from_utc_datetime(&naive))
}

/// Prepend `prefix` unless `value` already starts with it.
pub fn ensure_prefix(value: &str, prefix: &str) -> String {
    if value.starts_with(prefix) {
        value.to_owned()
    } else {
        format!("{prefix}{value}")
    }
}

/// Append `suffix` unless `value` already ends with it.
pub fn ensure_suffix(value: &str, suffix: &str) -> String {
    if value.ends_with(suffix) {
        value.to_owned()
    } else {
        format!("{value}{suffix}")
    }
}

fn non_empty<T>(list: Vec<T>) -> Option<Vec<T>> {
    (!list.is_empty()).then_some(list)
}

fn entries(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|e| !e.is_empty())
}

fn date_at_midnight(value: &str) -> Option<NaiveDateTime> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()?
        .and_hms_opt(0, 0, 0)
}

fn parse_naive(value: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}
