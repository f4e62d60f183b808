//! Value normalization for loosely typed source rows.
//!
//! Source relations store quantities as text with thousands separators, leave cells empty,
//! and use two different date layouts (`YYYY-MM-DD` for trade relations, `YYYY/MM/DD` for the
//! general ledger). Everything here is total: malformed input degrades to zero or to a
//! best-effort string instead of failing.

use chrono::{Duration, NaiveDate};
use serde_json::Value;

const ISO_FORMAT: &str = "%Y-%m-%d";
const STORAGE_FORMAT: &str = "%Y/%m/%d";

/// Coerces a raw cell into a number. Null, empty and unparseable cells yield `0.0`.
pub fn parse_amount(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(number)) => finite_or_zero(number.as_f64().unwrap_or(0.0)),
        Some(Value::String(text)) => parse_amount_str(text),
        _ => 0.0,
    }
}

/// Coerces a row identifier. Integer cells and integer text parse exactly; any other shape
/// goes through [`parse_amount`] and is truncated.
pub fn parse_id(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(number)) => number
            .as_i64()
            .unwrap_or_else(|| parse_amount(value) as i64),
        Some(Value::String(text)) => {
            let cleaned: String = text
                .chars()
                .filter(|c| *c != ',' && !c.is_whitespace())
                .collect();
            cleaned
                .parse::<i64>()
                .unwrap_or_else(|_| parse_amount_str(&cleaned) as i64)
        }
        _ => 0,
    }
}

/// Strips comma grouping and whitespace, then parses as a decimal.
pub fn parse_amount_str(raw: &str) -> f64 {
    let cleaned: String = raw
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return 0.0;
    }
    cleaned.parse::<f64>().map(finite_or_zero).unwrap_or(0.0)
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

pub fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), ISO_FORMAT).ok()
}

/// `YYYY-MM-DD` -> `YYYY/MM/DD`. Unparseable input only has its separators swapped.
pub fn to_storage_date(iso: &str) -> String {
    match parse_iso_date(iso) {
        Some(date) => date.format(STORAGE_FORMAT).to_string(),
        None => iso.trim().replace('-', "/"),
    }
}

/// `YYYY/MM/DD` (optionally followed by a voucher suffix) -> `YYYY-MM-DD`.
pub fn to_iso_date(storage: &str) -> String {
    let prefix = storage_date_prefix(storage);
    match NaiveDate::parse_from_str(prefix, STORAGE_FORMAT) {
        Ok(date) => date.format(ISO_FORMAT).to_string(),
        Err(_) => prefix.replace('/', "-"),
    }
}

/// Ledger dates look like `2026/02/03 -12`; the voucher number after the whitespace is not
/// part of the date.
pub fn storage_date_prefix(raw: &str) -> &str {
    raw.trim().split_whitespace().next().unwrap_or("")
}

/// Calendar-correct previous day. The date is anchored at noon before stepping back so the
/// arithmetic never lands on a neighbouring day through an offset.
pub fn previous_day(iso: &str) -> Option<String> {
    let date = parse_iso_date(iso)?;
    let anchored = date.and_hms_opt(12, 0, 0)?;
    let previous = anchored.checked_sub_signed(Duration::days(1))?;
    Some(previous.date().format(ISO_FORMAT).to_string())
}

/// `YYYY-MM` prefix of an ISO date, or the whole string when it is shorter.
pub fn month_of(iso: &str) -> &str {
    let trimmed = iso.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}

/// The three spellings the inventory transfer relation uses for a day:
/// the full date, `MM-DD` and `MM/DD`.
pub fn month_day_variants(iso: &str) -> [String; 3] {
    let trimmed = iso.trim();
    let short = trimmed.get(5..10).unwrap_or(trimmed).to_string();
    let slashed = short.replace('-', "/");
    [trimmed.to_string(), short, slashed]
}

/// Kilograms to drums (D/M).
pub fn to_drums(weight_kg: f64, kg_per_drum: f64) -> f64 {
    if kg_per_drum <= 0.0 {
        return 0.0;
    }
    weight_kg / kg_per_drum
}

/// Trimmed text of a cell; numbers are rendered, null and other shapes become empty.
pub fn text_of(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.trim().to_string(),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(flag)) => flag.to_string(),
        _ => String::new(),
    }
}
