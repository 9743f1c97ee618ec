use chrono::{DateTime, FixedOffset, SecondsFormat};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

// `2021-03-04T05:06:07.000+0000`: the store omits the colon in the offset.
static COMPACT_OFFSET: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(T[0-9:.]+)([+-])(\d{2})(\d{2})$").ok());

/// Inserts the missing colon into a `+hhmm` offset. Anything else is returned
/// untouched.
pub fn repair_offset(value: &str) -> String {
    match COMPACT_OFFSET.as_ref() {
        Some(re) => re.replace(value, "$1$2$3:$4").into_owned(),
        None => value.to_string(),
    }
}

pub fn parse_datetime(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(&repair_offset(value)).ok()
}

/// Repairs a datetime leaf value fetched from the store. Non-string values
/// pass through.
pub fn repair_value(value: Value) -> Value {
    match value {
        Value::String(raw) => match parse_datetime(&raw) {
            Some(dt) => Value::String(dt.to_rfc3339_opts(SecondsFormat::Millis, false)),
            None => {
                tracing::warn!("Unable to parse datetime value {raw}");
                Value::String(raw)
            }
        },
        value => value,
    }
}
