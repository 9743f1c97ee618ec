use chrono::{DateTime, NaiveDate, SecondsFormat};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::core::datetime::repair_offset;
use crate::core::registry::ScalarKind;

/// Date literals the remote store understands without quoting.
const DATE_LITERALS: &[&str] = &[
    "YESTERDAY",
    "TODAY",
    "TOMORROW",
    "LAST_WEEK",
    "THIS_WEEK",
    "NEXT_WEEK",
    "LAST_MONTH",
    "THIS_MONTH",
    "NEXT_MONTH",
    "LAST_90_DAYS",
    "NEXT_90_DAYS",
    "THIS_QUARTER",
    "LAST_QUARTER",
    "NEXT_QUARTER",
    "THIS_YEAR",
    "LAST_YEAR",
    "NEXT_YEAR",
    "THIS_FISCAL_QUARTER",
    "LAST_FISCAL_QUARTER",
    "NEXT_FISCAL_QUARTER",
    "THIS_FISCAL_YEAR",
    "LAST_FISCAL_YEAR",
    "NEXT_FISCAL_YEAR",
];

const KEYWORDS: &[&str] = &["null", "TRUE", "FALSE"];

static RELATIVE_DATE: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^(LAST|NEXT)_N_(DAYS|WEEKS|MONTHS|QUARTERS|YEARS|FISCAL_QUARTERS|FISCAL_YEARS):\d+$",
        r"^N_(DAYS|WEEKS|MONTHS|QUARTERS|YEARS|FISCAL_QUARTERS|FISCAL_YEARS)_AGO:\d+$",
    ]
    .into_iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

fn is_quoted(s: &str) -> bool {
    s.len() >= 2 && s.starts_with('\'') && s.ends_with('\'')
}

fn is_relative_date(s: &str) -> bool {
    DATE_LITERALS.contains(&s) || RELATIVE_DATE.iter().any(|re| re.is_match(s))
}

/// Strings that are already valid literals and must not be quoted.
pub fn is_passthrough(s: &str) -> bool {
    is_quoted(s) || KEYWORDS.contains(&s) || is_relative_date(s)
}

pub fn quote(s: &str) -> String {
    let escaped = s.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}

fn render_temporal(s: &str, kind: ScalarKind) -> Option<String> {
    match kind {
        ScalarKind::Date => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .map(|date| date.format("%Y-%m-%d").to_string()),
        ScalarKind::Datetime => DateTime::parse_from_rfc3339(&repair_offset(s))
            .ok()
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        _ => None,
    }
}

fn render_str(s: &str, kind: Option<ScalarKind>) -> String {
    if is_passthrough(s) {
        return s.to_string();
    }
    kind.and_then(|kind| render_temporal(s, kind))
        .unwrap_or_else(|| quote(s))
}

fn render_scalar(value: &Value, kind: Option<ScalarKind>) -> Result<String, String> {
    match value {
        Value::Null => Ok("null".to_string()),
        Value::Bool(true) => Ok("TRUE".to_string()),
        Value::Bool(false) => Ok("FALSE".to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(render_str(s, kind)),
        Value::Array(_) | Value::Object(_) => Err(format!("unsupported literal `{}`", value)),
    }
}

/// Renders a filter value as a literal. Returns `None` for a JSON `null`,
/// which drops the operator from the filter.
pub fn render_literal(value: &Value, kind: Option<ScalarKind>) -> Result<Option<String>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Array(items) => {
            let items = items
                .iter()
                .map(|item| render_scalar(item, kind))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Some(format!("({})", items.join(", "))))
        }
        value => render_scalar(value, kind).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn render(value: Value) -> String {
        render_literal(&value, None).unwrap().unwrap()
    }

    #[test]
    fn test_scalars() {
        assert_eq!(render(json!(5)), "5");
        assert_eq!(render(json!(2.5)), "2.5");
        assert_eq!(render(json!(true)), "TRUE");
        assert_eq!(render(json!(false)), "FALSE");
        assert_eq!(render(json!("5")), "'5'");
    }

    #[test]
    fn test_passthrough() {
        assert_eq!(render(json!("'already'")), "'already'");
        assert_eq!(render(json!("null")), "null");
        assert_eq!(render(json!("TRUE")), "TRUE");
        assert_eq!(render(json!("TODAY")), "TODAY");
        assert_eq!(render(json!("LAST_N_DAYS:30")), "LAST_N_DAYS:30");
        assert_eq!(render(json!("N_FISCAL_YEARS_AGO:2")), "N_FISCAL_YEARS_AGO:2");
        assert_eq!(render(json!("LAST_N_DAYS:")), "'LAST_N_DAYS:'");
        assert_eq!(render(json!("today")), "'today'");
    }

    #[test]
    fn test_relative_date_patterns_compile() {
        assert_eq!(RELATIVE_DATE.len(), 2);
    }

    #[test]
    fn test_escaping() {
        assert_eq!(render(json!("O'Brien")), r"'O\'Brien'");
        assert_eq!(render(json!(r"a\b")), r"'a\\b'");
    }

    #[test]
    fn test_arrays() {
        assert_eq!(render(json!(["a", "b"])), "('a', 'b')");
        assert_eq!(render(json!([1, 2, 3])), "(1, 2, 3)");
        assert!(render_literal(&json!([["nested"]]), None).is_err());
    }

    #[test]
    fn test_null_is_dropped() {
        assert_eq!(render_literal(&Value::Null, None), Ok(None));
    }

    #[test]
    fn test_dates() {
        let date = render_literal(&json!("2021-03-04"), Some(ScalarKind::Date));
        assert_eq!(date, Ok(Some("2021-03-04".to_string())));

        let datetime = render_literal(&json!("2021-03-04T05:06:07.000+0000"), Some(ScalarKind::Datetime));
        assert_eq!(datetime, Ok(Some("2021-03-04T05:06:07Z".to_string())));

        let not_a_date = render_literal(&json!("soon"), Some(ScalarKind::Date));
        assert_eq!(not_a_date, Ok(Some("'soon'".to_string())));
    }
}
