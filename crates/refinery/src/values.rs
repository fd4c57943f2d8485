//! Reading loosely-typed bronze values.
//!
//! Bronze columns may hold strings, numbers or JSON text depending on how the
//! source was loaded, so every accessor accepts more than one representation.

use chrono::DateTime;
use serde_json::Value;

use medallion_core::table::Row;

/// Format of rendered event times (UTC).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A scalar as text. Nested values become their JSON text.
pub fn text_of(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

pub fn text(row: &Row, column: &str) -> Option<String> {
    text_of(row.get(column))
}

/// A number, or a string holding one.
pub fn number_of(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// Render epoch seconds as `yyyy-MM-dd HH:mm:ss` in UTC. Fractions are truncated.
pub fn epoch_to_timestamp(value: Option<&Value>) -> Option<String> {
    let seconds = match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.floor() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f.floor() as i64))
        }
        _ => None,
    }?;
    DateTime::from_timestamp(seconds, 0).map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())
}

/// `left-right`, or null when either part is missing.
pub fn composite_key(left: Option<&str>, right: Option<&str>) -> Option<String> {
    Some(format!("{}-{}", left?, right?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_of_scalars() {
        assert_eq!(text_of(Some(&json!("SYD01"))), Some("SYD01".to_string()));
        assert_eq!(text_of(Some(&json!(42))), Some("42".to_string()));
        assert_eq!(text_of(Some(&Value::Null)), None);
        assert_eq!(text_of(None), None);
    }

    #[test]
    fn test_number_of_accepts_numeric_strings() {
        assert_eq!(number_of(Some(&json!(12.5))), Some(12.5));
        assert_eq!(number_of(Some(&json!(" 7 "))), Some(7.0));
        assert_eq!(number_of(Some(&json!("seven"))), None);
        assert_eq!(number_of(Some(&json!("NaN"))), None);
    }

    #[test]
    fn test_epoch_to_timestamp() {
        assert_eq!(
            epoch_to_timestamp(Some(&json!(1633046400))),
            Some("2021-10-01 00:00:00".to_string())
        );
        assert_eq!(
            epoch_to_timestamp(Some(&json!("1633046461.9"))),
            Some("2021-10-01 00:01:01".to_string())
        );
        assert_eq!(epoch_to_timestamp(Some(&json!("noon"))), None);
    }

    #[test]
    fn test_composite_key() {
        assert_eq!(composite_key(Some("SYD01"), Some("7")), Some("SYD01-7".to_string()));
        assert_eq!(composite_key(None, Some("7")), None);
    }
}
