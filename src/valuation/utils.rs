//! Utility functions for field coercion and small numeric helpers

use crate::valuation::types::{PropertyCategory, RawRecord};
use chrono::NaiveDate;
use serde_json::Value;

/// Date layouts seen in assessor exports, tried in order
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y%m%d", "%m/%d/%y"];

/// Use codes that mark a condominium master record rather than a unit
pub const CONDO_MASTER_CODES: &[&str] = &["995", "CM", "CONDMAIN", "CONDO MAIN"];

/// A value counts as present unless it is null, blank, zero or a boolean
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(_) => false,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Return the first present value among alias keys
pub fn first_present<'a>(record: &'a RawRecord, aliases: &[&str]) -> Option<&'a Value> {
    aliases
        .iter()
        .filter_map(|key| record.get(*key))
        .find(|value| is_truthy(value))
}

/// Render a scalar value as text (numbers keep their JSON form)
fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Trim a value into a string, blank becomes None
pub fn clean_string(value: Option<&Value>) -> Option<String> {
    let text = value_text(value?)?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parse a number, stripping currency symbols, commas and other noise
pub fn parse_float_value(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let normalized: String = s
                .trim()
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            if normalized.is_empty() {
                return None;
            }
            normalized.parse::<f64>().ok()
        }
        _ => None,
    }
}

/// Normalize a parcel identifier: trimmed, uppercased, spaces and dashes removed
pub fn normalize_loc_id(value: Option<&Value>) -> Option<String> {
    let text = value.and_then(value_text).unwrap_or_default();
    let normalized: String = text
        .trim()
        .chars()
        .filter(|c| *c != ' ' && *c != '-')
        .collect::<String>()
        .to_uppercase();

    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

/// Classify a use code by its leading character
pub fn classify_use_code(use_code: Option<&Value>) -> PropertyCategory {
    let code = match clean_string(use_code) {
        Some(code) => code,
        None => return PropertyCategory::Unknown,
    };

    match code.chars().next() {
        Some('1') => PropertyCategory::Residential,
        Some('2') | Some('3') | Some('5') | Some('6') => PropertyCategory::Commercial,
        Some('4') => PropertyCategory::Industrial,
        Some('0') => PropertyCategory::Exempt,
        Some('7') => PropertyCategory::Agricultural,
        Some('8') => PropertyCategory::Forest,
        Some('9') => PropertyCategory::Mixed,
        _ => PropertyCategory::Other,
    }
}

/// Parse a sale date, first matching layout wins
pub fn parse_date(value: Option<&Value>) -> Option<NaiveDate> {
    let text = clean_string(value)?;
    let all_digits = text.chars().all(|c| c.is_ascii_digit());

    for format in DATE_FORMATS {
        let parsed = match *format {
            // chrono's %Y is not fixed-width, so split compact dates by hand
            "%Y%m%d" if all_digits && text.len() == 8 => {
                let year = text[0..4].parse().ok();
                let month = text[4..6].parse().ok();
                let day = text[6..8].parse().ok();
                match (year, month, day) {
                    (Some(y), Some(m), Some(d)) => NaiveDate::from_ymd_opt(y, m, d),
                    _ => None,
                }
            }
            "%Y%m%d" => None,
            "%m/%d/%Y" => NaiveDate::parse_from_str(&text, format)
                .ok()
                .filter(|date| chrono::Datelike::year(date) >= 1000),
            _ => NaiveDate::parse_from_str(&text, format).ok(),
        };

        if parsed.is_some() {
            return parsed;
        }
    }

    // Bare year
    if all_digits && text.len() == 4 {
        return text
            .parse::<i32>()
            .ok()
            .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1));
    }

    None
}

/// Median of the values (mean of the middle pair for even counts)
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

/// Relative difference |a-b| / max(a,b), capped; missing or non-positive sides cost the cap
pub fn relative_gap(a: Option<f64>, b: Option<f64>, cap: f64) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) if a > 0.0 && b > 0.0 => cap.min((a - b).abs() / a.max(b)),
        _ => cap,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_float_value() {
        assert_eq!(parse_float_value(Some(&json!("$412,500"))), Some(412_500.0));
        assert_eq!(parse_float_value(Some(&json!(" 1,850.5 sf"))), Some(1850.5));
        assert_eq!(parse_float_value(Some(&json!(6000))), Some(6000.0));
        assert_eq!(parse_float_value(Some(&json!("n/a"))), None);
        assert_eq!(parse_float_value(Some(&json!("1.2.3"))), None);
        assert_eq!(parse_float_value(Some(&json!(null))), None);
        assert_eq!(parse_float_value(None), None);
    }

    #[test]
    fn test_normalize_loc_id() {
        assert_eq!(
            normalize_loc_id(Some(&json!(" f_123-456 789 "))),
            Some("F_123456789".to_string())
        );
        assert_eq!(normalize_loc_id(Some(&json!(4021))), Some("4021".to_string()));
        assert_eq!(normalize_loc_id(Some(&json!(" - "))), None);
        assert_eq!(normalize_loc_id(None), None);
    }

    #[test]
    fn test_first_present_skips_falsy() {
        let mut record = RawRecord::new();
        record.insert("LOC_ID".to_string(), json!(""));
        record.insert("PAR_ID".to_string(), json!(0));
        record.insert("PROP_ID".to_string(), json!("P-9"));

        let value = first_present(&record, &["LOC_ID", "PAR_ID", "PROP_ID"]);
        assert_eq!(value, Some(&json!("P-9")));

        assert!(first_present(&record, &["MISSING"]).is_none());
    }

    #[test]
    fn test_classify_use_code() {
        assert_eq!(classify_use_code(Some(&json!("101"))), PropertyCategory::Residential);
        assert_eq!(classify_use_code(Some(&json!(325))), PropertyCategory::Commercial);
        assert_eq!(classify_use_code(Some(&json!("013"))), PropertyCategory::Exempt);
        assert_eq!(classify_use_code(Some(&json!("401"))), PropertyCategory::Industrial);
        assert_eq!(classify_use_code(Some(&json!("71"))), PropertyCategory::Agricultural);
        assert_eq!(classify_use_code(Some(&json!("8"))), PropertyCategory::Forest);
        assert_eq!(classify_use_code(Some(&json!("995"))), PropertyCategory::Mixed);
        assert_eq!(classify_use_code(Some(&json!("R1"))), PropertyCategory::Other);
        assert_eq!(classify_use_code(Some(&json!("  "))), PropertyCategory::Unknown);
        assert_eq!(classify_use_code(None), PropertyCategory::Unknown);
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2023, 12, 25);

        assert_eq!(parse_date(Some(&json!("2023-12-25"))), expected);
        assert_eq!(parse_date(Some(&json!("12/25/2023"))), expected);
        assert_eq!(parse_date(Some(&json!("20231225"))), expected);
        assert_eq!(parse_date(Some(&json!(20231225))), expected);
        assert_eq!(parse_date(Some(&json!("12/25/23"))), expected);
        assert_eq!(
            parse_date(Some(&json!("1998"))),
            NaiveDate::from_ymd_opt(1998, 1, 1)
        );

        assert_eq!(parse_date(Some(&json!("invalid"))), None);
        assert_eq!(parse_date(Some(&json!("2023-13-45"))), None);
        assert_eq!(parse_date(Some(&json!(""))), None);
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[3.0]), Some(3.0));
        assert_eq!(median(&[5.0, 1.0, 3.0]), Some(3.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
    }

    #[test]
    fn test_relative_gap() {
        assert!((relative_gap(Some(1500.0), Some(2000.0), 0.5) - 0.25).abs() < 1e-12);
        assert!((relative_gap(Some(1000.0), Some(4000.0), 0.5) - 0.5).abs() < 1e-12);
        assert_eq!(relative_gap(None, Some(2000.0), 0.5), 0.5);
        assert_eq!(relative_gap(Some(0.0), Some(2000.0), 0.5), 0.5);
        assert_eq!(relative_gap(Some(-10.0), Some(-10.0), 0.5), 0.5);
        assert_eq!(relative_gap(Some(1200.0), Some(1200.0), 0.5), 0.0);
    }
}
