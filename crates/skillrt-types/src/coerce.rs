//! Tolerant field coercion used by every `from_dict` constructor.
//!
//! Records arrive from orchestrators, stored validation cases and JSONL
//! files, so numbers may be strings, lists may be missing and mappings may be
//! `null`. These helpers turn such values into the shape the contracts expect
//! and fall back to a default instead of failing.

use serde_json::Value;

use crate::JsonMap;
use crate::error::ContractError;

/// Clone `v` if it is an object, otherwise return an empty map.
pub fn map_or_empty(v: Option<&Value>) -> JsonMap {
    match v {
        Some(Value::Object(map)) => map.clone(),
        _ => JsonMap::new(),
    }
}

/// Collect a list of non-blank, trimmed strings. Non-string items are
/// rendered with their JSON form; anything that is not a list yields `[]`.
pub fn string_list(v: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = v else {
        return Vec::new();
    };
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => s.trim().to_string(),
            other => other.to_string(),
        })
        .filter(|s| !s.is_empty())
        .collect()
}

/// Trim every entry and drop the blank ones.
pub fn normalize_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Integer coercion: numbers (floats truncate), numeric strings and booleans.
pub fn int_or(v: Option<&Value>, default: i64) -> i64 {
    match v {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|u| i64::try_from(u).unwrap_or(i64::MAX)))
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(default),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
                .unwrap_or(default)
        }
        Some(Value::Bool(b)) => i64::from(*b),
        _ => default,
    }
}

/// Float coercion: numbers, numeric strings and booleans. Non-finite values
/// fall back to `default`.
pub fn float_or(v: Option<&Value>, default: f64) -> f64 {
    let parsed = match v {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(Value::Bool(b)) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    parsed.filter(|f| f.is_finite()).unwrap_or(default)
}

/// Boolean coercion. Missing or `null` yields `default`; strings accept
/// `true`/`1`/`yes`/`on` (case-insensitive); numbers are true when non-zero.
pub fn bool_or(v: Option<&Value>, default: bool) -> bool {
    match v {
        None | Some(Value::Null) => default,
        Some(value) => truthy(value),
    }
}

/// Flag semantics shared by request policy switches.
pub fn truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes" | "on"
        ),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Null => false,
    }
}

/// `None` for missing/null, the string itself for strings, the JSON
/// rendering for anything else.
pub fn opt_string(v: Option<&Value>) -> Option<String> {
    match v {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}

/// String field with a default used when the value is missing, null or blank.
pub fn string_or(v: Option<&Value>, default: &str) -> String {
    match opt_string(v) {
        Some(s) if !s.trim().is_empty() => s,
        _ => default.to_string(),
    }
}

/// Reject blank required identifiers.
pub fn require_non_empty(field: &'static str, value: &str) -> Result<(), ContractError> {
    if value.trim().is_empty() {
        return Err(ContractError::EmptyField { field });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn map_or_empty_rejects_non_objects() {
        assert!(map_or_empty(Some(&json!([1, 2]))).is_empty());
        assert!(map_or_empty(None).is_empty());
        assert_eq!(map_or_empty(Some(&json!({"a": 1}))).len(), 1);
    }

    #[test]
    fn string_list_trims_and_drops_blanks() {
        let v = json!(["  a ", "", "   ", 3, "b"]);
        assert_eq!(string_list(Some(&v)), vec!["a", "3", "b"]);
        assert!(string_list(Some(&json!("not a list"))).is_empty());
    }

    #[test]
    fn int_or_coerces_strings_and_floats() {
        assert_eq!(int_or(Some(&json!("42")), 0), 42);
        assert_eq!(int_or(Some(&json!(" 7.9 ")), 0), 7);
        assert_eq!(int_or(Some(&json!(3.7)), 0), 3);
        assert_eq!(int_or(Some(&json!("nope")), 5), 5);
        assert_eq!(int_or(Some(&json!(null)), 5), 5);
        assert_eq!(int_or(Some(&json!(true)), 5), 1);
    }

    #[test]
    fn float_or_falls_back_on_garbage() {
        assert_eq!(float_or(Some(&json!("0.25")), 1.0), 0.25);
        assert_eq!(float_or(Some(&json!({})), 1.0), 1.0);
        assert_eq!(float_or(Some(&json!("NaN")), 0.5), 0.5);
    }

    #[test]
    fn bool_or_uses_default_only_when_absent() {
        assert!(bool_or(None, true));
        assert!(bool_or(Some(&json!(null)), true));
        assert!(!bool_or(Some(&json!(false)), true));
        assert!(bool_or(Some(&json!("YES")), false));
        assert!(!bool_or(Some(&json!("false")), true));
    }

    #[test]
    fn string_or_treats_blank_as_missing() {
        assert_eq!(string_or(Some(&json!("  ")), "x"), "x");
        assert_eq!(string_or(Some(&json!(12)), "x"), "12");
        assert_eq!(string_or(None, "x"), "x");
    }

    #[test]
    fn require_non_empty_rejects_whitespace() {
        assert!(require_non_empty("skill_id", "   ").is_err());
        assert!(require_non_empty("skill_id", "skill.echo").is_ok());
    }
}
