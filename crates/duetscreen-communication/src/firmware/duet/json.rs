//! Tolerant accessors over `serde_json::Value`
//!
//! Controllers omit fields freely and RepRapFirmware 3 reports unknown
//! values as `null`, so every accessor returns `None` instead of failing.

use duetscreen_core::{ProtocolError, Result};
use serde_json::Value;

/// Parse a response body
pub fn parse(text: &str) -> Result<Value> {
    serde_json::from_str(text).map_err(|e| {
        ProtocolError::MalformedJson {
            reason: e.to_string(),
        }
        .into()
    })
}

/// Non-null member of an object
pub fn field<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value.get(key).filter(|v| !v.is_null())
}

/// Follow a chain of object keys
pub fn path<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().try_fold(value, |v, key| field(v, key))
}

pub fn as_f32(value: &Value) -> Option<f32> {
    value.as_f64().map(|v| v as f32)
}

pub fn f32_at(value: &Value, key: &str) -> Option<f32> {
    field(value, key).and_then(as_f32)
}

pub fn i64_at(value: &Value, key: &str) -> Option<i64> {
    field(value, key).and_then(Value::as_i64)
}

pub fn u64_at(value: &Value, key: &str) -> Option<u64> {
    field(value, key).and_then(Value::as_u64)
}

pub fn str_at<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    field(value, key).and_then(Value::as_str)
}

pub fn array_at<'a>(value: &'a Value, key: &str) -> Option<&'a [Value]> {
    field(value, key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
}

/// First element of an array member, or the member itself when scalar
pub fn first_f32(value: &Value, key: &str) -> Option<f32> {
    match field(value, key)? {
        Value::Array(items) => items.first().and_then(as_f32),
        other => as_f32(other),
    }
}

/// Array member converted element-wise, with `None` for unusable slots
pub fn f32_array(value: &Value, key: &str) -> Vec<Option<f32>> {
    array_at(value, key)
        .map(|items| items.iter().map(as_f32).collect())
        .unwrap_or_default()
}

/// Fail with `RemoteError` when the payload carries a non-zero `err`
pub fn check_err(value: &Value) -> Result<()> {
    match i64_at(value, "err") {
        Some(code) if code != 0 => Err(ProtocolError::RemoteError { code }.into()),
        _ => Ok(()),
    }
}

/// Require the payload to be a JSON object
pub fn require_object(value: &Value, what: &str) -> Result<()> {
    if value.is_object() {
        Ok(())
    } else {
        Err(ProtocolError::UnexpectedPayload {
            reason: format!("{} is not a JSON object", what),
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nulls_are_absent() {
        let v = json!({"a": null, "b": 2.5, "c": {"d": [1, null]}});
        assert!(field(&v, "a").is_none());
        assert_eq!(f32_at(&v, "b"), Some(2.5));
        assert_eq!(path(&v, &["c", "d"]).map(|d| d.is_array()), Some(true));
        assert_eq!(f32_array(&v["c"], "d"), vec![Some(1.0), None]);
    }

    #[test]
    fn test_first_f32() {
        let v = json!({"arr": [3, 4], "scalar": 7});
        assert_eq!(first_f32(&v, "arr"), Some(3.0));
        assert_eq!(first_f32(&v, "scalar"), Some(7.0));
        assert_eq!(first_f32(&v, "missing"), None);
    }

    #[test]
    fn test_check_err() {
        assert!(check_err(&json!({"err": 0})).is_ok());
        assert!(check_err(&json!({})).is_ok());
        assert!(check_err(&json!({"err": 1})).unwrap_err().is_protocol_error());
    }

    #[test]
    fn test_parse_malformed() {
        assert!(parse("{\"status\":").unwrap_err().is_protocol_error());
    }
}
