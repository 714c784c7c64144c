//! Parsing of client replies.
//!
//! Replies are read through `serde_json::Value` rather than a derived struct
//! so that a wrong type and a missing field can be told apart and answered
//! with the right error.

use serde_json::Value;
use thiserror::Error;

/// Errors produced while reading a client reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Payload was not a JSON object
    #[error("expected a JSON object: {0}")]
    InvalidJson(String),

    /// Required field absent
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    /// Field present with the wrong type or an unusable value
    #[error("field `{field}` must be {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },
}

fn parse_object(text: &str) -> Result<serde_json::Map<String, Value>, ParseError> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ParseError::InvalidJson(format!("got {other}"))),
        Err(e) => Err(ParseError::InvalidJson(e.to_string())),
    }
}

/// Extracts the requested name from a `{"uname": ...}` reply.
///
/// Surrounding whitespace is kept; a name that is empty or whitespace-only
/// is rejected.
pub fn parse_uname(text: &str) -> Result<String, ParseError> {
    let map = parse_object(text)?;
    let value = map.get("uname").ok_or(ParseError::MissingField("uname"))?;

    match value.as_str() {
        Some(name) if !name.trim().is_empty() => Ok(name.to_string()),
        Some(_) => Err(ParseError::InvalidField {
            field: "uname",
            expected: "a non-empty string",
        }),
        None => Err(ParseError::InvalidField {
            field: "uname",
            expected: "a string",
        }),
    }
}

/// Extracts the requested limit from a `{"ulimit": ...}` reply.
///
/// Floats with no fractional part (`3.0`) count as integers. Range checks
/// are left to `OccupancyLimit`.
pub fn parse_ulimit(text: &str) -> Result<i64, ParseError> {
    let map = parse_object(text)?;
    let value = map.get("ulimit").ok_or(ParseError::MissingField("ulimit"))?;

    let invalid = ParseError::InvalidField {
        field: "ulimit",
        expected: "an integer",
    };

    let Value::Number(number) = value else {
        return Err(invalid);
    };

    if let Some(n) = number.as_i64() {
        return Ok(n);
    }

    match number.as_f64() {
        Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 => Ok(f as i64),
        _ => Err(invalid),
    }
}
