//! Shared validation helpers over the opaque params map.
//!
//! Handlers keep an untyped `Map<String, Value>` boundary and use these
//! helpers so that every missing or malformed parameter maps to the same
//! `INVALID_REQUEST` shape.

use serde_json::Value;

use crate::error::ApiError;

/// The opaque parameter map passed to handlers.
pub type Params = serde_json::Map<String, Value>;

/// Require that each listed key is present and non-empty.
///
/// A key is missing if absent, JSON `null`, or an empty string.
///
/// # Errors
///
/// Returns `INVALID_REQUEST` naming the first missing key.
pub fn require_params(params: &Params, keys: &[&str]) -> Result<(), ApiError> {
    for key in keys {
        let present = match params.get(*key) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        };
        if !present {
            return Err(ApiError::invalid_request(format!(
                "missing required parameter: {key}"
            )));
        }
    }
    Ok(())
}

/// Require a non-empty string parameter and return it.
///
/// # Errors
///
/// Returns `INVALID_REQUEST` if the key is missing, empty, or not a string.
pub fn require_str<'a>(params: &'a Params, key: &str) -> Result<&'a str, ApiError> {
    match params.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s),
        Some(Value::String(_)) | Some(Value::Null) | None => Err(ApiError::invalid_request(
            format!("missing required parameter: {key}"),
        )),
        Some(_) => Err(ApiError::invalid_request(format!("{key} must be a string"))),
    }
}

/// An optional string parameter, `None` when absent or not a string.
#[must_use]
pub fn optional_str<'a>(params: &'a Params, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}

/// Clamp an optional positive integer parameter into `[1, max]`.
///
/// Missing, non-numeric, or non-positive values yield `default`.
#[must_use]
pub fn clamp_limit(params: &Params, key: &str, default: u64, max: u64) -> u64 {
    let value = params
        .get(key)
        .and_then(Value::as_u64)
        .filter(|v| *v > 0)
        .unwrap_or(default);
    value.clamp(1, max)
}
