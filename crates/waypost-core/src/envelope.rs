//! The wire envelopes: command requests in, uniform responses out.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;
use crate::ids::RequestId;
use crate::params::Params;

/// An incoming command request.
///
/// `jwt` and `clientIp` are optional at the parse layer so that the pipeline
/// can surface the right error code (`AUTH_FAILED` for a missing token rather
/// than a generic parse failure).
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    /// The bearer token, verified by the auth layer.
    pub jwt: Option<String>,
    /// Target service name.
    pub service: String,
    /// Target action within the service.
    pub action: String,
    /// Opaque action parameters, decoded per handler.
    pub params: Params,
    /// The caller's self-reported IP address. Advisory only.
    pub client_ip: Option<String>,
}

impl CommandRequest {
    /// Extract a request from a parsed JSON body, enforcing the envelope
    /// shape.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_REQUEST` if the body is not an object, if `service`
    /// or `action` is missing, empty, or non-string, or if `params` is
    /// present but not an object.
    pub fn from_value(body: &Value) -> Result<Self, ApiError> {
        let obj = body
            .as_object()
            .ok_or_else(|| ApiError::invalid_request("request body must be a JSON object"))?;

        let service = required_string(obj, "service")?;
        let action = required_string(obj, "action")?;

        let params = match obj.get("params") {
            None | Some(Value::Null) => Params::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => {
                return Err(ApiError::invalid_request("params must be an object"));
            }
        };

        let jwt = obj.get("jwt").and_then(Value::as_str).map(str::to_owned);
        let client_ip = obj
            .get("clientIp")
            .and_then(Value::as_str)
            .map(str::to_owned);

        Ok(Self {
            jwt,
            service,
            action,
            params,
            client_ip,
        })
    }
}

fn required_string(
    obj: &serde_json::Map<String, Value>,
    field: &str,
) -> Result<String, ApiError> {
    match obj.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::String(_)) | None => {
            Err(ApiError::invalid_request(format!("missing required field: {field}")))
        }
        Some(_) => Err(ApiError::invalid_request(format!("{field} must be a string"))),
    }
}

/// The uniform response envelope.
///
/// Exactly one of `data` and `error` is present, keyed by `ok`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Whether the request succeeded.
    pub ok: bool,
    /// Handler result on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Failure details on error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    /// The per-request identifier, echoed in the audit log.
    #[serde(rename = "requestId")]
    pub request_id: String,
}

impl Envelope {
    /// A success envelope wrapping handler data.
    #[must_use]
    pub fn success(data: Value, request_id: &RequestId) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
            request_id: request_id.to_string(),
        }
    }

    /// A failure envelope wrapping an error.
    #[must_use]
    pub fn failure(error: ApiError, request_id: &RequestId) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error),
            request_id: request_id.to_string(),
        }
    }
}
