//! Handler invocation with the outer trap.
//!
//! The dispatcher is the last line between handler code and the wire: it
//! resolves the service, runs the handler inside a panic trap, and converts
//! every failure into a valid envelope error. No exception crosses this
//! boundary.

use std::panic::AssertUnwindSafe;
use std::time::Instant;

use futures::FutureExt;
use serde_json::Value;
use tracing::Instrument;

use waypost_core::{ApiError, Params};

use crate::registry::{Registry, RequestContext};

/// Dispatch one command to its registered handler.
///
/// # Errors
///
/// - `INVALID_REQUEST` when `service` or `action` is empty
/// - `NOT_FOUND` when the service is unknown
/// - whatever classified error the handler produced, or `SERVICE_ERROR` /
///   `QUOTA_EXCEEDED` for raw upstream causes and panics
pub async fn dispatch(
    registry: &Registry,
    ctx: &RequestContext,
    service: &str,
    action: &str,
    params: &Params,
) -> Result<Value, ApiError> {
    if service.is_empty() || action.is_empty() {
        return Err(ApiError::invalid_request("service and action are required"));
    }

    let service_key = service.to_lowercase();
    let handler = registry
        .get(&service_key)
        .ok_or_else(|| ApiError::not_found(format!("unknown service: {service}")))?;

    let span = tracing::info_span!(
        "dispatch",
        request_id = %ctx.request_id,
        service = %service_key,
        action = %action,
    );

    let started = Instant::now();
    let outcome = AssertUnwindSafe(handler.handle(ctx, action, params))
        .catch_unwind()
        .instrument(span)
        .await;
    let elapsed_ms = started.elapsed().as_millis();

    match outcome {
        Ok(Ok(data)) => {
            tracing::debug!(
                request_id = %ctx.request_id,
                service = %service_key,
                action = %action,
                elapsed_ms,
                "handler completed"
            );
            Ok(data)
        }
        Ok(Err(err)) => {
            let api = err.into_api_error(&service_key, action);
            tracing::debug!(
                request_id = %ctx.request_id,
                service = %service_key,
                action = %action,
                elapsed_ms,
                code = %api.code,
                "handler failed"
            );
            Err(api)
        }
        Err(_panic) => {
            tracing::error!(
                request_id = %ctx.request_id,
                service = %service_key,
                action = %action,
                "handler panicked"
            );
            Err(ApiError::service_error(format!(
                "{service_key}.{action} failed: handler panicked"
            )))
        }
    }
}
