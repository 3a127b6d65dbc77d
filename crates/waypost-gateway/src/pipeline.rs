//! The request pipeline.
//!
//! For a single request the phases are strictly ordered: parse → (init
//! short-circuit | verify → ip-check → dispatch) → audit → respond. Every
//! request produces exactly one audit entry here; the mail filter's
//! intercept entries are additional and written through the same appender.

use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use chrono::Utc;
use serde_json::Value;

use waypost_core::{ApiError, CommandRequest, Envelope, ErrorCode, RequestId};
use waypost_dispatch::{dispatch, RequestContext};
use waypost_store::{AuditEntry, AuditStatus};

use crate::init;
use crate::state::GatewayState;

/// Run one command request through the pipeline.
///
/// Always returns an envelope; no failure escapes as anything else.
pub async fn handle_command(state: &Arc<GatewayState>, body: &[u8]) -> Envelope {
    let request_id = RequestId::generate();
    let started = Instant::now();

    let parsed: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(_) => {
            let err = ApiError::invalid_request("request body is not valid JSON");
            record(state, &request_id, "", "", "", AuditStatus::Error, started, &err.message);
            return Envelope::failure(err, &request_id);
        }
    };

    let request = match CommandRequest::from_value(&parsed) {
        Ok(request) => request,
        Err(err) => {
            record(state, &request_id, "", "", "", AuditStatus::Error, started, &err.message);
            return Envelope::failure(err, &request_id);
        }
    };

    let client_ip = request.client_ip.clone().unwrap_or_default();

    // Bootstrap short-circuit: bypasses auth and the IP policy, still audited.
    if request.service == init::INIT_SERVICE {
        let result = init::handle(state, &request.action, &request.params);
        let (status, error) = match &result {
            Ok(_) => (AuditStatus::Ok, String::new()),
            Err(err) => (AuditStatus::Error, err.message.clone()),
        };
        record(
            state,
            &request_id,
            &client_ip,
            &request.service,
            &request.action,
            status,
            started,
            &error,
        );
        return match result {
            Ok(data) => Envelope::success(data, &request_id),
            Err(err) => Envelope::failure(err, &request_id),
        };
    }

    // Token verification.
    let auth_result = match state.config.jwt_secret() {
        None => Err(ApiError::auth_failed("Service not configured")),
        Some(secret) => match &request.jwt {
            None => Err(ApiError::auth_failed("Missing token")),
            Some(token) => state
                .verifier
                .verify(&secret, token, epoch_secs())
                .map(|_| ())
                .map_err(ApiError::from),
        },
    };
    if let Err(err) = auth_result {
        record(
            state,
            &request_id,
            &client_ip,
            &request.service,
            &request.action,
            AuditStatus::AuthFailed,
            started,
            &err.message,
        );
        return Envelope::failure(err, &request_id);
    }

    // IP policy.
    if let Err(err) = state.policy.check(&client_ip).await {
        record(
            state,
            &request_id,
            &client_ip,
            &request.service,
            &request.action,
            AuditStatus::IpBlocked,
            started,
            &err.message,
        );
        return Envelope::failure(err, &request_id);
    }

    // Dispatch under the watchdog.
    let ctx = RequestContext::new(request_id.to_string(), client_ip.clone());
    let outcome = tokio::time::timeout(
        state.settings.watchdog(),
        dispatch(
            &state.registry,
            &ctx,
            &request.service,
            &request.action,
            &request.params,
        ),
    )
    .await
    .unwrap_or_else(|_elapsed| {
        Err(ApiError::new(
            ErrorCode::Timeout,
            format!(
                "request exceeded the {}s deadline",
                state.settings.watchdog_seconds
            ),
        ))
    });

    let (status, error) = match &outcome {
        Ok(_) => (AuditStatus::Ok, String::new()),
        Err(err) => (status_for(err.code), err.message.clone()),
    };
    record(
        state,
        &request_id,
        &client_ip,
        &request.service,
        &request.action,
        status,
        started,
        &error,
    );

    match outcome {
        Ok(data) => Envelope::success(data, &request_id),
        Err(err) => Envelope::failure(err, &request_id),
    }
}

/// The audit status recorded for a failed dispatch.
const fn status_for(code: ErrorCode) -> AuditStatus {
    match code {
        ErrorCode::AuthFailed => AuditStatus::AuthFailed,
        ErrorCode::IpBlocked => AuditStatus::IpBlocked,
        ErrorCode::Timeout => AuditStatus::Timeout,
        ErrorCode::Forbidden => AuditStatus::Blocked,
        _ => AuditStatus::Error,
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[allow(clippy::too_many_arguments)]
fn record(
    state: &GatewayState,
    request_id: &RequestId,
    client_ip: &str,
    service: &str,
    action: &str,
    status: AuditStatus,
    started: Instant,
    error: &str,
) {
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    state.audit.append(&AuditEntry {
        timestamp: Utc::now(),
        request_id: request_id.to_string(),
        client_ip: client_ip.to_owned(),
        service: service.to_owned(),
        action: action.to_owned(),
        status,
        duration_ms,
        error: error.to_owned(),
    });
}
