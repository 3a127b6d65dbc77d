//! The one-shot secret bootstrap window.
//!
//! Immediately after first deploy the proxy has no shared secret, so it
//! cannot authenticate the secret-setter. For a bounded window after process
//! start, the pseudo-service `_init` accepts a single unauthenticated
//! `setSecret` call; once the secret is set, or the window elapses, the
//! channel is closed for good.

use serde_json::{json, Value};

use waypost_core::{optional_str, ApiError, ErrorCode, Params};
use waypost_store::keys;

use crate::state::GatewayState;

/// The pseudo-service name recognized before authentication.
pub const INIT_SERVICE: &str = "_init";

/// How long after deploy the window stays open, in seconds.
pub const INIT_WINDOW_SECS: u64 = 300;

/// Minimum accepted secret length, in characters.
pub const MIN_SECRET_CHARS: usize = 32;

/// Handle an `_init` request.
///
/// The window is anchored to the process-start instant, which is monotonic:
/// setting the wall clock backwards cannot reopen it.
///
/// # Errors
///
/// - `NOT_FOUND` for any action other than `setSecret`
/// - `INIT_REJECTED` when already configured or the secret is too short
/// - `INIT_EXPIRED` once the window has elapsed
pub fn handle(state: &GatewayState, action: &str, params: &Params) -> Result<Value, ApiError> {
    if action != "setSecret" {
        return Err(ApiError::not_found(format!(
            "unknown action: {INIT_SERVICE}.{action}"
        )));
    }

    if state.config.jwt_secret().is_some() {
        return Err(ApiError::new(
            ErrorCode::InitRejected,
            "service is already configured",
        ));
    }

    if state.deployed_at.elapsed().as_secs() > INIT_WINDOW_SECS {
        return Err(ApiError::new(
            ErrorCode::InitExpired,
            "initialization window has closed",
        ));
    }

    let secret = optional_str(params, "secret").unwrap_or_default();
    if secret.chars().count() < MIN_SECRET_CHARS {
        return Err(ApiError::new(
            ErrorCode::InitRejected,
            format!("secret must be at least {MIN_SECRET_CHARS} characters"),
        ));
    }

    state.config.set(keys::JWT_SECRET, secret);
    tracing::info!("shared secret configured through init window");
    Ok(json!({ "configured": true }))
}
