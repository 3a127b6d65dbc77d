//! The closed error taxonomy shared by every pipeline layer.
//!
//! Errors are values: every layer that can fail produces an [`ApiError`]
//! carrying a code from the closed [`ErrorCode`] set, a human-readable
//! message, and a retryability flag. Retryability is a property of each
//! occurrence; the code only supplies the default.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The closed set of error codes surfaced to clients.
///
/// Client tooling maps these to exit codes, so the set is append-only and
/// the wire spelling (SCREAMING_SNAKE_CASE) is part of the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The request envelope or parameters were malformed.
    InvalidRequest,
    /// Token verification failed (signature, temporal, or replay).
    AuthFailed,
    /// The reported client IP was rejected by the IP policy.
    IpBlocked,
    /// The operation targets an item the caller may not access.
    Forbidden,
    /// The service, action, or item does not exist.
    NotFound,
    /// An upstream quota was exhausted.
    QuotaExceeded,
    /// The request exceeded the gateway's soft deadline.
    Timeout,
    /// An upstream or handler failure not covered by a more specific code.
    ServiceError,
    /// A bootstrap request was rejected (already configured or bad secret).
    InitRejected,
    /// A bootstrap request arrived after the init window closed.
    InitExpired,
}

impl ErrorCode {
    /// The wire spelling of this code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::AuthFailed => "AUTH_FAILED",
            Self::IpBlocked => "IP_BLOCKED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::QuotaExceeded => "QUOTA_EXCEEDED",
            Self::Timeout => "TIMEOUT",
            Self::ServiceError => "SERVICE_ERROR",
            Self::InitRejected => "INIT_REJECTED",
            Self::InitExpired => "INIT_EXPIRED",
        }
    }

    /// Default retryability for this code.
    ///
    /// Quota, upstream, and timeout failures are transient; everything else
    /// will fail the same way on retry.
    #[must_use]
    pub const fn default_retryable(self) -> bool {
        matches!(self, Self::QuotaExceeded | Self::ServiceError | Self::Timeout)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A surfaced failure: code, message, and per-occurrence retryability.
///
/// Serializes as the `error` member of the response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    /// The error code.
    pub code: ErrorCode,
    /// A human-readable reason. Never derived from request params.
    pub message: String,
    /// Whether the caller may reasonably retry this occurrence.
    pub retryable: bool,
}

impl ApiError {
    /// Create an error with the code's default retryability.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retryable: code.default_retryable(),
        }
    }

    /// Override the retryability of this occurrence.
    #[must_use]
    pub const fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Shorthand for an [`ErrorCode::InvalidRequest`] error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Shorthand for an [`ErrorCode::AuthFailed`] error.
    pub fn auth_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthFailed, message)
    }

    /// Shorthand for an [`ErrorCode::IpBlocked`] error.
    pub fn ip_blocked(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::IpBlocked, message)
    }

    /// Shorthand for an [`ErrorCode::Forbidden`] error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    /// Shorthand for an [`ErrorCode::NotFound`] error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Shorthand for an [`ErrorCode::ServiceError`] error.
    pub fn service_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceError, message)
    }
}
