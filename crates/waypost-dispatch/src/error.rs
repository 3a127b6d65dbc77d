//! Handler error types and their mapping into the envelope taxonomy.

use thiserror::Error;

use waypost_core::{ApiError, ErrorCode};

/// What a handler returns when it cannot produce data.
///
/// Handlers classify what they can ([`HandlerError::Api`]) and pass raw
/// upstream causes through [`HandlerError::Upstream`]; the dispatcher owns
/// the mapping of causes onto the closed code set.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// An already-classified failure.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// An upstream collaborator failure with a free-form cause.
    #[error("{0}")]
    Upstream(String),
}

impl HandlerError {
    /// Convenience constructor for upstream causes.
    pub fn upstream(cause: impl Into<String>) -> Self {
        Self::Upstream(cause.into())
    }

    /// Map this failure into the envelope taxonomy.
    ///
    /// Upstream causes mentioning a quota become `QUOTA_EXCEEDED`; anything
    /// else becomes a retryable `SERVICE_ERROR` tagged with the operation.
    #[must_use]
    pub fn into_api_error(self, service: &str, action: &str) -> ApiError {
        match self {
            Self::Api(err) => {
                // AUTH_FAILED and IP_BLOCKED are reserved for the pipeline
                // layers above the dispatcher.
                debug_assert!(
                    !matches!(err.code, ErrorCode::AuthFailed | ErrorCode::IpBlocked),
                    "handlers must not produce auth or ip-policy errors"
                );
                err
            }
            Self::Upstream(cause) => {
                if cause.to_lowercase().contains("quota") {
                    ApiError::new(ErrorCode::QuotaExceeded, cause)
                } else {
                    ApiError::service_error(format!("{service}.{action} failed: {cause}"))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_causes_map_to_quota_exceeded() {
        let err = HandlerError::upstream("daily Quota exceeded for user");
        let api = err.into_api_error("mail", "list");
        assert_eq!(api.code, ErrorCode::QuotaExceeded);
        assert!(api.retryable);
    }

    #[test]
    fn other_causes_map_to_service_error() {
        let err = HandlerError::upstream("connection reset");
        let api = err.into_api_error("mail", "list");
        assert_eq!(api.code, ErrorCode::ServiceError);
        assert_eq!(api.message, "mail.list failed: connection reset");
        assert!(api.retryable);
    }

    #[test]
    fn classified_errors_pass_through() {
        let err = HandlerError::from(ApiError::not_found("message not found"));
        let api = err.into_api_error("mail", "get");
        assert_eq!(api.code, ErrorCode::NotFound);
    }
}
