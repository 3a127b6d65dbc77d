//! Authentication error types.

use thiserror::Error;

use waypost_core::ApiError;

/// A result type using `AuthError`.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur during token verification.
///
/// Every variant maps to the `AUTH_FAILED` envelope code; the variants exist
/// so that messages stay precise and tests can assert the exact failure.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The token is not a three-segment dot-separated string, or a segment
    /// failed to decode or parse.
    #[error("Malformed token: {0}")]
    Malformed(String),

    /// The token header names an algorithm other than HS256.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The token header carries a `typ` other than JWT.
    #[error("Unsupported token type: {0}")]
    UnsupportedType(String),

    /// The HMAC signature does not match.
    #[error("Invalid signature")]
    InvalidSignature,

    /// The token expired more than the permitted skew ago.
    #[error("Token expired")]
    Expired,

    /// The token claims an issue time further in the future than the
    /// permitted skew.
    #[error("Token issued in the future")]
    IssuedInFuture,

    /// The token's `jti` was already accepted within its lifetime.
    #[error("Token replay detected")]
    Replayed,

    /// An internal failure while computing the MAC.
    #[error("internal verification error")]
    Internal,
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::auth_failed(err.to_string())
    }
}
