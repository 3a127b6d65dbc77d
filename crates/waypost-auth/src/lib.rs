//! Shared-secret token verification for the waypost gateway.
//!
//! This crate implements the authentication layer of the request pipeline:
//!
//! - **Verifier**: HS256 bearer tokens with clock-skew tolerance and
//!   algorithm pinning
//! - **Replay cache**: at-most-once acceptance of `jti`-bearing tokens
//!   within the token lifetime
//!
//! Verification is a pure function of `(secret, token, now)`; the only state
//! is the replay set, which provides atomic check-and-insert.
//!
//! # Example
//!
//! ```
//! use waypost_auth::TokenVerifier;
//!
//! let verifier = TokenVerifier::new();
//! // A garbage token never panics, it just fails verification.
//! assert!(verifier.verify("secret", "not-a-token", 1_700_000_000).is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod replay;
pub mod verifier;

pub use error::{AuthError, Result};
pub use replay::ReplayCache;
pub use verifier::{Claims, TokenVerifier, CLOCK_SKEW_SECS, MAX_TOKEN_LIFETIME_SECS};

#[cfg(any(test, feature = "test-utils"))]
pub use verifier::mint_token;
