//! Core types for the waypost command gateway.
//!
//! This crate provides the foundational types shared by every other crate:
//!
//! - **Envelopes**: the uniform request and response shapes on the wire
//! - **Error taxonomy**: the closed set of error codes with retryability
//! - **Request IDs**: per-request identifiers for correlation and audit
//! - **Param helpers**: shared validation over the opaque params map
//!
//! # Example
//!
//! ```
//! use waypost_core::{ApiError, Envelope, ErrorCode, RequestId};
//!
//! let id = RequestId::generate();
//! let err = ApiError::new(ErrorCode::NotFound, "unknown service: widgets");
//! let envelope = Envelope::failure(err, &id);
//! assert!(!envelope.ok);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod envelope;
pub mod error;
pub mod ids;
pub mod params;

pub use envelope::{CommandRequest, Envelope};
pub use error::{ApiError, ErrorCode};
pub use ids::RequestId;
pub use params::{clamp_limit, optional_str, require_params, require_str, Params};
