//! Service registry and dispatch for the waypost gateway.
//!
//! The dispatcher routes `(service, action)` pairs to registered handlers
//! and converts every failure into the closed error taxonomy:
//!
//! - **Registry**: initialize-once mapping from lowercased service name to
//!   handler, read-only after startup
//! - **Dispatcher**: handler invocation inside a trap, with uniform error
//!   mapping and per-request telemetry
//! - **Handlers**: the administrative surface and the mail handler with its
//!   security content filter
//!
//! Handlers see an opaque params map and return either data or a
//! [`HandlerError`]; they never touch the audit sink directly and never
//! produce `AUTH_FAILED` or `IP_BLOCKED`, which belong to the layers above.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod dispatcher;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod registry;

pub use dispatcher::dispatch;
pub use error::HandlerError;
pub use filter::{SecurityFilter, SecurityPolicy};
pub use handlers::admin::AdminHandler;
pub use handlers::mail::{MailHandler, MailMessage, MailOp, MailUpstream};
pub use registry::{Handler, Registry, RegistryBuilder, RequestContext};

#[cfg(any(test, feature = "test-utils"))]
pub use handlers::mail::InMemoryMailUpstream;
