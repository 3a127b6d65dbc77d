//! HTTP front door for the waypost command gateway.
//!
//! A single endpoint carries the whole protocol: an idempotent `GET` serves
//! the health probe, and `POST` runs the full request pipeline.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Clients                              │
//! │                     (HTTPS, JSON)                           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     waypost-gateway                         │
//! │  parse → init window │ token verify → ip policy → dispatch  │
//! │                 → content filter → audit → respond          │
//! └─────────────────────────────────────────────────────────────┘
//!               │              │              │
//!               ▼              ▼              ▼
//!        ┌──────────┐   ┌──────────┐   ┌──────────┐
//!        │ Registry │   │  Config  │   │  Audit   │
//!        │ handlers │   │  store   │   │  sink    │
//!        └──────────┘   └──────────┘   └──────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod init;
pub mod pipeline;
pub mod policy;
pub mod routes;
pub mod state;

pub use config::GatewayConfig;
pub use policy::{IpPolicy, ReputationClient};
pub use routes::create_router;
pub use state::GatewayState;
