//! Waypost gateway entry point.
//!
//! Configuration comes from the environment:
//!
//! - `LISTEN_ADDR` — bind address (default `0.0.0.0:8080`)
//! - `JWT_SECRET` — the shared secret; leave unset to bootstrap through the
//!   init window
//! - `LOG_SINK_ID`, `LOG_ENABLED`, `LOG_MAX_ROWS` — audit log settings
//! - `IP_ALLOWLIST`, `IP_CHECK_ENABLED`, `IP_CHECK_API_KEY`,
//!   `IP_CHECK_THRESHOLD` — IP policy settings
//! - `SECURITY_BLOCKED_SENDERS`, `SECURITY_CONTENT_REGEX` — mail filter
//!   settings
//!
//! Upstream service adapters are an open set: deployments register their
//! handlers next to the built-in `admin` service before starting the router.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use waypost_dispatch::{AdminHandler, Registry};
use waypost_gateway::{create_router, GatewayConfig, GatewayState, IpPolicy, ReputationClient};
use waypost_store::{keys, AuditLog, ConfigStore, MemorySink};

/// Environment variables mirrored into the config store.
const CONFIG_KEYS: [&str; 10] = [
    keys::JWT_SECRET,
    keys::LOG_ENABLED,
    keys::LOG_SINK_ID,
    keys::LOG_MAX_ROWS,
    keys::IP_ALLOWLIST,
    keys::IP_CHECK_ENABLED,
    keys::IP_CHECK_API_KEY,
    keys::IP_CHECK_THRESHOLD,
    keys::SECURITY_BLOCKED_SENDERS,
    keys::SECURITY_CONTENT_REGEX,
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,waypost=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting waypost gateway");

    let mut settings = GatewayConfig::default();
    if let Ok(listen_addr) = std::env::var("LISTEN_ADDR") {
        settings.listen_addr = listen_addr;
    }

    let config = Arc::new(ConfigStore::from_pairs(
        CONFIG_KEYS
            .iter()
            .filter_map(|key| std::env::var(key).ok().map(|value| (*key, value))),
    ));

    if config.jwt_secret().is_none() {
        tracing::warn!(
            "JWT_SECRET not set - service is unconfigured; the init window is open for 5 minutes"
        );
    }

    let sink_id = config.log_sink_id().unwrap_or_else(|| "audit".to_owned());
    let sink = Arc::new(MemorySink::open(&sink_id));
    let audit = Arc::new(AuditLog::new(sink, config.clone()));

    let admin = AdminHandler::new(config.clone(), audit.clone(), vec!["admin".to_owned()]);
    let registry = Registry::builder()
        .register("admin", Arc::new(admin))
        .build();
    tracing::info!(services = ?registry.services(), "Service registry frozen");

    let reputation = ReputationClient::new(
        settings.reputation_endpoint.clone(),
        settings.reputation_timeout(),
    );
    let policy = IpPolicy::new(config.clone(), reputation);

    let listen_addr = settings.listen_addr.clone();
    let state = Arc::new(GatewayState::new(settings, config, registry, audit, policy));
    let app = create_router(state);

    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received");
}
