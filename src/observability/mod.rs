//! # Observability
//!
//! Structured logging setup and Prometheus metrics.

pub mod metrics;
pub mod server;

/// Install the global `tracing` subscriber
///
/// Filter directives come from `RUST_LOG`, defaulting to
/// `docker_volume_vault=info`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docker_volume_vault=info".into()),
        )
        .init();
}
