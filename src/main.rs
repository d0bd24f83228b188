//! # Docker Volume Vault
//!
//! Plugin binary: parses flags and serves the Docker volume
//! plugin protocol until SIGINT or SIGTERM, then unmounts every volume.
//!
//! ```bash
//! VAULT_ADDR=https://vault:8200 VAULT_TOKEN=s.xxx docker-volume-vault
//! docker volume create -d vault --name db -o policy-rules=@/etc/vault/db.hcl
//! docker run -v db:/secrets alpine cat /secrets/secret/db/password
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use docker_volume_vault::config::{Cli, PluginConfig};
use docker_volume_vault::observability::{self, metrics};
use docker_volume_vault::volume::{Backend, FuseMounter};
use docker_volume_vault::{plugin, VolumeDriver};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Install the ring crypto provider before reqwest builds any TLS config
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    observability::init_tracing();

    let config = PluginConfig::from_cli(Cli::parse()).context("Invalid configuration")?;
    info!("Starting docker-volume-vault v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: {:?}", config);

    metrics::register_metrics()?;
    if let Some(port) = config.metrics_port {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        tokio::spawn(async move {
            if let Err(e) = observability::server::serve(addr).await {
                error!("Metrics server failed: {:#}", e);
            }
        });
    }

    tokio::fs::create_dir_all(&config.root)
        .await
        .with_context(|| format!("Failed to create volume root {}", config.root.display()))?;

    let driver = Arc::new(VolumeDriver::new(
        config.root.clone(),
        &config.token,
        Backend {
            factory: Arc::new(config.vault.clone()),
            mounter: Arc::new(FuseMounter::default()),
            variant: config.variant,
        },
    ));

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = stop_tx.send(());
    });

    let served = plugin::serve_unix(&config.socket, Arc::clone(&driver), async {
        let _ = stop_rx.await;
    })
    .await;

    driver.shutdown().await;
    info!("Shut down");
    served
}

/// Wait for SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", err);
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => error!("failed to install SIGTERM handler: {}", err),
        }
    };

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
