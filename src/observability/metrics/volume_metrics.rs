//! # Volume Metrics
//!
//! Metrics for the volume driver: protocol operations by outcome and the
//! number of volumes currently mounted.

use crate::observability::metrics::registry::REGISTRY;
use anyhow::Result;
use prometheus::{IntCounterVec, IntGauge};
use std::sync::LazyLock;

static DRIVER_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "docker_volume_vault_driver_operations_total",
            "Total number of volume driver operations by operation and outcome",
        ),
        &["operation", "outcome"],
    )
    .expect("Failed to create DRIVER_OPERATIONS_TOTAL metric - this should never happen")
});

static MOUNTED_VOLUMES: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "docker_volume_vault_mounted_volumes",
        "Number of volumes with a running filesystem server",
    )
    .expect("Failed to create MOUNTED_VOLUMES metric - this should never happen")
});

pub(crate) fn register_volume_metrics() -> Result<()> {
    REGISTRY.register(Box::new(DRIVER_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(MOUNTED_VOLUMES.clone()))?;
    Ok(())
}

/// Count a driver operation; `outcome` is `ok` or an error kind
pub fn record_driver_operation(operation: &str, outcome: &str) {
    DRIVER_OPERATIONS_TOTAL
        .with_label_values(&[operation, outcome])
        .inc();
}

pub fn increment_mounted_volumes() {
    MOUNTED_VOLUMES.inc();
}

pub fn decrement_mounted_volumes() {
    MOUNTED_VOLUMES.dec();
}
