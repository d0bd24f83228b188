//! # Backend Metrics
//!
//! Metrics for the work done on behalf of mounted volumes: Vault API
//! requests and kernel filesystem operations.

use crate::observability::metrics::registry::REGISTRY;
use anyhow::Result;
use prometheus::IntCounterVec;
use std::sync::LazyLock;

static VAULT_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "docker_volume_vault_vault_requests_total",
            "Total number of Vault API requests by operation and outcome",
        ),
        &["operation", "outcome"],
    )
    .expect("Failed to create VAULT_REQUESTS_TOTAL metric - this should never happen")
});

static FS_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "docker_volume_vault_fs_operations_total",
            "Total number of filesystem operations by operation and result",
        ),
        &["operation", "result"],
    )
    .expect("Failed to create FS_OPERATIONS_TOTAL metric - this should never happen")
});

pub(crate) fn register_backend_metrics() -> Result<()> {
    REGISTRY.register(Box::new(VAULT_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(FS_OPERATIONS_TOTAL.clone()))?;
    Ok(())
}

pub fn record_vault_request(operation: &str, outcome: &str) {
    VAULT_REQUESTS_TOTAL
        .with_label_values(&[operation, outcome])
        .inc();
}

pub fn record_fs_operation(operation: &str, result: &str) {
    FS_OPERATIONS_TOTAL.with_label_values(&[operation, result]).inc();
}
