//! # Metrics Module
//!
//! Prometheus metrics for monitoring the plugin, organized by responsibility.
//!
//! ## Sub-modules
//!
//! - `registry` - Metrics registry setup, registration and text rendering
//! - `volume_metrics` - Driver operations and mounted volumes
//! - `backend_metrics` - Vault requests and filesystem operations

pub mod backend_metrics;
pub mod registry;
pub mod volume_metrics;

pub use backend_metrics::*;
pub use registry::*;
pub use volume_metrics::*;
