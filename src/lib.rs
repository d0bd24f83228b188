//! # Docker Volume Vault
//!
//! A Docker volume plugin that exposes HashiCorp Vault secrets as a
//! read-only filesystem.
//!
//! Each Docker volume is backed by a Vault token. Mounting a volume serves a
//! FUSE filesystem at `<root>/<name>` whose files are Vault paths: reading
//! `secret/db/password` returns the `value` field of the secret stored at
//! that path, fetched from Vault on every open.
//!
//! ## Layout
//!
//! - [`plugin`] - Docker plugin protocol over a Unix socket
//! - [`driver`] - volume operations (create, mount, ...) and policy provisioning
//! - [`store`] / [`volume`] - the volume registry and per-volume mount lifecycle
//! - [`fs`] - virtual filesystem variants and the FUSE bridge
//! - [`vault`] - secret store client and an in-memory stand-in

pub mod config;
pub mod constants;
pub mod driver;
pub mod error;
pub mod fs;
pub mod observability;
pub mod plugin;
pub mod policy;
pub mod store;
pub mod vault;
pub mod volume;

pub use driver::VolumeDriver;
pub use error::{Error, ErrorKind, Result};
