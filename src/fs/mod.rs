//! # Virtual Filesystem
//!
//! Read-only projection of a Vault secret hierarchy onto filesystem
//! semantics.
//!
//! Paths map directly to Vault logical paths:
//! - `secret/db/password` -> `GET /v1/secret/db/password`
//! - a secret with a scalar `value` is a file holding that value
//! - a path that exists without data is a directory placeholder
//!
//! Every call is a live round trip to Vault. Nothing is cached and the
//! adaptors hold no mutable state, so any number of callers may share one.
//!
//! Two variants exist, selected with [`FsVariant`]:
//! - [`PlainFs`] - `secret` is the only fixed directory, the root lists empty
//! - [`EnumeratingFs`] - adds `sys`, lists Vault mount points at the root and
//!   terminates file content with a newline

mod enumerating;
pub mod fuse;
mod inode;
mod plain;

pub use enumerating::EnumeratingFs;
pub use fuse::FuseAdapter;
pub use plain::PlainFs;

use crate::constants::{DIR_MODE, FILE_MODE, VALUE_KEY};
use crate::error::{Error, Result};
use crate::vault::SecretClient;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Kind of a virtual node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Directory,
    File,
}

/// Attributes of a virtual node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attributes {
    pub kind: NodeKind,
    pub size: u64,
    /// Permission bits
    pub mode: u16,
}

impl Attributes {
    pub fn directory(size: u64) -> Self {
        Self {
            kind: NodeKind::Directory,
            size,
            mode: DIR_MODE,
        }
    }

    pub fn file(size: u64) -> Self {
        Self {
            kind: NodeKind::File,
            size,
            mode: FILE_MODE,
        }
    }
}

/// Directory listing entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: NodeKind,
}

/// Read-only filesystem over a secret store
///
/// Paths are relative to the mount root; the empty path is the root itself.
#[async_trait]
pub trait VirtualFilesystem: Send + Sync + std::fmt::Debug {
    async fn attributes_of(&self, path: &str) -> Result<Attributes>;

    /// Content of the file at `path`
    async fn open_for_read(&self, path: &str) -> Result<Vec<u8>>;

    async fn list_directory(&self, path: &str) -> Result<Vec<DirEntry>>;

    async fn create(&self, path: &str) -> Result<()> {
        Err(Error::PermissionDenied(path.to_string()))
    }

    async fn write(&self, path: &str, _data: &[u8]) -> Result<usize> {
        Err(Error::PermissionDenied(path.to_string()))
    }

    async fn remove(&self, path: &str) -> Result<()> {
        Err(Error::PermissionDenied(path.to_string()))
    }
}

/// Filesystem variant selected at mount time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FsVariant {
    Plain,
    #[default]
    Enumerating,
}

impl FsVariant {
    pub fn build(self, client: Arc<dyn SecretClient>) -> Arc<dyn VirtualFilesystem> {
        match self {
            FsVariant::Plain => Arc::new(PlainFs::new(client)),
            FsVariant::Enumerating => Arc::new(EnumeratingFs::new(client)),
        }
    }
}

impl std::str::FromStr for FsVariant {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plain" => Ok(FsVariant::Plain),
            "enumerating" => Ok(FsVariant::Enumerating),
            other => Err(format!(
                "unknown filesystem variant '{other}' (expected 'plain' or 'enumerating')"
            )),
        }
    }
}

impl std::fmt::Display for FsVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FsVariant::Plain => f.write_str("plain"),
            FsVariant::Enumerating => f.write_str("enumerating"),
        }
    }
}

/// Normalize a filesystem path into a Vault path
///
/// Leading, trailing and repeated separators and `.` components are dropped.
/// `..` never reaches Vault; it resolves to `NotFound`.
pub(crate) fn normalize(path: &str) -> Result<String> {
    let mut parts = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => return Err(Error::NotFound(path.to_string())),
            name => parts.push(name),
        }
    }
    Ok(parts.join("/"))
}

/// What a remote path resolved to
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Remote {
    Directory,
    File(String),
}

/// Read a non-fixed path from the secret store; `None` when Vault has no
/// secret there
///
/// Read errors are reported as `NotFound`: to the filesystem a path Vault
/// refuses to read does not exist.
pub(crate) async fn lookup(client: &dyn SecretClient, path: &str) -> Result<Option<Remote>> {
    match client.read(path).await {
        Ok(Some(secret)) => Ok(Some(match secret.scalar(VALUE_KEY) {
            Some(value) => Remote::File(value),
            None => Remote::Directory,
        })),
        Ok(None) => Ok(None),
        Err(e) => {
            debug!(path, error = %e, "secret read failed");
            Err(Error::NotFound(path.to_string()))
        }
    }
}

/// Resolve a non-fixed path against the secret store, absent paths included
pub(crate) async fn resolve(client: &dyn SecretClient, path: &str) -> Result<Remote> {
    lookup(client, path)
        .await?
        .ok_or_else(|| Error::NotFound(path.to_string()))
}
