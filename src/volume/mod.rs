//! # Volumes
//!
//! A [`Volume`] is the per-name record behind a Docker volume: its Vault
//! token, its creation options and, while mounted, the server handle of the
//! filesystem serving it.
//!
//! Mount and unmount run under the volume's own lock, so transitions of one
//! volume are serialized while distinct volumes proceed in parallel. There
//! is no externally visible "mounting" state: a concurrent mount waits for
//! the lock and then sees the finished transition.

mod server;

pub use server::{FuseMounter, FuseServer, Mounter, ServerHandle};

use crate::error::{Error, Result};
use crate::fs::FsVariant;
use crate::observability::metrics;
use crate::vault::ClientFactory;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// What a volume needs to serve its filesystem
#[derive(Debug, Clone)]
pub struct Backend {
    pub factory: Arc<dyn ClientFactory>,
    pub mounter: Arc<dyn Mounter>,
    pub variant: FsVariant,
}

#[derive(Debug)]
struct ActiveMount {
    server: Box<dyn ServerHandle>,
    mountpoint: PathBuf,
}

/// A named volume
pub struct Volume {
    name: String,
    token: Zeroizing<String>,
    options: HashMap<String, String>,
    /// Present iff mounted
    active: Mutex<Option<ActiveMount>>,
    /// Mirror of `active.is_some()`, readable without the lock
    mounted: AtomicBool,
}

impl std::fmt::Debug for Volume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Volume")
            .field("name", &self.name)
            .field("options", &self.options.keys().collect::<Vec<_>>())
            .field("mounted", &self.mounted())
            .finish_non_exhaustive()
    }
}

impl Volume {
    pub fn new(name: impl Into<String>, token: &str, options: HashMap<String, String>) -> Self {
        Self {
            name: name.into(),
            token: Zeroizing::new(token.to_string()),
            options,
            active: Mutex::new(None),
            mounted: AtomicBool::new(false),
        }
    }

    /// Copy of this (unmounted) volume carrying a different token
    pub fn with_token(&self, token: &str) -> Self {
        Self::new(self.name.clone(), token, self.options.clone())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn options(&self) -> &HashMap<String, String> {
        &self.options
    }

    /// Point-in-time check whether a server is running
    ///
    /// Advisory only: the answer may be stale by the time it is used.
    pub fn mounted(&self) -> bool {
        self.mounted.load(Ordering::Acquire)
    }

    /// Mountpoint of the running server, if any
    pub async fn current_mountpoint(&self) -> Option<PathBuf> {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|active| active.mountpoint.clone())
    }

    /// Mount the volume under `root`, returning the mountpoint
    ///
    /// Idempotent: mounting a mounted volume returns the existing mountpoint
    /// without starting a second server. On failure the volume stays
    /// unmounted; a mountpoint directory created on the way is left behind.
    pub async fn mount(&self, root: &Path, backend: &Backend) -> Result<PathBuf> {
        let mut active = self.active.lock().await;
        if let Some(current) = active.as_ref() {
            debug!(volume = %self.name, "volume already mounted");
            return Ok(current.mountpoint.clone());
        }

        let mountpoint = root.join(&self.name);
        info!(
            volume = %self.name,
            mountpoint = %mountpoint.display(),
            "Mounting volume"
        );
        prepare_mountpoint(&mountpoint).await?;

        let client = backend.factory.connect(&self.token)?;
        let fs = backend.variant.build(client);
        let server = backend.mounter.mount(fs, &mountpoint).await?;

        *active = Some(ActiveMount {
            server,
            mountpoint: mountpoint.clone(),
        });
        self.mounted.store(true, Ordering::Release);
        metrics::increment_mounted_volumes();
        Ok(mountpoint)
    }

    /// Stop the filesystem server; a no-op when not mounted
    ///
    /// The volume reports mounted until the server has stopped. A failed stop
    /// still consumes the handle, so the volume ends up unmounted either way
    /// and the error is returned.
    pub async fn unmount(&self) -> Result<()> {
        let mut active = self.active.lock().await;
        let Some(current) = active.take() else {
            debug!(volume = %self.name, "volume not mounted, nothing to unmount");
            return Ok(());
        };

        info!(
            volume = %self.name,
            mountpoint = %current.mountpoint.display(),
            "Unmounting volume"
        );
        let result = current.server.stop().await;
        if let Err(e) = &result {
            warn!(
                volume = %self.name,
                mountpoint = %current.mountpoint.display(),
                error = %e,
                "Server stop failed, the kernel mount may still be present"
            );
        }
        self.mounted.store(false, Ordering::Release);
        metrics::decrement_mounted_volumes();
        result
    }
}

/// Make sure `path` is a directory, creating it and its ancestors if absent
async fn prepare_mountpoint(path: &Path) -> Result<()> {
    match tokio::fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(Error::io(
            format!("{} already exists", path.display()),
            std::io::Error::new(std::io::ErrorKind::AlreadyExists, "not a directory"),
        )),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| Error::io(format!("creating mountpoint {}", path.display()), e)),
        Err(e) => Err(Error::io(
            format!("inspecting mountpoint {}", path.display()),
            e,
        )),
    }
}
