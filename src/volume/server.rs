//! # Filesystem Servers
//!
//! A [`Mounter`] attaches a virtual filesystem to a mountpoint and hands back
//! the [`ServerHandle`] that owns the background serving loop. Stopping the
//! handle detaches the filesystem from the OS mount table and waits for the
//! loop to finish.

use crate::constants::FS_NAME;
use crate::error::{Error, Result};
use crate::fs::{FuseAdapter, VirtualFilesystem};
use async_trait::async_trait;
use fuser::MountOption;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::info;

/// Running filesystem server for one mounted volume
#[async_trait]
pub trait ServerHandle: Send + std::fmt::Debug {
    /// Detach from the mount table and wait for the serving loop to stop
    async fn stop(self: Box<Self>) -> Result<()>;
}

/// Starts filesystem servers
#[async_trait]
pub trait Mounter: Send + Sync + std::fmt::Debug {
    async fn mount(
        &self,
        fs: Arc<dyn VirtualFilesystem>,
        mountpoint: &Path,
    ) -> Result<Box<dyn ServerHandle>>;
}

/// Mounts volumes through the kernel FUSE driver
#[derive(Debug, Clone)]
pub struct FuseMounter {
    /// Let users other than the plugin's read the volume (containers run
    /// under arbitrary uids)
    pub allow_other: bool,
}

impl Default for FuseMounter {
    fn default() -> Self {
        Self { allow_other: true }
    }
}

impl FuseMounter {
    fn options(&self) -> Vec<MountOption> {
        let mut options = vec![
            MountOption::FSName(FS_NAME.to_string()),
            MountOption::DefaultPermissions,
            MountOption::NoDev,
            MountOption::NoSuid,
        ];
        if self.allow_other {
            options.push(MountOption::AllowOther);
        }
        options
    }
}

#[async_trait]
impl Mounter for FuseMounter {
    async fn mount(
        &self,
        fs: Arc<dyn VirtualFilesystem>,
        mountpoint: &Path,
    ) -> Result<Box<dyn ServerHandle>> {
        let adapter = FuseAdapter::new(fs, Handle::current());
        let options = self.options();
        let target = mountpoint.to_path_buf();

        // Mounting is a blocking syscall; the session then serves on its own thread
        let session = tokio::task::spawn_blocking(move || {
            fuser::spawn_mount2(adapter, &target, &options)
        })
        .await
        .map_err(|e| Error::io("FUSE mount task failed", std::io::Error::other(e)))?
        .map_err(|e| Error::io(format!("mounting FUSE filesystem on {}", mountpoint.display()), e))?;

        info!(mountpoint = %mountpoint.display(), "FUSE session started");
        Ok(Box::new(FuseServer {
            session,
            mountpoint: mountpoint.to_path_buf(),
        }))
    }
}

/// Handle that must be kept as long as the filesystem must remain mounted
pub struct FuseServer {
    session: fuser::BackgroundSession,
    mountpoint: PathBuf,
}

impl std::fmt::Debug for FuseServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FuseServer")
            .field("mountpoint", &self.mountpoint)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ServerHandle for FuseServer {
    async fn stop(self: Box<Self>) -> Result<()> {
        let Self {
            session,
            mountpoint,
        } = *self;
        // join() unmounts and waits for the session thread
        tokio::task::spawn_blocking(move || session.join())
            .await
            .map_err(|e| Error::io("FUSE unmount task failed", std::io::Error::other(e)))?;
        info!(mountpoint = %mountpoint.display(), "FUSE session stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mount_options() {
        let options = FuseMounter::default().options();
        assert!(options.contains(&MountOption::AllowOther));
        assert!(options.contains(&MountOption::FSName("vault".to_string())));
        // Writes must reach the filesystem to be refused with EPERM, so the
        // mount is not flagged read-only
        assert!(!options.contains(&MountOption::RO));

        let options = FuseMounter { allow_other: false }.options();
        assert!(!options.contains(&MountOption::AllowOther));
    }
}
