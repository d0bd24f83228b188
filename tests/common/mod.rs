//! Shared fixtures for the integration tests.

use async_trait::async_trait;
use docker_volume_vault::fs::{FsVariant, VirtualFilesystem};
use docker_volume_vault::vault::MemorySecretStore;
use docker_volume_vault::volume::{Backend, Mounter, ServerHandle};
use docker_volume_vault::{Result, VolumeDriver};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Mounter that keeps the served filesystem reachable by mountpoint instead
/// of attaching it to the kernel
#[derive(Debug, Clone, Default)]
pub struct CapturingMounter {
    mounted: Arc<Mutex<HashMap<PathBuf, Arc<dyn VirtualFilesystem>>>>,
}

impl CapturingMounter {
    /// Filesystem currently served at `mountpoint`
    pub fn filesystem(&self, mountpoint: &Path) -> Option<Arc<dyn VirtualFilesystem>> {
        self.mounted.lock().unwrap().get(mountpoint).cloned()
    }
}

/// Stops serving when stopped or dropped, the way a FUSE session unmounts
/// when its handle goes away
#[derive(Debug)]
struct CapturedServer {
    mounted: Arc<Mutex<HashMap<PathBuf, Arc<dyn VirtualFilesystem>>>>,
    mountpoint: PathBuf,
}

#[async_trait]
impl ServerHandle for CapturedServer {
    async fn stop(self: Box<Self>) -> Result<()> {
        drop(self);
        Ok(())
    }
}

impl Drop for CapturedServer {
    fn drop(&mut self) {
        self.mounted.lock().unwrap().remove(&self.mountpoint);
    }
}

#[async_trait]
impl Mounter for CapturingMounter {
    async fn mount(
        &self,
        fs: Arc<dyn VirtualFilesystem>,
        mountpoint: &Path,
    ) -> Result<Box<dyn ServerHandle>> {
        self.mounted
            .lock()
            .unwrap()
            .insert(mountpoint.to_path_buf(), fs);
        Ok(Box::new(CapturedServer {
            mounted: Arc::clone(&self.mounted),
            mountpoint: mountpoint.to_path_buf(),
        }))
    }
}

pub struct Harness {
    pub root: tempfile::TempDir,
    pub vault: MemorySecretStore,
    pub mounter: CapturingMounter,
    pub driver: Arc<VolumeDriver>,
}

pub fn harness(variant: FsVariant) -> Harness {
    let root = tempfile::tempdir().unwrap();
    let vault = MemorySecretStore::new();
    let mounter = CapturingMounter::default();
    let driver = Arc::new(VolumeDriver::new(
        root.path(),
        "s.root",
        Backend {
            factory: Arc::new(vault.clone()),
            mounter: Arc::new(mounter.clone()),
            variant,
        },
    ));
    Harness {
        root,
        vault,
        mounter,
        driver,
    }
}
