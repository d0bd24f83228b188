//! # Volume Driver
//!
//! Implements the Docker volume operations on top of the [`VolumeStore`].
//!
//! Volumes are created with the plugin's start-up token. When a volume is
//! created with `policy-rules`, the driver registers the policy in Vault,
//! requests a token scoped to it and swaps the stored volume for one carrying
//! that token, so containers only ever see what the policy grants.

use crate::constants::{OPT_POLICY_NAME, OPT_POLICY_RULES, VOLUME_SCOPE};
use crate::error::{Error, Result};
use crate::observability::metrics;
use crate::policy::{policy_name, resolve_rules};
use crate::store::VolumeStore;
use crate::volume::{Backend, Volume};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use zeroize::Zeroizing;

/// Externally visible state of one volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeInfo {
    pub name: String,
    /// Set only while mounted
    pub mountpoint: Option<PathBuf>,
}

/// Volume driver capabilities
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub scope: &'static str,
}

pub struct VolumeDriver {
    root: PathBuf,
    token: Zeroizing<String>,
    store: VolumeStore,
    /// Removed volumes whose filesystem server is still running
    detached: Mutex<Vec<Arc<Volume>>>,
    backend: Backend,
}

impl std::fmt::Debug for VolumeDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolumeDriver")
            .field("root", &self.root)
            .field("store", &self.store)
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

fn observe<T>(operation: &str, result: &Result<T>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) => {
            warn!(operation, kind = e.kind().as_str(), "{}", e);
            e.kind().as_str()
        }
    };
    metrics::record_driver_operation(operation, outcome);
}

/// Reject names that would place the mountpoint outside the volume root
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') || name.contains('\0')
    {
        return Err(Error::InvalidConfiguration(format!(
            "invalid volume name {name:?}"
        )));
    }
    Ok(())
}

impl VolumeDriver {
    /// Create a driver serving volumes under `root`
    ///
    /// `token` is the start-up Vault token: new volumes carry it, and policy
    /// provisioning authenticates with it.
    pub fn new(root: impl Into<PathBuf>, token: &str, backend: Backend) -> Self {
        Self {
            root: root.into(),
            token: Zeroizing::new(token.to_string()),
            store: VolumeStore::new(),
            detached: Mutex::new(Vec::new()),
            backend,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Register a volume, provisioning a scoped token when asked to
    ///
    /// A provisioning failure is returned to the caller, but the volume
    /// stays registered with the start-up token.
    pub async fn create(&self, name: &str, options: HashMap<String, String>) -> Result<()> {
        let result = self.create_inner(name, options).await;
        observe("create", &result);
        result
    }

    async fn create_inner(&self, name: &str, options: HashMap<String, String>) -> Result<()> {
        validate_name(name)?;
        let volume = self.store.create(Volume::new(name, &self.token, options))?;
        info!(volume = %name, "Created volume");

        let Some(rules) = volume.options().get(OPT_POLICY_RULES) else {
            return Ok(());
        };
        let policy = policy_name(
            name,
            volume.options().get(OPT_POLICY_NAME).map(String::as_str),
        );
        let token = Zeroizing::new(self.provision(&policy, rules).await?);

        self.store.replace(volume.with_token(&token));
        info!(volume = %name, policy = %policy, "Volume token scoped to policy");
        Ok(())
    }

    /// Register the policy and mint a token restricted to it
    async fn provision(&self, policy: &str, rules: &str) -> Result<String> {
        let rules = resolve_rules(rules).await?;
        let client = self.backend.factory.connect(&self.token)?;
        client.put_policy(policy, &rules).await?;
        client.issue_token(&[policy.to_string()]).await
    }

    /// Unregister a volume
    ///
    /// Succeeds whether or not the volume exists. A running filesystem
    /// server is not stopped: the driver keeps the volume until shutdown.
    pub fn remove(&self, name: &str) -> Result<()> {
        if let Some(volume) = self.store.delete(name) {
            if volume.mounted() {
                warn!(volume = %name, "Removed volume is still mounted");
                self.detached().push(volume);
            }
            info!(volume = %name, "Removed volume");
        }
        metrics::record_driver_operation("remove", "ok");
        Ok(())
    }

    /// Where the volume is (or would be) mounted
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub async fn mount(&self, name: &str) -> Result<PathBuf> {
        let result = async {
            let volume = self.store.get(name)?;
            volume.mount(&self.root, &self.backend).await
        }
        .await;
        observe("mount", &result);
        result
    }

    pub async fn unmount(&self, name: &str) -> Result<()> {
        let result = async {
            let volume = self.store.get(name)?;
            volume.unmount().await
        }
        .await;
        observe("unmount", &result);
        result
    }

    pub async fn get(&self, name: &str) -> Result<VolumeInfo> {
        let volume = self.store.get(name)?;
        Ok(VolumeInfo {
            name: volume.name().to_string(),
            mountpoint: volume.current_mountpoint().await,
        })
    }

    pub async fn list(&self) -> Vec<VolumeInfo> {
        let mut infos = Vec::new();
        for volume in self.store.list() {
            infos.push(VolumeInfo {
                name: volume.name().to_string(),
                mountpoint: volume.current_mountpoint().await,
            });
        }
        infos
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            scope: VOLUME_SCOPE,
        }
    }

    fn detached(&self) -> std::sync::MutexGuard<'_, Vec<Arc<Volume>>> {
        self.detached.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Unmount every mounted volume, removed ones included; failures are
    /// logged
    pub async fn shutdown(&self) {
        let detached = std::mem::take(&mut *self.detached());
        let volumes: Vec<_> = self
            .store
            .list()
            .into_iter()
            .chain(detached)
            .filter(|v| v.mounted())
            .collect();
        info!("Unmounting {} volume(s)", volumes.len());

        let results =
            futures::future::join_all(volumes.iter().map(|volume| volume.unmount())).await;
        for (volume, result) in volumes.iter().zip(results) {
            if let Err(e) = result {
                warn!(volume = %volume.name(), "Failed to unmount volume on shutdown: {}", e);
            }
        }
    }
}
