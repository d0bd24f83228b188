//! # Volume Store
//!
//! Registry of volumes by name. The store lock is held only for the map
//! access itself; callers get `Arc<Volume>` handles and do all mount work
//! outside of it.

use crate::error::{Error, Result};
use crate::volume::Volume;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct VolumeStore {
    volumes: Mutex<HashMap<String, Arc<Volume>>>,
}

impl VolumeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn volumes(&self) -> MutexGuard<'_, HashMap<String, Arc<Volume>>> {
        // The map stays consistent across a panic: every access is a single
        // insert, remove or read
        self.volumes.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, name: &str) -> Result<Arc<Volume>> {
        self.volumes()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Volume {name}")))
    }

    /// Register a new volume; fails if the name is taken
    pub fn create(&self, volume: Volume) -> Result<Arc<Volume>> {
        let mut volumes = self.volumes();
        if volumes.contains_key(volume.name()) {
            return Err(Error::AlreadyExists(volume.name().to_string()));
        }
        let volume = Arc::new(volume);
        volumes.insert(volume.name().to_string(), Arc::clone(&volume));
        Ok(volume)
    }

    /// Insert or overwrite the volume under its name
    pub fn replace(&self, volume: Volume) -> Arc<Volume> {
        let volume = Arc::new(volume);
        self.volumes()
            .insert(volume.name().to_string(), Arc::clone(&volume));
        volume
    }

    /// Remove the named volume, if registered
    pub fn delete(&self, name: &str) -> Option<Arc<Volume>> {
        self.volumes().remove(name)
    }

    /// Snapshot of every registered volume, ordered by name
    pub fn list(&self) -> Vec<Arc<Volume>> {
        let mut volumes: Vec<_> = self.volumes().values().cloned().collect();
        volumes.sort_by(|a, b| a.name().cmp(b.name()));
        volumes
    }
}
