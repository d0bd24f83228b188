//! # In-Memory Secret Store
//!
//! A process-local stand-in for Vault used by the unit and integration tests.
//! It implements both [`ClientFactory`] and [`SecretClient`], records every
//! registered policy and every token it issues, and can be switched into a
//! failing mode to exercise remote-error paths.

use super::{ClientFactory, Secret, SecretClient};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct State {
    secrets: BTreeMap<String, Option<Map<String, Value>>>,
    mounts: Vec<String>,
    policies: HashMap<String, String>,
    tokens: HashMap<String, Vec<String>>,
    connections: Vec<String>,
}

/// Shared in-memory secret store
#[derive(Debug, Clone, Default)]
pub struct MemorySecretStore {
    state: Arc<Mutex<State>>,
    failing: Arc<AtomicBool>,
    issued: Arc<AtomicUsize>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A panicking test thread must not hide the store from the others
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store `value` under the `value` key at `path`
    pub fn insert(&self, path: &str, value: &str) {
        let mut data = Map::new();
        data.insert(
            crate::constants::VALUE_KEY.to_string(),
            Value::String(value.to_string()),
        );
        self.insert_data(path, data);
    }

    /// Store arbitrary key/value data at `path`
    pub fn insert_data(&self, path: &str, data: Map<String, Value>) {
        self.state().secrets.insert(path.to_string(), Some(data));
    }

    /// Make `path` exist without any data (a path prefix)
    pub fn insert_prefix(&self, path: &str) {
        self.state().secrets.insert(path.to_string(), None);
    }

    pub fn remove(&self, path: &str) {
        self.state().secrets.remove(path);
    }

    pub fn add_mount(&self, name: &str) {
        self.state().mounts.push(name.to_string());
    }

    /// Make every remote call fail until switched back
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Body of a registered policy
    pub fn policy(&self, name: &str) -> Option<String> {
        self.state().policies.get(name).cloned()
    }

    /// Policies attached to an issued token
    pub fn token_policies(&self, token: &str) -> Option<Vec<String>> {
        self.state().tokens.get(token).cloned()
    }

    /// Tokens clients were built with, in order
    pub fn connections(&self) -> Vec<String> {
        self.state().connections.clone()
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(Error::Vault("secret store unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

impl ClientFactory for MemorySecretStore {
    fn connect(&self, token: &str) -> Result<Arc<dyn SecretClient>> {
        self.state().connections.push(token.to_string());
        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl SecretClient for MemorySecretStore {
    async fn read(&self, path: &str) -> Result<Option<Secret>> {
        self.check()?;
        Ok(self
            .state()
            .secrets
            .get(path)
            .map(|data| Secret { data: data.clone() }))
    }

    async fn list_mounts(&self) -> Result<Vec<String>> {
        self.check()?;
        Ok(self.state().mounts.clone())
    }

    async fn put_policy(&self, name: &str, rules: &str) -> Result<()> {
        self.check()?;
        self.state()
            .policies
            .insert(name.to_string(), rules.to_string());
        Ok(())
    }

    async fn issue_token(&self, policies: &[String]) -> Result<String> {
        self.check()?;
        let mut state = self.state();
        if let Some(missing) = policies.iter().find(|p| !state.policies.contains_key(*p)) {
            return Err(Error::Vault(format!("policy {missing} does not exist")));
        }
        let n = self.issued.fetch_add(1, Ordering::SeqCst);
        let token = format!("s.memory-{n}");
        state.tokens.insert(token.clone(), policies.to_vec());
        Ok(token)
    }
}
