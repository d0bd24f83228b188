//! # Secret Store Client
//!
//! The secret store is consumed through two traits:
//!
//! - [`SecretClient`] - an authenticated handle exposing path reads,
//!   mount-point enumeration, and policy/token issuance
//! - [`ClientFactory`] - builds a `SecretClient` authenticated with a
//!   given token (the start-up token, or a volume's scoped token)
//!
//! [`VaultClient`] talks to Vault over its REST API. [`MemorySecretStore`]
//! keeps everything in process and backs the test suites.

mod client;
pub mod memory;
mod types;

pub use client::{VaultClient, VaultConfig};
pub use memory::MemorySecretStore;

use crate::error::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Secret data returned by a path read
///
/// `data` is absent when the path exists but carries no key/value payload
/// (a path prefix rather than a leaf).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Secret {
    pub data: Option<Map<String, Value>>,
}

impl Secret {
    pub fn new(data: Map<String, Value>) -> Self {
        Self { data: Some(data) }
    }

    /// Scalar text stored under `key`, if any
    ///
    /// Strings are returned verbatim; numbers and booleans as their JSON
    /// text. Objects, arrays and null are not scalar.
    pub fn scalar(&self, key: &str) -> Option<String> {
        match self.data.as_ref()?.get(key)? {
            Value::String(s) => Some(s.clone()),
            v @ (Value::Number(_) | Value::Bool(_)) => Some(v.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }
}

/// Authenticated handle to the secret store
#[async_trait]
pub trait SecretClient: Send + Sync + std::fmt::Debug {
    /// Read the secret at `path`; `None` when nothing exists there
    async fn read(&self, path: &str) -> Result<Option<Secret>>;

    /// Names of the configured secret engine mount points (e.g. `secret/`)
    async fn list_mounts(&self) -> Result<Vec<String>>;

    /// Register (or overwrite) an access policy
    async fn put_policy(&self, name: &str, rules: &str) -> Result<()>;

    /// Issue a new token carrying the given policies
    async fn issue_token(&self, policies: &[String]) -> Result<String>;
}

/// Builds secret store clients for a token
pub trait ClientFactory: Send + Sync + std::fmt::Debug {
    fn connect(&self, token: &str) -> Result<Arc<dyn SecretClient>>;
}
