//! Plain variant: `secret` is the only fixed directory and nothing is listed.

use super::{normalize, resolve, Attributes, DirEntry, Remote, VirtualFilesystem};
use crate::constants::SECRET_SEGMENT;
use crate::error::{Error, Result};
use crate::vault::SecretClient;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct PlainFs {
    client: Arc<dyn SecretClient>,
}

impl PlainFs {
    pub fn new(client: Arc<dyn SecretClient>) -> Self {
        Self { client }
    }

    fn is_fixed(path: &str) -> bool {
        path.is_empty() || path == SECRET_SEGMENT
    }
}

#[async_trait]
impl VirtualFilesystem for PlainFs {
    async fn attributes_of(&self, path: &str) -> Result<Attributes> {
        let path = normalize(path)?;
        debug!(path = %path, "attributes_of");
        if Self::is_fixed(&path) {
            return Ok(Attributes::directory(0));
        }
        match resolve(self.client.as_ref(), &path).await? {
            Remote::File(value) => Ok(Attributes::file(value.len() as u64)),
            Remote::Directory => Ok(Attributes::directory(0)),
        }
    }

    async fn open_for_read(&self, path: &str) -> Result<Vec<u8>> {
        let path = normalize(path)?;
        debug!(path = %path, "open_for_read");
        if Self::is_fixed(&path) {
            return Err(Error::IsADirectory(path));
        }
        match resolve(self.client.as_ref(), &path).await? {
            Remote::File(value) => Ok(value.into_bytes()),
            Remote::Directory => Err(Error::IsADirectory(path)),
        }
    }

    async fn list_directory(&self, path: &str) -> Result<Vec<DirEntry>> {
        debug!(path, "list_directory");
        Ok(Vec::new())
    }
}
