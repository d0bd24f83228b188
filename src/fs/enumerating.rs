//! Enumerating variant: lists Vault mount points at the root, treats `sys`
//! as a fixed directory and terminates every file with a newline.

use super::{lookup, normalize, resolve, Attributes, DirEntry, NodeKind, Remote, VirtualFilesystem};
use crate::constants::{SECRET_SEGMENT, SYS_SEGMENT};
use crate::error::{Error, Result};
use crate::vault::SecretClient;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct EnumeratingFs {
    client: Arc<dyn SecretClient>,
}

impl EnumeratingFs {
    pub fn new(client: Arc<dyn SecretClient>) -> Self {
        Self { client }
    }

    fn is_fixed_segment(path: &str) -> bool {
        path == SECRET_SEGMENT || path == SYS_SEGMENT
    }

    /// Paths below `secret/` that Vault knows nothing about are intermediate
    /// components of nested secret paths. Vault answers 404 for those.
    fn is_secret_prefix(path: &str) -> bool {
        path.strip_prefix(SECRET_SEGMENT)
            .is_some_and(|rest| rest.starts_with('/'))
    }

    fn render(value: String) -> String {
        value + "\n"
    }
}

#[async_trait]
impl VirtualFilesystem for EnumeratingFs {
    async fn attributes_of(&self, path: &str) -> Result<Attributes> {
        let path = normalize(path)?;
        debug!(path = %path, "attributes_of");
        if path.is_empty() {
            // Directory size reports the number of mounts
            let mounts = match self.client.list_mounts().await {
                Ok(mounts) => mounts.len() as u64,
                Err(e) => {
                    warn!(error = %e, "failed to list mounts");
                    0
                }
            };
            return Ok(Attributes::directory(mounts));
        }
        if Self::is_fixed_segment(&path) {
            return Ok(Attributes::directory(1));
        }
        match lookup(self.client.as_ref(), &path).await? {
            Some(Remote::File(value)) => Ok(Attributes::file(Self::render(value).len() as u64)),
            Some(Remote::Directory) => Ok(Attributes::directory(1)),
            None if Self::is_secret_prefix(&path) => Ok(Attributes::directory(1)),
            None => Err(Error::NotFound(path)),
        }
    }

    async fn open_for_read(&self, path: &str) -> Result<Vec<u8>> {
        let path = normalize(path)?;
        debug!(path = %path, "open_for_read");
        if path.is_empty() || Self::is_fixed_segment(&path) {
            return Err(Error::IsADirectory(path));
        }
        match resolve(self.client.as_ref(), &path).await? {
            Remote::File(value) => Ok(Self::render(value).into_bytes()),
            Remote::Directory => Err(Error::IsADirectory(path)),
        }
    }

    async fn list_directory(&self, path: &str) -> Result<Vec<DirEntry>> {
        let path = normalize(path)?;
        debug!(path = %path, "list_directory");
        if !path.is_empty() {
            return Ok(Vec::new());
        }
        let mounts = match self.client.list_mounts().await {
            Ok(mounts) => mounts,
            Err(e) => {
                warn!(error = %e, "failed to list mounts");
                return Ok(Vec::new());
            }
        };
        Ok(mounts
            .into_iter()
            .map(|name| DirEntry {
                name: name.trim_end_matches('/').to_string(),
                kind: NodeKind::Directory,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::MemorySecretStore;

    fn fs() -> (MemorySecretStore, EnumeratingFs) {
        let store = MemorySecretStore::new();
        let fs = EnumeratingFs::new(Arc::new(store.clone()));
        (store, fs)
    }

    #[tokio::test]
    async fn test_fixed_directories() {
        let (store, fs) = fs();
        store.set_failing(true);

        for path in ["", "secret", "sys"] {
            assert_eq!(
                fs.attributes_of(path).await.unwrap().kind,
                NodeKind::Directory,
                "{path} should be a directory"
            );
            assert!(matches!(
                fs.open_for_read(path).await.unwrap_err(),
                Error::IsADirectory(_)
            ));
        }
    }

    #[tokio::test]
    async fn test_file_content_has_trailing_newline() {
        let (store, fs) = fs();
        store.insert("secret/foo", "bar");

        assert_eq!(fs.attributes_of("secret/foo").await.unwrap(), Attributes::file(4));
        assert_eq!(fs.open_for_read("secret/foo").await.unwrap(), b"bar\n");
    }

    #[tokio::test]
    async fn test_content_tracks_remote_changes() {
        let (store, fs) = fs();
        store.insert("secret/foo", "one");
        assert_eq!(fs.open_for_read("secret/foo").await.unwrap(), b"one\n");

        store.insert("secret/foo", "two");
        assert_eq!(fs.open_for_read("secret/foo").await.unwrap(), b"two\n");

        store.remove("secret/foo");
        assert!(matches!(
            fs.open_for_read("secret/foo").await.unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_placeholder_directory_and_remote_failure() {
        let (store, fs) = fs();
        store.insert_prefix("secret/app");

        assert_eq!(
            fs.attributes_of("secret/app").await.unwrap().kind,
            NodeKind::Directory
        );

        store.set_failing(true);
        assert!(matches!(
            fs.attributes_of("secret/app").await.unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_nested_secret_reachable_through_prefixes() {
        let (store, fs) = fs();
        store.insert("secret/db/password", "hunter2");

        for prefix in ["secret/db", "secret/db/"] {
            assert_eq!(
                fs.attributes_of(prefix).await.unwrap(),
                Attributes::directory(1),
                "{prefix} should be a directory"
            );
        }
        assert_eq!(
            fs.attributes_of("secret/db/password").await.unwrap(),
            Attributes::file(8)
        );
        assert_eq!(
            fs.open_for_read("secret/db/password").await.unwrap(),
            b"hunter2\n"
        );
    }

    #[tokio::test]
    async fn test_absent_paths_cannot_be_opened() {
        let (store, fs) = fs();
        store.insert("secret/db/password", "hunter2");

        assert!(matches!(
            fs.open_for_read("secret/db").await.unwrap_err(),
            Error::NotFound(_)
        ));
        assert!(matches!(
            fs.open_for_read("secret/db/missing").await.unwrap_err(),
            Error::NotFound(_)
        ));
        // Outside `secret/` an absent path does not exist
        assert!(matches!(
            fs.attributes_of("cubbyhole/missing").await.unwrap_err(),
            Error::NotFound(_)
        ));
        assert!(matches!(
            fs.attributes_of("secretive").await.unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_root_lists_mounts_without_separator() {
        let (store, fs) = fs();
        store.add_mount("secret/");
        store.add_mount("cubbyhole/");

        let names: Vec<_> = fs
            .list_directory("")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["secret", "cubbyhole"]);
        assert_eq!(fs.attributes_of("").await.unwrap().size, 2);
    }

    #[tokio::test]
    async fn test_below_root_lists_nothing() {
        let (store, fs) = fs();
        store.add_mount("secret/");
        store.insert("secret/foo", "bar");

        assert!(fs.list_directory("secret").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mutations_are_denied() {
        let (store, fs) = fs();
        store.insert("secret/foo", "bar");

        for path in ["", "secret", "secret/foo", "secret/new"] {
            assert!(matches!(
                fs.create(path).await.unwrap_err(),
                Error::PermissionDenied(_)
            ));
            assert!(matches!(
                fs.write(path, b"x").await.unwrap_err(),
                Error::PermissionDenied(_)
            ));
            assert!(matches!(
                fs.remove(path).await.unwrap_err(),
                Error::PermissionDenied(_)
            ));
        }
        assert_eq!(fs.open_for_read("secret/foo").await.unwrap(), b"bar\n");
    }
}
