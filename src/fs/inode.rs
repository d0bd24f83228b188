//! Inode allocation for the FUSE bridge.
//!
//! Maps paths to inode numbers for one FUSE session. The root directory
//! always has inode 1; other inodes are handed out in order and never reused.
//! Each inode carries the kernel's lookup count and is released once the
//! kernel forgets every lookup, so the table only holds paths the kernel
//! still references. A path looked up again after that gets a fresh inode.

use std::collections::HashMap;

use crate::constants::ROOT_INODE;

#[derive(Debug)]
pub struct InodeTable {
    paths: HashMap<u64, String>,
    inodes: HashMap<String, u64>,
    /// Lookups the kernel has not forgotten yet
    lookups: HashMap<u64, u64>,
    next: u64,
}

impl InodeTable {
    pub fn new() -> Self {
        let mut paths = HashMap::new();
        let mut inodes = HashMap::new();
        paths.insert(ROOT_INODE, String::new());
        inodes.insert(String::new(), ROOT_INODE);
        Self {
            paths,
            inodes,
            lookups: HashMap::new(),
            next: ROOT_INODE + 1,
        }
    }

    /// Inode of `path`, allocating one when the path is new
    pub fn intern(&mut self, path: &str) -> u64 {
        if let Some(&ino) = self.inodes.get(path) {
            return ino;
        }
        let ino = self.next;
        self.next += 1;
        self.paths.insert(ino, path.to_string());
        self.inodes.insert(path.to_string(), ino);
        ino
    }

    /// Inode of `path` for a kernel lookup reply; counts one lookup
    pub fn lookup(&mut self, path: &str) -> u64 {
        let ino = self.intern(path);
        *self.lookups.entry(ino).or_default() += 1;
        ino
    }

    /// Drop `nlookup` lookups of `ino`, releasing it when none remain
    ///
    /// Returns whether the inode was released. The root is never released.
    pub fn forget(&mut self, ino: u64, nlookup: u64) -> bool {
        if ino == ROOT_INODE {
            return false;
        }
        let remaining = match self.lookups.get_mut(&ino) {
            Some(count) => {
                *count = count.saturating_sub(nlookup);
                *count
            }
            None => 0,
        };
        if remaining > 0 {
            return false;
        }
        self.lookups.remove(&ino);
        match self.paths.remove(&ino) {
            Some(path) => {
                self.inodes.remove(&path);
                true
            }
            None => false,
        }
    }

    /// Number of inodes held, the root included
    pub fn held(&self) -> usize {
        self.paths.len()
    }

    pub fn path(&self, ino: u64) -> Option<&str> {
        self.paths.get(&ino).map(String::as_str)
    }

    /// Path of `name` inside the directory `parent`
    pub fn child_path(&self, parent: u64, name: &str) -> Option<String> {
        let parent = self.path(parent)?;
        Some(if parent.is_empty() {
            name.to_string()
        } else {
            format!("{parent}/{name}")
        })
    }

    /// Inode of the directory containing `ino` (the root is its own parent)
    pub fn parent(&self, ino: u64) -> u64 {
        self.path(ino)
            .and_then(|path| path.rsplit_once('/'))
            .and_then(|(parent, _)| self.inodes.get(parent).copied())
            .unwrap_or(ROOT_INODE)
    }
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}
