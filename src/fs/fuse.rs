//! FUSE bridge.
//!
//! Implements the fuser `Filesystem` trait on top of any
//! [`VirtualFilesystem`]. The kernel talks in inodes and file handles, the
//! adaptor in paths; this module keeps the mapping between the two and
//! drives the async adaptor from the FUSE session thread.

use super::inode::InodeTable;
use super::{Attributes, NodeKind, VirtualFilesystem};
use crate::constants::{ATTR_TTL, BLOCK_SIZE, ROOT_INODE};
use crate::error::{Error, Result};
use crate::observability::metrics;
use fuser::{
    FileAttr, FileType, Filesystem, KernelConfig, ReplyAttr, ReplyCreate, ReplyData,
    ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen, ReplyWrite, Request, TimeOrNow,
};
use libc::c_int;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::runtime::Handle;
use tracing::{debug, info, trace};

/// `fuser::Filesystem` over a virtual secret filesystem
pub struct FuseAdapter {
    fs: Arc<dyn VirtualFilesystem>,
    runtime: Handle,
    inodes: InodeTable,
    /// Content of open files, keyed by file handle
    handles: HashMap<u64, Vec<u8>>,
    next_fh: u64,
    uid: u32,
    gid: u32,
}

impl std::fmt::Debug for FuseAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FuseAdapter")
            .field("fs", &self.fs)
            .field("open_handles", &self.handles.len())
            .finish_non_exhaustive()
    }
}

impl FuseAdapter {
    /// Create an adapter that runs adaptor calls on `runtime`
    ///
    /// Files are owned by the user running the plugin.
    pub fn new(fs: Arc<dyn VirtualFilesystem>, runtime: Handle) -> Self {
        // SAFETY: getuid() and getgid() are POSIX syscalls that return the real
        // user/group ID. They have no preconditions and cannot fail.
        let uid = unsafe { libc::getuid() };
        // SAFETY: see above.
        let gid = unsafe { libc::getgid() };
        Self {
            fs,
            runtime,
            inodes: InodeTable::new(),
            handles: HashMap::new(),
            next_fh: 1,
            uid,
            gid,
        }
    }

    /// Block the session thread on an adaptor call and record its outcome
    fn run<T>(&self, operation: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        let result = self.runtime.block_on(fut);
        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind().as_str(),
        };
        metrics::record_fs_operation(operation, outcome);
        result
    }

    fn attributes(&self, path: &str) -> Result<Attributes> {
        let fs = Arc::clone(&self.fs);
        self.run("getattr", async move { fs.attributes_of(path).await })
    }

    fn make_attr(&self, ino: u64, attrs: Attributes) -> FileAttr {
        let now = SystemTime::now();
        let (kind, nlink) = match attrs.kind {
            NodeKind::Directory => (FileType::Directory, 2),
            NodeKind::File => (FileType::RegularFile, 1),
        };
        FileAttr {
            ino,
            size: attrs.size,
            blocks: attrs.size.div_ceil(u64::from(BLOCK_SIZE)),
            atime: now,
            mtime: now,
            ctime: now,
            crtime: now,
            kind,
            perm: attrs.mode,
            nlink,
            uid: self.uid,
            gid: self.gid,
            rdev: 0,
            blksize: BLOCK_SIZE,
            flags: 0,
        }
    }

    /// Path of `name` under `parent`, or the errno to reply with
    fn child_path(&self, parent: u64, name: &OsStr) -> std::result::Result<String, c_int> {
        let name = name.to_str().ok_or(libc::EINVAL)?;
        self.inodes.child_path(parent, name).ok_or(libc::ENOENT)
    }

    fn path_of(&self, ino: u64) -> std::result::Result<String, c_int> {
        self.inodes
            .path(ino)
            .map(str::to_string)
            .ok_or(libc::ENOENT)
    }

    fn deny_create(&self, parent: u64, name: &OsStr) -> c_int {
        match self.child_path(parent, name) {
            Ok(path) => {
                let fs = Arc::clone(&self.fs);
                match self.run("create", async move { fs.create(&path).await }) {
                    Ok(()) => libc::EPERM,
                    Err(e) => e.errno(),
                }
            }
            Err(errno) => errno,
        }
    }

    fn deny_remove(&self, parent: u64, name: &OsStr) -> c_int {
        match self.child_path(parent, name) {
            Ok(path) => {
                let fs = Arc::clone(&self.fs);
                match self.run("remove", async move { fs.remove(&path).await }) {
                    Ok(()) => libc::EPERM,
                    Err(e) => e.errno(),
                }
            }
            Err(errno) => errno,
        }
    }
}

impl Filesystem for FuseAdapter {
    fn init(&mut self, _req: &Request<'_>, _config: &mut KernelConfig) -> std::result::Result<(), c_int> {
        info!("FUSE filesystem initialized");
        Ok(())
    }

    fn destroy(&mut self) {
        info!("FUSE filesystem destroyed");
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let path = match self.child_path(parent, name) {
            Ok(path) => path,
            Err(errno) => {
                reply.error(errno);
                return;
            }
        };
        trace!(parent, path = %path, "lookup");
        match self.attributes(&path) {
            Ok(attrs) => {
                let ino = self.inodes.lookup(&path);
                reply.entry(&ATTR_TTL, &self.make_attr(ino, attrs), 0);
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn forget(&mut self, _req: &Request<'_>, ino: u64, nlookup: u64) {
        if self.inodes.forget(ino, nlookup) {
            trace!(ino, held = self.inodes.held(), "inode released");
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        let path = match self.path_of(ino) {
            Ok(path) => path,
            Err(errno) => {
                reply.error(errno);
                return;
            }
        };
        trace!(ino, path = %path, "getattr");
        match self.attributes(&path) {
            Ok(attrs) => reply.attr(&ATTR_TTL, &self.make_attr(ino, attrs)),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        _size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let errno = match self.path_of(ino) {
            Ok(path) => Error::PermissionDenied(path).errno(),
            Err(errno) => errno,
        };
        reply.error(errno);
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        let path = match self.path_of(ino) {
            Ok(path) => path,
            Err(errno) => {
                reply.error(errno);
                return;
            }
        };
        debug!(path = %path, flags, "open");
        if flags & libc::O_ACCMODE != libc::O_RDONLY || flags & libc::O_TRUNC != 0 {
            reply.error(Error::PermissionDenied(path).errno());
            return;
        }
        let fs = Arc::clone(&self.fs);
        let read_path = path.clone();
        match self.run("open", async move { fs.open_for_read(&read_path).await }) {
            Ok(content) => {
                let fh = self.next_fh;
                self.next_fh += 1;
                self.handles.insert(fh, content);
                // Direct I/O: the content length may differ from the size
                // reported by the preceding getattr
                reply.opened(fh, fuser::consts::FOPEN_DIRECT_IO);
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        trace!(ino, fh, offset, size, "read");
        let Some(content) = self.handles.get(&fh) else {
            reply.error(libc::EBADF);
            return;
        };
        let start = usize::try_from(offset).unwrap_or(0).min(content.len());
        let end = start.saturating_add(size as usize).min(content.len());
        reply.data(&content[start..end]);
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        _offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let path = match self.path_of(ino) {
            Ok(path) => path,
            Err(errno) => {
                reply.error(errno);
                return;
            }
        };
        let fs = Arc::clone(&self.fs);
        let data = data.to_vec();
        match self.run("write", async move { fs.write(&path, &data).await }) {
            Ok(_) => reply.error(libc::EPERM),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        trace!(fh, "release");
        self.handles.remove(&fh);
        reply.ok();
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        let path = match self.path_of(ino) {
            Ok(path) => path,
            Err(errno) => {
                reply.error(errno);
                return;
            }
        };
        match self.attributes(&path) {
            Ok(attrs) if attrs.kind == NodeKind::Directory => reply.opened(0, 0),
            Ok(_) => reply.error(libc::ENOTDIR),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let path = match self.path_of(ino) {
            Ok(path) => path,
            Err(errno) => {
                reply.error(errno);
                return;
            }
        };
        debug!(path = %path, offset, "readdir");
        let fs = Arc::clone(&self.fs);
        let list_path = path.clone();
        let listing = match self.run("readdir", async move { fs.list_directory(&list_path).await }) {
            Ok(listing) => listing,
            Err(e) => {
                reply.error(e.errno());
                return;
            }
        };

        let mut entries = vec![
            (ino, FileType::Directory, ".".to_string()),
            (self.inodes.parent(ino), FileType::Directory, "..".to_string()),
        ];
        for entry in listing {
            let child = if path.is_empty() {
                entry.name.clone()
            } else {
                format!("{path}/{}", entry.name)
            };
            let kind = match entry.kind {
                NodeKind::Directory => FileType::Directory,
                NodeKind::File => FileType::RegularFile,
            };
            entries.push((self.inodes.intern(&child), kind, entry.name));
        }

        let skip = usize::try_from(offset).unwrap_or(0);
        for (i, (child_ino, kind, name)) in entries.into_iter().enumerate().skip(skip) {
            // The offset handed back is where the next call resumes
            if reply.add(child_ino, (i + 1) as i64, kind, name) {
                break;
            }
        }
        reply.ok();
    }

    fn releasedir(&mut self, _req: &Request<'_>, _ino: u64, _fh: u64, _flags: i32, reply: ReplyEmpty) {
        reply.ok();
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        reply.error(self.deny_create(parent, name));
    }

    fn mknod(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _rdev: u32,
        reply: ReplyEntry,
    ) {
        reply.error(self.deny_create(parent, name));
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        reply.error(self.deny_create(parent, name));
    }

    fn symlink(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        link_name: &OsStr,
        _target: &Path,
        reply: ReplyEntry,
    ) {
        reply.error(self.deny_create(parent, link_name));
    }

    fn link(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        newparent: u64,
        newname: &OsStr,
        reply: ReplyEntry,
    ) {
        reply.error(self.deny_create(newparent, newname));
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        reply.error(self.deny_remove(parent, name));
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        reply.error(self.deny_remove(parent, name));
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _newparent: u64,
        _newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        reply.error(self.deny_remove(parent, name));
    }
}
