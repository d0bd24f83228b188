//! # Error Types
//!
//! Error taxonomy shared by the volume driver, the store, the virtual
//! filesystem and the Vault client.

use thiserror::Error;

/// Result alias used across the library
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Volume plugin error
#[derive(Debug, Error)]
pub enum Error {
    /// Volume or secret absent
    #[error("{0} not found")]
    NotFound(String),

    /// Duplicate volume name
    #[error("Volume {0} already exists")]
    AlreadyExists(String),

    /// Any mutation of the read-only filesystem
    #[error("permission denied: {0} is read-only")]
    PermissionDenied(String),

    /// Read attempted on a directory path
    #[error("{0} is a directory")]
    IsADirectory(String),

    /// Local I/O failure (mountpoint creation, policy file, FUSE session)
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Failure talking to the secret store
    #[error("vault request failed: {0}")]
    Vault(String),

    /// Malformed volume options
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl Error {
    /// Wrap an I/O error with a description of what was being done
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            context: context.into(),
            source,
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Error::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Error::IsADirectory(_) => ErrorKind::IsADirectory,
            Error::Io { .. } | Error::Vault(_) => ErrorKind::IoFailure,
            Error::InvalidConfiguration(_) => ErrorKind::InvalidConfiguration,
        }
    }

    /// errno reported to the kernel by the FUSE bridge
    pub fn errno(&self) -> i32 {
        match self.kind() {
            ErrorKind::NotFound => libc::ENOENT,
            ErrorKind::AlreadyExists => libc::EEXIST,
            ErrorKind::PermissionDenied => libc::EPERM,
            ErrorKind::IsADirectory => libc::EISDIR,
            ErrorKind::IoFailure => libc::EIO,
            ErrorKind::InvalidConfiguration => libc::EINVAL,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Vault(e.to_string())
    }
}

/// Classification of plugin errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    PermissionDenied,
    IsADirectory,
    /// Local directory creation or remote-call failure
    IoFailure,
    InvalidConfiguration,
}

impl ErrorKind {
    /// Get human-readable kind string for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::IsADirectory => "is_a_directory",
            ErrorKind::IoFailure => "io_failure",
            ErrorKind::InvalidConfiguration => "invalid_configuration",
        }
    }
}
