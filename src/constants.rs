//! # Constants
//!
//! Default values and fixed names shared across the plugin.

use std::time::Duration;

/// Plugin identifier, used for the socket name and the default volume root.
pub const PLUGIN_ID: &str = "vault";

/// Default root directory for Docker volumes.
pub const DEFAULT_DOCKER_ROOT: &str = "/var/lib/docker-volumes";

/// Directory where Docker discovers plugin sockets.
pub const DEFAULT_PLUGIN_SOCKET_DIR: &str = "/run/docker/plugins";

/// Default Vault address when neither `--url` nor `VAULT_ADDR` is set
pub const DEFAULT_VAULT_ADDR: &str = "http://127.0.0.1:8200";

/// Environment variable consulted when `--url` is absent
pub const VAULT_ADDR_ENV: &str = "VAULT_ADDR";

/// Environment variable consulted when `--token` is absent
pub const VAULT_TOKEN_ENV: &str = "VAULT_TOKEN";

/// Header carrying the Vault token on every API request
pub const VAULT_TOKEN_HEADER: &str = "X-Vault-Token";

// Volume options

/// Option carrying an inline (base64) or `@file` policy body
pub const OPT_POLICY_RULES: &str = "policy-rules";

/// Option naming the policy registered in Vault
pub const OPT_POLICY_NAME: &str = "policy-name";

/// Prefix of the policy name derived from the volume name
pub const DEFAULT_POLICY_PREFIX: &str = "docker-policy-";

// Filesystem

/// Secret namespace segment that is always a directory
pub const SECRET_SEGMENT: &str = "secret";

/// System namespace segment, a directory in the enumerating variant
pub const SYS_SEGMENT: &str = "sys";

/// Key of the secret data holding the file content
pub const VALUE_KEY: &str = "value";

/// Permission bits of secret files (r--r--r--)
pub const FILE_MODE: u16 = 0o444;

/// Permission bits of directories (rwxr-xr-x)
pub const DIR_MODE: u16 = 0o755;

/// Root inode number (always 1 per FUSE convention)
pub const ROOT_INODE: u64 = 1;

/// Block size reported in file attributes
pub const BLOCK_SIZE: u32 = 4096;

/// How long the kernel may cache attributes and entries.
///
/// Kept at zero: every lookup goes back to Vault.
pub const ATTR_TTL: Duration = Duration::ZERO;

/// Filesystem name shown in the mount table
pub const FS_NAME: &str = "vault";

// Plugin protocol

/// Content type of Docker plugin protocol responses
pub const PLUGIN_CONTENT_TYPE: &str = "application/vnd.docker.plugins.v1+json";

/// Capability scope reported to Docker
pub const VOLUME_SCOPE: &str = "local";
