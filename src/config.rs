//! # Configuration
//!
//! Command-line flags and their environment fallbacks.
//!
//! | Flag | Environment | Default |
//! |---|---|---|
//! | `--root` | | `/var/lib/docker-volumes/vault` |
//! | `--url` | `VAULT_ADDR` | `http://127.0.0.1:8200` |
//! | `--token` | `VAULT_TOKEN` | required |
//! | `--socket` | | `/run/docker/plugins/vault.sock` |
//! | `--variant` | | `enumerating` |
//! | `--metrics-port` | | disabled |

use crate::constants::{
    DEFAULT_DOCKER_ROOT, DEFAULT_PLUGIN_SOCKET_DIR, DEFAULT_VAULT_ADDR, PLUGIN_ID,
    VAULT_ADDR_ENV, VAULT_TOKEN_ENV,
};
use crate::error::{Error, Result};
use crate::fs::FsVariant;
use crate::vault::VaultConfig;
use clap::Parser;
use std::path::PathBuf;
use zeroize::Zeroizing;

/// Docker volume plugin exposing Vault secrets as a read-only filesystem
#[derive(Parser, Debug, Default)]
#[command(name = "docker-volume-vault")]
#[command(about = "Docker volume plugin serving HashiCorp Vault secrets over FUSE", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Docker volumes root directory
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Vault server URL (falls back to VAULT_ADDR)
    #[arg(long)]
    pub url: Option<String>,

    /// Vault token used to provision volumes (falls back to VAULT_TOKEN)
    #[arg(long)]
    pub token: Option<String>,

    /// Plugin socket path
    #[arg(long)]
    pub socket: Option<PathBuf>,

    /// Filesystem variant: `enumerating` or `plain`
    #[arg(long, default_value_t = FsVariant::Enumerating)]
    pub variant: FsVariant,

    /// Serve Prometheus metrics and /healthz on this TCP port
    #[arg(long)]
    pub metrics_port: Option<u16>,
}

/// Resolved plugin configuration
pub struct PluginConfig {
    pub root: PathBuf,
    pub vault: VaultConfig,
    pub token: Zeroizing<String>,
    pub socket: PathBuf,
    pub variant: FsVariant,
    pub metrics_port: Option<u16>,
}

impl std::fmt::Debug for PluginConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginConfig")
            .field("root", &self.root)
            .field("vault", &self.vault)
            .field("socket", &self.socket)
            .field("variant", &self.variant)
            .field("metrics_port", &self.metrics_port)
            .finish_non_exhaustive()
    }
}

/// Read environment variable, treating an empty value as unset
fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

impl PluginConfig {
    /// Resolve flags against the process environment
    pub fn from_cli(cli: Cli) -> Result<Self> {
        Self::resolve(cli, env_var)
    }

    /// Resolve flags, looking fallbacks up with `env`
    pub fn resolve(cli: Cli, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let url = cli
            .url
            .filter(|v| !v.is_empty())
            .or_else(|| env(VAULT_ADDR_ENV))
            .unwrap_or_else(|| DEFAULT_VAULT_ADDR.to_string());
        let token = cli
            .token
            .filter(|v| !v.is_empty())
            .or_else(|| env(VAULT_TOKEN_ENV))
            .ok_or_else(|| {
                Error::InvalidConfiguration(format!(
                    "a Vault token is required (--token or {VAULT_TOKEN_ENV})"
                ))
            })?;

        Ok(Self {
            root: cli
                .root
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DOCKER_ROOT).join(PLUGIN_ID)),
            vault: VaultConfig::new(url),
            token: Zeroizing::new(token),
            socket: cli.socket.unwrap_or_else(|| {
                PathBuf::from(DEFAULT_PLUGIN_SOCKET_DIR).join(format!("{PLUGIN_ID}.sock"))
            }),
            variant: cli.variant,
            metrics_port: cli.metrics_port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["docker-volume-vault", "--token", "s.root"]);
        let config = PluginConfig::resolve(cli, env(&[])).unwrap();

        assert_eq!(config.root, PathBuf::from("/var/lib/docker-volumes/vault"));
        assert_eq!(config.vault.address, "http://127.0.0.1:8200");
        assert_eq!(config.token.as_str(), "s.root");
        assert_eq!(config.socket, PathBuf::from("/run/docker/plugins/vault.sock"));
        assert_eq!(config.variant, FsVariant::Enumerating);
        assert_eq!(config.metrics_port, None);
    }

    #[test]
    fn test_environment_fallbacks() {
        let cli = Cli::parse_from(["docker-volume-vault"]);
        let config = PluginConfig::resolve(
            cli,
            env(&[(VAULT_ADDR_ENV, "https://vault:8200"), (VAULT_TOKEN_ENV, "s.env")]),
        )
        .unwrap();

        assert_eq!(config.vault.address, "https://vault:8200");
        assert_eq!(config.token.as_str(), "s.env");
    }

    #[test]
    fn test_flags_win_over_environment() {
        let cli = Cli::parse_from([
            "docker-volume-vault",
            "--url",
            "http://flag:8200",
            "--token",
            "s.flag",
            "--variant",
            "plain",
            "--root",
            "/mnt/vault",
            "--metrics-port",
            "9102",
        ]);
        let config = PluginConfig::resolve(
            cli,
            env(&[(VAULT_ADDR_ENV, "http://env:8200"), (VAULT_TOKEN_ENV, "s.env")]),
        )
        .unwrap();

        assert_eq!(config.vault.address, "http://flag:8200");
        assert_eq!(config.token.as_str(), "s.flag");
        assert_eq!(config.variant, FsVariant::Plain);
        assert_eq!(config.root, PathBuf::from("/mnt/vault"));
        assert_eq!(config.metrics_port, Some(9102));
    }

    #[test]
    fn test_missing_token_is_rejected() {
        let cli = Cli::parse_from(["docker-volume-vault"]);
        let err = PluginConfig::resolve(cli, env(&[])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
    }

    #[test]
    fn test_debug_hides_token() {
        let cli = Cli::parse_from(["docker-volume-vault", "--token", "s.secret"]);
        let config = PluginConfig::resolve(cli, env(&[])).unwrap();
        assert!(!format!("{config:?}").contains("s.secret"));
    }
}
