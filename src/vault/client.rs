//! # Vault Client
//!
//! `SecretClient` implementation backed by the Vault HTTP API.
//!
//! This module provides functionality to:
//! - Read secrets from logical paths (`GET /v1/{path}`)
//! - Enumerate secret engine mounts
//! - Register policies and mint tokens scoped to them

use super::types::{
    mount_names, ErrorResponse, PutPolicyRequest, SecretResponse, TokenCreateRequest,
    TokenCreateResponse,
};
use super::{ClientFactory, Secret, SecretClient};
use crate::constants::VAULT_TOKEN_HEADER;
use crate::error::{Error, Result};
use crate::observability::metrics;
use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, RequestBuilder, Response, StatusCode};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, debug_span, Instrument};
use zeroize::Zeroizing;

/// Connection settings for Vault
///
/// Passed explicitly to every client; there is no process-wide default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultConfig {
    /// Base address, e.g. `https://vault.example.com:8200`
    pub address: String,
}

impl VaultConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    /// Full API URL of a Vault path
    pub fn api_url(&self, path: &str) -> String {
        format!(
            "{}/v1/{}",
            self.address.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl ClientFactory for VaultConfig {
    fn connect(&self, token: &str) -> Result<Arc<dyn SecretClient>> {
        Ok(Arc::new(VaultClient::new(self.clone(), token)?))
    }
}

/// Vault client authenticated with a single token
pub struct VaultClient {
    config: VaultConfig,
    http: ReqwestClient,
    token: Zeroizing<String>,
}

impl std::fmt::Debug for VaultClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultClient")
            .field("address", &self.config.address)
            .finish_non_exhaustive()
    }
}

impl VaultClient {
    /// Create a client that sends `token` with every request
    pub fn new(config: VaultConfig, token: &str) -> Result<Self> {
        let http = ReqwestClient::builder().build()?;
        Ok(Self {
            config,
            http,
            token: Zeroizing::new(token.to_string()),
        })
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header(VAULT_TOKEN_HEADER, self.token.as_str())
    }
}

/// Turn a non-success response into an error carrying Vault's messages
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.json::<ErrorResponse>().await.unwrap_or_default();
    if body.errors.is_empty() {
        Err(Error::Vault(format!("{status}")))
    } else {
        Err(Error::Vault(format!("{status}: {}", body.errors.join("; "))))
    }
}

fn observe<T>(operation: &str, result: &Result<T>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) => e.kind().as_str(),
    };
    metrics::record_vault_request(operation, outcome);
}

#[async_trait]
impl SecretClient for VaultClient {
    async fn read(&self, path: &str) -> Result<Option<Secret>> {
        let span = debug_span!("vault.read", secret.path = path);
        let result = async {
            let response = self
                .authed(self.http.get(self.config.api_url(path)))
                .send()
                .await?;
            if response.status() == StatusCode::NOT_FOUND {
                debug!("no secret at {}", path);
                return Ok(None);
            }
            let body: SecretResponse = check_status(response).await?.json().await?;
            Ok(Some(Secret { data: body.data }))
        }
        .instrument(span)
        .await;
        observe("read", &result);
        result
    }

    async fn list_mounts(&self) -> Result<Vec<String>> {
        let span = debug_span!("vault.list_mounts");
        let result = async {
            let response = self
                .authed(self.http.get(self.config.api_url("sys/mounts")))
                .send()
                .await?;
            let body: Map<String, Value> = check_status(response).await?.json().await?;
            Ok(mount_names(&body))
        }
        .instrument(span)
        .await;
        observe("list_mounts", &result);
        result
    }

    async fn put_policy(&self, name: &str, rules: &str) -> Result<()> {
        let span = debug_span!("vault.put_policy", policy.name = name);
        let result = async {
            let response = self
                .authed(
                    self.http
                        .put(self.config.api_url(&format!("sys/policy/{name}")))
                        .json(&PutPolicyRequest { policy: rules }),
                )
                .send()
                .await?;
            check_status(response).await?;
            Ok(())
        }
        .instrument(span)
        .await;
        observe("put_policy", &result);
        result
    }

    async fn issue_token(&self, policies: &[String]) -> Result<String> {
        let span = debug_span!("vault.issue_token", policies = ?policies);
        let result = async {
            let response = self
                .authed(
                    self.http
                        .post(self.config.api_url("auth/token/create"))
                        .json(&TokenCreateRequest { policies }),
                )
                .send()
                .await?;
            let body: TokenCreateResponse = check_status(response).await?.json().await?;
            body.auth
                .map(|auth| auth.client_token)
                .ok_or_else(|| Error::Vault("token create response carried no auth".to_string()))
        }
        .instrument(span)
        .await;
        observe("issue_token", &result);
        result
    }
}
