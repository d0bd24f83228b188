//! # Request and Response Types
//!
//! Vault HTTP API payloads.
//!
//! API Reference: https://developer.hashicorp.com/vault/api-docs

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Envelope of a logical read (`GET /v1/{path}`)
#[derive(Debug, Deserialize)]
pub struct SecretResponse {
    #[serde(default)]
    pub data: Option<Map<String, Value>>,
}

/// Body of `PUT /v1/sys/policy/{name}`
#[derive(Debug, Serialize)]
pub struct PutPolicyRequest<'a> {
    pub policy: &'a str,
}

/// Body of `POST /v1/auth/token/create`
#[derive(Debug, Serialize)]
pub struct TokenCreateRequest<'a> {
    pub policies: &'a [String],
}

/// Response of `POST /v1/auth/token/create`
#[derive(Debug, Deserialize)]
pub struct TokenCreateResponse {
    pub auth: Option<TokenAuth>,
}

#[derive(Debug, Deserialize)]
pub struct TokenAuth {
    pub client_token: String,
}

/// Error body returned with non-success statuses
#[derive(Debug, Default, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Extract mount point names from a `GET /v1/sys/mounts` response
///
/// Recent Vault versions nest the mounts under `data`; older ones only
/// return them as top-level keys, mixed with request metadata. Top-level
/// keys are filtered to the ones that look like mount paths.
pub fn mount_names(body: &Map<String, Value>) -> Vec<String> {
    let mut names: Vec<String> = match body.get("data") {
        Some(Value::Object(data)) => data.keys().cloned().collect(),
        _ => body
            .iter()
            .filter(|(k, v)| k.ends_with('/') && v.is_object())
            .map(|(k, _)| k.clone())
            .collect(),
    };
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mount_names_prefers_data() {
        let body = json!({
            "secret/": {"type": "kv"},
            "request_id": "abc",
            "data": {
                "secret/": {"type": "kv"},
                "sys/": {"type": "system"},
                "cubbyhole/": {"type": "cubbyhole"}
            }
        });
        let names = mount_names(body.as_object().unwrap());
        assert_eq!(names, vec!["cubbyhole/", "secret/", "sys/"]);
    }

    #[test]
    fn test_mount_names_legacy_top_level() {
        let body = json!({
            "secret/": {"type": "generic"},
            "sys/": {"type": "system"},
            "lease_id": "",
            "renewable": false
        });
        let names = mount_names(body.as_object().unwrap());
        assert_eq!(names, vec!["secret/", "sys/"]);
    }

    #[test]
    fn test_token_create_request_shape() {
        let policies = vec!["docker-policy-db".to_string()];
        let body = serde_json::to_value(TokenCreateRequest {
            policies: &policies,
        })
        .unwrap();
        assert_eq!(body, json!({"policies": ["docker-policy-db"]}));
    }
}
