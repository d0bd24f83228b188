//! Policy body resolution for the `policy-rules` volume option.
//!
//! The option is either `@/path/to/file.hcl` (read from the plugin's
//! filesystem) or the policy text encoded as standard base64.

use crate::error::{Error, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;

/// Resolve the policy text referenced by a `policy-rules` option value
pub async fn resolve_rules(option: &str) -> Result<String> {
    let bytes = match option.strip_prefix('@') {
        Some(file) => tokio::fs::read(Path::new(file))
            .await
            .map_err(|e| Error::io(format!("reading policy file {file}"), e))?,
        None => STANDARD.decode(option.trim()).map_err(|e| {
            Error::InvalidConfiguration(format!("policy-rules is not valid base64: {e}"))
        })?,
    };
    String::from_utf8(bytes).map_err(|e| {
        Error::InvalidConfiguration(format!("policy rules are not valid UTF-8: {e}"))
    })
}

/// Name of the policy to register for a volume
pub fn policy_name(volume: &str, explicit: Option<&str>) -> String {
    match explicit {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("{}{volume}", crate::constants::DEFAULT_POLICY_PREFIX),
    }
}
