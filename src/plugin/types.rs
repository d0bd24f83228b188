//! Docker volume plugin protocol message types.
//!
//! Field names follow the protocol's PascalCase JSON. Errors travel in the
//! `Err` field of an HTTP 200 response; an empty string means success.

use crate::driver::VolumeInfo;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Body of `Create`, `Remove`, `Path`, `Mount`, `Unmount` and `Get`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VolumeRequest {
    pub name: String,
    /// Creation options; `null` or absent when none were given
    #[serde(default)]
    pub opts: Option<HashMap<String, String>>,
    /// Caller identifier on `Mount`/`Unmount`
    #[serde(default, rename = "ID")]
    pub id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActivateResponse {
    pub implements: Vec<&'static str>,
}

#[derive(Debug, Default, Serialize)]
pub struct ErrResponse {
    #[serde(rename = "Err")]
    pub err: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MountpointResponse {
    pub mountpoint: String,
    #[serde(rename = "Err")]
    pub err: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct VolumeEntry {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mountpoint: Option<String>,
}

impl From<VolumeInfo> for VolumeEntry {
    fn from(info: VolumeInfo) -> Self {
        Self {
            name: info.name,
            mountpoint: info.mountpoint.as_deref().map(display),
        }
    }
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<VolumeEntry>,
    #[serde(rename = "Err")]
    pub err: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListResponse {
    pub volumes: Vec<VolumeEntry>,
    #[serde(rename = "Err")]
    pub err: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CapabilitiesResponse {
    pub capabilities: CapabilitiesBody,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CapabilitiesBody {
    pub scope: &'static str,
}

pub fn display(path: &Path) -> String {
    path.display().to_string()
}
