//! # Plugin Protocol
//!
//! Docker volume plugin protocol v1 served over a Unix socket.
//!
//! Docker POSTs JSON to `/Plugin.Activate` and `/VolumeDriver.*`. Bodies are
//! decoded regardless of content type (Docker sends its own vendor type, and
//! some calls carry no body at all). Every response is HTTP 200 with errors
//! reported in the `Err` field.

mod types;

pub use types::VolumeRequest;

use crate::constants::PLUGIN_CONTENT_TYPE;
use crate::driver::VolumeDriver;
use crate::error::Error;
use axum::{
    body::Bytes,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use types::{
    display, ActivateResponse, CapabilitiesBody, CapabilitiesResponse, ErrResponse, GetResponse,
    ListResponse, MountpointResponse, VolumeEntry,
};

type SharedDriver = Arc<VolumeDriver>;

/// Build the protocol router over a driver
pub fn router(driver: SharedDriver) -> Router {
    Router::new()
        .route("/Plugin.Activate", post(activate))
        .route("/VolumeDriver.Create", post(create))
        .route("/VolumeDriver.Remove", post(remove))
        .route("/VolumeDriver.Path", post(path))
        .route("/VolumeDriver.Mount", post(mount))
        .route("/VolumeDriver.Unmount", post(unmount))
        .route("/VolumeDriver.Get", post(get))
        .route("/VolumeDriver.List", post(list))
        .route("/VolumeDriver.Capabilities", post(capabilities))
        .with_state(driver)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

/// Serve the protocol on `socket` until `shutdown` resolves
///
/// A stale socket file left by a previous run is replaced.
pub async fn serve_unix(
    socket: &Path,
    driver: SharedDriver,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    use anyhow::Context;

    if let Some(parent) = socket.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    match tokio::fs::remove_file(socket).await {
        Ok(()) => debug!("Removed stale socket {}", socket.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to remove {}", socket.display()));
        }
    }

    let listener = tokio::net::UnixListener::bind(socket)
        .with_context(|| format!("Failed to bind {}", socket.display()))?;
    info!("Plugin listening on {}", socket.display());

    axum::serve(listener, router(driver))
        .with_graceful_shutdown(shutdown)
        .await
        .context("Plugin server failed")?;

    if let Err(e) = tokio::fs::remove_file(socket).await {
        warn!("Failed to remove socket {}: {}", socket.display(), e);
    }
    Ok(())
}

/// Serialize a protocol response with the plugin content type
fn reply<T: Serialize>(body: &T) -> Response {
    match serde_json::to_vec(body) {
        Ok(bytes) => ([(header::CONTENT_TYPE, PLUGIN_CONTENT_TYPE)], bytes).into_response(),
        Err(e) => err_reply(format!("failed to encode response: {e}")),
    }
}

fn err_reply(message: String) -> Response {
    let body = format!(r#"{{"Err":{}}}"#, serde_json::Value::String(message));
    ([(header::CONTENT_TYPE, PLUGIN_CONTENT_TYPE)], body).into_response()
}

/// Decode a request body; an empty body decodes as the default value
fn decode<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, Response> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| err_reply(format!("malformed request: {e}")))
}

fn message(result: Result<(), Error>) -> String {
    result.err().map(|e| e.to_string()).unwrap_or_default()
}

async fn activate() -> Response {
    reply(&ActivateResponse {
        implements: vec!["VolumeDriver"],
    })
}

async fn create(State(driver): State<SharedDriver>, body: Bytes) -> Response {
    let request: VolumeRequest = match decode(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let result = driver
        .create(&request.name, request.opts.unwrap_or_default())
        .await;
    reply(&ErrResponse {
        err: message(result),
    })
}

async fn remove(State(driver): State<SharedDriver>, body: Bytes) -> Response {
    let request: VolumeRequest = match decode(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    reply(&ErrResponse {
        err: message(driver.remove(&request.name)),
    })
}

async fn path(State(driver): State<SharedDriver>, body: Bytes) -> Response {
    let request: VolumeRequest = match decode(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    reply(&MountpointResponse {
        mountpoint: display(&driver.path(&request.name)),
        err: String::new(),
    })
}

async fn mount(State(driver): State<SharedDriver>, body: Bytes) -> Response {
    let request: VolumeRequest = match decode(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    debug!(volume = %request.name, id = ?request.id, "mount requested");
    let response = match driver.mount(&request.name).await {
        Ok(mountpoint) => MountpointResponse {
            mountpoint: display(&mountpoint),
            err: String::new(),
        },
        Err(e) => MountpointResponse {
            mountpoint: String::new(),
            err: e.to_string(),
        },
    };
    reply(&response)
}

async fn unmount(State(driver): State<SharedDriver>, body: Bytes) -> Response {
    let request: VolumeRequest = match decode(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    debug!(volume = %request.name, id = ?request.id, "unmount requested");
    reply(&ErrResponse {
        err: message(driver.unmount(&request.name).await),
    })
}

async fn get(State(driver): State<SharedDriver>, body: Bytes) -> Response {
    let request: VolumeRequest = match decode(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let response = match driver.get(&request.name).await {
        Ok(info) => GetResponse {
            volume: Some(VolumeEntry::from(info)),
            err: String::new(),
        },
        Err(e) => GetResponse {
            volume: None,
            err: e.to_string(),
        },
    };
    reply(&response)
}

async fn list(State(driver): State<SharedDriver>) -> Response {
    reply(&ListResponse {
        volumes: driver
            .list()
            .await
            .into_iter()
            .map(VolumeEntry::from)
            .collect(),
        err: String::new(),
    })
}

async fn capabilities(State(driver): State<SharedDriver>) -> Response {
    reply(&CapabilitiesResponse {
        capabilities: CapabilitiesBody {
            scope: driver.capabilities().scope,
        },
    })
}
