//! Docker volume plugin protocol over HTTP.
//!
//! Every endpoint is a `POST` with a JSON body. Docker does not send
//! `application/json`, so bodies are decoded by hand instead of through
//! axum's `Json` extractor. Failures are answered with `{"Err": "..."}`.

use std::collections::BTreeMap;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Serialize;
use serde::de::DeserializeOwned;

use s3vol::{S3volError, VolumeDriver, VolumeInfo};
use s3vol_shared::constants::plugin;
use s3vol_shared::protocol::{
    ActivateResponse, CapabilitiesResponse, CreateRequest, ErrorResponse, GetResponse,
    ListResponse, MountRequest, MountpointResponse, NameRequest, WireVolume,
};

/// Build the plugin router around a shared driver.
pub fn router(driver: VolumeDriver) -> Router {
    Router::new()
        .route("/Plugin.Activate", post(activate))
        .route("/VolumeDriver.Create", post(create))
        .route("/VolumeDriver.Remove", post(remove))
        .route("/VolumeDriver.Mount", post(mount))
        .route("/VolumeDriver.Unmount", post(unmount))
        .route("/VolumeDriver.Path", post(path))
        .route("/VolumeDriver.Get", post(get))
        .route("/VolumeDriver.List", post(list))
        .route("/VolumeDriver.Capabilities", post(capabilities))
        .with_state(driver)
}

// ============================================================================
// RESPONSES
// ============================================================================

/// JSON body with the plugin content type.
struct PluginJson<T>(StatusCode, T);

impl<T: Serialize> IntoResponse for PluginJson<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self.1) {
            Ok(body) => (self.0, [(header::CONTENT_TYPE, plugin::CONTENT_TYPE)], body).into_response(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode response");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

fn ok<T: Serialize>(body: T) -> PluginJson<T> {
    PluginJson(StatusCode::OK, body)
}

/// Request failure as seen by Docker.
#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    Driver(S3volError),
}

impl From<S3volError> for ApiError {
    fn from(e: S3volError) -> Self {
        Self::Driver(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Driver(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };
        PluginJson(status, ErrorResponse::message(message)).into_response()
    }
}

type ApiResult<T> = Result<PluginJson<T>, ApiError>;

fn decode<T: DeserializeOwned>(endpoint: &str, body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::warn!(endpoint, error = %e, "Malformed request body");
        ApiError::BadRequest(format!("malformed {endpoint} request: {e}"))
    })
}

fn wire_volume(info: &VolumeInfo) -> WireVolume {
    WireVolume {
        name: info.name.clone(),
        mountpoint: info.mount_point.to_string_lossy().into_owned(),
        created_at: None,
        status: None,
    }
}

fn mountpoint(path: &std::path::Path) -> MountpointResponse {
    MountpointResponse {
        mountpoint: path.to_string_lossy().into_owned(),
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

async fn activate() -> PluginJson<ActivateResponse> {
    tracing::debug!("Activate request");
    ok(ActivateResponse {
        implements: vec![plugin::IMPLEMENTS_VOLUME_DRIVER.to_string()],
    })
}

async fn create(State(driver): State<VolumeDriver>, body: Bytes) -> ApiResult<ErrorResponse> {
    let req: CreateRequest = decode("Create", &body)?;
    tracing::debug!(volume = %req.name, "Create request");
    driver
        .create(&req.name, &req.opts.unwrap_or_default())
        .await?;
    Ok(ok(ErrorResponse::ok()))
}

async fn remove(State(driver): State<VolumeDriver>, body: Bytes) -> ApiResult<ErrorResponse> {
    let req: NameRequest = decode("Remove", &body)?;
    tracing::debug!(volume = %req.name, "Remove request");
    driver.remove(&req.name).await?;
    Ok(ok(ErrorResponse::ok()))
}

async fn mount(State(driver): State<VolumeDriver>, body: Bytes) -> ApiResult<MountpointResponse> {
    let req: MountRequest = decode("Mount", &body)?;
    tracing::debug!(volume = %req.name, mount_id = %req.id, "Mount request");
    let path = driver.mount(&req.name, &req.id).await?;
    Ok(ok(mountpoint(&path)))
}

async fn unmount(State(driver): State<VolumeDriver>, body: Bytes) -> ApiResult<ErrorResponse> {
    let req: MountRequest = decode("Unmount", &body)?;
    tracing::debug!(volume = %req.name, mount_id = %req.id, "Unmount request");
    driver.unmount(&req.name, &req.id).await?;
    Ok(ok(ErrorResponse::ok()))
}

async fn path(State(driver): State<VolumeDriver>, body: Bytes) -> ApiResult<MountpointResponse> {
    let req: NameRequest = decode("Path", &body)?;
    tracing::debug!(volume = %req.name, "Path request");
    let path = driver.path(&req.name).await?;
    Ok(ok(mountpoint(&path)))
}

async fn get(State(driver): State<VolumeDriver>, body: Bytes) -> ApiResult<GetResponse> {
    let req: NameRequest = decode("Get", &body)?;
    tracing::debug!(volume = %req.name, "Get request");
    let info = driver.get(&req.name).await?;

    let status = BTreeMap::from([("refCount".to_string(), info.ref_count.into())]);
    Ok(ok(GetResponse {
        volume: WireVolume {
            created_at: Some(info.created_at.to_rfc3339()),
            status: Some(status),
            ..wire_volume(&info)
        },
    }))
}

async fn list(State(driver): State<VolumeDriver>) -> PluginJson<ListResponse> {
    tracing::debug!("List request");
    let volumes = driver.list().await.iter().map(wire_volume).collect();
    ok(ListResponse { volumes })
}

async fn capabilities(State(driver): State<VolumeDriver>) -> PluginJson<CapabilitiesResponse> {
    tracing::debug!("Capabilities request");
    ok(CapabilitiesResponse {
        capabilities: driver.capabilities(),
    })
}
