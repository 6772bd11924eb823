use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use chrono::Utc;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::info;

use crate::db::entities::device;
use crate::db::enums::LoadType;
use crate::db::services::{self, BatchInput, BatchOutcome, NewDevice};
use crate::server::clock_service::DeviceClock;
use crate::server::device_ops::DeviceOpError;
use crate::server::pull_sync::PullOutcome;
use crate::terminal::DeviceInfo;
use crate::web::models::{SetActiveRequest, SetTimeRequest, SetTimeResponse, SyncRequest};
use crate::web::{AppError, AppState};

async fn load_device(app_state: &AppState, id: i32) -> Result<device::Model, AppError> {
    services::get_device(&app_state.db_pool, id)
        .await?
        .ok_or_else(|| DeviceOpError::NotFound(id).into())
}

/// An empty body means "all defaults".
fn optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::InvalidInput(e.to_string()))
}

async fn list_devices_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<device::Model>>, AppError> {
    Ok(Json(services::list_devices(&app_state.db_pool).await?))
}

async fn create_device_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<NewDevice>,
) -> Result<(StatusCode, Json<device::Model>), AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::InvalidInput("Device name is required".to_string()));
    }
    if payload.ip_address.trim().is_empty() {
        return Err(AppError::InvalidInput("Device IP address is required".to_string()));
    }
    if !(1..=i32::from(u16::MAX)).contains(&payload.port) {
        return Err(AppError::InvalidInput(format!("Port {} is out of range", payload.port)));
    }
    if let Some(existing) = services::lookup_by_ip(&app_state.db_pool, &payload.ip_address).await? {
        if existing.port == payload.port {
            return Err(AppError::Conflict(format!(
                "Device {} already uses {}:{}",
                existing.name, existing.ip_address, existing.port
            )));
        }
    }
    let created = services::create_device(&app_state.db_pool, payload).await?;
    info!(device_id = created.id, serial = ?created.serial_number, "Device registered.");
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_device_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<device::Model>, AppError> {
    Ok(Json(load_device(&app_state, id).await?))
}

async fn set_active_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(payload): Json<SetActiveRequest>,
) -> Result<Json<device::Model>, AppError> {
    let updated = services::set_device_active(&app_state.db_pool, id, payload.is_active)
        .await?
        .ok_or(DeviceOpError::NotFound(id))?;
    info!(device_id = id, is_active = updated.is_active, "Device activation changed.");
    Ok(Json(updated))
}

async fn test_connection_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<DeviceInfo>, AppError> {
    let device = load_device(&app_state, id).await?;
    Ok(Json(app_state.gateway.test_connection(&device).await?))
}

async fn sync_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    body: Bytes,
) -> Result<Json<PullOutcome>, AppError> {
    let request: SyncRequest = optional_json(&body)?;
    let device = load_device(&app_state, id).await?;
    let clear_after = request
        .clear_after
        .unwrap_or(app_state.config.clear_after_pull);
    let outcome = app_state
        .synchronizer
        .fetch_attendance(&device, clear_after)
        .await?;
    Ok(Json(outcome))
}

async fn get_time_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<DeviceClock>, AppError> {
    let device = load_device(&app_state, id).await?;
    Ok(Json(app_state.clock.get_time(&device).await?))
}

async fn set_time_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    body: Bytes,
) -> Result<Json<SetTimeResponse>, AppError> {
    let request: SetTimeRequest = optional_json(&body)?;
    let device = load_device(&app_state, id).await?;
    let target_utc = request.datetime.unwrap_or_else(Utc::now);
    let device_time = app_state.clock.set_time(&device, target_utc).await?;
    Ok(Json(SetTimeResponse {
        device_time,
        target_utc,
    }))
}

/// Loads an exported punch file in the ADMS line format.
async fn upload_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    body: Bytes,
) -> Result<Json<BatchOutcome>, AppError> {
    let device = load_device(&app_state, id).await?;
    if !device.is_active {
        return Err(DeviceOpError::Inactive(id).into());
    }
    let input = BatchInput::from_text(&String::from_utf8_lossy(&body));
    if input.is_empty() {
        return Err(AppError::InvalidInput("Uploaded file has no records".to_string()));
    }
    let reason = format!("Manual file upload to {}", device.name);
    let outcome = app_state
        .ingestor
        .ingest(Some(&device), LoadType::ManualFile, &reason, input)
        .await?;
    Ok(Json(outcome))
}

pub fn device_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_devices_handler).post(create_device_handler))
        .route("/{id}", get(get_device_handler))
        .route("/{id}/active", put(set_active_handler))
        .route("/{id}/test-connection", post(test_connection_handler))
        .route("/{id}/sync", post(sync_handler))
        .route("/{id}/time", get(get_time_handler).put(set_time_handler))
        .route("/{id}/upload", post(upload_handler))
}
