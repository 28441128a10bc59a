use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::warn;

use crate::backup::scheduler::BackupSchedule;
use crate::backup::{BackupRecord, BackupRequest, RestoreSummary};
use crate::db::services::{settings_service, storage_service};
use crate::web::error::AppError;
use crate::web::models::{CreateBackupRequest, MessageResponse, RestoreQuery};
use crate::web::AppState;

pub fn backup_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/list", get(list_backups_handler))
        .route("/create", post(create_backup_handler))
        .route("/restore", post(restore_backup_handler))
        .route(
            "/schedule",
            get(get_schedule_handler).put(put_schedule_handler),
        )
}

async fn list_backups_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<BackupRecord>>, AppError> {
    let manager = (*state.backup).clone();
    let records = tokio::task::spawn_blocking(move || manager.list_backups())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;
    Ok(Json(records))
}

async fn create_backup_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateBackupRequest>,
) -> Result<(StatusCode, Json<BackupRecord>), AppError> {
    let manager = match &payload.backup_path {
        Some(dir) => state.backup.with_backup_dir(PathBuf::from(dir)),
        None => (*state.backup).clone(),
    };
    let request = BackupRequest {
        include_database: payload.include_database,
        include_volumes: payload.include_volumes,
        include_containers: payload.include_containers,
    };

    let volumes = if request.include_volumes {
        storage_service::volume_sources(&state.db).await?
    } else {
        Vec::new()
    };

    let mut container_configs = Vec::new();
    if request.include_containers {
        match &state.docker {
            Some(docker) => {
                for container in docker.list_containers().await? {
                    let inspected = docker.inspect(&container.id).await?;
                    container_configs
                        .push((container.id.clone(), serde_json::to_value(&inspected)?));
                }
            }
            None => {
                warn!("Container configs requested but the engine is unavailable, skipping them.");
            }
        }
    }

    let record = tokio::task::spawn_blocking(move || {
        manager.create_backup(&request, &volumes, &container_configs)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    state
        .notifications
        .notify(
            "success",
            "Backup completed",
            &format!("Archive {} written ({} bytes)", record.filename, record.size_bytes),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn restore_backup_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RestoreQuery>,
) -> Result<Json<RestoreSummary>, AppError> {
    let manager = (*state.backup).clone();
    let archive = PathBuf::from(&query.backup_path);
    let summary = tokio::task::spawn_blocking(move || manager.restore_backup(&archive))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    state
        .notifications
        .notify(
            "warning",
            "Backup restored",
            &format!("Restored from {}", query.backup_path),
        )
        .await?;
    Ok(Json(summary))
}

async fn get_schedule_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BackupSchedule>, AppError> {
    let schedule: BackupSchedule =
        settings_service::get(&state.db, settings_service::BACKUP_SCHEDULE_KEY).await?;
    Ok(Json(schedule))
}

/// Replaces the schedule document and applies it immediately: the running
/// task (if any) is stopped, and a new one starts only when enabled.
async fn put_schedule_handler(
    State(state): State<Arc<AppState>>,
    Json(schedule): Json<BackupSchedule>,
) -> Result<Json<MessageResponse>, AppError> {
    if schedule.interval_hours == 0 {
        return Err(AppError::Validation(
            "Backup interval must be at least one hour".to_string(),
        ));
    }
    if schedule.retention_days < 1 {
        return Err(AppError::Validation(
            "Backup retention must be at least one day".to_string(),
        ));
    }
    settings_service::set(&state.db, settings_service::BACKUP_SCHEDULE_KEY, &schedule).await?;

    state.scheduler.stop().await;
    let message = if schedule.enabled {
        state.scheduler.start(schedule).await;
        "Scheduled backups enabled"
    } else {
        "Scheduled backups disabled"
    };
    Ok(Json(MessageResponse::new(message)))
}
