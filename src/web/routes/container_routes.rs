use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use tracing::warn;

use bollard::models::ContainerUpdateBody;

use crate::apps::updater;
use crate::docker::{ContainerRecord, ContainerStats};
use crate::web::error::AppError;
use crate::web::models::{
    MessageResponse, ResourceLimitsRequest, UpdateApplyResponse, UpdateCheckResponse,
};
use crate::web::AppState;

pub fn container_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/list", get(list_containers_handler))
        .route("/{id}/start", post(start_container_handler))
        .route("/{id}/stop", post(stop_container_handler))
        .route("/{id}", delete(remove_container_handler))
}

/// Update checks and live resource stats, nested under `/advanced`.
pub fn advanced_container_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/images/updates", get(check_all_updates_handler))
        .route(
            "/containers/{id}/update",
            get(check_update_handler).post(apply_update_handler),
        )
        .route(
            "/containers/{id}/resources",
            get(container_stats_handler).put(update_resources_handler),
        )
}

/// Listing degrades to an empty dashboard when the engine is unreachable;
/// mutations hard-fail instead.
async fn list_containers_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ContainerRecord>>, AppError> {
    let Some(docker) = &state.docker else {
        return Ok(Json(Vec::new()));
    };
    match docker.list_containers().await {
        Ok(containers) => Ok(Json(containers)),
        Err(e) => {
            warn!(error = %e, "Container listing failed, returning an empty list.");
            Ok(Json(Vec::new()))
        }
    }
}

async fn start_container_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state.docker()?.start_container(&id).await?;
    Ok(Json(MessageResponse::new(format!("Container {id} started"))))
}

async fn stop_container_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state.docker()?.stop_container(&id).await?;
    Ok(Json(MessageResponse::new(format!("Container {id} stopped"))))
}

async fn remove_container_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state.docker()?.remove_container(&id).await?;
    Ok(Json(MessageResponse::new(format!("Container {id} removed"))))
}

async fn container_stats_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ContainerStats>, AppError> {
    Ok(Json(state.docker()?.stats(&id).await?))
}

async fn update_resources_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(limits): Json<ResourceLimitsRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .docker()?
        .update_resources(&id, resource_update_body(&limits))
        .await?;
    state
        .notifications
        .notify(
            "info",
            "Resource limits updated",
            &format!("Container {id} resource limits updated"),
        )
        .await?;
    Ok(Json(MessageResponse::new(format!(
        "Resource limits updated for {id}"
    ))))
}

/// Fractional CPU limits become a quota against the engine's standard
/// 100ms scheduling period; reservations become relative cpu shares.
fn resource_update_body(limits: &ResourceLimitsRequest) -> ContainerUpdateBody {
    const CPU_PERIOD_MICROS: i64 = 100_000;
    ContainerUpdateBody {
        cpu_quota: limits
            .cpu_limit
            .map(|cores| (cores * CPU_PERIOD_MICROS as f64) as i64),
        cpu_period: limits.cpu_limit.map(|_| CPU_PERIOD_MICROS),
        memory: limits.memory_limit,
        cpu_shares: limits.cpu_reservation.map(|cores| (cores * 1024.0) as i64),
        memory_reservation: limits.memory_reservation,
        ..Default::default()
    }
}

async fn check_all_updates_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<UpdateCheckResponse>>, AppError> {
    Ok(Json(updater::check_all_updates(state.docker()?).await?))
}

async fn check_update_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<UpdateCheckResponse>, AppError> {
    Ok(Json(updater::check_for_update(state.docker()?, &id).await?))
}

async fn apply_update_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<UpdateApplyResponse>, AppError> {
    Ok(Json(updater::apply_update(state.docker()?, &id).await?))
}
