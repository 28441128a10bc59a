use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};

use crate::db::services::storage_service;
use crate::web::error::AppError;
use crate::web::models::{CreateStoragePoolRequest, MessageResponse, StoragePoolResponse};
use crate::web::AppState;

pub fn storage_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/pools", get(list_pools_handler).post(create_pool_handler))
        .route("/pools/{id}", delete(delete_pool_handler))
}

async fn list_pools_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<StoragePoolResponse>>, AppError> {
    Ok(Json(storage_service::list_pools(&state.db).await?))
}

async fn create_pool_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateStoragePoolRequest>,
) -> Result<(StatusCode, Json<StoragePoolResponse>), AppError> {
    let pool = storage_service::create_pool(&state.db, payload).await?;
    Ok((StatusCode::CREATED, Json(pool)))
}

async fn delete_pool_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    storage_service::delete_pool(&state.db, &id).await?;
    Ok(Json(MessageResponse::new("Storage pool deleted")))
}
