use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};

use crate::db::entities::notification;
use crate::db::services::notification_service;
use crate::web::error::AppError;
use crate::web::models::MessageResponse;
use crate::web::AppState;

const LIST_LIMIT: u64 = 100;

pub fn notification_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_notifications_handler))
        .route("/mark-read/{id}", post(mark_read_handler))
        .route("/mark-all-read", post(mark_all_read_handler))
        .route("/test", post(test_notification_handler))
}

async fn list_notifications_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<notification::Model>>, AppError> {
    Ok(Json(
        notification_service::list(&state.db, LIST_LIMIT).await?,
    ))
}

async fn mark_read_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    notification_service::mark_read(&state.db, &id).await?;
    Ok(Json(MessageResponse::new("Notification marked as read")))
}

async fn mark_all_read_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MessageResponse>, AppError> {
    let changed = notification_service::mark_all_read(&state.db).await?;
    Ok(Json(MessageResponse::new(format!(
        "Marked {changed} notification(s) as read"
    ))))
}

/// Fires a test notification through the persistence path and every
/// configured outbound channel.
async fn test_notification_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<notification::Model>, AppError> {
    let row = state
        .notifications
        .notify(
            "info",
            "Test notification",
            "If you can read this, notifications are working.",
        )
        .await?;
    Ok(Json(row))
}
