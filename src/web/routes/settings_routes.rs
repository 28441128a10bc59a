use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};

use crate::db::services::settings_service;
use crate::web::error::AppError;
use crate::web::models::SystemSettings;
use crate::web::AppState;

pub fn settings_router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(get_settings_handler).put(put_settings_handler))
}

async fn get_settings_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SystemSettings>, AppError> {
    let settings: SystemSettings =
        settings_service::get(&state.db, settings_service::SYSTEM_SETTINGS_KEY).await?;
    Ok(Json(settings))
}

/// The whole settings document is replaced on every update.
async fn put_settings_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SystemSettings>,
) -> Result<Json<SystemSettings>, AppError> {
    settings_service::set(&state.db, settings_service::SYSTEM_SETTINGS_KEY, &payload).await?;
    Ok(Json(payload))
}
