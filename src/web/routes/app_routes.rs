use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::apps::installer;
use crate::db::entities::app_template;
use crate::db::services::template_service;
use crate::web::error::AppError;
use crate::web::models::{
    CreateTemplateRequest, InstallAppRequest, InstalledAppResponse, MessageResponse,
};
use crate::web::AppState;

pub fn app_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/templates",
            get(list_templates_handler).post(create_template_handler),
        )
        .route("/templates/{id}", axum::routing::delete(delete_template_handler))
        .route("/seed", post(seed_templates_handler))
        .route("/install/{template_id}", post(install_app_handler))
}

async fn list_templates_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<app_template::Model>>, AppError> {
    Ok(Json(template_service::list_templates(&state.db).await?))
}

async fn create_template_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateTemplateRequest>,
) -> Result<(StatusCode, Json<app_template::Model>), AppError> {
    let template = template_service::create_template(&state.db, payload).await?;
    Ok((StatusCode::CREATED, Json(template)))
}

async fn delete_template_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    template_service::delete_template(&state.db, &id).await?;
    Ok(Json(MessageResponse::new("Template deleted")))
}

async fn seed_templates_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MessageResponse>, AppError> {
    let inserted = template_service::seed_templates(&state.db).await?;
    Ok(Json(MessageResponse::new(format!(
        "Seeded {inserted} template(s)"
    ))))
}

/// The body is optional: a bare POST installs the template with its
/// defaults, matching a dashboard "install" button with no customization.
async fn install_app_handler(
    State(state): State<Arc<AppState>>,
    Path(template_id): Path<String>,
    payload: Option<Json<InstallAppRequest>>,
) -> Result<(StatusCode, Json<InstalledAppResponse>), AppError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let installed =
        installer::install_app(&state.db, state.docker()?, &template_id, payload).await?;
    Ok((StatusCode::CREATED, Json(installed)))
}
