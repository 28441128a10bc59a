use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};

use crate::docker::NetworkRecord;
use crate::web::error::AppError;
use crate::web::models::{CreateNetworkRequest, MessageResponse};
use crate::web::AppState;

pub fn network_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_networks_handler).post(create_network_handler))
        .route("/{id}", delete(remove_network_handler))
}

async fn list_networks_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<NetworkRecord>>, AppError> {
    Ok(Json(state.docker()?.list_networks().await?))
}

async fn create_network_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateNetworkRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation(
            "Network name must not be empty".to_string(),
        ));
    }
    let driver = payload.driver.as_deref().unwrap_or("bridge");
    let id = state.docker()?.create_network(&payload.name, driver).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new(format!("Network {id} created"))),
    ))
}

async fn remove_network_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state.docker()?.remove_network(&id).await?;
    Ok(Json(MessageResponse::new("Network removed")))
}
