use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::db::entities::alert_rule;
use crate::db::services::alert_service;
use crate::web::error::AppError;
use crate::web::models::{CreateAlertRuleRequest, MessageResponse, UpdateAlertRuleRequest};
use crate::web::AppState;

pub fn alert_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/rules", get(list_rules_handler).post(create_rule_handler))
        .route(
            "/rules/{id}",
            axum::routing::put(update_rule_handler).delete(delete_rule_handler),
        )
        .route("/start-monitoring", post(start_monitoring_handler))
        .route("/stop-monitoring", post(stop_monitoring_handler))
}

async fn list_rules_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<alert_rule::Model>>, AppError> {
    Ok(Json(alert_service::list_rules(&state.db).await?))
}

async fn create_rule_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateAlertRuleRequest>,
) -> Result<(StatusCode, Json<alert_rule::Model>), AppError> {
    let rule = alert_service::create_rule(&state.db, payload).await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

async fn update_rule_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateAlertRuleRequest>,
) -> Result<Json<alert_rule::Model>, AppError> {
    Ok(Json(alert_service::update_rule(&state.db, &id, payload).await?))
}

async fn delete_rule_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    alert_service::delete_rule(&state.db, &id).await?;
    Ok(Json(MessageResponse::new("Alert rule deleted")))
}

async fn start_monitoring_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MessageResponse>, AppError> {
    let started = state.monitor.start().await;
    let message = if started {
        "Alert monitoring started"
    } else {
        "Alert monitoring is already running"
    };
    Ok(Json(MessageResponse::new(message)))
}

async fn stop_monitoring_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MessageResponse>, AppError> {
    let stopped = state.monitor.stop().await;
    let message = if stopped {
        "Alert monitoring stopped"
    } else {
        "Alert monitoring was not running"
    };
    Ok(Json(MessageResponse::new(message)))
}
