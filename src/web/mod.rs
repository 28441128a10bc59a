use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Extension, State},
    http::Method,
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, SameSite};
use sea_orm::DatabaseConnection;
use tower_http::cors::{Any, CorsLayer};

use crate::alerting::MonitorService;
use crate::backup::scheduler::BackupScheduler;
use crate::backup::BackupManager;
use crate::db::services::user_service;
use crate::docker::DockerManager;
use crate::metrics::SystemMetricsCollector;
use crate::notifications::NotificationService;
use crate::server::config::ServerConfig;
use crate::services::auth_service;

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;

use error::AppError;
use models::{AuthenticatedUser, LoginRequest, MessageResponse, RegisterRequest, UserResponse};
use routes::*;

pub struct AppState {
    pub db: DatabaseConnection,
    /// `None` when the engine socket was unreachable at startup; the
    /// dashboard stays usable, container operations fail with 503.
    pub docker: Option<Arc<DockerManager>>,
    pub config: Arc<ServerConfig>,
    pub metrics: Arc<SystemMetricsCollector>,
    pub notifications: Arc<NotificationService>,
    pub backup: Arc<BackupManager>,
    pub scheduler: Arc<BackupScheduler>,
    pub monitor: Arc<MonitorService>,
}

impl AppState {
    pub fn new(
        db: DatabaseConnection,
        docker: Option<Arc<DockerManager>>,
        config: Arc<ServerConfig>,
    ) -> Arc<Self> {
        let metrics = Arc::new(SystemMetricsCollector::new());
        let notifications = Arc::new(NotificationService::new(db.clone()));
        let backup = Arc::new(BackupManager::new(
            config.backup_dir.clone(),
            config.database_file_path(),
        ));
        let scheduler = Arc::new(BackupScheduler::new(
            db.clone(),
            (*backup).clone(),
            notifications.clone(),
        ));
        let monitor = Arc::new(MonitorService::new(
            db.clone(),
            metrics.clone(),
            notifications.clone(),
            Duration::from_secs(config.monitor_interval_secs),
        ));
        Arc::new(Self {
            db,
            docker,
            config,
            metrics,
            notifications,
            backup,
            scheduler,
            monitor,
        })
    }

    pub fn docker(&self) -> Result<&Arc<DockerManager>, AppError> {
        self.docker.as_ref().ok_or(AppError::EngineUnavailable)
    }
}

async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<UserResponse>, AppError> {
    Ok(Json(auth_service::register_user(&state.db, payload).await?))
}

async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let login = auth_service::login_user(&state.db, payload, &state.config.jwt_secret).await?;

    let cookie = Cookie::build(("token", login.token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    let cookie_value = cookie
        .to_string()
        .parse()
        .map_err(|e| AppError::Internal(format!("Invalid cookie header: {e}")))?;

    let mut response = Json(login).into_response();
    response
        .headers_mut()
        .insert(axum::http::header::SET_COOKIE, cookie_value);
    Ok(response)
}

async fn me_handler(
    Extension(user): Extension<AuthenticatedUser>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<UserResponse>, AppError> {
    let user = user_service::find_by_id(&state.db, &user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(Json(UserResponse {
        id: user.id,
        username: user.username,
        email: user.email,
        first_login: user.first_login,
    }))
}

async fn mark_onboarded_handler(
    Extension(user): Extension<AuthenticatedUser>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<MessageResponse>, AppError> {
    user_service::mark_onboarded(&state.db, &user.id).await?;
    Ok(Json(MessageResponse::new("Onboarding completed")))
}

async fn health_check_handler() -> &'static str {
    "OK"
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    let protect = |router: Router<Arc<AppState>>| {
        router.route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth,
        ))
    };

    // The WebSocket route authenticates via query token, so it sits outside
    // the header-based middleware.
    let advanced = protect(
        container_routes::advanced_container_router()
            .nest("/backup", backup_routes::backup_router())
            .nest("/alerts", alert_routes::alert_router())
            .nest("/notifications", notification_routes::notification_router())
            .nest("/networks", network_routes::network_router())
            .nest("/health", system_routes::health_router()),
    )
    .route(
        "/ws/logs/{container_id}",
        get(handlers::logs_ws::logs_ws_handler),
    );

    Router::new()
        .route("/api/health", get(health_check_handler))
        .route("/api/auth/register", post(register_handler))
        .route("/api/auth/login", post(login_handler))
        .route(
            "/api/auth/me",
            get(me_handler).route_layer(axum_middleware::from_fn_with_state(
                state.clone(),
                middleware::auth::auth,
            )),
        )
        .route(
            "/api/auth/mark-onboarded",
            post(mark_onboarded_handler).route_layer(axum_middleware::from_fn_with_state(
                state.clone(),
                middleware::auth::auth,
            )),
        )
        .nest("/api/system", protect(system_routes::metrics_router()))
        .nest(
            "/api/containers",
            protect(container_routes::container_router()),
        )
        .nest("/api/apps", protect(app_routes::app_router()))
        .nest("/api/storage", protect(storage_routes::storage_router()))
        .nest("/api/settings", protect(settings_routes::settings_router()))
        .nest("/api/advanced", advanced)
        .with_state(state)
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_test_db;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn test_app() -> Router {
        let db = connect_test_db().await;
        let config = Arc::new(ServerConfig {
            listen_address: "127.0.0.1:0".to_string(),
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: "test-secret".to_string(),
            backup_dir: std::env::temp_dir().join("mediadock-test-backups"),
            monitor_interval_secs: 30,
        });
        create_router(AppState::new(db, None, config))
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    fn bare_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::empty()).expect("request")
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.expect("body").to_bytes();
        serde_json::from_slice(&bytes).expect("json body")
    }

    async fn register_and_login(app: &Router) -> String {
        let credentials = serde_json::json!({
            "username": "admin",
            "password": "correct horse battery",
        });
        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/auth/register", credentials.clone()))
            .await
            .expect("register");
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/auth/login", credentials))
            .await
            .expect("login");
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(header::SET_COOKIE));
        let body = body_json(response).await;
        body["token"].as_str().expect("token").to_string()
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = test_app().await;
        let response = app
            .oneshot(bare_request("GET", "/api/health", None))
            .await
            .expect("health");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn protected_routes_require_a_token() {
        let app = test_app().await;
        let response = app
            .oneshot(bare_request("GET", "/api/storage/pools", None))
            .await
            .expect("pools");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn register_login_me_and_onboarding_flow() {
        let app = test_app().await;
        let token = register_and_login(&app).await;

        let response = app
            .clone()
            .oneshot(bare_request("GET", "/api/auth/me", Some(&token)))
            .await
            .expect("me");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["username"], "admin");
        assert_eq!(body["first_login"], true);

        let response = app
            .clone()
            .oneshot(bare_request("POST", "/api/auth/mark-onboarded", Some(&token)))
            .await
            .expect("onboard");
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(bare_request("GET", "/api/auth/me", Some(&token)))
            .await
            .expect("me");
        let body = body_json(response).await;
        assert_eq!(body["first_login"], false);
    }

    #[tokio::test]
    async fn container_listing_degrades_without_an_engine() {
        let app = test_app().await;
        let token = register_and_login(&app).await;
        let response = app
            .oneshot(bare_request("GET", "/api/containers/list", Some(&token)))
            .await
            .expect("list");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!([]));
    }

    #[tokio::test]
    async fn engine_mutations_fail_with_service_unavailable() {
        let app = test_app().await;
        let token = register_and_login(&app).await;
        let response = app
            .oneshot(bare_request("GET", "/api/advanced/networks", Some(&token)))
            .await
            .expect("networks");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn bodyless_install_reaches_the_handler() {
        let app = test_app().await;
        let token = register_and_login(&app).await;

        // No JSON body and no content type: the install endpoint must still
        // answer from the handler (503 here, since tests run engineless)
        // rather than reject the request at the extractor.
        let response = app
            .oneshot(bare_request("POST", "/api/apps/install/jellyfin", Some(&token)))
            .await
            .expect("install");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn seeded_templates_are_served_and_unknown_deletes_are_404() {
        let app = test_app().await;
        let token = register_and_login(&app).await;

        let response = app
            .clone()
            .oneshot(bare_request("POST", "/api/apps/seed", Some(&token)))
            .await
            .expect("seed");
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(bare_request("GET", "/api/apps/templates", Some(&token)))
            .await
            .expect("templates");
        let body = body_json(response).await;
        let templates = body.as_array().expect("array");
        assert!(templates.iter().any(|t| t["id"] == "jellyfin"));

        let response = app
            .oneshot(bare_request(
                "DELETE",
                "/api/apps/templates/not-a-template",
                Some(&token),
            ))
            .await
            .expect("delete");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn settings_roundtrip_over_http() {
        let app = test_app().await;
        let token = register_and_login(&app).await;

        let mut request = json_request(
            "PUT",
            "/api/settings",
            serde_json::json!({"server_name": "Den", "ddns_enabled": true}),
        );
        request
            .headers_mut()
            .insert(header::AUTHORIZATION, format!("Bearer {token}").parse().unwrap());
        let response = app.clone().oneshot(request).await.expect("put settings");
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(bare_request("GET", "/api/settings", Some(&token)))
            .await
            .expect("get settings");
        let body = body_json(response).await;
        assert_eq!(body["server_name"], "Den");
        assert_eq!(body["ddns_enabled"], true);
        // Unspecified fields keep their defaults.
        assert_eq!(body["timezone"], "UTC");
    }

    #[tokio::test]
    async fn backup_schedule_roundtrips_and_validates() {
        let app = test_app().await;
        let token = register_and_login(&app).await;

        let mut request = json_request(
            "PUT",
            "/api/advanced/backup/schedule",
            serde_json::json!({"enabled": false, "interval_hours": 12, "retention_days": 3}),
        );
        request
            .headers_mut()
            .insert(header::AUTHORIZATION, format!("Bearer {token}").parse().unwrap());
        let response = app.clone().oneshot(request).await.expect("put schedule");
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(bare_request("GET", "/api/advanced/backup/schedule", Some(&token)))
            .await
            .expect("get schedule");
        let body = body_json(response).await;
        assert_eq!(body["enabled"], false);
        assert_eq!(body["interval_hours"], 12);
        assert_eq!(body["retention_days"], 3);

        let mut request = json_request(
            "PUT",
            "/api/advanced/backup/schedule",
            serde_json::json!({"enabled": true, "interval_hours": 0}),
        );
        request
            .headers_mut()
            .insert(header::AUTHORIZATION, format!("Bearer {token}").parse().unwrap());
        let response = app.oneshot(request).await.expect("put schedule");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn invalid_alert_rules_are_rejected_over_http() {
        let app = test_app().await;
        let token = register_and_login(&app).await;

        let mut request = json_request(
            "POST",
            "/api/advanced/alerts/rules",
            serde_json::json!({
                "name": "Weird rule",
                "metric": "gpu",
                "comparison": "gt",
                "threshold": 50.0,
            }),
        );
        request
            .headers_mut()
            .insert(header::AUTHORIZATION, format!("Bearer {token}").parse().unwrap());
        let response = app.oneshot(request).await.expect("create rule");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("gpu"));
    }
}
