//! Request and response bodies for the HTTP API.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::docker::PortMapping;

// --- auth ---

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    pub first_login: bool,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub first_login: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Username.
    pub sub: String,
    pub user_id: String,
    pub exp: usize,
}

/// Inserted into request extensions by the auth middleware.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// --- templates & installs ---

#[derive(Debug, Default, Deserialize)]
pub struct CreateTemplateRequest {
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub category: Option<String>,
    pub docker_image: String,
    pub github_repo: Option<String>,
    pub ports: Option<Vec<u16>>,
    pub environment: Option<HashMap<String, String>>,
    pub volumes: Option<Vec<String>>,
}

/// Optional overrides applied on top of a template at install time.
#[derive(Debug, Default, Deserialize)]
pub struct InstallAppRequest {
    pub name: Option<String>,
    pub ports: Option<Vec<PortMapping>>,
    pub environment: Option<HashMap<String, String>>,
    pub volumes: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct InstalledAppResponse {
    pub container_id: String,
    pub name: String,
    pub image: String,
    pub ports: Vec<PortMapping>,
}

#[derive(Debug, Serialize)]
pub struct UpdateCheckResponse {
    pub container_id: String,
    pub name: String,
    pub image: String,
    pub update_available: bool,
}

#[derive(Debug, Serialize)]
pub struct UpdateApplyResponse {
    pub updated: bool,
    pub container_id: String,
    pub message: String,
}

/// New limits for a running container. Omitted fields are left unchanged.
/// CPU values are in cores, memory values in bytes.
#[derive(Debug, Default, Deserialize)]
pub struct ResourceLimitsRequest {
    pub cpu_limit: Option<f64>,
    pub memory_limit: Option<i64>,
    pub cpu_reservation: Option<f64>,
    pub memory_reservation: Option<i64>,
}

// --- storage ---

#[derive(Debug, Deserialize)]
pub struct CreateStoragePoolRequest {
    pub name: String,
    pub mount_point: String,
    pub pool_type: String,
}

#[derive(Debug, Serialize)]
pub struct StoragePoolResponse {
    pub id: String,
    pub name: String,
    pub mount_point: String,
    pub pool_type: String,
    pub used_space: u64,
    pub total_space: u64,
    pub created_at: DateTime<Utc>,
}

// --- alerts ---

#[derive(Debug, Deserialize)]
pub struct CreateAlertRuleRequest {
    pub name: String,
    pub metric: String,
    pub comparison: String,
    pub threshold: f64,
    pub enabled: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateAlertRuleRequest {
    pub name: Option<String>,
    pub metric: Option<String>,
    pub comparison: Option<String>,
    pub threshold: Option<f64>,
    pub enabled: Option<bool>,
}

// --- settings ---

/// The system settings document, stored whole under one settings key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemSettings {
    pub server_name: String,
    pub timezone: String,
    pub ddns_enabled: bool,
    pub ddns_provider: Option<String>,
    pub ddns_hostname: Option<String>,
    pub ssl_enabled: bool,
    pub ssl_email: Option<String>,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            server_name: "MediaDock".to_string(),
            timezone: "UTC".to_string(),
            ddns_enabled: false,
            ddns_provider: None,
            ddns_hostname: None,
            ssl_enabled: false,
            ssl_email: None,
        }
    }
}

// --- backups ---

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CreateBackupRequest {
    pub backup_path: Option<String>,
    pub include_database: bool,
    pub include_volumes: bool,
    pub include_containers: bool,
}

impl Default for CreateBackupRequest {
    fn default() -> Self {
        Self {
            backup_path: None,
            include_database: true,
            include_volumes: true,
            include_containers: true,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RestoreQuery {
    pub backup_path: String,
}

// --- networks ---

#[derive(Debug, Deserialize)]
pub struct CreateNetworkRequest {
    pub name: String,
    pub driver: Option<String>,
}

// --- system ---

#[derive(Debug, Serialize)]
pub struct SystemMetricsResponse {
    pub cpu_percent: f64,
    pub cpu_count: usize,
    pub ram_total: u64,
    pub ram_used: u64,
    pub ram_percent: f64,
    pub storage_total: u64,
    pub storage_used: u64,
    pub storage_percent: f64,
    pub gpu: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct SystemHealthResponse {
    /// 0-100, deductions for stopped containers and resource pressure.
    pub score: u32,
    pub status: String,
    pub containers_total: usize,
    pub containers_running: usize,
    pub issues: Vec<String>,
}

/// WebSocket clients cannot set headers, so the token rides in the query.
#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: String,
}
