use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};

use crate::metrics::{self, HostSample};
use crate::web::error::AppError;
use crate::web::models::{SystemHealthResponse, SystemMetricsResponse};
use crate::web::AppState;

pub fn metrics_router() -> Router<Arc<AppState>> {
    Router::new().route("/metrics", get(system_metrics_handler))
}

pub fn health_router() -> Router<Arc<AppState>> {
    Router::new().route("/system", get(system_health_handler))
}

async fn system_metrics_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SystemMetricsResponse>, AppError> {
    let sample = state.metrics.sample().await;
    let gpu = metrics::gpu_info().await;
    Ok(Json(SystemMetricsResponse {
        cpu_percent: sample.cpu_percent,
        cpu_count: sample.cpu_count,
        ram_total: sample.ram_total,
        ram_used: sample.ram_used,
        ram_percent: sample.ram_percent,
        storage_total: sample.storage_total,
        storage_used: sample.storage_used,
        storage_percent: sample.storage_percent,
        gpu,
    }))
}

async fn system_health_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SystemHealthResponse>, AppError> {
    let sample = state.metrics.sample().await;
    let (containers, engine_ok) = match &state.docker {
        Some(docker) => match docker.list_containers().await {
            Ok(containers) => (containers, true),
            Err(_) => (Vec::new(), false),
        },
        None => (Vec::new(), false),
    };
    let running = containers.iter().filter(|c| c.status == "running").count();
    Ok(Json(health_score(
        &sample,
        containers.len(),
        running,
        engine_ok,
    )))
}

/// 0-100, with deductions for stopped containers, resource pressure and an
/// unreachable engine.
fn health_score(
    sample: &HostSample,
    containers_total: usize,
    containers_running: usize,
    engine_ok: bool,
) -> SystemHealthResponse {
    let mut score: i64 = 100;
    let mut issues = Vec::new();

    if !engine_ok {
        score -= 30;
        issues.push("Container engine is unreachable".to_string());
    }

    let stopped = containers_total.saturating_sub(containers_running);
    if stopped > 0 {
        score -= (stopped as i64) * 10;
        issues.push(format!("{stopped} container(s) are not running"));
    }

    if sample.ram_percent > 90.0 {
        score -= 20;
        issues.push(format!("Memory usage is at {:.1}%", sample.ram_percent));
    }
    if sample.storage_percent > 90.0 {
        score -= 20;
        issues.push(format!("Disk usage is at {:.1}%", sample.storage_percent));
    }

    let score = score.clamp(0, 100) as u32;
    let status = if score >= 90 {
        "healthy"
    } else if score >= 70 {
        "degraded"
    } else {
        "unhealthy"
    };

    SystemHealthResponse {
        score,
        status: status.to_string(),
        containers_total,
        containers_running,
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_sample() -> HostSample {
        HostSample {
            cpu_percent: 10.0,
            cpu_count: 4,
            ram_total: 8,
            ram_used: 2,
            ram_percent: 25.0,
            storage_total: 100,
            storage_used: 40,
            storage_percent: 40.0,
        }
    }

    #[test]
    fn all_running_and_quiet_host_is_healthy() {
        let health = health_score(&quiet_sample(), 3, 3, true);
        assert_eq!(health.score, 100);
        assert_eq!(health.status, "healthy");
        assert!(health.issues.is_empty());
    }

    #[test]
    fn stopped_containers_and_pressure_degrade_the_score() {
        let mut sample = quiet_sample();
        sample.storage_percent = 95.0;
        let health = health_score(&sample, 4, 3, true);
        assert_eq!(health.score, 100 - 10 - 20);
        assert_eq!(health.status, "degraded");
        assert_eq!(health.issues.len(), 2);

        // A second stopped container pushes the score past the threshold.
        let health = health_score(&sample, 4, 2, true);
        assert_eq!(health.score, 100 - 20 - 20);
        assert_eq!(health.status, "unhealthy");
    }

    #[test]
    fn score_never_goes_below_zero() {
        let mut sample = quiet_sample();
        sample.ram_percent = 99.0;
        sample.storage_percent = 99.0;
        let health = health_score(&sample, 20, 0, false);
        assert_eq!(health.score, 0);
        assert_eq!(health.status, "unhealthy");
    }
}
