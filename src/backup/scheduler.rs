//! Scheduled backups: an interval task snapshots the database and every
//! storage pool, then prunes archives past the retention window.

use std::sync::Arc;
use std::time::Duration;

use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::db::services::storage_service;
use crate::notifications::NotificationService;
use crate::web::error::AppError;

use super::{BackupError, BackupManager, BackupRequest};

/// The persisted schedule document. Defaults mirror an unconfigured
/// dashboard: disabled, daily, one week of retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupSchedule {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u64,
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

fn default_interval_hours() -> u64 {
    24
}

fn default_retention_days() -> i64 {
    7
}

impl Default for BackupSchedule {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_hours: default_interval_hours(),
            retention_days: default_retention_days(),
        }
    }
}

/// Owns the scheduled-backup task, with the same start/stop contract as the
/// alert poller: start is a no-op while a task runs, stop aborts it.
pub struct BackupScheduler {
    db: DatabaseConnection,
    manager: BackupManager,
    notifications: Arc<NotificationService>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl BackupScheduler {
    pub fn new(
        db: DatabaseConnection,
        manager: BackupManager,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            db,
            manager,
            notifications,
            task: Mutex::new(None),
        }
    }

    /// Returns false when a scheduled task was already running.
    pub async fn start(&self, schedule: BackupSchedule) -> bool {
        let mut task = self.task.lock().await;
        if let Some(handle) = task.as_ref() {
            if !handle.is_finished() {
                return false;
            }
        }

        let db = self.db.clone();
        let manager = self.manager.clone();
        let notifications = self.notifications.clone();
        let period = Duration::from_secs(schedule.interval_hours.max(1) * 3600);
        let retention_days = schedule.retention_days;
        *task = Some(tokio::spawn(async move {
            info!(
                interval_hours = schedule.interval_hours,
                retention_days, "Backup schedule started."
            );
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately; enabling the schedule
            // must not trigger a backup on the spot.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = run_cycle(&db, &manager, &notifications, retention_days).await {
                    warn!(error = %e, "Scheduled backup cycle failed.");
                }
            }
        }));
        true
    }

    /// Returns false when no scheduled task was running.
    pub async fn stop(&self) -> bool {
        let mut task = self.task.lock().await;
        match task.take() {
            Some(handle) => {
                handle.abort();
                info!("Backup schedule stopped.");
                true
            }
            None => false,
        }
    }

    pub async fn is_running(&self) -> bool {
        let task = self.task.lock().await;
        task.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }
}

/// One scheduled run: snapshot the database and every pool, prune expired
/// archives, and report the outcome as a notification either way.
async fn run_cycle(
    db: &DatabaseConnection,
    manager: &BackupManager,
    notifications: &NotificationService,
    retention_days: i64,
) -> Result<(), AppError> {
    let volumes = storage_service::volume_sources(db).await?;
    let request = BackupRequest {
        include_database: true,
        include_volumes: true,
        include_containers: false,
    };

    let worker = manager.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let record = worker.create_backup(&request, &volumes, &[])?;
        let pruned = worker.prune_backups(retention_days)?;
        Ok::<_, BackupError>((record, pruned))
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?;

    match outcome {
        Ok((record, pruned)) => {
            notifications
                .notify(
                    "success",
                    "Scheduled backup completed",
                    &format!(
                        "Archive {} written, {pruned} expired archive(s) pruned",
                        record.filename
                    ),
                )
                .await?;
        }
        Err(e) => {
            notifications
                .notify("error", "Scheduled backup failed", &e.to_string())
                .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_test_db;

    #[test]
    fn empty_schedule_document_gets_the_defaults() {
        let schedule: BackupSchedule = serde_json::from_value(serde_json::json!({})).expect("parse");
        assert!(!schedule.enabled);
        assert_eq!(schedule.interval_hours, 24);
        assert_eq!(schedule.retention_days, 7);
    }

    #[tokio::test]
    async fn start_is_a_noop_while_running_and_stop_halts() {
        let db = connect_test_db().await;
        let root = tempfile::tempdir().expect("tempdir");
        let scheduler = BackupScheduler::new(
            db.clone(),
            BackupManager::new(root.path().join("backups"), root.path().join("mediadock.db")),
            Arc::new(NotificationService::new(db)),
        );

        let schedule = BackupSchedule {
            enabled: true,
            ..Default::default()
        };
        assert!(scheduler.start(schedule.clone()).await);
        assert!(scheduler.is_running().await);
        assert!(!scheduler.start(schedule).await);

        assert!(scheduler.stop().await);
        assert!(!scheduler.is_running().await);
        assert!(!scheduler.stop().await);
    }
}
