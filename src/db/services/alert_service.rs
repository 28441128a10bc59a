use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::db::entities::alert_rule;
use crate::web::error::AppError;
use crate::web::models::{CreateAlertRuleRequest, UpdateAlertRuleRequest};

const METRICS: &[&str] = &["cpu", "ram", "disk"];
const COMPARISONS: &[&str] = &["gt", "lt"];

fn validate(metric: &str, comparison: &str) -> Result<(), AppError> {
    if !METRICS.contains(&metric) {
        return Err(AppError::Validation(format!("Unknown metric '{metric}'")));
    }
    if !COMPARISONS.contains(&comparison) {
        return Err(AppError::Validation(format!(
            "Unknown comparison '{comparison}'"
        )));
    }
    Ok(())
}

pub async fn list_rules(db: &DatabaseConnection) -> Result<Vec<alert_rule::Model>, AppError> {
    Ok(alert_rule::Entity::find().all(db).await?)
}

pub async fn list_enabled_rules(
    db: &DatabaseConnection,
) -> Result<Vec<alert_rule::Model>, AppError> {
    Ok(alert_rule::Entity::find()
        .filter(alert_rule::Column::Enabled.eq(true))
        .all(db)
        .await?)
}

pub async fn create_rule(
    db: &DatabaseConnection,
    payload: CreateAlertRuleRequest,
) -> Result<alert_rule::Model, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation(
            "Rule name must not be empty".to_string(),
        ));
    }
    validate(&payload.metric, &payload.comparison)?;

    let model = alert_rule::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        name: Set(payload.name),
        metric: Set(payload.metric),
        comparison: Set(payload.comparison),
        threshold: Set(payload.threshold),
        enabled: Set(payload.enabled.unwrap_or(true)),
        last_triggered_at: Set(None),
        created_at: Set(Utc::now()),
    };
    Ok(model.insert(db).await?)
}

pub async fn update_rule(
    db: &DatabaseConnection,
    id: &str,
    payload: UpdateAlertRuleRequest,
) -> Result<alert_rule::Model, AppError> {
    let rule = alert_rule::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Alert rule not found".to_string()))?;

    let metric = payload.metric.unwrap_or_else(|| rule.metric.clone());
    let comparison = payload.comparison.unwrap_or_else(|| rule.comparison.clone());
    validate(&metric, &comparison)?;

    let mut active: alert_rule::ActiveModel = rule.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    active.metric = Set(metric);
    active.comparison = Set(comparison);
    if let Some(threshold) = payload.threshold {
        active.threshold = Set(threshold);
    }
    if let Some(enabled) = payload.enabled {
        active.enabled = Set(enabled);
    }
    Ok(active.update(db).await?)
}

pub async fn delete_rule(db: &DatabaseConnection, id: &str) -> Result<(), AppError> {
    let result = alert_rule::Entity::delete_by_id(id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Alert rule not found".to_string()));
    }
    Ok(())
}

pub async fn touch_last_triggered(db: &DatabaseConnection, id: &str) -> Result<(), AppError> {
    let rule = alert_rule::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Alert rule not found".to_string()))?;
    let mut active: alert_rule::ActiveModel = rule.into();
    active.last_triggered_at = Set(Some(Utc::now()));
    active.update(db).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_test_db;

    fn cpu_rule() -> CreateAlertRuleRequest {
        CreateAlertRuleRequest {
            name: "High CPU".to_string(),
            metric: "cpu".to_string(),
            comparison: "gt".to_string(),
            threshold: 80.0,
            enabled: None,
        }
    }

    #[tokio::test]
    async fn create_and_toggle_rule() {
        let db = connect_test_db().await;
        let rule = create_rule(&db, cpu_rule()).await.expect("create");
        assert!(rule.enabled);
        assert!(rule.last_triggered_at.is_none());

        let updated = update_rule(
            &db,
            &rule.id,
            UpdateAlertRuleRequest {
                enabled: Some(false),
                ..Default::default()
            },
        )
        .await
        .expect("update");
        assert!(!updated.enabled);
        assert!(list_enabled_rules(&db).await.expect("enabled").is_empty());
    }

    #[tokio::test]
    async fn invalid_metric_is_rejected() {
        let db = connect_test_db().await;
        let mut payload = cpu_rule();
        payload.metric = "gpu".to_string();
        assert!(matches!(
            create_rule(&db, payload).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn touch_updates_last_triggered() {
        let db = connect_test_db().await;
        let rule = create_rule(&db, cpu_rule()).await.expect("create");
        touch_last_triggered(&db, &rule.id).await.expect("touch");
        let rules = list_rules(&db).await.expect("list");
        assert!(rules[0].last_triggered_at.is_some());
    }
}
