use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::db::entities::notification;
use crate::web::error::AppError;

/// Persists one notification row. Dispatch to outbound channels happens in
/// `notifications::service`, not here.
pub async fn record(
    db: &DatabaseConnection,
    kind: &str,
    title: &str,
    message: &str,
) -> Result<notification::Model, AppError> {
    let model = notification::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        kind: Set(kind.to_string()),
        title: Set(title.to_string()),
        message: Set(message.to_string()),
        read: Set(false),
        created_at: Set(Utc::now()),
    };
    Ok(model.insert(db).await?)
}

pub async fn list(
    db: &DatabaseConnection,
    limit: u64,
) -> Result<Vec<notification::Model>, AppError> {
    Ok(notification::Entity::find()
        .order_by_desc(notification::Column::CreatedAt)
        .limit(limit)
        .all(db)
        .await?)
}

pub async fn mark_read(db: &DatabaseConnection, id: &str) -> Result<(), AppError> {
    let row = notification::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))?;
    let mut active: notification::ActiveModel = row.into();
    active.read = Set(true);
    active.update(db).await?;
    Ok(())
}

pub async fn mark_all_read(db: &DatabaseConnection) -> Result<u64, AppError> {
    use sea_orm::sea_query::Expr;
    let result = notification::Entity::update_many()
        .col_expr(notification::Column::Read, Expr::value(true))
        .filter(notification::Column::Read.eq(false))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_test_db;

    #[tokio::test]
    async fn record_and_mark_read() {
        let db = connect_test_db().await;
        let first = record(&db, "warning", "Alert: High CPU", "CPU is 92.0%")
            .await
            .expect("record");
        record(&db, "info", "Backup", "Backup completed")
            .await
            .expect("record");

        let unread = list(&db, 50).await.expect("list");
        assert_eq!(unread.len(), 2);
        assert!(unread.iter().all(|n| !n.read));

        mark_read(&db, &first.id).await.expect("mark read");
        let after = list(&db, 50).await.expect("list");
        assert_eq!(after.iter().filter(|n| n.read).count(), 1);

        let changed = mark_all_read(&db).await.expect("mark all");
        assert_eq!(changed, 1);
    }

    #[tokio::test]
    async fn mark_read_unknown_id_is_not_found() {
        let db = connect_test_db().await;
        assert!(matches!(
            mark_read(&db, "missing").await,
            Err(AppError::NotFound(_))
        ));
    }
}
