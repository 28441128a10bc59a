use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use uuid::Uuid;

use crate::backup::VolumeSource;
use crate::db::entities::storage_pool;
use crate::metrics;
use crate::web::error::AppError;
use crate::web::models::{CreateStoragePoolRequest, StoragePoolResponse};

const POOL_TYPES: &[&str] = &["local", "remote", "network"];

/// Lists all pools with used/total bytes read live from the filesystem.
/// A pool whose mount point has since vanished reports zero capacity rather
/// than failing the whole listing.
pub async fn list_pools(db: &DatabaseConnection) -> Result<Vec<StoragePoolResponse>, AppError> {
    let pools = storage_pool::Entity::find().all(db).await?;
    Ok(pools
        .into_iter()
        .map(|pool| {
            let (used_space, total_space) =
                metrics::disk_usage_for_path(&pool.mount_point).unwrap_or((0, 0));
            StoragePoolResponse {
                id: pool.id,
                name: pool.name,
                mount_point: pool.mount_point,
                pool_type: pool.pool_type,
                used_space,
                total_space,
                created_at: pool.created_at,
            }
        })
        .collect())
}

pub async fn create_pool(
    db: &DatabaseConnection,
    payload: CreateStoragePoolRequest,
) -> Result<StoragePoolResponse, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation(
            "Pool name must not be empty".to_string(),
        ));
    }
    if !POOL_TYPES.contains(&payload.pool_type.as_str()) {
        return Err(AppError::Validation(format!(
            "Unknown pool type '{}'",
            payload.pool_type
        )));
    }
    if std::fs::metadata(&payload.mount_point).is_err() {
        return Err(AppError::Validation(
            "Mount point does not exist".to_string(),
        ));
    }
    let (used_space, total_space) = metrics::disk_usage_for_path(&payload.mount_point)
        .ok_or_else(|| AppError::Validation("Cannot access mount point".to_string()))?;

    let model = storage_pool::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        name: Set(payload.name),
        mount_point: Set(payload.mount_point),
        pool_type: Set(payload.pool_type),
        created_at: Set(Utc::now()),
    };
    let pool = model.insert(db).await?;

    Ok(StoragePoolResponse {
        id: pool.id,
        name: pool.name,
        mount_point: pool.mount_point,
        pool_type: pool.pool_type,
        used_space,
        total_space,
        created_at: pool.created_at,
    })
}

/// Every pool as a backup volume source, with archive-safe names.
pub async fn volume_sources(db: &DatabaseConnection) -> Result<Vec<VolumeSource>, AppError> {
    let pools = storage_pool::Entity::find().all(db).await?;
    Ok(pools
        .into_iter()
        .map(|pool| VolumeSource {
            name: pool.name.replace('/', "-"),
            path: pool.mount_point.into(),
        })
        .collect())
}

pub async fn delete_pool(db: &DatabaseConnection, id: &str) -> Result<(), AppError> {
    let result = storage_pool::Entity::delete_by_id(id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Storage pool not found".to_string()));
    }
    Ok(())
}
