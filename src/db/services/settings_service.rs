use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::db::entities::setting;
use crate::web::error::AppError;

pub const SYSTEM_SETTINGS_KEY: &str = "system";
pub const NOTIFICATION_CHANNELS_KEY: &str = "notification_channels";
pub const BACKUP_SCHEDULE_KEY: &str = "backup_schedule";

/// Reads one settings document, deserialized into its typed form. Returns
/// the type's `Default` when the key has never been written.
pub async fn get<T>(db: &DatabaseConnection, key: &str) -> Result<T, AppError>
where
    T: DeserializeOwned + Default,
{
    match setting::Entity::find_by_id(key).one(db).await? {
        Some(row) => Ok(serde_json::from_value(row.value)?),
        None => Ok(T::default()),
    }
}

pub async fn set<T>(db: &DatabaseConnection, key: &str, value: &T) -> Result<(), AppError>
where
    T: Serialize,
{
    let json = serde_json::to_value(value)?;
    let existing = setting::Entity::find_by_id(key).one(db).await?;
    match existing {
        Some(row) => {
            let mut active: setting::ActiveModel = row.into();
            active.value = Set(json);
            active.updated_at = Set(Utc::now());
            active.update(db).await?;
        }
        None => {
            let model = setting::ActiveModel {
                key: Set(key.to_string()),
                value: Set(json),
                updated_at: Set(Utc::now()),
            };
            model.insert(db).await?;
        }
    }
    Ok(())
}
