use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use uuid::Uuid;

use crate::db::entities::user;
use crate::web::error::AppError;

pub async fn create_user(
    db: &DatabaseConnection,
    username: &str,
    password_hash: String,
    email: Option<String>,
) -> Result<user::Model, AppError> {
    let existing = user::Entity::find()
        .filter(user::Column::Username.eq(username))
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict("Username already exists".to_string()));
    }

    let model = user::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        username: Set(username.to_string()),
        password_hash: Set(password_hash),
        email: Set(email),
        first_login: Set(true),
        created_at: Set(Utc::now()),
    };
    Ok(model.insert(db).await?)
}

pub async fn find_by_username(
    db: &DatabaseConnection,
    username: &str,
) -> Result<Option<user::Model>, AppError> {
    Ok(user::Entity::find()
        .filter(user::Column::Username.eq(username))
        .one(db)
        .await?)
}

pub async fn find_by_id(
    db: &DatabaseConnection,
    id: &str,
) -> Result<Option<user::Model>, AppError> {
    Ok(user::Entity::find_by_id(id).one(db).await?)
}

/// Clears the first-login flag after the onboarding flow completes.
pub async fn mark_onboarded(db: &DatabaseConnection, id: &str) -> Result<(), AppError> {
    let user = user::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    let mut active: user::ActiveModel = user.into();
    active.first_login = Set(false);
    active.update(db).await?;
    Ok(())
}
