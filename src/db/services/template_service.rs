use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use tracing::info;
use uuid::Uuid;

use crate::apps::catalog;
use crate::db::entities::app_template;
use crate::web::error::AppError;
use crate::web::models::CreateTemplateRequest;

pub async fn list_templates(
    db: &DatabaseConnection,
) -> Result<Vec<app_template::Model>, AppError> {
    Ok(app_template::Entity::find().all(db).await?)
}

pub async fn get_template(
    db: &DatabaseConnection,
    id: &str,
) -> Result<app_template::Model, AppError> {
    app_template::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Template not found".to_string()))
}

/// Inserts the built-in catalog. Idempotent: templates whose id already
/// exists are skipped, so seeding twice never duplicates entries.
pub async fn seed_templates(db: &DatabaseConnection) -> Result<usize, AppError> {
    let mut inserted = 0;
    for entry in catalog::builtin_templates() {
        let exists = app_template::Entity::find_by_id(entry.id)
            .one(db)
            .await?
            .is_some();
        if exists {
            continue;
        }
        let model = app_template::ActiveModel {
            id: Set(entry.id.to_string()),
            name: Set(entry.name.to_string()),
            description: Set(entry.description.to_string()),
            icon: Set(None),
            category: Set(entry.category.to_string()),
            docker_image: Set(entry.image.to_string()),
            github_repo: Set(Some(entry.github_repo.to_string())),
            ports: Set(Some(serde_json::json!(entry.ports))),
            environment: Set(None),
            volumes: Set(None),
            official: Set(true),
            created_at: Set(Utc::now()),
        };
        model.insert(db).await?;
        inserted += 1;
    }
    if inserted > 0 {
        info!(count = inserted, "Seeded built-in app templates.");
    }
    Ok(inserted)
}

pub async fn create_template(
    db: &DatabaseConnection,
    payload: CreateTemplateRequest,
) -> Result<app_template::Model, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation(
            "Template name must not be empty".to_string(),
        ));
    }
    if payload.docker_image.trim().is_empty() {
        return Err(AppError::Validation(
            "Docker image reference must not be empty".to_string(),
        ));
    }

    let model = app_template::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        name: Set(payload.name),
        description: Set(payload.description.unwrap_or_default()),
        icon: Set(payload.icon),
        category: Set(payload.category.unwrap_or_else(|| "Custom".to_string())),
        docker_image: Set(payload.docker_image),
        github_repo: Set(payload.github_repo),
        ports: Set(payload.ports.map(|p| serde_json::json!(p))),
        environment: Set(payload.environment.map(|e| serde_json::json!(e))),
        volumes: Set(payload.volumes.map(|v| serde_json::json!(v))),
        official: Set(false),
        created_at: Set(Utc::now()),
    };
    Ok(model.insert(db).await?)
}

pub async fn delete_template(db: &DatabaseConnection, id: &str) -> Result<(), AppError> {
    let result = app_template::Entity::delete_by_id(id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Template not found".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_test_db;

    #[tokio::test]
    async fn seed_is_idempotent() {
        let db = connect_test_db().await;

        let first = seed_templates(&db).await.expect("first seed");
        assert!(first > 0);

        let second = seed_templates(&db).await.expect("second seed");
        assert_eq!(second, 0);

        let templates = list_templates(&db).await.expect("list");
        assert_eq!(templates.len(), first);

        let mut ids: Vec<_> = templates.iter().map(|t| t.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), templates.len(), "no duplicate ids after reseed");
    }

    #[tokio::test]
    async fn builtin_ids_are_stable_slugs() {
        let db = connect_test_db().await;
        seed_templates(&db).await.expect("seed");

        let jellyfin = get_template(&db, "jellyfin").await.expect("jellyfin");
        assert_eq!(jellyfin.docker_image, "jellyfin/jellyfin:latest");
        assert!(jellyfin.official);
    }

    #[tokio::test]
    async fn create_rejects_empty_name_and_image() {
        let db = connect_test_db().await;

        let missing_name = CreateTemplateRequest {
            name: "  ".to_string(),
            docker_image: "linuxserver/sonarr:latest".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            create_template(&db, missing_name).await,
            Err(AppError::Validation(_))
        ));

        let missing_image = CreateTemplateRequest {
            name: "Sonarr".to_string(),
            docker_image: String::new(),
            ..Default::default()
        };
        assert!(matches!(
            create_template(&db, missing_image).await,
            Err(AppError::Validation(_))
        ));
        assert!(list_templates(&db).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn custom_templates_are_unofficial() {
        let db = connect_test_db().await;
        let payload = CreateTemplateRequest {
            name: "Navidrome".to_string(),
            docker_image: "deluan/navidrome:latest".to_string(),
            ports: Some(vec![4533]),
            ..Default::default()
        };
        let created = create_template(&db, payload).await.expect("create");
        assert!(!created.official);
        assert_eq!(created.ports, Some(serde_json::json!([4533])));
    }
}
