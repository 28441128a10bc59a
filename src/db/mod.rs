pub mod entities;
pub mod services;

use sea_orm::sea_query::TableCreateStatement;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, Schema};
use tracing::info;

pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(database_url).await
}

/// Creates all tables that do not exist yet. The schema is derived from the
/// entities, so there is no separate migration step to keep in sync.
pub async fn init_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let statements: Vec<TableCreateStatement> = vec![
        schema.create_table_from_entity(entities::user::Entity),
        schema.create_table_from_entity(entities::app_template::Entity),
        schema.create_table_from_entity(entities::storage_pool::Entity),
        schema.create_table_from_entity(entities::alert_rule::Entity),
        schema.create_table_from_entity(entities::notification::Entity),
        schema.create_table_from_entity(entities::setting::Entity),
    ];

    for mut statement in statements {
        statement.if_not_exists();
        db.execute(backend.build(&statement)).await?;
    }
    info!("Database schema is up to date.");
    Ok(())
}

#[cfg(test)]
pub(crate) async fn connect_test_db() -> DatabaseConnection {
    let db = connect("sqlite::memory:").await.expect("in-memory sqlite");
    init_schema(&db).await.expect("schema init");
    db
}
