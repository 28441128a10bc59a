use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// An installable application template: image plus default ports, volumes and
/// environment. Built-in catalog entries use stable slug ids ("jellyfin");
/// user-submitted templates get a UUID.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "app_templates")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: Option<String>,
    pub category: String,
    pub docker_image: String,
    pub github_repo: Option<String>,
    /// JSON array of container ports, e.g. `[8096]`.
    pub ports: Option<Json>,
    /// JSON map of default environment variables.
    pub environment: Option<Json>,
    /// JSON array of bind-mount strings.
    pub volumes: Option<Json>,
    pub official: bool,
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
