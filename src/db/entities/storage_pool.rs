use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A mount point tracked for capacity reporting. Used/total bytes are read
/// live from the filesystem when pools are listed, never stored.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "storage_pools")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub mount_point: String,
    /// `local`, `remote` or `network`.
    pub pool_type: String,
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
