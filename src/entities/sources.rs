use sea_orm::entity::prelude::*;

/// Configured playlist or guide source plus its run bookkeeping
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "sources")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    pub role: String,
    pub label: String,
    pub rank: i32,
    pub enabled: bool,
    pub kind: String,
    pub path: String,
    pub archive: String,
    /// `PlaylistOptions` as JSON
    #[sea_orm(column_type = "Text")]
    pub options: String,
    /// Run history as a JSON array, newest first
    #[sea_orm(column_type = "Text")]
    pub results: String,
    pub start_index: i64,
    pub end_index: i64,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
