use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "channels")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub slug: String,
    pub source_id: i32,
    pub name: String,
    pub tvg_name: Option<String>,
    pub epg_id: Option<String>,
    pub logo: Option<String>,
    pub chno: Option<i32>,
    /// JSON array
    #[sea_orm(column_type = "Text")]
    pub groups: String,
    pub radio: bool,
    pub is_live: bool,
    pub visible: bool,
    #[sea_orm(column_type = "Text")]
    pub url: String,
    /// JSON objects
    #[sea_orm(column_type = "Text")]
    pub attributes: String,
    #[sea_orm(column_type = "Text")]
    pub properties: String,
    #[sea_orm(column_type = "Text")]
    pub vlc_options: String,
    pub custom: bool,
    pub position: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
