//! Initial schema: sources, channels and service state

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_sources_table(manager).await?;
        self.create_channels_table(manager).await?;
        self.create_app_state_table(manager).await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_channels_source_id")
                    .table(Channels::Table)
                    .col(Channels::SourceId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AppState::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Channels::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Sources::Table).to_owned())
            .await?;
        Ok(())
    }
}

impl Migration {
    async fn create_sources_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Sources::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Sources::Id).integer().not_null().primary_key())
                    .col(ColumnDef::new(Sources::Role).string().not_null())
                    .col(ColumnDef::new(Sources::Label).string().not_null())
                    .col(ColumnDef::new(Sources::Rank).integer().not_null().default(0))
                    .col(ColumnDef::new(Sources::Enabled).boolean().not_null().default(true))
                    .col(ColumnDef::new(Sources::Kind).string().not_null())
                    .col(ColumnDef::new(Sources::Path).text().not_null())
                    .col(ColumnDef::new(Sources::Archive).string().not_null())
                    .col(ColumnDef::new(Sources::Options).text().not_null())
                    .col(ColumnDef::new(Sources::Results).text().not_null())
                    .col(ColumnDef::new(Sources::StartIndex).big_integer().not_null().default(0))
                    .col(ColumnDef::new(Sources::EndIndex).big_integer().not_null().default(0))
                    .col(ColumnDef::new(Sources::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Sources::UpdatedAt).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await
    }

    async fn create_channels_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Channels::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Channels::Slug).string().not_null().primary_key())
                    .col(ColumnDef::new(Channels::SourceId).integer().not_null())
                    .col(ColumnDef::new(Channels::Name).string().not_null())
                    .col(ColumnDef::new(Channels::TvgName).string())
                    .col(ColumnDef::new(Channels::EpgId).string())
                    .col(ColumnDef::new(Channels::Logo).text())
                    .col(ColumnDef::new(Channels::Chno).integer())
                    .col(ColumnDef::new(Channels::Groups).text().not_null())
                    .col(ColumnDef::new(Channels::Radio).boolean().not_null().default(false))
                    .col(ColumnDef::new(Channels::IsLive).boolean().not_null().default(true))
                    .col(ColumnDef::new(Channels::Visible).boolean().not_null().default(true))
                    .col(ColumnDef::new(Channels::Url).text().not_null())
                    .col(ColumnDef::new(Channels::Attributes).text().not_null())
                    .col(ColumnDef::new(Channels::Properties).text().not_null())
                    .col(ColumnDef::new(Channels::VlcOptions).text().not_null())
                    .col(ColumnDef::new(Channels::Custom).boolean().not_null().default(false))
                    .col(ColumnDef::new(Channels::Position).integer().not_null())
                    .to_owned(),
            )
            .await
    }

    async fn create_app_state_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AppState::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(AppState::Key).string().not_null().primary_key())
                    .col(ColumnDef::new(AppState::Value).text().not_null())
                    .col(ColumnDef::new(AppState::UpdatedAt).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
pub enum Sources {
    Table,
    Id,
    Role,
    Label,
    Rank,
    Enabled,
    Kind,
    Path,
    Archive,
    Options,
    Results,
    StartIndex,
    EndIndex,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum Channels {
    Table,
    Slug,
    SourceId,
    Name,
    TvgName,
    EpgId,
    Logo,
    Chno,
    Groups,
    Radio,
    IsLive,
    Visible,
    Url,
    Attributes,
    Properties,
    VlcOptions,
    Custom,
    Position,
}

#[derive(DeriveIden)]
pub enum AppState {
    Table,
    Key,
    Value,
    UpdatedAt,
}
