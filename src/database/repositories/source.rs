//! SeaORM-based Source repository

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, sea_query::Expr,
};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

use crate::entities::{prelude::Sources, sources};
use crate::models::{ByteRange, RunHistory, Source, SourceRole};

#[derive(Clone)]
pub struct SourceSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl SourceSeaOrmRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    /// Mirror the configured sources into the store.
    ///
    /// Existing rows keep their run history and guide range; rows for sources
    /// that are no longer configured are removed.
    pub async fn sync(&self, configured: &[Source]) -> Result<(), DbErr> {
        let now = Utc::now();
        let existing = Sources::find().all(&*self.connection).await?;

        for source in configured {
            let options = to_json(&source.options)?;
            match existing.iter().find(|row| row.id == source.id) {
                Some(row) => {
                    let mut active: sources::ActiveModel = row.clone().into();
                    active.role = Set(source.role.to_string());
                    active.label = Set(source.label.clone());
                    active.rank = Set(source.rank);
                    active.enabled = Set(source.enabled);
                    active.kind = Set(source.kind.to_string());
                    active.path = Set(source.path.clone());
                    active.archive = Set(source.archive.to_string());
                    active.options = Set(options);
                    active.updated_at = Set(now);
                    active.update(&*self.connection).await?;
                }
                None => {
                    sources::ActiveModel {
                        id: Set(source.id),
                        role: Set(source.role.to_string()),
                        label: Set(source.label.clone()),
                        rank: Set(source.rank),
                        enabled: Set(source.enabled),
                        kind: Set(source.kind.to_string()),
                        path: Set(source.path.clone()),
                        archive: Set(source.archive.to_string()),
                        options: Set(options),
                        results: Set(to_json(&source.history)?),
                        start_index: Set(0),
                        end_index: Set(0),
                        created_at: Set(now),
                        updated_at: Set(now),
                    }
                    .insert(&*self.connection)
                    .await?;
                    debug!("Added source {} ({})", source.id, source.label);
                }
            }
        }

        let removed = Sources::delete_many()
            .filter(sources::Column::Id.is_not_in(configured.iter().map(|s| s.id)))
            .exec(&*self.connection)
            .await?;
        if removed.rows_affected > 0 {
            info!("Removed {} sources no longer configured", removed.rows_affected);
        }

        Ok(())
    }

    pub async fn find_all(&self) -> Result<Vec<Source>, DbErr> {
        Sources::find()
            .order_by_asc(sources::Column::Role)
            .order_by_asc(sources::Column::Rank)
            .order_by_asc(sources::Column::Id)
            .all(&*self.connection)
            .await?
            .into_iter()
            .map(model_to_domain)
            .collect()
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<Source>, DbErr> {
        Sources::find_by_id(id)
            .one(&*self.connection)
            .await?
            .map(model_to_domain)
            .transpose()
    }

    /// Enabled sources of one role in processing order
    pub async fn find_enabled(&self, role: SourceRole) -> Result<Vec<Source>, DbErr> {
        Sources::find()
            .filter(sources::Column::Role.eq(role.to_string()))
            .filter(sources::Column::Enabled.eq(true))
            .order_by_asc(sources::Column::Rank)
            .order_by_asc(sources::Column::Id)
            .all(&*self.connection)
            .await?
            .into_iter()
            .map(model_to_domain)
            .collect()
    }

    /// Clear history and guide range of every disabled source of one role
    pub async fn reset_disabled(&self, role: SourceRole) -> Result<u64, DbErr> {
        let result = Sources::update_many()
            .col_expr(sources::Column::Results, Expr::value("[]"))
            .col_expr(sources::Column::StartIndex, Expr::value(0i64))
            .col_expr(sources::Column::EndIndex, Expr::value(0i64))
            .filter(sources::Column::Role.eq(role.to_string()))
            .filter(sources::Column::Enabled.eq(false))
            .exec(&*self.connection)
            .await?;
        Ok(result.rows_affected)
    }

    /// Persist run history after a source was processed
    pub async fn save_history(&self, source: &Source) -> Result<(), DbErr> {
        let active = sources::ActiveModel {
            id: Set(source.id),
            results: Set(to_json(&source.history)?),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };
        active.update(&*self.connection).await?;
        Ok(())
    }

    /// Record where a guide source's elements sit in the merged guide.
    ///
    /// Only called once the merged guide they point into has been kept.
    pub async fn save_range(&self, source_id: i32, range: ByteRange) -> Result<(), DbErr> {
        let active = sources::ActiveModel {
            id: Set(source_id),
            start_index: Set(to_index(range.start)),
            end_index: Set(to_index(range.end)),
            ..Default::default()
        };
        active.update(&*self.connection).await?;
        Ok(())
    }
}

fn to_index(offset: u64) -> i64 {
    i64::try_from(offset).unwrap_or(i64::MAX)
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, DbErr> {
    serde_json::to_string(value).map_err(|e| DbErr::Json(e.to_string()))
}

fn parse_enum<T: FromStr>(column: &str, value: &str) -> Result<T, DbErr> {
    T::from_str(value).map_err(|_| DbErr::Type(format!("invalid {column} '{value}'")))
}

fn model_to_domain(model: sources::Model) -> Result<Source, DbErr> {
    Ok(Source {
        id: model.id,
        role: parse_enum("role", &model.role)?,
        label: model.label,
        rank: model.rank,
        enabled: model.enabled,
        kind: parse_enum("kind", &model.kind)?,
        path: model.path,
        archive: parse_enum("archive", &model.archive)?,
        options: serde_json::from_str(&model.options).map_err(|e| DbErr::Json(e.to_string()))?,
        history: serde_json::from_str::<RunHistory>(&model.results)
            .map_err(|e| DbErr::Json(e.to_string()))?,
        range: ByteRange::new(
            u64::try_from(model.start_index).unwrap_or(0),
            u64::try_from(model.end_index).unwrap_or(0),
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::models::{RunResult, SourceKind};

    fn playlist(id: i32, rank: i32, enabled: bool) -> Source {
        let mut source = Source::implicit_guide(&format!("http://host/{id}.m3u"));
        source.id = id;
        source.role = SourceRole::Playlist;
        source.label = format!("Playlist {id}");
        source.rank = rank;
        source.enabled = enabled;
        source
    }

    #[tokio::test]
    async fn test_sync_inserts_updates_and_removes() {
        let database = Database::in_memory().await.unwrap();
        let repo = SourceSeaOrmRepository::new(database.connection());

        repo.sync(&[playlist(1, 0, true), playlist(2, 1, true)])
            .await
            .unwrap();

        let mut first = repo.find_by_id(1).await.unwrap().unwrap();
        first.history.record(RunResult::ok("3 Channels"));
        repo.save_history(&first).await.unwrap();
        repo.save_range(1, ByteRange::new(40, 400)).await.unwrap();

        let mut relabelled = playlist(1, 5, true);
        relabelled.kind = SourceKind::File;
        relabelled.label = "Renamed".to_string();
        repo.sync(&[relabelled]).await.unwrap();

        let all = repo.find_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].label, "Renamed");
        assert_eq!(all[0].kind, SourceKind::File);
        assert_eq!(all[0].rank, 5);
        assert_eq!(all[0].history.len(), 1);
        assert_eq!(all[0].range, ByteRange::new(40, 400));
    }

    #[tokio::test]
    async fn test_find_enabled_orders_by_rank() {
        let database = Database::in_memory().await.unwrap();
        let repo = SourceSeaOrmRepository::new(database.connection());

        let mut guide = playlist(9, 0, true);
        guide.role = SourceRole::Guide;
        repo.sync(&[playlist(1, 3, true), playlist(2, 1, true), playlist(3, 2, false), guide])
            .await
            .unwrap();

        let ids: Vec<i32> = repo
            .find_enabled(SourceRole::Playlist)
            .await
            .unwrap()
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[tokio::test]
    async fn test_reset_disabled_clears_state() {
        let database = Database::in_memory().await.unwrap();
        let repo = SourceSeaOrmRepository::new(database.connection());

        let mut guide = playlist(4, 0, false);
        guide.role = SourceRole::Guide;
        repo.sync(&[guide.clone()]).await.unwrap();

        guide.history.record(RunResult::error("boom"));
        repo.save_history(&guide).await.unwrap();
        repo.save_range(4, ByteRange::new(10, 20)).await.unwrap();

        assert_eq!(repo.reset_disabled(SourceRole::Guide).await.unwrap(), 1);
        let stored = repo.find_by_id(4).await.unwrap().unwrap();
        assert!(stored.history.is_empty());
        assert_eq!(stored.range, ByteRange::EMPTY);
    }
}
