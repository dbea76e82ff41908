//! SeaORM-based Channel repository

use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::entities::{channels, prelude::Channels};
use crate::models::Channel;

/// Rows per INSERT; 17 columns keeps this well under SQLite's variable limit
pub const CHANNEL_INSERT_BATCH_SIZE: usize = 500;

#[derive(Clone)]
pub struct ChannelSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl ChannelSeaOrmRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    /// Replace every channel of one source atomically.
    ///
    /// On error the transaction is dropped and the previous set stays intact.
    pub async fn replace_for_source(
        &self,
        source_id: i32,
        channels: &[Channel],
    ) -> Result<usize, DbErr> {
        let txn = self.connection.begin().await?;

        let rewrite = async {
            Channels::delete_many()
                .filter(channels::Column::SourceId.eq(source_id))
                .exec(&txn)
                .await?;
            Self::insert_batched(&txn, channels).await
        }
        .await;

        match rewrite {
            Ok(inserted) => {
                txn.commit().await?;
                debug!("Stored {} channels for source {}", inserted, source_id);
                Ok(inserted)
            }
            Err(e) => {
                txn.rollback().await?;
                Err(e)
            }
        }
    }

    async fn insert_batched<C: ConnectionTrait>(
        connection: &C,
        channels: &[Channel],
    ) -> Result<usize, DbErr> {
        let mut inserted = 0;
        for batch in channels.chunks(CHANNEL_INSERT_BATCH_SIZE) {
            let models = batch
                .iter()
                .map(domain_to_active_model)
                .collect::<Result<Vec<_>, DbErr>>()?;
            if models.is_empty() {
                continue;
            }
            Channels::insert_many(models).exec(connection).await?;
            inserted += batch.len();
        }
        Ok(inserted)
    }

    /// Delete generated channels whose source is not in `keep_source_ids`.
    ///
    /// Custom channels are never touched here.
    pub async fn purge_generated_except(&self, keep_source_ids: &[i32]) -> Result<u64, DbErr> {
        let result = Channels::delete_many()
            .filter(channels::Column::Custom.eq(false))
            .filter(channels::Column::SourceId.is_not_in(keep_source_ids.iter().copied()))
            .exec(&*self.connection)
            .await?;
        Ok(result.rows_affected)
    }

    /// Delete custom channels of sources that are no longer configured as custom
    pub async fn purge_custom_except(&self, keep_source_ids: &[i32]) -> Result<u64, DbErr> {
        let result = Channels::delete_many()
            .filter(channels::Column::Custom.eq(true))
            .filter(channels::Column::SourceId.is_not_in(keep_source_ids.iter().copied()))
            .exec(&*self.connection)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn count_for_source(&self, source_id: i32) -> Result<u64, DbErr> {
        Channels::find()
            .filter(channels::Column::SourceId.eq(source_id))
            .count(&*self.connection)
            .await
    }

    pub async fn find_by_source(&self, source_id: i32) -> Result<Vec<Channel>, DbErr> {
        Channels::find()
            .filter(channels::Column::SourceId.eq(source_id))
            .order_by_asc(channels::Column::Position)
            .all(&*self.connection)
            .await?
            .into_iter()
            .map(model_to_domain)
            .collect()
    }

    /// Channels belonging to any of the given sources, in no particular order
    pub async fn find_by_sources(&self, source_ids: &[i32]) -> Result<Vec<Channel>, DbErr> {
        Channels::find()
            .filter(channels::Column::SourceId.is_in(source_ids.iter().copied()))
            .all(&*self.connection)
            .await?
            .into_iter()
            .map(model_to_domain)
            .collect()
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, DbErr> {
    serde_json::to_string(value).map_err(|e| DbErr::Json(e.to_string()))
}

fn from_json<T: serde::de::DeserializeOwned>(value: &str) -> Result<T, DbErr> {
    serde_json::from_str(value).map_err(|e| DbErr::Json(e.to_string()))
}

fn domain_to_active_model(channel: &Channel) -> Result<channels::ActiveModel, DbErr> {
    Ok(channels::ActiveModel {
        slug: Set(channel.slug.clone()),
        source_id: Set(channel.source_id),
        name: Set(channel.name.clone()),
        tvg_name: Set(channel.tvg_name.clone()),
        epg_id: Set(channel.epg_id.clone()),
        logo: Set(channel.logo.clone()),
        chno: Set(channel.chno),
        groups: Set(to_json(&channel.groups)?),
        radio: Set(channel.radio),
        is_live: Set(channel.is_live),
        visible: Set(channel.visible),
        url: Set(channel.url.clone()),
        attributes: Set(to_json(&channel.attributes)?),
        properties: Set(to_json(&channel.properties)?),
        vlc_options: Set(to_json(&channel.vlc_options)?),
        custom: Set(channel.custom),
        position: Set(channel.position),
    })
}

fn model_to_domain(model: channels::Model) -> Result<Channel, DbErr> {
    Ok(Channel {
        slug: model.slug,
        source_id: model.source_id,
        name: model.name,
        tvg_name: model.tvg_name,
        epg_id: model.epg_id,
        logo: model.logo,
        chno: model.chno,
        groups: from_json::<Vec<String>>(&model.groups)?,
        radio: model.radio,
        is_live: model.is_live,
        visible: model.visible,
        url: model.url,
        attributes: from_json::<BTreeMap<String, String>>(&model.attributes)?,
        properties: from_json::<BTreeMap<String, String>>(&model.properties)?,
        vlc_options: from_json::<BTreeMap<String, String>>(&model.vlc_options)?,
        custom: model.custom,
        position: model.position,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;

    fn channel(source_id: i32, slug: &str, position: i32) -> Channel {
        let mut channel = Channel::from_url(&format!("http://host/{slug}"));
        channel.source_id = source_id;
        channel.slug = slug.to_string();
        channel.position = position;
        channel.groups = vec!["News".to_string()];
        channel
            .attributes
            .insert("tvg-shift".to_string(), "1".to_string());
        channel
    }

    #[tokio::test]
    async fn test_replace_round_trips_channels() {
        let database = Database::in_memory().await.unwrap();
        let repo = ChannelSeaOrmRepository::new(database.connection());

        let stored = vec![channel(1, "1.aaaaaa", 1), channel(1, "1.bbbbbb", 2)];
        assert_eq!(repo.replace_for_source(1, &stored).await.unwrap(), 2);

        let loaded = repo.find_by_source(1).await.unwrap();
        assert_eq!(loaded, stored);

        // Second rewrite replaces rather than appends
        let replacement = vec![channel(1, "1.cccccc", 1)];
        repo.replace_for_source(1, &replacement).await.unwrap();
        assert_eq!(repo.count_for_source(1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_rewrite_keeps_previous_set() {
        let database = Database::in_memory().await.unwrap();
        let repo = ChannelSeaOrmRepository::new(database.connection());

        repo.replace_for_source(1, &[channel(1, "1.aaaaaa", 1)])
            .await
            .unwrap();
        // Source 2 owns a slug that source 1 will try to reuse
        repo.replace_for_source(2, &[channel(2, "shared", 1)])
            .await
            .unwrap();

        let conflicting = vec![channel(1, "1.bbbbbb", 1), channel(1, "shared", 2)];
        assert!(repo.replace_for_source(1, &conflicting).await.is_err());

        let survivors = repo.find_by_source(1).await.unwrap();
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].slug, "1.aaaaaa");
    }

    #[tokio::test]
    async fn test_purge_keeps_custom_channels() {
        let database = Database::in_memory().await.unwrap();
        let repo = ChannelSeaOrmRepository::new(database.connection());

        repo.replace_for_source(1, &[channel(1, "1.a", 1)]).await.unwrap();
        repo.replace_for_source(2, &[channel(2, "2.a", 1)]).await.unwrap();
        let mut custom = channel(3, "3.a", 1);
        custom.custom = true;
        repo.replace_for_source(3, &[custom]).await.unwrap();

        let purged = repo.purge_generated_except(&[1]).await.unwrap();
        assert_eq!(purged, 1);
        assert_eq!(repo.count_for_source(2).await.unwrap(), 0);
        assert_eq!(repo.count_for_source(3).await.unwrap(), 1);

        repo.purge_custom_except(&[]).await.unwrap();
        assert_eq!(repo.count_for_source(3).await.unwrap(), 0);
        assert_eq!(repo.find_by_sources(&[1, 2, 3]).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_large_rewrite_spans_batches() {
        let database = Database::in_memory().await.unwrap();
        let repo = ChannelSeaOrmRepository::new(database.connection());

        let many: Vec<Channel> = (1..=(CHANNEL_INSERT_BATCH_SIZE as i32 + 20))
            .map(|n| channel(5, &format!("5.{n}"), n))
            .collect();
        assert_eq!(repo.replace_for_source(5, &many).await.unwrap(), many.len());
        assert_eq!(repo.count_for_source(5).await.unwrap(), many.len() as u64);
    }
}
