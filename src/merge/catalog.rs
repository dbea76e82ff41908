//! Mirrors configured sources and inline custom channels into the store

use tracing::info;

use super::playlist_parser::SlugAllocator;
use crate::config::Config;
use crate::database::Database;
use crate::database::repositories::{ChannelSeaOrmRepository, SourceSeaOrmRepository};
use crate::errors::{MergeError, MergeResult};
use crate::models::{Channel, SourceKind};

/// Upsert configured sources and rewrite every custom source's channels.
///
/// Sources no longer configured are dropped, so the next pass purges their
/// generated channels; custom channels of dropped sources go immediately.
pub async fn sync_configured_sources(config: &Config, database: &Database) -> MergeResult<()> {
    let sources = SourceSeaOrmRepository::new(database.connection());
    let channels = ChannelSeaOrmRepository::new(database.connection());

    let configured = config.configured_sources();
    sources.sync(&configured).await?;

    let mut custom_ids = Vec::new();
    for source in config
        .sources
        .playlists
        .iter()
        .filter(|source| source.kind == SourceKind::Custom)
    {
        let mut slugs = SlugAllocator::new(source.id);
        let custom: Vec<Channel> = source
            .channels
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let mut channel = entry.to_channel(source.id, index as i32 + 1);
                channel.slug = slugs.allocate(&channel.identity_key());
                channel
            })
            .collect();

        channels
            .replace_for_source(source.id, &custom)
            .await
            .map_err(|error| MergeError::Integrity {
                source_id: source.id,
                error,
            })?;
        custom_ids.push(source.id);
    }

    let removed = channels.purge_custom_except(&custom_ids).await?;
    info!(
        "Synchronised {} sources ({} custom, {} stale custom channels removed)",
        configured.len(),
        custom_ids.len(),
        removed
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CustomChannelConfig, SourceConfig};
    use crate::models::SourceRole;

    fn custom_source(id: i32, names: &[&str]) -> SourceConfig {
        let mut source: SourceConfig = toml::from_str(&format!("id = {id}\nkind = \"custom\"")).unwrap();
        source.channels = names
            .iter()
            .map(|name| {
                toml::from_str::<CustomChannelConfig>(&format!(
                    "name = \"{name}\"\nurl = \"http://stream/{name}\""
                ))
                .unwrap()
            })
            .collect();
        source
    }

    #[tokio::test]
    async fn test_custom_channels_are_stored_and_purged() {
        let database = Database::in_memory().await.unwrap();
        let mut config = Config::default();
        config.sources.playlists = vec![custom_source(4, &["One", "Two", "One"])];

        sync_configured_sources(&config, &database).await.unwrap();

        let repo = ChannelSeaOrmRepository::new(database.connection());
        let stored = repo.find_by_source(4).await.unwrap();
        assert_eq!(stored.len(), 3);
        assert!(stored.iter().all(|channel| channel.custom));
        assert_eq!(stored[0].name, "One");
        assert_ne!(stored[0].slug, stored[2].slug);

        let sources = SourceSeaOrmRepository::new(database.connection());
        assert_eq!(
            sources.find_enabled(SourceRole::Playlist).await.unwrap().len(),
            1
        );

        config.sources.playlists.clear();
        sync_configured_sources(&config, &database).await.unwrap();
        assert_eq!(repo.count_for_source(4).await.unwrap(), 0);
        assert!(sources.find_all().await.unwrap().is_empty());
    }
}
