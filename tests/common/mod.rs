#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use iptv_merge::config::{Config, CustomChannelConfig, SourceConfig};
use iptv_merge::database::Database;
use iptv_merge::merge::{MergeOrchestrator, MergeSchedule, MergeService, sync_configured_sources};
use iptv_merge::models::{ArchiveType, PlaylistOptions, SourceKind};
use iptv_merge::sources::{SourceFetcher, StandardFetcher};

pub const SPORTS_GUIDE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE tv SYSTEM "xmltv.dtd">
<tv generator-info-name="test">
  <channel id="alpha.tv"><display-name>Alpha</display-name></channel>
  <channel id="zulu.tv"><display-name>Zulu</display-name></channel>
  <programme start="20240101060000 +0000" stop="20240101070000 +0000" channel="alpha.tv"><title>Morning</title></programme>
  <programme start="20240101060000 +0000" stop="20240101070000 +0000" channel="zulu.tv"><title>Night</title></programme>
</tv>
"#;

pub const NEWS_PLAYLIST: &str = "#EXTM3U\n\
#EXTINF:-1 tvg-id=\"alpha.tv\" tvg-chno=\"5\" group-title=\"News\",Alpha\n\
http://streams.local/alpha\n\
#EXTINF:-1 tvg-id=\"beta.tv\" group-title=\"Adult\",Beta\n\
http://streams.local/beta\n";

/// Config rooted in `dir` with an uncompressed guide and no sources
pub fn base_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.web.base_url = "http://tv.local/".to_string();
    config.database.url = "sqlite::memory:".to_string();
    config.storage.working_path = dir.join("working");
    config.storage.output_path = dir.join("output");
    config.storage.temp_path = dir.join("temp");
    config.merge.compress_guide = false;
    config
}

pub fn file_source(id: i32, path: &Path) -> SourceConfig {
    SourceConfig {
        id,
        label: format!("source {id}"),
        rank: id,
        enabled: true,
        kind: SourceKind::File,
        path: path.to_string_lossy().into_owned(),
        archive: ArchiveType::Auto,
        options: PlaylistOptions::default(),
        channels: Vec::new(),
    }
}

pub fn custom_source(id: i32, names: &[&str]) -> SourceConfig {
    let channels = names
        .iter()
        .map(|name| CustomChannelConfig {
            name: name.to_string(),
            url: format!("rtsp://cameras.local/{}", name.to_lowercase()),
            epg_id: None,
            logo: None,
            chno: None,
            groups: vec!["Cameras".to_string()],
            radio: false,
            visible: true,
            attributes: Default::default(),
        })
        .collect();

    SourceConfig {
        id,
        label: "Cameras".to_string(),
        rank: id,
        enabled: true,
        kind: SourceKind::Custom,
        path: String::new(),
        archive: ArchiveType::None,
        options: PlaylistOptions::default(),
        channels,
    }
}

pub struct Harness {
    pub config: Arc<Config>,
    pub database: Database,
    pub service: Arc<MergeService>,
}

pub async fn harness(config: Config) -> Harness {
    let fetcher = Arc::new(StandardFetcher::new(&config.http, config.providers.clone()).unwrap());
    harness_with_fetcher(config, fetcher).await
}

pub async fn harness_with_fetcher(config: Config, fetcher: Arc<dyn SourceFetcher>) -> Harness {
    let config = Arc::new(config);
    let database = Database::in_memory().await.unwrap();
    sync_configured_sources(&config, &database).await.unwrap();

    let orchestrator = MergeOrchestrator::new(config.clone(), &database, fetcher);
    let service = Arc::new(MergeService::new(
        orchestrator,
        &database,
        MergeSchedule::from_config(&config.merge),
    ));

    Harness {
        config,
        database,
        service,
    }
}
