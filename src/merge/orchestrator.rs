//! One full merge pass: playlists first, then guides.
//!
//! Each source is processed in isolation. A source that fails is recorded in
//! its run history and the pass moves on; only failures to assemble or
//! publish an artifact end the pass early.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use super::guide_merger::{
    GUIDE_FOOTER, GUIDE_HEADER, GuideOutput, merge_guide_file, recover_previous_range,
};
use super::playlist_parser::{ParsedPlaylist, PlaylistParser};
use super::playlist_writer::{PlaylistLayout, assemble_playlist};
use super::publish::{MergePaths, promote, publish_file, remove_stale_guide};
use crate::config::Config;
use crate::config::defaults::PLAYLIST_FILE_NAME;
use crate::database::Database;
use crate::database::repositories::{ChannelSeaOrmRepository, SourceSeaOrmRepository};
use crate::errors::{MergeError, MergeResult, SourceResult};
use crate::models::{ByteRange, RunResult, Source, SourceKind, SourceRole};
use crate::sources::SourceFetcher;
use crate::utils::UrlUtils;
use crate::utils::human_format::format_duration;

/// Outcome of a completed pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub playlist_sources: usize,
    pub guide_sources: usize,
    pub failed_sources: usize,
    /// Entries written to the merged playlist
    pub channels: usize,
    /// Size of the merged, uncompressed guide
    pub guide_bytes: u64,
    pub elapsed: Duration,
}

/// State that lives for one pass only
#[derive(Debug, Default)]
struct PassState {
    implicit_guides: Vec<String>,
    group_hints: Vec<String>,
    failed: usize,
}

pub struct MergeOrchestrator {
    config: Arc<Config>,
    paths: MergePaths,
    sources: SourceSeaOrmRepository,
    channels: ChannelSeaOrmRepository,
    fetcher: Arc<dyn SourceFetcher>,
}

impl MergeOrchestrator {
    pub fn new(config: Arc<Config>, database: &Database, fetcher: Arc<dyn SourceFetcher>) -> Self {
        Self {
            paths: MergePaths::from_config(&config),
            config,
            sources: SourceSeaOrmRepository::new(database.connection()),
            channels: ChannelSeaOrmRepository::new(database.connection()),
            fetcher,
        }
    }

    pub fn paths(&self) -> &MergePaths {
        &self.paths
    }

    pub async fn run(&self) -> MergeResult<MergeReport> {
        let started = Instant::now();
        info!("Merge pass started");
        self.paths.ensure_dirs().await?;

        let mut pass = PassState::default();
        let mut report = MergeReport::default();

        let result = async {
            self.merge_playlists(&mut pass, &mut report).await?;
            self.merge_guides(&mut pass, &mut report).await
        }
        .await;
        self.remove_download().await;
        result?;

        report.failed_sources = pass.failed;
        report.elapsed = started.elapsed();
        info!(
            "Merge pass finished in {}: {} channels, {} playlists, {} guides, {} failed",
            format_duration(report.elapsed.as_millis() as u64),
            report.channels,
            report.playlist_sources,
            report.guide_sources,
            report.failed_sources
        );
        Ok(report)
    }

    async fn merge_playlists(
        &self,
        pass: &mut PassState,
        report: &mut MergeReport,
    ) -> MergeResult<()> {
        let playlists = self.sources.find_enabled(SourceRole::Playlist).await?;
        self.sources.reset_disabled(SourceRole::Playlist).await?;

        let enabled_ids: Vec<i32> = playlists.iter().map(|s| s.id).collect();
        let ranks: HashMap<i32, i32> = playlists.iter().map(|s| (s.id, s.rank)).collect();
        let purged = self.channels.purge_generated_except(&enabled_ids).await?;
        if purged > 0 {
            info!("Purged {} channels of disabled or removed playlists", purged);
        }

        report.playlist_sources = playlists.len();
        for mut playlist in playlists {
            info!("Merging playlist: {}", UrlUtils::obfuscate_credentials(&playlist.label));
            let result = match self.merge_playlist(&playlist, pass).await {
                Ok(message) => RunResult::ok(message),
                Err(e) if e.is_source_scoped() => {
                    error!("Playlist {} failed: {}", playlist.id, e);
                    pass.failed += 1;
                    RunResult::error(e.to_string())
                }
                Err(e) => return Err(e),
            };
            playlist.history.record(result);
            self.sources.save_history(&playlist).await?;
        }

        let channels = self.channels.find_by_sources(&enabled_ids).await?;
        let guide_link = self.config.guide_link();
        let layout = PlaylistLayout {
            guide_link: &guide_link,
            start_channel_number: self.config.merge.start_channel_number,
            disable_groups: self.config.merge.disable_groups,
            group_order: &self.config.merge.group_order,
        };
        let assembled = assemble_playlist(channels, &ranks, &pass.group_hints, &layout);
        report.channels = assembled.channel_count;

        let working = self.paths.working_playlist();
        tokio::fs::write(&working, assembled.text).await?;
        publish_file(&working, &self.paths.output_dir, PLAYLIST_FILE_NAME, false).await?;
        Ok(())
    }

    /// Returns the run history message for a successful playlist
    async fn merge_playlist(&self, playlist: &Source, pass: &mut PassState) -> MergeResult<String> {
        if playlist.kind == SourceKind::Custom {
            let count = self.channels.count_for_source(playlist.id).await?;
            return Ok(format!("{count} Channels"));
        }

        let download = self.paths.download_file();
        let fetch_started = Instant::now();
        self.fetcher.acquire(playlist, &download).await?;
        let fetch_secs = fetch_started.elapsed().as_secs_f64();

        let parse_started = Instant::now();
        let parsed = read_playlist(&download, playlist, &self.config.merge.hide_groups).await?;
        self.channels
            .replace_for_source(playlist.id, &parsed.channels)
            .await
            .map_err(|error| MergeError::Integrity {
                source_id: playlist.id,
                error,
            })?;
        let parse_secs = parse_started.elapsed().as_secs_f64();

        pass.implicit_guides.extend(parsed.guide_urls);
        pass.group_hints.extend(parsed.group_hints);

        Ok(format!(
            "{} Channels ({:.2}s + {:.2}s)",
            parsed.channels.len(),
            fetch_secs,
            parse_secs
        ))
    }

    async fn merge_guides(
        &self,
        pass: &mut PassState,
        report: &mut MergeReport,
    ) -> MergeResult<()> {
        let mut guides = self.sources.find_enabled(SourceRole::Guide).await?;
        self.sources.reset_disabled(SourceRole::Guide).await?;

        let mut seen: HashSet<String> = guides
            .iter()
            .map(|guide| guide.path.trim().to_lowercase())
            .collect();
        for url in pass.implicit_guides.drain(..) {
            if seen.insert(url.to_lowercase()) {
                guides.push(Source::implicit_guide(&url));
            }
        }
        report.guide_sources = guides.len();

        let known_ids = if self.config.merge.remove_guide_orphans {
            Some(self.known_channel_ids().await?)
        } else {
            None
        };

        remove_stale_guide(&self.paths).await?;
        let previous = self.paths.working_guide();
        let in_progress = self.paths.guide_in_progress();
        let mut output = GuideOutput::create(&in_progress).await?;
        output.write_all(GUIDE_HEADER).await?;

        let mut ranges = Vec::new();
        for mut guide in guides {
            info!("Merging guide: {}", UrlUtils::obfuscate_credentials(&guide.label));
            let start = output.position();
            let result = match self.merge_guide(&guide, &mut output, known_ids.as_ref()).await {
                Ok(message) => {
                    guide.range = ByteRange::new(start, output.position());
                    RunResult::ok(message)
                }
                Err(e) if e.is_source_scoped() => {
                    error!("Guide {} failed: {}", UrlUtils::obfuscate_credentials(&guide.label), e);
                    pass.failed += 1;
                    guide.range =
                        recover_previous_range(&mut output, start, guide.range, &previous)
                            .await?;
                    if !guide.range.is_empty() {
                        warn!("Kept {} bytes of previous guide data", guide.range.len());
                    }
                    RunResult::error(e.to_string())
                }
                Err(e) => return Err(e),
            };

            if !guide.is_implicit() {
                guide.history.record(result);
                self.sources.save_history(&guide).await?;
                ranges.push((guide.id, guide.range));
            }
        }

        output.write_all(GUIDE_FOOTER).await?;
        report.guide_bytes = output.finish().await?;

        promote(&in_progress, &previous).await?;
        for (id, range) in ranges {
            self.sources.save_range(id, range).await?;
        }

        publish_file(
            &previous,
            &self.paths.output_dir,
            &self.paths.guide_file_name,
            self.paths.compress_guide,
        )
        .await?;
        Ok(())
    }

    /// Returns the run history message for a successful guide
    async fn merge_guide(
        &self,
        guide: &Source,
        output: &mut GuideOutput,
        known_ids: Option<&HashSet<String>>,
    ) -> MergeResult<String> {
        let download = self.paths.download_file();
        let fetch_started = Instant::now();
        self.fetcher.acquire(guide, &download).await?;
        let fetch_secs = fetch_started.elapsed().as_secs_f64();

        let parse_started = Instant::now();
        let counts = merge_guide_file(&download, output, known_ids).await?;
        let parse_secs = parse_started.elapsed().as_secs_f64();

        Ok(format!(
            "{} ({:.2}s + {:.2}s)",
            counts.summary(known_ids.is_some()),
            fetch_secs,
            parse_secs
        ))
    }

    /// Guide identifiers of every channel in the merged playlist
    async fn known_channel_ids(&self) -> MergeResult<HashSet<String>> {
        let enabled: Vec<i32> = self
            .sources
            .find_enabled(SourceRole::Playlist)
            .await?
            .iter()
            .map(|s| s.id)
            .collect();

        let mut ids = HashSet::new();
        for channel in self.channels.find_by_sources(&enabled).await? {
            ids.insert(channel.identity_key());
            if let Some(epg_id) = channel.epg_id {
                ids.insert(epg_id);
            }
        }
        Ok(ids)
    }

    async fn remove_download(&self) {
        let _ = tokio::fs::remove_file(self.paths.download_file()).await;
    }
}

/// Parse an acquired playlist line by line; invalid UTF-8 is replaced
async fn read_playlist(
    path: &Path,
    source: &Source,
    hide_groups: &[String],
) -> SourceResult<ParsedPlaylist> {
    let mut reader = BufReader::new(File::open(path).await?);
    let mut parser = PlaylistParser::new(source.id, &source.options, hide_groups);
    let mut line = Vec::new();

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            break;
        }
        parser.push_line(&String::from_utf8_lossy(&line));
    }

    Ok(parser.finish())
}
