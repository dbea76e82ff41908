use anyhow::Result;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;

use defaults::*;
use duration_serde::parse_default;

use crate::errors::{AppError, AppResult};
use crate::models::{ArchiveType, Channel, PlaylistOptions, Source, SourceKind, SourceRole};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub web: WebConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub merge: MergeConfig,
    #[serde(default)]
    pub http: HttpConfig,
    /// Provider callbacks keyed by provider id
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
    #[serde(default)]
    pub sources: SourcesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public address of this service, used for the guide link in the playlist header
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Working copies, including the previous merged guide used for recovery
    #[serde(default = "default_working_path")]
    pub working_path: PathBuf,
    /// Published artifacts
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
    /// In-progress output and downloads
    #[serde(default = "default_temp_path")]
    pub temp_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    #[serde(default = "default_auto_merge")]
    pub auto_merge: bool,
    #[serde(default = "default_reload_time_hours")]
    pub reload_time_hours: u32,
    #[serde(default = "default_merge_at_hour")]
    pub merge_at_hour: bool,
    #[serde(default = "default_merge_hour")]
    pub merge_hour: u32,
    /// Minimum time between automatic merges; never below five minutes
    #[serde(default = "default_cooldown", with = "duration_serde::duration")]
    pub cooldown: Duration,
    #[serde(default = "default_start_channel_number")]
    pub start_channel_number: i32,
    /// Channels in any of these groups are left out of the playlist
    #[serde(default)]
    pub hide_groups: Vec<String>,
    /// Strip every group from the merged playlist
    #[serde(default)]
    pub disable_groups: bool,
    /// Groups listed first in the playlist's group order hints
    #[serde(default)]
    pub group_order: Vec<String>,
    #[serde(default = "default_remove_guide_orphans")]
    pub remove_guide_orphans: bool,
    #[serde(default = "default_compress_guide")]
    pub compress_guide: bool,
    /// Overrides the guide link written to the playlist header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guide_link: Option<String>,
    #[serde(default = "default_service_delay", with = "duration_serde::duration")]
    pub service_delay: Duration,
    #[serde(default = "default_check_interval", with = "duration_serde::duration")]
    pub check_interval: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_connect_timeout", with = "duration_serde::duration")]
    pub connect_timeout: Duration,
    #[serde(default = "default_request_timeout", with = "duration_serde::duration")]
    pub request_timeout: Duration,
}

/// Locations a provider publishes, with `$ID`, `$IP` and `$FILE` placeholders
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playlist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guide: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub playlists: Vec<SourceConfig>,
    #[serde(default)]
    pub guides: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Unique across playlists and guides, at least 1
    pub id: i32,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub rank: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub kind: SourceKind,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub archive: ArchiveType,
    #[serde(default)]
    pub options: PlaylistOptions,
    /// Inline channels of a custom playlist source
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<CustomChannelConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomChannelConfig {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub epg_id: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub chno: Option<i32>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub radio: bool,
    #[serde(default = "default_enabled")]
    pub visible: bool,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

// Web defaults
fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

// Database defaults
fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

// Storage defaults
fn default_working_path() -> PathBuf {
    PathBuf::from(DEFAULT_WORKING_PATH)
}

fn default_output_path() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_PATH)
}

fn default_temp_path() -> PathBuf {
    PathBuf::from(DEFAULT_TEMP_PATH)
}

// Merge defaults
fn default_auto_merge() -> bool {
    DEFAULT_AUTO_MERGE
}

fn default_reload_time_hours() -> u32 {
    DEFAULT_RELOAD_TIME_HOURS
}

fn default_merge_at_hour() -> bool {
    DEFAULT_MERGE_AT_HOUR
}

fn default_merge_hour() -> u32 {
    DEFAULT_MERGE_HOUR
}

fn default_cooldown() -> Duration {
    parse_default(DEFAULT_MERGE_COOLDOWN)
}

fn default_start_channel_number() -> i32 {
    DEFAULT_START_CHANNEL_NUMBER
}

fn default_remove_guide_orphans() -> bool {
    DEFAULT_REMOVE_GUIDE_ORPHANS
}

fn default_compress_guide() -> bool {
    DEFAULT_COMPRESS_GUIDE
}

fn default_service_delay() -> Duration {
    parse_default(DEFAULT_SERVICE_DELAY)
}

fn default_check_interval() -> Duration {
    parse_default(DEFAULT_CHECK_INTERVAL)
}

// HTTP defaults
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_connect_timeout() -> Duration {
    parse_default(DEFAULT_CONNECT_TIMEOUT)
}

fn default_request_timeout() -> Duration {
    parse_default(DEFAULT_REQUEST_TIMEOUT)
}

fn default_enabled() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            web: WebConfig {
                host: default_host(),
                port: default_port(),
                base_url: default_base_url(),
            },
            database: DatabaseConfig {
                url: default_database_url(),
                max_connections: Some(DEFAULT_MAX_CONNECTIONS),
            },
            storage: StorageConfig {
                working_path: default_working_path(),
                output_path: default_output_path(),
                temp_path: default_temp_path(),
            },
            merge: MergeConfig::default(),
            http: HttpConfig::default(),
            providers: BTreeMap::new(),
            sources: SourcesConfig::default(),
        }
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            auto_merge: default_auto_merge(),
            reload_time_hours: default_reload_time_hours(),
            merge_at_hour: default_merge_at_hour(),
            merge_hour: default_merge_hour(),
            cooldown: default_cooldown(),
            start_channel_number: default_start_channel_number(),
            hide_groups: Vec::new(),
            disable_groups: false,
            group_order: Vec::new(),
            remove_guide_orphans: default_remove_guide_orphans(),
            compress_guide: default_compress_guide(),
            guide_link: None,
            service_delay: default_service_delay(),
            check_interval: default_check_interval(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl MergeConfig {
    /// Cooldown clamped to the five minute floor
    pub fn effective_cooldown(&self) -> Duration {
        self.cooldown.max(Duration::from_secs(MIN_MERGE_COOLDOWN_SECS))
    }

    pub fn guide_file_name(&self) -> String {
        if self.compress_guide {
            format!("{GUIDE_FILE_NAME}.gz")
        } else {
            GUIDE_FILE_NAME.to_string()
        }
    }

    /// Published guide name of the other compression variant
    pub fn stale_guide_file_name(&self) -> String {
        if self.compress_guide {
            GUIDE_FILE_NAME.to_string()
        } else {
            format!("{GUIDE_FILE_NAME}.gz")
        }
    }
}

impl SourceConfig {
    pub fn to_source(&self, role: SourceRole) -> Source {
        let mut source = Source::implicit_guide(&self.path);
        source.id = self.id;
        source.role = role;
        source.label = if self.label.is_empty() {
            self.path.clone()
        } else {
            self.label.clone()
        };
        source.rank = self.rank;
        source.enabled = self.enabled;
        source.kind = self.kind;
        source.archive = self.archive;
        source.options = self.options.clone();
        source
    }
}

impl CustomChannelConfig {
    /// Build the stored channel; the slug is assigned by the caller
    pub fn to_channel(&self, source_id: i32, position: i32) -> Channel {
        let mut channel = Channel::from_url(&self.url);
        channel.source_id = source_id;
        channel.name = self.name.clone();
        channel.epg_id = self.epg_id.clone();
        channel.logo = self.logo.clone();
        channel.chno = self.chno;
        channel.groups = self
            .groups
            .iter()
            .filter(|group| !group.trim().is_empty())
            .cloned()
            .collect();
        channel.radio = self.radio;
        channel.visible = self.visible;
        channel.attributes = self.attributes.clone();
        channel.custom = true;
        channel.position = position;
        channel
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from_file(&config_file)
    }

    /// Load defaults, then the TOML file, then `IPTV_MERGE_*` environment overrides.
    ///
    /// A missing file is created from the defaults first.
    pub fn load_from_file(config_file: &str) -> Result<Self> {
        let path = Path::new(config_file);
        if !path.exists() {
            let default_config = Self::default();
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, toml::to_string_pretty(&default_config)?)?;
            info!("Created default config file: {}", config_file);
        }

        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        let merge = &self.merge;
        if !(MIN_RELOAD_TIME_HOURS..=MAX_RELOAD_TIME_HOURS).contains(&merge.reload_time_hours) {
            return Err(AppError::configuration(format!(
                "merge.reload_time_hours must be between {MIN_RELOAD_TIME_HOURS} and {MAX_RELOAD_TIME_HOURS}, got {}",
                merge.reload_time_hours
            )));
        }
        if merge.merge_hour > 23 {
            return Err(AppError::configuration(format!(
                "merge.merge_hour must be between 0 and 23, got {}",
                merge.merge_hour
            )));
        }

        let mut seen = HashSet::new();
        for source in self.sources.playlists.iter().chain(&self.sources.guides) {
            if source.id < 1 {
                return Err(AppError::configuration(format!(
                    "source id must be at least 1, got {}",
                    source.id
                )));
            }
            if !seen.insert(source.id) {
                return Err(AppError::configuration(format!(
                    "duplicate source id {}",
                    source.id
                )));
            }
            if source.kind != SourceKind::Custom && source.path.trim().is_empty() {
                return Err(AppError::configuration(format!(
                    "source {} has no path",
                    source.id
                )));
            }
        }
        for source in &self.sources.guides {
            if source.kind == SourceKind::Custom {
                return Err(AppError::configuration(format!(
                    "guide source {} cannot be custom",
                    source.id
                )));
            }
        }

        Ok(())
    }

    /// Configured sources in store form
    pub fn configured_sources(&self) -> Vec<Source> {
        let playlists = self
            .sources
            .playlists
            .iter()
            .map(|s| s.to_source(SourceRole::Playlist));
        let guides = self
            .sources
            .guides
            .iter()
            .map(|s| s.to_source(SourceRole::Guide));
        playlists.chain(guides).collect()
    }

    /// Link to the guide written into the playlist header
    pub fn guide_link(&self) -> String {
        if let Some(link) = self.merge.guide_link.as_deref().filter(|l| !l.trim().is_empty()) {
            return link.trim().to_string();
        }
        let base = self.web.base_url.trim_end_matches('/');
        format!("{}/{}", base, self.merge.guide_file_name())
    }
}
