/// Configuration default values
///
/// Every default lives here so the TOML written on first start and the
/// serde fallbacks always agree.
// Web server defaults
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8096;
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8096/";

// Database defaults
pub const DEFAULT_DATABASE_URL: &str = "sqlite://./data/iptv-merge.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

// Storage defaults
pub const DEFAULT_WORKING_PATH: &str = "./data/working";
pub const DEFAULT_OUTPUT_PATH: &str = "./data/output";
pub const DEFAULT_TEMP_PATH: &str = "./data/temp";

// Merge policy defaults
pub const DEFAULT_AUTO_MERGE: bool = true;
pub const DEFAULT_RELOAD_TIME_HOURS: u32 = 12;
pub const MIN_RELOAD_TIME_HOURS: u32 = 1;
pub const MAX_RELOAD_TIME_HOURS: u32 = 48;
pub const DEFAULT_MERGE_AT_HOUR: bool = true;
pub const DEFAULT_MERGE_HOUR: u32 = 3;
pub const DEFAULT_MERGE_COOLDOWN: &str = "5m";
pub const MIN_MERGE_COOLDOWN_SECS: u64 = 300;
pub const DEFAULT_START_CHANNEL_NUMBER: i32 = 1;
pub const DEFAULT_REMOVE_GUIDE_ORPHANS: bool = true;
pub const DEFAULT_COMPRESS_GUIDE: bool = false;
pub const DEFAULT_SERVICE_DELAY: &str = "0s";
pub const DEFAULT_CHECK_INTERVAL: &str = "1m";

// Upstream HTTP defaults
// No spaces or percent signs: some players choke on them when the agent is forwarded.
pub const DEFAULT_USER_AGENT: &str = "iptv-merge/0.1";
pub const DEFAULT_CONNECT_TIMEOUT: &str = "10s";
pub const DEFAULT_REQUEST_TIMEOUT: &str = "10m";

// Per-source defaults
pub const DEFAULT_START_CHNO: i32 = 1;

// Artifact names
pub const PLAYLIST_FILE_NAME: &str = "playlist.m3u8";
pub const GUIDE_FILE_NAME: &str = "epg.xml";
pub const RUN_MERGE_PATH: &str = "run_merge";

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "IPTV_MERGE_";
