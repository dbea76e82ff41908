//! Configured playlist and guide sources.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use super::RunHistory;

/// What a source contributes to
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SourceRole {
    Playlist,
    Guide,
}

/// Where a source's bytes come from
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SourceKind {
    #[default]
    Url,
    File,
    Provider,
    Custom,
}

/// How a downloaded file should be unpacked
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ArchiveType {
    #[default]
    Auto,
    Gzip,
    Xz,
    None,
}

/// Per-playlist parsing policies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaylistOptions {
    /// Drop every group the playlist declares
    pub skip_playlist_groups: bool,
    /// Extra groups (`;` separated) added to every channel
    pub group_name: Option<String>,
    /// Ignore `tvg-chno` from the playlist
    pub skip_playlist_chno: bool,
    /// Number unnumbered channels from `start_chno`, tv and radio separately
    pub use_start_chno: bool,
    pub start_chno: i32,
    pub default_visible: bool,
    /// Do not harvest guide links from the `#EXTM3U` header
    pub ignore_guides: bool,
}

impl Default for PlaylistOptions {
    fn default() -> Self {
        Self {
            skip_playlist_groups: false,
            group_name: None,
            skip_playlist_chno: false,
            use_start_chno: false,
            start_chno: crate::config::defaults::DEFAULT_START_CHNO,
            default_visible: true,
            ignore_guides: false,
        }
    }
}

impl PlaylistOptions {
    pub fn extra_groups(&self) -> Vec<String> {
        self.group_name
            .as_deref()
            .map(|names| names.split(';').map(|name| name.trim().to_string()).collect())
            .unwrap_or_default()
    }
}

/// Byte offsets of a guide source's elements inside the merged guide.
///
/// `start == end` means the source contributed nothing usable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub const EMPTY: ByteRange = ByteRange { start: 0, end: 0 };

    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start == 0 || self.end <= self.start
    }
}

/// Location of a source, resolved from its kind and path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceTarget<'a> {
    Url(&'a str),
    File(&'a str),
    Provider(&'a str),
    Custom,
}

/// One configured feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Configured id; implicit guide sources use 0 and are never persisted
    pub id: i32,
    pub role: SourceRole,
    pub label: String,
    pub rank: i32,
    pub enabled: bool,
    pub kind: SourceKind,
    pub path: String,
    pub archive: ArchiveType,
    pub options: PlaylistOptions,
    pub history: RunHistory,
    pub range: ByteRange,
}

impl Source {
    /// A guide link found in a playlist header, merged for one pass only
    pub fn implicit_guide(url: &str) -> Self {
        Self {
            id: 0,
            role: SourceRole::Guide,
            label: url.to_string(),
            rank: i32::MAX,
            enabled: true,
            kind: SourceKind::Url,
            path: url.to_string(),
            archive: ArchiveType::Auto,
            options: PlaylistOptions::default(),
            history: RunHistory::new(),
            range: ByteRange::EMPTY,
        }
    }

    pub fn is_implicit(&self) -> bool {
        self.id <= 0
    }

    pub fn target(&self) -> SourceTarget<'_> {
        let path = self.path.trim();
        match self.kind {
            SourceKind::Url => SourceTarget::Url(path),
            SourceKind::File => SourceTarget::File(path),
            SourceKind::Provider => SourceTarget::Provider(path),
            SourceKind::Custom => SourceTarget::Custom,
        }
    }

    /// Clear run state of a disabled source
    pub fn reset(&mut self) {
        self.history.clear();
        self.range = ByteRange::EMPTY;
    }
}
