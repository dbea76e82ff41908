use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::errors::SourceResult;
use crate::models::Source;
use crate::utils::CompressionFormat;

/// A source resolved into a complete local file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acquired {
    pub path: PathBuf,
    /// Size after decompression; zero is a valid, empty acquisition
    pub bytes: u64,
    /// Final URL after redirects, or the local path that was copied
    pub origin: String,
    pub format: CompressionFormat,
}

/// Turns a source descriptor into a local file the merger can read
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Write the source's raw bytes to `dest`, replacing anything there.
    ///
    /// Fails with a `SourceError` when the source cannot be resolved.
    async fn acquire(&self, source: &Source, dest: &Path) -> SourceResult<Acquired>;
}
