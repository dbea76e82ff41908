//! Working copies and atomic promotion of finished artifacts

use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::Config;
use crate::config::defaults::{GUIDE_FILE_NAME, PLAYLIST_FILE_NAME};
use crate::errors::{MergeError, MergeResult};

/// File locations used by a merge pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePaths {
    pub working_dir: PathBuf,
    pub output_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub guide_file_name: String,
    pub stale_guide_file_name: String,
    pub compress_guide: bool,
}

impl MergePaths {
    pub fn from_config(config: &Config) -> Self {
        Self {
            working_dir: config.storage.working_path.clone(),
            output_dir: config.storage.output_path.clone(),
            temp_dir: config.storage.temp_path.clone(),
            guide_file_name: config.merge.guide_file_name(),
            stale_guide_file_name: config.merge.stale_guide_file_name(),
            compress_guide: config.merge.compress_guide,
        }
    }

    pub async fn ensure_dirs(&self) -> io::Result<()> {
        for dir in [&self.working_dir, &self.output_dir, &self.temp_dir] {
            tokio::fs::create_dir_all(dir).await?;
        }
        Ok(())
    }

    /// Scratch file each source is acquired into
    pub fn download_file(&self) -> PathBuf {
        self.temp_dir.join("source.tmp")
    }

    /// Guide being assembled by the running pass
    pub fn guide_in_progress(&self) -> PathBuf {
        self.temp_dir.join(GUIDE_FILE_NAME)
    }

    pub fn working_playlist(&self) -> PathBuf {
        self.working_dir.join(PLAYLIST_FILE_NAME)
    }

    /// Last successfully assembled guide, always uncompressed
    pub fn working_guide(&self) -> PathBuf {
        self.working_dir.join(GUIDE_FILE_NAME)
    }

    pub fn published_playlist(&self) -> PathBuf {
        self.output_dir.join(PLAYLIST_FILE_NAME)
    }

    pub fn published_guide(&self) -> PathBuf {
        self.output_dir.join(&self.guide_file_name)
    }

    pub fn artifacts_present(&self) -> bool {
        self.published_playlist().exists() && self.published_guide().exists()
    }
}

/// Move a finished file into place, copying when a rename crosses filesystems
pub async fn promote(from: &Path, to: &Path) -> io::Result<()> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to).await?;
    tokio::fs::remove_file(from).await
}

/// Publish `source` as `output_dir/name`, gzipping it when asked.
///
/// The content is staged next to the target and renamed over it, so readers
/// see either the previous artifact or the complete new one.
pub async fn publish_file(
    source: &Path,
    output_dir: &Path,
    name: &str,
    compress: bool,
) -> MergeResult<PathBuf> {
    let source = source.to_path_buf();
    let output_dir = output_dir.to_path_buf();
    let target = output_dir.join(name);
    let staged_target = target.clone();

    tokio::task::spawn_blocking(move || -> io::Result<()> {
        let mut staged = tempfile::NamedTempFile::new_in(&output_dir)?;
        {
            let mut input = BufReader::new(File::open(&source)?);
            let mut output = BufWriter::new(staged.as_file_mut());
            if compress {
                let mut encoder = GzEncoder::new(&mut output, Compression::default());
                io::copy(&mut input, &mut encoder)?;
                encoder.finish()?;
            } else {
                io::copy(&mut input, &mut output)?;
            }
            output.flush()?;
        }
        staged.as_file().sync_all()?;
        staged.persist(&staged_target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| MergeError::publish(name, e))?
    .map_err(|e| MergeError::publish(name, e))?;

    info!("Published {}", target.display());
    Ok(target)
}

/// Remove the published guide of the other compression variant
pub async fn remove_stale_guide(paths: &MergePaths) -> io::Result<()> {
    let stale = paths.output_dir.join(&paths.stale_guide_file_name);
    match tokio::fs::remove_file(&stale).await {
        Ok(()) => {
            debug!("Removed stale guide {}", stale.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
