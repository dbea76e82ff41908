//! Streaming guide assembly and per-source failure recovery

use std::collections::HashSet;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufWriter};
use tracing::{debug, warn};

use super::guide_scanner::{CHUNK_SIZE, GuideScanner, ScanCounts};
use crate::errors::{MergeResult, SourceError};
use crate::models::ByteRange;

pub const GUIDE_HEADER: &[u8] = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?><tv>";
pub const GUIDE_FOOTER: &[u8] = b"</tv>";

/// The merged guide being written, with a running byte position
pub struct GuideOutput {
    writer: BufWriter<File>,
    position: u64,
    path: PathBuf,
}

impl GuideOutput {
    pub async fn create(path: &Path) -> std::io::Result<Self> {
        let file = File::create(path).await?;
        Ok(Self {
            writer: BufWriter::with_capacity(CHUNK_SIZE, file),
            position: 0,
            path: path.to_path_buf(),
        })
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn write_all(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.writer.write_all(bytes).await?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    /// Drop everything written after `offset`
    pub async fn truncate_to(&mut self, offset: u64) -> std::io::Result<()> {
        self.writer.flush().await?;
        self.writer.get_mut().set_len(offset).await?;
        self.writer.seek(SeekFrom::Start(offset)).await?;
        self.position = offset;
        Ok(())
    }

    /// Flush and sync; returns the final length
    pub async fn finish(mut self) -> std::io::Result<u64> {
        self.writer.flush().await?;
        self.writer.get_mut().sync_all().await?;
        Ok(self.position)
    }
}

/// Stream one acquired guide file through the scanner into `output`.
///
/// Read failures on the input are source errors; write failures on the
/// output are not, since they leave the whole pass without a usable guide.
pub async fn merge_guide_file(
    input: &Path,
    output: &mut GuideOutput,
    known_ids: Option<&HashSet<String>>,
) -> MergeResult<ScanCounts> {
    let mut file = File::open(input).await.map_err(SourceError::Io)?;
    let mut scanner = GuideScanner::new(known_ids);
    let mut chunk = vec![0u8; CHUNK_SIZE];
    let mut pending = Vec::with_capacity(CHUNK_SIZE);

    loop {
        let read = file.read(&mut chunk).await.map_err(SourceError::Io)?;
        if read == 0 {
            break;
        }
        scanner.feed(&chunk[..read], &mut pending);
        if !pending.is_empty() {
            output.write_all(&pending).await?;
            pending.clear();
        }
    }

    debug!(
        "Guide scan of {} retained at most {} bytes",
        input.display(),
        scanner.peak_retained()
    );
    Ok(scanner.finish()?)
}

/// Copy `range` of the previous merged guide into `output`.
///
/// Returns false when the previous file is missing or shorter than the range.
pub async fn copy_previous_range(
    previous: &Path,
    range: ByteRange,
    output: &mut GuideOutput,
) -> bool {
    match try_copy_range(previous, range, output).await {
        Ok(copied) => copied == range.len(),
        Err(e) => {
            debug!("Could not copy previous guide range from {}: {}", previous.display(), e);
            false
        }
    }
}

async fn try_copy_range(
    previous: &Path,
    range: ByteRange,
    output: &mut GuideOutput,
) -> std::io::Result<u64> {
    let mut file = File::open(previous).await?;
    file.seek(SeekFrom::Start(range.start)).await?;

    let mut remaining = range.len();
    let mut copied = 0u64;
    let mut chunk = vec![0u8; CHUNK_SIZE];
    while remaining > 0 {
        let want = remaining.min(CHUNK_SIZE as u64) as usize;
        let read = file.read(&mut chunk[..want]).await?;
        if read == 0 {
            break;
        }
        output.write_all(&chunk[..read]).await?;
        copied += read as u64;
        remaining -= read as u64;
    }
    Ok(copied)
}

/// Undo a failed source's partial output and splice in its previous content.
///
/// Returns the source's new range: where the restored bytes now sit in
/// `output`, or empty when nothing could be restored.
pub async fn recover_previous_range(
    output: &mut GuideOutput,
    start: u64,
    previous_range: ByteRange,
    previous_guide: &Path,
) -> std::io::Result<ByteRange> {
    output.truncate_to(start).await?;

    if !previous_range.is_empty() {
        if copy_previous_range(previous_guide, previous_range, output).await {
            return Ok(ByteRange::new(start, output.position()));
        }
        warn!(
            "Previous guide data ({} bytes) could not be restored",
            previous_range.len()
        );
        output.truncate_to(start).await?;
    }

    Ok(ByteRange::EMPTY)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn read(path: &Path) -> String {
        tokio::fs::read_to_string(path).await.unwrap()
    }

    #[tokio::test]
    async fn test_truncate_rewinds_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("epg.xml");
        let mut output = GuideOutput::create(&path).await.unwrap();

        output.write_all(GUIDE_HEADER).await.unwrap();
        let mark = output.position();
        output.write_all(b"<channel id=\"half").await.unwrap();
        output.truncate_to(mark).await.unwrap();
        output.write_all(GUIDE_FOOTER).await.unwrap();
        let len = output.finish().await.unwrap();

        let text = read(&path).await;
        assert_eq!(len as usize, text.len());
        assert_eq!(text, "<?xml version=\"1.0\" encoding=\"UTF-8\"?><tv></tv>");
    }

    #[tokio::test]
    async fn test_merge_guide_file_records_elements() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("source.xml");
        tokio::fs::write(&input, "<tv><channel id=\"a\"/><programme channel=\"a\"></programme></tv>")
            .await
            .unwrap();

        let mut output = GuideOutput::create(&dir.path().join("out.xml")).await.unwrap();
        let counts = merge_guide_file(&input, &mut output, None).await.unwrap();
        assert_eq!(counts.channels.added, 1);
        assert_eq!(counts.programmes.added, 1);
        assert_eq!(output.position(), 52);
    }

    #[tokio::test]
    async fn test_missing_input_is_source_scoped() {
        let dir = tempfile::tempdir().unwrap();
        let mut output = GuideOutput::create(&dir.path().join("out.xml")).await.unwrap();
        let err = merge_guide_file(&dir.path().join("absent.xml"), &mut output, None)
            .await
            .unwrap_err();
        assert!(err.is_source_scoped());
    }

    #[tokio::test]
    async fn test_recover_restores_previous_range() {
        let dir = tempfile::tempdir().unwrap();
        let previous = dir.path().join("previous.xml");
        tokio::fs::write(&previous, "HEADER<channel id=\"b\"/>FOOTER").await.unwrap();

        let path = dir.path().join("epg.xml");
        let mut output = GuideOutput::create(&path).await.unwrap();
        output.write_all(b"NEW<channel id=\"a\"/>").await.unwrap();
        let start = output.position();
        output.write_all(b"<programme channel=\"b\">junk").await.unwrap();

        let range = recover_previous_range(&mut output, start, ByteRange::new(6, 23), &previous)
            .await
            .unwrap();
        assert_eq!(range, ByteRange::new(start, start + 17));
        output.finish().await.unwrap();
        assert_eq!(read(&path).await, "NEW<channel id=\"a\"/><channel id=\"b\"/>");
    }

    #[tokio::test]
    async fn test_recover_with_short_previous_file_yields_empty_range() {
        let dir = tempfile::tempdir().unwrap();
        let previous = dir.path().join("previous.xml");
        tokio::fs::write(&previous, "tiny").await.unwrap();

        let path = dir.path().join("epg.xml");
        let mut output = GuideOutput::create(&path).await.unwrap();
        output.write_all(b"KEEP").await.unwrap();
        output.write_all(b"partial").await.unwrap();

        let range = recover_previous_range(&mut output, 4, ByteRange::new(2, 100), &previous)
            .await
            .unwrap();
        assert_eq!(range, ByteRange::EMPTY);
        assert_eq!(output.position(), 4);
        output.finish().await.unwrap();
        assert_eq!(read(&path).await, "KEEP");
    }

    #[tokio::test]
    async fn test_recover_without_history_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("epg.xml");
        let mut output = GuideOutput::create(&path).await.unwrap();
        output.write_all(b"ok<broken").await.unwrap();

        let range = recover_previous_range(&mut output, 2, ByteRange::EMPTY, &dir.path().join("none"))
            .await
            .unwrap();
        assert!(range.is_empty());
        output.finish().await.unwrap();
        assert_eq!(read(&path).await, "ok");
    }
}
