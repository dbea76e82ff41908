use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::errors::{SourceError, SourceResult};
use crate::models::ArchiveType;

/// Bytes needed to recognise every supported format
pub const MAGIC_PROBE_LEN: usize = 8;

/// Archive formats a downloaded source may arrive in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    Gzip,
    Xz,
    Uncompressed,
}

impl CompressionFormat {
    pub fn name(&self) -> &'static str {
        match self {
            CompressionFormat::Gzip => "gzip",
            CompressionFormat::Xz => "xz",
            CompressionFormat::Uncompressed => "none",
        }
    }
}

/// Magic byte detection and streaming decompression of acquired files
pub struct DecompressionService;

impl DecompressionService {
    /// Detect compression format using magic bytes
    pub fn detect_compression_format(data: &[u8]) -> CompressionFormat {
        match infer::get(data).map(|kind| kind.mime_type()) {
            Some("application/gzip") => CompressionFormat::Gzip,
            Some("application/x-xz") => CompressionFormat::Xz,
            _ => CompressionFormat::Uncompressed,
        }
    }

    /// Resolve the configured archive type against the file's leading bytes
    pub fn resolve_format(archive: ArchiveType, head: &[u8]) -> CompressionFormat {
        match archive {
            ArchiveType::Auto => Self::detect_compression_format(head),
            ArchiveType::Gzip => CompressionFormat::Gzip,
            ArchiveType::Xz => CompressionFormat::Xz,
            ArchiveType::None => CompressionFormat::Uncompressed,
        }
    }

    /// Read the first bytes of a file for format detection
    pub fn probe(path: &Path) -> io::Result<Vec<u8>> {
        let mut head = Vec::with_capacity(MAGIC_PROBE_LEN);
        File::open(path)?
            .take(MAGIC_PROBE_LEN as u64)
            .read_to_end(&mut head)?;
        Ok(head)
    }

    /// Decompress `path` in place when its archive type calls for it.
    ///
    /// Blocking; callers on the runtime wrap this in `spawn_blocking`.
    /// Returns the format that was applied.
    pub fn decompress_in_place(
        path: &Path,
        archive: ArchiveType,
    ) -> SourceResult<CompressionFormat> {
        let head = Self::probe(path)?;
        let format = Self::resolve_format(archive, &head);
        if format == CompressionFormat::Uncompressed {
            return Ok(format);
        }

        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        let mut staged = tempfile::NamedTempFile::new_in(parent)?;
        {
            let input = BufReader::new(File::open(path)?);
            let mut output = BufWriter::new(staged.as_file_mut());
            Self::decompress_stream(format, input, &mut output)?;
            output.flush()?;
        }
        staged
            .persist(path)
            .map_err(|e| SourceError::Io(e.error))?;
        Ok(format)
    }

    /// Stream `input` through the decoder for `format` into `output`
    pub fn decompress_stream<R: Read, W: Write>(
        format: CompressionFormat,
        input: R,
        output: &mut W,
    ) -> SourceResult<u64> {
        let copied = match format {
            CompressionFormat::Gzip => io::copy(&mut GzDecoder::new(input), output),
            CompressionFormat::Xz => Self::copy_xz(input, output)?,
            CompressionFormat::Uncompressed => {
                let mut input = input;
                io::copy(&mut input, output)
            }
        };
        copied.map_err(|e| SourceError::decompression(format.name(), e.to_string()))
    }

    #[cfg(feature = "compression-xz")]
    fn copy_xz<R: Read, W: Write>(input: R, output: &mut W) -> SourceResult<io::Result<u64>> {
        Ok(io::copy(&mut xz2::read::XzDecoder::new(input), output))
    }

    #[cfg(not(feature = "compression-xz"))]
    fn copy_xz<R: Read, W: Write>(_input: R, _output: &mut W) -> SourceResult<io::Result<u64>> {
        Err(SourceError::decompression(
            "xz",
            "built without the compression-xz feature",
        ))
    }
}
