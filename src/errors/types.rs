//! Error type definitions for the merge service
//!
//! Per-source failures (`SourceError`, `GuideParseError`) are recorded in a
//! source's run history and never abort a merge pass. `MergeError` carries
//! everything the orchestrator can surface, and `AppError` sits on top for
//! start-up and the web layer.

use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors (SeaORM)
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Source acquisition errors
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Merge pass errors
    #[error("Merge error: {0}")]
    Merge(#[from] MergeError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Filesystem errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// A source could not be resolved into a local file.
///
/// Distinct from a resolved source that simply produced zero bytes, which is
/// an `Ok` acquisition.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Local path does not exist
    #[error("Local path missing: {path}")]
    LocalPathMissing { path: String },

    /// Upstream answered with a non-success status
    #[error("HTTP error: {status} - {url}")]
    Http { status: u16, url: String },

    /// Transport level failure (connect, timeout, body read)
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Provider is not configured
    #[error("Unknown provider: {provider}")]
    UnknownProvider { provider: String },

    /// Provider exists but does not publish this kind of data
    #[error("{method} could not be found for {provider}")]
    MethodUnavailable { method: String, provider: String },

    /// Provider only publishes a playlist that embeds its guide link
    #[error("Guide is now provided by the playlist of {provider}. You can remove this guide source")]
    GuideFromPlaylist { provider: String },

    /// Custom sources hold their channels inline and are never fetched
    #[error("Custom source {source_id} has no remote content")]
    NotAcquirable { source_id: i32 },

    /// Archive could not be unpacked
    #[error("Failed to decompress {format} data: {message}")]
    Decompression { format: String, message: String },

    /// Filesystem errors while writing the downloaded copy
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Guide data that cannot be scanned to completion
#[derive(Error, Debug, PartialEq, Eq)]
pub enum GuideParseError {
    #[error("Guide data ended inside an unterminated <{tag}> element ({buffered} bytes buffered)")]
    UnterminatedElement { tag: &'static str, buffered: usize },
}

/// Errors raised while running a merge pass
#[derive(Error, Debug)]
pub enum MergeError {
    /// Source resolution failed
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Malformed input that could not be recovered
    #[error("Parse error: {0}")]
    Parse(#[from] GuideParseError),

    /// Rewriting one source's channels failed and was rolled back
    #[error("Failed to store channels for source {source_id}: {error}")]
    Integrity {
        source_id: i32,
        #[source]
        error: sea_orm::DbErr,
    },

    /// A forced merge is already queued
    #[error("Merge already in progress")]
    Busy,

    /// Final promotion of an artifact failed; the previous artifact stays in place
    #[error("Failed to publish {artifact}: {message}")]
    Publish { artifact: String, message: String },

    /// Store access outside a per-source rewrite
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Filesystem errors while assembling artifacts
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience methods for creating common error types
impl AppError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl SourceError {
    pub fn decompression<F: Into<String>, M: Into<String>>(format: F, message: M) -> Self {
        Self::Decompression {
            format: format.into(),
            message: message.into(),
        }
    }
}

impl MergeError {
    pub fn publish<A: Into<String>, M: ToString>(artifact: A, message: M) -> Self {
        Self::Publish {
            artifact: artifact.into(),
            message: message.to_string(),
        }
    }

    /// Whether this error is a per-source failure that the pass absorbs
    pub fn is_source_scoped(&self) -> bool {
        matches!(
            self,
            Self::Source(_) | Self::Parse(_) | Self::Integrity { .. }
        )
    }
}
