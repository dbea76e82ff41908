//! Centralized error handling
//!
//! # Error Categories
//!
//! - **Source Errors**: a source could not be fetched, copied or unpacked
//! - **Parse Errors**: guide data ended inside an unterminated element
//! - **Merge Errors**: store rewrites, busy triggers and artifact publishing
//! - **Configuration Errors**: invalid or inconsistent settings

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for Source Results
pub type SourceResult<T> = Result<T, SourceError>;

/// Convenience type alias for Merge Results
pub type MergeResult<T> = Result<T, MergeError>;
