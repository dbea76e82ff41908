//! IPTV playlist and guide merge service
//!
//! Pulls playlists and XMLTV guides from many sources and publishes one merged
//! playlist and one merged guide, rebuilding them on a schedule or on demand.

pub mod config;
pub mod database;
pub mod entities;
pub mod errors;
pub mod merge;
pub mod models;
pub mod sources;
pub mod utils;
pub mod web;

pub use config::Config;
pub use errors::{AppError, AppResult, MergeError, MergeResult, SourceError, SourceResult};
