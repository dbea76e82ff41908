//! Utility modules shared by the fetch, merge and web layers

pub mod decompression;
pub mod human_format;
pub mod url;

pub use decompression::{CompressionFormat, DecompressionService};
pub use self::url::UrlUtils;
