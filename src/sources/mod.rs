//! Source acquisition: remote downloads, local copies and provider templates

pub mod fetcher;
pub mod traits;

pub use fetcher::{StandardFetcher, expand_template};
pub use traits::{Acquired, SourceFetcher};
