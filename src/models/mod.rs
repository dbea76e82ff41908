//! Domain models shared by the merge engine, the store and the web layer

pub mod channel;
pub mod run_history;
pub mod source;

pub use channel::{Channel, parse_attributes};
pub use run_history::{RUN_HISTORY_CAPACITY, RunHistory, RunOutcome, RunResult};
pub use source::{
    ArchiveType, ByteRange, PlaylistOptions, Source, SourceKind, SourceRole, SourceTarget,
};
