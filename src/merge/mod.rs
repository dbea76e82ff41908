//! The merge engine
//!
//! - [`guide_scanner`] / [`guide_merger`]: streaming guide assembly and recovery
//! - [`playlist_parser`] / [`playlist_writer`]: playlist ingestion and output
//! - [`orchestrator`]: one full pass over every enabled source
//! - [`gate`] / [`service`]: freshness decisions and pass serialisation
//! - [`scheduler`]: background freshness checks in service mode

pub mod catalog;
pub mod gate;
pub mod guide_merger;
pub mod guide_scanner;
pub mod orchestrator;
pub mod playlist_parser;
pub mod playlist_writer;
pub mod publish;
pub mod scheduler;
pub mod service;

pub use catalog::sync_configured_sources;
pub use gate::MergeSchedule;
pub use orchestrator::{MergeOrchestrator, MergeReport};
pub use publish::MergePaths;
pub use scheduler::MergeScheduler;
pub use service::{Artifact, MergeService};
