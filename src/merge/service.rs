//! Serialises merge passes and serves artifacts consistently.
//!
//! Two locks are involved. The run lock is held for the whole of a pass and
//! while a request decides freshness and opens its artifact, so a request
//! never reads a half-published file. The force latch admits at most one
//! queued forced pass; a second trigger is rejected as busy.

use chrono::{Local, Utc};
use std::path::PathBuf;
use tokio::fs::File;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use super::gate::MergeSchedule;
use super::orchestrator::{MergeOrchestrator, MergeReport};
use super::publish::MergePaths;
use crate::database::Database;
use crate::database::repositories::AppStateSeaOrmRepository;
use crate::errors::{MergeError, MergeResult};

/// A published file clients can request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    Playlist,
    Guide,
}

impl Artifact {
    pub fn content_type(&self, paths: &MergePaths) -> &'static str {
        match self {
            Artifact::Playlist => "application/x-mpegurl",
            Artifact::Guide if paths.compress_guide => "application/gzip",
            Artifact::Guide => "application/xml",
        }
    }

    pub fn path(&self, paths: &MergePaths) -> PathBuf {
        match self {
            Artifact::Playlist => paths.published_playlist(),
            Artifact::Guide => paths.published_guide(),
        }
    }
}

pub struct MergeService {
    orchestrator: MergeOrchestrator,
    app_state: AppStateSeaOrmRepository,
    schedule: MergeSchedule,
    run_lock: Mutex<()>,
    force_latch: Mutex<()>,
}

impl MergeService {
    pub fn new(
        orchestrator: MergeOrchestrator,
        database: &Database,
        schedule: MergeSchedule,
    ) -> Self {
        Self {
            orchestrator,
            app_state: AppStateSeaOrmRepository::new(database.connection()),
            schedule,
            run_lock: Mutex::new(()),
            force_latch: Mutex::new(()),
        }
    }

    pub fn paths(&self) -> &MergePaths {
        self.orchestrator.paths()
    }

    /// Run a pass when the schedule says one is due
    pub async fn ensure_fresh(&self) -> MergeResult<Option<MergeReport>> {
        let _run = self.run_lock.lock().await;
        self.refresh_locked().await
    }

    /// Run a pass now, unless another forced pass is already queued or running
    pub async fn force_merge(&self) -> MergeResult<MergeReport> {
        let _latch = self.force_latch.try_lock().map_err(|_| MergeError::Busy)?;
        let _run = self.run_lock.lock().await;
        info!("Forced merge requested");
        self.run_locked().await
    }

    /// Bring artifacts up to date, then open one for reading.
    ///
    /// The file is opened while the run lock is held; the returned handle keeps
    /// reading the same content even if a later pass replaces the file.
    /// A failed pass is logged and the previous artifact is served.
    pub async fn open_artifact(&self, artifact: Artifact) -> MergeResult<Option<File>> {
        let _run = self.run_lock.lock().await;
        if let Err(e) = self.refresh_locked().await {
            error!("Merge before serving {:?} failed: {}", artifact, e);
        }

        match File::open(artifact.path(self.paths())).await {
            Ok(file) => Ok(Some(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn refresh_locked(&self) -> MergeResult<Option<MergeReport>> {
        let last_run = self.app_state.last_run().await?;
        let artifacts_present = self.paths().artifacts_present();
        if !self.schedule.is_due(last_run, &Local::now(), artifacts_present) {
            debug!("Artifacts are fresh");
            return Ok(None);
        }
        self.run_locked().await.map(Some)
    }

    async fn run_locked(&self) -> MergeResult<MergeReport> {
        self.app_state.set_last_run(Utc::now()).await?;
        self.orchestrator.run().await
    }
}
