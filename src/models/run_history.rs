//! Per-source run results kept as a short, newest-first history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Number of results kept per source
pub const RUN_HISTORY_CAPACITY: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Ok,
    Error,
}

/// Outcome of processing one source in one pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub timestamp: DateTime<Utc>,
    pub outcome: RunOutcome,
    pub message: String,
}

impl RunResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            outcome: RunOutcome::Ok,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            outcome: RunOutcome::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.outcome == RunOutcome::Error
    }
}

/// Bounded history, newest first.
///
/// A repeated error replaces the newest entry instead of pushing, so a source
/// that keeps failing still shows its last successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<RunResult>", into = "Vec<RunResult>")]
pub struct RunHistory {
    entries: VecDeque<RunResult>,
}

impl RunHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, result: RunResult) {
        let replace = result.is_error() && self.latest().is_some_and(RunResult::is_error);
        if replace {
            if let Some(front) = self.entries.front_mut() {
                *front = result;
            }
            return;
        }

        self.entries.push_front(result);
        self.entries.truncate(RUN_HISTORY_CAPACITY);
    }

    pub fn latest(&self) -> Option<&RunResult> {
        self.entries.front()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &RunResult> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<RunResult>> for RunHistory {
    fn from(mut results: Vec<RunResult>) -> Self {
        results.truncate(RUN_HISTORY_CAPACITY);
        Self {
            entries: results.into(),
        }
    }
}

impl From<RunHistory> for Vec<RunResult> {
    fn from(history: RunHistory) -> Self {
        history.entries.into()
    }
}
