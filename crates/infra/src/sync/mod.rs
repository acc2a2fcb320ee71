//! Order sync engine: single attempts, full runs and the periodic scheduler.

mod runner;
mod scheduler;
mod service;

use serde::Serialize;

use shipsync_core::DomainError;

use crate::store::StoreError;

pub use runner::{RunSummary, SyncRunner};
pub use scheduler::{SyncScheduler, SyncSchedulerHandle};
pub use service::OrderSyncService;

/// Failures that escape a sync attempt.
///
/// Request-build and carrier failures never show up here; they become a
/// failed attempt on the record instead.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SyncError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("sync scheduler is not running")]
    SchedulerStopped,
}

/// Result of one sync attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncAttempt {
    /// Sync is disabled; nothing was touched.
    Skipped,
    Synced { tracking_number: String },
    /// Failed; the record stays pending for another attempt.
    Retrying { attempt_count: u32, error: String },
    /// Failed past the attempt limit; the record is now failed.
    Failed { attempt_count: u32, error: String },
}

impl SyncAttempt {
    pub fn succeeded(&self) -> bool {
        matches!(self, SyncAttempt::Synced { .. })
    }
}
