//! Sync policy: which records get an attempt and when a record gives up.

use serde::{Deserialize, Serialize};

use shipsync_core::TenantId;
use shipsync_sales::OrderState;

use crate::sync_order::{SyncOrder, SyncStatus};

/// Default attempt limit before a record is marked failed.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Read-only sync settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPolicy {
    /// Module enabled flag; when false every sync operation is a no-op.
    pub enabled: bool,
    /// Maximum number of sync attempts.
    pub max_attempts: u32,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl SyncPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Whether the scheduled runner should still pick this record up.
    pub fn is_retriable(&self, attempt_count: u32) -> bool {
        attempt_count < self.max_attempts
    }

    /// Whether a record that just failed should give up.
    ///
    /// Strictly greater: a record can sit at exactly `max_attempts` while pending.
    pub fn exhausted(&self, attempt_count: u32) -> bool {
        attempt_count > self.max_attempts
    }

    /// Eligibility for a scheduled run in `tenant_id`.
    pub fn is_eligible(&self, record: &SyncOrder, tenant_id: TenantId, order_state: OrderState) -> bool {
        record.status() == SyncStatus::Pending
            && self.is_retriable(record.attempt_count())
            && order_state == OrderState::Processing
            && record.tenant_id() == tenant_id
    }
}
