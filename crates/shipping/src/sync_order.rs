//! The sync record: one sales order queued for carrier registration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shipsync_core::{DomainError, DomainResult, TenantId};
use shipsync_sales::SalesOrderId;

use crate::policy::SyncPolicy;

/// Unique sync record identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncOrderId(pub Uuid);

impl SyncOrderId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for SyncOrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SyncOrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sync status of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Waiting for (another) sync attempt
    Pending,
    /// Registered with the carrier; tracking number recorded
    Synced,
    /// Gave up after exceeding the attempt limit
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Synced => "synced",
            SyncStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "pending" => Ok(SyncStatus::Pending),
            "synced" => Ok(SyncStatus::Synced),
            "failed" => Ok(SyncStatus::Failed),
            other => Err(DomainError::validation(format!("unknown sync status: {other}"))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncStatus::Synced | SyncStatus::Failed)
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Carrier tracking identifier. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TrackingNumber(String);

impl TrackingNumber {
    pub fn new(value: impl Into<String>) -> DomainResult<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("tracking number must not be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TrackingNumber {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TrackingNumber> for String {
    fn from(value: TrackingNumber) -> Self {
        value.0
    }
}

impl std::fmt::Display for TrackingNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// All stored fields of a sync record, used to rehydrate from storage.
#[derive(Debug, Clone)]
pub struct SyncOrderParts {
    pub id: SyncOrderId,
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub status: SyncStatus,
    pub attempt_count: u32,
    pub tracking_number: Option<TrackingNumber>,
    pub synced_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A sales order queued for carrier sync.
///
/// State machine: `Pending -> Synced | Pending (retry) | Failed`.
/// `Synced` and `Failed` are terminal; `attempt_count` never decreases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOrder {
    id: SyncOrderId,
    tenant_id: TenantId,
    order_id: SalesOrderId,
    status: SyncStatus,
    attempt_count: u32,
    tracking_number: Option<TrackingNumber>,
    synced_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SyncOrder {
    /// New pending record for an order that just became ready to ship.
    pub fn pending(tenant_id: TenantId, order_id: SalesOrderId) -> Self {
        let now = Utc::now();
        Self {
            id: SyncOrderId::new(),
            tenant_id,
            order_id,
            status: SyncStatus::Pending,
            attempt_count: 0,
            tracking_number: None,
            synced_at: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rehydrate a stored record, rejecting combinations the state machine can't produce.
    pub fn from_parts(parts: SyncOrderParts) -> DomainResult<Self> {
        match parts.status {
            SyncStatus::Synced => {
                if parts.tracking_number.is_none() || parts.synced_at.is_none() {
                    return Err(DomainError::invariant(
                        "synced record requires tracking_number and synced_at",
                    ));
                }
            }
            SyncStatus::Pending | SyncStatus::Failed => {
                if parts.tracking_number.is_some() || parts.synced_at.is_some() {
                    return Err(DomainError::invariant(format!(
                        "{} record must not carry tracking details",
                        parts.status
                    )));
                }
            }
        }

        Ok(Self {
            id: parts.id,
            tenant_id: parts.tenant_id,
            order_id: parts.order_id,
            status: parts.status,
            attempt_count: parts.attempt_count,
            tracking_number: parts.tracking_number,
            synced_at: parts.synced_at,
            last_error: parts.last_error,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
        })
    }

    pub fn id(&self) -> SyncOrderId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn order_id(&self) -> SalesOrderId {
        self.order_id
    }

    pub fn status(&self) -> SyncStatus {
        self.status
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn tracking_number(&self) -> Option<&TrackingNumber> {
        self.tracking_number.as_ref()
    }

    pub fn synced_at(&self) -> Option<DateTime<Utc>> {
        self.synced_at
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn ensure_pending(&self, action: &str) -> DomainResult<()> {
        if self.status.is_terminal() {
            return Err(DomainError::invariant(format!(
                "cannot {action}: sync record {} is {}",
                self.id, self.status
            )));
        }
        Ok(())
    }

    /// Count a new attempt. Happens before the carrier is called.
    pub fn begin_attempt(&mut self) -> DomainResult<u32> {
        self.ensure_pending("begin attempt")?;
        self.attempt_count = self
            .attempt_count
            .checked_add(1)
            .ok_or_else(|| DomainError::invariant("attempt_count overflow"))?;
        self.updated_at = Utc::now();
        Ok(self.attempt_count)
    }

    /// Record the carrier's tracking number.
    pub fn mark_synced(&mut self, tracking_number: TrackingNumber, at: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_pending("mark synced")?;
        self.status = SyncStatus::Synced;
        self.tracking_number = Some(tracking_number);
        self.synced_at = Some(at);
        self.last_error = None;
        self.updated_at = at;
        Ok(())
    }

    /// Record a failed attempt; flips to `Failed` once the policy says the attempts are exhausted.
    pub fn record_failure(&mut self, error: impl Into<String>, policy: &SyncPolicy) -> DomainResult<SyncStatus> {
        self.ensure_pending("record failure")?;
        self.last_error = Some(error.into());
        if policy.exhausted(self.attempt_count) {
            self.status = SyncStatus::Failed;
        }
        self.updated_at = Utc::now();
        Ok(self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_attempts(attempt_count: u32) -> SyncOrder {
        let now = Utc::now();
        SyncOrder::from_parts(SyncOrderParts {
            id: SyncOrderId::new(),
            tenant_id: TenantId::new(),
            order_id: SalesOrderId::generate(),
            status: SyncStatus::Pending,
            attempt_count,
            tracking_number: None,
            synced_at: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        })
        .unwrap()
    }

    fn policy(max_attempts: u32) -> SyncPolicy {
        SyncPolicy {
            enabled: true,
            max_attempts,
        }
    }

    #[test]
    fn pending_record_starts_clean() {
        let record = SyncOrder::pending(TenantId::new(), SalesOrderId::generate());
        assert_eq!(record.status(), SyncStatus::Pending);
        assert_eq!(record.attempt_count(), 0);
        assert!(record.tracking_number().is_none());
        assert!(record.synced_at().is_none());
    }

    #[test]
    fn successful_attempt_sets_tracking_and_timestamp() {
        let mut record = record_with_attempts(0);
        record.begin_attempt().unwrap();
        let at = Utc::now();
        record
            .mark_synced(TrackingNumber::new("ABC123").unwrap(), at)
            .unwrap();

        assert_eq!(record.status(), SyncStatus::Synced);
        assert_eq!(record.tracking_number().unwrap().as_str(), "ABC123");
        assert_eq!(record.synced_at(), Some(at));
        assert_eq!(record.attempt_count(), 1);
    }

    #[test]
    fn failure_below_limit_stays_pending() {
        let mut record = record_with_attempts(4);
        record.begin_attempt().unwrap();
        let status = record.record_failure("timeout", &policy(5)).unwrap();
        assert_eq!(status, SyncStatus::Pending);
        assert_eq!(record.attempt_count(), 5);
        assert_eq!(record.last_error(), Some("timeout"));
    }

    #[test]
    fn failure_past_limit_flips_to_failed() {
        let mut record = record_with_attempts(5);
        record.begin_attempt().unwrap();
        let status = record.record_failure("timeout", &policy(5)).unwrap();
        assert_eq!(status, SyncStatus::Failed);
        assert_eq!(record.attempt_count(), 6);
    }

    #[test]
    fn terminal_records_reject_transitions() {
        let mut record = record_with_attempts(0);
        record.begin_attempt().unwrap();
        record
            .mark_synced(TrackingNumber::new("T1").unwrap(), Utc::now())
            .unwrap();

        assert!(matches!(
            record.begin_attempt(),
            Err(DomainError::InvariantViolation(_))
        ));
        assert!(record.record_failure("late", &policy(5)).is_err());
        assert_eq!(record.attempt_count(), 1);
    }

    #[test]
    fn success_clears_previous_error() {
        let mut record = record_with_attempts(0);
        record.begin_attempt().unwrap();
        record.record_failure("boom", &policy(5)).unwrap();
        record.begin_attempt().unwrap();
        record
            .mark_synced(TrackingNumber::new("T2").unwrap(), Utc::now())
            .unwrap();
        assert!(record.last_error().is_none());
    }

    #[test]
    fn tracking_number_must_not_be_blank() {
        assert!(TrackingNumber::new("").is_err());
        assert!(TrackingNumber::new("   ").is_err());
        assert_eq!(TrackingNumber::new(" X9 ").unwrap().as_str(), "X9");
    }

    #[test]
    fn from_parts_rejects_synced_without_tracking() {
        let now = Utc::now();
        let result = SyncOrder::from_parts(SyncOrderParts {
            id: SyncOrderId::new(),
            tenant_id: TenantId::new(),
            order_id: SalesOrderId::generate(),
            status: SyncStatus::Synced,
            attempt_count: 1,
            tracking_number: None,
            synced_at: Some(now),
            last_error: None,
            created_at: now,
            updated_at: now,
        });
        assert!(result.is_err());
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [SyncStatus::Pending, SyncStatus::Synced, SyncStatus::Failed] {
            assert_eq!(SyncStatus::parse(status.as_str()).unwrap(), status);
        }
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                .. ProptestConfig::default()
            })]

            /// A failed attempt adds exactly one and fails only strictly past the limit.
            #[test]
            fn failed_attempt_increments_by_one(max in 0u32..20, start in 0u32..25) {
                let mut record = record_with_attempts(start);
                record.begin_attempt().unwrap();
                let status = record.record_failure("carrier down", &policy(max)).unwrap();

                prop_assert_eq!(record.attempt_count(), start + 1);
                if start + 1 > max {
                    prop_assert_eq!(status, SyncStatus::Failed);
                } else {
                    prop_assert_eq!(status, SyncStatus::Pending);
                }
            }

            /// A successful attempt always leaves a synced record with tracking details.
            #[test]
            fn successful_attempt_is_synced(start in 0u32..25, tracking in "[A-Z0-9]{1,16}") {
                let mut record = record_with_attempts(start);
                record.begin_attempt().unwrap();
                record.mark_synced(TrackingNumber::new(tracking.clone()).unwrap(), Utc::now()).unwrap();

                prop_assert_eq!(record.status(), SyncStatus::Synced);
                prop_assert_eq!(record.tracking_number().map(|t| t.as_str().to_string()), Some(tracking));
                prop_assert!(record.synced_at().is_some());
                prop_assert_eq!(record.attempt_count(), start + 1);
            }

            /// attempt_count never decreases across any sequence of failures.
            #[test]
            fn attempts_are_monotonic(max in 1u32..10, failures in 1usize..30) {
                let mut record = record_with_attempts(0);
                let mut last = record.attempt_count();
                for _ in 0..failures {
                    if record.begin_attempt().is_err() {
                        break;
                    }
                    prop_assert!(record.attempt_count() > last);
                    last = record.attempt_count();
                    record.record_failure("err", &policy(max)).unwrap();
                }
                if record.status() == SyncStatus::Failed {
                    prop_assert!(record.attempt_count() > max);
                }
            }
        }
    }
}
