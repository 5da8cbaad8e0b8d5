use crate::batch::RowRef;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Kind of an individual record-level failure, used by the Reporter to
/// cluster errors into suggestion classes (spec §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    MissingReference,
    MissingUserOrTeam,
    Duplicate,
    Permission,
    RequiredField,
    Validation,
    Throttled,
    Transient,
    Fatal,
}

impl ErrorCode {
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            ErrorCode::MissingReference => {
                Some("one or more lookups point at records that do not exist in the target — migrate the referenced entity first or check the mapping")
            }
            ErrorCode::MissingUserOrTeam => {
                Some("owner/created-by references a user or team absent in the target — supply a user mapping or enable --strip-owner-fields")
            }
            ErrorCode::Duplicate => {
                Some("the remote rejected a duplicate alternate key — use Upsert mode or dedupe the source")
            }
            ErrorCode::Permission => {
                Some("the authenticated identity lacks privileges on this entity or field")
            }
            ErrorCode::RequiredField => Some("a required field was empty or unmapped"),
            _ => None,
        }
    }
}

/// `{rowRef, entity, field?, errorCode, message, recordId?}` per spec §4.4.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowError {
    pub row_ref: RowRef,
    pub entity: String,
    pub field: Option<String>,
    pub error_code: ErrorCode,
    pub message: String,
    pub record_id: Option<Uuid>,
}

/// `{success, duration, totalRecords, successCount, failureCount,
/// createdCount?, updatedCount?, skippedCount?, errors[]}` per spec §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    pub success: bool,
    #[serde(with = "duration_secs_f64")]
    pub duration: Duration,
    pub total_records: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub created_count: Option<u64>,
    pub updated_count: Option<u64>,
    pub skipped_count: Option<u64>,
    pub errors: Vec<RowError>,
}

impl MigrationResult {
    pub fn empty() -> Self {
        Self {
            success: true,
            duration: Duration::ZERO,
            total_records: 0,
            success_count: 0,
            failure_count: 0,
            created_count: None,
            updated_count: None,
            skipped_count: None,
            errors: Vec::new(),
        }
    }

    /// At-most-once accounting invariant (spec §8): every processed
    /// record lands in exactly one bucket.
    pub fn is_accounted_for(&self) -> bool {
        let skipped = self.skipped_count.unwrap_or(0);
        self.success_count + self.failure_count + skipped == self.total_records
    }

    pub fn merge(&mut self, other: MigrationResult) {
        self.duration += other.duration;
        self.total_records += other.total_records;
        self.success_count += other.success_count;
        self.failure_count += other.failure_count;
        self.created_count = match (self.created_count, other.created_count) {
            (Some(a), Some(b)) => Some(a + b),
            (a, b) => a.or(b),
        };
        self.updated_count = match (self.updated_count, other.updated_count) {
            (Some(a), Some(b)) => Some(a + b),
            (a, b) => a.or(b),
        };
        self.skipped_count = match (self.skipped_count, other.skipped_count) {
            (Some(a), Some(b)) => Some(a + b),
            (a, b) => a.or(b),
        };
        self.errors.extend(other.errors);
        self.success = self.success && other.success;
    }
}

mod duration_secs_f64 {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accounted_for_requires_exact_sum() {
        let mut r = MigrationResult::empty();
        r.total_records = 10;
        r.success_count = 9;
        r.failure_count = 1;
        assert!(r.is_accounted_for());
        r.failure_count = 0;
        assert!(!r.is_accounted_for());
    }

    #[test]
    fn merge_sums_counts() {
        let mut a = MigrationResult::empty();
        a.total_records = 5;
        a.success_count = 5;
        let mut b = MigrationResult::empty();
        b.total_records = 3;
        b.success_count = 2;
        b.failure_count = 1;
        a.merge(b);
        assert_eq!(a.total_records, 8);
        assert_eq!(a.success_count, 7);
        assert_eq!(a.failure_count, 1);
    }
}
