use crate::record::Record;
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64_with_seed;

/// Default and bounds for `Batch::size`, per spec §3.
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const MIN_BATCH_SIZE: usize = 1;
pub const MAX_BATCH_SIZE: usize = 1000;

pub fn clamp_batch_size(requested: usize) -> usize {
    requested.clamp(MIN_BATCH_SIZE, MAX_BATCH_SIZE)
}

/// One per-record request. All operations in a [`Batch`] target the same
/// entity — the wire layer prefers this for routing and partial-result
/// attribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Operation {
    Create(Record),
    Update(Record),
    Upsert { record: Record, key_fields: Vec<String> },
    Delete(Record),
    Associate {
        relationship_name: String,
        source_entity: String,
        source_id: uuid::Uuid,
        target_entity: String,
        target_id: uuid::Uuid,
    },
    Disassociate {
        relationship_name: String,
        source_entity: String,
        source_id: uuid::Uuid,
        target_entity: String,
        target_id: uuid::Uuid,
    },
}

impl Operation {
    pub fn entity(&self) -> &str {
        match self {
            Operation::Create(r) | Operation::Update(r) | Operation::Delete(r) => &r.entity,
            Operation::Upsert { record, .. } => &record.entity,
            Operation::Associate { source_entity, .. }
            | Operation::Disassociate { source_entity, .. } => source_entity,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Create(_) => "create",
            Operation::Update(_) => "update",
            Operation::Upsert { .. } => "upsert",
            Operation::Delete(_) => "delete",
            Operation::Associate { .. } => "associate",
            Operation::Disassociate { .. } => "disassociate",
        }
    }

    /// Upsert/Associate/Disassociate are idempotent on replay; plain
    /// Create/Update/Delete are only safe to retry when the pool has
    /// classified the failure as "request not sent" (spec §4.4, §9).
    pub fn is_idempotent(&self) -> bool {
        matches!(
            self,
            Operation::Upsert { .. } | Operation::Associate { .. } | Operation::Disassociate { .. }
        )
    }
}

/// A stable identifier for the caller's source row (CSV row number, record
/// id, or export page position), used for error attribution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RowRef {
    Row(u64),
    RecordId(uuid::Uuid),
}

impl std::fmt::Display for RowRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowRef::Row(n) => write!(f, "row#{n}"),
            RowRef::RecordId(id) => write!(f, "id:{id}"),
        }
    }
}

/// One row in a batch: the operation plus its stable row reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    pub row_ref: RowRef,
    pub operation: Operation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchManifest {
    pub row_count: usize,
    pub checksum_xxh3: u64,
}

/// An ordered sequence (length bounded by `clamp_batch_size`) of
/// same-entity operations submitted to the remote as a single request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub id: String,
    pub entity: String,
    pub items: Vec<BatchItem>,
    pub manifest: BatchManifest,
}

impl Batch {
    pub fn new(id: impl Into<String>, entity: impl Into<String>, items: Vec<BatchItem>) -> Self {
        let manifest = manifest_for(&items);
        Self {
            id: id.into(),
            entity: entity.into(),
            items,
            manifest,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Splits the batch in half, used by the executor to isolate poisoned
    /// records after the retry budget for the whole batch is exhausted.
    pub fn split(self) -> (Option<Batch>, Option<Batch>) {
        if self.items.len() <= 1 {
            return (Some(self), None);
        }
        let mid = self.items.len() / 2;
        let mut items = self.items;
        let right_items = items.split_off(mid);
        let left = Batch::new(format!("{}-a", self.id), self.entity.clone(), items);
        let right = Batch::new(format!("{}-b", self.id), self.entity, right_items);
        (Some(left), Some(right))
    }
}

pub fn manifest_for(items: &[BatchItem]) -> BatchManifest {
    let mut h: u64 = 0;
    for item in items {
        let bytes = match &item.operation {
            Operation::Create(r) | Operation::Update(r) | Operation::Delete(r) => {
                r.canonical_bytes()
            }
            Operation::Upsert { record, .. } => record.canonical_bytes(),
            Operation::Associate {
                source_id,
                target_id,
                ..
            }
            | Operation::Disassociate {
                source_id,
                target_id,
                ..
            } => {
                let mut b = source_id.as_bytes().to_vec();
                b.extend_from_slice(target_id.as_bytes());
                b
            }
        };
        h = xxh3_64_with_seed(&bytes, h);
    }
    BatchManifest {
        row_count: items.len(),
        checksum_xxh3: h,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use uuid::Uuid;

    fn item(n: u64) -> BatchItem {
        BatchItem {
            row_ref: RowRef::Row(n),
            operation: Operation::Create(Record::new("account", Uuid::new_v4())),
        }
    }

    #[test]
    fn split_bisects_batch() {
        let batch = Batch::new("b1", "account", vec![item(1), item(2), item(3), item(4)]);
        let (left, right) = batch.split();
        assert_eq!(left.unwrap().len(), 2);
        assert_eq!(right.unwrap().len(), 2);
    }

    #[test]
    fn split_of_singleton_is_unsplittable() {
        let batch = Batch::new("b1", "account", vec![item(1)]);
        let (left, right) = batch.split();
        assert_eq!(left.unwrap().len(), 1);
        assert!(right.is_none());
    }

    #[test]
    fn clamp_enforces_bounds() {
        assert_eq!(clamp_batch_size(0), MIN_BATCH_SIZE);
        assert_eq!(clamp_batch_size(5000), MAX_BATCH_SIZE);
        assert_eq!(clamp_batch_size(50), 50);
    }
}
