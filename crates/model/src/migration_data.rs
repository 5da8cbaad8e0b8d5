use crate::{association::ManyToManyAssociation, record::Record, schema::Schema};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `(entity, fieldName)` — a lookup that must be written after initial
/// create because the target is not yet materialized (self- or
/// cyclic-reference). Populated by a second-pass `Update`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DeferredFieldSpec {
    pub entity: String,
    pub field_name: String,
}

/// An ordered list of tiers; tier `k+1` depends only on entities in tiers
/// `<= k`. Self-referencing entities appear in a single tier with their
/// self-referencing lookups marked deferred.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TierPlan {
    pub tiers: Vec<Vec<String>>,
    pub deferred_fields: Vec<DeferredFieldSpec>,
}

impl TierPlan {
    pub fn tier_of(&self, entity: &str) -> Option<usize> {
        self.tiers
            .iter()
            .position(|tier| tier.iter().any(|e| e.eq_ignore_ascii_case(entity)))
    }

    pub fn deferred_fields_for<'a>(
        &'a self,
        entity: &'a str,
    ) -> impl Iterator<Item = &'a DeferredFieldSpec> + 'a {
        self.deferred_fields
            .iter()
            .filter(move |d| d.entity.eq_ignore_ascii_case(entity))
    }
}

/// `(schema, entityRecords, associations, exportedAt)` — the full payload
/// produced by an export and consumed by an import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationData {
    pub schema: Schema,
    pub entity_records: HashMap<String, Vec<Record>>,
    pub associations: HashMap<String, Vec<ManyToManyAssociation>>,
    pub exported_at: DateTime<Utc>,
}

impl MigrationData {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            entity_records: HashMap::new(),
            associations: HashMap::new(),
            exported_at: Utc::now(),
        }
    }

    pub fn total_records(&self) -> usize {
        self.entity_records.values().map(Vec::len).sum()
    }

    pub fn total_associations(&self) -> usize {
        self.associations
            .values()
            .map(|v| v.iter().map(ManyToManyAssociation::len).sum::<usize>())
            .sum()
    }
}
