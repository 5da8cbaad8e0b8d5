use crate::value::{FieldValue, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single Dataverse record: `(entityName, id)` plus an ordered map of
/// field name to typed value. The id is immutable once constructed; fields
/// are only ever mutated by the import pipeline (deferred-field pass).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub entity: String,
    pub id: Uuid,
    fields: IndexMap<String, Value>,
}

impl Record {
    pub fn new(entity: impl Into<String>, id: Uuid) -> Self {
        Self {
            entity: entity.into(),
            id,
            fields: IndexMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.shift_remove(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn field_values(&self) -> Vec<FieldValue> {
        self.fields
            .iter()
            .map(|(k, v)| FieldValue::new(k.clone(), v.clone()))
            .collect()
    }

    /// Stable byte representation used for batch manifest checksums.
    /// Field order follows insertion order, which is deterministic for a
    /// given exporter run.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut buf = self.entity.as_bytes().to_vec();
        buf.extend_from_slice(self.id.as_bytes());
        for (name, value) in &self.fields {
            buf.extend_from_slice(name.as_bytes());
            buf.extend_from_slice(&value.canonical_bytes());
        }
        buf
    }

    pub fn size_bytes(&self) -> usize {
        let mut size = self.entity.len() + 16;
        for (name, value) in &self.fields {
            size += name.len() + value.size_bytes();
        }
        size
    }
}
