use model::DataType;
use serde::{Deserialize, Serialize};

/// Whether a source column could be paired with a target field without
/// operator input (spec §4.1 "load mapping").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnMappingStatus {
    /// Header matched a field name (case-insensitive) and types are
    /// compatible.
    AutoMatched,
    /// Header matched a field name but the target is a lookup and needs an
    /// explicit key-field choice before it can be loaded.
    NeedsConfiguration,
    /// No field with a compatible name was found; the column is dropped
    /// unless the operator supplies an explicit mapping.
    NoMatch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub source_column: String,
    pub target_field: Option<String>,
    pub target_type: Option<DataType>,
    pub status: ColumnMappingStatus,
    /// Set when `target_type` is `Lookup`: the entity the lookup resolves
    /// against and the field used to look values up by (spec §4.1).
    pub lookup_entity: Option<String>,
    pub lookup_key_field: Option<String>,
}

impl ColumnMapping {
    pub fn auto(source_column: impl Into<String>, target_field: impl Into<String>, target_type: DataType) -> Self {
        Self {
            source_column: source_column.into(),
            target_field: Some(target_field.into()),
            target_type: Some(target_type),
            status: ColumnMappingStatus::AutoMatched,
            lookup_entity: None,
            lookup_key_field: None,
        }
    }

    pub fn needs_configuration(
        source_column: impl Into<String>,
        target_field: impl Into<String>,
        lookup_entity: impl Into<String>,
    ) -> Self {
        Self {
            source_column: source_column.into(),
            target_field: Some(target_field.into()),
            target_type: Some(DataType::Lookup),
            status: ColumnMappingStatus::NeedsConfiguration,
            lookup_entity: Some(lookup_entity.into()),
            lookup_key_field: None,
        }
    }

    pub fn unmatched(source_column: impl Into<String>) -> Self {
        Self {
            source_column: source_column.into(),
            target_field: None,
            target_type: None,
            status: ColumnMappingStatus::NoMatch,
            lookup_entity: None,
            lookup_key_field: None,
        }
    }

    pub fn is_usable(&self) -> bool {
        match self.status {
            ColumnMappingStatus::AutoMatched => self.target_field.is_some(),
            ColumnMappingStatus::NeedsConfiguration => {
                self.target_field.is_some() && self.lookup_key_field.is_some()
            }
            ColumnMappingStatus::NoMatch => false,
        }
    }
}

/// A resolved mapping from one CSV file's header row to one target entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsvMapping {
    pub entity: String,
    pub columns: Vec<ColumnMapping>,
    /// Columns used to key an `Upsert` rather than a plain `Create`, if any.
    pub key_fields: Vec<String>,
}

impl CsvMapping {
    /// Builds a best-effort mapping by matching CSV headers against the
    /// entity schema case-insensitively. Unmatched headers become
    /// `NoMatch` entries the caller can report back to the operator rather
    /// than silently dropping. Lookup fields come back `NeedsConfiguration`
    /// since the key field to resolve by cannot be inferred from a header
    /// name alone.
    pub fn infer(entity: &model::EntitySchema, headers: &[String]) -> Self {
        let columns = headers
            .iter()
            .map(|header| {
                match entity
                    .fields
                    .iter()
                    .find(|f| f.name.eq_ignore_ascii_case(header))
                {
                    Some(field) if field.is_lookup() => ColumnMapping::needs_configuration(
                        header.clone(),
                        field.name.clone(),
                        field.lookup_targets.first().cloned().unwrap_or_default(),
                    ),
                    Some(field) => ColumnMapping::auto(header.clone(), field.name.clone(), field.data_type),
                    None => ColumnMapping::unmatched(header.clone()),
                }
            })
            .collect();
        Self {
            entity: entity.logical_name.clone(),
            columns,
            key_fields: Vec::new(),
        }
    }

    pub fn usable_columns(&self) -> impl Iterator<Item = &ColumnMapping> {
        self.columns.iter().filter(|c| c.is_usable())
    }

    pub fn unmatched_columns(&self) -> impl Iterator<Item = &ColumnMapping> {
        self.columns
            .iter()
            .filter(|c| c.status == ColumnMappingStatus::NoMatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{EntitySchema, FieldSchema};

    fn schema() -> EntitySchema {
        let mut e = EntitySchema::new("account");
        e.fields.push(FieldSchema::new("accountid", DataType::Id));
        e.fields.push(FieldSchema::new("name", DataType::String));
        e.fields.push(FieldSchema::new("revenue", DataType::Money));
        let mut owner = FieldSchema::new("ownerid", DataType::Lookup);
        owner.lookup_targets = vec!["systemuser".to_string()];
        e.fields.push(owner);
        e
    }

    #[test]
    fn infer_matches_case_insensitively() {
        let headers = vec!["Name".to_string(), "Revenue".to_string(), "Unknown".to_string()];
        let mapping = CsvMapping::infer(&schema(), &headers);
        assert_eq!(mapping.usable_columns().count(), 2);
        assert_eq!(mapping.unmatched_columns().count(), 1);
    }

    #[test]
    fn infer_flags_lookup_as_needing_configuration() {
        let headers = vec!["ownerid".to_string()];
        let mapping = CsvMapping::infer(&schema(), &headers);
        assert_eq!(mapping.columns[0].status, ColumnMappingStatus::NeedsConfiguration);
        assert!(!mapping.columns[0].is_usable());
    }
}
