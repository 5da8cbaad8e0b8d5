//! Reads a CSV file into a stream of [`Operation`]s against one entity,
//! following a [`CsvMapping`]. One-shot full-file load rather than a
//! resumable read cursor — bulk import has no pagination concept here
//! (spec §4.1).

use crate::error::FileError;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use model::{Batch, BatchItem, DataType, Operation, Record, RowRef, Value};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

use super::mapping::CsvMapping;

/// Resolves a lookup column's textual value (e.g. an external key) to the
/// target record's id. The loader is agnostic to how resolution happens —
/// an in-memory map for small reference data, a remote query for large
/// ones — so this is a trait rather than a concrete cache.
pub trait LookupResolver {
    fn resolve(&self, entity: &str, key_field: &str, key_value: &str) -> Option<Uuid>;
}

/// A resolver backed by a fixed in-memory table, sufficient for the
/// reference data sizes spec §4.1 describes (owning team, territory,
/// currency — hundreds of rows, not millions).
#[derive(Debug, Default)]
pub struct StaticLookupResolver {
    table: HashMap<(String, String, String), Uuid>,
}

impl StaticLookupResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity: impl Into<String>, key_field: impl Into<String>, key_value: impl Into<String>, id: Uuid) {
        self.table
            .insert((entity.into(), key_field.into(), key_value.into()), id);
    }
}

impl LookupResolver for StaticLookupResolver {
    fn resolve(&self, entity: &str, key_field: &str, key_value: &str) -> Option<Uuid> {
        self.table
            .get(&(entity.to_string(), key_field.to_string(), key_value.to_string()))
            .copied()
    }
}

pub struct CsvLoader<'a> {
    mapping: &'a CsvMapping,
    resolver: &'a dyn LookupResolver,
}

impl<'a> CsvLoader<'a> {
    pub fn new(mapping: &'a CsvMapping, resolver: &'a dyn LookupResolver) -> Self {
        Self { mapping, resolver }
    }

    /// Reads the whole file and returns one `Create` (or `Upsert`, when
    /// `mapping.key_fields` is non-empty) operation per data row, in file
    /// order. Rows whose lookup cannot be resolved are reported inline as
    /// `FileError::LookupResolution` rather than silently dropped — the
    /// caller decides whether that is fatal (spec §7: continueOnError
    /// governs this, not the loader).
    pub fn load(&self, path: &Path) -> Result<Vec<Result<BatchItem, FileError>>, FileError> {
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        self.validate_headers(&headers)?;

        let mut out = Vec::new();
        for (row_number, result) in reader.records().enumerate() {
            let row = result?;
            out.push(self.build_item(row_number as u64, &row));
        }
        Ok(out)
    }

    fn validate_headers(&self, headers: &[String]) -> Result<(), FileError> {
        for column in &self.mapping.columns {
            if !headers.iter().any(|h| h == &column.source_column) {
                return Err(FileError::UnknownColumn(column.source_column.clone()));
            }
        }
        Ok(())
    }

    fn build_item(&self, row_number: u64, row: &csv::StringRecord) -> Result<BatchItem, FileError> {
        let id = Uuid::new_v4();
        let mut record = Record::new(self.mapping.entity.clone(), id);

        for (index, column) in self.mapping.columns.iter().enumerate() {
            if !column.is_usable() {
                continue;
            }
            let raw = row.get(index).unwrap_or("");
            if raw.is_empty() {
                continue;
            }
            let field = column.target_field.as_deref().expect("usable implies target_field");
            let value = self.coerce(column, raw)?;
            record.set(field, value);
        }

        let operation = if self.mapping.key_fields.is_empty() {
            Operation::Create(record)
        } else {
            Operation::Upsert {
                record,
                key_fields: self.mapping.key_fields.clone(),
            }
        };

        Ok(BatchItem {
            row_ref: RowRef::Row(row_number),
            operation,
        })
    }

    fn coerce(&self, column: &super::mapping::ColumnMapping, raw: &str) -> Result<Value, FileError> {
        let field = column.target_field.as_deref().unwrap_or("");
        match column.target_type.unwrap_or(DataType::String) {
            DataType::String => Ok(Value::String(raw.to_string())),
            DataType::Int32 => raw
                .parse::<i32>()
                .map(Value::Int32)
                .map_err(|e| FileError::LookupResolution { field: field.to_string(), message: e.to_string() }),
            DataType::Int64 => raw
                .parse::<i64>()
                .map(Value::Int64)
                .map_err(|e| FileError::LookupResolution { field: field.to_string(), message: e.to_string() }),
            DataType::Float => raw
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| FileError::LookupResolution { field: field.to_string(), message: e.to_string() }),
            DataType::Decimal => BigDecimal::from_str(raw)
                .map(Value::Decimal)
                .map_err(|e| FileError::LookupResolution { field: field.to_string(), message: e.to_string() }),
            DataType::Money => BigDecimal::from_str(raw)
                .map(Value::Money)
                .map_err(|e| FileError::LookupResolution { field: field.to_string(), message: e.to_string() }),
            DataType::Boolean => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(Value::Boolean(true)),
                "false" | "0" | "no" => Ok(Value::Boolean(false)),
                other => Err(FileError::LookupResolution {
                    field: field.to_string(),
                    message: format!("'{other}' is not a recognized boolean"),
                }),
            },
            DataType::Timestamp => DateTime::parse_from_rfc3339(raw)
                .map(|dt| Value::Timestamp(dt.with_timezone(&Utc)))
                .map_err(|e| FileError::LookupResolution { field: field.to_string(), message: e.to_string() }),
            DataType::Id => Uuid::parse_str(raw)
                .map(Value::Id)
                .map_err(|e| FileError::LookupResolution { field: field.to_string(), message: e.to_string() }),
            DataType::OptionSet => raw
                .parse::<i32>()
                .map(Value::OptionValue)
                .map_err(|e| FileError::LookupResolution { field: field.to_string(), message: e.to_string() }),
            DataType::Lookup => {
                let lookup_entity = column.lookup_entity.as_deref().unwrap_or_default();
                let key_field = column.lookup_key_field.as_deref().unwrap_or("name");
                self.resolver
                    .resolve(lookup_entity, key_field, raw)
                    .map(|id| Value::Reference(model::EntityReference::new(lookup_entity, id)))
                    .ok_or_else(|| FileError::LookupResolution {
                        field: field.to_string(),
                        message: format!("no '{lookup_entity}' row with {key_field}='{raw}'"),
                    })
            }
            DataType::Null => Ok(Value::Null),
        }
    }
}

/// Groups loaded items into batches sized per [`model::batch::clamp_batch_size`].
pub fn into_batches(entity: &str, items: Vec<BatchItem>, batch_size: usize) -> Vec<Batch> {
    let batch_size = model::batch::clamp_batch_size(batch_size);
    items
        .chunks(batch_size)
        .enumerate()
        .map(|(i, chunk)| Batch::new(format!("{entity}-{i}"), entity, chunk.to_vec()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv::mapping::{ColumnMapping, CsvMapping};
    use std::io::Write;

    #[test]
    fn loads_typed_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name,revenue").unwrap();
        writeln!(file, "Acme,1000.50").unwrap();
        file.flush().unwrap();

        let mapping = CsvMapping {
            entity: "account".to_string(),
            columns: vec![
                ColumnMapping::auto("name", "name", DataType::String),
                ColumnMapping::auto("revenue", "revenue", DataType::Money),
            ],
            key_fields: Vec::new(),
        };
        let resolver = StaticLookupResolver::new();
        let loader = CsvLoader::new(&mapping, &resolver);
        let items = loader.load(file.path()).unwrap();
        assert_eq!(items.len(), 1);
        let item = items[0].as_ref().unwrap();
        match &item.operation {
            Operation::Create(record) => {
                assert_eq!(record.get("name").unwrap().as_str(), Some("Acme"));
            }
            other => panic!("expected Create, got {other:?}"),
        }
    }

    #[test]
    fn unresolved_lookup_reports_error_without_aborting_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "owner").unwrap();
        writeln!(file, "nonexistent").unwrap();
        file.flush().unwrap();

        let mut mapping = CsvMapping {
            entity: "account".to_string(),
            columns: vec![ColumnMapping::auto("owner", "ownerid", DataType::Lookup)],
            key_fields: Vec::new(),
        };
        mapping.columns[0].lookup_entity = Some("systemuser".to_string());
        mapping.columns[0].lookup_key_field = Some("fullname".to_string());

        let resolver = StaticLookupResolver::new();
        let loader = CsvLoader::new(&mapping, &resolver);
        let items = loader.load(file.path()).unwrap();
        assert!(items[0].is_err());
    }
}
