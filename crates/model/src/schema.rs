use crate::data_type::DataType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One field declaration inside an [`EntitySchema`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub display_name: String,
    pub data_type: DataType,
    pub valid_for_create: bool,
    pub valid_for_update: bool,
    /// Target entity name(s) for a lookup field; `|`-delimited when the
    /// lookup is polymorphic (matches the archive's on-wire convention).
    pub lookup_targets: Vec<String>,
    pub is_primary_key: bool,
    pub custom_field: bool,
    pub max_length: Option<u32>,
    pub precision: Option<u32>,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            data_type,
            valid_for_create: true,
            valid_for_update: true,
            lookup_targets: Vec::new(),
            is_primary_key: false,
            custom_field: false,
            max_length: None,
            precision: None,
        }
    }

    pub fn is_lookup(&self) -> bool {
        self.data_type == DataType::Lookup && !self.lookup_targets.is_empty()
    }
}

/// Declares a many-to-many relationship that must be migrated via the
/// dedicated association pass rather than as a field on either entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipSchema {
    pub name: String,
    pub related_entity: String,
    pub intersect_entity: Option<String>,
    pub target_id_field: String,
}

/// `(logicalName, displayName, primaryIdField, primaryNameField,
/// fields[], relationships[], disablePluginsDefault, fetchFilter?,
/// objectTypeCode?)` per spec §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySchema {
    pub logical_name: String,
    pub display_name: String,
    pub primary_id_field: String,
    pub primary_name_field: String,
    pub fields: Vec<FieldSchema>,
    pub relationships: Vec<RelationshipSchema>,
    pub disable_plugins_default: bool,
    pub fetch_filter: Option<String>,
    pub object_type_code: Option<i32>,
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("entity '{0}' declares no primary id field '{1}' among its fields")]
    MissingPrimaryKeyField(String, String),
    #[error("duplicate entity '{0}' (case-insensitive) in schema")]
    DuplicateEntity(String),
    #[error("entity '{0}' not found in schema")]
    UnknownEntity(String),
}

impl EntitySchema {
    pub fn new(logical_name: impl Into<String>) -> Self {
        let logical_name = logical_name.into();
        let primary_id_field = format!("{logical_name}id");
        Self {
            display_name: logical_name.clone(),
            primary_id_field,
            primary_name_field: "name".to_string(),
            logical_name,
            fields: Vec::new(),
            relationships: Vec::new(),
            disable_plugins_default: false,
            fetch_filter: None,
            object_type_code: None,
        }
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        if !self.fields.iter().any(|f| f.name == self.primary_id_field) {
            return Err(SchemaError::MissingPrimaryKeyField(
                self.logical_name.clone(),
                self.primary_id_field.clone(),
            ));
        }
        Ok(())
    }

    pub fn lookup_fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields.iter().filter(|f| f.is_lookup())
    }

    pub fn writable_fields(&self, for_create: bool) -> impl Iterator<Item = &FieldSchema> {
        self.fields.iter().filter(move |f| {
            if for_create {
                f.valid_for_create
            } else {
                f.valid_for_update
            }
        })
    }
}

/// Ordered collection of [`EntitySchema`]s, unique on logical name
/// (case-insensitive).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    entities: Vec<EntitySchema>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity: EntitySchema) -> Result<(), SchemaError> {
        if self.get(&entity.logical_name).is_some() {
            return Err(SchemaError::DuplicateEntity(entity.logical_name));
        }
        self.entities.push(entity);
        Ok(())
    }

    pub fn get(&self, logical_name: &str) -> Option<&EntitySchema> {
        self.entities
            .iter()
            .find(|e| e.logical_name.eq_ignore_ascii_case(logical_name))
    }

    pub fn contains(&self, logical_name: &str) -> bool {
        self.get(logical_name).is_some()
    }

    pub fn entities(&self) -> &[EntitySchema] {
        &self.entities
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        for entity in &self.entities {
            entity.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicate_entity_case_insensitive() {
        let mut schema = Schema::new();
        let mut account = EntitySchema::new("account");
        account
            .fields
            .push(FieldSchema::new("accountid", DataType::Id));
        schema.insert(account.clone()).unwrap();

        let mut dup = EntitySchema::new("Account");
        dup.fields.push(FieldSchema::new("accountid", DataType::Id));
        assert!(matches!(
            schema.insert(dup),
            Err(SchemaError::DuplicateEntity(_))
        ));
    }

    #[test]
    fn validate_requires_primary_key_field() {
        let account = EntitySchema::new("account");
        assert!(matches!(
            account.validate(),
            Err(SchemaError::MissingPrimaryKeyField(_, _))
        ));
    }
}
