//! Builds a [`model::Schema`] from live metadata descriptions, applying the
//! field-include/exclude policy (spec §4.5). The metadata provider is
//! abstracted behind [`MetadataSource`] since the core has no business
//! talking to a live remote — that capability is supplied by the caller,
//! matching the "given identity + environment, return X" pattern used for
//! [`connectors::ClientFactory`].

use model::{EntitySchema, FieldSchema, RelationshipSchema, Schema, SchemaError};

/// One attribute as the remote metadata service reports it, before policy
/// is applied.
#[derive(Debug, Clone)]
pub struct AttributeMetadata {
    pub logical_name: String,
    pub display_name: String,
    pub data_type: model::DataType,
    pub is_primary_key: bool,
    pub is_custom: bool,
    pub is_valid_for_create: bool,
    pub is_valid_for_update: bool,
    pub is_valid_for_read: bool,
    pub is_virtual_image: bool,
    pub is_virtual_multiselect: bool,
    pub is_virtual_other: bool,
    pub is_audit_field: bool,
    pub is_bpf_field: bool,
    pub lookup_targets: Vec<String>,
    pub max_length: Option<u32>,
    pub precision: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct RelationshipMetadata {
    pub name: String,
    pub related_entity: String,
    pub intersect_entity: Option<String>,
    pub target_id_field: String,
}

#[derive(Debug, Clone)]
pub struct EntityMetadata {
    pub logical_name: String,
    pub display_name: String,
    pub is_custom_entity: bool,
    pub object_type_code: Option<i32>,
    pub primary_id_field: String,
    pub primary_name_field: String,
    pub attributes: Vec<AttributeMetadata>,
    pub relationships: Vec<RelationshipMetadata>,
}

#[derive(Debug, Clone)]
pub struct EntitySummary {
    pub logical_name: String,
    pub display_name: String,
    pub is_custom_entity: bool,
}

/// Supplies raw metadata. Implemented by the adapter that owns the actual
/// remote call; this crate only consumes it.
pub trait MetadataSource {
    fn list_entities(&self) -> Vec<EntitySummary>;
    fn entity_metadata(&self, logical_name: &str) -> Option<EntityMetadata>;
}

/// Options accepted by [`Generator::generate`] (spec §4.5).
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub include_audit_fields: bool,
    pub include_attributes: Option<Vec<String>>,
    pub exclude_attributes: Option<Vec<String>>,
    pub exclude_attribute_patterns: Option<Vec<String>>,
    pub disable_plugins_by_default: bool,
}

/// Why a field was included, surfaced for diagnostics and the round-trip
/// test in spec §8.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeReason {
    PrimaryKey,
    Custom,
    Image,
    MultiSelectPicklist,
    BusinessProcessFlow,
    Audit,
    Customizable,
    Explicit,
}

pub struct Generator<'a> {
    source: &'a dyn MetadataSource,
}

impl<'a> Generator<'a> {
    pub fn new(source: &'a dyn MetadataSource) -> Self {
        Self { source }
    }

    pub fn list_entities(&self) -> Vec<EntitySummary> {
        self.source.list_entities()
    }

    pub fn generate(&self, entity_names: &[String], options: &GenerateOptions) -> Result<Schema, SchemaError> {
        let mut schema = Schema::new();
        for name in entity_names {
            let Some(meta) = self.source.entity_metadata(name) else {
                continue;
            };
            schema.insert(self.build_entity(&meta, options))?;
        }
        Ok(schema)
    }

    fn build_entity(&self, meta: &EntityMetadata, options: &GenerateOptions) -> EntitySchema {
        let fields = meta
            .attributes
            .iter()
            .filter_map(|attr| self.decide(attr, options).map(|_| self.to_field_schema(attr)))
            .collect();

        EntitySchema {
            logical_name: meta.logical_name.clone(),
            display_name: meta.display_name.clone(),
            primary_id_field: meta.primary_id_field.clone(),
            primary_name_field: meta.primary_name_field.clone(),
            fields,
            relationships: meta
                .relationships
                .iter()
                .map(|r| RelationshipSchema {
                    name: r.name.clone(),
                    related_entity: r.related_entity.clone(),
                    intersect_entity: r.intersect_entity.clone(),
                    target_id_field: r.target_id_field.clone(),
                })
                .collect(),
            disable_plugins_default: options.disable_plugins_by_default,
            fetch_filter: None,
            object_type_code: meta.object_type_code,
        }
    }

    /// Applies the field-include policy table from spec §4.5. Returns
    /// `None` when the field is excluded.
    fn decide(&self, attr: &AttributeMetadata, options: &GenerateOptions) -> Option<IncludeReason> {
        if !attr.is_valid_for_read {
            return None;
        }
        if !attr.is_primary_key && !(attr.is_valid_for_create && attr.is_valid_for_update) {
            return None;
        }

        let explicit_include = options
            .include_attributes
            .as_ref()
            .is_some_and(|list| list.iter().any(|n| n.eq_ignore_ascii_case(&attr.logical_name)));
        if explicit_include {
            return Some(IncludeReason::Explicit);
        }

        let explicit_exclude = options
            .exclude_attributes
            .as_ref()
            .is_some_and(|list| list.iter().any(|n| n.eq_ignore_ascii_case(&attr.logical_name)))
            || options.exclude_attribute_patterns.as_ref().is_some_and(|patterns| {
                patterns.iter().any(|p| glob_match(p, &attr.logical_name))
            });
        if explicit_exclude {
            return None;
        }

        if attr.is_primary_key {
            return Some(IncludeReason::PrimaryKey);
        }
        if attr.is_custom {
            return Some(IncludeReason::Custom);
        }
        if attr.is_virtual_image {
            return Some(IncludeReason::Image);
        }
        if attr.is_virtual_multiselect {
            return Some(IncludeReason::MultiSelectPicklist);
        }
        if attr.is_virtual_other {
            return None;
        }
        if attr.is_bpf_field {
            return Some(IncludeReason::BusinessProcessFlow);
        }
        if attr.is_audit_field {
            return if options.include_audit_fields {
                Some(IncludeReason::Audit)
            } else {
                None
            };
        }
        // "customizable (system)" catch-all: anything not virtual/audit/BPF
        // that survived the read/create/update gate above.
        Some(IncludeReason::Customizable)
    }

    fn to_field_schema(&self, attr: &AttributeMetadata) -> FieldSchema {
        FieldSchema {
            name: attr.logical_name.clone(),
            display_name: attr.display_name.clone(),
            data_type: attr.data_type,
            valid_for_create: attr.is_valid_for_create,
            valid_for_update: attr.is_valid_for_update,
            lookup_targets: attr.lookup_targets.clone(),
            is_primary_key: attr.is_primary_key,
            custom_field: attr.is_custom,
            max_length: attr.max_length,
            precision: attr.precision,
        }
    }
}

/// Minimal glob matcher supporting a single trailing or leading `*`,
/// sufficient for the `excludeAttributePatterns` use case (e.g. `new_*`).
fn glob_match(pattern: &str, value: &str) -> bool {
    let value = value.to_ascii_lowercase();
    let pattern = pattern.to_ascii_lowercase();
    if let Some(prefix) = pattern.strip_suffix('*') {
        return value.starts_with(prefix);
    }
    if let Some(suffix) = pattern.strip_prefix('*') {
        return value.ends_with(suffix);
    }
    value == pattern
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::DataType;

    fn attr(name: &str) -> AttributeMetadata {
        AttributeMetadata {
            logical_name: name.to_string(),
            display_name: name.to_string(),
            data_type: DataType::String,
            is_primary_key: false,
            is_custom: false,
            is_valid_for_create: true,
            is_valid_for_update: true,
            is_valid_for_read: true,
            is_virtual_image: false,
            is_virtual_multiselect: false,
            is_virtual_other: false,
            is_audit_field: false,
            is_bpf_field: false,
            lookup_targets: Vec::new(),
            max_length: None,
            precision: None,
        }
    }

    struct FixedSource(EntityMetadata);

    impl MetadataSource for FixedSource {
        fn list_entities(&self) -> Vec<EntitySummary> {
            vec![EntitySummary {
                logical_name: self.0.logical_name.clone(),
                display_name: self.0.display_name.clone(),
                is_custom_entity: self.0.is_custom_entity,
            }]
        }

        fn entity_metadata(&self, logical_name: &str) -> Option<EntityMetadata> {
            if logical_name.eq_ignore_ascii_case(&self.0.logical_name) {
                Some(self.0.clone())
            } else {
                None
            }
        }
    }

    #[test]
    fn audit_fields_excluded_by_default() {
        let mut created_on = attr("createdon");
        created_on.is_audit_field = true;
        let meta = EntityMetadata {
            logical_name: "account".into(),
            display_name: "Account".into(),
            is_custom_entity: false,
            object_type_code: None,
            primary_id_field: "accountid".into(),
            primary_name_field: "name".into(),
            attributes: vec![created_on],
            relationships: vec![],
        };
        let source = FixedSource(meta);
        let gen = Generator::new(&source);
        let schema = gen
            .generate(&["account".to_string()], &GenerateOptions::default())
            .unwrap();
        assert!(schema.get("account").unwrap().fields.is_empty());
    }

    #[test]
    fn explicit_include_overrides_exclude_pattern() {
        let field = attr("new_customfield");
        let meta = EntityMetadata {
            logical_name: "account".into(),
            display_name: "Account".into(),
            is_custom_entity: false,
            object_type_code: None,
            primary_id_field: "accountid".into(),
            primary_name_field: "name".into(),
            attributes: vec![field],
            relationships: vec![],
        };
        let source = FixedSource(meta);
        let gen = Generator::new(&source);
        let options = GenerateOptions {
            include_attributes: Some(vec!["new_customfield".to_string()]),
            exclude_attribute_patterns: Some(vec!["new_*".to_string()]),
            ..Default::default()
        };
        let schema = gen.generate(&["account".to_string()], &options).unwrap();
        assert_eq!(schema.get("account").unwrap().fields.len(), 1);
    }
}
