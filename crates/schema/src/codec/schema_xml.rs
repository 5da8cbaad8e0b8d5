//! Reads and writes `data_schema.xml` / `schema.xml` (spec §6.1). The
//! writer is strict and deterministic in attribute order; the reader is
//! lenient, filling documented defaults for attributes the writer always
//! emits but older archives might omit. Event-loop style follows
//! `bpmn-lite-core::compiler::parser::parse_bpmn` (`adamtc007-ob-poc`),
//! the pack's only `quick-xml` user.

use crate::error::CodecError;
use model::{DataType, EntitySchema, FieldSchema, RelationshipSchema, Schema};
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use std::io::Write;
use std::str::FromStr;

pub fn write_schema<W: Write>(schema: &Schema, out: W) -> Result<(), CodecError> {
    let mut writer = Writer::new_with_indent(out, b' ', 2);
    writer.write_event(Event::Start(BytesStart::new("entities")))?;

    for entity in schema.entities() {
        write_entity(&mut writer, entity)?;
    }

    writer.write_event(Event::End(quick_xml::events::BytesEnd::new("entities")))?;
    Ok(())
}

fn write_entity<W: Write>(writer: &mut Writer<W>, entity: &EntitySchema) -> Result<(), CodecError> {
    let mut start = BytesStart::new("entity");
    start.push_attribute(("name", entity.logical_name.as_str()));
    start.push_attribute(("displayname", entity.display_name.as_str()));
    if let Some(etc) = entity.object_type_code {
        start.push_attribute(("etc", etc.to_string().as_str()));
    }
    start.push_attribute(("primaryidfield", entity.primary_id_field.as_str()));
    start.push_attribute(("primarynamefield", entity.primary_name_field.as_str()));
    start.push_attribute(("disableplugins", bool_str(entity.disable_plugins_default)));
    writer.write_event(Event::Start(start))?;

    writer.write_event(Event::Start(BytesStart::new("fields")))?;
    for field in &entity.fields {
        write_field(writer, field)?;
    }
    writer.write_event(Event::End(quick_xml::events::BytesEnd::new("fields")))?;

    if !entity.relationships.is_empty() {
        writer.write_event(Event::Start(BytesStart::new("relationships")))?;
        for rel in &entity.relationships {
            write_relationship(writer, rel)?;
        }
        writer.write_event(Event::End(quick_xml::events::BytesEnd::new("relationships")))?;
    }

    if let Some(filter) = &entity.fetch_filter {
        writer.write_event(Event::Start(BytesStart::new("filter")))?;
        writer.write_event(Event::Text(BytesText::new(filter)))?;
        writer.write_event(Event::End(quick_xml::events::BytesEnd::new("filter")))?;
    }

    writer.write_event(Event::End(quick_xml::events::BytesEnd::new("entity")))?;
    Ok(())
}

fn write_field<W: Write>(writer: &mut Writer<W>, field: &FieldSchema) -> Result<(), CodecError> {
    let mut start = BytesStart::new("field");
    start.push_attribute(("name", field.name.as_str()));
    start.push_attribute(("displayname", field.display_name.as_str()));
    start.push_attribute(("type", field.data_type.as_str()));
    if field.is_lookup() {
        start.push_attribute(("lookupType", field.lookup_targets.join("|").as_str()));
    }
    if field.is_primary_key {
        start.push_attribute(("primaryKey", "true"));
    }
    start.push_attribute(("isValidForCreate", bool_str(field.valid_for_create)));
    start.push_attribute(("isValidForUpdate", bool_str(field.valid_for_update)));
    if field.custom_field {
        start.push_attribute(("customfield", "true"));
    }
    if let Some(len) = field.max_length {
        start.push_attribute(("maxlength", len.to_string().as_str()));
    }
    if let Some(precision) = field.precision {
        start.push_attribute(("precision", precision.to_string().as_str()));
    }
    writer.write_event(Event::Empty(start))?;
    Ok(())
}

fn write_relationship<W: Write>(writer: &mut Writer<W>, rel: &RelationshipSchema) -> Result<(), CodecError> {
    let mut start = BytesStart::new("relationship");
    start.push_attribute(("name", rel.name.as_str()));
    start.push_attribute(("manyToMany", "true"));
    start.push_attribute(("relatedEntityName", rel.related_entity.as_str()));
    if let Some(intersect) = &rel.intersect_entity {
        start.push_attribute(("intersectEntityName", intersect.as_str()));
    }
    start.push_attribute(("m2mTargetEntityPrimaryKey", rel.target_id_field.as_str()));
    writer.write_event(Event::Empty(start))?;
    Ok(())
}

fn bool_str(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

struct EntityBuilder {
    logical_name: String,
    display_name: String,
    object_type_code: Option<i32>,
    primary_id_field: String,
    primary_name_field: String,
    disable_plugins_default: bool,
    fields: Vec<FieldSchema>,
    relationships: Vec<RelationshipSchema>,
    fetch_filter: Option<String>,
}

pub fn read_schema(xml: &str) -> Result<Schema, CodecError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut schema = Schema::new();
    let mut current: Option<EntityBuilder> = None;
    let mut in_filter = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match name.as_str() {
                    "entity" => current = Some(read_entity_start(&e)?),
                    "field" => {
                        if let Some(builder) = current.as_mut() {
                            builder.fields.push(read_field(&e)?);
                        }
                    }
                    "relationship" => {
                        if let Some(builder) = current.as_mut() {
                            builder.relationships.push(read_relationship(&e)?);
                        }
                    }
                    "filter" => in_filter = true,
                    _ => {}
                }
            }
            Event::Text(e) => {
                if in_filter {
                    if let Some(builder) = current.as_mut() {
                        builder.fetch_filter = Some(e.unescape()?.into_owned());
                    }
                }
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match name.as_str() {
                    "filter" => in_filter = false,
                    "entity" => {
                        if let Some(builder) = current.take() {
                            schema
                                .insert(EntitySchema {
                                    logical_name: builder.logical_name,
                                    display_name: builder.display_name,
                                    primary_id_field: builder.primary_id_field,
                                    primary_name_field: builder.primary_name_field,
                                    fields: builder.fields,
                                    relationships: builder.relationships,
                                    disable_plugins_default: builder.disable_plugins_default,
                                    fetch_filter: builder.fetch_filter,
                                    object_type_code: builder.object_type_code,
                                })
                                .map_err(|e| CodecError::MalformedValue {
                                    field: "entity".to_string(),
                                    message: e.to_string(),
                                })?;
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(schema)
}

fn attr_value(e: &BytesStart, name: &str) -> Result<Option<String>, CodecError> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == name.as_bytes() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn read_entity_start(e: &BytesStart) -> Result<EntityBuilder, CodecError> {
    let logical_name = attr_value(e, "name")?.ok_or(CodecError::MissingAttribute("name"))?;
    let display_name = attr_value(e, "displayname")?.unwrap_or_else(|| logical_name.clone());
    let object_type_code = attr_value(e, "etc")?.and_then(|v| v.parse().ok());
    let primary_id_field = attr_value(e, "primaryidfield")?.unwrap_or_else(|| format!("{logical_name}id"));
    let primary_name_field = attr_value(e, "primarynamefield")?.unwrap_or_else(|| "name".to_string());
    let disable_plugins_default = attr_value(e, "disableplugins")?
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);

    Ok(EntityBuilder {
        logical_name,
        display_name,
        object_type_code,
        primary_id_field,
        primary_name_field,
        disable_plugins_default,
        fields: Vec::new(),
        relationships: Vec::new(),
        fetch_filter: None,
    })
}

fn read_field(e: &BytesStart) -> Result<FieldSchema, CodecError> {
    let name = attr_value(e, "name")?.ok_or(CodecError::MissingAttribute("name"))?;
    let display_name = attr_value(e, "displayname")?.unwrap_or_else(|| name.clone());
    let type_str = attr_value(e, "type")?.unwrap_or_else(|| "string".to_string());
    let data_type = DataType::from_str(&type_str).map_err(|_| CodecError::UnknownDataType(type_str, name.clone()))?;
    let lookup_targets = attr_value(e, "lookupType")?
        .map(|v| v.split('|').map(str::to_string).collect())
        .unwrap_or_default();
    let is_primary_key = attr_value(e, "primaryKey")?.map(|v| v == "true").unwrap_or(false);
    let valid_for_create = attr_value(e, "isValidForCreate")?.map(|v| v == "true").unwrap_or(true);
    let valid_for_update = attr_value(e, "isValidForUpdate")?.map(|v| v == "true").unwrap_or(true);
    let custom_field = attr_value(e, "customfield")?.map(|v| v == "true").unwrap_or(false);
    let max_length = attr_value(e, "maxlength")?.and_then(|v| v.parse().ok());
    let precision = attr_value(e, "precision")?.and_then(|v| v.parse().ok());

    Ok(FieldSchema {
        name,
        display_name,
        data_type,
        valid_for_create,
        valid_for_update,
        lookup_targets,
        is_primary_key,
        custom_field,
        max_length,
        precision,
    })
}

fn read_relationship(e: &BytesStart) -> Result<RelationshipSchema, CodecError> {
    let name = attr_value(e, "name")?.ok_or(CodecError::MissingAttribute("name"))?;
    let related_entity = attr_value(e, "relatedEntityName")?.unwrap_or_default();
    let intersect_entity = attr_value(e, "intersectEntityName")?;
    let target_id_field = attr_value(e, "m2mTargetEntityPrimaryKey")?.unwrap_or_else(|| format!("{related_entity}id"));

    Ok(RelationshipSchema {
        name,
        related_entity,
        intersect_entity,
        target_id_field,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::EntitySchema;

    fn sample_schema() -> Schema {
        let mut schema = Schema::new();
        let mut account = EntitySchema::new("account");
        let mut id_field = FieldSchema::new("accountid", DataType::Id);
        id_field.is_primary_key = true;
        account.fields.push(id_field);
        account.fields.push(FieldSchema::new("name", DataType::String));
        schema.insert(account).unwrap();
        schema
    }

    #[test]
    fn round_trips_minimal_schema() {
        let schema = sample_schema();
        let mut buf = Vec::new();
        write_schema(&schema, &mut buf).unwrap();
        let xml = String::from_utf8(buf).unwrap();
        let read_back = read_schema(&xml).unwrap();
        assert_eq!(read_back.entities().len(), 1);
        assert_eq!(read_back.get("account").unwrap().fields.len(), 2);
    }

    #[test]
    fn reader_defaults_missing_optional_attributes() {
        let xml = r#"<entities><entity name="account"><fields><field name="accountid" type="id"/></fields></entity></entities>"#;
        let schema = read_schema(xml).unwrap();
        let account = schema.get("account").unwrap();
        assert_eq!(account.primary_id_field, "accountid");
        assert_eq!(account.primary_name_field, "name");
        assert!(!account.disable_plugins_default);
    }
}
