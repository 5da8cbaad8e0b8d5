//! Reads and writes `data.xml` (spec §6.1): per-entity record lists plus
//! many-to-many association sets. Timestamps use RFC 3339 with 7
//! fractional digits; booleans serialize as `"1"`/`"0"`; decimals use
//! invariant (dot) formatting — all handled by [`model::Value`]'s own
//! `Display`/parsing except where the wire format diverges (booleans,
//! option sets), which this module converts explicitly.

use crate::error::CodecError;
use bigdecimal::BigDecimal;
use chrono::{DateTime, SecondsFormat, Utc};
use model::{DataType, EntityReference, ManyToManyAssociation, MigrationData, Record, Schema, Value};
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use std::io::Write;
use std::str::FromStr;
use uuid::Uuid;

pub fn write_data<W: Write>(data: &MigrationData, out: W) -> Result<(), CodecError> {
    let mut writer = Writer::new_with_indent(out, b' ', 2);

    let mut entities_start = BytesStart::new("entities");
    entities_start.push_attribute(("timestamp", format_timestamp(&data.exported_at).as_str()));
    writer.write_event(Event::Start(entities_start))?;

    let mut entity_names: Vec<&String> = data.entity_records.keys().collect();
    entity_names.sort();
    for entity in entity_names {
        let records = &data.entity_records[entity];
        let mut entity_start = BytesStart::new("entity");
        entity_start.push_attribute(("name", entity.as_str()));
        writer.write_event(Event::Start(entity_start))?;

        writer.write_event(Event::Start(BytesStart::new("records")))?;
        for record in records {
            write_record(&mut writer, record)?;
        }
        writer.write_event(Event::End(quick_xml::events::BytesEnd::new("records")))?;

        if let Some(assocs) = data.associations.get(entity) {
            writer.write_event(Event::Start(BytesStart::new("m2mrelationships")))?;
            for assoc in assocs {
                write_association(&mut writer, assoc)?;
            }
            writer.write_event(Event::End(quick_xml::events::BytesEnd::new("m2mrelationships")))?;
        }

        writer.write_event(Event::End(quick_xml::events::BytesEnd::new("entity")))?;
    }

    writer.write_event(Event::End(quick_xml::events::BytesEnd::new("entities")))?;
    Ok(())
}

fn write_record<W: Write>(writer: &mut Writer<W>, record: &Record) -> Result<(), CodecError> {
    let mut start = BytesStart::new("record");
    start.push_attribute(("id", record.id.to_string().as_str()));
    writer.write_event(Event::Start(start))?;

    for (name, value) in record.fields() {
        write_field_value(writer, name, value)?;
    }

    writer.write_event(Event::End(quick_xml::events::BytesEnd::new("record")))?;
    Ok(())
}

fn write_field_value<W: Write>(writer: &mut Writer<W>, name: &str, value: &Value) -> Result<(), CodecError> {
    if value.is_null() {
        return Ok(());
    }
    let mut start = BytesStart::new("field");
    start.push_attribute(("name", name));

    let wire_value = match value {
        Value::Boolean(b) => if *b { "1".to_string() } else { "0".to_string() },
        Value::Reference(r) => r.id.to_string(),
        other => other.to_string(),
    };
    start.push_attribute(("value", wire_value.as_str()));
    start.push_attribute(("type", value.data_type().as_str()));

    if let Value::Reference(r) = value {
        start.push_attribute(("lookupentity", r.entity.as_str()));
        if let Some(display_name) = &r.display_name {
            start.push_attribute(("lookupentityname", display_name.as_str()));
        }
    }

    writer.write_event(Event::Empty(start))?;
    Ok(())
}

fn write_association<W: Write>(writer: &mut Writer<W>, assoc: &ManyToManyAssociation) -> Result<(), CodecError> {
    let mut start = BytesStart::new("m2mrelationship");
    start.push_attribute(("sourceid", assoc.source_id.to_string().as_str()));
    start.push_attribute(("targetentityname", assoc.target_entity.as_str()));
    start.push_attribute(("targetentitynameidfield", assoc.target_id_field.as_str()));
    start.push_attribute(("m2mrelationshipname", assoc.relationship_name.as_str()));
    writer.write_event(Event::Start(start))?;

    writer.write_event(Event::Start(BytesStart::new("targetids")))?;
    for target_id in assoc.target_ids() {
        writer.write_event(Event::Start(BytesStart::new("targetid")))?;
        writer.write_event(Event::Text(BytesText::new(&target_id.to_string())))?;
        writer.write_event(Event::End(quick_xml::events::BytesEnd::new("targetid")))?;
    }
    writer.write_event(Event::End(quick_xml::events::BytesEnd::new("targetids")))?;

    writer.write_event(Event::End(quick_xml::events::BytesEnd::new("m2mrelationship")))?;
    Ok(())
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

struct RecordFrame {
    record: Record,
}

struct AssociationFrame {
    assoc: ManyToManyAssociation,
}

/// Reads `data.xml` against an already-known [`Schema`] (needed to resolve
/// each field's declared type, since the wire format repeats it per-field
/// but a lenient reader should fall back to the schema when absent).
pub fn read_data(xml: &str, schema: &Schema) -> Result<MigrationData, CodecError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut data = MigrationData::new(schema.clone());
    let mut current_entity: Option<String> = None;
    let mut current_record: Option<RecordFrame> = None;
    let mut current_assoc: Option<AssociationFrame> = None;
    let mut in_target_id = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match name.as_str() {
                    "entities" => {
                        if let Some(ts) = attr_value(&e, "timestamp")? {
                            if let Ok(parsed) = DateTime::parse_from_rfc3339(&ts) {
                                data.exported_at = parsed.with_timezone(&Utc);
                            }
                        }
                    }
                    "entity" => {
                        let entity_name = attr_value(&e, "name")?.ok_or(CodecError::MissingAttribute("name"))?;
                        data.entity_records.entry(entity_name.clone()).or_default();
                        current_entity = Some(entity_name);
                    }
                    "record" => {
                        let id_str = attr_value(&e, "id")?.unwrap_or_default();
                        let id = Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::new_v4());
                        let entity = current_entity.clone().unwrap_or_default();
                        current_record = Some(RecordFrame {
                            record: Record::new(entity, id),
                        });
                    }
                    "field" => {
                        if let Some(frame) = current_record.as_mut() {
                            let field_name = attr_value(&e, "name")?.ok_or(CodecError::MissingAttribute("name"))?;
                            let raw_value = attr_value(&e, "value")?.unwrap_or_default();
                            let type_str = attr_value(&e, "type")?;
                            let lookup_entity = attr_value(&e, "lookupentity")?;
                            let lookup_display = attr_value(&e, "lookupentityname")?;
                            let value = parse_field_value(
                                &field_name,
                                &raw_value,
                                type_str.as_deref(),
                                lookup_entity,
                                lookup_display,
                            )?;
                            frame.record.set(field_name, value);
                        }
                    }
                    "m2mrelationship" => {
                        let source_id_str = attr_value(&e, "sourceid")?.unwrap_or_default();
                        let source_id = Uuid::parse_str(&source_id_str).unwrap_or_else(|_| Uuid::new_v4());
                        let target_entity = attr_value(&e, "targetentityname")?.unwrap_or_default();
                        let target_id_field = attr_value(&e, "targetentitynameidfield")?.unwrap_or_default();
                        let relationship_name = attr_value(&e, "m2mrelationshipname")?.unwrap_or_default();
                        let source_entity = current_entity.clone().unwrap_or_default();
                        current_assoc = Some(AssociationFrame {
                            assoc: ManyToManyAssociation::new(
                                relationship_name,
                                source_entity,
                                source_id,
                                target_entity,
                                target_id_field,
                            ),
                        });
                    }
                    "targetid" => in_target_id = true,
                    _ => {}
                }
            }
            Event::Text(e) => {
                if in_target_id {
                    if let Some(frame) = current_assoc.as_mut() {
                        if let Ok(id) = Uuid::parse_str(e.unescape()?.trim()) {
                            frame.assoc.add_target(id);
                        }
                    }
                }
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match name.as_str() {
                    "targetid" => in_target_id = false,
                    "record" => {
                        if let (Some(frame), Some(entity)) = (current_record.take(), current_entity.as_ref()) {
                            data.entity_records.entry(entity.clone()).or_default().push(frame.record);
                        }
                    }
                    "m2mrelationship" => {
                        if let (Some(frame), Some(entity)) = (current_assoc.take(), current_entity.as_ref()) {
                            data.associations.entry(entity.clone()).or_default().push(frame.assoc);
                        }
                    }
                    "entity" => current_entity = None,
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(data)
}

fn parse_field_value(
    field_name: &str,
    raw: &str,
    type_hint: Option<&str>,
    lookup_entity: Option<String>,
    lookup_display: Option<String>,
) -> Result<Value, CodecError> {
    let data_type = type_hint
        .and_then(|t| DataType::from_str(t).ok())
        .unwrap_or(DataType::String);

    let value = match data_type {
        DataType::String => Value::String(raw.to_string()),
        DataType::Int32 => Value::Int32(parse_or(field_name, raw)?),
        DataType::Int64 => Value::Int64(parse_or(field_name, raw)?),
        DataType::Float => Value::Float(parse_or(field_name, raw)?),
        DataType::Decimal => Value::Decimal(decimal_or(field_name, raw)?),
        DataType::Money => Value::Money(decimal_or(field_name, raw)?),
        DataType::Boolean => Value::Boolean(raw == "1"),
        DataType::Timestamp => Value::Timestamp(
            DateTime::parse_from_rfc3339(raw)
                .map_err(|e| CodecError::MalformedValue {
                    field: field_name.to_string(),
                    message: e.to_string(),
                })?
                .with_timezone(&Utc),
        ),
        DataType::Id => Value::Id(uuid_or(field_name, raw)?),
        DataType::OptionSet => Value::OptionValue(parse_or(field_name, raw)?),
        DataType::Lookup => {
            let id = uuid_or(field_name, raw)?;
            let mut reference = EntityReference::new(lookup_entity.unwrap_or_default(), id);
            if let Some(display_name) = lookup_display {
                reference = reference.with_display_name(display_name);
            }
            Value::Reference(reference)
        }
        DataType::Null => Value::Null,
    };
    Ok(value)
}

fn parse_or<T: FromStr>(field_name: &str, raw: &str) -> Result<T, CodecError> {
    raw.parse().map_err(|_| CodecError::MalformedValue {
        field: field_name.to_string(),
        message: format!("'{raw}' is not a valid number"),
    })
}

fn decimal_or(field_name: &str, raw: &str) -> Result<BigDecimal, CodecError> {
    BigDecimal::from_str(raw).map_err(|e| CodecError::MalformedValue {
        field: field_name.to_string(),
        message: e.to_string(),
    })
}

fn uuid_or(field_name: &str, raw: &str) -> Result<Uuid, CodecError> {
    Uuid::parse_str(raw).map_err(|e| CodecError::MalformedValue {
        field: field_name.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{EntitySchema, Schema};

    fn schema() -> Schema {
        let mut schema = Schema::new();
        schema.insert(EntitySchema::new("account")).unwrap();
        schema
    }

    #[test]
    fn round_trips_records_and_associations() {
        let mut data = MigrationData::new(schema());
        let id = Uuid::new_v4();
        let record = Record::new("account", id).with_field("name", Value::String("Acme".into()));
        data.entity_records.insert("account".to_string(), vec![record]);

        let mut assoc = ManyToManyAssociation::new("account_contacts", "account", id, "contact", "contactid");
        assoc.add_target(Uuid::new_v4());
        data.associations.insert("account".to_string(), vec![assoc]);

        let mut buf = Vec::new();
        write_data(&data, &mut buf).unwrap();
        let xml = String::from_utf8(buf).unwrap();

        let read_back = read_data(&xml, &schema()).unwrap();
        assert_eq!(read_back.entity_records["account"].len(), 1);
        assert_eq!(read_back.entity_records["account"][0].get("name").unwrap().as_str(), Some("Acme"));
        assert_eq!(read_back.associations["account"][0].len(), 1);
    }

    #[test]
    fn boolean_round_trips_as_1_0() {
        let mut data = MigrationData::new(schema());
        let record = Record::new("account", Uuid::new_v4()).with_field("donotemail", Value::Boolean(true));
        data.entity_records.insert("account".to_string(), vec![record]);

        let mut buf = Vec::new();
        write_data(&data, &mut buf).unwrap();
        let xml = String::from_utf8(buf).unwrap();
        assert!(xml.contains(r#"value="1""#));
    }
}
