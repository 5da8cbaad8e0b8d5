use crate::data_type::DataType;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, fmt};
use uuid::Uuid;

/// A reference from one record to another, carried by lookup fields.
///
/// `display_name` is optional metadata the remote sometimes returns
/// alongside the id (e.g. the target record's primary name field); it is
/// never required to resolve the reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EntityReference {
    pub entity: String,
    pub id: Uuid,
    pub display_name: Option<String>,
}

impl EntityReference {
    pub fn new(entity: impl Into<String>, id: Uuid) -> Self {
        Self {
            entity: entity.into(),
            id,
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// A typed field value, per spec §3's closed set of wire-representable types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    String(String),
    Int32(i32),
    Int64(i64),
    Decimal(BigDecimal),
    Float(f64),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
    Id(Uuid),
    Reference(EntityReference),
    OptionValue(i32),
    Money(BigDecimal),
    Null,
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::String(_) => DataType::String,
            Value::Int32(_) => DataType::Int32,
            Value::Int64(_) => DataType::Int64,
            Value::Decimal(_) => DataType::Decimal,
            Value::Float(_) => DataType::Float,
            Value::Boolean(_) => DataType::Boolean,
            Value::Timestamp(_) => DataType::Timestamp,
            Value::Id(_) => DataType::Id,
            Value::Reference(_) => DataType::Lookup,
            Value::OptionValue(_) => DataType::OptionSet,
            Value::Money(_) => DataType::Money,
            Value::Null => DataType::Null,
        }
    }

    pub fn as_reference(&self) -> Option<&EntityReference> {
        match self {
            Value::Reference(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Value::Id(u) => Some(*u),
            Value::Reference(r) => Some(r.id),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Bytes contributing to a value's canonical hash, used for batch
    /// manifest checksums (idempotency bookkeeping for retried batches).
    pub fn canonical_bytes(&self) -> Vec<u8> {
        match self {
            Value::String(s) => s.as_bytes().to_vec(),
            Value::Int32(v) => v.to_le_bytes().to_vec(),
            Value::Int64(v) => v.to_le_bytes().to_vec(),
            Value::Decimal(v) | Value::Money(v) => v.to_string().into_bytes(),
            Value::Float(v) => v.to_bits().to_le_bytes().to_vec(),
            Value::Boolean(v) => vec![*v as u8],
            Value::Timestamp(v) => v.timestamp_nanos_opt().unwrap_or(0).to_le_bytes().to_vec(),
            Value::Id(v) => v.as_bytes().to_vec(),
            Value::Reference(r) => {
                let mut b = r.entity.as_bytes().to_vec();
                b.extend_from_slice(r.id.as_bytes());
                b
            }
            Value::OptionValue(v) => v.to_le_bytes().to_vec(),
            Value::Null => vec![],
        }
    }

    pub fn size_bytes(&self) -> usize {
        match self {
            Value::String(s) => s.len(),
            Value::Int32(_) => 4,
            Value::Int64(_) => 8,
            Value::Decimal(v) | Value::Money(v) => v.to_string().len(),
            Value::Float(_) => 8,
            Value::Boolean(_) => 1,
            Value::Timestamp(_) => 16,
            Value::Id(_) => 16,
            Value::Reference(r) => 16 + r.entity.len(),
            Value::OptionValue(_) => 4,
            Value::Null => 0,
        }
    }

    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        use Value::*;
        match (self, other) {
            (String(a), String(b)) => Some(a.cmp(b)),
            (Int32(a), Int32(b)) => Some(a.cmp(b)),
            (Int64(a), Int64(b)) => Some(a.cmp(b)),
            (Decimal(a), Decimal(b)) | (Money(a), Money(b)) => Some(a.cmp(b)),
            (Float(a), Float(b)) => a.partial_cmp(b),
            (Boolean(a), Boolean(b)) => Some(a.cmp(b)),
            (Timestamp(a), Timestamp(b)) => Some(a.cmp(b)),
            (Id(a), Id(b)) => Some(a.cmp(b)),
            (OptionValue(a), OptionValue(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(v) => write!(f, "{v}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Decimal(v) | Value::Money(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
            Value::Id(v) => write!(f, "{v}"),
            Value::Reference(r) => write!(f, "{}:{}", r.entity, r.id),
            Value::OptionValue(v) => write!(f, "{v}"),
            Value::Null => write!(f, "NULL"),
        }
    }
}

/// A named, typed field on a [`crate::record::Record`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldValue {
    pub name: String,
    pub value: Value,
}

impl FieldValue {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_round_trips_through_display() {
        let id = Uuid::nil();
        let r = EntityReference::new("account", id).with_display_name("Acme");
        let v = Value::Reference(r.clone());
        assert_eq!(v.as_reference(), Some(&r));
        assert_eq!(v.data_type(), DataType::Lookup);
    }

    #[test]
    fn null_has_no_canonical_bytes() {
        assert!(Value::Null.canonical_bytes().is_empty());
    }

    #[test]
    fn decimal_and_money_compare_numerically() {
        let a = Value::Money(BigDecimal::from(100));
        let b = Value::Money(BigDecimal::from(200));
        assert_eq!(a.compare(&b), Some(Ordering::Less));
    }
}
