use serde::{Deserialize, Serialize};
use std::fmt;

/// The declared type of a schema field. Distinct from [`crate::value::Value`]
/// because a field can be typed in the schema before any record carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    String,
    Int32,
    Int64,
    Decimal,
    Float,
    Boolean,
    Timestamp,
    Id,
    /// Lookup to another entity; the target entity name(s) live on the
    /// owning [`crate::schema::FieldSchema::lookup_targets`].
    Lookup,
    OptionSet,
    Money,
    Null,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::Decimal => "decimal",
            DataType::Float => "float",
            DataType::Boolean => "boolean",
            DataType::Timestamp => "timestamp",
            DataType::Id => "id",
            DataType::Lookup => "lookup",
            DataType::OptionSet => "optionset",
            DataType::Money => "money",
            DataType::Null => "null",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "string" => Ok(DataType::String),
            "int32" => Ok(DataType::Int32),
            "int64" => Ok(DataType::Int64),
            "decimal" => Ok(DataType::Decimal),
            "float" => Ok(DataType::Float),
            "boolean" => Ok(DataType::Boolean),
            "timestamp" => Ok(DataType::Timestamp),
            "id" => Ok(DataType::Id),
            "lookup" => Ok(DataType::Lookup),
            "optionset" => Ok(DataType::OptionSet),
            "money" => Ok(DataType::Money),
            "null" => Ok(DataType::Null),
            other => Err(format!("unknown data type: {other}")),
        }
    }
}
