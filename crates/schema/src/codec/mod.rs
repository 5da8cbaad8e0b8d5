pub mod data_xml;
pub mod schema_xml;

pub use data_xml::{read_data, write_data};
pub use schema_xml::{read_schema, write_schema};
