pub mod loader;
pub mod mapping;

pub use loader::{into_batches, CsvLoader, LookupResolver, StaticLookupResolver};
pub use mapping::{ColumnMapping, ColumnMappingStatus, CsvMapping};
