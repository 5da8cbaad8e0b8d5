pub mod codec;
pub mod error;
pub mod generator;

pub use codec::{read_data, read_schema, write_data, write_schema};
pub use error::CodecError;
pub use generator::{
    AttributeMetadata, EntityMetadata, EntitySummary, GenerateOptions, Generator, IncludeReason,
    MetadataSource, RelationshipMetadata,
};
