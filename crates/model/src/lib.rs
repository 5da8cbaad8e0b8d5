pub mod association;
pub mod batch;
pub mod data_type;
pub mod migration_data;
pub mod progress;
pub mod record;
pub mod result;
pub mod schema;
pub mod value;

pub use association::ManyToManyAssociation;
pub use batch::{Batch, BatchItem, Operation, RowRef};
pub use data_type::DataType;
pub use migration_data::{DeferredFieldSpec, MigrationData, TierPlan};
pub use progress::{Phase, ProgressEvent};
pub use record::Record;
pub use result::{ErrorCode, MigrationResult, RowError};
pub use schema::{EntitySchema, FieldSchema, RelationshipSchema, Schema, SchemaError};
pub use value::{EntityReference, FieldValue, Value};
