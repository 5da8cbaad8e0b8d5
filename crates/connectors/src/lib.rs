pub mod client;
pub mod csv;
pub mod error;
pub mod source;

pub use client::{BatchOutcome, Client, ExecuteOutcome, RowResult};
pub use error::{FileError, PoolError, RemoteError, RemoteErrorKind, SourceError};
pub use source::{ClientFactory, ConnectionSource, Lease, DEFAULT_MAX_CONCURRENT};
