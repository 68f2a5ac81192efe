// In src/lib.rs
pub mod client;
pub mod constants;
pub mod decode;
pub mod decode_helpers;
pub mod epics;
pub mod error;
pub mod functions;
pub mod live;
pub mod operators;
pub mod query;
pub mod types;
pub mod values;

pub use client::ArchiverClient;
pub use error::{ArchiverError, Result};
pub use query::{execute_queries, execute_query, QueryModel, QueryResult, TargetFetcher};
pub use types::{Config, DataFormat, FieldName, FormatOption, TimeRange};
pub use values::{SingleData, Values};
