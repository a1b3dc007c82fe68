//! Core domain types shared by the query node metadata catalog.

pub mod config;
pub mod error;
pub mod ids;
pub mod logging;
pub mod schema;

pub use config::{CatalogConfig, LoggingConfig, QueryNodeConfig};
pub use error::{CoreError, CoreResult};
pub use ids::{CollectionId, SegmentId, Timestamp};
pub use logging::init_logging;
pub use schema::{CollectionMeta, CollectionSchema, DataType, FieldSchema, KeyValuePair};
