//! Forest-change query engine.
//!
//! Turns a request for forest-change statistics (a data source plus a
//! geographic filter and a date window) into parameterized spatial SQL,
//! runs it against a CartoDB SQL endpoint, and returns either an
//! aggregate summary or a redirect to a bulk export.

pub mod config;
pub mod engine;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod query;
pub mod sources;
pub mod verify;

pub use config::ServiceConfig;
pub use engine::{Action, ForestChangeEngine};
pub use ingest::{CartoDbClient, SqlStore, StoreResponse};
pub use model::{ForestChangeError, RequestParams, Scope};
pub use normalize::NormalizedResponse;
pub use sources::DataSourceId;
