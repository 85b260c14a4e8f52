//! Query construction: everything between the raw parameter set and a
//! finished SQL string.
//!
//! Submodules:
//! - `classify`: picks the geographic scope from the parameter set.
//! - `resolve`: decides between an inline analysis and a bulk download.
//! - `bind`: typed placeholder values and their SQL rendering.
//! - `render`: fills a data source's template for one request.

pub mod bind;
pub mod classify;
pub mod render;
pub mod resolve;

pub use classify::classify;
pub use render::render;
pub use resolve::{resolve_query_type, TypeResolution};
