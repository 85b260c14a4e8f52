//! Data source registry for the forest-change query engine.
//!
//! Defines every forest-change alert dataset the engine can query, along
//! with its descriptive metadata, its query template for each geographic
//! scope, and the rules for shaping downloads and normalizing results.
//! This is the single source of truth for templates: all other modules
//! look sources up here rather than holding SQL of their own.
//!
//! The registry is static, built at compile time and never mutated, so it
//! is shared freely between concurrently handled requests.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::model::{ForestChangeError, RequestParams, Scope};
use crate::query::bind::split_ifl_id1;

pub mod fires;
pub mod forma;
pub mod imazon;
pub mod terrai;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataSourceId {
    Forma,
    Imazon,
    TerraI,
    Fires,
}

impl DataSourceId {
    pub const ALL: [DataSourceId; 4] = [
        DataSourceId::Forma,
        DataSourceId::Imazon,
        DataSourceId::TerraI,
        DataSourceId::Fires,
    ];

    /// Stable identifier used in URLs and responses.
    pub fn slug(&self) -> &'static str {
        match self {
            DataSourceId::Forma => "forma-alerts",
            DataSourceId::Imazon => "imazon-alerts",
            DataSourceId::TerraI => "terrai-alerts",
            DataSourceId::Fires => "nasa-active-fires",
        }
    }
}

impl fmt::Display for DataSourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for DataSourceId {
    type Err = ForestChangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataSourceId::ALL
            .into_iter()
            .find(|id| id.slug() == s)
            .ok_or_else(|| ForestChangeError::InvalidParameter {
                key: "dataset".to_string(),
                reason: format!("unknown data source '{}'", s),
            })
    }
}

// ---------------------------------------------------------------------------
// Source definition
// ---------------------------------------------------------------------------

/// Descriptive metadata merged into every successful response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub description: &'static str,
    pub resolution: &'static str,
    pub coverage: &'static str,
    pub timescale: &'static str,
    pub updates: &'static str,
    pub source: &'static str,
    pub units: &'static str,
    pub name: &'static str,
    pub id: &'static str,
}

/// The query text a source uses for one scope.
#[derive(Debug, Clone, Copy)]
pub struct ScopeTemplate {
    pub scope: Scope,
    pub analysis: &'static str,
    /// Explicit download text; `None` derives it from `analysis` through
    /// the source's `DownloadStrategy`.
    pub download: Option<&'static str>,
}

/// How a source obtains its download-shaped query text.
#[derive(Debug, Clone, Copy)]
pub enum DownloadStrategy {
    /// Every scope template carries its own download text.
    Templates,
    /// Download text is the cleaned analysis text with these literal
    /// replacements applied, in order.
    Rewrite(&'static [(&'static str, &'static str)]),
}

/// Geography a source has data for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coverage {
    Global,
    /// Data exists only inside one country (lowercase ISO3 code).
    Country(&'static str),
}

impl Coverage {
    /// True when the request names a country outside this coverage.
    ///
    /// Scopes that do not name a country (world polygons, protected areas,
    /// concessions) are resolved spatially by the store and never excluded.
    pub fn excludes(&self, scope: Scope, params: &RequestParams) -> bool {
        let Coverage::Country(covered) = self else {
            return false;
        };
        let named = match scope {
            Scope::Iso | Scope::Id1 => params.get("iso"),
            Scope::Ifl => params.get("ifl"),
            Scope::Pa => params.get("pa"),
            Scope::IflId1 => params
                .get("ifl_id1")
                .and_then(|raw| split_ifl_id1(raw).ok())
                .map(|(iso, _)| iso),
            Scope::World | Scope::Wdpa | Scope::Use => None,
        };
        named.is_some_and(|iso| !iso.trim().eq_ignore_ascii_case(covered))
    }
}

/// Neutral value reported when the store returns no rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroRowDefault {
    Zero,
    Null,
}

/// The shape of a source's result rows.
#[derive(Debug, Clone, Copy)]
pub enum Normalization {
    /// One aggregate row with a `value` column.
    SingleValue { default: ZeroRowDefault },
    /// One row per category, keyed by a `data_type` column.
    Categories { categories: &'static [&'static str] },
}

/// One forest-change alert dataset.
#[derive(Debug)]
pub struct DataSource {
    pub id: DataSourceId,
    pub meta: Metadata,
    pub templates: &'static [ScopeTemplate],
    pub download: DownloadStrategy,
    /// Table alias qualifying `the_geom` in download queries.
    pub geometry_alias: Option<&'static str>,
    /// Extra select-list fragment for analysis queries only.
    pub additional_select: &'static str,
    pub coverage: Coverage,
    pub normalization: Normalization,
}

impl DataSource {
    pub fn template_for(&self, scope: Scope) -> Option<&ScopeTemplate> {
        self.templates.iter().find(|t| t.scope == scope)
    }

    pub fn supports(&self, scope: Scope) -> bool {
        self.template_for(scope).is_some()
    }

    pub fn scopes(&self) -> Vec<Scope> {
        self.templates.iter().map(|t| t.scope).collect()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// All data sources served by the engine.
pub static DATA_SOURCES: &[DataSource] = &[forma::FORMA, imazon::IMAZON, terrai::TERRAI, fires::FIRES];

/// Looks up a source by id. Returns `None` if it is not registered.
pub fn find_source(id: DataSourceId) -> Option<&'static DataSource> {
    DATA_SOURCES.iter().find(|s| s.id == id)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
