//! Query rendering.
//!
//! Looks up the template a data source registered for a scope, derives its
//! download-shaped text, and binds both in one pass. Template text is
//! whitespace-collapsed before binding so bound literals (GeoJSON in
//! particular) keep their own spacing.

use crate::config::DateDefaults;
use crate::model::{ExportFormat, ForestChangeError, QuerySpec, RequestParams, Scope};
use crate::query::bind::{Binder, Shape};
use crate::query::resolve::TypeResolution;
use crate::sources::{DataSource, DownloadStrategy, ScopeTemplate};

/// Returns `sql` with runs of whitespace collapsed to single spaces.
pub fn clean(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cleaned download-shaped text for one scope template.
pub fn download_text(source: &DataSource, template: &ScopeTemplate) -> Result<String, ForestChangeError> {
    match (template.download, source.download) {
        (Some(download), _) => Ok(clean(download)),
        (None, DownloadStrategy::Rewrite(rules)) => {
            let mut sql = clean(template.analysis);
            for &(from, to) in rules {
                sql = sql.replace(from, to);
            }
            Ok(sql)
        }
        (None, DownloadStrategy::Templates) => Err(ForestChangeError::RegistryInvalid(vec![format!(
            "{}: no download template for scope {}",
            source.id, template.scope
        )])),
    }
}

/// Renders the analysis and download queries for one request.
///
/// Fails before any network activity when the scope is unsupported or a
/// placeholder cannot be bound.
pub fn render(
    source: &DataSource,
    scope: Scope,
    resolution: &TypeResolution,
    params: &RequestParams,
    defaults: &DateDefaults,
) -> Result<QuerySpec, ForestChangeError> {
    let template = source.template_for(scope).ok_or(ForestChangeError::UnsupportedScope {
        source: source.id.slug(),
        scope,
    })?;

    let binder = Binder { source, params, defaults, resolution };
    let analysis = binder.fill(&clean(template.analysis), Shape::Analysis)?;

    // Both download shapes are rendered so links for every format are usable.
    let download = download_text(source, template)?;
    let tabular = TypeResolution::download(ExportFormat::Csv);
    let spatial = TypeResolution::download(ExportFormat::GeoJson);
    let download_tabular = Binder { resolution: &tabular, ..binder }.fill(&download, Shape::Download)?;
    let download_spatial = Binder { resolution: &spatial, ..binder }.fill(&download, Shape::Download)?;

    Ok(QuerySpec {
        analysis,
        download_tabular,
        download_spatial,
        query_type: resolution.query_type,
        format: resolution.format,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
