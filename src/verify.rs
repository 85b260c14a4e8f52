//! Data Source Verification Module
//!
//! Checks the template registry before any request is served: every source
//! registers the baseline scopes once, every template parses and names only
//! known placeholders, and every registered scope renders in both query
//! types with realistic sample parameters.
//!
//! With a live store, one analysis query per source confirms the tables
//! behind the templates exist and answer.

use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;

use crate::config::DateDefaults;
use crate::ingest::{ExportEndpoint, SqlStore};
use crate::logging;
use crate::model::{ExecutionResult, ExportFormat, ForestChangeError, RequestParams, Scope};
use crate::query::bind::{is_known_placeholder, parse_template, Segment};
use crate::query::render::download_text;
use crate::query::{classify, render, TypeResolution};
use crate::sources::DataSource;

// ============================================================================
// Verification Results
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub timestamp: String,
    pub registry_problems: Vec<String>,
    pub source_results: Vec<SourceVerification>,
    pub summary: VerificationSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerificationSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceVerification {
    pub source: String,
    pub name: String,
    pub status: VerificationStatus,
    pub registered_scopes: Vec<String>,
    pub missing_scopes: Vec<String>,
    pub duplicate_scopes: Vec<String>,
    pub template_problems: Vec<String>,
    pub render_failures: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LiveVerification {
    pub source: String,
    pub status: VerificationStatus,
    pub scope: String,
    pub rows_returned: usize,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum VerificationStatus {
    Success,
    PartialSuccess,
    Failed,
}

impl SourceVerification {
    /// Every problem found, prefixed with the source slug.
    pub fn problems(&self) -> Vec<String> {
        let missing = self.missing_scopes.iter().map(|s| format!("missing {} template", s));
        let duplicates = self.duplicate_scopes.iter().map(|s| format!("{} registered twice", s));
        missing
            .chain(duplicates)
            .chain(self.template_problems.iter().cloned())
            .chain(self.render_failures.iter().cloned())
            .map(|problem| format!("{}: {}", self.source, problem))
            .collect()
    }
}

// ============================================================================
// Sample Parameters
// ============================================================================

const SAMPLE_POLYGON: &str = r#"{"type":"Polygon","coordinates":[[[-55.0,-10.0],[-54.0,-10.0],[-54.0,-9.0],[-55.0,-9.0],[-55.0,-10.0]]]}"#;

/// A parameter set that classifies as `scope`, with a date window.
pub fn sample_params(scope: Scope) -> RequestParams {
    let params = RequestParams::new().with("begin", "2014-01-01").with("end", "2014-06-01");
    match scope {
        Scope::World => params.with("geojson", SAMPLE_POLYGON),
        Scope::Iso => params.with("iso", "bra"),
        Scope::Id1 => params.with("iso", "bra").with("id1", "3"),
        Scope::Wdpa => params.with("wdpaid", "555"),
        Scope::Use => params.with("use", "oilpalm").with("useid", "7"),
        Scope::Ifl => params.with("ifl", "bra"),
        Scope::IflId1 => params.with("ifl_id1", "bra/3"),
        Scope::Pa => params.with("pa", "bra"),
    }
}

// ============================================================================
// Registry Verification
// ============================================================================

pub fn verify_source(source: &DataSource) -> SourceVerification {
    let mut result = SourceVerification {
        source: source.id.slug().to_string(),
        name: source.meta.name.to_string(),
        status: VerificationStatus::Failed,
        registered_scopes: source.scopes().iter().map(|s| s.to_string()).collect(),
        missing_scopes: Vec::new(),
        duplicate_scopes: Vec::new(),
        template_problems: Vec::new(),
        render_failures: Vec::new(),
    };

    // Check 1: baseline coverage and uniqueness
    for scope in Scope::BASELINE {
        if !source.supports(scope) {
            result.missing_scopes.push(scope.to_string());
        }
    }
    let mut seen = HashSet::new();
    for scope in source.scopes() {
        if !seen.insert(scope) && !result.duplicate_scopes.contains(&scope.to_string()) {
            result.duplicate_scopes.push(scope.to_string());
        }
    }

    // Check 2: template syntax and placeholder names
    for template in source.templates {
        let download = match download_text(source, template) {
            Ok(text) => Some(text),
            Err(e) => {
                result.template_problems.push(e.to_string());
                None
            }
        };
        let texts = [Some(template.analysis.to_string()), download];
        for text in texts.iter().flatten() {
            match parse_template(text) {
                Ok(segments) => {
                    for segment in segments {
                        if let Segment::Placeholder(name) = segment {
                            if !is_known_placeholder(name) {
                                let err = ForestChangeError::UnknownPlaceholder {
                                    source: source.id.slug(),
                                    placeholder: name.to_string(),
                                };
                                result.template_problems.push(format!("{} ({})", err, template.scope));
                            }
                        }
                    }
                }
                Err(e) => result.template_problems.push(format!("{}: {}", template.scope, e)),
            }
        }
    }

    // Check 3: every registered scope renders in both query types
    if result.template_problems.is_empty() {
        let defaults = DateDefaults::default();
        for scope in source.scopes() {
            let params = sample_params(scope);
            debug_assert_eq!(classify(&params), scope);
            for resolution in [TypeResolution::analysis(), TypeResolution::download(ExportFormat::GeoJson)] {
                if let Err(e) = render(source, scope, &resolution, &params, &defaults) {
                    result
                        .render_failures
                        .push(format!("{} {:?}: {}", scope, resolution.query_type, e));
                }
            }
        }
    }

    if result.missing_scopes.is_empty()
        && result.duplicate_scopes.is_empty()
        && result.template_problems.is_empty()
        && result.render_failures.is_empty()
    {
        result.status = VerificationStatus::Success;
    }

    result
}

pub fn verify_registry(sources: &[DataSource]) -> VerificationReport {
    let mut report = VerificationReport {
        timestamp: Utc::now().to_rfc3339(),
        registry_problems: Vec::new(),
        source_results: Vec::new(),
        summary: VerificationSummary {
            total: sources.len(),
            passed: 0,
            failed: 0,
        },
    };

    let mut ids = HashSet::new();
    for source in sources {
        if !ids.insert(source.id) {
            report.registry_problems.push(format!("{} registered twice", source.id));
        }

        let result = verify_source(source);
        match result.status {
            VerificationStatus::Failed => report.summary.failed += 1,
            _ => report.summary.passed += 1,
        }
        report.source_results.push(result);
    }

    logging::log_verification_summary(report.summary.total, report.summary.passed, report.summary.failed);
    report
}

/// Fails with `RegistryInvalid` listing every problem found.
pub fn ensure_registry_valid(sources: &[DataSource]) -> Result<(), ForestChangeError> {
    let report = verify_registry(sources);
    let problems: Vec<String> = report
        .registry_problems
        .iter()
        .cloned()
        .chain(report.source_results.iter().flat_map(SourceVerification::problems))
        .collect();

    if problems.is_empty() {
        Ok(())
    } else {
        Err(ForestChangeError::RegistryInvalid(problems))
    }
}

// ============================================================================
// Live Verification
// ============================================================================

/// Runs one country-scope analysis query for `source` against `store`.
pub fn verify_live_source<S: SqlStore + ?Sized>(
    store: &S,
    exports: &ExportEndpoint,
    source: &DataSource,
) -> LiveVerification {
    let scope = Scope::Iso;
    let mut result = LiveVerification {
        source: source.id.slug().to_string(),
        status: VerificationStatus::Failed,
        scope: scope.to_string(),
        rows_returned: 0,
        error_message: None,
    };

    let params = sample_params(scope);
    let spec = match render(source, scope, &TypeResolution::analysis(), &params, &DateDefaults::default()) {
        Ok(spec) => spec,
        Err(e) => {
            result.error_message = Some(format!("Render failed: {}", e));
            return result;
        }
    };

    match crate::ingest::execute(store, exports, &spec, &params) {
        ExecutionResult::Responded { rows, .. } => {
            result.rows_returned = rows.len();
            result.status = if rows.is_empty() {
                VerificationStatus::PartialSuccess
            } else {
                VerificationStatus::Success
            };
        }
        ExecutionResult::Errored { error, .. } => {
            logging::log_execution_failure(source.id, scope.as_str(), &error);
            result.error_message = Some(error.to_string());
        }
        ExecutionResult::Redirected { .. } => {
            result.error_message = Some("Analysis query was redirected".to_string());
        }
    }

    result
}

/// Runs [`verify_live_source`] for every source. Prints nothing.
pub fn verify_live_sources<S: SqlStore + ?Sized>(
    store: &S,
    exports: &ExportEndpoint,
    sources: &[DataSource],
) -> Vec<LiveVerification> {
    sources
        .iter()
        .map(|source| verify_live_source(store, exports, source))
        .collect()
}

pub fn print_live_results(results: &[LiveVerification]) {
    println!("\n🔍 Live store results:");
    for result in results {
        match result.status {
            VerificationStatus::Success => println!("  {} ... ✓ OK ({} rows)", result.source, result.rows_returned),
            VerificationStatus::PartialSuccess => println!("  {} ... ⚠ Responsive but no rows", result.source),
            VerificationStatus::Failed => println!(
                "  {} ... ✗ FAILED: {}",
                result.source,
                result.error_message.as_deref().unwrap_or("Unknown")
            ),
        }
    }
}

/// Registry report plus optional live results, as one JSON document.
#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    registry: &'a VerificationReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    live: Option<&'a [LiveVerification]>,
}

/// Pretty JSON for `--json` output: `{"registry": ..., "live": [...]}`.
pub fn report_json(
    report: &VerificationReport,
    live: Option<&[LiveVerification]>,
) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&JsonReport { registry: report, live })
}

pub fn print_summary(report: &VerificationReport) {
    println!("\n═══════════════════════════════════════════════════════════");
    println!("📊 REGISTRY VERIFICATION SUMMARY");
    println!("═══════════════════════════════════════════════════════════");
    println!();

    for result in &report.source_results {
        let mark = match result.status {
            VerificationStatus::Failed => "✗",
            _ => "✓",
        };
        println!("{} {} ({})", mark, result.name, result.source);
        println!("    Scopes: {}", result.registered_scopes.join(", "));
        for problem in result.problems() {
            println!("    {}", problem);
        }
    }
    for problem in &report.registry_problems {
        println!("✗ {}", problem);
    }

    println!();
    println!(
        "Sources:    {}/{} passed  ({} failed)",
        report.summary.passed, report.summary.total, report.summary.failed
    );
    println!("═══════════════════════════════════════════════════════════");
}

// ============================================================================
// Tests
// ============================================================================
