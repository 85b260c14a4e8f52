//! CartoDB SQL API gateway
//!
//! Sends rendered analysis queries to the remote store and builds export
//! URLs for download queries. Download URLs are constructed, never called:
//! the store serves the export when the caller follows the link.
//!
//! API Documentation: https://carto.com/developers/sql-api/
//!
//! No retries happen here. A timeout or refused connection is reported
//! once, as an `Errored` result, and retry policy is left to the caller.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::config::StoreConfig;
use crate::model::{
    ExecutionError, ExecutionResult, ExportFormat, ForestChangeError, QuerySpec, QueryType,
    RequestParams, Row, TransportError,
};

// ============================================================================
// Store abstraction
// ============================================================================

/// Status and raw body of one store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreResponse {
    pub status: u16,
    pub body: String,
}

/// Anything that can run a SQL string against the remote store.
pub trait SqlStore {
    fn execute_sql(&self, sql: &str) -> Result<StoreResponse, TransportError>;
}

/// Body of a successful SQL API response. Only `rows` is used.
#[derive(Debug, Deserialize)]
struct CartoDbResponse {
    #[serde(default)]
    rows: Option<Vec<Row>>,
}

// ============================================================================
// HTTP client
// ============================================================================

/// Blocking client for the CartoDB SQL API.
pub struct CartoDbClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl CartoDbClient {
    /// Builds a client whose calls give up after `config.timeout_secs`.
    pub fn new(config: &StoreConfig) -> Result<Self, ForestChangeError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ForestChangeError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl SqlStore for CartoDbClient {
    fn execute_sql(&self, sql: &str) -> Result<StoreResponse, TransportError> {
        // POSTed as a form so large GeoJSON filters do not hit URL length limits.
        let mut form = vec![("q", sql)];
        if let Some(key) = self.api_key.as_deref() {
            form.push(("api_key", key));
        }

        let response = self
            .http
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .form(&form)
            .send()
            .map_err(transport_error)?;

        let status = response.status().as_u16();
        let body = response.text().map_err(transport_error)?;
        Ok(StoreResponse { status, body })
    }
}

fn transport_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else {
        TransportError::Connection(err.to_string())
    }
}

// ============================================================================
// Export URLs
// ============================================================================

/// Builds export links against the store's SQL endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportEndpoint {
    base: reqwest::Url,
}

impl ExportEndpoint {
    /// Parses `endpoint`, which must be an absolute http(s) URL.
    pub fn new(endpoint: &str) -> Result<Self, ForestChangeError> {
        let base = reqwest::Url::parse(endpoint)
            .map_err(|e| ForestChangeError::Config(format!("store.endpoint '{}': {}", endpoint, e)))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ForestChangeError::Config(format!(
                "store.endpoint '{}' is not an http(s) URL",
                endpoint
            )));
        }
        Ok(Self { base })
    }

    pub fn as_str(&self) -> &str {
        self.base.as_str()
    }

    /// One export URL for `sql` in `format`.
    pub fn url(&self, sql: &str, format: ExportFormat, filename: Option<&str>) -> String {
        let mut url = self.base.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("q", sql).append_pair("format", format.as_str());
            if let Some(name) = filename {
                query.append_pair("filename", name);
            }
        }
        url.to_string()
    }

    /// URLs for every export format, computed eagerly so a response can
    /// advertise all of them. Each format gets the download text it needs.
    pub fn urls(&self, spec: &QuerySpec, filename: Option<&str>) -> BTreeMap<ExportFormat, String> {
        ExportFormat::ALL
            .into_iter()
            .map(|format| (format, self.url(spec.download_for(format), format, filename)))
            .collect()
    }
}

// ============================================================================
// Execution
// ============================================================================

/// Interprets one store response.
pub fn parse_store_response(response: StoreResponse) -> Result<Vec<Row>, ExecutionError> {
    if response.status != 200 {
        return Err(ExecutionError::Upstream {
            status: response.status,
            body: response.body,
        });
    }
    let parsed: CartoDbResponse = serde_json::from_str(&response.body)
        .map_err(|e| ExecutionError::MalformedResponse(e.to_string()))?;
    Ok(parsed.rows.unwrap_or_default())
}

/// Runs a rendered query spec.
///
/// Download requests resolve to a redirect without touching the store.
/// Analysis requests make exactly one store call.
pub fn execute<S: SqlStore + ?Sized>(
    store: &S,
    exports: &ExportEndpoint,
    spec: &QuerySpec,
    params: &RequestParams,
) -> ExecutionResult {
    let echo = params.echo();
    let urls = exports.urls(spec, params.get("filename"));

    if spec.query_type == QueryType::Download {
        let format = spec.format.unwrap_or(ExportFormat::Csv);
        let url = urls.get(&format).cloned().unwrap_or_default();
        return ExecutionResult::Redirected { url, urls, params: echo };
    }

    let outcome = store
        .execute_sql(&spec.analysis)
        .map_err(ExecutionError::Transport)
        .and_then(parse_store_response);

    match outcome {
        Ok(rows) => ExecutionResult::Responded {
            rows,
            params: echo,
            download_urls: urls,
            sql: params.contains("dev").then(|| spec.analysis.clone()),
        },
        Err(error) => ExecutionResult::Errored { error, params: echo },
    }
}

// ============================================================================
// Tests
// ============================================================================
