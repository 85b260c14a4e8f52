//! Core data types for the forest-change query engine.
//!
//! This module defines the shared domain model imported by all other
//! modules: request parameters, geographic scopes, query shapes, the
//! three-way execution result, and the error taxonomy. It contains no I/O.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

/// One row returned by the remote store, keyed by column name.
pub type Row = Map<String, Value>;

// ---------------------------------------------------------------------------
// Request parameters
// ---------------------------------------------------------------------------

/// Parameter keys whose presence selects a geographic scope.
pub const SCOPE_KEYS: &[&str] = &["iso", "id1", "ifl", "ifl_id1", "use", "pa", "wdpaid"];

/// The caller's parameter set, assembled by the HTTP layer.
///
/// Values are kept as strings. Structured values (GeoJSON geometries) are
/// carried in serialized form and only parsed where they are bound into a
/// query or echoed back to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParams {
    values: BTreeMap<String, String>,
}

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, convenient for tests and for the HTTP layer.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Builds parameters from a JSON object.
    ///
    /// Strings are taken as-is, numbers and booleans become their textual
    /// form, objects and arrays (a GeoJSON geometry) are serialized
    /// compactly. `null` members are treated as absent.
    pub fn from_json(value: &Value) -> Result<Self, ForestChangeError> {
        let object = value.as_object().ok_or_else(|| ForestChangeError::InvalidParameter {
            key: "params".to_string(),
            reason: "expected a JSON object".to_string(),
        })?;

        let mut params = RequestParams::new();
        for (key, member) in object {
            let text = match member {
                Value::Null => continue,
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Array(_) | Value::Object(_) => member.to_string(),
            };
            params.insert(key.clone(), text);
        }
        Ok(params)
    }

    /// Parameters as echoed back to the caller.
    ///
    /// Every value is echoed verbatim, except `geojson`, which is
    /// re-materialized as structured JSON so the caller sees the polygon
    /// that was matched against.
    pub fn echo(&self) -> Map<String, Value> {
        self.values
            .iter()
            .map(|(key, raw)| {
                let echoed = if key == "geojson" {
                    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()))
                } else {
                    Value::String(raw.clone())
                };
                (key.clone(), echoed)
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Scope and query shape
// ---------------------------------------------------------------------------

/// Geographic granularity a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    World,
    Iso,
    Id1,
    Wdpa,
    Use,
    Ifl,
    IflId1,
    Pa,
}

impl Scope {
    pub const ALL: [Scope; 8] = [
        Scope::World,
        Scope::Iso,
        Scope::Id1,
        Scope::Wdpa,
        Scope::Use,
        Scope::Ifl,
        Scope::IflId1,
        Scope::Pa,
    ];

    /// Scopes every data source is expected to register.
    pub const BASELINE: [Scope; 5] = [Scope::World, Scope::Iso, Scope::Id1, Scope::Wdpa, Scope::Use];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::World => "world",
            Scope::Iso => "iso",
            Scope::Id1 => "id1",
            Scope::Wdpa => "wdpa",
            Scope::Use => "use",
            Scope::Ifl => "ifl",
            Scope::IflId1 => "ifl_id1",
            Scope::Pa => "pa",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a request is answered inline or redirected to a bulk export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Analysis,
    Download,
}

/// The fixed set of export formats offered by the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExportFormat {
    Csv,
    GeoJson,
    Svg,
    Kml,
    Shp,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 5] = [
        ExportFormat::Csv,
        ExportFormat::GeoJson,
        ExportFormat::Svg,
        ExportFormat::Kml,
        ExportFormat::Shp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::GeoJson => "geojson",
            ExportFormat::Svg => "svg",
            ExportFormat::Kml => "kml",
            ExportFormat::Shp => "shp",
        }
    }

    /// Only the plain row-oriented format can do without a geometry column.
    pub fn needs_geometry(&self) -> bool {
        *self != ExportFormat::Csv
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = ForestChangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExportFormat::ALL
            .into_iter()
            .find(|fmt| fmt.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ForestChangeError::InvalidParameter {
                key: "format".to_string(),
                reason: format!("unsupported export format '{}'", s),
            })
    }
}

/// The analysis and download queries rendered for one request.
///
/// Download text is rendered twice so every advertised export link selects
/// what its format needs: rows only for csv, rows plus geometry otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    pub analysis: String,
    pub download_tabular: String,
    pub download_spatial: String,
    pub query_type: QueryType,
    /// Export format requested by the caller, if any.
    pub format: Option<ExportFormat>,
}

impl QuerySpec {
    /// Download text for one export format.
    pub fn download_for(&self, format: ExportFormat) -> &str {
        if format.needs_geometry() {
            &self.download_spatial
        } else {
            &self.download_tabular
        }
    }

    /// Download text for the requested format, tabular when none was asked for.
    pub fn download(&self) -> &str {
        self.download_for(self.format.unwrap_or(ExportFormat::Csv))
    }
}

// ---------------------------------------------------------------------------
// Execution result
// ---------------------------------------------------------------------------

/// Outcome of sending a rendered query to the remote store.
///
/// Exactly one variant is produced per execution; there are no partial
/// results. Every variant carries the effective (echoed) parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionResult {
    Responded {
        rows: Vec<Row>,
        params: Map<String, Value>,
        download_urls: BTreeMap<ExportFormat, String>,
        /// The analysis query text, included only for diagnostic (`dev`) requests.
        sql: Option<String>,
    },
    Redirected {
        url: String,
        urls: BTreeMap<ExportFormat, String>,
        params: Map<String, Value>,
    },
    Errored {
        error: ExecutionError,
        params: Map<String, Value>,
    },
}

/// Failures at the transport level, before any status code is seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    Timeout(String),
    Connection(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Timeout(msg) => write!(f, "timeout: {}", msg),
            TransportError::Connection(msg) => write!(f, "connection failed: {}", msg),
        }
    }
}

/// Why an execution ended in `ExecutionResult::Errored`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// Non-200 response; the body is the store's own error message.
    Upstream { status: u16, body: String },
    Transport(TransportError),
    /// A 200 response whose body is not the expected `{"rows": [...]}` shape.
    MalformedResponse(String),
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionError::Upstream { status, body } => {
                write!(f, "CartoDB Error ({}): {}", status, body)
            }
            ExecutionError::Transport(err) => write!(f, "Transport error: {}", err),
            ExecutionError::MalformedResponse(msg) => write!(f, "Malformed response: {}", msg),
        }
    }
}

impl From<ExecutionError> for ForestChangeError {
    fn from(err: ExecutionError) -> Self {
        match err {
            ExecutionError::Upstream { status, body } => ForestChangeError::Upstream { status, body },
            ExecutionError::Transport(t) => ForestChangeError::Transport(t),
            ExecutionError::MalformedResponse(msg) => ForestChangeError::MalformedResponse(msg),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors surfaced by the engine to the caller-facing layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForestChangeError {
    /// A placeholder the selected template needs has no parameter.
    MissingParameter(String),
    /// A parameter is present but cannot be bound safely.
    InvalidParameter { key: String, reason: String },
    /// The data source registered no template for the classified scope.
    UnsupportedScope { source: &'static str, scope: Scope },
    /// A template names a placeholder the binder does not know.
    UnknownPlaceholder { source: &'static str, placeholder: String },
    /// Startup validation of the template registry failed.
    RegistryInvalid(Vec<String>),
    /// The remote store answered with a non-200 status.
    Upstream { status: u16, body: String },
    Transport(TransportError),
    MalformedResponse(String),
    Config(String),
}

impl ForestChangeError {
    /// HTTP status the caller-facing layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            ForestChangeError::MissingParameter(_)
            | ForestChangeError::InvalidParameter { .. }
            | ForestChangeError::UnsupportedScope { .. } => 400,
            ForestChangeError::UnknownPlaceholder { .. }
            | ForestChangeError::RegistryInvalid(_)
            | ForestChangeError::Config(_) => 500,
            ForestChangeError::Upstream { .. } | ForestChangeError::MalformedResponse(_) => 502,
            ForestChangeError::Transport(TransportError::Timeout(_)) => 504,
            ForestChangeError::Transport(TransportError::Connection(_)) => 503,
        }
    }

    /// Only transport failures are worth retrying by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ForestChangeError::Transport(_))
    }
}

impl fmt::Display for ForestChangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForestChangeError::MissingParameter(key) => write!(f, "Missing parameter: {}", key),
            ForestChangeError::InvalidParameter { key, reason } => {
                write!(f, "Invalid parameter {}: {}", key, reason)
            }
            ForestChangeError::UnsupportedScope { source, scope } => {
                write!(f, "Data source {} does not support scope {}", source, scope)
            }
            ForestChangeError::UnknownPlaceholder { source, placeholder } => {
                write!(f, "Data source {} uses unknown placeholder {{{}}}", source, placeholder)
            }
            ForestChangeError::RegistryInvalid(problems) => {
                write!(f, "Template registry invalid: {}", problems.join("; "))
            }
            ForestChangeError::Upstream { status, body } => {
                write!(f, "CartoDB Error ({}): {}", status, body)
            }
            ForestChangeError::Transport(err) => write!(f, "Transport error: {}", err),
            ForestChangeError::MalformedResponse(msg) => write!(f, "Malformed response: {}", msg),
            ForestChangeError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for ForestChangeError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_stringifies_numbers_and_geometries() {
        let params = RequestParams::from_json(&json!({
            "wdpaid": 555,
            "begin": "2010-01-01",
            "geojson": {"type": "Point", "coordinates": [1, 2]},
            "dev": null,
        }))
        .expect("object should convert");

        assert_eq!(params.get("wdpaid"), Some("555"));
        assert_eq!(params.get("begin"), Some("2010-01-01"));
        assert_eq!(params.get("geojson"), Some(r#"{"coordinates":[1,2],"type":"Point"}"#));
        assert!(!params.contains("dev"), "null members should be treated as absent");
    }

    #[test]
    fn test_from_json_rejects_non_objects() {
        let err = RequestParams::from_json(&json!(["iso", "idn"])).unwrap_err();
        assert!(matches!(err, ForestChangeError::InvalidParameter { .. }));
    }

    #[test]
    fn test_echo_parses_geojson_and_keeps_case() {
        let params = RequestParams::new()
            .with("iso", "idn")
            .with("geojson", r#"{"type":"Point","coordinates":[0,0]}"#);
        let echo = params.echo();
        assert_eq!(echo["iso"], json!("idn"));
        assert_eq!(echo["geojson"], json!({"type": "Point", "coordinates": [0, 0]}));
    }

    #[test]
    fn test_echo_keeps_unparseable_geojson_as_string() {
        let params = RequestParams::new().with("geojson", "not json");
        assert_eq!(params.echo()["geojson"], json!("not json"));
    }

    #[test]
    fn test_export_format_parsing() {
        assert_eq!("csv".parse::<ExportFormat>(), Ok(ExportFormat::Csv));
        assert_eq!("GeoJSON".parse::<ExportFormat>(), Ok(ExportFormat::GeoJson));
        assert!("xlsx".parse::<ExportFormat>().is_err());
        assert!(!ExportFormat::Csv.needs_geometry());
        assert!(ExportFormat::Shp.needs_geometry());
    }

    #[test]
    fn test_download_text_is_picked_per_format() {
        let spec = QuerySpec {
            analysis: "SELECT COUNT(*) AS value FROM t".to_string(),
            download_tabular: "SELECT t.a FROM t".to_string(),
            download_spatial: "SELECT t.a, t.the_geom FROM t".to_string(),
            query_type: QueryType::Download,
            format: Some(ExportFormat::Kml),
        };
        assert_eq!(spec.download_for(ExportFormat::Csv), "SELECT t.a FROM t");
        for format in [ExportFormat::GeoJson, ExportFormat::Svg, ExportFormat::Kml, ExportFormat::Shp] {
            assert_eq!(spec.download_for(format), "SELECT t.a, t.the_geom FROM t");
        }
        assert_eq!(spec.download(), "SELECT t.a, t.the_geom FROM t");

        let analysis = QuerySpec { query_type: QueryType::Analysis, format: None, ..spec };
        assert_eq!(analysis.download(), "SELECT t.a FROM t");
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(ForestChangeError::MissingParameter("begin".into()).http_status(), 400);
        assert_eq!(
            ForestChangeError::Upstream { status: 400, body: "bad sql".into() }.http_status(),
            502
        );
        let timeout = ForestChangeError::Transport(TransportError::Timeout("30s".into()));
        assert_eq!(timeout.http_status(), 504);
        assert!(timeout.is_retryable());
        assert!(!ForestChangeError::MissingParameter("iso".into()).is_retryable());
    }

    #[test]
    fn test_missing_parameter_message_names_the_key() {
        let err = ForestChangeError::MissingParameter("begin".to_string());
        assert_eq!(err.to_string(), "Missing parameter: begin");
    }
}
