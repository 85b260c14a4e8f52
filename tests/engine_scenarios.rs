//! End-to-end request scenarios against a recorded store
//!
//! Tests verify:
//! 1. Country analysis requests render, execute once, and normalize
//! 2. Export requests redirect without touching the store, and spatial
//!    export links carry geometry
//! 3. Numeric ids are bound unquoted
//! 4. Parameter and scope errors fail before any network call
//! 5. Store failures surface as typed errors
//!
//! No network access needed. Run with: cargo test --test engine_scenarios

use std::sync::Mutex;

use forest_change_service::model::{ExportFormat, TransportError};
use forest_change_service::{
    Action, DataSourceId, ForestChangeEngine, ForestChangeError, RequestParams, ServiceConfig, SqlStore,
    StoreResponse,
};
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

/// Replays one canned answer and records every query it was sent.
struct RecordedStore {
    answer: Result<StoreResponse, TransportError>,
    queries: Mutex<Vec<String>>,
}

impl RecordedStore {
    fn ok(body: &str) -> Self {
        Self::answering(200, body)
    }

    fn answering(status: u16, body: &str) -> Self {
        Self {
            answer: Ok(StoreResponse { status, body: body.to_string() }),
            queries: Mutex::new(Vec::new()),
        }
    }

    fn failing(err: TransportError) -> Self {
        Self { answer: Err(err), queries: Mutex::new(Vec::new()) }
    }
}

impl SqlStore for RecordedStore {
    fn execute_sql(&self, sql: &str) -> Result<StoreResponse, TransportError> {
        self.queries.lock().unwrap().push(sql.to_string());
        self.answer.clone()
    }
}

fn engine(store: RecordedStore) -> ForestChangeEngine<RecordedStore> {
    ForestChangeEngine::new(store, &ServiceConfig::default()).expect("shipped registry is valid")
}

fn queries(engine: &ForestChangeEngine<RecordedStore>) -> Vec<String> {
    engine.store().queries.lock().unwrap().clone()
}

fn respond(action: Action) -> Value {
    match action {
        Action::Respond(response) => response.to_json(),
        other => panic!("expected an inline response, got {:?}", other),
    }
}

/// Decoded `q` parameter of an export URL.
fn export_query(url: &str) -> String {
    reqwest::Url::parse(url)
        .expect("export url parses")
        .query_pairs()
        .find(|(k, _)| k == "q")
        .map(|(_, v)| v.into_owned())
        .expect("export url carries q")
}

fn indonesia() -> RequestParams {
    RequestParams::new()
        .with("iso", "idn")
        .with("begin", "2010-01-01")
        .with("end", "2014-01-01")
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

#[test]
fn test_country_analysis_returns_value_params_and_metadata() {
    let engine = engine(RecordedStore::ok(r#"{"rows":[{"value":42}],"time":0.2}"#));
    let body = respond(engine.query(DataSourceId::Forma, &indonesia()).expect("query succeeds"));

    assert_eq!(body["value"], json!(42));
    assert_eq!(body["iso"], json!("idn"));
    assert_eq!(body["begin"], json!("2010-01-01"));
    assert_eq!(body["id"], json!("forma-alerts"));
    assert_eq!(body["name"], json!("FORMA"));
    assert!(body["download_urls"]["kml"].as_str().is_some_and(|u| u.contains("format=kml")));
    assert!(body.get("dev").is_none());

    let sent = queries(&engine);
    assert_eq!(sent.len(), 1, "exactly one store call per analysis request");
    assert!(sent[0].contains("UPPER('idn')"), "{}", sent[0]);
    assert!(sent[0].contains("'2010-01-01'::date"), "{}", sent[0]);
    assert!(sent[0].contains("'2014-01-01'::date"), "{}", sent[0]);
}

#[test]
fn test_dev_flag_echoes_the_executed_sql() {
    let engine = engine(RecordedStore::ok(r#"{"rows":[{"value":1}]}"#));
    let params = indonesia().with("dev", "true");
    let body = respond(engine.query(DataSourceId::Fires, &params).expect("query succeeds"));

    let sent = queries(&engine);
    assert_eq!(body["dev"]["sql"], json!(sent[0]));
}

#[test]
fn test_protected_area_id_is_bound_unquoted() {
    let engine = engine(RecordedStore::ok(r#"{"rows":[{"value":3}]}"#));
    let params = RequestParams::new()
        .with("wdpaid", "555")
        .with("begin", "2012-01-01")
        .with("end", "2013-01-01");
    let body = respond(engine.query(DataSourceId::TerraI, &params).expect("query succeeds"));

    assert_eq!(body["value"], json!(3));
    let sent = queries(&engine);
    assert!(sent[0].contains("wdpaid = 555"), "{}", sent[0]);
    assert!(!sent[0].contains("'555'"), "{}", sent[0]);
}

#[test]
fn test_geojson_is_echoed_as_structured_json() {
    let polygon = r#"{"type":"Polygon","coordinates":[[[100,0],[101,0],[101,1],[100,1],[100,0]]]}"#;
    let engine = engine(RecordedStore::ok(r#"{"rows":[]}"#));
    let params = RequestParams::new()
        .with("geojson", polygon)
        .with("begin", "2014-01-01")
        .with("end", "2014-02-01");
    let body = respond(engine.query(DataSourceId::Forma, &params).expect("query succeeds"));

    assert_eq!(body["geojson"]["type"], json!("Polygon"));
    assert_eq!(body["value"], json!(0), "no rows means zero alerts");
    let sent = queries(&engine);
    assert!(sent[0].contains("ST_GeomFromGeoJSON('{"), "{}", sent[0]);
    assert!(sent[0].contains(r#""type":"Polygon""#), "{}", sent[0]);
    assert!(sent[0].contains("[[[100,0],[101,0],[101,1],[100,1],[100,0]]]"), "{}", sent[0]);
}

#[test]
fn test_imazon_outside_brazil_is_not_applicable() {
    let engine = engine(RecordedStore::ok(r#"{"rows":[]}"#));
    let body = respond(engine.query(DataSourceId::Imazon, &indonesia()).expect("not an error"));

    assert_eq!(
        body["value"],
        json!([{"data_type": "defor", "value": null}, {"data_type": "degrad", "value": null}])
    );
    assert!(queries(&engine).is_empty());
}

#[test]
fn test_imazon_in_brazil_fills_categories() {
    let engine = engine(RecordedStore::ok(r#"{"rows":[{"data_type":"defor","value":120.5}]}"#));
    let params = RequestParams::new()
        .with("iso", "BRA")
        .with("begin", "2012-01-01")
        .with("end", "2013-01-01");
    let body = respond(engine.query(DataSourceId::Imazon, &params).expect("query succeeds"));

    assert_eq!(body["value"][0], json!({"data_type": "defor", "value": 120.5}));
    assert_eq!(body["value"][1], json!({"data_type": "degrad", "value": null}));
    assert_eq!(queries(&engine).len(), 1);
}

// ---------------------------------------------------------------------------
// Downloads
// ---------------------------------------------------------------------------

#[test]
fn test_csv_download_redirects_with_every_format() {
    let engine = engine(RecordedStore::ok(r#"{"rows":[]}"#));
    let params = indonesia().with("format", "csv");

    match engine.query(DataSourceId::Forma, &params).expect("redirect") {
        Action::Redirect { url, urls } => {
            assert!(url.contains("format=csv"), "{}", url);
            assert_eq!(urls.len(), 5);
            assert_eq!(urls[&ExportFormat::Csv], url);
            assert!(urls[&ExportFormat::Shp].contains("format=shp"));
        }
        other => panic!("expected a redirect, got {:?}", other),
    }
    assert!(queries(&engine).is_empty(), "downloads never call the store");
}

#[test]
fn test_analysis_response_links_spatial_exports_with_geometry() {
    let engine = engine(RecordedStore::ok(r#"{"rows":[{"value":7}]}"#));
    let body = respond(engine.query(DataSourceId::Forma, &indonesia()).expect("query succeeds"));

    let urls = &body["download_urls"];
    for format in ["shp", "kml", "geojson", "svg"] {
        let url = urls[format].as_str().expect("url per format");
        let sql = export_query(url);
        assert!(sql.contains("f.the_geom"), "{}: {}", format, sql);
    }
    let csv = export_query(urls["csv"].as_str().expect("csv url"));
    assert!(!csv.contains("the_geom"), "{}", csv);
}

#[test]
fn test_csv_redirect_still_links_shapefile_with_geometry() {
    let engine = engine(RecordedStore::ok(r#"{"rows":[]}"#));
    let params = indonesia().with("format", "csv");

    match engine.query(DataSourceId::Forma, &params).expect("redirect") {
        Action::Redirect { url, urls } => {
            assert!(!export_query(&url).contains("the_geom"));
            assert!(export_query(&urls[&ExportFormat::Shp]).contains("f.the_geom"));
        }
        other => panic!("expected a redirect, got {:?}", other),
    }
}

#[test]
fn test_imazon_export_outside_brazil_is_not_applicable() {
    let engine = engine(RecordedStore::ok(r#"{"rows":[]}"#));
    let params = indonesia().with("format", "csv");
    let body = respond(engine.query(DataSourceId::Imazon, &params).expect("not an error"));

    assert_eq!(
        body["value"],
        json!([{"data_type": "defor", "value": null}, {"data_type": "degrad", "value": null}])
    );
    assert!(body.get("download_urls").is_none());
    assert!(queries(&engine).is_empty());
}

#[test]
fn test_unknown_format_is_rejected() {
    let engine = engine(RecordedStore::ok(r#"{"rows":[]}"#));
    let err = engine
        .query(DataSourceId::Forma, &indonesia().with("format", "xlsx"))
        .unwrap_err();
    assert!(matches!(err, ForestChangeError::InvalidParameter { ref key, .. } if key == "format"));
    assert_eq!(err.http_status(), 400);
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[test]
fn test_missing_begin_fails_before_the_store() {
    let engine = engine(RecordedStore::ok(r#"{"rows":[]}"#));
    let params = RequestParams::new().with("iso", "idn").with("end", "2014-01-01");
    let err = engine.query(DataSourceId::Forma, &params).unwrap_err();

    assert_eq!(err, ForestChangeError::MissingParameter("begin".to_string()));
    assert!(queries(&engine).is_empty());
}

#[test]
fn test_quote_in_iso_cannot_break_out_of_the_literal() {
    let engine = engine(RecordedStore::ok(r#"{"rows":[]}"#));
    let params = indonesia().with("iso", "idn'); DROP TABLE forma_api; --");
    engine
        .query(DataSourceId::Forma, &params)
        .expect("quoted iso is just an unknown country");

    let sent = queries(&engine);
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("'idn''); DROP TABLE forma_api; --'"), "{}", sent[0]);
}

#[test]
fn test_upstream_error_surfaces_status_and_body() {
    let engine = engine(RecordedStore::answering(400, r#"{"error":["syntax error"]}"#));
    let err = engine.query(DataSourceId::Fires, &indonesia()).unwrap_err();

    match &err {
        ForestChangeError::Upstream { status, body } => {
            assert_eq!(*status, 400);
            assert!(body.contains("syntax error"));
        }
        other => panic!("expected an upstream error, got {:?}", other),
    }
    assert!(!err.is_retryable());
}

#[test]
fn test_timeout_surfaces_as_retryable_transport_error() {
    let engine = engine(RecordedStore::failing(TransportError::Timeout("deadline".into())));
    let err = engine.query(DataSourceId::TerraI, &indonesia()).unwrap_err();

    assert!(matches!(err, ForestChangeError::Transport(TransportError::Timeout(_))));
    assert!(err.is_retryable());
    assert_eq!(queries(&engine).len(), 1, "no retry inside the engine");
}

#[test]
fn test_malformed_store_body_is_reported() {
    let engine = engine(RecordedStore::ok("<html>gateway</html>"));
    let err = engine.query(DataSourceId::Forma, &indonesia()).unwrap_err();
    assert!(matches!(err, ForestChangeError::MalformedResponse(_)));
}

#[test]
fn test_engine_is_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ForestChangeEngine<RecordedStore>>();
}
