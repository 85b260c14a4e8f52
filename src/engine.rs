//! Request pipeline.
//!
//! One request moves through the stages
//! `Received → Classified → TypeResolved → Rendered → Executed → Normalized`.
//! Nothing is cached between requests: every call re-renders and re-queries,
//! so concurrently handled requests share only the immutable registry and
//! the store handle.

use std::collections::BTreeMap;

use crate::config::{DateDefaults, ServiceConfig};
use crate::ingest::{self, ExportEndpoint, SqlStore};
use crate::logging::{self, LogSource};
use crate::model::{ExecutionResult, ExportFormat, ForestChangeError, RequestParams};
use crate::normalize::{self, NormalizedResponse};
use crate::query::{classify, render, resolve_query_type};
use crate::sources::{find_source, DataSourceId, DATA_SOURCES};
use crate::verify::ensure_registry_valid;

/// What the caller-facing layer should do with a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Answer inline with this body.
    Respond(NormalizedResponse),
    /// Send the caller to a bulk export at `url`; `urls` lists every format.
    Redirect {
        url: String,
        urls: BTreeMap<ExportFormat, String>,
    },
}

pub struct ForestChangeEngine<S: SqlStore> {
    store: S,
    exports: ExportEndpoint,
    defaults: DateDefaults,
}

impl<S: SqlStore> ForestChangeEngine<S> {
    /// Validates the template registry and the store endpoint, then builds
    /// an engine around `store`.
    pub fn new(store: S, config: &ServiceConfig) -> Result<Self, ForestChangeError> {
        ensure_registry_valid(DATA_SOURCES)?;

        let exports = ExportEndpoint::new(&config.store.endpoint)?;

        logging::info(
            LogSource::Engine,
            None,
            &format!("Engine ready: {} data sources, store {}", DATA_SOURCES.len(), config.store.endpoint),
        );

        Ok(Self {
            store,
            exports,
            defaults: config.defaults,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Answers one request against one data source.
    pub fn query(&self, id: DataSourceId, params: &RequestParams) -> Result<Action, ForestChangeError> {
        let source = find_source(id)
            .ok_or_else(|| ForestChangeError::RegistryInvalid(vec![format!("{}: not registered", id)]))?;

        let scope = classify(params);
        let resolution = resolve_query_type(params)?;
        logging::debug(
            id,
            Some(scope.as_str()),
            &format!("classified as {:?} request", resolution.query_type),
        );

        let spec = render(source, scope, &resolution, params, &self.defaults).inspect_err(|e| {
            logging::warn(id, Some(scope.as_str()), &format!("render failed: {}", e));
        })?;

        if source.coverage.excludes(scope, params) {
            logging::info(id, Some(scope.as_str()), "outside source coverage, not applicable");
            return Ok(Action::Respond(normalize::not_applicable(source, params.echo())));
        }

        match ingest::execute(&self.store, &self.exports, &spec, params) {
            ExecutionResult::Responded { rows, params, download_urls, sql } => {
                logging::debug(id, Some(scope.as_str()), &format!("store returned {} rows", rows.len()));
                Ok(Action::Respond(normalize::normalize(source, &rows, params, download_urls, sql)))
            }
            ExecutionResult::Redirected { url, urls, .. } => {
                logging::debug(id, Some(scope.as_str()), "redirecting to export");
                Ok(Action::Redirect { url, urls })
            }
            ExecutionResult::Errored { error, .. } => {
                logging::log_execution_failure(id, scope.as_str(), &error);
                Err(error.into())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::StoreResponse;
    use crate::model::TransportError;
    use std::sync::Mutex;

    struct CannedStore {
        body: &'static str,
        queries: Mutex<Vec<String>>,
    }

    impl CannedStore {
        fn new(body: &'static str) -> Self {
            Self { body, queries: Mutex::new(Vec::new()) }
        }
    }

    impl SqlStore for CannedStore {
        fn execute_sql(&self, sql: &str) -> Result<StoreResponse, TransportError> {
            self.queries.lock().unwrap().push(sql.to_string());
            Ok(StoreResponse { status: 200, body: self.body.to_string() })
        }
    }

    fn window(params: RequestParams) -> RequestParams {
        params.with("begin", "2010-01-01").with("end", "2014-01-01")
    }

    #[test]
    fn test_engine_rejects_bad_endpoint() {
        let mut config = ServiceConfig::default();
        config.store.endpoint = "cartodb".to_string();
        let err = ForestChangeEngine::new(CannedStore::new("{}"), &config).err();
        assert!(matches!(err, Some(ForestChangeError::Config(_))));
    }

    #[test]
    fn test_configured_defaults_fill_missing_dates() {
        let mut config = ServiceConfig::default();
        config.defaults.begin = chrono::NaiveDate::from_ymd_opt(2014, 1, 1);
        config.defaults.end = chrono::NaiveDate::from_ymd_opt(2015, 1, 1);
        let engine = ForestChangeEngine::new(CannedStore::new(r#"{"rows":[]}"#), &config).expect("engine");

        engine
            .query(DataSourceId::Forma, &RequestParams::new().with("iso", "idn"))
            .expect("defaults cover the window");
        let queries = engine.store().queries.lock().unwrap();
        assert!(queries[0].contains("'2014-01-01'::date"), "{}", queries[0]);
        assert!(queries[0].contains("'2015-01-01'::date"), "{}", queries[0]);
    }

    #[test]
    fn test_download_outside_coverage_is_not_applicable() {
        let engine = ForestChangeEngine::new(CannedStore::new("{}"), &ServiceConfig::default()).expect("engine");
        let params = window(RequestParams::new().with("iso", "idn")).with("format", "csv");
        match engine.query(DataSourceId::Imazon, &params).expect("not an error") {
            Action::Respond(response) => {
                let body = response.to_json();
                assert_eq!(body["value"][0]["value"], serde_json::Value::Null);
                assert_eq!(body["value"][1]["value"], serde_json::Value::Null);
            }
            other => panic!("expected an inline response, got {:?}", other),
        }
        assert!(engine.store().queries.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unsupported_scope_fails_before_the_store() {
        let engine = ForestChangeEngine::new(CannedStore::new("{}"), &ServiceConfig::default()).expect("engine");
        let params = window(RequestParams::new().with("pa", "bra"));
        let err = engine.query(DataSourceId::Forma, &params).unwrap_err();
        assert!(matches!(err, ForestChangeError::UnsupportedScope { scope: crate::model::Scope::Pa, .. }));
        assert!(engine.store().queries.lock().unwrap().is_empty());
    }
}
