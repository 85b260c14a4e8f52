//! Result normalization.
//!
//! Turns the rows a store returned into the caller-facing response shape
//! declared by each data source: a single aggregate value, or one entry
//! per alert category. Source metadata and the echoed request parameters
//! are merged into every response.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use crate::model::{ExportFormat, Row};
use crate::sources::{DataSource, Metadata, Normalization, ZeroRowDefault};

/// Column holding the category name in category-shaped results.
pub const CATEGORY_KEY: &str = "data_type";

/// A response ready to be serialized for the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedResponse {
    pub value: Value,
    pub params: Map<String, Value>,
    pub meta: &'static Metadata,
    /// Export links, absent when the request was not executed.
    pub download_urls: Option<BTreeMap<ExportFormat, String>>,
    pub dev_sql: Option<String>,
}

impl NormalizedResponse {
    /// Flat JSON object: echoed params, then metadata, then the result.
    /// Later keys win on collision.
    pub fn to_json(&self) -> Value {
        let mut out = self.params.clone();

        if let Ok(Value::Object(meta)) = serde_json::to_value(self.meta) {
            out.extend(meta);
        }
        out.insert("value".to_string(), self.value.clone());

        if let Some(urls) = &self.download_urls {
            let urls: Map<String, Value> = urls
                .iter()
                .map(|(format, url)| (format.as_str().to_string(), Value::String(url.clone())))
                .collect();
            out.insert("download_urls".to_string(), Value::Object(urls));
        }
        if let Some(sql) = &self.dev_sql {
            out.insert("dev".to_string(), json!({ "sql": sql }));
        }

        Value::Object(out)
    }
}

/// Shapes the store's rows for `source`.
pub fn normalize(
    source: &'static DataSource,
    rows: &[Row],
    params: Map<String, Value>,
    download_urls: BTreeMap<ExportFormat, String>,
    sql: Option<String>,
) -> NormalizedResponse {
    let value = match source.normalization {
        Normalization::SingleValue { default } => single_value(rows, default),
        Normalization::Categories { categories } => category_values(rows, categories),
    };

    NormalizedResponse {
        value,
        params,
        meta: &source.meta,
        download_urls: Some(download_urls),
        dev_sql: sql,
    }
}

/// Response for a request outside the source's coverage. No query ran, so
/// the value is empty and there are no download links.
pub fn not_applicable(source: &'static DataSource, params: Map<String, Value>) -> NormalizedResponse {
    let value = match source.normalization {
        Normalization::SingleValue { .. } => Value::Null,
        Normalization::Categories { categories } => category_values(&[], categories),
    };

    NormalizedResponse {
        value,
        params,
        meta: &source.meta,
        download_urls: None,
        dev_sql: None,
    }
}

fn single_value(rows: &[Row], default: ZeroRowDefault) -> Value {
    match rows.first() {
        Some(row) => row.get("value").cloned().unwrap_or(Value::Null),
        None => match default {
            ZeroRowDefault::Zero => json!(0),
            ZeroRowDefault::Null => Value::Null,
        },
    }
}

fn category_values(rows: &[Row], categories: &[&str]) -> Value {
    let category_of = |row: &Row| row.get(CATEGORY_KEY).and_then(Value::as_str).map(str::to_string);

    let mut entries: Vec<Value> = categories
        .iter()
        .map(|&category| {
            rows.iter()
                .find(|row| category_of(row).as_deref() == Some(category))
                .map(|row| Value::Object(row.clone()))
                .unwrap_or_else(|| json!({ CATEGORY_KEY: category, "value": null }))
        })
        .collect();

    // Categories the store knows about but the source does not declare.
    entries.extend(
        rows.iter()
            .filter(|row| !category_of(row).is_some_and(|c| categories.contains(&c.as_str())))
            .map(|row| Value::Object(row.clone())),
    );

    Value::Array(entries)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RequestParams;
    use crate::sources::{find_source, DataSourceId};

    fn source(id: DataSourceId) -> &'static DataSource {
        find_source(id).expect("source is registered")
    }

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {}", other),
        }
    }

    #[test]
    fn test_single_value_reads_first_row() {
        let rows = vec![row(json!({"value": 42}))];
        let response = normalize(source(DataSourceId::Forma), &rows, Map::new(), BTreeMap::new(), None);
        assert_eq!(response.value, json!(42));
    }

    #[test]
    fn test_zero_rows_use_the_source_default() {
        let forma = normalize(source(DataSourceId::Forma), &[], Map::new(), BTreeMap::new(), None);
        assert_eq!(forma.value, json!(0));

        for id in [DataSourceId::TerraI, DataSourceId::Fires] {
            let response = normalize(source(id), &[], Map::new(), BTreeMap::new(), None);
            assert_eq!(response.value, Value::Null, "{}", id);
        }
    }

    #[test]
    fn test_row_without_value_column_is_null() {
        let rows = vec![row(json!({"count": 3}))];
        let response = normalize(source(DataSourceId::Forma), &rows, Map::new(), BTreeMap::new(), None);
        assert_eq!(response.value, Value::Null);
    }

    #[test]
    fn test_imazon_fills_missing_categories() {
        let rows = vec![row(json!({"data_type": "degrad", "value": 12.5, "min_date": "2012-03-01"}))];
        let response = normalize(source(DataSourceId::Imazon), &rows, Map::new(), BTreeMap::new(), None);
        assert_eq!(
            response.value,
            json!([
                {"data_type": "defor", "value": null},
                {"data_type": "degrad", "value": 12.5, "min_date": "2012-03-01"},
            ])
        );
    }

    #[test]
    fn test_imazon_appends_unknown_categories() {
        let rows = vec![
            row(json!({"data_type": "cicatriz", "value": 1.0})),
            row(json!({"data_type": "defor", "value": 4.0})),
        ];
        let response = normalize(source(DataSourceId::Imazon), &rows, Map::new(), BTreeMap::new(), None);
        let entries = response.value.as_array().expect("category list");
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0]["data_type"], json!("defor"));
        assert_eq!(entries[1]["value"], Value::Null);
        assert_eq!(entries[2]["data_type"], json!("cicatriz"));
    }

    #[test]
    fn test_not_applicable_shapes() {
        let imazon = not_applicable(source(DataSourceId::Imazon), Map::new());
        assert_eq!(
            imazon.value,
            json!([{"data_type": "defor", "value": null}, {"data_type": "degrad", "value": null}])
        );
        assert!(imazon.download_urls.is_none());

        let fires = not_applicable(source(DataSourceId::Fires), Map::new());
        assert_eq!(fires.value, Value::Null);
    }

    #[test]
    fn test_json_merges_params_metadata_and_value() {
        let params = RequestParams::new()
            .with("iso", "idn")
            .with("geojson", r#"{"type":"Point","coordinates":[0,0]}"#)
            .echo();
        let mut urls = BTreeMap::new();
        urls.insert(ExportFormat::Csv, "https://example.com/sql?format=csv".to_string());

        let response = normalize(
            source(DataSourceId::Forma),
            &[row(json!({"value": 42}))],
            params,
            urls,
            Some("SELECT 1".to_string()),
        );
        let body = response.to_json();

        assert_eq!(body["iso"], json!("idn"));
        assert_eq!(body["geojson"]["type"], json!("Point"));
        assert_eq!(body["value"], json!(42));
        assert_eq!(body["id"], json!("forma-alerts"));
        assert_eq!(body["units"], json!("Alerts"));
        assert_eq!(body["download_urls"]["csv"], json!("https://example.com/sql?format=csv"));
        assert_eq!(body["dev"]["sql"], json!("SELECT 1"));
    }

    #[test]
    fn test_json_omits_links_and_sql_when_absent() {
        let body = not_applicable(source(DataSourceId::Imazon), Map::new()).to_json();
        assert!(body.get("download_urls").is_none());
        assert!(body.get("dev").is_none());
        assert_eq!(body["name"], json!("SAD alerts"));
    }
}
