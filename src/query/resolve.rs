//! Analysis vs. download resolution.
//!
//! Must run before rendering: the download-shaped text of a template carries
//! a `{the_geom}` placeholder whose binding depends on the requested export
//! format. Formats other than csv cannot be produced without geometry.

use crate::model::{ExportFormat, ForestChangeError, QueryType, RequestParams};

/// How a request will be answered, and whether its download query selects
/// the geometry column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeResolution {
    pub query_type: QueryType,
    pub format: Option<ExportFormat>,
    pub include_geometry: bool,
}

impl TypeResolution {
    /// An inline analysis request with no export format.
    pub fn analysis() -> Self {
        Self {
            query_type: QueryType::Analysis,
            format: None,
            include_geometry: false,
        }
    }

    /// A bulk export in `format`.
    pub fn download(format: ExportFormat) -> Self {
        Self {
            query_type: QueryType::Download,
            format: Some(format),
            include_geometry: format.needs_geometry(),
        }
    }

    /// The select-list fragment bound to `{the_geom}` in download text.
    ///
    /// Empty unless geometry is included. `alias` qualifies the column for
    /// templates that join several geometry-bearing tables.
    pub fn geometry_clause(&self, alias: Option<&str>) -> String {
        match (self.include_geometry, alias) {
            (false, _) => String::new(),
            (true, Some(alias)) => format!(", {}.the_geom", alias),
            (true, None) => ", the_geom".to_string(),
        }
    }
}

/// Marks the request `Download` when an export format was asked for,
/// `Analysis` otherwise.
pub fn resolve_query_type(params: &RequestParams) -> Result<TypeResolution, ForestChangeError> {
    match params.get("format") {
        Some(raw) => Ok(TypeResolution::download(raw.parse()?)),
        None => Ok(TypeResolution::analysis()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_format_is_analysis_without_geometry() {
        let resolution = resolve_query_type(&RequestParams::new().with("iso", "idn"))
            .expect("no format should resolve");
        assert_eq!(resolution.query_type, QueryType::Analysis);
        assert_eq!(resolution.format, None);
        assert_eq!(resolution.geometry_clause(Some("f")), "");
    }

    #[test]
    fn test_csv_is_download_without_geometry() {
        let resolution = resolve_query_type(&RequestParams::new().with("format", "csv"))
            .expect("csv should resolve");
        assert_eq!(resolution.query_type, QueryType::Download);
        assert!(!resolution.include_geometry);
        assert_eq!(resolution.geometry_clause(None), "");
    }

    #[test]
    fn test_spatial_formats_include_geometry() {
        for fmt in ["geojson", "svg", "kml", "shp"] {
            let resolution = resolve_query_type(&RequestParams::new().with("format", fmt))
                .expect("spatial format should resolve");
            assert_eq!(resolution.query_type, QueryType::Download);
            assert!(resolution.include_geometry, "{} needs geometry", fmt);
        }
        let shp = TypeResolution::download(ExportFormat::Shp);
        assert_eq!(shp.geometry_clause(Some("pt")), ", pt.the_geom");
        assert_eq!(shp.geometry_clause(None), ", the_geom");
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        let err = resolve_query_type(&RequestParams::new().with("format", "xls")).unwrap_err();
        assert!(matches!(err, ForestChangeError::InvalidParameter { ref key, .. } if key == "format"));
    }
}
