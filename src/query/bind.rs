//! Typed placeholder binding.
//!
//! Templates name their inputs as `{placeholder}`. Each placeholder has a
//! fixed kind, and the kind, not the template, decides quoting: dates and
//! text become single-quoted literals with embedded quotes doubled, ids are
//! parsed as integers and emitted bare, table names are checked against an
//! identifier whitelist, and clause fragments are only ever produced here.
//! Raw parameter text never reaches a query unchecked.

use std::fmt;

use chrono::{DateTime, NaiveDate};
use serde_json::Value;

use crate::config::DateDefaults;
use crate::model::{ForestChangeError, RequestParams};
use crate::query::resolve::TypeResolution;
use crate::sources::DataSource;

/// Every placeholder a template may use.
pub const KNOWN_PLACEHOLDERS: &[&str] = &[
    "begin",
    "end",
    "iso",
    "id1",
    "wdpaid",
    "pid",
    "use_table",
    "geojson",
    "ifl",
    "ifl_iso",
    "ifl_id1",
    "pa",
    "the_geom",
    "additional_select",
    "date_column",
];

/// Concession aliases accepted in the `use` parameter.
const CONCESSION_TABLES: &[(&str, &str)] = &[
    ("mining", "gfw_mining"),
    ("oilpalm", "gfw_oil_palm"),
    ("fiber", "gfw_wood_fiber"),
    ("logging", "gfw_logging"),
];

pub fn is_known_placeholder(name: &str) -> bool {
    KNOWN_PLACEHOLDERS.contains(&name)
}

// ---------------------------------------------------------------------------
// Template segments
// ---------------------------------------------------------------------------

/// A template split into literal text and placeholder names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'t> {
    Literal(&'t str),
    Placeholder(&'t str),
}

/// Splits a template at its `{name}` markers.
///
/// Fails on an unterminated `{`, a stray `}`, or a name that is not a
/// lowercase identifier; templates never contain braces for any other
/// purpose.
pub fn parse_template(template: &str) -> Result<Vec<Segment<'_>>, String> {
    let mut segments = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        let (literal, tail) = rest.split_at(open);
        if literal.contains('}') {
            return Err(format!("stray '}}' before '{}'", tail));
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        let close = tail
            .find('}')
            .ok_or_else(|| format!("unterminated placeholder at '{}'", tail))?;
        let name = &tail[1..close];
        if name.is_empty()
            || !name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(format!("malformed placeholder '{{{}}}'", name));
        }
        segments.push(Segment::Placeholder(name));
        rest = &tail[close + 1..];
    }

    if rest.contains('}') {
        return Err(format!("stray '}}' in '{}'", rest));
    }
    if !rest.is_empty() {
        segments.push(Segment::Literal(rest));
    }
    Ok(segments)
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// Which of the two query texts is being filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Analysis,
    Download,
}

/// A bound placeholder value. `Display` produces its SQL text.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Date(NaiveDate),
    Text(String),
    Integer(u64),
    GeoJson(Value),
    Identifier(String),
    Clause(String),
}

fn quote_literal(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    write!(f, "'{}'", text.replace('\'', "''"))
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Date(date) => write!(f, "'{}'", date.format("%Y-%m-%d")),
            SqlValue::Text(text) => quote_literal(f, text),
            SqlValue::Integer(n) => write!(f, "{}", n),
            SqlValue::GeoJson(geometry) => quote_literal(f, &geometry.to_string()),
            SqlValue::Identifier(name) | SqlValue::Clause(name) => f.write_str(name),
        }
    }
}

/// Parses a date parameter, accepting `YYYY-MM-DD` or an RFC 3339 timestamp.
pub fn parse_date(key: &str, raw: &str) -> Result<NaiveDate, ForestChangeError> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|dt| dt.date_naive()))
        .map_err(|_| ForestChangeError::InvalidParameter {
            key: key.to_string(),
            reason: format!("'{}' is not a YYYY-MM-DD date", raw),
        })
}

fn parse_integer(key: &str, raw: &str) -> Result<u64, ForestChangeError> {
    raw.trim().parse::<u64>().map_err(|_| ForestChangeError::InvalidParameter {
        key: key.to_string(),
        reason: format!("'{}' is not a numeric id", raw),
    })
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Resolves `use` to the concession table it names.
pub fn concession_table(raw: &str) -> Result<String, ForestChangeError> {
    if let Some((_, table)) = CONCESSION_TABLES.iter().find(|(alias, _)| *alias == raw) {
        return Ok(table.to_string());
    }
    if is_identifier(raw) {
        Ok(raw.to_string())
    } else {
        Err(ForestChangeError::InvalidParameter {
            key: "use".to_string(),
            reason: format!("'{}' is not a concession table", raw),
        })
    }
}

/// Splits an `ifl_id1` parameter of the form `<iso>/<id1>`.
pub fn split_ifl_id1(raw: &str) -> Result<(&str, &str), ForestChangeError> {
    raw.split_once('/')
        .filter(|(iso, id1)| !iso.is_empty() && !id1.is_empty())
        .ok_or_else(|| ForestChangeError::InvalidParameter {
            key: "ifl_id1".to_string(),
            reason: format!("'{}' is not of the form <iso>/<id1>", raw),
        })
}

// ---------------------------------------------------------------------------
// Binder
// ---------------------------------------------------------------------------

/// Binds placeholders for one request against one data source.
pub struct Binder<'a> {
    pub source: &'a DataSource,
    pub params: &'a RequestParams,
    pub defaults: &'a DateDefaults,
    pub resolution: &'a TypeResolution,
}

impl<'a> Binder<'a> {
    fn required(&self, key: &str) -> Result<&'a str, ForestChangeError> {
        self.params
            .get(key)
            .ok_or_else(|| ForestChangeError::MissingParameter(key.to_string()))
    }

    fn date(&self, key: &str) -> Result<NaiveDate, ForestChangeError> {
        let fallback = match key {
            "begin" => self.defaults.begin,
            _ => self.defaults.end,
        };
        match (self.params.get(key), fallback) {
            (Some(raw), _) => parse_date(key, raw),
            (None, Some(default)) => Ok(default),
            (None, None) => Err(ForestChangeError::MissingParameter(key.to_string())),
        }
    }

    /// Value for one placeholder in the given query shape.
    pub fn bind(&self, name: &str, shape: Shape) -> Result<SqlValue, ForestChangeError> {
        let value = match name {
            "begin" => SqlValue::Date(self.date("begin")?),
            "end" => {
                let end = self.date("end")?;
                if let Ok(begin) = self.date("begin") {
                    if begin > end {
                        return Err(ForestChangeError::InvalidParameter {
                            key: "end".to_string(),
                            reason: format!("{} precedes begin {}", end, begin),
                        });
                    }
                }
                SqlValue::Date(end)
            }
            "iso" | "ifl" | "pa" => SqlValue::Text(self.required(name)?.to_string()),
            "id1" | "wdpaid" => SqlValue::Integer(parse_integer(name, self.required(name)?)?),
            "pid" => SqlValue::Integer(parse_integer("useid", self.required("useid")?)?),
            "use_table" => SqlValue::Identifier(concession_table(self.required("use")?)?),
            "geojson" => {
                let raw = self.required("geojson")?;
                let geometry: Value = serde_json::from_str(raw).map_err(|e| {
                    ForestChangeError::InvalidParameter {
                        key: "geojson".to_string(),
                        reason: e.to_string(),
                    }
                })?;
                SqlValue::GeoJson(geometry)
            }
            "ifl_iso" => {
                let (iso, _) = split_ifl_id1(self.required("ifl_id1")?)?;
                SqlValue::Text(iso.to_string())
            }
            "ifl_id1" => {
                let (_, id1) = split_ifl_id1(self.required("ifl_id1")?)?;
                SqlValue::Integer(parse_integer("ifl_id1", id1)?)
            }
            "the_geom" => match shape {
                Shape::Analysis => SqlValue::Clause(String::new()),
                Shape::Download => {
                    SqlValue::Clause(self.resolution.geometry_clause(self.source.geometry_alias))
                }
            },
            "additional_select" => match shape {
                Shape::Analysis => SqlValue::Clause(self.source.additional_select.to_string()),
                Shape::Download => SqlValue::Clause(String::new()),
            },
            "date_column" => {
                let column = if self.params.contains("alert_query") { "created_at" } else { "date" };
                SqlValue::Clause(column.to_string())
            }
            other => {
                return Err(ForestChangeError::UnknownPlaceholder {
                    source: self.source.id.slug(),
                    placeholder: other.to_string(),
                })
            }
        };
        Ok(value)
    }

    /// Fills every placeholder of `template`.
    pub fn fill(&self, template: &str, shape: Shape) -> Result<String, ForestChangeError> {
        let segments = parse_template(template).map_err(|problem| {
            ForestChangeError::RegistryInvalid(vec![format!("{}: {}", self.source.id, problem)])
        })?;

        let mut sql = String::with_capacity(template.len());
        for segment in segments {
            match segment {
                Segment::Literal(text) => sql.push_str(text),
                Segment::Placeholder(name) => sql.push_str(&self.bind(name, shape)?.to_string()),
            }
        }
        Ok(sql)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
