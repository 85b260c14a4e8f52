//! Imazon SAD: deforestation and degradation alerts for the Brazilian Amazon.
//!
//! Results are areas in hectares, one row per disturbance type. Imazon has
//! no data outside Brazil, so its country scope covers the whole table.

use super::{Coverage, DataSource, DataSourceId, DownloadStrategy, Metadata, Normalization, ScopeTemplate};
use crate::model::Scope;

const TEMPLATES: &[ScopeTemplate] = &[
    ScopeTemplate {
        scope: Scope::World,
        analysis: "
            WITH poly AS (
                SELECT * FROM ST_SetSRID(ST_GeomFromGeoJSON({geojson}), 4326) geojson)
            SELECT data_type,
                SUM(ST_Area(ST_Intersection(
                    ST_Transform(poly.geojson, 3857),
                    i.the_geom_webmercator))/(100*100)) AS value{additional_select}
            FROM imazon_sad i, poly
            WHERE i.date >= {begin}::date
                AND i.date <= {end}::date
            GROUP BY data_type",
        download: None,
    },
    ScopeTemplate {
        scope: Scope::Iso,
        analysis: "
            SELECT data_type,
                SUM(ST_Area(i.the_geom_webmercator)/(100*100)) AS value{additional_select}
            FROM imazon_sad i
            WHERE i.date >= {begin}::date
                AND i.date <= {end}::date
            GROUP BY data_type",
        download: None,
    },
    ScopeTemplate {
        scope: Scope::Id1,
        analysis: "
            SELECT data_type,
                SUM(ST_Area(ST_Intersection(
                    i.the_geom_webmercator,
                    p.the_geom_webmercator))/(100*100)) AS value{additional_select}
            FROM imazon_sad i,
                (SELECT *
                    FROM gadm2_provinces_simple
                    WHERE iso = UPPER({iso}) AND id_1 = {id1}) AS p
            WHERE i.date >= {begin}::date
                AND i.date <= {end}::date
            GROUP BY data_type",
        download: None,
    },
    ScopeTemplate {
        scope: Scope::Wdpa,
        analysis: "
            SELECT data_type,
                SUM(ST_Area(ST_Intersection(
                    i.the_geom_webmercator,
                    p.the_geom_webmercator))/(100*100)) AS value{additional_select}
            FROM (
                SELECT CASE
                    WHEN marine::numeric = 2 THEN NULL
                    WHEN ST_NPoints(the_geom_webmercator) <= 18000 THEN the_geom_webmercator
                    WHEN ST_NPoints(the_geom_webmercator) BETWEEN 18000 AND 50000
                        THEN ST_RemoveRepeatedPoints(the_geom_webmercator, 100)
                    ELSE ST_RemoveRepeatedPoints(the_geom_webmercator, 1000)
                    END AS the_geom_webmercator
                FROM wdpa_protected_areas
                WHERE wdpaid = {wdpaid}) p,
                imazon_sad i
            WHERE i.date >= {begin}::date
                AND i.date <= {end}::date
            GROUP BY data_type",
        download: None,
    },
    ScopeTemplate {
        scope: Scope::Use,
        analysis: "
            SELECT data_type,
                SUM(ST_Area(ST_Intersection(
                    i.the_geom_webmercator,
                    p.the_geom_webmercator))/(100*100)) AS value{additional_select}
            FROM {use_table} p, imazon_sad i
            WHERE p.cartodb_id = {pid}
                AND i.date >= {begin}::date
                AND i.date <= {end}::date
            GROUP BY data_type",
        download: None,
    },
];

pub const IMAZON: DataSource = DataSource {
    id: DataSourceId::Imazon,
    meta: Metadata {
        description: "Deforestation and forest degradation alerts from the Brazilian Amazon.",
        resolution: "250 x 250 meters",
        coverage: "Brazilian Amazon",
        timescale: "January 2007 to present",
        updates: "Monthly",
        source: "MODIS",
        units: "hectares",
        name: "SAD alerts",
        id: "imazon-alerts",
    },
    templates: TEMPLATES,
    // Downloads keep the disturbance rows and, for spatial formats, the
    // geometry they were measured on.
    download: DownloadStrategy::Rewrite(&[
        ("SELECT data_type,", "SELECT i.data_type{the_geom},"),
        ("GROUP BY data_type", "GROUP BY i.data_type{the_geom}"),
    ]),
    geometry_alias: Some("i"),
    additional_select: ", MIN(i.date) AS min_date, MAX(i.date) AS max_date",
    coverage: Coverage::Country("bra"),
    normalization: Normalization::Categories { categories: &["defor", "degrad"] },
};
