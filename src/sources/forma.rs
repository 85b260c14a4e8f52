//! FORMA: MODIS-based forest disturbance alerts for the humid tropics.
//!
//! Analysis queries count alert points. FORMA keeps explicit download
//! templates that select the alert rows themselves, with the geometry
//! column added for spatial export formats.

use super::{Coverage, DataSource, DataSourceId, DownloadStrategy, Metadata, Normalization, ScopeTemplate, ZeroRowDefault};
use crate::model::Scope;

const TEMPLATES: &[ScopeTemplate] = &[
    ScopeTemplate {
        scope: Scope::World,
        analysis: "
            SELECT COUNT(f.*) AS value
            FROM forma_api f
            WHERE f.{date_column} >= {begin}::date
                AND f.{date_column} <= {end}::date
                AND ST_INTERSECTS(
                    ST_SetSRID(ST_GeomFromGeoJSON({geojson}), 4326), f.the_geom)",
        download: Some("
            SELECT f.iso, f.{date_column} AS date, f.lat, f.lon{the_geom}
            FROM forma_api f
            WHERE f.{date_column} >= {begin}::date
                AND f.{date_column} <= {end}::date
                AND ST_INTERSECTS(
                    ST_SetSRID(ST_GeomFromGeoJSON({geojson}), 4326), f.the_geom)"),
    },
    ScopeTemplate {
        scope: Scope::Iso,
        analysis: "
            SELECT COUNT(f.*) AS value
            FROM forma_api f
            WHERE f.iso = UPPER({iso})
                AND f.{date_column} >= {begin}::date
                AND f.{date_column} <= {end}::date",
        download: Some("
            SELECT f.iso, f.{date_column} AS date, f.lat, f.lon{the_geom}
            FROM forma_api f
            WHERE f.iso = UPPER({iso})
                AND f.{date_column} >= {begin}::date
                AND f.{date_column} <= {end}::date"),
    },
    ScopeTemplate {
        scope: Scope::Id1,
        analysis: "
            SELECT COUNT(f.*) AS value
            FROM forma_api f
            INNER JOIN (
                SELECT objectid
                FROM gadm2
                WHERE iso = UPPER({iso}) AND id_1 = {id1}) g
                ON f.gadm2::int = g.objectid
            WHERE f.{date_column} >= {begin}::date
                AND f.{date_column} <= {end}::date",
        download: Some("
            SELECT f.iso, f.{date_column} AS date, f.lat, f.lon{the_geom}
            FROM forma_api f
            INNER JOIN (
                SELECT objectid
                FROM gadm2
                WHERE iso = UPPER({iso}) AND id_1 = {id1}) g
                ON f.gadm2::int = g.objectid
            WHERE f.{date_column} >= {begin}::date
                AND f.{date_column} <= {end}::date"),
    },
    ScopeTemplate {
        scope: Scope::Wdpa,
        analysis: "
            SELECT COUNT(f.*) AS value
            FROM forma_api f,
                (SELECT the_geom FROM wdpa_protected_areas WHERE wdpaid = {wdpaid}) p
            WHERE ST_Intersects(f.the_geom, p.the_geom)
                AND f.{date_column} >= {begin}::date
                AND f.{date_column} <= {end}::date",
        download: Some("
            SELECT f.iso, f.{date_column} AS date, f.lat, f.lon{the_geom}
            FROM forma_api f,
                (SELECT the_geom FROM wdpa_protected_areas WHERE wdpaid = {wdpaid}) p
            WHERE ST_Intersects(f.the_geom, p.the_geom)
                AND f.{date_column} >= {begin}::date
                AND f.{date_column} <= {end}::date"),
    },
    ScopeTemplate {
        scope: Scope::Use,
        analysis: "
            SELECT COUNT(f.*) AS value
            FROM {use_table} u, forma_api f
            WHERE u.cartodb_id = {pid}
                AND ST_Intersects(f.the_geom, u.the_geom)
                AND f.{date_column} >= {begin}::date
                AND f.{date_column} <= {end}::date",
        download: Some("
            SELECT f.iso, f.{date_column} AS date, f.lat, f.lon{the_geom}
            FROM {use_table} u, forma_api f
            WHERE u.cartodb_id = {pid}
                AND ST_Intersects(f.the_geom, u.the_geom)
                AND f.{date_column} >= {begin}::date
                AND f.{date_column} <= {end}::date"),
    },
];

pub const FORMA: DataSource = DataSource {
    id: DataSourceId::Forma,
    meta: Metadata {
        description: "Alerts where forest disturbances have likely occurred.",
        resolution: "500 x 500 meters",
        coverage: "Humid tropical forest biome",
        timescale: "January 2006 to present",
        updates: "16 day",
        source: "MODIS",
        units: "Alerts",
        name: "FORMA",
        id: "forma-alerts",
    },
    templates: TEMPLATES,
    download: DownloadStrategy::Templates,
    geometry_alias: Some("f"),
    additional_select: "",
    coverage: Coverage::Global,
    normalization: Normalization::SingleValue { default: ZeroRowDefault::Zero },
};
