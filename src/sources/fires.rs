//! NASA FIRMS active fire detections.
//!
//! Global coverage from the rolling seven-day MODIS table. Besides the
//! common scopes, fires can be counted inside intact forest landscapes
//! (for a country or one of its subdivisions) and inside all protected
//! areas of a country.

use super::{Coverage, DataSource, DataSourceId, DownloadStrategy, Metadata, Normalization, ScopeTemplate, ZeroRowDefault};
use crate::model::Scope;

const TEMPLATES: &[ScopeTemplate] = &[
    ScopeTemplate {
        scope: Scope::World,
        analysis: "
            SELECT COUNT(pt.*) AS value
            FROM global_7d pt
            WHERE pt.acq_date::date >= {begin}::date
                AND pt.acq_date::date <= {end}::date
                AND ST_INTERSECTS(
                    ST_SetSRID(ST_GeomFromGeoJSON({geojson}), 4326), pt.the_geom)",
        download: None,
    },
    ScopeTemplate {
        scope: Scope::Iso,
        analysis: "
            SELECT COUNT(pt.*) AS value
            FROM global_7d pt,
                (SELECT the_geom FROM gadm2_countries_simple
                 WHERE iso = UPPER({iso})) AS p
            WHERE ST_Intersects(pt.the_geom, p.the_geom)
                AND pt.acq_date::date >= {begin}::date
                AND pt.acq_date::date <= {end}::date",
        download: None,
    },
    ScopeTemplate {
        scope: Scope::Id1,
        analysis: "
            SELECT COUNT(pt.*) AS value
            FROM global_7d pt,
                (SELECT the_geom FROM gadm2_provinces_simple
                 WHERE iso = UPPER({iso}) AND id_1 = {id1}) AS p
            WHERE ST_Intersects(pt.the_geom, p.the_geom)
                AND pt.acq_date::date >= {begin}::date
                AND pt.acq_date::date <= {end}::date",
        download: None,
    },
    ScopeTemplate {
        scope: Scope::Wdpa,
        analysis: "
            SELECT COUNT(pt.*) AS value
            FROM global_7d pt,
                (SELECT the_geom FROM wdpa_protected_areas WHERE wdpaid = {wdpaid}) AS p
            WHERE ST_Intersects(pt.the_geom, p.the_geom)
                AND pt.acq_date::date >= {begin}::date
                AND pt.acq_date::date <= {end}::date",
        download: None,
    },
    ScopeTemplate {
        scope: Scope::Use,
        analysis: "
            SELECT COUNT(pt.*) AS value
            FROM {use_table} p, global_7d pt
            WHERE p.cartodb_id = {pid}
                AND ST_Intersects(pt.the_geom, p.the_geom)
                AND pt.acq_date::date >= {begin}::date
                AND pt.acq_date::date <= {end}::date",
        download: None,
    },
    ScopeTemplate {
        scope: Scope::Ifl,
        analysis: "
            SELECT COUNT(pt.*) AS value
            FROM global_7d pt,
                (SELECT the_geom FROM ifl_2013_deg WHERE iso = UPPER({ifl})) AS p
            WHERE ST_Intersects(pt.the_geom, p.the_geom)
                AND pt.acq_date::date >= {begin}::date
                AND pt.acq_date::date <= {end}::date",
        download: None,
    },
    ScopeTemplate {
        scope: Scope::IflId1,
        analysis: "
            SELECT COUNT(pt.*) AS value
            FROM global_7d pt,
                (SELECT ST_Intersection(ifl.the_geom, g.the_geom) AS the_geom
                 FROM ifl_2013_deg ifl, gadm2_provinces_simple g
                 WHERE g.iso = UPPER({ifl_iso})
                    AND g.id_1 = {ifl_id1}
                    AND ST_Intersects(ifl.the_geom, g.the_geom)) AS p
            WHERE ST_Intersects(pt.the_geom, p.the_geom)
                AND pt.acq_date::date >= {begin}::date
                AND pt.acq_date::date <= {end}::date",
        download: None,
    },
    ScopeTemplate {
        scope: Scope::Pa,
        analysis: "
            SELECT COUNT(pt.*) AS value
            FROM global_7d pt,
                (SELECT the_geom FROM wdpa_protected_areas WHERE iso3 = UPPER({pa})) AS p
            WHERE ST_Intersects(pt.the_geom, p.the_geom)
                AND pt.acq_date::date >= {begin}::date
                AND pt.acq_date::date <= {end}::date",
        download: None,
    },
];

pub const FIRES: DataSource = DataSource {
    id: DataSourceId::Fires,
    meta: Metadata {
        description: "Fire alerts detected by NASA's MODIS sensors within the last seven days.",
        resolution: "1 x 1 kilometer",
        coverage: "Global",
        timescale: "Last 7 days",
        updates: "Daily",
        source: "MODIS / NASA FIRMS",
        units: "Fire alerts",
        name: "NASA Active Fires",
        id: "nasa-active-fires",
    },
    templates: TEMPLATES,
    download: DownloadStrategy::Rewrite(&[(
        "SELECT COUNT(pt.*) AS value",
        "SELECT pt.acq_date, pt.acq_time, pt.latitude, pt.longitude, pt.confidence, pt.brightness{the_geom}",
    )]),
    geometry_alias: Some("pt"),
    additional_select: "",
    coverage: Coverage::Global,
    normalization: Normalization::SingleValue { default: ZeroRowDefault::Null },
};
