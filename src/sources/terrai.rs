//! Terra-i: vegetation loss alerts for Latin America.
//!
//! Terra-i does not store an alert date. Each alert carries a `grid_code`
//! numbering 16-day MODIS periods, 23 per year, starting in 2004; the
//! period start date is recomputed from it inside every query.

use super::{Coverage, DataSource, DataSourceId, DownloadStrategy, Metadata, Normalization, ScopeTemplate, ZeroRowDefault};
use crate::model::Scope;

const TEMPLATES: &[ScopeTemplate] = &[
    ScopeTemplate {
        scope: Scope::World,
        analysis: "
            SELECT COUNT(f.*) AS value
            FROM terra_i_decrease f
            WHERE DATE((2004 + FLOOR((f.grid_code - 1) / 23))::text || '-01-01')
                    + (MOD(f.grid_code, 23) * 16) >= {begin}::date
                AND DATE((2004 + FLOOR((f.grid_code - 1) / 23))::text || '-01-01')
                    + (MOD(f.grid_code, 23) * 16) <= {end}::date
                AND ST_INTERSECTS(
                    ST_SetSRID(ST_GeomFromGeoJSON({geojson}), 4326), f.the_geom)",
        download: None,
    },
    ScopeTemplate {
        scope: Scope::Iso,
        analysis: "
            SELECT COUNT(f.*) AS value
            FROM terra_i_decrease f,
                (SELECT the_geom FROM gadm2_countries_simple
                 WHERE iso = UPPER({iso})) AS p
            WHERE ST_Intersects(f.the_geom, p.the_geom)
                AND DATE((2004 + FLOOR((f.grid_code - 1) / 23))::text || '-01-01')
                    + (MOD(f.grid_code, 23) * 16) >= {begin}::date
                AND DATE((2004 + FLOOR((f.grid_code - 1) / 23))::text || '-01-01')
                    + (MOD(f.grid_code, 23) * 16) <= {end}::date",
        download: None,
    },
    ScopeTemplate {
        scope: Scope::Id1,
        analysis: "
            SELECT COUNT(f.*) AS value
            FROM terra_i_decrease f
            INNER JOIN (
                SELECT objectid
                FROM gadm2
                WHERE id_1 = {id1}
                    AND iso = UPPER({iso})) g
                ON f.gadm2::int = g.objectid
            WHERE DATE((2004 + FLOOR((f.grid_code - 1) / 23))::text || '-01-01')
                    + (MOD(f.grid_code, 23) * 16) >= {begin}::date
                AND DATE((2004 + FLOOR((f.grid_code - 1) / 23))::text || '-01-01')
                    + (MOD(f.grid_code, 23) * 16) <= {end}::date",
        download: None,
    },
    ScopeTemplate {
        scope: Scope::Wdpa,
        analysis: "
            SELECT COUNT(f.*) AS value
            FROM terra_i_decrease f,
                (SELECT the_geom FROM wdpa_all WHERE wdpaid = {wdpaid}) AS p
            WHERE ST_Intersects(f.the_geom, p.the_geom)
                AND DATE((2004 + FLOOR((f.grid_code - 1) / 23))::text || '-01-01')
                    + (MOD(f.grid_code, 23) * 16) >= {begin}::date
                AND DATE((2004 + FLOOR((f.grid_code - 1) / 23))::text || '-01-01')
                    + (MOD(f.grid_code, 23) * 16) <= {end}::date",
        download: None,
    },
    ScopeTemplate {
        scope: Scope::Use,
        analysis: "
            SELECT COUNT(f.*) AS value
            FROM {use_table} u, terra_i_decrease f
            WHERE u.cartodb_id = {pid}
                AND ST_Intersects(f.the_geom, u.the_geom)
                AND DATE((2004 + FLOOR((f.grid_code - 1) / 23))::text || '-01-01')
                    + (MOD(f.grid_code, 23) * 16) >= {begin}::date
                AND DATE((2004 + FLOOR((f.grid_code - 1) / 23))::text || '-01-01')
                    + (MOD(f.grid_code, 23) * 16) <= {end}::date",
        download: None,
    },
];

pub const TERRAI: DataSource = DataSource {
    id: DataSourceId::TerraI,
    meta: Metadata {
        description: "Areas where natural vegetation has been lost, detected from MODIS NDVI.",
        resolution: "250 x 250 meters",
        coverage: "Latin America",
        timescale: "January 2004 to present",
        updates: "16 day",
        source: "MODIS",
        units: "Alerts",
        name: "Terra-i",
        id: "terrai-alerts",
    },
    templates: TEMPLATES,
    // The full alert row already includes its geometry.
    download: DownloadStrategy::Rewrite(&[("SELECT COUNT(f.*) AS value", "SELECT f.*")]),
    geometry_alias: None,
    additional_select: "",
    coverage: Coverage::Global,
    normalization: Normalization::SingleValue { default: ZeroRowDefault::Null },
};
