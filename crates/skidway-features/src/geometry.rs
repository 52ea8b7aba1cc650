//! Point geometry and the WGS84 → Web Mercator projection.
//!
//! The hosted layers store geometry in Web Mercator (wkid 3857) while
//! the sheet carries plain lon/lat degrees, so the importer projects at
//! the edge with the closed-form spherical formula.

use serde::{Deserialize, Serialize};

/// Web Mercator well-known id.
pub const WEB_MERCATOR_WKID: u32 = 3857;

/// Half the Web Mercator extent in meters.
const ORIGIN_SHIFT: f64 = 20_037_508.342_789_244;

/// A point in the layer's spatial reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointGeometry {
    pub x: f64,
    pub y: f64,
    #[serde(rename = "spatialReference")]
    pub spatial_reference: SpatialReference,
}

/// Spatial reference by well-known id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpatialReference {
    pub wkid: u32,
}

impl PointGeometry {
    /// Project WGS84 lon/lat degrees to a Web Mercator point.
    ///
    /// Latitude is clamped to the Mercator-valid ±85.05113° band.
    #[must_use]
    pub fn from_lon_lat(lon: f64, lat: f64) -> Self {
        let lat = lat.clamp(-85.051_128_779_806_59, 85.051_128_779_806_59);
        let x = lon * ORIGIN_SHIFT / 180.0;
        let y = ((90.0 + lat) * std::f64::consts::PI / 360.0).tan().ln()
            / (std::f64::consts::PI / 180.0)
            * ORIGIN_SHIFT
            / 180.0;
        Self {
            x,
            y,
            spatial_reference: SpatialReference {
                wkid: WEB_MERCATOR_WKID,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.5
    }

    #[test]
    fn origin_projects_to_origin() {
        let p = PointGeometry::from_lon_lat(0.0, 0.0);
        assert!(close(p.x, 0.0));
        assert!(close(p.y, 0.0));
        assert_eq!(p.spatial_reference.wkid, WEB_MERCATOR_WKID);
    }

    /// Invert the spherical Mercator projection (test-side check).
    fn unproject(p: &PointGeometry) -> (f64, f64) {
        let lon = p.x / ORIGIN_SHIFT * 180.0;
        let lat_merc = p.y / ORIGIN_SHIFT * 180.0;
        let lat = 360.0 / std::f64::consts::PI
            * ((lat_merc * std::f64::consts::PI / 180.0).exp()).atan()
            - 90.0;
        (lon, lat)
    }

    #[test]
    fn salt_lake_city_x_is_linear_in_longitude() {
        let p = PointGeometry::from_lon_lat(-111.891, 40.7608);
        // x = lon * ORIGIN_SHIFT / 180, exactly.
        assert!((p.x - (-111.891 * ORIGIN_SHIFT / 180.0)).abs() < 1e-6);
        assert!(p.y > 4_900_000.0 && p.y < 5_100_000.0);
    }

    #[test]
    fn projection_round_trips() {
        let p = PointGeometry::from_lon_lat(-111.891, 40.7608);
        let (lon, lat) = unproject(&p);
        assert!((lon - -111.891).abs() < 1e-9);
        assert!((lat - 40.7608).abs() < 1e-9);
    }

    #[test]
    fn latitude_is_clamped_to_mercator_band() {
        let p = PointGeometry::from_lon_lat(0.0, 90.0);
        assert!(p.y.is_finite());
    }
}
