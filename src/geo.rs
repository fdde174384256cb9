//! Geodesy primitives.
//!
//! Pure functions over WGS84 coordinates (degrees). Distances are
//! great-circle haversine distances on a spherical Earth; segment
//! projection uses a plain equirectangular approximation that is only
//! meant for city-scale segments (a few kilometers at most).

use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A geographic position, longitude first.
///
/// Serialized as a `[lon, lat]` pair, matching GeoJSON coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

impl GeoPoint {
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

impl From<[f64; 2]> for GeoPoint {
    fn from([lon, lat]: [f64; 2]) -> Self {
        Self { lon, lat }
    }
}

impl From<GeoPoint> for [f64; 2] {
    fn from(p: GeoPoint) -> Self {
        [p.lon, p.lat]
    }
}

/// Ordered points in direction of travel.
pub type Polyline = Vec<GeoPoint>;

/// Haversine distance between two points in meters.
pub fn distance(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);

    // min() guards against h drifting past 1.0 for antipodal points
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Total length of a polyline in meters.
pub fn polyline_length(points: &[GeoPoint]) -> f64 {
    points
        .windows(2)
        .map(|w| distance(&w[0], &w[1]))
        .sum()
}

/// Interpolation parameter of `p` projected onto segment `a`-`b`,
/// clamped to `[0, 1]`.
///
/// Works in raw radian space without latitude correction. Returns 0
/// for a zero-length segment.
pub fn segment_parameter(p: &GeoPoint, a: &GeoPoint, b: &GeoPoint) -> f64 {
    let (ax, ay) = (a.lon.to_radians(), a.lat.to_radians());
    let (bx, by) = (b.lon.to_radians(), b.lat.to_radians());
    let (px, py) = (p.lon.to_radians(), p.lat.to_radians());

    let dx = bx - ax;
    let dy = by - ay;
    let len_sq = dx * dx + dy * dy;

    if len_sq == 0.0 {
        return 0.0;
    }

    (((px - ax) * dx + (py - ay) * dy) / len_sq).clamp(0.0, 1.0)
}

/// Distance in meters from `p` to the closest point of segment `a`-`b`.
///
/// The closest point is located in equirectangular space, then the
/// distance to it is measured with haversine.
pub fn distance_to_segment(p: &GeoPoint, a: &GeoPoint, b: &GeoPoint) -> f64 {
    if a == b {
        return distance(p, a);
    }

    let t = segment_parameter(p, a, b);
    let (ax, ay) = (a.lon.to_radians(), a.lat.to_radians());
    let (bx, by) = (b.lon.to_radians(), b.lat.to_radians());

    let closest = GeoPoint {
        lon: (ax + t * (bx - ax)).to_degrees(),
        lat: (ay + t * (by - ay)).to_degrees(),
    };

    distance(p, &closest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(lon: f64, lat: f64) -> GeoPoint {
        GeoPoint::new(lon, lat)
    }

    #[test]
    fn distance_same_point_is_zero() {
        let p = pt(16.3738, 48.2082);
        assert_eq!(distance(&p, &p), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = pt(16.3738, 48.2082);
        let b = pt(17.1077, 48.1486);
        assert_eq!(distance(&a, &b), distance(&b, &a));
    }

    #[test]
    fn distance_one_degree_latitude() {
        let d = distance(&pt(0.0, 0.0), &pt(0.0, 1.0));
        assert!((d - 111_194.9).abs() < 1.0, "Expected ~111195 m, got {d:.1}");
    }

    #[test]
    fn distance_vienna_bratislava() {
        let d = distance(&pt(16.3738, 48.2082), &pt(17.1077, 48.1486));
        assert!(d > 50_000.0 && d < 60_000.0, "Expected ~55 km, got {d:.0} m");
    }

    #[test]
    fn polyline_length_sums_legs() {
        let line = vec![pt(0.0, 0.0), pt(0.0, 0.01), pt(0.0, 0.02)];
        let len = polyline_length(&line);
        let expected = distance(&pt(0.0, 0.0), &pt(0.0, 0.02));
        assert!((len - expected).abs() < 1e-6);
        assert_eq!(polyline_length(&line[..1]), 0.0);
    }

    #[test]
    fn segment_degenerate_matches_point_distance() {
        let p = pt(13.40, 52.52);
        let a = pt(13.41, 52.53);
        assert_eq!(distance_to_segment(&p, &a, &a), distance(&p, &a));
    }

    #[test]
    fn segment_point_on_segment_is_zero() {
        let d = distance_to_segment(&pt(0.0, 0.005), &pt(0.0, 0.0), &pt(0.0, 0.01));
        assert!(d < 1e-6, "Expected 0, got {d}");
    }

    #[test]
    fn segment_perpendicular_offset() {
        // Segment along the equator, point 0.001 deg north of its middle
        let d = distance_to_segment(&pt(0.005, 0.001), &pt(0.0, 0.0), &pt(0.01, 0.0));
        let expected = distance(&pt(0.005, 0.001), &pt(0.005, 0.0));
        assert!((d - expected).abs() < 0.01, "Expected {expected:.2}, got {d:.2}");
    }

    #[test]
    fn segment_clamps_beyond_end() {
        let a = pt(0.0, 0.0);
        let b = pt(0.0, 0.01);
        let p = pt(0.0, 0.02);
        let d = distance_to_segment(&p, &a, &b);
        assert!((d - distance(&p, &b)).abs() < 1e-6);
        assert_eq!(segment_parameter(&p, &a, &b), 1.0);
    }

    #[test]
    fn segment_parameter_before_start_is_zero() {
        let t = segment_parameter(&pt(0.0, -0.01), &pt(0.0, 0.0), &pt(0.0, 0.01));
        assert_eq!(t, 0.0);
    }

    #[test]
    fn geopoint_serializes_as_lon_lat_pair() {
        let json = serde_json::to_string(&pt(13.4, 52.5)).unwrap();
        assert_eq!(json, "[13.4,52.5]");
        let back: GeoPoint = serde_json::from_str("[13.4,52.5]").unwrap();
        assert_eq!(back, pt(13.4, 52.5));
    }
}
