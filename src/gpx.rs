//! GPX 1.1 file parsing.
//!
//! Wraps the `gpx` crate and extracts tracks, routes, and waypoints as
//! [`GeoPoint`] polylines. Planned GPX routes can be turned into a
//! navigable [`Route`](crate::route::Route) with
//! [`route_from_polyline`](crate::instructions::route_from_polyline);
//! recorded tracks make realistic replay feeds.

use serde::Serialize;
use std::io::Read;

use crate::error::{NavError, Result};
use crate::geo::{GeoPoint, Polyline};

/// A named polyline from a `<trk>` or `<rte>` element.
#[derive(Debug, Clone, Serialize)]
pub struct GpxPath {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub points: Polyline,
}

/// A single named point of interest.
#[derive(Debug, Clone, Serialize)]
pub struct Waypoint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub point: GeoPoint,
}

/// All data extracted from a GPX file.
#[derive(Debug, Clone, Serialize)]
pub struct GpxData {
    pub tracks: Vec<GpxPath>,
    pub routes: Vec<GpxPath>,
    pub waypoints: Vec<Waypoint>,
}

impl GpxData {
    /// The path to navigate: the first planned route with at least two
    /// points, falling back to the first such track.
    pub fn navigable_path(&self) -> Option<&GpxPath> {
        self.routes
            .iter()
            .chain(self.tracks.iter())
            .find(|p| p.points.len() >= 2)
    }
}

fn to_geo(wp: &gpx::Waypoint) -> GeoPoint {
    let p = wp.point();
    GeoPoint::new(p.x(), p.y())
}

/// Parse a GPX document from any reader.
pub fn parse<R: Read>(reader: R) -> Result<GpxData> {
    let gpx = gpx::read(reader).map_err(|e| NavError::Parse(format!("GPX parse error: {e}")))?;

    // Multi-segment tracks are flattened into a single polyline
    let tracks = gpx
        .tracks
        .iter()
        .map(|t| GpxPath {
            name: t.name.clone(),
            points: t
                .segments
                .iter()
                .flat_map(|seg| seg.points.iter())
                .map(to_geo)
                .collect(),
        })
        .collect();

    let routes = gpx
        .routes
        .iter()
        .map(|r| GpxPath {
            name: r.name.clone(),
            points: r.points.iter().map(to_geo).collect(),
        })
        .collect();

    let waypoints = gpx
        .waypoints
        .iter()
        .map(|wp| Waypoint {
            name: wp.name.clone(),
            point: to_geo(wp),
        })
        .collect();

    Ok(GpxData {
        tracks,
        routes,
        waypoints,
    })
}

/// Parse GPX from a byte slice. Convenience wrapper for JNI.
pub fn parse_bytes(data: &[u8]) -> Result<GpxData> {
    parse(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_GPX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test"
     xmlns="http://www.topografix.com/GPX/1/1">
  <trk>
    <name>Morning Ride</name>
    <trkseg>
      <trkpt lat="52.5170" lon="13.3889"><ele>34</ele></trkpt>
      <trkpt lat="52.5190" lon="13.3895"><ele>35</ele></trkpt>
    </trkseg>
    <trkseg>
      <trkpt lat="52.5195" lon="13.3950"></trkpt>
    </trkseg>
  </trk>
  <rte>
    <name>Canal Loop</name>
    <rtept lat="52.5000" lon="13.4000"></rtept>
    <rtept lat="52.5100" lon="13.4100"></rtept>
  </rte>
  <wpt lat="52.5163" lon="13.3777">
    <name>Brandenburger Tor</name>
  </wpt>
</gpx>"#;

    #[test]
    fn parse_tracks_flattens_segments() {
        let data = parse_bytes(MINIMAL_GPX.as_bytes()).unwrap();
        assert_eq!(data.tracks.len(), 1);
        assert_eq!(data.tracks[0].name.as_deref(), Some("Morning Ride"));
        assert_eq!(data.tracks[0].points.len(), 3);

        let p = data.tracks[0].points[0];
        assert!((p.lat - 52.5170).abs() < 1e-9);
        assert!((p.lon - 13.3889).abs() < 1e-9);
    }

    #[test]
    fn parse_route_and_waypoint() {
        let data = parse_bytes(MINIMAL_GPX.as_bytes()).unwrap();
        assert_eq!(data.routes.len(), 1);
        assert_eq!(data.routes[0].points.len(), 2);
        assert_eq!(data.waypoints[0].name.as_deref(), Some("Brandenburger Tor"));
        assert!((data.waypoints[0].point.lon - 13.3777).abs() < 1e-9);
    }

    #[test]
    fn navigable_path_prefers_routes() {
        let data = parse_bytes(MINIMAL_GPX.as_bytes()).unwrap();
        assert_eq!(data.navigable_path().unwrap().name.as_deref(), Some("Canal Loop"));
    }

    #[test]
    fn navigable_path_falls_back_to_track() {
        let gpx = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
  <trk><trkseg>
    <trkpt lat="48.0" lon="16.0"></trkpt>
    <trkpt lat="48.1" lon="16.1"></trkpt>
  </trkseg></trk>
</gpx>"#;
        let data = parse_bytes(gpx.as_bytes()).unwrap();
        assert_eq!(data.navigable_path().unwrap().points.len(), 2);
    }

    #[test]
    fn empty_gpx_has_no_navigable_path() {
        let empty = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
</gpx>"#;
        let data = parse_bytes(empty.as_bytes()).unwrap();
        assert!(data.tracks.is_empty());
        assert!(data.navigable_path().is_none());
    }

    #[test]
    fn invalid_xml_returns_error() {
        assert!(matches!(parse_bytes(b"not xml at all"), Err(NavError::Parse(_))));
    }
}
