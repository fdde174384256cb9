//! Decoding directions-provider responses.
//!
//! Accepts the Mapbox Directions v5 response shape requested with
//! `geometries=geojson&steps=true`. Fetching the response is the host's
//! job; this module only turns the JSON into candidate [`Route`]s.

use serde::Deserialize;

use crate::error::{NavError, Result};
use crate::geo::{GeoPoint, Polyline};
use crate::route::{ManeuverModifier, ManeuverType, Route, Step};

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<RawRoute>,
}

#[derive(Debug, Deserialize)]
struct RawRoute {
    geometry: RawGeometry,
    distance: f64,
    duration: f64,
    #[serde(default)]
    legs: Vec<RawLeg>,
}

#[derive(Debug, Deserialize)]
struct RawGeometry {
    coordinates: Polyline,
}

#[derive(Debug, Deserialize)]
struct RawLeg {
    #[serde(default)]
    steps: Vec<RawStep>,
}

#[derive(Debug, Deserialize)]
struct RawStep {
    maneuver: RawManeuver,
    geometry: RawGeometry,
}

#[derive(Debug, Deserialize)]
struct RawManeuver {
    location: GeoPoint,
    #[serde(default)]
    instruction: String,
    #[serde(rename = "type")]
    kind: ManeuverType,
    #[serde(default)]
    modifier: ManeuverModifier,
}

impl From<RawRoute> for Route {
    fn from(raw: RawRoute) -> Self {
        // Multi-leg routes (via points) are flattened into one step list
        let steps = raw
            .legs
            .into_iter()
            .flat_map(|leg| leg.steps)
            .map(|s| Step {
                maneuver_location: s.maneuver.location,
                geometry: s.geometry.coordinates,
                instruction: s.maneuver.instruction,
                maneuver_type: s.maneuver.kind,
                modifier: s.maneuver.modifier,
            })
            .collect();

        Route {
            coordinates: raw.geometry.coordinates,
            steps,
            distance_m: raw.distance,
            duration_s: raw.duration,
        }
    }
}

/// All candidate routes in a directions response, provider order kept.
pub fn parse_routes(json: &str) -> Result<Vec<Route>> {
    let response: DirectionsResponse = serde_json::from_str(json)?;

    if let Some(code) = response.code.as_deref() {
        if code != "Ok" {
            let message = response.message.unwrap_or_default();
            return Err(NavError::Parse(format!("directions error {code}: {message}")));
        }
    }

    Ok(response.routes.into_iter().map(Route::from).collect())
}

/// The candidate route at `index`.
pub fn select_route(json: &str, index: usize) -> Result<Route> {
    let mut routes = parse_routes(json)?;
    let count = routes.len();
    if index >= count {
        return Err(NavError::Parse(format!(
            "route index {index} out of range ({count} routes)"
        )));
    }
    Ok(routes.swap_remove(index))
}
