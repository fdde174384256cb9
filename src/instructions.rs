//! Turn-by-turn steps for bare polylines.
//!
//! GPX routes carry waypoints but no maneuvers. This module derives
//! maneuver steps from the bearing change at each waypoint so such a
//! route can be navigated like a provider route. Waypoints where the
//! path continues straight are folded into the current step.

use crate::error::{NavError, Result};
use crate::geo::{polyline_length, GeoPoint};
use crate::route::{ManeuverModifier, ManeuverType, Route, Step};

/// Assumed average cycling speed for duration estimates (m/s).
pub const CYCLING_SPEED_MPS: f64 = 4.5;

/// Build a navigable route along `points`.
///
/// Consecutive duplicate points are dropped first. Fails if fewer than
/// two distinct points remain.
pub fn route_from_polyline(points: &[GeoPoint]) -> Result<Route> {
    let mut coordinates: Vec<GeoPoint> = Vec::with_capacity(points.len());
    for p in points {
        if coordinates.last() != Some(p) {
            coordinates.push(*p);
        }
    }

    if coordinates.len() < 2 {
        return Err(NavError::MalformedRoute(
            "need at least two distinct points".into(),
        ));
    }

    let first = coordinates[0];
    let mut steps = vec![Step {
        maneuver_location: first,
        geometry: vec![first],
        instruction: format!("Head {}", cardinal(bearing(&first, &coordinates[1]))),
        maneuver_type: ManeuverType::Depart,
        modifier: ManeuverModifier::None,
    }];

    for w in coordinates.windows(3) {
        let (a, b, c) = (&w[0], &w[1], &w[2]);
        if let Some(current) = steps.last_mut() {
            current.geometry.push(*b);
        }

        let modifier = compute_turn(a, b, c);
        if modifier != ManeuverModifier::Straight {
            steps.push(Step {
                maneuver_location: *b,
                geometry: vec![*b],
                instruction: turn_to_text(modifier).to_string(),
                maneuver_type: ManeuverType::Turn,
                modifier,
            });
        }
    }

    let last = coordinates[coordinates.len() - 1];
    if let Some(current) = steps.last_mut() {
        current.geometry.push(last);
    }
    steps.push(Step {
        maneuver_location: last,
        geometry: vec![last],
        instruction: "Arrive at destination".to_string(),
        maneuver_type: ManeuverType::Arrive,
        modifier: ManeuverModifier::None,
    });

    let distance_m = polyline_length(&coordinates);
    Ok(Route {
        coordinates,
        steps,
        distance_m,
        duration_s: distance_m / CYCLING_SPEED_MPS,
    })
}

/// Turn direction at point B given the approach from A and the exit
/// toward C.
fn compute_turn(a: &GeoPoint, b: &GeoPoint, c: &GeoPoint) -> ManeuverModifier {
    let bearing_ab = bearing(a, b);
    let bearing_bc = bearing(b, c);

    // Relative angle: positive = right turn, negative = left turn
    let mut angle = bearing_bc - bearing_ab;

    // Normalize to [-180, 180]
    while angle > 180.0 {
        angle -= 360.0;
    }
    while angle < -180.0 {
        angle += 360.0;
    }

    classify_turn(angle)
}

/// Classify a relative bearing angle into a maneuver modifier.
fn classify_turn(angle: f64) -> ManeuverModifier {
    let abs_angle = angle.abs();

    if abs_angle > 170.0 {
        ManeuverModifier::UTurn
    } else if abs_angle > 120.0 {
        if angle > 0.0 { ManeuverModifier::SharpRight } else { ManeuverModifier::SharpLeft }
    } else if abs_angle > 60.0 {
        if angle > 0.0 { ManeuverModifier::Right } else { ManeuverModifier::Left }
    } else if abs_angle > 20.0 {
        if angle > 0.0 { ManeuverModifier::SlightRight } else { ManeuverModifier::SlightLeft }
    } else {
        ManeuverModifier::Straight
    }
}

/// Initial bearing from A to B in degrees [0, 360).
pub fn bearing(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();

    let bearing = y.atan2(x).to_degrees();
    (bearing + 360.0) % 360.0
}

fn cardinal(bearing: f64) -> &'static str {
    const NAMES: [&str; 8] = [
        "north", "northeast", "east", "southeast", "south", "southwest", "west", "northwest",
    ];
    NAMES[((bearing + 22.5) / 45.0) as usize % 8]
}

fn turn_to_text(modifier: ManeuverModifier) -> &'static str {
    match modifier {
        ManeuverModifier::Straight | ManeuverModifier::None => "Continue straight",
        ManeuverModifier::SlightLeft => "Keep slightly left",
        ManeuverModifier::Left => "Turn left",
        ManeuverModifier::SharpLeft => "Turn sharp left",
        ManeuverModifier::SlightRight => "Keep slightly right",
        ManeuverModifier::Right => "Turn right",
        ManeuverModifier::SharpRight => "Turn sharp right",
        ManeuverModifier::UTurn => "Make a U-turn",
    }
}
