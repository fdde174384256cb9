//! Map matching against a single step's geometry.

use crate::geo::{distance, distance_to_segment, GeoPoint};
use crate::route::Step;

/// Smallest distance in meters from `position` to any segment of `path`.
///
/// A single-point path is treated as that point. Returns None for an
/// empty path.
pub fn distance_to_path(position: &GeoPoint, path: &[GeoPoint]) -> Option<f64> {
    match path {
        [] => None,
        [only] => Some(distance(position, only)),
        _ => path
            .windows(2)
            .map(|w| distance_to_segment(position, &w[0], &w[1]))
            .reduce(f64::min),
    }
}

/// Whether `position` lies inside the corridor of half-width
/// `threshold_m` around the step's own geometry.
pub fn is_on_path(position: &GeoPoint, step: &Step, threshold_m: f64) -> bool {
    distance_to_path(position, &step.geometry).is_some_and(|d| d < threshold_m)
}
