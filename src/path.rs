//! Distance along a route polyline.
//!
//! Query points are snapped to polyline vertices and the distance is
//! summed along the polyline between them, plus the straight legs that
//! bridge the query points onto the path.

use crate::geo::{distance, segment_parameter, GeoPoint};

/// Index of the vertex nearest to `point`, scanning from `from` onward.
///
/// Ties resolve to the lowest index. Returns None if there are no
/// vertices at or after `from`.
pub fn nearest_vertex_from(point: &GeoPoint, polyline: &[GeoPoint], from: usize) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;

    for (i, vertex) in polyline.iter().enumerate().skip(from) {
        let d = distance(point, vertex);
        let is_better = match best {
            Some((_, best_d)) => d < best_d,
            None => true,
        };
        if is_better {
            best = Some((i, d));
        }
    }

    best.map(|(i, _)| i)
}

/// Index of the vertex nearest to `point` over the whole polyline.
pub fn nearest_vertex(point: &GeoPoint, polyline: &[GeoPoint]) -> Option<usize> {
    nearest_vertex_from(point, polyline, 0)
}

/// Distance in meters from `start` to `end` following `polyline`.
///
/// `end` is assumed to lie ahead of `start`: its vertex is searched
/// only at or after the start vertex, so a self-crossing path never
/// matches an earlier pass. When `start` sits past its nearest vertex
/// (already moving along the following segment), the snap-in leg goes
/// forward to the next vertex instead of back to the one behind it.
///
/// Never fails; an empty or single-point polyline yields only the snap
/// legs, and `path_distance(p, p, [p])` is zero.
pub fn path_distance(start: &GeoPoint, end: &GeoPoint, polyline: &[GeoPoint]) -> f64 {
    let Some(start_index) = nearest_vertex(start, polyline) else {
        return 0.0;
    };
    let end_index = nearest_vertex_from(end, polyline, start_index).unwrap_or(start_index);

    let mut from = start_index;
    if start_index < end_index {
        let t = segment_parameter(start, &polyline[start_index], &polyline[start_index + 1]);
        if t > 0.0 {
            from = start_index + 1;
        }
    }

    let snap_in = distance(start, &polyline[from]);
    let snap_out = distance(&polyline[end_index], end);

    let interior: f64 = if from < end_index {
        polyline[from..=end_index]
            .windows(2)
            .map(|w| distance(&w[0], &w[1]))
            .sum()
    } else {
        0.0
    };

    snap_in + interior + snap_out
}
