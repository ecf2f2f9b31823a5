//! Geographic calculations

use crate::defaults::{AVERAGE_SPEED_MPH, EARTH_RADIUS_MILES, ROAD_COEFFICIENT};
use crate::types::Coordinates;

/// Above this many points the diameter switches to the farthest-point sweep.
const EXACT_DIAMETER_LIMIT: usize = 256;

/// Calculate great-circle (haversine) distance between two points in miles.
pub fn distance_miles(from: &Coordinates, to: &Coordinates) -> f64 {
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lon = (to.lon - from.lon).to_radians();

    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_MILES * c
}

/// Estimate road distance from straight-line distance.
pub fn road_miles(from: &Coordinates, to: &Coordinates) -> f64 {
    distance_miles(from, to) * ROAD_COEFFICIENT
}

/// Estimate travel time in whole minutes.
pub fn travel_minutes(from: &Coordinates, to: &Coordinates) -> u32 {
    ((road_miles(from, to) / AVERAGE_SPEED_MPH) * 60.0).round() as u32
}

/// Geographic centroid of a point set. Falls back to (0, 0) for an empty
/// slice, matching the virtual-hub convention.
pub fn centroid(points: &[Coordinates]) -> Coordinates {
    if points.is_empty() {
        return Coordinates { lat: 0.0, lon: 0.0 };
    }
    let n = points.len() as f64;
    Coordinates {
        lat: points.iter().map(|p| p.lat).sum::<f64>() / n,
        lon: points.iter().map(|p| p.lon).sum::<f64>() / n,
    }
}

/// Maximum pairwise distance of a point set in miles.
///
/// Small sets are computed exactly; larger sets use a farthest-point sweep
/// that walks to the farthest neighbour a few times. The sweep can
/// under-estimate slightly, never over-estimate.
pub fn bounding_diameter_miles(points: &[Coordinates]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    if points.len() <= EXACT_DIAMETER_LIMIT {
        let mut max = 0.0f64;
        for i in 0..points.len() {
            for j in (i + 1)..points.len() {
                max = max.max(distance_miles(&points[i], &points[j]));
            }
        }
        return max;
    }

    let mut current = 0usize;
    let mut best = 0.0f64;
    for _ in 0..3 {
        let mut farthest = current;
        let mut farthest_distance = 0.0f64;
        for (i, p) in points.iter().enumerate() {
            let d = distance_miles(&points[current], p);
            if d > farthest_distance {
                farthest_distance = d;
                farthest = i;
            }
        }
        best = best.max(farthest_distance);
        current = farthest;
    }
    best
}
