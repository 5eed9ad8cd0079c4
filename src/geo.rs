//! Great-circle distance and nearest-neighbor lookup for spatial constraints.
//!
//! Stateless helpers used by the reference cache to resolve a submitted
//! coordinate to the closest known reference entry.

use crate::model::{Coordinate, ReferenceEntry};

/// Mean earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two coordinates in kilometers.
pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Find the entry closest to `origin`, ignoring entries farther than
/// `max_distance_km`.
///
/// Ties are broken by iteration order: the first entry achieving the minimum
/// distance wins. Callers that need deterministic behavior pass entries
/// sorted by id, making the smallest id win among equidistant candidates.
pub fn nearest_within<'a>(
    origin: Coordinate,
    entries: &'a [ReferenceEntry],
    max_distance_km: f64,
) -> Option<(&'a ReferenceEntry, f64)> {
    let mut best: Option<(&ReferenceEntry, f64)> = None;

    for entry in entries {
        let distance = haversine_km(origin, entry.coordinate());
        if distance > max_distance_km {
            continue;
        }
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((entry, distance)),
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, latitude: f64, longitude: f64) -> ReferenceEntry {
        ReferenceEntry {
            id: id.to_string(),
            latitude,
            longitude,
        }
    }

    #[test]
    fn distance_zero_for_identical_points() {
        let p = Coordinate::new(48.137, 11.575);
        assert!(haversine_km(p, p) < 1e-9);
    }

    #[test]
    fn distance_munich_to_berlin() {
        // Munich city center to Berlin city center is roughly 504 km.
        let munich = Coordinate::new(48.137, 11.575);
        let berlin = Coordinate::new(52.520, 13.405);
        let d = haversine_km(munich, berlin);
        assert!((500.0..510.0).contains(&d), "got {d}");
    }

    #[test]
    fn distance_is_symmetric() {
        let a = Coordinate::new(-33.868, 151.209);
        let b = Coordinate::new(51.507, -0.128);
        assert!((haversine_km(a, b) - haversine_km(b, a)).abs() < 1e-9);
    }

    #[test]
    fn nearest_picks_closest_entry() {
        let entries = vec![
            entry("far", 50.0, 11.0),
            entry("near", 48.2, 11.6),
            entry("mid", 49.0, 11.0),
        ];
        let (found, distance) =
            nearest_within(Coordinate::new(48.137, 11.575), &entries, 500.0).unwrap();
        assert_eq!(found.id, "near");
        assert!(distance < 10.0);
    }

    #[test]
    fn nearest_respects_max_distance() {
        let entries = vec![entry("only", 52.520, 13.405)];
        let origin = Coordinate::new(48.137, 11.575);
        assert!(nearest_within(origin, &entries, 100.0).is_none());
        assert!(nearest_within(origin, &entries, 600.0).is_some());
    }

    #[test]
    fn nearest_on_empty_set_is_none() {
        assert!(nearest_within(Coordinate::new(0.0, 0.0), &[], 1000.0).is_none());
    }

    #[test]
    fn exact_match_always_resolves() {
        let entries = vec![entry("exact", 48.137, 11.575)];
        let (found, distance) =
            nearest_within(Coordinate::new(48.137, 11.575), &entries, 0.0).unwrap();
        assert_eq!(found.id, "exact");
        assert!(distance < 1e-9);
    }

    #[test]
    fn tie_break_prefers_first_in_iteration_order() {
        // Two entries at the same point; with the slice sorted by id the
        // smaller id must win.
        let entries = vec![entry("station-a", 48.0, 11.0), entry("station-b", 48.0, 11.0)];
        let (found, _) = nearest_within(Coordinate::new(48.0, 11.0), &entries, 10.0).unwrap();
        assert_eq!(found.id, "station-a");
    }
}
