//! Geo utilities (C13): haversine distance and a `rstar`-backed 2-D
//! nearest-neighbor index, built once from a fixed array of points.

use rstar::primitives::GeomWithData;
use rstar::RTree;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two (lat, lon) points in meters.
///
/// Symmetric and non-negative; equals 0 iff the points coincide (mod
/// floating point error).
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

type Indexed = GeomWithData<[f64; 2], usize>;

/// A nearest-neighbor index over a fixed set of (lon, lat) points, queried by
/// point index so callers can carry their own payload alongside coordinates.
pub struct NearestIndex {
    tree: RTree<Indexed>,
    points: Vec<(f64, f64)>,
}

impl NearestIndex {
    /// Builds an index from `(lon, lat)` points. The point at index `i` in
    /// `points` is returned as `i` from `around`.
    pub fn build(points: &[(f64, f64)]) -> Self {
        let entries: Vec<Indexed> = points
            .iter()
            .enumerate()
            .map(|(i, (lon, lat))| GeomWithData::new([*lon, *lat], i))
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
            points: points.to_vec(),
        }
    }

    /// Returns up to `max_results` point indices within `max_km` of `(lon,
    /// lat)`, in ascending distance order. Does not include the query point
    /// itself if it happens to be one of the indexed points at distance 0
    /// only when the caller filters it out (haversine-based distance, not
    /// geometric equality, decides that).
    pub fn around(&self, lon: f64, lat: f64, max_results: usize, max_km: f64) -> Vec<usize> {
        let max_m = max_km * 1000.0;
        // rstar orders by planar squared distance in (lon, lat) space, a
        // close local approximation of haversine ordering at this scale;
        // haversine is still used as the authoritative distance for the
        // cutoff and for any weight computed downstream.
        let mut candidates: Vec<(usize, f64)> = self
            .tree
            .nearest_neighbor_iter_with_distance_2(&[lon, lat])
            .map(|(entry, _sq_dist)| {
                let (plon, plat) = self.points[entry.data];
                (entry.data, haversine_m(lat, lon, plat, plon))
            })
            .take_while(|(_, dist_m)| *dist_m <= max_m * 2.0)
            .filter(|(_, dist_m)| *dist_m <= max_m)
            .collect();
        candidates.sort_by(|a, b| a.1.total_cmp(&b.1));
        candidates.truncate(max_results);
        candidates.into_iter().map(|(idx, _)| idx).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_is_symmetric_and_nonnegative() {
        let a = (48.8566, 2.3522);
        let b = (45.75, 4.85);
        let d1 = haversine_m(a.0, a.1, b.0, b.1);
        let d2 = haversine_m(b.0, b.1, a.0, a.1);
        assert!((d1 - d2).abs() < 1e-6);
        assert!(d1 >= 0.0);
    }

    #[test]
    fn haversine_zero_distance_for_same_point() {
        let d = haversine_m(48.8566, 2.3522, 48.8566, 2.3522);
        assert!(d.abs() < 1e-9);
    }

    #[test]
    fn nearest_index_finds_closest_points_in_order() {
        let points = vec![(2.3522, 48.8566), (2.3600, 48.8600), (5.0, 45.0)];
        let index = NearestIndex::build(&points);
        let results = index.around(2.3522, 48.8566, 10, 5.0);
        assert_eq!(results[0], 0);
        assert!(!results.contains(&2));
    }
}
