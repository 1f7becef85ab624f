use crate::models::location::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6_371.0;

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    EARTH_RADIUS_KM * 2.0 * haversine.sqrt().asin()
}

/// Index of the point in `candidates` closest to `from`. Ties keep the
/// earlier candidate.
pub fn nearest_index(from: &GeoPoint, candidates: &[GeoPoint]) -> Option<usize> {
    candidates
        .iter()
        .enumerate()
        .map(|(idx, point)| (idx, haversine_km(from, point)))
        .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
        .map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::{haversine_km, nearest_index};
    use crate::models::location::GeoPoint;

    #[test]
    fn same_bin_location_is_zero_distance() {
        let depot = GeoPoint {
            lat: 55.9533,
            lng: -3.1883,
        };
        assert!(haversine_km(&depot, &depot) < 1e-9);
    }

    #[test]
    fn edinburgh_to_glasgow_is_around_67_km() {
        let edinburgh = GeoPoint {
            lat: 55.9533,
            lng: -3.1883,
        };
        let glasgow = GeoPoint {
            lat: 55.8642,
            lng: -4.2518,
        };
        assert!((haversine_km(&edinburgh, &glasgow) - 67.0).abs() < 3.0);
    }

    #[test]
    fn nearest_index_picks_closest() {
        let origin = GeoPoint { lat: 0.0, lng: 0.0 };
        let candidates = [
            GeoPoint { lat: 1.0, lng: 1.0 },
            GeoPoint { lat: 0.1, lng: 0.1 },
            GeoPoint { lat: -2.0, lng: 0.0 },
        ];
        assert_eq!(nearest_index(&origin, &candidates), Some(1));
        assert_eq!(nearest_index(&origin, &[]), None);
    }
}
