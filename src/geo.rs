//! Geodesic helpers shared by the discovery pipeline.
//!
//! Spherical-earth approximation. Accuracy: ~0.5% against the WGS84 ellipsoid.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const DEG: f64 = PI / 180.0;

/// Mean earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A WGS84 point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// True when both components are finite and inside the WGS84 ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    pub fn distance_to(&self, other: &Coordinates) -> f64 {
        haversine_m(self.lat, self.lon, other.lat, other.lon)
    }
}

/// Great-circle distance in meters between two points (haversine).
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1 * DEG;
    let phi2 = lat2 * DEG;
    let d_phi = (lat2 - lat1) * DEG;
    let d_lambda = (lon2 - lon1) * DEG;

    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_identical_points_are_zero() {
        assert_eq!(haversine_m(40.7128, -74.0060, 40.7128, -74.0060), 0.0);
        assert_eq!(haversine_m(-33.8688, 151.2093, -33.8688, 151.2093), 0.0);
    }

    #[test]
    fn test_symmetry() {
        let pairs = [
            ((40.7128, -74.0060), (51.5074, -0.1278)),
            ((59.3293, 18.0686), (59.9139, 10.7522)),
            ((-6.2088, 106.8456), (35.6762, 139.6503)),
            ((0.0, 179.9), (0.0, -179.9)),
        ];
        for ((a_lat, a_lon), (b_lat, b_lon)) in pairs {
            let ab = haversine_m(a_lat, a_lon, b_lat, b_lon);
            let ba = haversine_m(b_lat, b_lon, a_lat, a_lon);
            assert_relative_eq!(ab, ba, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_known_distance_nyc_london() {
        // ~5570 km on a 6371 km sphere
        let d = haversine_m(40.7128, -74.0060, 51.5074, -0.1278);
        assert_relative_eq!(d, 5_570_000.0, max_relative = 0.005);
    }

    #[test]
    fn test_one_degree_of_latitude() {
        let d = haversine_m(0.0, 0.0, 1.0, 0.0);
        assert_relative_eq!(d, EARTH_RADIUS_M * DEG, epsilon = 1e-6);
    }

    #[test]
    fn test_antimeridian_is_short() {
        let d = haversine_m(0.0, 179.9, 0.0, -179.9);
        assert!(d < 25_000.0, "got {}", d);
    }

    #[test]
    fn test_coordinates_validity() {
        assert!(Coordinates::new(40.0, -74.0).is_valid());
        assert!(!Coordinates::new(91.0, 0.0).is_valid());
        assert!(!Coordinates::new(0.0, -181.0).is_valid());
        assert!(!Coordinates::new(f64::NAN, 0.0).is_valid());
    }
}
