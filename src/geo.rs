//! Geographic utility functions.

use std::f64::consts::PI;

/// Earth radius in kilometers for haversine calculations.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Calculate the great-circle distance between two points using the
/// haversine formula. Returns distance in kilometers.
#[must_use]
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1 * PI / 180.0;
    let lat2_rad = lat2 * PI / 180.0;
    let delta_lat = (lat2 - lat1) * PI / 180.0;
    let delta_lon = (lon2 - lon1) * PI / 180.0;

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Normalize a longitude into `[-180, 180]`, reducing by 360 exactly once.
#[must_use]
pub fn normalize_longitude(lon: f64) -> f64 {
    if lon > 180.0 {
        lon - 360.0
    } else if lon < -180.0 {
        lon + 360.0
    } else {
        lon
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_sf_to_la() {
        let distance = haversine_distance(37.77, -122.41, 34.05, -118.24);
        assert!(distance > 500.0 && distance < 620.0);
    }

    #[test]
    fn test_haversine_zero_distance() {
        let distance = haversine_distance(10.0, 20.0, 10.0, 20.0);
        assert!(distance.abs() < 1e-9);
    }

    #[test]
    fn test_normalize_longitude_over_180() {
        assert!((normalize_longitude(200.0) - (-160.0)).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_longitude_under_neg_180() {
        assert!((normalize_longitude(-200.0) - 160.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_longitude_in_range_unchanged() {
        assert!((normalize_longitude(45.5) - 45.5).abs() < 1e-9);
        assert!((normalize_longitude(-45.5) - (-45.5)).abs() < 1e-9);
    }
}
