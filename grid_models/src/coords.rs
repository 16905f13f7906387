//! Coordinate systems and distances between grid points.
//!
//! # Supported systems
//! - **Geographic**: `x` = longitude, `y` = latitude, both in degrees.
//!   Distances use the haversine formula on a spherical Earth. All radii used by
//!   the classifier are ≤ 11 km, where haversine is accurate enough.
//! - **Cartesian**: `x`, `y` in metres, Euclidean distance.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Mean Earth radius (meters)
pub const EARTH_RADIUS: f64 = 6_371_000.0;

/// Which horizontal coordinate system a grid is expressed in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateSystem {
    #[default]
    Geographic,
    Cartesian,
}

impl fmt::Display for CoordinateSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinateSystem::Geographic => write!(f, "geographic"),
            CoordinateSystem::Cartesian => write!(f, "cartesian"),
        }
    }
}

impl CoordinateSystem {
    /// Distance in metres between `(x1, y1)` and `(x2, y2)`.
    #[inline]
    pub fn distance(&self, x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
        match self {
            CoordinateSystem::Geographic => haversine(y1, x1, y2, x2),
            CoordinateSystem::Cartesian => ((x2 - x1).powi(2) + (y2 - y1).powi(2)).sqrt(),
        }
    }
}

/// Great-circle distance (meters) between two (lat, lon) points in degrees.
#[inline]
pub fn haversine(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS * a.sqrt().asin()
}

/// Initial bearing (degrees clockwise from north) from point 1 to point 2.
pub fn bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let dlambda = (lon2 - lon1).to_radians();
    let y = dlambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * dlambda.cos();
    y.atan2(x).to_degrees()
}

/// Northward and eastward displacement (meters) between two geographic points.
pub fn geographic_to_cartesian_displacement(
    start_lat: f64,
    start_lon: f64,
    end_lat: f64,
    end_lon: f64,
) -> (f64, f64) {
    let distance = haversine(start_lat, start_lon, end_lat, end_lon);
    let direction = bearing(start_lat, start_lon, end_lat, end_lon).to_radians();
    (distance * direction.cos(), distance * direction.sin())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn one_degree_latitude() {
        // π R / 180 ≈ 111.195 km
        let d = haversine(0.0, 0.0, 1.0, 0.0);
        assert_abs_diff_eq!(d, 111_194.93, epsilon = 1.0);
    }

    #[test]
    fn cartesian_distance_is_euclidean() {
        let d = CoordinateSystem::Cartesian.distance(0.0, 0.0, 3000.0, 4000.0);
        assert_abs_diff_eq!(d, 5000.0, epsilon = 1e-9);
    }

    #[test]
    fn displacement_north_and_east() {
        let (dy, dx) = geographic_to_cartesian_displacement(-12.0, 131.0, -11.9, 131.0);
        assert!(dy > 11_000.0 && dy < 11_200.0);
        assert!(dx.abs() < 1.0);

        let (dy, dx) = geographic_to_cartesian_displacement(0.0, 10.0, 0.0, 10.1);
        assert!(dy.abs() < 1.0);
        assert!(dx > 11_000.0);
    }
}
