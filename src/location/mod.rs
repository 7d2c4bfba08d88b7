//! Location tracking: the update request handed to the platform, the
//! subscription pipeline that turns delivered fixes into photo searches,
//! and a route-replay platform for running without a real GPS.

pub mod ingest;
pub mod pipeline;
pub mod platform;
pub mod replay;
pub mod request;

pub use ingest::Ingestor;
pub use pipeline::LocationPipeline;
pub use platform::{DeliveryTarget, LocationPlatform, PlatformError};
pub use replay::RouteReplay;
pub use request::{LocationRequest, Priority};

/// Mean Earth radius in meters, as used by the haversine formula.
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance to `other` in meters.
    pub fn distance_m(&self, other: &Coordinate) -> f64 {
        let (lat1, lat2) = (self.latitude.to_radians(), other.latitude.to_radians());
        let d_lat = lat2 - lat1;
        let d_lon = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().asin()
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.5},{:.5}", self.latitude, self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_to_self_is_zero() {
        let c = Coordinate::new(59.3293, 18.0686);
        assert_eq!(c.distance_m(&c), 0.0);
    }

    #[test]
    fn test_distance_one_degree_latitude() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(1.0, 0.0);
        let d = a.distance_m(&b);
        assert!((d - 111_195.0).abs() < 50.0, "{d}");
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = Coordinate::new(52.52, 13.405);
        let b = Coordinate::new(48.8566, 2.3522);
        assert!((a.distance_m(&b) - b.distance_m(&a)).abs() < 1e-6);
        // Berlin to Paris is roughly 878 km.
        assert!((a.distance_m(&b) / 1000.0 - 878.0).abs() < 5.0);
    }

    #[test]
    fn test_display() {
        assert_eq!(Coordinate::new(1.0, -2.5).to_string(), "1.00000,-2.50000");
    }
}
