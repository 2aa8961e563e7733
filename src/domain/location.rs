use serde::{Deserialize, Serialize};

/// Default half-width (degrees) of the box treated as "the same site"
pub const DEFAULT_LOCATION_TOLERANCE: f64 = 0.01;

/// Geographic position of a building or sensor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Inclusive lookup box `[lat ± tolerance, lon ± tolerance]`
    pub fn bounds(&self, tolerance: f64) -> BoundingBox {
        let tolerance = tolerance.abs();
        BoundingBox {
            min_latitude: self.latitude - tolerance,
            max_latitude: self.latitude + tolerance,
            min_longitude: self.longitude - tolerance,
            max_longitude: self.longitude + tolerance,
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.5}, {:.5})", self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl BoundingBox {
    pub fn contains(&self, location: &Location) -> bool {
        (self.min_latitude..=self.max_latitude).contains(&location.latitude)
            && (self.min_longitude..=self.max_longitude).contains(&location.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_contains_nearby() {
        let site = Location::new(40.7128, -74.0060);
        let bounds = site.bounds(DEFAULT_LOCATION_TOLERANCE);

        assert!(bounds.contains(&site));
        assert!(bounds.contains(&Location::new(40.7200, -74.0000)));
        assert!(!bounds.contains(&Location::new(40.7300, -74.0060)));
        assert!(!bounds.contains(&Location::new(40.7128, -73.9900)));
    }

    #[test]
    fn test_negative_tolerance_is_treated_as_width() {
        let site = Location::new(10.0, 20.0);
        let bounds = site.bounds(-0.5);
        assert!(bounds.contains(&Location::new(10.4, 19.6)));
    }
}
