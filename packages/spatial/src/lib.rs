#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Coordinates and great-circle distance.
//!
//! Every component that relates two points on the map (events to cameras,
//! route endpoints to road nodes, duplicate venues) measures through
//! [`distance_km`] so that all distances share the same Earth model.

use geo::{Distance, Haversine, Point};
use serde::{Deserialize, Serialize};

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

impl Location {
    /// Creates a location without validating it.
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Checks that both components are finite and inside the WGS84 range.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidCoordinateError`] if the latitude is outside
    /// `[-90, 90]`, the longitude is outside `[-180, 180]`, or either is
    /// not finite.
    pub fn validate(&self) -> Result<(), InvalidCoordinateError> {
        let lat_ok = self.lat.is_finite() && (-90.0..=90.0).contains(&self.lat);
        let lng_ok = self.lng.is_finite() && (-180.0..=180.0).contains(&self.lng);
        if lat_ok && lng_ok {
            Ok(())
        } else {
            Err(InvalidCoordinateError {
                lat: self.lat,
                lng: self.lng,
            })
        }
    }

    /// Returns `true` if [`Self::validate`] would succeed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Great-circle distance to `other` in kilometres.
    #[must_use]
    pub fn distance_km(&self, other: &Self) -> f64 {
        distance_km(*self, *other)
    }

    fn to_point(self) -> Point<f64> {
        Point::new(self.lng, self.lat)
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.5},{:.5}", self.lat, self.lng)
    }
}

impl std::str::FromStr for Location {
    type Err = InvalidCoordinateError;

    /// Parses `"lat,lng"` and validates the result.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = InvalidCoordinateError {
            lat: f64::NAN,
            lng: f64::NAN,
        };
        let (lat, lng) = s.split_once(',').ok_or(invalid)?;
        let lat = lat.trim().parse::<f64>().map_err(|_| invalid)?;
        let lng = lng.trim().parse::<f64>().map_err(|_| invalid)?;
        let location = Self::new(lat, lng);
        location.validate()?;
        Ok(location)
    }
}

/// Error returned for a coordinate outside the WGS84 range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvalidCoordinateError {
    /// The rejected latitude.
    pub lat: f64,
    /// The rejected longitude.
    pub lng: f64,
}

impl std::fmt::Display for InvalidCoordinateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid coordinate ({}, {}): expected lat in [-90, 90] and lng in [-180, 180]",
            self.lat, self.lng
        )
    }
}

impl std::error::Error for InvalidCoordinateError {}

/// Haversine great-circle distance between two coordinates in kilometres.
#[must_use]
pub fn distance_km(a: Location, b: Location) -> f64 {
    Haversine.distance(a.to_point(), b.to_point()) / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_to_self_is_zero() {
        let loc = Location::new(10.7769, 106.7009);
        assert!(loc.distance_km(&loc).abs() < 1e-9);
    }

    #[test]
    fn known_city_pair_distance() {
        // Paris to London, roughly 344 km.
        let paris = Location::new(48.8566, 2.3522);
        let london = Location::new(51.5074, -0.1278);
        let d = distance_km(paris, london);
        assert!((d - 343.5).abs() < 2.0, "unexpected distance {d}");
    }

    #[test]
    fn distance_is_symmetric() {
        let a = Location::new(10.77, 106.70);
        let b = Location::new(10.80, 106.66);
        assert!((distance_km(a, b) - distance_km(b, a)).abs() < 1e-12);
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert!(Location::new(91.0, 0.0).validate().is_err());
        assert!(Location::new(0.0, -180.5).validate().is_err());
        assert!(Location::new(f64::NAN, 0.0).validate().is_err());
        assert!(Location::new(-90.0, 180.0).validate().is_ok());
    }

    #[test]
    fn parses_lat_lng_pair() {
        let loc: Location = "10.7769, 106.7009".parse().unwrap();
        assert!((loc.lat - 10.7769).abs() < f64::EPSILON);
        assert!((loc.lng - 106.7009).abs() < f64::EPSILON);
        assert!("10.7769".parse::<Location>().is_err());
        assert!("100.0,0.0".parse::<Location>().is_err());
    }
}
