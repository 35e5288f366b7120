//! Positional observations of a vehicle.
//!
//! An [`Observation`] is an immutable snapshot of one positional fix: its sequence index,
//! its time of validity, the raw WGS84 coordinates as reported by the receiver and the same
//! point projected onto the local ground plane in which beliefs are expressed.
use std::fmt::{self, Display};

use chrono::{DateTime, Utc};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::earth::LocalTangentPlane;

/// Raw geodetic coordinates in degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GeodeticCoordinate {
    pub latitude: f64,
    pub longitude: f64,
}

/// A single positional fix.
#[derive(Clone, Debug, PartialEq)]
pub struct Observation {
    index: u64,
    timestamp: DateTime<Utc>,
    raw: GeodeticCoordinate,
    projected_point: Vector2<f64>,
}
impl Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Observation #{} @ {} (lat: {:.6}, lon: {:.6}, xy: [{:.2}, {:.2}])",
            self.index,
            self.timestamp.to_rfc3339(),
            self.raw.latitude,
            self.raw.longitude,
            self.projected_point[0],
            self.projected_point[1]
        )
    }
}
impl Observation {
    /// Create an observation from raw geodetic coordinates, projecting them onto `plane`.
    pub fn new(
        index: u64,
        timestamp: DateTime<Utc>,
        latitude: f64,
        longitude: f64,
        plane: &LocalTangentPlane,
    ) -> Observation {
        Observation {
            index,
            timestamp,
            raw: GeodeticCoordinate {
                latitude,
                longitude,
            },
            projected_point: plane.project(latitude, longitude),
        }
    }
    /// Create an observation from a point already expressed on `plane`.
    pub fn from_projected(
        index: u64,
        timestamp: DateTime<Utc>,
        projected_point: Vector2<f64>,
        plane: &LocalTangentPlane,
    ) -> Observation {
        let (latitude, longitude) = plane.unproject(&projected_point);
        Observation {
            index,
            timestamp,
            raw: GeodeticCoordinate {
                latitude,
                longitude,
            },
            projected_point,
        }
    }
    /// Sequence number of the observation within its track.
    pub fn index(&self) -> u64 {
        self.index
    }
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
    pub fn raw_coordinates(&self) -> GeodeticCoordinate {
        self.raw
    }
    /// The observed position on the local ground plane, `(east, north)` in meters.
    pub fn projected_point(&self) -> Vector2<f64> {
        self.projected_point
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use chrono::TimeZone;

    #[test]
    fn raw_and_projected_agree() {
        let plane = LocalTangentPlane::new(45.0, -122.0, 0.0);
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let obs = Observation::new(3, t, 45.001, -122.0, &plane);
        assert_eq!(obs.index(), 3);
        assert_eq!(obs.timestamp(), t);
        assert_approx_eq!(obs.raw_coordinates().latitude, 45.001);
        assert_approx_eq!(obs.projected_point()[0], 0.0, 1e-3);
        assert!(obs.projected_point()[1] > 100.0);

        let back = Observation::from_projected(3, t, obs.projected_point(), &plane);
        assert_approx_eq!(back.raw_coordinates().latitude, 45.001, 1e-6);
        assert_approx_eq!(back.raw_coordinates().longitude, -122.0, 1e-6);
    }

    #[test]
    fn display_contains_index() {
        let plane = LocalTangentPlane::new(0.0, 0.0, 0.0);
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let obs = Observation::from_projected(11, t, Vector2::new(1.0, 2.0), &plane);
        assert!(format!("{obs}").starts_with("Observation #11"));
    }
}
