//! Earth model and local planar projection for raw positional observations.
//!
//! Observations arrive as WGS84 geodetic coordinates (degrees latitude, degrees longitude)
//! while the vehicle state lives in a flat, metric ground plane. This module provides the
//! WGS84 constants and a [`LocalTangentPlane`] that maps geodetic coordinates onto an
//! East-North plane anchored at a chosen origin and back again.
//!
//! The forward mapping goes through the Earth-centered Earth-fixed (ECEF) frame using the
//! [`nav-types`](https://crates.io/crates/nav-types) crate and rotates the ECEF offset into
//! the local East-North-Up frame at the origin. The inverse mapping uses the principal radii
//! of curvature and is accurate for offsets of a few tens of kilometres, which covers the
//! extent of a road network used for a single track.
use crate::wrap_to_180;
use ::nalgebra::{Matrix3, Vector2, Vector3};
use ::nav_types::{ECEF, WGS84};

/// Earth's equitorial radius in meters
pub const EQUATORIAL_RADIUS: f64 = 6378137.0; // meters
/// Earth's eccentricity ($e$)
pub const ECCENTRICITY: f64 = 0.0818191908425; // unit-less
/// Earth's eccentricity squared ($e^2$)
pub const ECCENTRICITY_SQUARED: f64 = ECCENTRICITY * ECCENTRICITY;

/// Rotation from the Earth-centered Earth-fixed (ECEF) frame to the local East-North-Up frame.
///
/// The local frame is tangent to the ellipsoid at the given geodetic position. Rows of the
/// returned matrix are the east, north and up unit vectors expressed in ECEF.
///
/// # Parameters
/// - `latitude` - The WGS84 latitude in degrees
/// - `longitude` - The WGS84 longitude in degrees
///
/// # Example
/// ```rust
/// use nalgebra::{Matrix3, Vector3};
/// use roadtrack::earth;
/// let rot: Matrix3<f64> = earth::ecef_to_enu(&0.0, &0.0);
/// // at (0, 0) the ECEF x axis points straight up
/// let up = rot * Vector3::new(1.0, 0.0, 0.0);
/// assert!((up[2] - 1.0).abs() < 1e-12);
/// ```
pub fn ecef_to_enu(latitude: &f64, longitude: &f64) -> Matrix3<f64> {
    let lat: f64 = (*latitude).to_radians();
    let lon: f64 = (*longitude).to_radians();

    let mut rot: Matrix3<f64> = Matrix3::zeros();
    rot[(0, 0)] = -lon.sin();
    rot[(0, 1)] = lon.cos();
    rot[(1, 0)] = -lat.sin() * lon.cos();
    rot[(1, 1)] = -lat.sin() * lon.sin();
    rot[(1, 2)] = lat.cos();
    rot[(2, 0)] = lat.cos() * lon.cos();
    rot[(2, 1)] = lat.cos() * lon.sin();
    rot[(2, 2)] = lat.sin();
    rot
}
/// Calculate principal radii of curvature
///
/// # Parameters
/// - `latitude` - The WGS84 latitude in degrees
/// - `altitude` - The WGS84 altitude in meters
///
/// # Returns
/// A tuple `(r_n, r_e, r_p)` in meters where `r_n` is the meridian radius of curvature
/// (north-south), `r_e` is the radius of curvature in the prime vertical (east-west) and
/// `r_p` is the radius of the parallel circle at the given altitude.
///
/// # Example
/// ```rust
/// use roadtrack::earth;
/// let (r_n, r_e, _) = earth::principal_radii(&45.0, &0.0);
/// assert!(r_n < r_e);
/// ```
pub fn principal_radii(latitude: &f64, altitude: &f64) -> (f64, f64, f64) {
    let latitude_rad: f64 = (latitude).to_radians();
    let sin_lat: f64 = latitude_rad.sin();
    let sin_lat_sq: f64 = sin_lat * sin_lat;
    let r_n: f64 = (EQUATORIAL_RADIUS * (1.0 - ECCENTRICITY_SQUARED))
        / (1.0 - ECCENTRICITY_SQUARED * sin_lat_sq).powf(3.0 / 2.0);
    let r_e: f64 = EQUATORIAL_RADIUS / (1.0 - ECCENTRICITY_SQUARED * sin_lat_sq).sqrt();
    let r_p: f64 = (r_e + altitude) * latitude_rad.cos();
    (r_n, r_e, r_p)
}

/// A flat East-North plane tangent to the WGS84 ellipsoid at an origin.
///
/// Ground-frame quantities in this crate (`[x, vx, y, vy]` beliefs, edge geometries,
/// projected observation points) are expressed in such a plane, with `x` east and `y`
/// north in meters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocalTangentPlane {
    latitude: f64,
    longitude: f64,
    altitude: f64,
    origin_ecef: Vector3<f64>,
    rotation: Matrix3<f64>,
}
impl LocalTangentPlane {
    /// Anchor a plane at the given geodetic origin (degrees, meters).
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> LocalTangentPlane {
        let longitude = wrap_to_180(longitude);
        LocalTangentPlane {
            latitude,
            longitude,
            altitude,
            origin_ecef: ecef_position(latitude, longitude, altitude),
            rotation: ecef_to_enu(&latitude, &longitude),
        }
    }
    /// Geodetic origin of the plane as `(latitude, longitude)` in degrees.
    pub fn origin(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }
    /// Project a geodetic coordinate (degrees) onto the plane, returning `(east, north)` meters.
    pub fn project(&self, latitude: f64, longitude: f64) -> Vector2<f64> {
        let ecef = ecef_position(latitude, wrap_to_180(longitude), self.altitude);
        let enu = self.rotation * (ecef - self.origin_ecef);
        Vector2::new(enu[0], enu[1])
    }
    /// Map a planar `(east, north)` point back to geodetic `(latitude, longitude)` in degrees.
    pub fn unproject(&self, point: &Vector2<f64>) -> (f64, f64) {
        let (r_n, _, r_p) = principal_radii(&self.latitude, &self.altitude);
        let d_lat = point[1] / (r_n + self.altitude);
        let d_lon = point[0] / r_p;
        (
            self.latitude + d_lat.to_degrees(),
            wrap_to_180(self.longitude + d_lon.to_degrees()),
        )
    }
}

fn ecef_position(latitude: f64, longitude: f64, altitude: f64) -> Vector3<f64> {
    let wgs84: WGS84<f64> = WGS84::from_degrees_and_meters(latitude, longitude, altitude);
    let ecef: ECEF<f64> = ECEF::from(wgs84);
    Vector3::new(ecef.x(), ecef.y(), ecef.z())
}
