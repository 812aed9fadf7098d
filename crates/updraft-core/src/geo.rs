//! Geographic primitives: angles, positions, and speed vectors.

use std::fmt;
use std::ops::{Add, Sub};

/// Mean earth radius in metres, for great-circle arithmetic.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Standard gravity in m/s².
pub const GRAVITY: f64 = 9.80665;

/// An angle in degrees.
///
/// Stored unnormalized; [`as_bearing`](Self::as_bearing) produces the
/// `[0, 360)` form and [`difference`](Self::difference) the smallest
/// signed separation.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd)]
pub struct Angle(f64);

impl Angle {
    /// An angle from degrees.
    pub fn degrees(v: f64) -> Self {
        Self(v)
    }

    /// An angle from radians.
    pub fn radians(v: f64) -> Self {
        Self(v.to_degrees())
    }

    /// The value in degrees, as constructed.
    pub fn as_degrees(self) -> f64 {
        self.0
    }

    /// The value in radians.
    pub fn as_radians(self) -> f64 {
        self.0.to_radians()
    }

    /// The angle normalized to `[0, 360)` degrees.
    pub fn as_bearing(self) -> f64 {
        self.0.rem_euclid(360.0)
    }

    /// Smallest signed separation `self - other` in degrees, in
    /// `(-180, 180]`.
    pub fn difference(self, other: Angle) -> f64 {
        let d = (self.0 - other.0).rem_euclid(360.0);
        if d > 180.0 {
            d - 360.0
        } else {
            d
        }
    }

    /// Sine of the angle.
    pub fn sin(self) -> f64 {
        self.as_radians().sin()
    }

    /// Cosine of the angle.
    pub fn cos(self) -> f64 {
        self.as_radians().cos()
    }
}

impl Add for Angle {
    type Output = Angle;

    fn add(self, rhs: Angle) -> Angle {
        Angle(self.0 + rhs.0)
    }
}

impl Sub for Angle {
    type Output = Angle;

    fn sub(self, rhs: Angle) -> Angle {
        Angle(self.0 - rhs.0)
    }
}

impl fmt::Display for Angle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}°", self.as_bearing())
    }
}

/// A WGS84 position in degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GeoPoint {
    /// Latitude in degrees, positive north.
    pub latitude: f64,
    /// Longitude in degrees, positive east.
    pub longitude: f64,
}

impl GeoPoint {
    /// A position from latitude and longitude in degrees.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance to `other` in metres (haversine).
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = lat2 - lat1;
        let dlon = (other.longitude - self.longitude).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * a.sqrt().asin() * EARTH_RADIUS_M
    }

    /// Initial bearing of the great circle from here to `other`.
    pub fn bearing_to(&self, other: &GeoPoint) -> Angle {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlon = (other.longitude - self.longitude).to_radians();
        let y = dlon.sin() * lat2.cos();
        let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
        Angle::radians(y.atan2(x))
    }

    /// Destination point `distance_m` metres along `bearing`.
    pub fn offset(&self, bearing: Angle, distance_m: f64) -> GeoPoint {
        let d = distance_m / EARTH_RADIUS_M;
        let lat1 = self.latitude.to_radians();
        let lon1 = self.longitude.to_radians();
        let brg = bearing.as_radians();
        let lat2 = (lat1.sin() * d.cos() + lat1.cos() * d.sin() * brg.cos()).asin();
        let lon2 = lon1
            + (brg.sin() * d.sin() * lat1.cos()).atan2(d.cos() - lat1.sin() * lat2.sin());
        GeoPoint {
            latitude: lat2.to_degrees(),
            longitude: lon2.to_degrees(),
        }
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// A horizontal velocity as bearing plus magnitude.
///
/// For wind, `bearing` follows the meteorological convention: the
/// direction the wind blows from.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SpeedVector {
    /// Direction in degrees.
    pub bearing: Angle,
    /// Magnitude in m/s.
    pub speed: f64,
}

impl SpeedVector {
    /// A vector from bearing and speed.
    pub fn new(bearing: Angle, speed: f64) -> Self {
        Self { bearing, speed }
    }
}

/// Solve the wind triangle for heading and true airspeed.
///
/// Given the ground vector (track bearing plus ground speed) and the
/// wind (from-direction convention), returns the estimated heading and
/// the magnitude of the air vector.
pub fn wind_triangle(track: Angle, ground_speed: f64, wind: SpeedVector) -> (Angle, f64) {
    let x = track.sin() * ground_speed + wind.bearing.sin() * wind.speed;
    let y = track.cos() * ground_speed + wind.bearing.cos() * wind.speed;
    (Angle::radians(x.atan2(y)), x.hypot(y))
}
