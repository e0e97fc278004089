//! Geodetic conversions and the local East/North/Up frame.
//!
//! Positions are ECEF (Earth-Centered, Earth-Fixed) in meters on the WGS84
//! ellipsoid. The ENU frame is what turns planar input (WASD, a steering
//! heading) into world-space motion; it depends on latitude and longitude, so
//! controllers rebuild it from the current position every step.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use glam::DVec3;

use crate::constants::{WGS84_A, WGS84_B, WGS84_E2};

/// Geodetic coordinates on the WGS84 ellipsoid.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Geodetic {
    /// Longitude in radians, positive east.
    pub longitude: f64,
    /// Latitude in radians, positive north.
    pub latitude: f64,
    /// Height above the ellipsoid in meters.
    pub height: f64,
}

impl Geodetic {
    /// Build from degrees (longitude, latitude) and a height in meters.
    pub fn from_degrees(longitude: f64, latitude: f64, height: f64) -> Self {
        Self {
            longitude: longitude.to_radians(),
            latitude: latitude.to_radians(),
            height,
        }
    }

    /// Longitude and latitude in degrees, the convention terrain oracles use.
    pub fn lon_lat_degrees(&self) -> (f64, f64) {
        (self.longitude.to_degrees(), self.latitude.to_degrees())
    }

    /// The same horizontal location at a different height.
    #[must_use]
    pub fn with_height(self, height: f64) -> Self {
        Self { height, ..self }
    }
}

/// Prime vertical radius of curvature at the given latitude.
fn prime_vertical_radius(sin_lat: f64) -> f64 {
    WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt()
}

/// Convert geodetic coordinates to ECEF.
pub fn geodetic_to_ecef(geodetic: Geodetic) -> DVec3 {
    let (sin_lat, cos_lat) = geodetic.latitude.sin_cos();
    let (sin_lon, cos_lon) = geodetic.longitude.sin_cos();
    let n = prime_vertical_radius(sin_lat);
    let h = geodetic.height;

    DVec3::new(
        (n + h) * cos_lat * cos_lon,
        (n + h) * cos_lat * sin_lon,
        (n * (1.0 - WGS84_E2) + h) * sin_lat,
    )
}

/// Convert ECEF coordinates to geodetic.
///
/// Iterates `tan(lat) = (z + e² N sin(lat)) / p`, which converges to well below
/// a millimeter in a handful of iterations for anything near the surface.
pub fn ecef_to_geodetic(position: DVec3) -> Geodetic {
    let p = position.x.hypot(position.y);

    // On the polar axis longitude is arbitrary.
    if p < 1e-9 {
        let latitude = if position.z >= 0.0 { FRAC_PI_2 } else { -FRAC_PI_2 };
        return Geodetic {
            longitude: 0.0,
            latitude,
            height: position.z.abs() - WGS84_B,
        };
    }

    let longitude = position.y.atan2(position.x);
    let mut latitude = position.z.atan2(p * (1.0 - WGS84_E2));
    for _ in 0..6 {
        let sin_lat = latitude.sin();
        let n = prime_vertical_radius(sin_lat);
        latitude = (position.z + WGS84_E2 * n * sin_lat).atan2(p);
    }

    let (sin_lat, cos_lat) = latitude.sin_cos();
    let height = p * cos_lat + position.z * sin_lat
        - WGS84_A * (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();

    Geodetic {
        longitude,
        latitude,
        height,
    }
}

/// Normalize an angle to `(-π, π]`.
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI { wrapped + TAU } else { wrapped }
}

/// Local East/North/Up basis tangent to the ellipsoid.
///
/// Right-handed: `east × north = up`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnuFrame {
    /// Local east (tangent, toward increasing longitude).
    pub east: DVec3,
    /// Local north (tangent, toward the north pole).
    pub north: DVec3,
    /// Local up (ellipsoid normal).
    pub up: DVec3,
}

impl EnuFrame {
    /// Frame used when the position is degenerate (the Earth's center).
    pub const CANONICAL: Self = Self {
        east: DVec3::X,
        north: DVec3::Y,
        up: DVec3::Z,
    };

    /// Compute the frame at an ECEF position.
    pub fn at(position: DVec3) -> Self {
        if !position.is_finite() || position.length_squared() < 1.0 {
            return Self::CANONICAL;
        }
        let geodetic = ecef_to_geodetic(position);
        Self::from_geodetic(geodetic.longitude, geodetic.latitude)
    }

    /// Compute the frame at a geodetic longitude/latitude (radians).
    pub fn from_geodetic(longitude: f64, latitude: f64) -> Self {
        let (sin_lat, cos_lat) = latitude.sin_cos();
        let (sin_lon, cos_lon) = longitude.sin_cos();

        Self {
            east: DVec3::new(-sin_lon, cos_lon, 0.0),
            north: DVec3::new(-sin_lat * cos_lon, -sin_lat * sin_lon, cos_lat),
            up: DVec3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat),
        }
    }

    /// Horizontal unit vector for a heading measured clockwise from north.
    pub fn horizontal(&self, heading: f64) -> DVec3 {
        let (sin_h, cos_h) = heading.sin_cos();
        self.east * sin_h + self.north * cos_h
    }

    /// Unit direction for a heading and a pitch above the tangent plane.
    pub fn direction(&self, heading: f64, pitch: f64) -> DVec3 {
        let (sin_p, cos_p) = pitch.sin_cos();
        (self.horizontal(heading) * cos_p + self.up * sin_p).normalize()
    }

    /// Heading and pitch of a world-space direction in this frame.
    ///
    /// Inverse of [`EnuFrame::direction`]. Looking straight up or down yields
    /// a heading of zero.
    pub fn heading_pitch_of(&self, direction: DVec3) -> (f64, f64) {
        let direction = direction.normalize_or_zero();
        let vertical = direction.dot(self.up);
        let horizontal = direction - self.up * vertical;
        let horizontal_len = horizontal.length();

        let pitch = vertical.atan2(horizontal_len);
        let heading = if horizontal_len > 1e-9 {
            horizontal.dot(self.east).atan2(horizontal.dot(self.north))
        } else {
            0.0
        };

        (heading, pitch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    fn assert_vec_close(a: DVec3, b: DVec3, eps: f64) {
        assert!((a - b).length() < eps, "{a:?} != {b:?}");
    }

    #[test]
    fn test_equator_prime_meridian() {
        let position = geodetic_to_ecef(Geodetic::default());
        assert_vec_close(position, DVec3::new(WGS84_A, 0.0, 0.0), 1e-6);

        let frame = EnuFrame::at(position);
        assert_vec_close(frame.east, DVec3::Y, 1e-12);
        assert_vec_close(frame.north, DVec3::Z, 1e-12);
        assert_vec_close(frame.up, DVec3::X, 1e-12);
    }

    #[test]
    fn test_north_pole() {
        let position = geodetic_to_ecef(Geodetic::from_degrees(0.0, 90.0, 0.0));
        assert!((position.z - WGS84_B).abs() < 1e-6);

        let geodetic = ecef_to_geodetic(DVec3::new(0.0, 0.0, WGS84_B + 100.0));
        assert!((geodetic.latitude - FRAC_PI_2).abs() < 1e-12);
        assert!((geodetic.height - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_geodetic_round_trip_new_york() {
        let original = Geodetic::from_degrees(-74.0, 40.7, 123.4);
        let back = ecef_to_geodetic(geodetic_to_ecef(original));

        assert!((back.longitude - original.longitude).abs() < 1e-12);
        assert!((back.latitude - original.latitude).abs() < 1e-12);
        assert!((back.height - original.height).abs() < 1e-6);
    }

    #[test]
    fn test_earth_center_is_degenerate() {
        assert_eq!(EnuFrame::at(DVec3::ZERO), EnuFrame::CANONICAL);
        let geodetic = ecef_to_geodetic(DVec3::ZERO);
        assert!((geodetic.height + WGS84_B).abs() < 1e-6);
    }

    #[test]
    fn test_horizontal_heading() {
        let frame = EnuFrame::from_geodetic(0.3, 0.8);
        assert_vec_close(frame.horizontal(0.0), frame.north, 1e-12);
        assert_vec_close(frame.horizontal(FRAC_PI_2), frame.east, 1e-12);
        assert_vec_close(frame.horizontal(PI), -frame.north, 1e-12);
    }

    #[test]
    fn test_heading_pitch_inverse() {
        let frame = EnuFrame::from_geodetic(-1.2, 0.4);
        let direction = frame.direction(2.0, -0.3);
        let (heading, pitch) = frame.heading_pitch_of(direction);
        assert!((heading - 2.0).abs() < 1e-12);
        assert!((pitch + 0.3).abs() < 1e-12);

        let (heading, pitch) = frame.heading_pitch_of(frame.up);
        assert_eq!(heading, 0.0);
        assert!((pitch - FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_wrap_angle() {
        assert!((wrap_angle(PI) - PI).abs() < 1e-12);
        assert!((wrap_angle(-PI) - PI).abs() < 1e-12);
        assert!((wrap_angle(3.0 * PI / 2.0) + FRAC_PI_2).abs() < 1e-12);
        assert!((wrap_angle(0.25) - 0.25).abs() < 1e-12);
        assert!((wrap_angle(-7.0 * TAU + 0.5) - 0.5).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn enu_frame_is_orthonormal_and_right_handed(
            lon in -180.0f64..180.0,
            lat in -89.9f64..89.9,
            height in -500.0f64..20_000.0,
        ) {
            let position = geodetic_to_ecef(Geodetic::from_degrees(lon, lat, height));
            let frame = EnuFrame::at(position);

            prop_assert!((frame.east.length() - 1.0).abs() < 1e-9);
            prop_assert!((frame.north.length() - 1.0).abs() < 1e-9);
            prop_assert!((frame.up.length() - 1.0).abs() < 1e-9);
            prop_assert!(frame.east.dot(frame.north).abs() < 1e-9);
            prop_assert!(frame.east.dot(frame.up).abs() < 1e-9);
            prop_assert!(frame.north.dot(frame.up).abs() < 1e-9);
            prop_assert!((frame.east.cross(frame.north) - frame.up).length() < 1e-9);
        }
    }
}
