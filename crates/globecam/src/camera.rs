//! Camera and physics state shared by all controllers.

use glam::DVec3;

use crate::{geo::EnuFrame, host::CameraPose};

/// Camera pose plus the Euler angles controllers reason in.
///
/// `direction`, `up` and `right` are kept orthonormal; every write goes
/// through [`CameraState::set_orientation`], which rebuilds the basis with
/// cross products.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraState {
    /// ECEF position in meters.
    pub position: DVec3,
    /// Unit view direction.
    pub direction: DVec3,
    /// Unit up vector.
    pub up: DVec3,
    /// Unit right vector (`direction × up`).
    pub right: DVec3,
    /// Heading in radians, clockwise from local north.
    pub yaw: f64,
    /// Pitch in radians above the local tangent plane.
    pub pitch: f64,
    /// Roll in radians.
    pub roll: f64,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            position: DVec3::ZERO,
            direction: DVec3::Y,
            up: DVec3::Z,
            right: DVec3::X,
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
        }
    }
}

impl CameraState {
    /// Capture a host pose, deriving yaw and pitch in the local ENU frame.
    pub fn from_pose(pose: &CameraPose) -> Self {
        let frame = EnuFrame::at(pose.position);
        let (yaw, pitch) = frame.heading_pitch_of(pose.direction);

        let mut state = Self {
            position: pose.position,
            yaw,
            pitch,
            ..Self::default()
        };
        state.set_orientation(pose.direction, pose.up, frame.up);
        state
    }

    /// The pose pushed to the host camera.
    pub fn pose(&self) -> CameraPose {
        CameraPose {
            position: self.position,
            direction: self.direction,
            up: self.up,
            right: self.right,
        }
    }

    /// Set the orientation from a view direction and an approximate up vector.
    ///
    /// `fallback_up` is used when `up_hint` is parallel to `direction`.
    pub fn set_orientation(&mut self, direction: DVec3, up_hint: DVec3, fallback_up: DVec3) {
        let direction = direction.try_normalize().unwrap_or(self.direction);

        let mut right = direction.cross(up_hint);
        if right.length_squared() < 1e-12 {
            right = direction.cross(fallback_up);
        }
        if right.length_squared() < 1e-12 {
            right = direction.any_orthonormal_vector();
        }
        let right = right.normalize();

        self.direction = direction;
        self.right = right;
        self.up = right.cross(direction).normalize();
    }

    /// Whether every component is finite.
    pub fn is_finite(&self) -> bool {
        self.position.is_finite()
            && self.direction.is_finite()
            && self.up.is_finite()
            && self.right.is_finite()
            && self.yaw.is_finite()
            && self.pitch.is_finite()
            && self.roll.is_finite()
    }

    /// Largest deviation from an orthonormal basis (unit lengths and zero dot products).
    pub fn orthonormality_error(&self) -> f64 {
        [
            (self.direction.length() - 1.0).abs(),
            (self.up.length() - 1.0).abs(),
            (self.right.length() - 1.0).abs(),
            self.direction.dot(self.up).abs(),
            self.direction.dot(self.right).abs(),
            self.up.dot(self.right).abs(),
        ]
        .into_iter()
        .fold(0.0, f64::max)
    }
}

/// Physics flags and scalars, reset on initialize.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PhysicsState {
    /// Whether the controller is resting on terrain.
    pub is_grounded: bool,
    /// Velocity along local up in m/s.
    pub vertical_velocity: f64,
}
