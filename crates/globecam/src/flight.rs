//! Free-flight (6DOF) camera controller.
//!
//! WASD strafes along the camera's own basis, Space/E and Ctrl/Q move along
//! camera up, Shift boosts. Arrow keys turn at a fixed rate and mouse motion
//! turns while the pointer is locked. Motion is momentum based: velocity
//! accelerates toward the requested velocity and decays exponentially once
//! the keys are released. There is no ground collision.
//!
//! The view direction is carried from step to step and parallel transported
//! as the local up changes, so the camera flies straight over the poles.

use glam::{DQuat, DVec2, DVec3};

use crate::{
    config::{ConfigOverrides, ControllerConfig},
    constants::PITCH_EPSILON,
    controller::{CameraController, ControllerCore, ControllerTelemetry},
    error::Result,
    geo::EnuFrame,
    host::HostContext,
    input::{InputState, KeyCode},
};

const FORWARD_KEYS: &[KeyCode] = &[KeyCode::KeyW];
const BACKWARD_KEYS: &[KeyCode] = &[KeyCode::KeyS];
const RIGHT_KEYS: &[KeyCode] = &[KeyCode::KeyD];
const LEFT_KEYS: &[KeyCode] = &[KeyCode::KeyA];
const ASCEND_KEYS: &[KeyCode] = &[KeyCode::Space, KeyCode::KeyE];
const DESCEND_KEYS: &[KeyCode] = &[KeyCode::ControlLeft, KeyCode::ControlRight, KeyCode::KeyQ];
const BOOST_KEYS: &[KeyCode] = &[KeyCode::ShiftLeft, KeyCode::ShiftRight];

/// Below this speed (m/s) a coasting camera is considered at rest.
const REST_SPEED: f64 = 1e-3;

/// Largest pitch magnitude the camera may reach.
const MAX_PITCH: f64 = std::f64::consts::FRAC_PI_2 - PITCH_EPSILON;

/// Free-flight controller.
pub struct FlightController {
    core: ControllerCore,
    velocity: DVec3,
    /// Local up the carried direction was last expressed against.
    reference_up: DVec3,
}

impl FlightController {
    /// Create a flight controller; `overrides` win over the flight defaults.
    pub fn new(overrides: &ConfigOverrides) -> Result<Self> {
        let config = overrides.resolve(ControllerConfig::flight_defaults());
        config.validate()?;
        Ok(Self {
            core: ControllerCore::new("flight", config),
            velocity: DVec3::ZERO,
            reference_up: DVec3::Z,
        })
    }

    /// Current velocity in m/s.
    pub fn velocity(&self) -> DVec3 {
        self.velocity
    }

    /// Current speed in m/s.
    pub fn speed(&self) -> f64 {
        self.velocity.length()
    }

    /// Carry the view direction over to the local frame at the current
    /// position, rotating it from the previous up to the new one.
    fn transport(&mut self) -> EnuFrame {
        let camera = self.core.camera_state_mut();
        let frame = EnuFrame::at(camera.position);
        if frame.up.is_finite() && self.reference_up != frame.up {
            let rotation = DQuat::from_rotation_arc(self.reference_up, frame.up);
            camera.direction = rotation * camera.direction;
            camera.up = rotation * camera.up;
            self.reference_up = frame.up;
        }
        frame
    }

    /// Turn the carried direction: yaw about local up (clockwise positive),
    /// pitch toward local up, clamped short of vertical.
    fn turn(&mut self, frame: &EnuFrame, yaw_delta: f64, pitch_delta: f64) {
        let camera = self.core.camera_state_mut();
        let up = frame.up;
        let vertical = camera.direction.dot(up).clamp(-1.0, 1.0);

        // Looking straight up or down, the camera's own up holds the heading.
        let horizontal = (camera.direction - up * vertical)
            .try_normalize()
            .or_else(|| ((camera.up - up * camera.up.dot(up)) * -vertical.signum()).try_normalize())
            .unwrap_or(frame.north);
        let horizontal = DQuat::from_axis_angle(up, -yaw_delta) * horizontal;
        let pitch = (vertical.asin() + pitch_delta).clamp(-MAX_PITCH, MAX_PITCH);

        let direction = horizontal * pitch.cos() + up * pitch.sin();
        camera.set_orientation(direction, up, up);
        camera.yaw = frame.heading_pitch_of(camera.direction).0;
        camera.pitch = pitch;
        camera.roll = 0.0;
    }

    /// Turn by a mouse delta. Applied once per update, before the fixed steps.
    fn apply_mouse_look(&mut self, delta: DVec2) {
        if delta == DVec2::ZERO {
            return;
        }
        let sensitivity = self.core.config().mouse_sensitivity;
        let frame = self.transport();
        self.turn(&frame, delta.x * sensitivity, -delta.y * sensitivity);
    }

    /// Point the camera along its stored heading and pitch in the frame at
    /// its position, dropping any carried direction.
    fn reset_orientation(&mut self) {
        let camera = self.core.camera_state_mut();
        let frame = EnuFrame::at(camera.position);
        let direction = frame.direction(camera.yaw, camera.pitch.clamp(-MAX_PITCH, MAX_PITCH));
        camera.set_orientation(direction, frame.up, frame.up);
        self.reference_up = frame.up;
        self.turn(&frame, 0.0, 0.0);
    }

    /// Advance one fixed step.
    fn step_once(&mut self, input: &InputState, dt: f64) {
        let config = self.core.config();
        let look_rate = config.look_rate;
        let boost = if input.any_pressed(BOOST_KEYS) {
            config.boost_multiplier
        } else {
            1.0
        };
        let max_speed = config.max_speed * boost;
        let acceleration = config.acceleration * boost;
        let friction = config.friction;

        let frame = self.transport();

        // Arrow keys turn at a constant angular rate.
        let yaw_input = input.axis(&[KeyCode::ArrowRight], &[KeyCode::ArrowLeft]);
        let pitch_input = input.axis(&[KeyCode::ArrowUp], &[KeyCode::ArrowDown]);
        self.turn(&frame, yaw_input * look_rate * dt, pitch_input * look_rate * dt);

        let local = DVec3::new(
            input.axis(RIGHT_KEYS, LEFT_KEYS),
            input.axis(ASCEND_KEYS, DESCEND_KEYS),
            input.axis(FORWARD_KEYS, BACKWARD_KEYS),
        );

        let mut velocity = self.velocity;
        if let Some(local) = local.try_normalize() {
            let camera = self.core.camera_state();
            let wish = camera.right * local.x + camera.up * local.y + camera.direction * local.z;
            velocity = move_toward_vec(velocity, wish * max_speed, acceleration * dt);
        } else {
            velocity *= (-friction * dt).exp();
            if velocity.length() < REST_SPEED {
                velocity = DVec3::ZERO;
            }
        }
        velocity = velocity.clamp_length_max(max_speed);

        let position = self.core.camera_state().position + velocity * dt;
        if !(position.is_finite() && velocity.is_finite()) {
            tracing::debug!("flight step produced a non-finite position; step discarded");
            return;
        }

        self.velocity = velocity;
        self.core.camera_state_mut().position = position;
        let physics = self.core.physics_state_mut();
        physics.is_grounded = false;
        physics.vertical_velocity = velocity.dot(frame.up);
    }
}

/// Move a vector toward a target by at most `max_delta`.
fn move_toward_vec(current: DVec3, target: DVec3, max_delta: f64) -> DVec3 {
    let delta = target - current;
    let distance = delta.length();
    if distance <= max_delta || distance < f64::EPSILON {
        target
    } else {
        current + delta / distance * max_delta
    }
}

impl CameraController for FlightController {
    fn initialize(&mut self, host: &mut HostContext<'_>) {
        if !self.core.initialize(host) {
            return;
        }
        self.velocity = DVec3::ZERO;
        let frame = EnuFrame::at(self.core.camera_state().position);
        self.reference_up = frame.up;
        self.turn(&frame, 0.0, 0.0);
        self.core.commit_pose(host.scene);
    }

    fn update(&mut self, host: &mut HostContext<'_>, frame_delta: f64) {
        let Some(frame) = self.core.begin_update(frame_delta) else {
            return;
        };

        self.apply_mouse_look(frame.input.mouse_delta());
        for _ in 0..frame.steps {
            self.step_once(&frame.input, frame.step);
        }

        self.core.finish_update(host.scene);
    }

    fn dispose(&mut self, host: &mut HostContext<'_>) {
        self.core.dispose(host);
        self.velocity = DVec3::ZERO;
    }

    fn teleport(&mut self, host: &mut HostContext<'_>, position: DVec3) {
        if !self.core.is_enabled() || !position.is_finite() {
            return;
        }
        self.velocity = DVec3::ZERO;
        self.core.reset_integrator();
        self.core.camera_state_mut().position = position;
        self.reset_orientation();
        self.core.commit_pose(host.scene);
    }

    fn core(&self) -> &ControllerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ControllerCore {
        &mut self.core
    }

    fn telemetry(&self) -> ControllerTelemetry {
        ControllerTelemetry {
            speed: self.speed(),
            velocity: self.velocity,
            heading: self.core.camera_state().yaw,
            steer_angle: 0.0,
            grounded: false,
            altitude: self.core.altitude(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        geo::{Geodetic, ecef_to_geodetic, geodetic_to_ecef, wrap_angle},
        input::InputEvent,
        sim::{FlatTerrain, HeadlessHost, HeadlessScene, level_pose},
    };

    const DT: f64 = 1.0 / 60.0;

    fn enabled_flight() -> (FlightController, HeadlessHost) {
        let mut host = HeadlessHost::at_degrees(-122.4, 37.8, 500.0, 30.0, FlatTerrain::new(0.0));
        let mut flight = FlightController::new(&ConfigOverrides::default()).unwrap();
        flight.initialize(&mut host.context());
        assert!(flight.is_enabled());
        (flight, host)
    }

    fn run(flight: &mut FlightController, host: &mut HeadlessHost, seconds: f64) {
        let frames = (seconds / DT).round() as usize;
        for _ in 0..frames {
            flight.update(&mut host.context(), DT);
        }
    }

    #[test]
    fn test_initialize_captures_host_pose() {
        let (flight, host) = enabled_flight();
        let state = flight.camera_state();
        assert!((state.yaw - 30f64.to_radians()).abs() < 1e-9);
        assert!(state.pitch.abs() < 1e-9);
        assert!(!host.scene.navigation_enabled());
        assert_eq!(host.input.listener_count(), 1);
    }

    #[test]
    fn test_forward_motion_follows_direction() {
        let (mut flight, mut host) = enabled_flight();
        let start = flight.camera_state().position;
        let direction = flight.camera_state().direction;

        host.press(KeyCode::KeyW);
        run(&mut flight, &mut host, 1.0);

        let moved = flight.camera_state().position - start;
        assert!(moved.dot(direction) > 0.0);
        assert!(flight.speed() <= flight.core().config().max_speed + 1e-9);
        assert!(flight.speed() > 0.0);
    }

    #[test]
    fn test_idle_velocity_decays_to_rest() {
        let (mut flight, mut host) = enabled_flight();
        host.press(KeyCode::KeyW);
        run(&mut flight, &mut host, 1.0);
        host.release(KeyCode::KeyW);

        let mut previous = flight.speed();
        for _ in 0..600 {
            flight.update(&mut host.context(), DT);
            assert!(flight.speed() <= previous);
            previous = flight.speed();
        }
        assert_eq!(flight.velocity(), DVec3::ZERO);
    }

    #[test]
    fn test_boost_raises_speed_cap() {
        let (mut flight, mut host) = enabled_flight();
        host.press(KeyCode::KeyW);
        host.press(KeyCode::ShiftLeft);
        run(&mut flight, &mut host, 3.0);

        let config = flight.core().config();
        assert!(flight.speed() > config.max_speed);
        assert!(flight.speed() <= config.max_speed * config.boost_multiplier + 1e-9);
    }

    #[test]
    fn test_pitch_never_reaches_vertical() {
        let (mut flight, mut host) = enabled_flight();
        host.press(KeyCode::ArrowUp);

        let mut previous = flight.camera_state().pitch;
        for _ in 0..600 {
            flight.update(&mut host.context(), DT);
            let pitch = flight.camera_state().pitch;
            assert!(pitch >= previous);
            assert!(pitch < std::f64::consts::FRAC_PI_2);
            previous = pitch;
        }
        assert!((previous - MAX_PITCH).abs() < 1e-12);
        assert!(flight.camera_state().orthonormality_error() < 1e-9);
    }

    #[test]
    fn test_mouse_look_requires_pointer_lock() {
        let (mut flight, mut host) = enabled_flight();
        let yaw = flight.camera_state().yaw;

        host.input.dispatch(InputEvent::MouseMove { dx: 100.0, dy: 0.0 });
        flight.update(&mut host.context(), DT);
        assert!((flight.camera_state().yaw - yaw).abs() < 1e-12);

        flight.request_pointer_lock(&mut host.input);
        assert_eq!(host.input.take_pointer_lock_request(), Some(true));
        host.input.dispatch(InputEvent::PointerLockChanged(true));
        host.input.dispatch(InputEvent::MouseMove { dx: 100.0, dy: 0.0 });
        flight.update(&mut host.context(), DT);

        let expected = wrap_angle(yaw + 100.0 * flight.core().config().mouse_sensitivity);
        assert!((flight.camera_state().yaw - expected).abs() < 1e-9);
    }

    #[test]
    fn test_no_ground_collision() {
        let (mut flight, mut host) = enabled_flight();
        host.press(KeyCode::ControlLeft);
        run(&mut flight, &mut host, 5.0);
        assert!(flight.core().altitude() < 0.0);
    }

    #[test]
    fn test_flies_straight_over_the_pole() {
        let start = geodetic_to_ecef(Geodetic::from_degrees(0.0, 89.99, 1000.0));
        let mut host = HeadlessHost::new(
            HeadlessScene::new(level_pose(start, 0.0)),
            FlatTerrain::new(0.0),
        );
        let mut flight = FlightController::new(&ConfigOverrides::default()).unwrap();
        flight.initialize(&mut host.context());

        host.press(KeyCode::KeyW);
        run(&mut flight, &mut host, 1.0);
        let cruise = flight.speed();
        run(&mut flight, &mut host, 9.0);

        let end = ecef_to_geodetic(flight.camera_state().position);
        let (lon, lat) = end.lon_lat_degrees();
        assert!(lon.abs() > 170.0, "still on the near side: lon {lon}");
        assert!(lat < 89.995, "stalled near the pole: lat {lat}");
        assert!((flight.camera_state().position - start).length() > 2000.0);
        assert!((flight.speed() - cruise).abs() < 1e-6);
        assert!(flight.camera_state().pitch.abs() < 1e-6);
        assert!((flight.camera_state().yaw.abs() - std::f64::consts::PI).abs() < 1e-3);
        assert!(flight.camera_state().orthonormality_error() < 1e-9);
    }

    #[test]
    fn test_releasing_boost_clamps_to_normal_cap() {
        let (mut flight, mut host) = enabled_flight();
        host.press(KeyCode::KeyW);
        host.press(KeyCode::ShiftLeft);
        run(&mut flight, &mut host, 3.0);
        let config = flight.core().config().clone();
        assert!(flight.speed() > config.max_speed);

        host.release(KeyCode::ShiftLeft);
        flight.update(&mut host.context(), DT);
        assert!((flight.speed() - config.max_speed).abs() < 1e-9);
    }

    #[test]
    fn test_move_toward_vec() {
        let result = move_toward_vec(DVec3::ZERO, DVec3::new(10.0, 0.0, 0.0), 4.0);
        assert_eq!(result, DVec3::new(4.0, 0.0, 0.0));
        let result = move_toward_vec(DVec3::ZERO, DVec3::new(1.0, 0.0, 0.0), 4.0);
        assert_eq!(result, DVec3::new(1.0, 0.0, 0.0));
    }
}
