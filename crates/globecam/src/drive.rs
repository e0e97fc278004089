//! Terrain-locked car-drive controller.
//!
//! The car is a kinematic bicycle: speed follows engine, brake, drag and
//! rolling resistance forces, heading turns at `speed / wheel_base · tan(steer)`
//! and the position is clamped to the smoothed terrain height every step.
//!
//! The force model is a set of pure functions so it can be tuned and tested
//! without a host.

use glam::DVec3;

use crate::{
    config::{CarTuning, ConfigOverrides, ControllerConfig},
    controller::{CameraController, ControllerCore, ControllerTelemetry},
    error::Result,
    geo::{EnuFrame, wrap_angle},
    ground::{GroundResolver, GroundState},
    host::{HostContext, TerrainOracle},
    input::{InputState, KeyCode},
};

const THROTTLE_KEYS: &[KeyCode] = &[KeyCode::KeyW, KeyCode::ArrowUp];
const REVERSE_KEYS: &[KeyCode] = &[KeyCode::KeyS, KeyCode::ArrowDown];
const STEER_RIGHT_KEYS: &[KeyCode] = &[KeyCode::KeyD, KeyCode::ArrowRight];
const STEER_LEFT_KEYS: &[KeyCode] = &[KeyCode::KeyA, KeyCode::ArrowLeft];
const BRAKE_KEYS: &[KeyCode] = &[KeyCode::Space];
const BOOST_KEYS: &[KeyCode] = &[KeyCode::ShiftLeft, KeyCode::ShiftRight];

/// Inputs smaller than this are treated as released.
const INPUT_EPSILON: f64 = 1e-6;

/// Per-step car driving input.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DriveInput {
    /// Throttle in `[-1, 1]`; negative drives in reverse.
    pub throttle: f64,
    /// Steering in `[-1, 1]`; positive steers right.
    pub steer: f64,
    /// Whether the brake is held.
    pub brake: bool,
    /// Whether the boost is held.
    pub boost: bool,
}

impl DriveInput {
    /// Read the drive bindings from the input state.
    pub fn from_input(input: &InputState) -> Self {
        Self {
            throttle: input.axis(THROTTLE_KEYS, REVERSE_KEYS),
            steer: input.axis(STEER_RIGHT_KEYS, STEER_LEFT_KEYS),
            brake: input.any_pressed(BRAKE_KEYS),
            boost: input.any_pressed(BOOST_KEYS),
        }
    }

    fn is_coasting(&self) -> bool {
        self.throttle.abs() < INPUT_EPSILON
    }
}

/// Car dynamics carried between steps.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CarState {
    /// Signed speed along the heading in m/s; negative when reversing.
    pub speed: f64,
    /// Heading in radians, clockwise from north.
    pub heading: f64,
    /// Current front wheel angle in radians; positive steers right.
    pub steer_angle: f64,
}

/// Longitudinal forces acting on the car, in newtons along the heading.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LongitudinalForces {
    pub engine: f64,
    pub brake: f64,
    pub drag: f64,
    pub rolling: f64,
}

impl LongitudinalForces {
    /// Net force.
    pub fn total(&self) -> f64 {
        self.engine + self.brake + self.drag + self.rolling
    }
}

/// Move a value toward a target by at most `max_delta`.
pub fn move_toward(current: f64, target: f64, max_delta: f64) -> f64 {
    if (target - current).abs() <= max_delta {
        target
    } else {
        current + (target - current).signum() * max_delta
    }
}

/// Sign of `value`, with zero mapping to zero.
fn sign(value: f64) -> f64 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Advance the steering angle toward the requested lock, or back to center
/// when steering is released. The result never exceeds `max_steer`.
pub fn update_steering(steer_angle: f64, steer_input: f64, tuning: &CarTuning, dt: f64) -> f64 {
    let next = if steer_input.abs() > INPUT_EPSILON {
        let target = steer_input.clamp(-1.0, 1.0) * tuning.max_steer;
        move_toward(steer_angle, target, tuning.steer_rate * dt)
    } else {
        move_toward(steer_angle, 0.0, tuning.steer_return_rate * dt)
    };
    next.clamp(-tuning.max_steer, tuning.max_steer)
}

/// Forces acting on a car moving at `speed`.
///
/// Rolling resistance applies whenever the car moves, including under throttle.
pub fn longitudinal_forces(
    speed: f64,
    input: &DriveInput,
    tuning: &CarTuning,
    boost_multiplier: f64,
) -> LongitudinalForces {
    let boost = if input.boost { boost_multiplier } else { 1.0 };
    let direction = sign(speed);
    LongitudinalForces {
        engine: input.throttle.clamp(-1.0, 1.0) * tuning.engine_force * boost,
        brake: if input.brake {
            -direction * tuning.brake_force
        } else {
            0.0
        },
        drag: -tuning.drag_coefficient * speed * speed.abs(),
        rolling: -direction * tuning.rolling_resistance,
    }
}

/// Integrate speed over one step.
///
/// Speed is clamped to `[-max_reverse_speed, max_forward_speed]`, both
/// scaled by the boost multiplier while boosting. When coasting, resistance
/// can stop the car but never reverses it, and speeds inside the deadzone
/// snap to zero.
pub fn integrate_speed(
    speed: f64,
    input: &DriveInput,
    tuning: &CarTuning,
    max_forward_speed: f64,
    boost_multiplier: f64,
    dt: f64,
) -> f64 {
    let forces = longitudinal_forces(speed, input, tuning, boost_multiplier);
    let boost = if input.boost { boost_multiplier } else { 1.0 };

    let mut next = speed + forces.total() / tuning.mass * dt;
    next = next.clamp(
        -tuning.max_reverse_speed * boost,
        max_forward_speed * boost,
    );

    if input.is_coasting() {
        if speed * next < 0.0 {
            next = 0.0;
        }
        if next.abs() < tuning.speed_deadzone {
            next = 0.0;
        }
    }
    next
}

/// Kinematic bicycle yaw rate in rad/s (positive turns clockwise).
pub fn yaw_rate(speed: f64, steer_angle: f64, wheel_base: f64) -> f64 {
    speed / wheel_base * steer_angle.tan()
}

/// Terrain-locked car-drive controller.
pub struct CarDriveController {
    core: ControllerCore,
    tuning: CarTuning,
    car: CarState,
    ground: GroundResolver,
}

impl CarDriveController {
    /// Create a drive controller; `overrides` win over the drive defaults.
    pub fn new(overrides: &ConfigOverrides, tuning: CarTuning) -> Result<Self> {
        let config = overrides.resolve(ControllerConfig::drive_defaults());
        config.validate()?;
        tuning.validate()?;
        let ground = GroundResolver::new(config.eye_height, config.ground_clearance);
        Ok(Self {
            core: ControllerCore::new("drive", config),
            tuning,
            car: CarState::default(),
            ground,
        })
    }

    /// Car dynamics.
    pub fn car_state(&self) -> &CarState {
        &self.car
    }

    /// Car constants.
    pub fn tuning(&self) -> &CarTuning {
        &self.tuning
    }

    /// Terrain filter state.
    pub fn ground_state(&self) -> &GroundState {
        self.ground.state()
    }

    /// Signed speed in m/s.
    pub fn speed(&self) -> f64 {
        self.car.speed
    }

    /// World-space velocity along the current heading.
    pub fn velocity(&self) -> DVec3 {
        EnuFrame::at(self.core.camera_state().position).horizontal(self.car.heading) * self.car.speed
    }

    /// Place the camera at `position` level with the horizon along the heading.
    fn orient_at(&mut self, position: DVec3) {
        let frame = EnuFrame::at(position);
        let heading = self.car.heading;
        let camera = self.core.camera_state_mut();
        camera.position = position;
        camera.set_orientation(frame.horizontal(heading), frame.up, frame.up);
        camera.yaw = heading;
        camera.pitch = 0.0;
        camera.roll = 0.0;
    }

    /// Snap the current position onto the terrain, if a sample exists.
    fn settle(&mut self, terrain: &dyn TerrainOracle) {
        let position = self.core.camera_state().position;
        let resolution = self.ground.resolve(position, position, terrain);
        self.core.physics_state_mut().is_grounded = resolution.grounded;
        self.orient_at(resolution.position);
    }

    /// Advance one fixed step.
    fn step_once(&mut self, input: &InputState, terrain: &dyn TerrainOracle, dt: f64) {
        let config = self.core.config();
        let drive = DriveInput::from_input(input);
        let position = self.core.camera_state().position;
        let frame = EnuFrame::at(position);

        let steer_angle = update_steering(self.car.steer_angle, drive.steer, &self.tuning, dt);
        let speed = integrate_speed(
            self.car.speed,
            &drive,
            &self.tuning,
            config.max_speed,
            config.boost_multiplier,
            dt,
        );
        let heading = wrap_angle(
            self.car.heading + yaw_rate(speed, steer_angle, self.tuning.wheel_base) * dt,
        );

        let proposed = position + frame.horizontal(heading) * speed * dt;
        if !(proposed.is_finite() && speed.is_finite() && heading.is_finite()) {
            tracing::debug!("drive step produced a non-finite state; step discarded");
            return;
        }

        let resolution = self.ground.resolve(proposed, position, terrain);
        if !resolution.position.is_finite() {
            tracing::debug!("terrain lock produced a non-finite position; step discarded");
            return;
        }
        self.car = CarState {
            speed,
            heading,
            steer_angle,
        };
        self.orient_at(resolution.position);

        let physics = self.core.physics_state_mut();
        physics.is_grounded = resolution.grounded;
        physics.vertical_velocity = (resolution.position - position).dot(frame.up) / dt;
    }
}

impl CameraController for CarDriveController {
    fn initialize(&mut self, host: &mut HostContext<'_>) {
        if !self.core.initialize(host) {
            return;
        }
        self.car = CarState {
            heading: self.core.camera_state().yaw,
            ..CarState::default()
        };
        self.ground.reset();
        self.settle(host.terrain);
        self.core.commit_pose(host.scene);
    }

    fn update(&mut self, host: &mut HostContext<'_>, frame_delta: f64) {
        let Some(frame) = self.core.begin_update(frame_delta) else {
            return;
        };

        for _ in 0..frame.steps {
            self.step_once(&frame.input, host.terrain, frame.step);
        }

        self.core.finish_update(host.scene);
    }

    fn dispose(&mut self, host: &mut HostContext<'_>) {
        self.core.dispose(host);
        self.car.speed = 0.0;
        self.car.steer_angle = 0.0;
    }

    fn teleport(&mut self, host: &mut HostContext<'_>, position: DVec3) {
        if !self.core.is_enabled() || !position.is_finite() {
            return;
        }
        self.car.speed = 0.0;
        self.car.steer_angle = 0.0;
        self.core.reset_integrator();
        self.ground.reset();
        self.core.camera_state_mut().position = position;
        self.settle(host.terrain);
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
            speed: self.car.speed,
            velocity: self.velocity(),
            heading: self.car.heading,
            steer_angle: self.car.steer_angle,
            grounded: self.core.physics_state().is_grounded,
            altitude: self.core.altitude(),
        }
    }
}
