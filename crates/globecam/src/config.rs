//! Controller tuning.
//!
//! Each controller has its own defaults; callers supply [`ConfigOverrides`]
//! where any field they set wins over the default. Overrides and
//! [`CarTuning`] deserialize from JSON so hosts can ship presets.

use serde::{Deserialize, Serialize};

use crate::{
    constants::{DEFAULT_FIXED_STEP, DEFAULT_MAX_FRAME_DELTA, DEFAULT_MAX_SUBSTEPS},
    error::{Error, Result},
};

/// Immutable per-controller tuning.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ControllerConfig {
    /// Maximum speed in m/s (flight cruise speed, car top forward speed).
    pub max_speed: f64,
    /// Acceleration toward the target velocity in m/s² (flight).
    pub acceleration: f64,
    /// Exponential velocity decay rate in 1/s when no movement key is held (flight).
    pub friction: f64,
    /// Mouse look sensitivity in radians per pixel.
    pub mouse_sensitivity: f64,
    /// Arrow key look rate in rad/s.
    pub look_rate: f64,
    /// Eye height above the ground in meters (terrain-locked controllers).
    pub eye_height: f64,
    /// Extra clearance between the ground and the eye height, in meters.
    pub ground_clearance: f64,
    /// Speed multiplier while the boost key is held.
    pub boost_multiplier: f64,
    /// Emit per-update state at debug level.
    pub debug: bool,
    /// Fixed physics step in seconds.
    pub fixed_step: f64,
    /// Frame deltas are clamped to this many seconds.
    pub max_frame_delta: f64,
    /// Maximum fixed steps per update.
    pub max_substeps: u32,
}

impl ControllerConfig {
    /// Defaults for the free-flight controller.
    pub fn flight_defaults() -> Self {
        Self {
            max_speed: 250.0,
            acceleration: 400.0,
            friction: 4.0,
            mouse_sensitivity: 0.002,
            look_rate: 1.2,
            eye_height: 0.0,
            ground_clearance: 0.0,
            boost_multiplier: 5.0,
            debug: false,
            fixed_step: DEFAULT_FIXED_STEP,
            max_frame_delta: DEFAULT_MAX_FRAME_DELTA,
            max_substeps: DEFAULT_MAX_SUBSTEPS,
        }
    }

    /// Defaults for the car-drive controller.
    pub fn drive_defaults() -> Self {
        Self {
            max_speed: 40.0,
            acceleration: 0.0,
            friction: 0.0,
            mouse_sensitivity: 0.002,
            look_rate: 0.0,
            eye_height: 1.6,
            ground_clearance: 0.0,
            boost_multiplier: 1.8,
            debug: false,
            fixed_step: DEFAULT_FIXED_STEP,
            max_frame_delta: DEFAULT_MAX_FRAME_DELTA,
            max_substeps: DEFAULT_MAX_SUBSTEPS,
        }
    }

    /// Check that every value is in range.
    pub fn validate(&self) -> Result<()> {
        require_positive("fixed_step", self.fixed_step)?;
        require_positive("max_speed", self.max_speed)?;
        require_non_negative("acceleration", self.acceleration)?;
        require_non_negative("friction", self.friction)?;
        require_non_negative("mouse_sensitivity", self.mouse_sensitivity)?;
        require_non_negative("look_rate", self.look_rate)?;
        require_non_negative("eye_height", self.eye_height)?;
        require_non_negative("ground_clearance", self.ground_clearance)?;

        if !(self.boost_multiplier.is_finite() && self.boost_multiplier >= 1.0) {
            return Err(Error::invalid_config(
                "boost_multiplier",
                format!("must be at least 1, got {}", self.boost_multiplier),
            ));
        }
        if !(self.max_frame_delta.is_finite() && self.max_frame_delta >= self.fixed_step) {
            return Err(Error::invalid_config(
                "max_frame_delta",
                format!(
                    "must be at least fixed_step ({}), got {}",
                    self.fixed_step, self.max_frame_delta
                ),
            ));
        }
        if self.max_substeps == 0 {
            return Err(Error::invalid_config("max_substeps", "must be at least 1"));
        }
        Ok(())
    }
}

/// Caller-supplied values that replace controller defaults.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigOverrides {
    pub max_speed: Option<f64>,
    pub acceleration: Option<f64>,
    pub friction: Option<f64>,
    pub mouse_sensitivity: Option<f64>,
    pub look_rate: Option<f64>,
    pub eye_height: Option<f64>,
    pub ground_clearance: Option<f64>,
    pub boost_multiplier: Option<f64>,
    pub debug: Option<bool>,
    pub fixed_step: Option<f64>,
    pub max_frame_delta: Option<f64>,
    pub max_substeps: Option<u32>,
}

impl ConfigOverrides {
    /// Merge over `defaults`; every field set here wins.
    pub fn resolve(&self, defaults: ControllerConfig) -> ControllerConfig {
        ControllerConfig {
            max_speed: self.max_speed.unwrap_or(defaults.max_speed),
            acceleration: self.acceleration.unwrap_or(defaults.acceleration),
            friction: self.friction.unwrap_or(defaults.friction),
            mouse_sensitivity: self.mouse_sensitivity.unwrap_or(defaults.mouse_sensitivity),
            look_rate: self.look_rate.unwrap_or(defaults.look_rate),
            eye_height: self.eye_height.unwrap_or(defaults.eye_height),
            ground_clearance: self.ground_clearance.unwrap_or(defaults.ground_clearance),
            boost_multiplier: self.boost_multiplier.unwrap_or(defaults.boost_multiplier),
            debug: self.debug.unwrap_or(defaults.debug),
            fixed_step: self.fixed_step.unwrap_or(defaults.fixed_step),
            max_frame_delta: self.max_frame_delta.unwrap_or(defaults.max_frame_delta),
            max_substeps: self.max_substeps.unwrap_or(defaults.max_substeps),
        }
    }
}

/// Car dynamics constants for the drive controller.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CarTuning {
    /// Vehicle mass in kg.
    pub mass: f64,
    /// Engine force at full throttle in N.
    pub engine_force: f64,
    /// Brake force in N.
    pub brake_force: f64,
    /// Quadratic aerodynamic drag coefficient (N per (m/s)²).
    pub drag_coefficient: f64,
    /// Constant rolling resistance in N.
    pub rolling_resistance: f64,
    /// Distance between axles in meters.
    pub wheel_base: f64,
    /// Maximum steering angle in radians.
    pub max_steer: f64,
    /// Steering rate toward full lock in rad/s.
    pub steer_rate: f64,
    /// Steering return rate toward center in rad/s.
    pub steer_return_rate: f64,
    /// Top reverse speed in m/s.
    pub max_reverse_speed: f64,
    /// Speeds below this snap to zero when coasting, in m/s.
    pub speed_deadzone: f64,
}

impl Default for CarTuning {
    fn default() -> Self {
        Self {
            mass: 1200.0,
            engine_force: 6000.0,
            brake_force: 9000.0,
            drag_coefficient: 0.43,
            rolling_resistance: 150.0,
            wheel_base: 2.6,
            max_steer: 0.6,
            steer_rate: 2.0,
            steer_return_rate: 3.0,
            max_reverse_speed: 12.0,
            speed_deadzone: 0.05,
        }
    }
}

impl CarTuning {
    /// Check that every value is in range.
    pub fn validate(&self) -> Result<()> {
        require_positive("mass", self.mass)?;
        require_positive("wheel_base", self.wheel_base)?;
        require_positive("max_reverse_speed", self.max_reverse_speed)?;
        require_non_negative("engine_force", self.engine_force)?;
        require_non_negative("brake_force", self.brake_force)?;
        require_non_negative("drag_coefficient", self.drag_coefficient)?;
        require_non_negative("rolling_resistance", self.rolling_resistance)?;
        require_non_negative("steer_rate", self.steer_rate)?;
        require_non_negative("steer_return_rate", self.steer_return_rate)?;
        require_non_negative("speed_deadzone", self.speed_deadzone)?;

        if !(self.max_steer > 0.0 && self.max_steer < std::f64::consts::FRAC_PI_2) {
            return Err(Error::invalid_config(
                "max_steer",
                format!("must be in (0, π/2), got {}", self.max_steer),
            ));
        }
        Ok(())
    }
}

fn require_positive(field: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::invalid_config(
            field,
            format!("must be positive, got {value}"),
        ))
    }
}

fn require_non_negative(field: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::invalid_config(
            field,
            format!("must be non-negative, got {value}"),
        ))
    }
}
