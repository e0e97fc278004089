//! Shared physical and geodetic constants.

/// WGS84 semi-major axis (equatorial radius) in meters.
pub const WGS84_A: f64 = 6_378_137.0;

/// WGS84 flattening.
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;

/// WGS84 semi-minor axis (polar radius) in meters.
pub const WGS84_B: f64 = WGS84_A * (1.0 - WGS84_F);

/// WGS84 first eccentricity squared.
pub const WGS84_E2: f64 = WGS84_F * (2.0 - WGS84_F);

/// Default fixed physics step (60 Hz).
pub const DEFAULT_FIXED_STEP: f64 = 1.0 / 60.0;

/// Upper bound on a single frame delta, so a frozen tab doesn't produce one huge step.
pub const DEFAULT_MAX_FRAME_DELTA: f64 = 0.25;

/// Maximum number of fixed steps run by one `update()` call.
pub const DEFAULT_MAX_SUBSTEPS: u32 = 10;

/// Pitch is kept this far away from straight up/down.
pub const PITCH_EPSILON: f64 = 0.001_953_125;
