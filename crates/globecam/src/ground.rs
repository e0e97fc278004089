//! Terrain locking for ground-bound controllers.
//!
//! Raw terrain samples jump slightly as tiles refine, and consecutive steps
//! sample slightly different spots. Feeding those straight into the camera
//! height makes it bob, so samples go through two filters: an exponential
//! smoother, then a hysteresis band on the resulting target height.

use glam::DVec3;

use crate::{
    geo::{ecef_to_geodetic, geodetic_to_ecef},
    host::TerrainOracle,
};

/// Default exponential smoothing factor applied to raw terrain samples.
pub const DEFAULT_SMOOTHING: f64 = 0.15;

/// Default hysteresis band in meters around the held target height.
pub const DEFAULT_HYSTERESIS: f64 = 0.15;

/// Filter state carried between steps.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GroundState {
    /// Most recent raw terrain sample.
    pub last_ground_height: Option<f64>,
    /// Exponentially smoothed terrain height.
    pub smoothed_ground_height: Option<f64>,
    /// Camera height currently held inside the hysteresis band.
    pub last_target_height: Option<f64>,
}

/// Outcome of resolving one proposed position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroundResolution {
    /// Terrain-locked ECEF position.
    pub position: DVec3,
    /// Whether the controller should consider itself on the ground.
    pub grounded: bool,
    /// Whether a terrain sample was available.
    pub sampled: bool,
}

/// Clamps proposed positions to a smoothed height above the terrain.
#[derive(Clone, Debug)]
pub struct GroundResolver {
    smoothing: f64,
    hysteresis: f64,
    eye_height: f64,
    ground_clearance: f64,
    state: GroundState,
}

impl GroundResolver {
    /// Create a resolver holding the eye `eye_height + ground_clearance` above the terrain.
    pub fn new(eye_height: f64, ground_clearance: f64) -> Self {
        Self {
            smoothing: DEFAULT_SMOOTHING,
            hysteresis: DEFAULT_HYSTERESIS,
            eye_height,
            ground_clearance,
            state: GroundState::default(),
        }
    }

    /// Override the smoothing factor (`0 < alpha <= 1`).
    #[must_use]
    pub fn with_smoothing(mut self, alpha: f64) -> Self {
        self.smoothing = alpha.clamp(f64::EPSILON, 1.0);
        self
    }

    /// Override the hysteresis band in meters.
    #[must_use]
    pub fn with_hysteresis(mut self, band: f64) -> Self {
        self.hysteresis = band.max(0.0);
        self
    }

    /// Current filter state.
    pub fn state(&self) -> &GroundState {
        &self.state
    }

    /// Forget all samples (after a teleport or on initialize).
    pub fn reset(&mut self) {
        self.state = GroundState::default();
    }

    /// Filter state after folding in `raw_height`, or `None` if the filters
    /// would leave the finite range.
    fn advance(&self, raw_height: f64) -> Option<GroundState> {
        // The first sample seeds the smoother instead of easing in from zero.
        let smoothed = match self.state.smoothed_ground_height {
            Some(previous) => previous + self.smoothing * (raw_height - previous),
            None => raw_height,
        };
        let target = smoothed + self.eye_height + self.ground_clearance;
        if !(smoothed.is_finite() && target.is_finite()) {
            return None;
        }

        let held = match self.state.last_target_height {
            Some(previous) if (target - previous).abs() <= self.hysteresis => previous,
            _ => target,
        };
        Some(GroundState {
            last_ground_height: Some(raw_height),
            smoothed_ground_height: Some(smoothed),
            last_target_height: Some(held),
        })
    }

    /// Fold a raw terrain sample into the filters and return the held target
    /// height. A sample that would overflow the filters is rejected and the
    /// state left untouched.
    pub fn track(&mut self, raw_height: f64) -> Option<f64> {
        let next = self.advance(raw_height)?;
        self.state = next;
        next.last_target_height
    }

    /// Lock `proposed` to the terrain.
    ///
    /// Without a usable terrain sample the `previous` position is kept as is
    /// and the controller is treated as grounded, so a tile that hasn't
    /// loaded yet never drops the camera through the surface. The filters
    /// only take a sample whose locked position stays in range.
    pub fn resolve(
        &mut self,
        proposed: DVec3,
        previous: DVec3,
        terrain: &dyn TerrainOracle,
    ) -> GroundResolution {
        let geodetic = ecef_to_geodetic(proposed);
        let (longitude, latitude) = geodetic.lon_lat_degrees();

        let locked = terrain
            .query_terrain_height(longitude, latitude)
            .filter(|height| height.is_finite())
            .and_then(|raw_height| self.advance(raw_height))
            .and_then(|next| {
                let position = geodetic_to_ecef(geodetic.with_height(next.last_target_height?));
                // Geodetic conversion squares coordinates, so they must square finitely too.
                position.length_squared().is_finite().then_some((next, position))
            });

        let Some((next, position)) = locked else {
            tracing::trace!(longitude, latitude, "terrain height unusable, holding position");
            return GroundResolution {
                position: previous,
                grounded: true,
                sampled: false,
            };
        };

        self.state = next;
        GroundResolution {
            position,
            grounded: true,
            sampled: true,
        }
    }
}
