//! Headless host for driving controllers without a scene engine.
//!
//! Used by the tuning binary and by tests. [`HeadlessScene`] records what a
//! controller pushes to the camera; the terrain types stand in for a tile
//! streamer at various levels of cooperation.

use std::cell::{Cell, RefCell};

use glam::DVec3;
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    geo::{EnuFrame, Geodetic, geodetic_to_ecef},
    host::{CameraPose, HostContext, SceneCameraSink, TerrainOracle},
    input::{InputEvent, InputHub, KeyCode},
};

/// Scene camera that stores the last pose it was given.
#[derive(Clone, Debug)]
pub struct HeadlessScene {
    pose: Option<CameraPose>,
    navigation_enabled: bool,
    applied_poses: usize,
    render_requests: usize,
}

impl HeadlessScene {
    /// A scene whose camera starts at `pose`.
    pub fn new(pose: CameraPose) -> Self {
        Self {
            pose: Some(pose),
            navigation_enabled: true,
            applied_poses: 0,
            render_requests: 0,
        }
    }

    /// A scene with no camera yet.
    pub fn unavailable() -> Self {
        Self {
            pose: None,
            ..Self::new(level_pose(DVec3::X * crate::constants::WGS84_A, 0.0))
        }
    }

    /// Replace the camera pose, or remove the camera.
    pub fn set_pose(&mut self, pose: Option<CameraPose>) {
        self.pose = pose;
    }

    /// The camera pose, if there is a camera.
    pub fn pose(&self) -> Option<&CameraPose> {
        self.pose.as_ref()
    }

    /// Whether the host's own navigation is enabled.
    pub fn navigation_enabled(&self) -> bool {
        self.navigation_enabled
    }

    /// Number of poses pushed by controllers.
    pub fn applied_poses(&self) -> usize {
        self.applied_poses
    }

    /// Number of explicit render requests.
    pub fn render_requests(&self) -> usize {
        self.render_requests
    }
}

impl SceneCameraSink for HeadlessScene {
    fn current_pose(&self) -> Option<CameraPose> {
        self.pose
    }

    fn apply_camera_pose(&mut self, pose: &CameraPose) {
        self.pose = Some(*pose);
        self.applied_poses += 1;
    }

    fn set_default_navigation_enabled(&mut self, enabled: bool) {
        self.navigation_enabled = enabled;
    }

    fn request_render(&mut self) {
        self.render_requests += 1;
    }
}

/// A camera pose at `position` looking along `heading` (radians), level with the horizon.
pub fn level_pose(position: DVec3, heading: f64) -> CameraPose {
    let frame = EnuFrame::at(position);
    let direction = frame.horizontal(heading);
    CameraPose {
        position,
        direction,
        up: frame.up,
        right: direction.cross(frame.up),
    }
}

/// Terrain at a constant ellipsoidal height everywhere.
#[derive(Clone, Copy, Debug)]
pub struct FlatTerrain {
    height: f64,
}

impl FlatTerrain {
    pub fn new(height: f64) -> Self {
        Self { height }
    }
}

impl TerrainOracle for FlatTerrain {
    fn query_terrain_height(&self, _longitude: f64, _latitude: f64) -> Option<f64> {
        Some(self.height)
    }
}

/// Terrain whose samples jitter around a base height, like refining tiles.
#[derive(Debug)]
pub struct NoisyTerrain {
    base: f64,
    amplitude: f64,
    rng: RefCell<StdRng>,
}

impl NoisyTerrain {
    /// Samples fall uniformly in `base ± amplitude`; `seed` makes runs repeatable.
    pub fn new(base: f64, amplitude: f64, seed: u64) -> Self {
        Self {
            base,
            amplitude: amplitude.abs(),
            rng: RefCell::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl TerrainOracle for NoisyTerrain {
    fn query_terrain_height(&self, _longitude: f64, _latitude: f64) -> Option<f64> {
        if self.amplitude == 0.0 {
            return Some(self.base);
        }
        let offset = self
            .rng
            .borrow_mut()
            .random_range(-self.amplitude..=self.amplitude);
        Some(self.base + offset)
    }
}

/// Terrain that reports "not loaded" for its first `pending` queries.
#[derive(Debug)]
pub struct LoadingTerrain<T> {
    inner: T,
    pending: Cell<u32>,
}

impl<T> LoadingTerrain<T> {
    pub fn new(inner: T, pending: u32) -> Self {
        Self {
            inner,
            pending: Cell::new(pending),
        }
    }

    /// Queries left before tiles "load".
    pub fn pending(&self) -> u32 {
        self.pending.get()
    }
}

impl<T: TerrainOracle> TerrainOracle for LoadingTerrain<T> {
    fn query_terrain_height(&self, longitude: f64, latitude: f64) -> Option<f64> {
        let pending = self.pending.get();
        if pending > 0 {
            self.pending.set(pending - 1);
            return None;
        }
        self.inner.query_terrain_height(longitude, latitude)
    }
}

/// A scene, terrain and input hub bundled together.
pub struct HeadlessHost {
    pub scene: HeadlessScene,
    pub terrain: Box<dyn TerrainOracle>,
    pub input: InputHub,
}

impl HeadlessHost {
    pub fn new(scene: HeadlessScene, terrain: impl TerrainOracle + 'static) -> Self {
        Self {
            scene,
            terrain: Box::new(terrain),
            input: InputHub::new(),
        }
    }

    /// A host whose camera sits at a geodetic location (degrees, meters)
    /// looking level along `heading_degrees`.
    pub fn at_degrees(
        longitude: f64,
        latitude: f64,
        height: f64,
        heading_degrees: f64,
        terrain: impl TerrainOracle + 'static,
    ) -> Self {
        let position = geodetic_to_ecef(Geodetic::from_degrees(longitude, latitude, height));
        Self::new(
            HeadlessScene::new(level_pose(position, heading_degrees.to_radians())),
            terrain,
        )
    }

    /// Swap the terrain source.
    pub fn set_terrain(&mut self, terrain: impl TerrainOracle + 'static) {
        self.terrain = Box::new(terrain);
    }

    /// Borrow everything as a [`HostContext`].
    pub fn context(&mut self) -> HostContext<'_> {
        HostContext::new(&mut self.scene, &*self.terrain, &mut self.input)
    }

    pub fn press(&mut self, key: KeyCode) {
        self.input.dispatch(InputEvent::KeyDown(key));
    }

    pub fn release(&mut self, key: KeyCode) {
        self.input.dispatch(InputEvent::KeyUp(key));
    }

    /// Release every key in `keys`.
    pub fn release_all(&mut self, keys: &[KeyCode]) {
        for key in keys {
            self.release(*key);
        }
    }
}
