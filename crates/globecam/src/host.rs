//! The narrow interface controllers need from the host scene engine.
//!
//! The host owns the render loop, the camera object and terrain streaming.
//! Controllers only see these three traits, borrowed for the duration of each
//! lifecycle call through [`HostContext`].

use glam::DVec3;

use crate::input::InputSource;

/// A camera pose as pushed to (or read from) the host camera.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraPose {
    /// ECEF position in meters.
    pub position: DVec3,
    /// Unit view direction.
    pub direction: DVec3,
    /// Unit up vector.
    pub up: DVec3,
    /// Unit right vector.
    pub right: DVec3,
}

/// Ground elevation lookup.
pub trait TerrainOracle {
    /// Ellipsoidal height of the ground at a longitude/latitude in degrees.
    ///
    /// `None` means the covering tiles are not loaded yet.
    fn query_terrain_height(&self, longitude: f64, latitude: f64) -> Option<f64>;
}

/// The host camera and navigation controls.
pub trait SceneCameraSink {
    /// The host camera's current pose, or `None` if there is no scene/camera yet.
    fn current_pose(&self) -> Option<CameraPose>;

    /// Push a pose to the host camera.
    fn apply_camera_pose(&mut self, pose: &CameraPose);

    /// Toggle the host's built-in camera navigation.
    fn set_default_navigation_enabled(&mut self, enabled: bool);

    /// Ask the host to render a frame it would otherwise skip.
    fn request_render(&mut self) {}
}

/// Borrowed host handles passed to every lifecycle call.
pub struct HostContext<'a> {
    /// Host camera sink.
    pub scene: &'a mut dyn SceneCameraSink,
    /// Terrain height oracle.
    pub terrain: &'a dyn TerrainOracle,
    /// Device event source.
    pub input: &'a mut dyn InputSource,
}

impl<'a> HostContext<'a> {
    /// Bundle host handles.
    pub fn new(
        scene: &'a mut dyn SceneCameraSink,
        terrain: &'a dyn TerrainOracle,
        input: &'a mut dyn InputSource,
    ) -> Self {
        Self {
            scene,
            terrain,
            input,
        }
    }
}
