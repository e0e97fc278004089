//! Controller lifecycle shared by every camera controller.
//!
//! [`ControllerCore`] is composed into each concrete controller rather than
//! inherited from. It owns the lifecycle phase, the camera/physics/input
//! state, the fixed-step accumulator and the input listener registration.
//! Concrete controllers only supply their per-step force model.
//!
//! ## Lifecycle
//!
//! ```text
//! Disabled --initialize--> Enabled --dispose--> Disposed
//!     \__________________dispose_________________/
//! ```
//!
//! `initialize` without a host camera is a no-op and leaves the controller
//! `Disabled`, so it can be retried once the host is ready.

use std::{cell::Ref, rc::Rc};

use glam::DVec3;

use crate::{
    camera::{CameraState, PhysicsState},
    config::ControllerConfig,
    geo::ecef_to_geodetic,
    host::{HostContext, SceneCameraSink},
    input::{InputSource, InputState, ListenerId, SharedInputState},
    integrator::FixedStepper,
};

/// Delays (seconds of controller time) at which a programmatic pose change
/// re-requests a render, covering hosts that recompute bounding volumes
/// asynchronously after a transform change.
const RENDER_NUDGE_DELAYS: [f64; 2] = [0.03, 0.09];

/// Lifecycle phase of a controller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ControllerPhase {
    /// Constructed, or `initialize` could not complete yet.
    #[default]
    Disabled,
    /// Listening to input and driving the camera.
    Enabled,
    /// Torn down. A new controller is needed to drive the camera again.
    Disposed,
}

/// Read-only diagnostics for debug overlays.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ControllerTelemetry {
    /// Speed in m/s (signed for the car: negative when reversing).
    pub speed: f64,
    /// World-space velocity in m/s.
    pub velocity: DVec3,
    /// Heading in radians, clockwise from north.
    pub heading: f64,
    /// Steering angle in radians (zero for flight).
    pub steer_angle: f64,
    /// Whether the controller is on the ground.
    pub grounded: bool,
    /// Height above the ellipsoid in meters.
    pub altitude: f64,
}

/// Input and step budget for one `update()` call.
pub struct FrameInput {
    /// Input snapshot taken at the start of the update.
    pub input: InputState,
    /// Number of fixed steps to run.
    pub steps: u32,
    /// Fixed step size in seconds.
    pub step: f64,
}

/// The `initialize`/`update`/`dispose` contract the scene binding drives.
pub trait CameraController {
    /// Attach to the host and capture its current camera pose.
    fn initialize(&mut self, host: &mut HostContext<'_>);

    /// Advance the simulation by a frame delta in seconds and push the pose to the host.
    fn update(&mut self, host: &mut HostContext<'_>, frame_delta: f64);

    /// Detach from the host, restoring its default navigation.
    fn dispose(&mut self, host: &mut HostContext<'_>);

    /// Move the camera programmatically, discarding accumulated motion.
    fn teleport(&mut self, host: &mut HostContext<'_>, position: DVec3);

    /// Shared lifecycle state.
    fn core(&self) -> &ControllerCore;

    /// Shared lifecycle state, mutably.
    fn core_mut(&mut self) -> &mut ControllerCore;

    /// Current diagnostics.
    fn telemetry(&self) -> ControllerTelemetry;

    /// Whether the controller is driving the camera.
    fn is_enabled(&self) -> bool {
        self.core().is_enabled()
    }

    /// Current camera state.
    fn camera_state(&self) -> &CameraState {
        self.core().camera_state()
    }

    /// Ask the host to capture the pointer for mouse look.
    fn request_pointer_lock(&mut self, input: &mut dyn InputSource) {
        self.core_mut().request_pointer_lock(input);
    }

    /// Ask the host to release the pointer.
    fn exit_pointer_lock(&mut self, input: &mut dyn InputSource) {
        self.core_mut().exit_pointer_lock(input);
    }
}

/// Lifecycle, state and integration plumbing shared by all controllers.
pub struct ControllerCore {
    name: &'static str,
    config: ControllerConfig,
    phase: ControllerPhase,
    camera: CameraState,
    last_good_camera: CameraState,
    physics: PhysicsState,
    input: SharedInputState,
    listener: Option<ListenerId>,
    stepper: FixedStepper,
    clock: f64,
    render_nudges: Vec<f64>,
}

impl ControllerCore {
    /// Create a disabled core. `config` must already be validated.
    pub fn new(name: &'static str, config: ControllerConfig) -> Self {
        let stepper = FixedStepper::from_config(&config);
        Self {
            name,
            config,
            phase: ControllerPhase::Disabled,
            camera: CameraState::default(),
            last_good_camera: CameraState::default(),
            physics: PhysicsState::default(),
            input: Rc::default(),
            listener: None,
            stepper,
            clock: 0.0,
            render_nudges: Vec::new(),
        }
    }

    /// Controller name used in logs.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The resolved configuration.
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> ControllerPhase {
        self.phase
    }

    /// Whether the controller is enabled.
    pub fn is_enabled(&self) -> bool {
        self.phase == ControllerPhase::Enabled
    }

    /// Current camera state.
    pub fn camera_state(&self) -> &CameraState {
        &self.camera
    }

    /// Mutable camera state for the owning controller's step.
    pub fn camera_state_mut(&mut self) -> &mut CameraState {
        &mut self.camera
    }

    /// Current physics state.
    pub fn physics_state(&self) -> &PhysicsState {
        &self.physics
    }

    /// Mutable physics state for the owning controller's step.
    pub fn physics_state_mut(&mut self) -> &mut PhysicsState {
        &mut self.physics
    }

    /// Live input state.
    pub fn input_state(&self) -> Ref<'_, InputState> {
        self.input.borrow()
    }

    /// Whether the pointer is currently locked.
    pub fn is_pointer_locked(&self) -> bool {
        self.input.borrow().is_pointer_locked()
    }

    /// Whether an input listener is currently registered.
    pub fn has_listener(&self) -> bool {
        self.listener.is_some()
    }

    /// Seconds of frame time seen since initialize.
    pub fn clock(&self) -> f64 {
        self.clock
    }

    /// Height of the camera above the ellipsoid.
    pub fn altitude(&self) -> f64 {
        ecef_to_geodetic(self.camera.position).height
    }

    /// Attach to the host. Returns `true` if the controller became enabled.
    ///
    /// The caller finishes setting up its own state and then calls
    /// [`ControllerCore::commit_pose`].
    pub fn initialize(&mut self, host: &mut HostContext<'_>) -> bool {
        match self.phase {
            ControllerPhase::Enabled => {
                tracing::debug!("{} controller already initialized", self.name);
                return false;
            }
            ControllerPhase::Disposed => {
                tracing::warn!("{} controller was disposed; create a new one", self.name);
                return false;
            }
            ControllerPhase::Disabled => {}
        }

        let Some(pose) = host.scene.current_pose() else {
            tracing::debug!("{} controller: host camera not ready", self.name);
            return false;
        };

        *self.input.borrow_mut() = InputState::default();
        match host.input.register(self.input.clone()) {
            Ok(id) => self.listener = Some(id),
            Err(err) => {
                tracing::warn!("{} controller: failed to register input: {err}", self.name);
                return false;
            }
        }

        host.scene.set_default_navigation_enabled(false);

        self.camera = CameraState::from_pose(&pose);
        self.last_good_camera = self.camera;
        self.physics = PhysicsState::default();
        self.stepper.reset();
        self.clock = 0.0;
        self.render_nudges.clear();
        self.phase = ControllerPhase::Enabled;

        tracing::info!("{} controller initialized", self.name);
        true
    }

    /// Start an update: consume frame time and snapshot input.
    ///
    /// Returns `None` when the controller is not enabled.
    pub fn begin_update(&mut self, frame_delta: f64) -> Option<FrameInput> {
        if !self.is_enabled() {
            return None;
        }

        if frame_delta.is_finite() && frame_delta > 0.0 {
            self.clock += frame_delta.min(self.config.max_frame_delta);
        }
        let steps = self.stepper.consume(frame_delta);
        let input = self.input.borrow_mut().take_snapshot();

        Some(FrameInput {
            input,
            steps,
            step: self.stepper.step(),
        })
    }

    /// Finish an update: push the pose to the host and flush due render requests.
    pub fn finish_update(&mut self, scene: &mut dyn SceneCameraSink) {
        if self.camera.is_finite() {
            self.last_good_camera = self.camera;
        } else {
            tracing::warn!(
                "{} controller produced a non-finite camera state; keeping the last good one",
                self.name
            );
            self.camera = self.last_good_camera;
        }

        self.apply_camera_state(scene);

        let clock = self.clock;
        let before = self.render_nudges.len();
        self.render_nudges.retain(|deadline| *deadline > clock);
        for _ in self.render_nudges.len()..before {
            scene.request_render();
        }

        if self.config.debug {
            tracing::debug!(
                controller = self.name,
                position = ?self.camera.position,
                yaw = self.camera.yaw,
                pitch = self.camera.pitch,
                grounded = self.physics.is_grounded,
                "camera state"
            );
        }
    }

    /// Push the camera pose to the host camera.
    pub fn apply_camera_state(&self, scene: &mut dyn SceneCameraSink) {
        scene.apply_camera_pose(&self.camera.pose());
    }

    /// Apply a programmatic pose change: push it, render now, and re-render shortly after.
    pub fn commit_pose(&mut self, scene: &mut dyn SceneCameraSink) {
        self.last_good_camera = self.camera;
        self.apply_camera_state(scene);
        scene.request_render();
        self.render_nudges
            .extend(RENDER_NUDGE_DELAYS.iter().map(|delay| self.clock + delay));
    }

    /// Forget accumulated frame time (after a teleport).
    pub fn reset_integrator(&mut self) {
        self.stepper.reset();
    }

    /// Ask the host to capture the pointer. Best effort.
    pub fn request_pointer_lock(&mut self, input: &mut dyn InputSource) {
        if !self.is_enabled() {
            return;
        }
        if let Err(err) = input.request_pointer_lock() {
            tracing::warn!("{} controller: pointer lock request failed: {err}", self.name);
        }
    }

    /// Ask the host to release the pointer. Best effort.
    pub fn exit_pointer_lock(&mut self, input: &mut dyn InputSource) {
        if let Err(err) = input.exit_pointer_lock() {
            tracing::warn!("{} controller: pointer lock release failed: {err}", self.name);
        }
    }

    /// Detach from the host.
    ///
    /// Every teardown step runs even if an earlier one fails.
    pub fn dispose(&mut self, host: &mut HostContext<'_>) {
        if self.phase == ControllerPhase::Disposed {
            return;
        }

        if let Some(id) = self.listener.take() {
            if let Err(err) = host.input.unregister(id) {
                tracing::warn!("{} controller: failed to unregister input: {err}", self.name);
            }
        }
        if self.is_pointer_locked() {
            self.exit_pointer_lock(host.input);
        }

        host.scene.set_default_navigation_enabled(true);

        *self.input.borrow_mut() = InputState::default();
        self.render_nudges.clear();
        self.phase = ControllerPhase::Disposed;
        tracing::info!("{} controller disposed", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::{Error, Result},
        sim::{FlatTerrain, HeadlessHost, HeadlessScene},
    };

    /// Input source whose teardown calls always fail.
    #[derive(Default)]
    struct BrokenInput {
        registered: usize,
    }

    impl InputSource for BrokenInput {
        fn register(&mut self, _listener: SharedInputState) -> Result<ListenerId> {
            self.registered += 1;
            crate::input::InputHub::new().register(Rc::default())
        }

        fn unregister(&mut self, _id: ListenerId) -> Result<()> {
            Err(Error::InputSource {
                operation: "unregister",
                message: "target already gone".to_owned(),
            })
        }

        fn request_pointer_lock(&mut self) -> Result<()> {
            Ok(())
        }

        fn exit_pointer_lock(&mut self) -> Result<()> {
            Err(Error::InputSource {
                operation: "exit_pointer_lock",
                message: "not locked".to_owned(),
            })
        }
    }

    fn core() -> ControllerCore {
        ControllerCore::new("test", ControllerConfig::flight_defaults())
    }

    fn host() -> HeadlessHost {
        HeadlessHost::at_degrees(-3.7, 40.4, 700.0, 0.0, FlatTerrain::new(650.0))
    }

    #[test]
    fn test_initialize_without_camera_stays_disabled() {
        let mut host = HeadlessHost::new(HeadlessScene::unavailable(), FlatTerrain::new(0.0));
        let mut core = core();

        assert!(!core.initialize(&mut host.context()));
        assert_eq!(core.phase(), ControllerPhase::Disabled);
        assert!(!core.has_listener());
        assert_eq!(host.input.listener_count(), 0);
        assert!(host.scene.navigation_enabled());
    }

    #[test]
    fn test_initialize_is_not_repeated() {
        let mut host = host();
        let mut core = core();

        assert!(core.initialize(&mut host.context()));
        assert!(!core.initialize(&mut host.context()));
        assert_eq!(host.input.listener_count(), 1);
        assert!(!host.scene.navigation_enabled());
    }

    #[test]
    fn test_dispose_unregisters_and_restores_navigation() {
        let mut host = host();
        let mut core = core();
        core.initialize(&mut host.context());

        core.dispose(&mut host.context());
        assert_eq!(core.phase(), ControllerPhase::Disposed);
        assert_eq!(host.input.listener_count(), 0);
        assert!(host.scene.navigation_enabled());

        // Disposed controllers cannot be revived.
        assert!(!core.initialize(&mut host.context()));
        assert_eq!(host.input.listener_count(), 0);
    }

    #[test]
    fn test_dispose_is_best_effort() {
        let mut scene = HeadlessScene::new(crate::sim::level_pose(
            crate::geo::geodetic_to_ecef(crate::geo::Geodetic::from_degrees(0.0, 0.0, 0.0)),
            0.0,
        ));
        let terrain = FlatTerrain::new(0.0);
        let mut input = BrokenInput::default();
        let mut core = core();

        core.initialize(&mut HostContext::new(&mut scene, &terrain, &mut input));
        assert_eq!(input.registered, 1);
        core.input
            .borrow_mut()
            .apply(crate::input::InputEvent::PointerLockChanged(true));

        core.dispose(&mut HostContext::new(&mut scene, &terrain, &mut input));
        assert!(scene.navigation_enabled());
        assert!(!core.has_listener());
        assert_eq!(core.phase(), ControllerPhase::Disposed);
    }

    #[test]
    fn test_dispose_before_initialize() {
        let mut host = host();
        host.scene.set_default_navigation_enabled(false);
        let mut core = core();

        core.dispose(&mut host.context());
        assert!(host.scene.navigation_enabled());
        assert_eq!(core.phase(), ControllerPhase::Disposed);
        assert!(core.begin_update(0.1).is_none());
    }

    #[test]
    fn test_commit_pose_schedules_delayed_renders() {
        let mut host = host();
        let mut core = core();
        core.initialize(&mut host.context());
        core.commit_pose(&mut host.scene);
        assert_eq!(host.scene.render_requests(), 1);

        core.begin_update(0.02).unwrap();
        core.finish_update(&mut host.scene);
        assert_eq!(host.scene.render_requests(), 1);

        core.begin_update(0.02).unwrap();
        core.finish_update(&mut host.scene);
        assert_eq!(host.scene.render_requests(), 2);

        core.begin_update(0.06).unwrap();
        core.finish_update(&mut host.scene);
        assert_eq!(host.scene.render_requests(), 3);

        core.begin_update(1.0).unwrap();
        core.finish_update(&mut host.scene);
        assert_eq!(host.scene.render_requests(), 3);
    }

    #[test]
    fn test_non_finite_state_never_reaches_host() {
        let mut host = host();
        let mut core = core();
        core.initialize(&mut host.context());
        core.commit_pose(&mut host.scene);
        let good = *host.scene.pose().unwrap();

        core.camera_state_mut().position = DVec3::NAN;
        core.begin_update(1.0 / 60.0).unwrap();
        core.finish_update(&mut host.scene);

        assert_eq!(*host.scene.pose().unwrap(), good);
        assert!(core.camera_state().is_finite());
    }

    #[test]
    fn test_begin_update_snapshots_input() {
        let mut host = host();
        let mut core = core();
        core.initialize(&mut host.context());

        host.input.dispatch(crate::input::InputEvent::PointerLockChanged(true));
        host.input
            .dispatch(crate::input::InputEvent::MouseMove { dx: 4.0, dy: -2.0 });
        let frame = core.begin_update(0.05).unwrap();

        assert_eq!(frame.steps, 3);
        assert_eq!(frame.input.mouse_delta(), glam::DVec2::new(4.0, -2.0));
        assert_eq!(core.input_state().mouse_delta(), glam::DVec2::ZERO);
        assert!(core.is_pointer_locked());
    }
}
