//! Camera mode selection.
//!
//! The [`ModeSelector`] owns at most one live controller. Switching modes
//! disposes the current controller before the next one is initialized, so
//! only one set of input listeners is ever registered.

use glam::DVec3;

use crate::{
    config::{CarTuning, ConfigOverrides},
    controller::{CameraController, ControllerCore, ControllerPhase, ControllerTelemetry},
    drive::CarDriveController,
    error::Result,
    flight::FlightController,
    host::HostContext,
    input::InputSource,
};

/// Camera mode enumeration.
#[derive(Default, PartialEq, Eq, Clone, Copy, Debug, clap::ValueEnum)]
pub enum CameraMode {
    /// Free-flight camera (default).
    #[default]
    Flycam,
    /// Terrain-locked car.
    Drive,
}

impl CameraMode {
    /// The other mode.
    pub fn toggled(self) -> Self {
        match self {
            Self::Flycam => Self::Drive,
            Self::Drive => Self::Flycam,
        }
    }
}

/// The live controller for the current mode.
pub enum ActiveController {
    Flight(FlightController),
    Drive(CarDriveController),
}

impl ActiveController {
    /// The mode this controller implements.
    pub fn mode(&self) -> CameraMode {
        match self {
            Self::Flight(_) => CameraMode::Flycam,
            Self::Drive(_) => CameraMode::Drive,
        }
    }

    fn controller(&self) -> &dyn CameraController {
        match self {
            Self::Flight(flight) => flight,
            Self::Drive(drive) => drive,
        }
    }

    fn controller_mut(&mut self) -> &mut dyn CameraController {
        match self {
            Self::Flight(flight) => flight,
            Self::Drive(drive) => drive,
        }
    }
}

impl CameraController for ActiveController {
    fn initialize(&mut self, host: &mut HostContext<'_>) {
        self.controller_mut().initialize(host);
    }

    fn update(&mut self, host: &mut HostContext<'_>, frame_delta: f64) {
        self.controller_mut().update(host, frame_delta);
    }

    fn dispose(&mut self, host: &mut HostContext<'_>) {
        self.controller_mut().dispose(host);
    }

    fn teleport(&mut self, host: &mut HostContext<'_>, position: DVec3) {
        self.controller_mut().teleport(host, position);
    }

    fn core(&self) -> &ControllerCore {
        self.controller().core()
    }

    fn core_mut(&mut self) -> &mut ControllerCore {
        self.controller_mut().core_mut()
    }

    fn telemetry(&self) -> ControllerTelemetry {
        self.controller().telemetry()
    }
}

/// Creates and destroys controllers as the camera mode changes.
pub struct ModeSelector {
    flight_overrides: ConfigOverrides,
    drive_overrides: ConfigOverrides,
    car_tuning: CarTuning,
    active: Option<ActiveController>,
}

impl ModeSelector {
    /// Create a selector with no active controller.
    pub fn new(
        flight_overrides: ConfigOverrides,
        drive_overrides: ConfigOverrides,
        car_tuning: CarTuning,
    ) -> Self {
        Self {
            flight_overrides,
            drive_overrides,
            car_tuning,
            active: None,
        }
    }

    /// The current mode, if a controller is active.
    pub fn mode(&self) -> Option<CameraMode> {
        self.active.as_ref().map(ActiveController::mode)
    }

    /// The active controller.
    pub fn active(&self) -> Option<&ActiveController> {
        self.active.as_ref()
    }

    /// The active controller, mutably.
    pub fn active_mut(&mut self) -> Option<&mut ActiveController> {
        self.active.as_mut()
    }

    /// Build a controller for `mode` from the stored configuration.
    fn build(&self, mode: CameraMode) -> Result<ActiveController> {
        Ok(match mode {
            CameraMode::Flycam => {
                ActiveController::Flight(FlightController::new(&self.flight_overrides)?)
            }
            CameraMode::Drive => ActiveController::Drive(CarDriveController::new(
                &self.drive_overrides,
                self.car_tuning.clone(),
            )?),
        })
    }

    /// Switch to `mode`, disposing the current controller first.
    ///
    /// Switching to the mode that is already active and enabled does nothing.
    /// If the new controller cannot be built, the selector is left without an
    /// active controller and the host's navigation restored.
    pub fn switch_to(&mut self, mode: CameraMode, host: &mut HostContext<'_>) -> Result<()> {
        if self
            .active
            .as_ref()
            .is_some_and(|active| active.mode() == mode && active.is_enabled())
        {
            return Ok(());
        }

        let from = self.mode();
        if let Some(mut previous) = self.active.take() {
            previous.dispose(host);
        }

        let mut next = self.build(mode)?;
        next.initialize(host);
        if !next.is_enabled() {
            tracing::debug!("{mode:?} controller waiting for the host camera");
        }
        self.active = Some(next);

        tracing::info!("Transitioned from {from:?} to {mode:?}");
        Ok(())
    }

    /// Switch to the other mode (flycam when nothing is active).
    pub fn toggle(&mut self, host: &mut HostContext<'_>) -> Result<CameraMode> {
        let mode = self.mode().map_or(CameraMode::Flycam, CameraMode::toggled);
        self.switch_to(mode, host)?;
        Ok(mode)
    }

    /// Advance the active controller. Retries initialization if the host wasn't ready.
    pub fn update(&mut self, host: &mut HostContext<'_>, frame_delta: f64) {
        let Some(active) = &mut self.active else {
            return;
        };
        if active.core().phase() == ControllerPhase::Disabled {
            active.initialize(host);
        }
        active.update(host, frame_delta);
    }

    /// Ask the host to capture the pointer for the active controller.
    pub fn request_pointer_lock(&mut self, input: &mut dyn InputSource) {
        if let Some(active) = &mut self.active {
            active.request_pointer_lock(input);
        }
    }

    /// Ask the host to release the pointer.
    pub fn exit_pointer_lock(&mut self, input: &mut dyn InputSource) {
        if let Some(active) = &mut self.active {
            active.exit_pointer_lock(input);
        }
    }

    /// Dispose the active controller, if any.
    pub fn shutdown(&mut self, host: &mut HostContext<'_>) {
        if let Some(mut active) = self.active.take() {
            active.dispose(host);
            tracing::info!("Camera controller shut down");
        }
    }
}
