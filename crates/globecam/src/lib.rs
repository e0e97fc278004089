//! Fixed-step camera controllers for a globe-scale scene.
//!
//! This crate turns keyboard, mouse and pointer-lock input into camera motion
//! over the WGS84 ellipsoid. It does not render anything: the host engine is
//! reached only through the narrow traits in [`host`], borrowed per call.
//!
//! # Design principles
//!
//! - **Deterministic**: physics runs in fixed steps, so a trajectory does not
//!   depend on how frame time was split across `update()` calls
//! - **Local frames**: planar input is mapped through the East/North/Up frame
//!   at the camera's current position
//! - **Last known good**: missing terrain and numerical blowups fall back to
//!   the previous state instead of surfacing errors mid-frame
//!
//! # Example
//!
//! ```ignore
//! use globecam::{CameraMode, CarTuning, ConfigOverrides, HostContext, ModeSelector};
//!
//! let mut selector = ModeSelector::new(
//!     ConfigOverrides::default(),
//!     ConfigOverrides::default(),
//!     CarTuning::default(),
//! );
//! let mut host = HostContext::new(&mut scene, &terrain, &mut input);
//! selector.switch_to(CameraMode::Drive, &mut host)?;
//!
//! // Every frame:
//! selector.update(&mut host, frame_delta);
//! ```

pub mod camera;
pub mod config;
pub mod constants;
pub mod controller;
pub mod drive;
mod error;
pub mod flight;
pub mod geo;
pub mod ground;
pub mod host;
pub mod input;
pub mod integrator;
pub mod mode;
pub mod sim;
pub mod telemetry;

pub use camera::{CameraState, PhysicsState};
pub use config::{CarTuning, ConfigOverrides, ControllerConfig};
pub use controller::{CameraController, ControllerCore, ControllerPhase, ControllerTelemetry};
pub use drive::{CarDriveController, CarState};
pub use error::{Error, Result};
pub use flight::FlightController;
pub use geo::{EnuFrame, Geodetic};
pub use ground::{GroundResolver, GroundState};
pub use host::{CameraPose, HostContext, SceneCameraSink, TerrainOracle};
pub use input::{InputEvent, InputHub, InputSource, InputState, KeyCode, ListenerId};
pub use mode::{ActiveController, CameraMode, ModeSelector};
