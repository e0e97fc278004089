//! Lifecycle behavior through the public API.

use globecam::{
    CameraController, CameraMode, CarDriveController, CarTuning, ConfigOverrides, ControllerPhase,
    FlightController, InputEvent, KeyCode, ModeSelector,
    geo::{Geodetic, ecef_to_geodetic, geodetic_to_ecef},
    sim::{FlatTerrain, HeadlessHost, HeadlessScene, LoadingTerrain, NoisyTerrain, level_pose},
};

const DT: f64 = 1.0 / 60.0;

fn host() -> HeadlessHost {
    HeadlessHost::at_degrees(-74.0, 40.7, 200.0, 0.0, FlatTerrain::new(10.0))
}

#[test]
fn test_no_listener_leak_across_many_switches() {
    let mut host = host();
    let mut selector = ModeSelector::new(
        ConfigOverrides::default(),
        ConfigOverrides::default(),
        CarTuning::default(),
    );

    for i in 0..50 {
        let mode = if i % 3 == 0 {
            CameraMode::Drive
        } else {
            CameraMode::Flycam
        };
        selector.switch_to(mode, &mut host.context()).unwrap();
        selector.update(&mut host.context(), DT);
        assert_eq!(host.input.listener_count(), 1);
    }

    selector.shutdown(&mut host.context());
    assert_eq!(host.input.listener_count(), 0);
    assert!(host.scene.navigation_enabled());
}

#[test]
fn test_disposed_controller_ignores_input() {
    let mut host = host();
    let mut flight = FlightController::new(&ConfigOverrides::default()).unwrap();
    flight.initialize(&mut host.context());
    flight.dispose(&mut host.context());

    let applied = host.scene.applied_poses();
    host.press(KeyCode::KeyW);
    flight.update(&mut host.context(), DT);

    assert_eq!(flight.core().phase(), ControllerPhase::Disposed);
    assert_eq!(host.scene.applied_poses(), applied);
    assert!(!flight.core().input_state().pressed(KeyCode::KeyW));
}

#[test]
fn test_initialize_succeeds_once_host_is_ready() {
    let mut host = HeadlessHost::new(HeadlessScene::unavailable(), FlatTerrain::new(0.0));
    let mut car = CarDriveController::new(&ConfigOverrides::default(), CarTuning::default()).unwrap();

    car.initialize(&mut host.context());
    assert!(!car.is_enabled());

    let position = geodetic_to_ecef(Geodetic::from_degrees(12.5, 41.9, 60.0));
    host.scene.set_pose(Some(level_pose(position, 0.0)));
    car.initialize(&mut host.context());
    assert!(car.is_enabled());
    assert_eq!(host.input.listener_count(), 1);
}

#[test]
fn test_focus_loss_releases_held_keys() {
    let mut host = host();
    let mut car = CarDriveController::new(&ConfigOverrides::default(), CarTuning::default()).unwrap();
    car.initialize(&mut host.context());

    host.press(KeyCode::KeyW);
    for _ in 0..60 {
        car.update(&mut host.context(), DT);
    }
    let speed = car.speed();
    assert!(speed > 0.0);

    host.input.dispatch(InputEvent::FocusLost);
    for _ in 0..60 {
        car.update(&mut host.context(), DT);
    }
    assert!(car.speed() < speed);
}

#[test]
fn test_drive_starts_before_terrain_loads() {
    let mut host = HeadlessHost::at_degrees(
        -74.0,
        40.7,
        200.0,
        0.0,
        LoadingTerrain::new(FlatTerrain::new(10.0), 30),
    );
    let mut car = CarDriveController::new(&ConfigOverrides::default(), CarTuning::default()).unwrap();
    car.initialize(&mut host.context());

    // Still at the captured altitude while tiles load.
    let height = ecef_to_geodetic(car.camera_state().position).height;
    assert!((height - 200.0).abs() < 1e-6);

    for _ in 0..60 {
        car.update(&mut host.context(), DT);
        assert!(car.camera_state().is_finite());
    }
    let height = ecef_to_geodetic(car.camera_state().position).height;
    assert!((height - 11.6).abs() < 1e-6);
}

#[test]
fn test_noisy_terrain_does_not_bob_camera() {
    let mut host = HeadlessHost::at_degrees(
        -74.0,
        40.7,
        50.0,
        0.0,
        NoisyTerrain::new(10.0, 0.05, 42),
    );
    let mut car = CarDriveController::new(&ConfigOverrides::default(), CarTuning::default()).unwrap();
    car.initialize(&mut host.context());
    for _ in 0..10 {
        car.update(&mut host.context(), DT);
    }

    let held = car.ground_state().last_target_height;
    assert!(held.is_some());
    for _ in 0..600 {
        car.update(&mut host.context(), DT);
        assert_eq!(car.ground_state().last_target_height, held);
    }
}

#[test]
fn test_huge_frame_delta_is_bounded() {
    let mut host = host();
    let mut flight = FlightController::new(&ConfigOverrides::default()).unwrap();
    flight.initialize(&mut host.context());
    host.press(KeyCode::KeyW);

    let start = flight.camera_state().position;
    flight.update(&mut host.context(), 30.0);

    // At most max_frame_delta of motion at the speed cap.
    let config = flight.core().config();
    let travelled = (flight.camera_state().position - start).length();
    assert!(travelled <= config.max_speed * config.max_frame_delta + 1e-6);
}
