//! Tests of fixed lane goals driven through the control plane.

use platoon_ctl::mock::MockEngine;
use platoon_ctl::{ControlPlane, Error, LaneChangeModes};

fn setup() -> (ControlPlane, MockEngine) {
    let mut engine = MockEngine::new("SUMO 1.1.0").unwrap();
    engine.add_vehicle("v.0", 0.0, 0, 30.0);
    engine.add_vehicle("v.1", 20.0, 1, 30.0);
    let control = ControlPlane::connect(&mut engine).unwrap();
    (control, engine)
}

fn modes(control: &ControlPlane) -> LaneChangeModes {
    control.binding().lane_change_modes()
}

/// Runs one simulation tick: scheduler first, then the engine.
fn tick(control: &mut ControlPlane, engine: &mut MockEngine, step: u64) {
    let report = control.step(engine, step);
    assert!(report.failed.is_empty(), "{:?}", report.failed);
    engine.step(0.01);
}

/// Test that a safe lane change moves one lane at a time, waiting a step after each command.
#[test]
fn safe_change_moves_one_lane_per_command() {
    let (mut control, mut engine) = setup();
    control.set_fixed_lane("v.0", 2, true);

    let report = control.step(&mut engine, 0);
    assert_eq!(report.issued, vec![("v.0".to_string(), 1)]);
    assert!(control.lane_changes().pending("v.0").unwrap().is_waiting());
    engine.step(0.01);

    // Cool-down step: nothing is commanded even though the goal is not reached
    let report = control.step(&mut engine, 1);
    assert!(report.issued.is_empty());
    assert!(!control.lane_changes().pending("v.0").unwrap().is_waiting());
    engine.step(0.01);

    tick(&mut control, &mut engine, 2);
    tick(&mut control, &mut engine, 3);
    let report = control.step(&mut engine, 4);
    assert_eq!(report.completed, vec!["v.0".to_string()]);

    let vehicle = engine.vehicle("v.0").unwrap();
    assert_eq!(vehicle.lane, 2);
    assert_eq!(vehicle.lane_commands, vec![1, 2]);
    assert_eq!(vehicle.lane_change_mode, Some(modes(&control).fixed_safe));
    assert!(!control.lane_changes().is_pending("v.0"));
}

/// Test that repeating a pending safe goal does not cut its cool-down short.
#[test]
fn repeated_goal_keeps_cool_down() {
    let (mut control, mut engine) = setup();
    control.set_fixed_lane("v.0", 2, true);
    tick(&mut control, &mut engine, 0);

    control.set_fixed_lane("v.0", 2, true);
    assert!(control.lane_changes().pending("v.0").unwrap().is_waiting());
    let report = control.step(&mut engine, 1);
    assert!(report.issued.is_empty());
    assert_eq!(engine.vehicle("v.0").unwrap().lane_commands, vec![1]);

    // A different goal replaces the pending one outright
    tick(&mut control, &mut engine, 2);
    control.set_fixed_lane("v.0", 0, true);
    assert!(!control.lane_changes().pending("v.0").unwrap().is_waiting());
}

/// Test that an unsafe lane change is commanded on every step, hazards or not.
#[test]
fn unsafe_change_ignores_hazards() {
    let (mut control, mut engine) = setup();
    engine.vehicle_mut("v.0").unwrap().overlapping = true;
    control.set_fixed_lane("v.0", 2, false);

    for step in 0..3 {
        tick(&mut control, &mut engine, step);
    }

    let vehicle = engine.vehicle("v.0").unwrap();
    assert_eq!(vehicle.lane, 2);
    assert_eq!(vehicle.lane_commands, vec![1, 2]);
    assert_eq!(vehicle.lane_change_mode, Some(modes(&control).fixed_aggressive));
    assert!(control.lane_changes().is_empty());
}

/// Test that a lane change moves downwards as well.
#[test]
fn change_towards_lower_lanes() {
    let (mut control, mut engine) = setup();
    control.set_fixed_lane("v.1", 0, false);
    tick(&mut control, &mut engine, 0);
    tick(&mut control, &mut engine, 1);
    assert_eq!(engine.vehicle("v.1").unwrap().lane_commands, vec![0]);
    assert!(!control.lane_changes().is_pending("v.1"));
}

/// Test that a blocked safe change is retried on later steps.
#[test]
fn blocked_safe_change_is_retried() {
    let (mut control, mut engine) = setup();
    engine.vehicle_mut("v.0").unwrap().overlapping = true;
    control.set_fixed_lane("v.0", 1, true);

    for step in 0..5 {
        tick(&mut control, &mut engine, step);
    }
    assert!(engine.vehicle("v.0").unwrap().lane_commands.is_empty());
    assert!(control.lane_changes().is_pending("v.0"));

    engine.vehicle_mut("v.0").unwrap().overlapping = false;
    tick(&mut control, &mut engine, 5);
    assert_eq!(engine.vehicle("v.0").unwrap().lane_commands, vec![1]);
}

/// Test that asking for the current lane completes at once without a command.
#[test]
fn goal_already_reached() {
    let (mut control, mut engine) = setup();
    control.set_fixed_lane("v.1", 1, true);

    let report = control.step(&mut engine, 0);
    assert_eq!(report.completed, vec!["v.1".to_string()]);
    assert!(report.issued.is_empty());
    assert!(engine.vehicle("v.1").unwrap().lane_commands.is_empty());
    assert!(!control.lane_changes().is_pending("v.1"));
}

/// Test that a new request replaces the previous goal.
#[test]
fn later_request_wins() {
    let (mut control, mut engine) = setup();
    control.set_fixed_lane("v.0", 2, true);
    control.set_fixed_lane("v.0", 0, false);
    assert_eq!(control.lane_changes().len(), 1);
    assert!(!control.lane_changes().pending("v.0").unwrap().safe);

    tick(&mut control, &mut engine, 0);
    assert!(control.lane_changes().is_empty());
    assert!(engine.vehicle("v.0").unwrap().lane_commands.is_empty());
}

/// Test that disabling a fixed lane drops the goal and restores the default mode.
#[test]
fn disable_restores_default_mode() {
    let (mut control, mut engine) = setup();
    control.set_fixed_lane("v.0", 2, true);
    tick(&mut control, &mut engine, 0);

    control.disable_fixed_lane(&mut engine, "v.0").unwrap();
    assert!(!control.lane_changes().is_pending("v.0"));
    assert_eq!(
        engine.vehicle("v.0").unwrap().lane_change_mode,
        Some(modes(&control).default)
    );

    for step in 1..4 {
        tick(&mut control, &mut engine, step);
    }
    assert_eq!(engine.vehicle("v.0").unwrap().lane_commands, vec![1]);
}

/// Test that a vehicle leaving the simulation does not affect the others.
#[test]
fn failures_are_isolated() {
    let (mut control, mut engine) = setup();
    control.set_fixed_lane("v.0", 1, false);
    control.set_fixed_lane("v.1", 2, false);
    engine.remove_vehicle("v.0");

    let report = control.step(&mut engine, 0);
    assert_eq!(
        report.failed,
        vec![("v.0".to_string(), Error::UnknownVehicle("v.0".into()))]
    );
    assert_eq!(report.issued, vec![("v.1".to_string(), 2)]);
    assert!(!control.lane_changes().is_pending("v.0"));
    assert!(control.lane_changes().is_pending("v.1"));
}

/// Test that an engine refusing the command keeps the goal for a later step.
#[test]
fn refused_command_is_retried() {
    let (mut control, mut engine) = setup();
    engine.vehicle_mut("v.0").unwrap().lanes = 1;
    control.set_fixed_lane("v.0", 1, false);

    let report = control.step(&mut engine, 0);
    assert!(matches!(report.failed[0].1, Error::InvalidParameter(_)));
    assert!(control.lane_changes().is_pending("v.0"));

    engine.vehicle_mut("v.0").unwrap().lanes = 2;
    let report = control.step(&mut engine, 1);
    assert_eq!(report.issued, vec![("v.0".to_string(), 1)]);
}

/// Test that the legacy dialect uses its own lane change modes.
#[test]
fn modes_follow_the_binding() {
    let mut engine = MockEngine::new("SUMO d1422e4780a").unwrap();
    engine.add_vehicle("v.0", 0.0, 0, 30.0);
    let mut control = ControlPlane::connect(&mut engine).unwrap();
    assert_eq!(control.binding().name(), "legacy");

    control.set_fixed_lane("v.0", 0, true);
    control.step(&mut engine, 0);
    control.disable_fixed_lane(&mut engine, "v.0").unwrap();
    assert_eq!(
        engine.vehicle("v.0").unwrap().lane_change_mode,
        Some(0b10_1010_1010)
    );
}
