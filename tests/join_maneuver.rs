//! Tests of the join maneuver, driven through the mock engine.

use assert_approx_eq::assert_approx_eq;
use platoon_ctl::mock::MockEngine;
use platoon_ctl::params::*;
use platoon_ctl::{
    ControlPlane, Controller, JoinConfig, JoinState, Maneuvers, PathCaccParams, Relay, Topology,
    TopologyEntry,
};

/// A four vehicle platoon on lane 0 and a joiner 50 m behind its future front vehicle.
fn setup() -> (ControlPlane, MockEngine, Topology, JoinConfig) {
    let mut engine = MockEngine::new("SUMO 1.1.0").unwrap();
    for (i, x) in [163.0, 154.0, 145.0, 136.0].into_iter().enumerate() {
        engine.add_vehicle(&format!("v.{}", i), x, 0, 30.0);
    }
    engine.add_vehicle("j", 100.0, 0, 30.0);
    let control = ControlPlane::connect(&mut engine).unwrap();
    let topology = Topology::platoon(&["v.0", "v.1", "v.2", "v.3"]);
    let config = JoinConfig {
        leader: "v.0".into(),
        front: "v.1".into(),
        behind: "v.2".into(),
        joiner: "j".into(),
        ..Default::default()
    };
    (control, engine, topology, config)
}

fn spacing(engine: &MockEngine, vid: &str) -> f64 {
    engine.parameter(vid, PAR_CACC_SPACING).unwrap()[0].as_f64().unwrap()
}

fn controller(engine: &MockEngine, vid: &str) -> Option<Controller> {
    engine.vehicle(vid).unwrap().controller()
}

fn leader_of<'a>(topology: &'a Topology, vid: &str) -> Option<&'a str> {
    topology.get(vid).unwrap().leader.as_deref()
}

/// Test that starting a join prepares the joiner and attaches it to the platoon.
#[test]
fn start_prepares_the_joiner() {
    let (control, mut engine, mut topology, config) = setup();
    let mut maneuvers = Maneuvers::new();
    let id = maneuvers
        .start_join(config.clone(), &control, &mut engine, &mut topology)
        .unwrap();

    assert_eq!(maneuvers.state(id), Some(JoinState::GoingToPosition));
    assert_eq!(controller(&engine, "j"), Some(Controller::FakedCacc));
    assert_approx_eq!(spacing(&engine, "j"), 10.0);
    let desired = engine.parameter("j", PAR_CC_DESIRED_SPEED).unwrap()[0].as_f64().unwrap();
    assert_approx_eq!(desired, config.cruise_speed + config.approach_boost);
    assert_eq!(topology.get("j"), Some(&TopologyEntry::new("v.0", "v.1")));
}

/// Test that the gap opens on the first tick the joiner is closer than the threshold.
#[test]
fn approach_and_open_gap() {
    let (mut control, mut engine, mut topology, config) = setup();
    let mut maneuvers = Maneuvers::new();
    let id = maneuvers
        .start_join(config, &control, &mut engine, &mut topology)
        .unwrap();

    // The joiner closes in at 15 m/s, sampled every 0.1 s
    for tick in 0..=26 {
        let x = 100.0 + 1.5 * tick as f64;
        engine.vehicle_mut("j").unwrap().set_position(x, 0.0);
        assert!(maneuvers.advance(&mut control, &mut engine, &mut topology).is_empty());
        assert_eq!(maneuvers.state(id), Some(JoinState::GoingToPosition), "tick {}", tick);
    }
    // At tick 26 the distance is exactly 11 m; at tick 27 it drops below
    engine.vehicle_mut("j").unwrap().set_position(140.5, 0.0);
    maneuvers.advance(&mut control, &mut engine, &mut topology);
    assert_eq!(maneuvers.state(id), Some(JoinState::OpeningGap));

    assert_eq!(controller(&engine, "v.2"), Some(Controller::FakedCacc));
    assert_approx_eq!(spacing(&engine, "v.2"), 10.0);
    assert_eq!(topology.get("v.2"), Some(&TopologyEntry::new("v.0", "j")));
    assert_eq!(leader_of(&topology, "v.3"), Some("v.2"));
    assert_eq!(topology.get("v.3").unwrap().front.as_deref(), Some("v.2"));
    assert_eq!(leader_of(&topology, "v.1"), Some("v.0"));
}

/// Test that the join completes once the gap is wide enough, restoring the platoon.
#[test]
fn gap_opens_and_join_completes() {
    let (mut control, mut engine, mut topology, config) = setup();
    let mut maneuvers = Maneuvers::new();
    let id = maneuvers
        .start_join(config, &control, &mut engine, &mut topology)
        .unwrap();
    engine.vehicle_mut("j").unwrap().set_position(145.0, 0.0);
    maneuvers.advance(&mut control, &mut engine, &mut topology);
    assert_eq!(maneuvers.state(id), Some(JoinState::OpeningGap));

    // 20 m is not enough, 23 m is
    engine.vehicle_mut("v.2").unwrap().set_position(130.0, 0.0);
    maneuvers.advance(&mut control, &mut engine, &mut topology);
    assert_eq!(maneuvers.state(id), Some(JoinState::OpeningGap));
    engine.vehicle_mut("v.2").unwrap().set_position(127.0, 0.0);
    maneuvers.advance(&mut control, &mut engine, &mut topology);
    assert_eq!(maneuvers.state(id), Some(JoinState::Completed));

    for vid in ["j", "v.2"] {
        assert_eq!(controller(&engine, vid), Some(Controller::Cacc));
        assert_approx_eq!(spacing(&engine, vid), 5.0);
    }
    assert_eq!(leader_of(&topology, "v.3"), Some("v.0"));
    assert_eq!(topology.get("v.2").unwrap().front.as_deref(), Some("j"));
    assert_eq!(topology.get("j"), Some(&TopologyEntry::new("v.0", "v.1")));

    let request = control.lane_changes().pending("j").unwrap();
    assert_eq!(request.target_lane, 0);
    assert!(!request.safe);
}

/// Test that a maneuver never goes back to an earlier phase.
#[test]
fn phases_only_advance() {
    let (mut control, mut engine, mut topology, config) = setup();
    let mut maneuvers = Maneuvers::new();
    let id = maneuvers
        .start_join(config, &control, &mut engine, &mut topology)
        .unwrap();

    let mut seen = vec![];
    let positions = [(100.0, 145.0), (145.0, 145.0), (145.0, 120.0), (100.0, 145.0)];
    for (joiner, behind) in positions {
        engine.vehicle_mut("j").unwrap().set_position(joiner, 0.0);
        engine.vehicle_mut("v.2").unwrap().set_position(behind, 0.0);
        maneuvers.advance(&mut control, &mut engine, &mut topology);
        seen.push(maneuvers.state(id).unwrap());
    }
    assert_eq!(
        seen,
        vec![
            JoinState::GoingToPosition,
            JoinState::OpeningGap,
            JoinState::Completed,
            JoinState::Completed
        ]
    );
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
}

/// Test that a failing maneuver leaves topology alone and can be retried.
#[test]
fn failure_keeps_state_and_topology() {
    let (mut control, mut engine, mut topology, config) = setup();
    let mut maneuvers = Maneuvers::new();
    let id = maneuvers
        .start_join(config, &control, &mut engine, &mut topology)
        .unwrap();
    engine.vehicle_mut("j").unwrap().set_position(145.0, 0.0);
    let behind = engine.remove_vehicle("v.2").unwrap();

    let failed = maneuvers.advance(&mut control, &mut engine, &mut topology);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].0, id);
    assert_eq!(maneuvers.state(id), Some(JoinState::GoingToPosition));
    assert_eq!(topology.get("v.2"), Some(&TopologyEntry::new("v.0", "v.1")));
    assert_eq!(leader_of(&topology, "v.3"), Some("v.0"));

    let restored = engine.add_vehicle("v.2", behind.x, 0, behind.speed);
    restored.set_position(145.0, 0.0);
    assert!(maneuvers.advance(&mut control, &mut engine, &mut topology).is_empty());
    assert_eq!(maneuvers.state(id), Some(JoinState::OpeningGap));
}

/// Test that aborted and completed maneuvers can be dropped.
#[test]
fn abort_and_cleanup() {
    let (mut control, mut engine, mut topology, config) = setup();
    let mut maneuvers = Maneuvers::new();
    let first = maneuvers
        .start_join(config.clone(), &control, &mut engine, &mut topology)
        .unwrap();
    let second = maneuvers
        .start_join(config, &control, &mut engine, &mut topology)
        .unwrap();
    assert_eq!(maneuvers.len(), 2);

    assert!(maneuvers.abort(second).is_some());
    assert!(maneuvers.state(second).is_none());
    assert!(maneuvers.abort(second).is_none());

    engine.vehicle_mut("j").unwrap().set_position(145.0, 0.0);
    engine.vehicle_mut("v.2").unwrap().set_position(120.0, 0.0);
    maneuvers.advance(&mut control, &mut engine, &mut topology);
    maneuvers.advance(&mut control, &mut engine, &mut topology);
    assert_eq!(maneuvers.state(first), Some(JoinState::Completed));

    maneuvers.remove_completed();
    assert!(maneuvers.is_empty());
}

/// Test a whole join with relayed data and moving vehicles.
#[test]
fn join_completes_without_crashes() {
    let mut engine = MockEngine::new("SUMO 1.1.0").unwrap();
    let mut control = ControlPlane::connect(&mut engine).unwrap();
    let config = JoinConfig::default();
    let members = (0..8).map(|i| format!("v.{}", i)).collect::<Vec<_>>();
    for (i, vid) in members.iter().enumerate() {
        engine.add_vehicle(vid, 200.0 - 9.0 * i as f64, 0, config.cruise_speed);
        control.set_cc_desired_speed(&mut engine, vid, config.cruise_speed).unwrap();
        let controller = if i == 0 { Controller::Acc } else { Controller::Cacc };
        control.set_active_controller(&mut engine, vid, controller).unwrap();
        control
            .set_path_cacc_parameters(&mut engine, vid, &PathCaccParams::spacing(5.0))
            .unwrap();
    }
    engine.add_vehicle("v.8", 100.0, 1, config.cruise_speed);
    control.set_cc_desired_speed(&mut engine, "v.8", config.cruise_speed).unwrap();
    control.set_active_controller(&mut engine, "v.8", Controller::Acc).unwrap();

    let mut topology = Topology::platoon(&members);
    let relay = Relay::default();
    let mut maneuvers = Maneuvers::new();
    let mut join = None;
    let mut transitions = vec![];

    for step in 0..4000 {
        relay.step(&control, &mut engine, &topology, step);
        if step == 100 {
            let config = JoinConfig {
                leader: "v.0".into(),
                front: "v.3".into(),
                behind: "v.4".into(),
                joiner: "v.8".into(),
                ..config.clone()
            };
            let id = maneuvers
                .start_join(config, &control, &mut engine, &mut topology)
                .unwrap();
            join = Some(id);
        }
        assert!(maneuvers.advance(&mut control, &mut engine, &mut topology).is_empty());
        control.step(&mut engine, step);
        engine.step(0.01);

        let state = join.and_then(|id| maneuvers.state(id));
        if transitions.last() != Some(&state) {
            transitions.push(state);
        }
    }

    assert_eq!(
        transitions,
        vec![
            None,
            Some(JoinState::GoingToPosition),
            Some(JoinState::OpeningGap),
            Some(JoinState::Completed)
        ]
    );
    assert_eq!(engine.vehicle("v.8").unwrap().lane, 0);
    assert!(control.lane_changes().is_empty());
    for vid in members.iter().chain(["v.8".to_string()].iter()) {
        assert!(!control.get_crashed(&mut engine, vid).unwrap(), "{} crashed", vid);
    }

    let order = ["v.0", "v.1", "v.2", "v.3", "v.8", "v.4", "v.5", "v.6", "v.7"];
    for pair in order.windows(2) {
        let gap = control.get_distance(&mut engine, pair[0], pair[1], 4.0).unwrap();
        assert_approx_eq!(gap, 5.0, 0.1);
    }
}
