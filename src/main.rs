use std::time::Instant;

use platoon_ctl::mock::MockEngine;
use platoon_ctl::{
    ControlPlane, Controller, JoinConfig, Maneuvers, PathCaccParams, Relay, RelayConfig, Topology,
};
use serde::Deserialize;

/// The settings of a demo run, optionally read from a JSON file.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct Scenario {
    /// Version banner the mock engine reports.
    engine: String,
    /// Number of platoon members, leader included.
    platoon_size: usize,
    /// Position of the member the joiner ends up behind.
    join_position: usize,
    /// Step at which the join starts.
    join_step: u64,
    /// Number of steps to simulate.
    steps: u64,
    /// Step length in s.
    step_length: f64,
    relay: RelayConfig,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            engine: "SUMO 1.1.0".into(),
            platoon_size: 8,
            join_position: 3,
            join_step: 100,
            steps: 4000,
            step_length: 0.01,
            relay: RelayConfig::default(),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let scenario = match std::env::args().nth(1) {
        Some(path) => serde_json::from_slice(&std::fs::read(path)?)?,
        None => Scenario::default(),
    };
    if scenario.join_position + 1 >= scenario.platoon_size {
        return Err("the joiner needs a member ahead of and behind it".into());
    }

    let defaults = JoinConfig::default();
    let members = (0..scenario.platoon_size)
        .map(|i| format!("v.{}", i))
        .collect::<Vec<_>>();
    let joiner = format!("v.{}", scenario.platoon_size);

    let mut engine = MockEngine::new(&scenario.engine)?;
    let mut control = ControlPlane::connect(&mut engine)?;
    let pitch = defaults.spacing + defaults.vehicle_length;
    for (i, vid) in members.iter().enumerate() {
        engine.add_vehicle(vid, 200.0 - pitch * i as f64, 0, defaults.cruise_speed);
        control.set_cc_desired_speed(&mut engine, vid, defaults.cruise_speed)?;
        let controller = if i == 0 { Controller::Acc } else { Controller::Cacc };
        control.set_active_controller(&mut engine, vid, controller)?;
        let params = PathCaccParams::spacing(defaults.spacing);
        control.set_path_cacc_parameters(&mut engine, vid, &params)?;
    }
    engine.add_vehicle(&joiner, 100.0, 1, defaults.cruise_speed);
    control.set_cc_desired_speed(&mut engine, &joiner, defaults.cruise_speed)?;
    control.set_active_controller(&mut engine, &joiner, Controller::Acc)?;

    let mut topology = Topology::platoon(&members);
    let relay = Relay::new(scenario.relay);
    let mut maneuvers = Maneuvers::new();
    let mut join = None;
    let mut state = None;

    println!(
        "Simulating {} vehicles on {} ({:?})...",
        scenario.platoon_size + 1,
        control.version(),
        scenario.engine
    );
    let start = Instant::now();
    for step in 0..scenario.steps {
        if let Some(report) = relay.step(&control, &mut engine, &topology, step) {
            for (vid, err) in report.failed {
                println!("step {}: relay to {} failed: {}", step, vid, err);
            }
        }
        if step == scenario.join_step {
            let config = JoinConfig {
                leader: members[0].clone(),
                front: members[scenario.join_position].clone(),
                behind: members[scenario.join_position + 1].clone(),
                joiner: joiner.clone(),
                ..defaults.clone()
            };
            join = Some(maneuvers.start_join(config, &control, &mut engine, &mut topology)?);
        }
        for (_, err) in maneuvers.advance(&mut control, &mut engine, &mut topology) {
            println!("step {}: join failed: {}", step, err);
        }
        control.step(&mut engine, step);
        engine.step(scenario.step_length);

        let current = join.and_then(|id| maneuvers.state(id));
        if current != state {
            println!("{:>6.2}s  {:?}", engine.time(), current);
            state = current;
        }
    }

    let crashed = topology
        .iter()
        .filter(|(vid, _)| engine.vehicle(vid).map_or(false, |v| v.crashed))
        .count();
    println!(
        "Done in {:?}: join {:?}, {} crash(es)",
        start.elapsed(),
        state,
        crashed
    );
    Ok(())
}
