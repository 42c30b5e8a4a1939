//! The join maneuver: a vehicle driving alongside a platoon enters it through a gap
//! opened by the member that will end up behind it.

use crate::control::{PathCaccParams, DEFAULT_VEHICLE_LENGTH};
use crate::{ControlPlane, Controller, Engine, Error, ManeuverId, Result, Topology, TopologyEntry};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

/// The phase of a join maneuver. Phases only ever advance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum JoinState {
    /// The joiner is closing in on its future front vehicle.
    GoingToPosition,
    /// The member behind the join position is falling back.
    OpeningGap,
    /// The joiner is part of the platoon.
    Completed,
}

/// The actors and distances of a join maneuver.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct JoinConfig {
    /// The platoon leader.
    pub leader: String,
    /// The member that will be directly ahead of the joiner.
    pub front: String,
    /// The member that will be directly behind the joiner and opens the gap.
    pub behind: String,
    /// The vehicle joining the platoon.
    pub joiner: String,
    /// The lane the platoon drives on.
    pub platoon_lane: i32,
    /// The platoon's cruising speed in m/s.
    pub cruise_speed: f64,
    /// Extra speed given to the joiner while it approaches, in m/s.
    pub approach_boost: f64,
    /// The nominal CACC spacing in m.
    pub spacing: f64,
    /// The spacing kept around the joiner while the gap opens, in m.
    pub gap_spacing: f64,
    /// Added to `gap_spacing` to decide the joiner is in position, in m.
    pub approach_margin: f64,
    /// Added to twice `gap_spacing` to decide the gap is open, in m.
    pub open_margin: f64,
    /// The vehicle length subtracted from GPS distances, in m.
    pub vehicle_length: f64,
}

/// A single join maneuver.
#[derive(Clone, Debug)]
pub struct JoinManeuver {
    config: JoinConfig,
    state: JoinState,
    /// Members behind `behind` whose leader is redirected while the gap opens.
    followers: Vec<String>,
}

/// The in-flight maneuvers of a simulation.
#[derive(Default)]
pub struct Maneuvers {
    maneuvers: SlotMap<ManeuverId, JoinManeuver>,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            leader: String::new(),
            front: String::new(),
            behind: String::new(),
            joiner: String::new(),
            platoon_lane: 0,
            cruise_speed: 120.0 / 3.6,
            approach_boost: 15.0,
            spacing: 5.0,
            gap_spacing: 10.0,
            approach_margin: 1.0,
            open_margin: 2.0,
            vehicle_length: DEFAULT_VEHICLE_LENGTH,
        }
    }
}

impl JoinManeuver {
    /// Starts a join: the joiner is attached to the leader and its future front vehicle,
    /// switched to the faked CACC and sped up.
    pub fn start(
        config: JoinConfig,
        control: &ControlPlane,
        engine: &mut dyn Engine,
        topology: &mut Topology,
    ) -> Result<Self> {
        let joiner = config.joiner.as_str();
        let params = PathCaccParams::spacing(config.gap_spacing);
        control.set_path_cacc_parameters(engine, joiner, &params)?;
        control.set_cc_desired_speed(engine, joiner, config.cruise_speed + config.approach_boost)?;
        control.set_active_controller(engine, joiner, Controller::FakedCacc)?;
        topology.insert(joiner, TopologyEntry::new(&config.leader, &config.front));
        log::info!("{} going to position behind {}", joiner, config.front);

        Ok(Self {
            config,
            state: JoinState::GoingToPosition,
            followers: vec![],
        })
    }

    /// The current phase.
    pub fn state(&self) -> JoinState {
        self.state
    }

    /// The maneuver's settings.
    pub fn config(&self) -> &JoinConfig {
        &self.config
    }

    /// Evaluates the transition out of the current phase.
    ///
    /// Call after the relay pass of the same cycle. A maneuver whose distance
    /// condition is never met stays in its phase. Engine writes happen before any
    /// topology edit, so a failed call leaves both untouched and can be retried.
    pub fn advance(
        &mut self,
        control: &mut ControlPlane,
        engine: &mut dyn Engine,
        topology: &mut Topology,
    ) -> Result<JoinState> {
        let c = &self.config;
        match self.state {
            JoinState::GoingToPosition => {
                let distance = control.get_distance(engine, &c.joiner, &c.front, c.vehicle_length)?;
                if distance < c.gap_spacing + c.approach_margin {
                    self.open_gap(control, engine, topology)?;
                }
            }
            JoinState::OpeningGap => {
                let distance = control.get_distance(engine, &c.behind, &c.front, c.vehicle_length)?;
                if distance > 2.0 * c.gap_spacing + c.open_margin {
                    self.complete(control, engine, topology)?;
                }
            }
            JoinState::Completed => {}
        }
        Ok(self.state)
    }

    /// Makes `behind` fall back behind the joiner, temporarily leading its followers.
    fn open_gap(
        &mut self,
        control: &ControlPlane,
        engine: &mut dyn Engine,
        topology: &mut Topology,
    ) -> Result<()> {
        let c = &self.config;
        control.set_active_controller(engine, &c.behind, Controller::FakedCacc)?;
        let params = PathCaccParams::spacing(c.gap_spacing);
        control.set_path_cacc_parameters(engine, &c.behind, &params)?;

        let followers = topology.followers_of(&c.behind);
        for follower in &followers {
            topology.set_leader(follower, &c.behind);
        }
        topology.set_front(&c.behind, &c.joiner);

        log::info!(
            "{} opening gap for {} ({} follower(s) redirected)",
            c.behind,
            c.joiner,
            followers.len()
        );
        self.followers = followers;
        self.state = JoinState::OpeningGap;
        Ok(())
    }

    /// Moves the joiner into the platoon and restores nominal spacing and leadership.
    fn complete(
        &mut self,
        control: &mut ControlPlane,
        engine: &mut dyn Engine,
        topology: &mut Topology,
    ) -> Result<()> {
        let c = &self.config;
        let nominal = PathCaccParams::spacing(c.spacing);
        control.set_active_controller(engine, &c.joiner, Controller::Cacc)?;
        control.set_path_cacc_parameters(engine, &c.joiner, &nominal)?;
        control.set_active_controller(engine, &c.behind, Controller::Cacc)?;
        control.set_path_cacc_parameters(engine, &c.behind, &nominal)?;
        control.set_fixed_lane(&c.joiner, c.platoon_lane, false);

        for follower in &self.followers {
            topology.set_leader(follower, &c.leader);
        }

        log::info!("{} joined the platoon of {}", c.joiner, c.leader);
        self.state = JoinState::Completed;
        Ok(())
    }
}

impl Maneuvers {
    /// Creates an empty set of maneuvers.
    pub fn new() -> Self {
        Default::default()
    }

    /// Starts a join maneuver.
    pub fn start_join(
        &mut self,
        config: JoinConfig,
        control: &ControlPlane,
        engine: &mut dyn Engine,
        topology: &mut Topology,
    ) -> Result<ManeuverId> {
        let maneuver = JoinManeuver::start(config, control, engine, topology)?;
        Ok(self.maneuvers.insert(maneuver))
    }

    /// Evaluates every maneuver that has not completed.
    /// Failures are returned per maneuver and do not stop the others.
    pub fn advance(
        &mut self,
        control: &mut ControlPlane,
        engine: &mut dyn Engine,
        topology: &mut Topology,
    ) -> Vec<(ManeuverId, Error)> {
        let mut failed = vec![];
        for (id, maneuver) in &mut self.maneuvers {
            if maneuver.state() == JoinState::Completed {
                continue;
            }
            if let Err(err) = maneuver.advance(control, engine, topology) {
                log::warn!("maneuver of {} failed: {}", maneuver.config.joiner, err);
                failed.push((id, err));
            }
        }
        failed
    }

    /// The current phase of a maneuver.
    pub fn state(&self, id: ManeuverId) -> Option<JoinState> {
        self.maneuvers.get(id).map(JoinManeuver::state)
    }

    /// Gets a maneuver.
    pub fn get(&self, id: ManeuverId) -> Option<&JoinManeuver> {
        self.maneuvers.get(id)
    }

    /// Drops a maneuver immediately, whatever its phase.
    /// Topology edits already applied are left in place.
    pub fn abort(&mut self, id: ManeuverId) -> Option<JoinManeuver> {
        self.maneuvers.remove(id)
    }

    /// Forgets all completed maneuvers.
    pub fn remove_completed(&mut self) {
        self.maneuvers
            .retain(|_, maneuver| maneuver.state() != JoinState::Completed);
    }

    /// Iterates over all maneuvers.
    pub fn iter(&self) -> impl Iterator<Item = (ManeuverId, &JoinManeuver)> {
        self.maneuvers.iter()
    }

    /// The number of maneuvers.
    pub fn len(&self) -> usize {
        self.maneuvers.len()
    }

    /// Whether there are no maneuvers.
    pub fn is_empty(&self) -> bool {
        self.maneuvers.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_thresholds() {
        let config = JoinConfig::default();
        assert_eq!(config.gap_spacing + config.approach_margin, 11.0);
        assert_eq!(2.0 * config.gap_spacing + config.open_margin, 22.0);
        assert!(config.spacing < config.gap_spacing);
    }

    #[test]
    fn phases_are_ordered() {
        assert!(JoinState::GoingToPosition < JoinState::OpeningGap);
        assert!(JoinState::OpeningGap < JoinState::Completed);
    }
}
