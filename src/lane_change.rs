use crate::binding::{Binding, LaneChangeModes};
use crate::{Engine, Error, Result};
use std::collections::BTreeMap;

/// How long the engine takes to move a vehicle into the adjacent lane, in s.
const LANE_CHANGE_DURATION: f64 = 0.0; // s

/// An outstanding fixed lane goal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LaneChangeRequest {
    /// The lane to reach and stay on.
    pub target_lane: i32,
    /// Whether to wait for a safe gap before each step.
    pub safe: bool,
    /// Set for the step after a lane change command was issued,
    /// so the engine is not commanded again before it has acted.
    waiting: bool,
}

/// Drives each vehicle with a fixed lane goal towards its target, one lane at a time.
#[derive(Clone, Debug, Default)]
pub struct LaneChangeScheduler {
    /// The pending requests, keyed by vehicle ID.
    requests: BTreeMap<String, LaneChangeRequest>,
}

/// The outcome of one scheduler step.
#[derive(Debug, Default)]
pub struct StepReport {
    /// Vehicles that reached their target lane; their requests are gone.
    pub completed: Vec<String>,
    /// Vehicles that were commanded to the given lane.
    pub issued: Vec<(String, i32)>,
    /// Vehicles whose step failed. Other vehicles are unaffected.
    pub failed: Vec<(String, Error)>,
}

/// What a single request did during a step.
enum Progress {
    Waited,
    Reached,
    Issued(i32),
    Blocked,
}

impl LaneChangeRequest {
    /// Whether the next step is a cool-down step.
    pub fn is_waiting(&self) -> bool {
        self.waiting
    }
}

impl LaneChangeScheduler {
    /// Requests that a vehicle moves to and stays on a lane, replacing any previous goal.
    ///
    /// Repeating the pending goal keeps its cool-down, so the engine is not commanded twice.
    pub fn request(&mut self, vid: &str, target_lane: i32, safe: bool) {
        let request = LaneChangeRequest {
            target_lane,
            safe,
            waiting: false,
        };
        match self.requests.get_mut(vid) {
            Some(pending) if pending.target_lane == target_lane && pending.safe == safe => {}
            Some(pending) => *pending = request,
            None => {
                self.requests.insert(vid.to_owned(), request);
            }
        }
    }

    /// Drops the vehicle's goal, returning it if there was one.
    pub fn cancel(&mut self, vid: &str) -> Option<LaneChangeRequest> {
        self.requests.remove(vid)
    }

    /// The vehicle's pending goal.
    pub fn pending(&self, vid: &str) -> Option<&LaneChangeRequest> {
        self.requests.get(vid)
    }

    /// Whether the vehicle still has a goal to reach.
    pub fn is_pending(&self, vid: &str) -> bool {
        self.requests.contains_key(vid)
    }

    /// The number of pending goals.
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Whether no goals are pending.
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Iterates over the pending goals.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &LaneChangeRequest)> {
        self.requests.iter().map(|(vid, req)| (vid.as_str(), req))
    }

    /// Advances every pending request by one simulation step.
    pub fn step(&mut self, binding: &dyn Binding, engine: &mut dyn Engine) -> StepReport {
        let modes = binding.lane_change_modes();
        let mut report = StepReport::default();

        for (vid, request) in &mut self.requests {
            match Self::advance(vid, request, modes, engine) {
                Ok(Progress::Waited) | Ok(Progress::Blocked) => {}
                Ok(Progress::Reached) => {
                    log::debug!("{} reached lane {}", vid, request.target_lane);
                    report.completed.push(vid.clone());
                }
                Ok(Progress::Issued(lane)) => {
                    log::debug!("{} changing to lane {}", vid, lane);
                    report.issued.push((vid.clone(), lane));
                }
                Err(err) => {
                    log::warn!("lane change of {} failed: {}", vid, err);
                    report.failed.push((vid.clone(), err));
                }
            }
        }

        // Vehicles that left the simulation will never reach their goal
        let gone = report
            .failed
            .iter()
            .filter(|(_, err)| matches!(err, Error::UnknownVehicle(_)))
            .map(|(vid, _)| vid);
        for vid in report.completed.iter().chain(gone) {
            self.requests.remove(vid);
        }

        report
    }

    /// Advances a single request.
    fn advance(
        vid: &str,
        request: &mut LaneChangeRequest,
        modes: LaneChangeModes,
        engine: &mut dyn Engine,
    ) -> Result<Progress> {
        if request.waiting {
            request.waiting = false;
            return Ok(Progress::Waited);
        }

        let current = engine.lane_index(vid)?;
        let delta = request.target_lane - current;
        if delta == 0 {
            engine.set_lane_change_mode(vid, modes.fixed(request.safe))?;
            return Ok(Progress::Reached);
        }

        let direction = delta.signum();
        if request.safe && engine.is_overlapping(vid, direction)? {
            return Ok(Progress::Blocked);
        }

        let lane = current + direction;
        engine.set_lane_change_mode(vid, modes.fixed(request.safe))?;
        engine.change_lane(vid, lane, LANE_CHANGE_DURATION)?;
        if request.safe {
            request.waiting = true;
        }
        Ok(Progress::Issued(lane))
    }
}
