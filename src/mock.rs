//! An in-memory engine for tests and offline demos.
//!
//! It speaks the dialect negotiated for its version banner, remembers the last
//! value of every parameter and moves vehicles with a deliberately crude speed
//! rule. It is not a vehicle dynamics model.

use crate::binding::Binding;
use crate::codec::{self, Value, Values};
use crate::params::*;
use crate::{Controller, Engine, Error, Registry, Result};
use std::collections::{BTreeMap, HashMap};

/// Lateral distance between lane centres, in m.
pub const LANE_WIDTH: f64 = 3.2; // m

/// Gain of the spacing error in the follow rule, in 1/s.
const FOLLOW_GAIN: f64 = 0.5;

/// Range of the simulated radar, in m.
const RADAR_RANGE: f64 = 250.0; // m

/// A vehicle of the [MockEngine].
#[derive(Clone, Debug)]
pub struct MockVehicle {
    /// The lane index, 0 being the rightmost.
    pub lane: i32,
    /// The number of lanes of the road.
    pub lanes: i32,
    /// Longitudinal position in m.
    pub x: f64,
    /// Lateral position in m.
    pub y: f64,
    /// Speed in m/s.
    pub speed: f64,
    /// Acceleration during the last step, in m/s^2.
    pub acceleration: f64,
    /// The vehicle length in m.
    pub length: f64,
    /// Length of the vehicle's route in m.
    pub route_length: f64,
    /// Set once the vehicle overlaps another one on its lane.
    pub crashed: bool,
    /// The answer given to lane change hazard queries.
    pub overlapping: bool,
    /// The last lane change mode set.
    pub lane_change_mode: Option<u32>,
    /// Every lane change command received, in order.
    pub lane_commands: Vec<i32>,
    /// The lane the vehicle moves to on the next step.
    target_lane: Option<i32>,
    /// The last value of every parameter set.
    params: HashMap<String, Values>,
}

/// An [Engine] keeping everything in memory.
pub struct MockEngine {
    banner: String,
    binding: Box<dyn Binding>,
    time: f64,
    vehicles: BTreeMap<String, MockVehicle>,
}

impl MockVehicle {
    fn new(x: f64, lane: i32, speed: f64) -> Self {
        Self {
            lane,
            lanes: 3,
            x,
            y: lane as f64 * LANE_WIDTH,
            speed,
            acceleration: 0.0,
            length: 4.0,
            route_length: 10_000.0,
            crashed: false,
            overlapping: false,
            lane_change_mode: None,
            lane_commands: vec![],
            target_lane: None,
            params: HashMap::new(),
        }
    }

    /// Moves the vehicle to the given world coordinates.
    pub fn set_position(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
    }

    /// Puts the vehicle on a lane at once.
    pub fn set_lane(&mut self, lane: i32) {
        self.lane = lane;
        self.y = lane as f64 * LANE_WIDTH;
    }

    /// The last value set for a parameter.
    pub fn parameter(&self, par: &str) -> Option<&[Value]> {
        self.params.get(par).map(|v| v.as_slice())
    }

    /// The active controller, if one was set.
    pub fn controller(&self) -> Option<Controller> {
        let id = self.param_f64(PAR_ACTIVE_CONTROLLER, 0)?;
        Controller::try_from(id as i64).ok()
    }

    /// A numeric field of the last value set for a parameter.
    fn param_f64(&self, par: &str, idx: usize) -> Option<f64> {
        self.params.get(par)?.get(idx)?.as_f64()
    }

    /// The speed the vehicle's controller asks for at time `now`, given the reference data it has.
    fn target_speed(&self, now: f64) -> f64 {
        let desired = self
            .param_f64(PAR_CC_DESIRED_SPEED, 0)
            .unwrap_or(self.speed);
        let spacing = self.param_f64(PAR_CACC_SPACING, 0).unwrap_or(5.0);
        let follow = |front_speed: f64, gap: f64| front_speed + FOLLOW_GAIN * (gap - spacing);

        match self.controller() {
            Some(Controller::FakedCacc) => self
                .param_f64(PAR_FRONT_FAKE_DATA, 0)
                .zip(self.param_f64(PAR_FRONT_FAKE_DATA, 2))
                .map(|(speed, gap)| follow(speed, gap))
                .unwrap_or(desired)
                .clamp(0.0, desired.max(0.0)),
            // The CACCs ignore the cruise speed and extrapolate the front vehicle's last position
            Some(controller) if controller.is_cooperative() => {
                let front = |idx| self.param_f64(PAR_PRECEDING_SPEED_AND_ACCELERATION, idx);
                match (front(0), front(2), front(3), front(4)) {
                    (Some(speed), Some(x), Some(y), Some(time)) => {
                        let x = x + speed * (now - time);
                        let gap = (x - self.x).hypot(y - self.y) - self.length;
                        follow(speed, gap).max(0.0)
                    }
                    _ => desired.max(0.0),
                }
            }
            _ => desired.max(0.0),
        }
    }
}

impl MockEngine {
    /// Creates an engine reporting the given version banner.
    pub fn new(banner: &str) -> Result<Self> {
        Ok(Self {
            banner: banner.to_owned(),
            binding: Registry::default().resolve(banner)?,
            time: 0.0,
            vehicles: BTreeMap::new(),
        })
    }

    /// Inserts a vehicle at `x` on `lane`, driving at `speed`.
    pub fn add_vehicle(&mut self, vid: &str, x: f64, lane: i32, speed: f64) -> &mut MockVehicle {
        self.vehicles
            .entry(vid.to_owned())
            .or_insert_with(|| MockVehicle::new(x, lane, speed))
    }

    /// Removes a vehicle.
    pub fn remove_vehicle(&mut self, vid: &str) -> Option<MockVehicle> {
        self.vehicles.remove(vid)
    }

    /// Gets a vehicle.
    pub fn vehicle(&self, vid: &str) -> Option<&MockVehicle> {
        self.vehicles.get(vid)
    }

    /// Gets a vehicle mutably.
    pub fn vehicle_mut(&mut self, vid: &str) -> Option<&mut MockVehicle> {
        self.vehicles.get_mut(vid)
    }

    /// The last value set for a vehicle's parameter.
    pub fn parameter(&self, vid: &str, par: &str) -> Option<&[Value]> {
        self.vehicles.get(vid)?.parameter(par)
    }

    /// The simulation time in s.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Advances the simulation by `dt` seconds.
    pub fn step(&mut self, dt: f64) {
        let now = self.time;
        for vehicle in self.vehicles.values_mut() {
            if let Some(lane) = vehicle.target_lane.take() {
                vehicle.set_lane(lane);
            }

            let fixed = match vehicle.parameter(PAR_FIXED_ACCELERATION) {
                Some([Value::Int(1), acc]) => acc.as_f64(),
                _ => None,
            };
            let speed = match fixed {
                Some(acc) => f64::max(vehicle.speed + acc * dt, 0.0),
                None => vehicle.target_speed(now),
            };
            if dt > 0.0 {
                vehicle.acceleration = (speed - vehicle.speed) / dt;
            }
            vehicle.speed = speed;
            vehicle.x += speed * dt;
        }
        self.time += dt;
        self.detect_crashes();
    }

    /// Flags vehicles whose bodies overlap on the same lane.
    fn detect_crashes(&mut self) {
        let bodies = self
            .vehicles
            .iter()
            .map(|(vid, v)| (vid.clone(), v.lane, v.x, v.length))
            .collect::<Vec<_>>();
        for (vid, vehicle) in &mut self.vehicles {
            let hit = bodies.iter().any(|(other, lane, x, length)| {
                other != vid
                    && *lane == vehicle.lane
                    && (x - vehicle.x).abs() < 0.5 * (length + vehicle.length)
            });
            vehicle.crashed |= hit;
        }
    }

    fn get(&self, vid: &str) -> Result<&MockVehicle> {
        self.vehicles
            .get(vid)
            .ok_or_else(|| Error::UnknownVehicle(vid.to_owned()))
    }

    fn get_mut(&mut self, vid: &str) -> Result<&mut MockVehicle> {
        self.vehicles
            .get_mut(vid)
            .ok_or_else(|| Error::UnknownVehicle(vid.to_owned()))
    }

    /// Distance and relative speed to the closest vehicle ahead on the same lane.
    fn radar(&self, vehicle: &MockVehicle) -> [Value; 2] {
        self.vehicles
            .values()
            .filter(|v| v.lane == vehicle.lane && v.x > vehicle.x)
            .map(|v| (v.x - vehicle.x - v.length, v.speed - vehicle.speed))
            .filter(|(distance, _)| *distance <= RADAR_RANGE)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(d, s)| [d.into(), s.into()])
            .unwrap_or([Value::Double(-1.0), Value::Double(0.0)])
    }

    /// Answers a query.
    fn reply(&self, vid: &str, par: &str, args: &[Value]) -> Result<Vec<Value>> {
        let v = self.get(vid)?;
        let stored = |par: &str, default: f64| v.param_f64(par, 0).unwrap_or(default);
        Ok(match par {
            PAR_SPEED_AND_ACCELERATION => vec![
                v.speed.into(),
                v.acceleration.into(),
                v.acceleration.into(),
                v.x.into(),
                v.y.into(),
                self.time.into(),
            ],
            PAR_ACTIVE_CONTROLLER => vec![Value::Int(stored(PAR_ACTIVE_CONTROLLER, 0.0) as i64)],
            PAR_CRASHED => vec![v.crashed.into()],
            PAR_RADAR_DATA => self.radar(v).to_vec(),
            PAR_LANES_COUNT => vec![Value::Int(v.lanes.into())],
            PAR_DISTANCE_TO_END => vec![(v.route_length - v.x).into()],
            PAR_DISTANCE_FROM_BEGIN => vec![v.x.into()],
            PAR_ACC_ACCELERATION => vec![v.acceleration.into()],
            PAR_CACC_SPACING => vec![stored(PAR_CACC_SPACING, 5.0).into()],
            PAR_VEHICLE_DATA => {
                let index = args.first().and_then(Value::as_i64).ok_or_else(|| {
                    Error::InvalidParameter("stored vehicle data needs an index".into())
                })?;
                match v.parameter(&format!("{}.{}", PAR_VEHICLE_DATA, index)) {
                    Some(record) => record.to_vec(),
                    None => {
                        let mut empty = vec![Value::Int(-1)];
                        empty.resize(8, Value::Double(0.0));
                        empty
                    }
                }
            }
            PAR_ENGINE_DATA => {
                if stored(PAR_VEHICLE_ENGINE_MODEL, 0.0) == 1.0 {
                    let gear = (1.0 + v.speed / 8.0).min(6.0).floor();
                    vec![Value::Int(gear as i64), (800.0 + v.speed * 90.0).into()]
                } else {
                    vec![Value::Int(-1), Value::Double(0.0)]
                }
            }
            other => return Err(Error::Engine(format!("unknown parameter {:?}", other))),
        })
    }
}

impl Engine for MockEngine {
    fn version(&mut self) -> Result<String> {
        Ok(self.banner.clone())
    }

    fn set_parameter(&mut self, vehicle: &str, key: &str, value: &str) -> Result<()> {
        let par = strip_namespace(key)
            .ok_or_else(|| Error::Engine(format!("unknown parameter key {:?}", key)))?
            .to_owned();
        self.get(vehicle)?;
        let values = self.binding.codec().unpack(value)?;
        // Member records are kept per platoon index
        let par = match values.first() {
            Some(index) if par == PAR_VEHICLE_DATA => format!("{}.{}", PAR_VEHICLE_DATA, index),
            _ => par,
        };
        self.get_mut(vehicle)?.params.insert(par, values);
        Ok(())
    }

    fn get_parameter(&mut self, vehicle: &str, key: &str) -> Result<String> {
        let query = strip_namespace(key)
            .ok_or_else(|| Error::Engine(format!("unknown parameter key {:?}", key)))?;
        self.get(vehicle)?;
        let (par, args) = codec::decode(self.binding.codec(), query)?;
        let reply = self.reply(vehicle, &par, &args)?;
        self.binding.codec().pack(&reply)
    }

    fn lane_index(&mut self, vehicle: &str) -> Result<i32> {
        Ok(self.get(vehicle)?.lane)
    }

    fn set_lane_change_mode(&mut self, vehicle: &str, mode: u32) -> Result<()> {
        self.get_mut(vehicle)?.lane_change_mode = Some(mode);
        Ok(())
    }

    fn change_lane(&mut self, vehicle: &str, lane: i32, _duration: f64) -> Result<()> {
        let v = self.get_mut(vehicle)?;
        if lane < 0 || lane >= v.lanes {
            return Err(Error::InvalidParameter(format!("no lane {}", lane)));
        }
        v.lane_commands.push(lane);
        v.target_lane = Some(lane);
        Ok(())
    }

    fn is_overlapping(&mut self, vehicle: &str, _direction: i32) -> Result<bool> {
        Ok(self.get(vehicle)?.overlapping)
    }
}
