use crate::binding::Binding;
use crate::codec::{self, Value, Values};
use crate::lane_change::{LaneChangeScheduler, StepReport};
use crate::params::*;
use crate::registry::{EngineVersion, Registry};
use crate::vehicle_data::{EngineData, Fields, RadarData, VehicleData};
use crate::{Controller, Engine, EngineModel, Error, Result};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The vehicle length assumed when a record does not carry one, in m.
pub const DEFAULT_VEHICLE_LENGTH: f64 = 4.0; // m

/// The control plane of a set of platooning vehicles.
///
/// Every operation talks to the engine passed in by the caller; the only state
/// kept here is the negotiated binding and the pending lane changes.
pub struct ControlPlane {
    /// The binding chosen for the engine at construction.
    binding: Box<dyn Binding>,
    /// The numeric engine release.
    version: EngineVersion,
    /// The pending fixed lane goals.
    lane_changes: LaneChangeScheduler,
}

/// Parameters of the PATH CACC. Unset fields keep their current value.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PathCaccParams {
    /// Constant spacing in m.
    pub distance: Option<f64>,
    /// Damping ratio.
    pub xi: Option<f64>,
    /// Bandwidth.
    pub omega_n: Option<f64>,
    /// Leader data weighting.
    pub c1: Option<f64>,
}

/// Parameters of Ploeg's CACC. Unset fields keep their current value.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PloegParams {
    /// Proportional gain.
    pub kp: Option<f64>,
    /// Derivative gain.
    pub kd: Option<f64>,
    /// Time headway in s.
    pub headway: Option<f64>,
}

impl PathCaccParams {
    /// Only sets the spacing.
    pub fn spacing(distance: f64) -> Self {
        Self {
            distance: Some(distance),
            ..Default::default()
        }
    }
}

impl ControlPlane {
    /// Creates a control plane for the connected engine, asking it for its version.
    pub fn connect(engine: &mut dyn Engine) -> Result<Self> {
        let version = engine.version()?;
        Self::with_version(&version)
    }

    /// Creates a control plane for an engine with the given version banner.
    pub fn with_version(version: &str) -> Result<Self> {
        Self::with_registry(&Registry::default(), version)
    }

    /// Creates a control plane using the bindings of a custom registry.
    pub fn with_registry(registry: &Registry, version: &str) -> Result<Self> {
        Ok(Self {
            binding: registry.resolve(version)?,
            version: EngineVersion::from_banner(version),
            lane_changes: LaneChangeScheduler::default(),
        })
    }

    /// The binding in use.
    pub fn binding(&self) -> &dyn Binding {
        self.binding.as_ref()
    }

    /// The numeric release of the engine.
    pub fn version(&self) -> EngineVersion {
        self.version
    }

    /// The pending fixed lane goals.
    pub fn lane_changes(&self) -> &LaneChangeScheduler {
        &self.lane_changes
    }

    /// Advances the lane change scheduler by one simulation step.
    /// Call once per engine step.
    pub fn step(&mut self, engine: &mut dyn Engine, step: u64) -> StepReport {
        let report = self.lane_changes.step(self.binding.as_ref(), engine);
        if !report.failed.is_empty() {
            log::debug!("step {}: {} lane change(s) failed", step, report.failed.len());
        }
        report
    }

    /// Sets the cruise control desired speed in m/s.
    pub fn set_cc_desired_speed(
        &self,
        engine: &mut dyn Engine,
        vid: &str,
        speed: f64,
    ) -> Result<()> {
        self.set_par(engine, vid, PAR_CC_DESIRED_SPEED, &[speed.into()])
    }

    /// Sets the currently active controller.
    pub fn set_active_controller(
        &self,
        engine: &mut dyn Engine,
        vid: &str,
        controller: Controller,
    ) -> Result<()> {
        self.set_par(
            engine,
            vid,
            PAR_ACTIVE_CONTROLLER,
            &[(controller as i64).into()],
        )
    }

    /// Gets the currently active controller.
    pub fn get_active_controller(&self, engine: &mut dyn Engine, vid: &str) -> Result<Controller> {
        let (reply, payload) = self.get_par(engine, vid, PAR_ACTIVE_CONTROLLER, &[])?;
        let id = Fields::new(&reply, &payload).i64(0)?;
        Controller::try_from(id).map_err(|_| {
            Error::protocol(&payload, format!("unknown controller id {}", id))
        })
    }

    /// Tells a vehicle to move to and stay on a lane.
    /// With `safe` unset the vehicle changes lane as soon as possible.
    /// The change is carried out by [ControlPlane::step].
    pub fn set_fixed_lane(&mut self, vid: &str, lane: i32, safe: bool) {
        self.lane_changes.request(vid, lane, safe);
    }

    /// Drops any fixed lane goal and gives lane change decisions back to the engine.
    pub fn disable_fixed_lane(&mut self, engine: &mut dyn Engine, vid: &str) -> Result<()> {
        self.lane_changes.cancel(vid);
        engine.set_lane_change_mode(vid, self.binding.lane_change_modes().default)
    }

    /// Makes the vehicle apply a constant acceleration, overriding its controller.
    pub fn set_fixed_acceleration(
        &self,
        engine: &mut dyn Engine,
        vid: &str,
        acceleration: f64,
    ) -> Result<()> {
        self.set_par(
            engine,
            vid,
            PAR_FIXED_ACCELERATION,
            &[true.into(), acceleration.into()],
        )
    }

    /// Gives control back to the active controller after [ControlPlane::set_fixed_acceleration].
    pub fn clear_fixed_acceleration(&self, engine: &mut dyn Engine, vid: &str) -> Result<()> {
        self.set_par(
            engine,
            vid,
            PAR_FIXED_ACCELERATION,
            &[false.into(), Value::Double(0.0)],
        )
    }

    /// Reads the kinematic state of a vehicle.
    pub fn get_vehicle_data(&self, engine: &mut dyn Engine, vid: &str) -> Result<VehicleData> {
        let (reply, payload) = self.get_par(engine, vid, PAR_SPEED_AND_ACCELERATION, &[])?;
        VehicleData::from_state_reply(&reply, &payload)
    }

    /// Whether the vehicle has crashed.
    pub fn get_crashed(&self, engine: &mut dyn Engine, vid: &str) -> Result<bool> {
        Ok(self.get_i64(engine, vid, PAR_CRASHED)? == 1)
    }

    /// Distance and relative speed to the vehicle ahead.
    pub fn get_radar_data(&self, engine: &mut dyn Engine, vid: &str) -> Result<RadarData> {
        let (reply, payload) = self.get_par(engine, vid, PAR_RADAR_DATA, &[])?;
        let f = Fields::new(&reply, &payload);
        Ok(RadarData {
            distance: f.f64(0)?,
            relative_speed: f.f64(1)?,
        })
    }

    /// The number of lanes of the road the vehicle is on.
    pub fn get_lanes_count(&self, engine: &mut dyn Engine, vid: &str) -> Result<i64> {
        self.get_i64(engine, vid, PAR_LANES_COUNT)
    }

    /// The distance to the end of the vehicle's route in m.
    pub fn get_distance_to_end(&self, engine: &mut dyn Engine, vid: &str) -> Result<f64> {
        self.get_f64(engine, vid, PAR_DISTANCE_TO_END)
    }

    /// The distance from the start of the vehicle's route in m.
    pub fn get_distance_from_begin(&self, engine: &mut dyn Engine, vid: &str) -> Result<f64> {
        self.get_f64(engine, vid, PAR_DISTANCE_FROM_BEGIN)
    }

    /// The acceleration the ACC computes, even when it is not in control.
    pub fn get_acc_acceleration(&self, engine: &mut dyn Engine, vid: &str) -> Result<f64> {
        self.get_f64(engine, vid, PAR_ACC_ACCELERATION)
    }

    /// The PATH CACC spacing in m.
    pub fn get_cacc_spacing(&self, engine: &mut dyn Engine, vid: &str) -> Result<f64> {
        self.get_f64(engine, vid, PAR_CACC_SPACING)
    }

    /// The record a vehicle stores about the platoon member at `index`.
    pub fn get_stored_vehicle_data(
        &self,
        engine: &mut dyn Engine,
        vid: &str,
        index: i64,
    ) -> Result<VehicleData> {
        let (reply, payload) = self.get_par(engine, vid, PAR_VEHICLE_DATA, &[index.into()])?;
        VehicleData::from_stored_reply(&reply, &payload)
    }

    /// Gear and rpm of the realistic engine model.
    pub fn get_engine_data(&self, engine: &mut dyn Engine, vid: &str) -> Result<EngineData> {
        let (reply, payload) = self.get_par(engine, vid, PAR_ENGINE_DATA, &[])?;
        let f = Fields::new(&reply, &payload);
        Ok(EngineData {
            gear: f.i64(0)?,
            rpm: f.f64(1)?,
        })
    }

    /// Stores a record about another platoon member. Used by the consensus controller.
    pub fn set_vehicle_data(
        &self,
        engine: &mut dyn Engine,
        vid: &str,
        data: &VehicleData,
    ) -> Result<()> {
        self.set_par(engine, vid, PAR_VEHICLE_DATA, &data.stored_tuple())
    }

    /// Sets the platoon leader's data.
    pub fn set_leader_vehicle_data(
        &self,
        engine: &mut dyn Engine,
        vid: &str,
        data: &VehicleData,
    ) -> Result<()> {
        self.set_par(
            engine,
            vid,
            PAR_LEADER_SPEED_AND_ACCELERATION,
            &data.reference_tuple(),
        )
    }

    /// Sets the front vehicle's data.
    pub fn set_front_vehicle_data(
        &self,
        engine: &mut dyn Engine,
        vid: &str,
        data: &VehicleData,
    ) -> Result<()> {
        self.set_par(
            engine,
            vid,
            PAR_PRECEDING_SPEED_AND_ACCELERATION,
            &data.reference_tuple(),
        )
    }

    /// Sets the leader's data for the faked CACC.
    pub fn set_leader_vehicle_fake_data(
        &self,
        engine: &mut dyn Engine,
        vid: &str,
        data: &VehicleData,
    ) -> Result<()> {
        self.set_par(
            engine,
            vid,
            PAR_LEADER_FAKE_DATA,
            &[data.speed.into(), data.acceleration.into(), data.u.into()],
        )
    }

    /// Sets the front vehicle's data and its GPS distance for the faked CACC.
    pub fn set_front_vehicle_fake_data(
        &self,
        engine: &mut dyn Engine,
        vid: &str,
        data: &VehicleData,
        distance: f64,
    ) -> Result<()> {
        self.set_par(
            engine,
            vid,
            PAR_FRONT_FAKE_DATA,
            &[
                data.speed.into(),
                data.acceleration.into(),
                distance.into(),
                data.u.into(),
            ],
        )
    }

    /// Sets the 0-based position of the vehicle within its platoon.
    pub fn set_vehicle_position(
        &self,
        engine: &mut dyn Engine,
        vid: &str,
        position: i64,
    ) -> Result<()> {
        self.set_par(engine, vid, PAR_VEHICLE_POSITION, &[position.into()])
    }

    /// Sets the size of the vehicle's platoon.
    pub fn set_platoon_size(&self, engine: &mut dyn Engine, vid: &str, size: i64) -> Result<()> {
        self.set_par(engine, vid, PAR_PLATOON_SIZE, &[size.into()])
    }

    /// Sets the parameters of the PATH CACC.
    pub fn set_path_cacc_parameters(
        &self,
        engine: &mut dyn Engine,
        vid: &str,
        params: &PathCaccParams,
    ) -> Result<()> {
        let fields = [
            (PAR_CACC_SPACING, params.distance),
            (PAR_CACC_XI, params.xi),
            (PAR_CACC_OMEGA_N, params.omega_n),
            (PAR_CACC_C1, params.c1),
        ];
        self.set_optional(engine, vid, &fields)
    }

    /// Sets the parameters of Ploeg's CACC.
    pub fn set_ploeg_cacc_parameters(
        &self,
        engine: &mut dyn Engine,
        vid: &str,
        params: &PloegParams,
    ) -> Result<()> {
        let fields = [
            (PAR_PLOEG_KP, params.kp),
            (PAR_PLOEG_KD, params.kd),
            (PAR_PLOEG_H, params.headway),
        ];
        self.set_optional(engine, vid, &fields)
    }

    /// Sets the time constant of the first order lag engine model, in s.
    pub fn set_engine_tau(&self, engine: &mut dyn Engine, vid: &str, tau: f64) -> Result<()> {
        self.set_par(engine, vid, PAR_ENGINE_TAU, &[tau.into()])
    }

    /// Selects the engine model.
    pub fn set_engine_model(
        &self,
        engine: &mut dyn Engine,
        vid: &str,
        model: EngineModel,
    ) -> Result<()> {
        self.set_par(engine, vid, PAR_VEHICLE_ENGINE_MODEL, &[(model as i64).into()])
    }

    /// Selects the vehicle characteristics used by the realistic engine model.
    pub fn set_vehicle_model(&self, engine: &mut dyn Engine, vid: &str, model: &str) -> Result<()> {
        self.set_par(engine, vid, PAR_VEHICLE_MODEL, &[model.into()])
    }

    /// Sets the file the realistic engine model loads vehicle characteristics from.
    pub fn set_vehicles_file(
        &self,
        engine: &mut dyn Engine,
        vid: &str,
        filename: &str,
    ) -> Result<()> {
        self.set_par(engine, vid, PAR_VEHICLES_FILE, &[filename.into()])
    }

    /// Sets the ACC time headway in s.
    pub fn set_acc_headway_time(
        &self,
        engine: &mut dyn Engine,
        vid: &str,
        headway: f64,
    ) -> Result<()> {
        self.set_par(engine, vid, PAR_ACC_HEADWAY_TIME, &[headway.into()])
    }

    /// Whether the CACCs use the controller acceleration instead of the real one.
    pub fn use_controller_acceleration(
        &self,
        engine: &mut dyn Engine,
        vid: &str,
        enable: bool,
    ) -> Result<()> {
        self.set_par(engine, vid, PAR_USE_CONTROLLER_ACCELERATION, &[enable.into()])
    }

    /// Lets the engine feed the CACC directly from the given leader and front vehicles,
    /// instead of relying on [crate::Relay].
    pub fn enable_auto_feed(
        &self,
        engine: &mut dyn Engine,
        vid: &str,
        leader: &str,
        front: &str,
    ) -> Result<()> {
        self.set_par(
            engine,
            vid,
            PAR_USE_AUTO_FEEDING,
            &[true.into(), leader.into(), front.into()],
        )
    }

    /// Stops the engine feeding the CACC directly.
    pub fn disable_auto_feed(&self, engine: &mut dyn Engine, vid: &str) -> Result<()> {
        self.set_par(engine, vid, PAR_USE_AUTO_FEEDING, &[false.into()])
    }

    /// Whether missing reference data is interpolated.
    pub fn use_prediction(&self, engine: &mut dyn Engine, vid: &str, enable: bool) -> Result<()> {
        self.set_par(engine, vid, PAR_USE_PREDICTION, &[enable.into()])
    }

    /// Adds a member to the platoon led by `vid`, for coordinated lane changes.
    pub fn add_member(
        &self,
        engine: &mut dyn Engine,
        vid: &str,
        member: &str,
        position: i64,
    ) -> Result<()> {
        self.set_par(engine, vid, PAR_ADD_MEMBER, &[member.into(), position.into()])
    }

    /// Removes a member from the platoon led by `vid`.
    pub fn remove_member(&self, engine: &mut dyn Engine, vid: &str, member: &str) -> Result<()> {
        self.set_par(engine, vid, PAR_REMOVE_MEMBER, &[member.into()])
    }

    /// Lets the leader `vid` change lanes with its whole platoon when it gains speed by doing so.
    pub fn enable_auto_lane_changing(
        &self,
        engine: &mut dyn Engine,
        vid: &str,
        enable: bool,
    ) -> Result<()> {
        self.set_par(engine, vid, PAR_ENABLE_AUTO_LANE_CHANGE, &[enable.into()])
    }

    /// The planar distance between two vehicles, minus one vehicle length.
    pub fn get_distance(
        &self,
        engine: &mut dyn Engine,
        a: &str,
        b: &str,
        vehicle_length: f64,
    ) -> Result<f64> {
        let a = self.get_vehicle_data(engine, a)?;
        let b = self.get_vehicle_data(engine, b)?;
        Ok(a.distance_to(&b) - vehicle_length)
    }

    /// Sets a parameter to an encoded tuple.
    fn set_par(
        &self,
        engine: &mut dyn Engine,
        vid: &str,
        par: &str,
        values: &[Value],
    ) -> Result<()> {
        let payload = self.binding.codec().pack(values)?;
        engine.set_parameter(vid, &key(par), &payload)
    }

    /// Sets each of the parameters that have a value.
    fn set_optional(
        &self,
        engine: &mut dyn Engine,
        vid: &str,
        fields: &[(&str, Option<f64>)],
    ) -> Result<()> {
        for (par, value) in fields {
            if let Some(value) = value {
                self.set_par(engine, vid, par, &[(*value).into()])?;
            }
        }
        Ok(())
    }

    /// Queries a parameter. Returns the decoded reply and the raw payload.
    fn get_par(
        &self,
        engine: &mut dyn Engine,
        vid: &str,
        par: &str,
        args: &[Value],
    ) -> Result<(Values, String)> {
        let codec = self.binding.codec();
        let query = codec::encode(codec, par, args)?;
        let payload = engine.get_parameter(vid, &key(&query))?;
        let reply = codec.unpack(&payload)?;
        Ok((reply, payload))
    }

    fn get_f64(&self, engine: &mut dyn Engine, vid: &str, par: &str) -> Result<f64> {
        let (reply, payload) = self.get_par(engine, vid, par, &[])?;
        Fields::new(&reply, &payload).f64(0)
    }

    fn get_i64(&self, engine: &mut dyn Engine, vid: &str, par: &str) -> Result<i64> {
        let (reply, payload) = self.get_par(engine, vid, par, &[])?;
        Fields::new(&reply, &payload).i64(0)
    }
}
