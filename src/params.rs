//! Names of the car-following model parameters understood by the engine.

/// Namespace every parameter lives under.
pub const NAMESPACE: &str = "carFollowModel";

pub const PAR_CC_DESIRED_SPEED: &str = "ccds";
pub const PAR_ACTIVE_CONTROLLER: &str = "ccac";
pub const PAR_CACC_SPACING: &str = "ccsp";
pub const PAR_ACC_ACCELERATION: &str = "ccacc";
pub const PAR_CRASHED: &str = "cccr";
pub const PAR_FIXED_ACCELERATION: &str = "ccfa";
pub const PAR_SPEED_AND_ACCELERATION: &str = "ccsa";
pub const PAR_LEADER_SPEED_AND_ACCELERATION: &str = "cclsa";
pub const PAR_PRECEDING_SPEED_AND_ACCELERATION: &str = "ccpsa";
pub const PAR_RADAR_DATA: &str = "ccrd";
pub const PAR_LEADER_FAKE_DATA: &str = "cclfd";
pub const PAR_FRONT_FAKE_DATA: &str = "ccffd";
pub const PAR_DISTANCE_TO_END: &str = "ccdte";
pub const PAR_DISTANCE_FROM_BEGIN: &str = "ccdfb";
pub const PAR_LANES_COUNT: &str = "cclc";
pub const PAR_ACC_HEADWAY_TIME: &str = "ccaht";
pub const PAR_ENGINE_DATA: &str = "cced";
pub const PAR_USE_CONTROLLER_ACCELERATION: &str = "ccuca";
pub const PAR_USE_PREDICTION: &str = "ccup";
pub const PAR_USE_AUTO_FEEDING: &str = "ccaf";
pub const PAR_ADD_MEMBER: &str = "ccam";
pub const PAR_REMOVE_MEMBER: &str = "ccrm";
pub const PAR_ENABLE_AUTO_LANE_CHANGE: &str = "ccalc";

pub const PAR_VEHICLE_DATA: &str = "ccvd";
pub const PAR_VEHICLE_POSITION: &str = "ccvp";
pub const PAR_PLATOON_SIZE: &str = "ccps";
pub const PAR_CACC_XI: &str = "ccxi";
pub const PAR_CACC_OMEGA_N: &str = "ccon";
pub const PAR_CACC_C1: &str = "ccc1";
pub const PAR_ENGINE_TAU: &str = "ccet";
pub const PAR_PLOEG_H: &str = "ccph";
pub const PAR_PLOEG_KP: &str = "ccpkp";
pub const PAR_PLOEG_KD: &str = "ccpkd";
pub const PAR_VEHICLE_ENGINE_MODEL: &str = "ccvem";
pub const PAR_VEHICLE_MODEL: &str = "ccvm";
pub const PAR_VEHICLES_FILE: &str = "ccvf";

/// Builds the fully qualified key for a parameter or an encoded query.
pub fn key(par: &str) -> String {
    format!("{}.{}", NAMESPACE, par)
}

/// Strips the namespace from a fully qualified key.
pub fn strip_namespace(key: &str) -> Option<&str> {
    key.strip_prefix(NAMESPACE)?.strip_prefix('.')
}
