pub use binding::{Binding, LaneChangeModes};
pub use cgmath;
pub use codec::{Codec, Value, Values};
pub use control::{ControlPlane, PathCaccParams, PloegParams, DEFAULT_VEHICLE_LENGTH};
pub use controller::{Controller, EngineModel};
pub use engine::Engine;
pub use error::{Error, Result};
pub use lane_change::{LaneChangeRequest, LaneChangeScheduler, StepReport};
pub use maneuver::{JoinConfig, JoinManeuver, JoinState, Maneuvers};
pub use registry::{EngineVersion, Registry};
use slotmap::new_key_type;
pub use slotmap::{Key, KeyData};
pub use topology::{Relay, RelayConfig, RelayReport, Topology, TopologyEntry};
pub use vehicle_data::{DataKey, EngineData, Point2d, RadarData, VehicleData};

pub mod binding;
pub mod codec;
mod control;
mod controller;
mod engine;
mod error;
mod lane_change;
mod maneuver;
pub mod mock;
pub mod params;
mod registry;
mod topology;
mod vehicle_data;

new_key_type! {
    /// Unique ID of an in-flight [JoinManeuver].
    pub struct ManeuverId;
}
