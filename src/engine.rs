use crate::Result;

/// The simulation engine, as seen by the control plane.
///
/// Parameter keys are namespaced (see [crate::params]) and values are codec payloads.
/// Implementations report a vehicle they do not know with [crate::Error::UnknownVehicle].
pub trait Engine {
    /// The engine's version banner, e.g. `"SUMO 1.1.0"`.
    fn version(&mut self) -> Result<String>;

    /// Sets a parameter of a vehicle.
    fn set_parameter(&mut self, vehicle: &str, key: &str, value: &str) -> Result<()>;

    /// Reads a parameter of a vehicle. Queries with arguments encode them into the key.
    fn get_parameter(&mut self, vehicle: &str, key: &str) -> Result<String>;

    /// The index of the lane the vehicle is on, 0 being the rightmost.
    fn lane_index(&mut self, vehicle: &str) -> Result<i32>;

    /// Sets the bitset controlling the engine's own lane change decisions.
    fn set_lane_change_mode(&mut self, vehicle: &str, mode: u32) -> Result<()>;

    /// Asks the engine to move the vehicle to `lane` over `duration` seconds.
    fn change_lane(&mut self, vehicle: &str, lane: i32, duration: f64) -> Result<()>;

    /// Whether a lane change in `direction` (+1 left, -1 right) would overlap another vehicle.
    fn is_overlapping(&mut self, vehicle: &str, direction: i32) -> Result<bool>;
}
