use crate::codec::Value;
use crate::{Error, Result};
use cgmath::{MetricSpace, Point2};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 2D point
pub type Point2d = Point2<f64>;

/// A snapshot of a vehicle's kinematic and control state.
///
/// Records are read fresh from the engine every time and never updated in place.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VehicleData {
    /// The vehicle's position within its platoon, if known.
    pub index: Option<i64>,
    /// The raw control input.
    pub u: f64,
    /// The acceleration in m/s^2.
    pub acceleration: f64,
    /// The speed in m/s.
    pub speed: f64,
    /// The x coordinate in world space.
    pub pos_x: f64,
    /// The y coordinate in world space.
    pub pos_y: f64,
    /// The simulation time at which the sample was taken, in s.
    pub time: f64,
    /// The vehicle length in m, if known.
    pub length: Option<f64>,
}

/// Symbolic names of the fields of a [VehicleData].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DataKey {
    Index,
    U,
    Acceleration,
    Speed,
    PosX,
    PosY,
    Time,
    Length,
}

/// Distance and relative speed to the vehicle ahead, as measured by radar.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RadarData {
    /// Distance in m, or -1 when nothing is in range.
    pub distance: f64,
    /// Relative speed in m/s.
    pub relative_speed: f64,
}

/// Telemetry of the realistic engine model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineData {
    /// The current gear, or -1 when the realistic model is not in use.
    pub gear: i64,
    /// Engine speed in rpm.
    pub rpm: f64,
}

impl DataKey {
    pub const ALL: [DataKey; 8] = [
        DataKey::Index,
        DataKey::U,
        DataKey::Acceleration,
        DataKey::Speed,
        DataKey::PosX,
        DataKey::PosY,
        DataKey::Time,
        DataKey::Length,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataKey::Index => "index",
            DataKey::U => "u",
            DataKey::Acceleration => "acceleration",
            DataKey::Speed => "speed",
            DataKey::PosX => "posx",
            DataKey::PosY => "posy",
            DataKey::Time => "time",
            DataKey::Length => "length",
        }
    }
}

impl fmt::Display for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DataKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| Error::InvalidParameter(format!("unknown data key {:?}", s)))
    }
}

impl VehicleData {
    /// Looks up a field by its symbolic key.
    /// Returns `None` for optional fields that are not set.
    pub fn get(&self, key: DataKey) -> Option<f64> {
        match key {
            DataKey::Index => self.index.map(|i| i as f64),
            DataKey::U => Some(self.u),
            DataKey::Acceleration => Some(self.acceleration),
            DataKey::Speed => Some(self.speed),
            DataKey::PosX => Some(self.pos_x),
            DataKey::PosY => Some(self.pos_y),
            DataKey::Time => Some(self.time),
            DataKey::Length => self.length,
        }
    }

    /// The planar position of the vehicle.
    pub fn position(&self) -> Point2d {
        Point2d::new(self.pos_x, self.pos_y)
    }

    /// The Euclidean distance between the two vehicles' positions.
    pub fn distance_to(&self, other: &VehicleData) -> f64 {
        self.position().distance(other.position())
    }

    /// Parses the reply to a state query: `speed, acceleration, u, x, y, time`.
    pub(crate) fn from_state_reply(reply: &[Value], payload: &str) -> Result<Self> {
        let f = Fields { reply, payload };
        Ok(Self {
            index: None,
            speed: f.f64(0)?,
            acceleration: f.f64(1)?,
            u: f.f64(2)?,
            pos_x: f.f64(3)?,
            pos_y: f.f64(4)?,
            time: f.f64(5)?,
            length: None,
        })
    }

    /// Parses a stored member record: `index, speed, acceleration, x, y, time, length, u`.
    pub(crate) fn from_stored_reply(reply: &[Value], payload: &str) -> Result<Self> {
        let f = Fields { reply, payload };
        Ok(Self {
            index: Some(f.i64(0)?),
            speed: f.f64(1)?,
            acceleration: f.f64(2)?,
            pos_x: f.f64(3)?,
            pos_y: f.f64(4)?,
            time: f.f64(5)?,
            length: Some(f.f64(6)?),
            u: f.f64(7)?,
        })
    }

    /// The tuple sent when storing a member record. Unset optional fields are sent as -1.
    pub(crate) fn stored_tuple(&self) -> [Value; 8] {
        [
            self.index.unwrap_or(-1).into(),
            self.speed.into(),
            self.acceleration.into(),
            self.pos_x.into(),
            self.pos_y.into(),
            self.time.into(),
            self.length.unwrap_or(-1.0).into(),
            self.u.into(),
        ]
    }

    /// The tuple sent as leader or front reference data.
    pub(crate) fn reference_tuple(&self) -> [Value; 6] {
        [
            self.speed.into(),
            self.acceleration.into(),
            self.pos_x.into(),
            self.pos_y.into(),
            self.time.into(),
            self.u.into(),
        ]
    }
}

/// Positional access into a decoded reply.
pub(crate) struct Fields<'a> {
    pub reply: &'a [Value],
    pub payload: &'a str,
}

impl<'a> Fields<'a> {
    pub fn new(reply: &'a [Value], payload: &'a str) -> Self {
        Self { reply, payload }
    }

    fn field(&self, idx: usize) -> Result<&Value> {
        self.reply.get(idx).ok_or_else(|| {
            Error::protocol(
                self.payload,
                format!("expected at least {} fields, found {}", idx + 1, self.reply.len()),
            )
        })
    }

    pub fn f64(&self, idx: usize) -> Result<f64> {
        let value = self.field(idx)?;
        value
            .as_f64()
            .ok_or_else(|| Error::protocol(self.payload, format!("field {} is not numeric", idx)))
    }

    pub fn i64(&self, idx: usize) -> Result<i64> {
        let value = self.field(idx)?;
        value.as_i64().ok_or_else(|| {
            Error::protocol(self.payload, format!("field {} is not an integer", idx))
        })
    }
}
