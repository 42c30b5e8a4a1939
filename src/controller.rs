use crate::{Error, Result};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The longitudinal control law driving a vehicle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Controller {
    /// The human driver model.
    Driver = 0,
    /// Adaptive cruise control.
    Acc = 1,
    /// The PATH cooperative adaptive cruise control.
    Cacc = 2,
    /// A CACC that uses a supplied GPS distance instead of the radar.
    FakedCacc = 3,
    /// Ploeg's CACC.
    Ploeg = 4,
    /// The consensus controller.
    Consensus = 5,
}

/// The engine model used to turn a desired acceleration into an actual one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EngineModel {
    /// First order lag.
    Folm = 0,
    /// Gear and torque based engine model.
    Realistic = 1,
}

impl Controller {
    /// Whether the controller consumes leader/front reference data.
    pub fn is_cooperative(&self) -> bool {
        !matches!(self, Controller::Driver | Controller::Acc)
    }
}

impl TryFrom<i64> for Controller {
    type Error = Error;

    fn try_from(id: i64) -> Result<Self> {
        Ok(match id {
            0 => Controller::Driver,
            1 => Controller::Acc,
            2 => Controller::Cacc,
            3 => Controller::FakedCacc,
            4 => Controller::Ploeg,
            5 => Controller::Consensus,
            other => {
                return Err(Error::InvalidParameter(format!(
                    "unknown controller id {}",
                    other
                )))
            }
        })
    }
}

impl TryFrom<i64> for EngineModel {
    type Error = Error;

    fn try_from(id: i64) -> Result<Self> {
        match id {
            0 => Ok(EngineModel::Folm),
            1 => Ok(EngineModel::Realistic),
            other => Err(Error::InvalidParameter(format!(
                "unknown engine model {}",
                other
            ))),
        }
    }
}
