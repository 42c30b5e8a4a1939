//! Errors raised while talking to the simulation engine.

use thiserror::Error;

/// Error type for every fallible control plane operation.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum Error {
    /// A parameter payload could not be decoded.
    #[error("malformed payload {payload:?}: {reason}")]
    Protocol { payload: String, reason: String },

    /// The engine does not know the vehicle.
    #[error("no such vehicle: {0}")]
    UnknownVehicle(String),

    /// No registered binding speaks the engine's protocol.
    #[error("no binding supports engine version {0:?}")]
    UnsupportedVersion(String),

    /// A value was rejected before being sent to the engine.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Any other failure reported by the engine channel.
    #[error("engine error: {0}")]
    Engine(String),
}

impl Error {
    pub(crate) fn protocol(payload: &str, reason: impl Into<String>) -> Self {
        Self::Protocol {
            payload: payload.to_owned(),
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
