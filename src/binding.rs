//! Engine bindings: one per wire dialect spoken by a family of engine versions.

pub use self::eclipse::EclipseBinding;
pub use self::legacy::LegacyBinding;
use crate::codec::Codec;

mod eclipse;
mod legacy;

/// The lane change mode bitsets of a dialect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LaneChangeModes {
    /// Gives lane change decisions back to the engine's own model.
    pub default: u32,
    /// Fixed lane, respecting safety gaps.
    pub fixed_safe: u32,
    /// Fixed lane, changing as soon as the engine allows.
    pub fixed_aggressive: u32,
}

impl LaneChangeModes {
    /// The fixed lane mode for the given safety setting.
    pub fn fixed(&self, safe: bool) -> u32 {
        if safe {
            self.fixed_safe
        } else {
            self.fixed_aggressive
        }
    }
}

/// A concrete dialect of the engine protocol.
pub trait Binding {
    /// A short name used in logs.
    fn name(&self) -> &'static str;

    /// Version banner prefixes this binding speaks.
    fn versions(&self) -> &'static [&'static str];

    /// Whether this binding is used when no other one matches.
    fn is_default(&self) -> bool {
        false
    }

    /// The codec used for every payload.
    fn codec(&self) -> &dyn Codec;

    /// The lane change mode bitsets.
    fn lane_change_modes(&self) -> LaneChangeModes;

    /// Whether the given engine banner is spoken by this binding.
    fn supports(&self, version: &str) -> bool {
        self.versions().iter().any(|v| version.starts_with(v))
    }
}
