use super::{Binding, LaneChangeModes};
use crate::codec::{Codec, LengthPrefixedCodec};

/// Binding for the 0.32 development builds that predate the upstream integration.
///
/// These builds frame every value with its length and do not know the
/// TraCI-aware default lane change mode.
#[derive(Clone, Copy, Debug, Default)]
pub struct LegacyBinding {
    codec: LengthPrefixedCodec,
}

impl LegacyBinding {
    pub fn boxed() -> Box<dyn Binding> {
        Box::new(Self::default())
    }
}

impl Binding for LegacyBinding {
    fn name(&self) -> &'static str {
        "legacy"
    }

    fn versions(&self) -> &'static [&'static str] {
        &["SUMO d1422e4780a", "SUMO 619df188ac3"]
    }

    fn codec(&self) -> &dyn Codec {
        &self.codec
    }

    fn lane_change_modes(&self) -> LaneChangeModes {
        LaneChangeModes {
            default: 0b10_1010_1010,
            fixed_safe: 0b10_0000_0000,
            fixed_aggressive: 0,
        }
    }
}
