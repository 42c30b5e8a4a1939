use super::{Binding, LaneChangeModes};
use crate::codec::{Codec, DelimitedCodec};

/// Binding for engines with the upstream platooning integration (1.x).
#[derive(Clone, Copy, Debug, Default)]
pub struct EclipseBinding {
    codec: DelimitedCodec,
}

impl EclipseBinding {
    pub fn boxed() -> Box<dyn Binding> {
        Box::new(Self::default())
    }
}

impl Binding for EclipseBinding {
    fn name(&self) -> &'static str {
        "eclipse"
    }

    fn versions(&self) -> &'static [&'static str] {
        &["SUMO 1.0.1", "SUMO 1.1.0", "SUMO v1_1_0"]
    }

    fn is_default(&self) -> bool {
        true
    }

    fn codec(&self) -> &dyn Codec {
        &self.codec
    }

    fn lane_change_modes(&self) -> LaneChangeModes {
        LaneChangeModes {
            default: 0b0110_0101_0101,
            fixed_safe: 0b10_0000_0000,
            fixed_aggressive: 0,
        }
    }
}
