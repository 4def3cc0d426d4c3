mod classify;
mod fields;

pub mod apfloat;
pub mod soft_float;

#[cfg(test)]
mod add_tester;

use num_enum::{IntoPrimitive, TryFromPrimitive};

pub use fields::Fields;
pub use soft_float::{AddError, SoftAdder};

/// Rounding policy applied to the guard/round/sticky bits of a sum.
///
/// The raw codes are `0` = ties-to-even, `1` = down, `2` = up, `3` = toward zero.
#[derive(
    Debug, Default, Copy, Clone, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive,
)]
#[cfg_attr(feature = "native-cli", derive(clap::ValueEnum))]
#[repr(u8)]
pub enum RoundingMode {
    #[default]
    #[cfg_attr(feature = "native-cli", value(alias = "rtne"))]
    NearestTiesToEven = 0,
    #[cfg_attr(feature = "native-cli", value(alias = "down"))]
    TowardNegative = 1,
    #[cfg_attr(feature = "native-cli", value(alias = "up"))]
    TowardPositive = 2,
    #[cfg_attr(feature = "native-cli", value(alias = "rtz"))]
    TowardZero = 3,
}

impl RoundingMode {
    pub const ALL: [RoundingMode; 4] = [
        RoundingMode::NearestTiesToEven,
        RoundingMode::TowardNegative,
        RoundingMode::TowardPositive,
        RoundingMode::TowardZero,
    ];
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u16)]
pub enum Classification {
    NegativeInfinity = 0x1,
    NormalNegative = 0x2,
    SubnormalNegative = 0x4,
    NegativeZero = 0x8,
    PositiveZero = 0x10,
    SubnormalPositive = 0x20,
    NormalPositive = 0x40,
    PositiveInfinity = 0x80,
    SignalingNaN = 0x100,
    QuietNaN = 0x200,
}

impl Classification {
    /// One-hot mask with a single bit set per class, ordered from `-inf` to quiet NaN.
    pub fn bits(self) -> u16 {
        self as u16
    }

    pub fn is_nan(self) -> bool {
        matches!(
            self,
            Classification::SignalingNaN | Classification::QuietNaN
        )
    }
}
