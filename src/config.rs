use std::fmt::{self, Display};

use thiserror::Error;

use crate::fpu::RoundingMode;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatError {
    #[error("exponent width {0} is out of range 2..={max}", max = Format::MAX_EXPONENT_BITS)]
    ExponentWidth(u32),
    #[error("significand width {0} is out of range 2..={max}", max = Format::MAX_SIGNIFICAND_BITS)]
    SignificandWidth(u32),
    #[error("packed width {0} does not fit in 64 bits")]
    PackedWidth(u32),
}

/// Binary interchange layout: `E` exponent bits and `P` significand bits,
/// the implicit bit included. Packed values live in the low `E + P` bits of a `u64`.
///
/// All masks are derived from the two widths, so a `Format` that passed
/// [`Format::new`] is always self-consistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Format {
    exponent_bits: u32,
    significand_bits: u32,
}

impl Format {
    pub const MAX_EXPONENT_BITS: u32 = 16;
    /// Extended mantissa (`P + 3` bits) plus the carry headroom bit must stay
    /// clear of the `i64` sign bit.
    pub const MAX_SIGNIFICAND_BITS: u32 = 58;

    pub const fn new(exponent_bits: u32, significand_bits: u32) -> Result<Self, FormatError> {
        if exponent_bits < 2 || exponent_bits > Self::MAX_EXPONENT_BITS {
            return Err(FormatError::ExponentWidth(exponent_bits));
        }
        if significand_bits < 2 || significand_bits > Self::MAX_SIGNIFICAND_BITS {
            return Err(FormatError::SignificandWidth(significand_bits));
        }
        if exponent_bits + significand_bits > 64 {
            return Err(FormatError::PackedWidth(exponent_bits + significand_bits));
        }
        Ok(Self {
            exponent_bits,
            significand_bits,
        })
    }

    #[inline]
    pub const fn exponent_bits(self) -> u32 {
        self.exponent_bits
    }

    #[inline]
    pub const fn significand_bits(self) -> u32 {
        self.significand_bits
    }

    #[inline]
    pub const fn width(self) -> u32 {
        self.exponent_bits + self.significand_bits
    }

    /// All-ones biased exponent, the NaN/infinity marker.
    #[inline]
    pub const fn exponent_mask(self) -> i32 {
        (1 << self.exponent_bits) - 1
    }

    #[inline]
    pub const fn fraction_mask(self) -> u64 {
        (1 << (self.significand_bits - 1)) - 1
    }

    #[inline]
    pub const fn bias(self) -> i32 {
        (1 << (self.exponent_bits - 1)) - 1
    }

    #[inline]
    pub const fn sign_shift(self) -> u32 {
        self.width() - 1
    }

    #[inline]
    pub const fn implicit_bit(self) -> u64 {
        1 << (self.significand_bits - 1)
    }

    /// Most significant fraction bit; set on quiet NaNs.
    #[inline]
    pub const fn quiet_bit(self) -> u64 {
        1 << (self.significand_bits - 2)
    }

    /// Beyond this distance every mantissa bit has already been folded into the sticky bit.
    #[inline]
    pub const fn max_align_shift(self) -> u32 {
        self.significand_bits + 2
    }

    /// Mask covering every bit of a packed value.
    #[inline]
    pub const fn value_mask(self) -> u64 {
        u64::MAX >> (64 - self.width())
    }

    pub fn name(self) -> Option<&'static str> {
        Self::PRESETS
            .iter()
            .find(|(_, format)| *format == self)
            .map(|(name, _)| *name)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::PRESETS
            .iter()
            .find(|(preset, _)| preset.eq_ignore_ascii_case(name))
            .map(|(_, format)| *format)
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(
                f,
                "{} (E={}, P={})",
                name, self.exponent_bits, self.significand_bits
            ),
            None => write!(f, "E={}, P={}", self.exponent_bits, self.significand_bits),
        }
    }
}

pub mod format_config {
    use super::Format;

    macro_rules! format_presets {
        (
            $(
                @item
                $name:ident => {
                    label: $label:literal,
                    exponent: $exponent:literal,
                    significand: $significand:literal,
                }
            ),* $(,)?
        ) => {
            $(
                pub const $name: Format = match Format::new($exponent, $significand) {
                    Ok(format) => format,
                    Err(_) => panic!(concat!("invalid format preset `", $label, "`")),
                };
            )*

            impl Format {
                pub const PRESETS: &'static [(&'static str, Format)] = &[$(($label, $name)),*];
            }
        };
    }

    format_presets! {
        @item HALF => {
            label: "half",
            exponent: 5,
            significand: 11,
        },
        @item BFLOAT16 => {
            label: "bfloat16",
            exponent: 8,
            significand: 8,
        },
        @item SINGLE => {
            label: "single",
            exponent: 8,
            significand: 24,
        },
        @item DOUBLE => {
            label: "double",
            exponent: 11,
            significand: 53,
        },
    }
}

/// Sign given to a sum that cancels to exactly zero.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "native-cli", derive(clap::ValueEnum))]
pub enum ZeroSign {
    /// Always `+0`, whatever the operands and rounding mode.
    #[default]
    AlwaysPositive,
    /// IEEE 754 rules: `x + (-x)` is `-0` only when rounding toward negative,
    /// and zeros of equal sign keep their sign.
    Ieee,
}

/// Everything an adder needs, fixed for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AdderConfig {
    pub format: Format,
    pub rounding: RoundingMode,
    pub zero_sign: ZeroSign,
}

impl AdderConfig {
    pub const fn new(format: Format, rounding: RoundingMode) -> Self {
        Self {
            format,
            rounding,
            zero_sign: ZeroSign::AlwaysPositive,
        }
    }

    pub const fn with_zero_sign(mut self, zero_sign: ZeroSign) -> Self {
        self.zero_sign = zero_sign;
        self
    }
}

impl Default for AdderConfig {
    fn default() -> Self {
        Self::new(format_config::SINGLE, RoundingMode::NearestTiesToEven)
    }
}
