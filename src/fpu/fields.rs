use std::fmt::{self, Display};

use crate::config::Format;

/// A packed value split into its stored fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fields {
    pub sign: bool,
    /// Biased exponent as stored, `0..=exponent_mask`.
    pub exponent: i32,
    /// Stored fraction, implicit bit excluded.
    pub fraction: u64,
}

impl Display for Fields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sign={} exponent={:#x} fraction={:#x}",
            self.sign as u8, self.exponent, self.fraction
        )
    }
}

impl Format {
    /// Splits a packed value. Bits above the format width are ignored.
    pub fn unpack(self, bits: u64) -> Fields {
        Fields {
            sign: (bits >> self.sign_shift()) & 1 != 0,
            exponent: (bits >> (self.significand_bits() - 1)) as i32 & self.exponent_mask(),
            fraction: bits & self.fraction_mask(),
        }
    }

    /// Packs the fields, truncating each one to its width first.
    pub fn pack(self, sign: bool, exponent: i32, fraction: u64) -> u64 {
        ((sign as u64) << self.sign_shift())
            | (((exponent & self.exponent_mask()) as u64) << (self.significand_bits() - 1))
            | (fraction & self.fraction_mask())
    }

    pub fn pack_fields(self, fields: Fields) -> u64 {
        self.pack(fields.sign, fields.exponent, fields.fraction)
    }

    /// The only NaN an addition ever produces.
    pub fn canonical_nan(self) -> u64 {
        self.pack(false, -1, 1)
    }

    pub fn infinity(self, sign: bool) -> u64 {
        self.pack(sign, -1, 0)
    }

    pub fn zero(self, sign: bool) -> u64 {
        self.pack(sign, 0, 0)
    }

    pub fn one(self, sign: bool) -> u64 {
        self.pack(sign, self.bias(), 0)
    }

    pub fn max_finite(self, sign: bool) -> u64 {
        self.pack(sign, self.exponent_mask() - 1, self.fraction_mask())
    }

    pub fn min_normal(self, sign: bool) -> u64 {
        self.pack(sign, 1, 0)
    }

    pub fn min_subnormal(self, sign: bool) -> u64 {
        self.pack(sign, 0, 1)
    }

    pub fn negate(self, bits: u64) -> u64 {
        (bits ^ (1 << self.sign_shift())) & self.value_mask()
    }

    /// Scaled composition: `mantissa × 2^(exponent - bias - (P - 1))`, signed.
    ///
    /// Exact as long as the result lies in the normal range of `f64`, which
    /// holds for every format up to 8 exponent bits.
    pub fn scale(self, sign: bool, exponent: i32, mantissa: u64) -> f64 {
        let fraction_bits = self.significand_bits() as i32 - 1;
        let magnitude =
            mantissa as f64 * 2f64.powi(-fraction_bits) * 2f64.powi(exponent - self.bias());
        if sign { -magnitude } else { magnitude }
    }
}
