use crate::{
    config::{AdderConfig, Format, ZeroSign, format_config},
    fpu::{Fields, RoundingMode},
    utils::{NativeFloat, shift_right_sticky},
};

// Low bits of an extended mantissa.
const LSB: i64 = 0b1000;
const G: i64 = 0b0100;
const R: i64 = 0b0010;
const S: i64 = 0b0001;

const GRS_BITS: u32 = 3;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddError {
    #[error("adder is configured for {adder}, but {native} operands were supplied")]
    FormatMismatch { adder: Format, native: &'static str },
}

/// Working form of one operand: effective exponent (subnormals count as 1)
/// and the true mantissa shifted left over guard, round and sticky bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Extended {
    sign: bool,
    exponent: i32,
    mantissa: i64,
}

/// Bit position of the implicit one inside an extended mantissa.
#[inline]
fn implied_bit(format: Format) -> i64 {
    1 << (format.significand_bits() - 1 + GRS_BITS)
}

/// One above [`implied_bit`]; set by the carry out of an addition.
#[inline]
fn overflow_bit(format: Format) -> i64 {
    implied_bit(format) << 1
}

/// Integer-only IEEE 754 adder for one format and rounding policy.
///
/// The adder holds nothing but its configuration, so it can be shared
/// freely between threads.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SoftAdder {
    config: AdderConfig,
}

impl SoftAdder {
    pub const fn new(config: AdderConfig) -> Self {
        Self { config }
    }

    pub const fn single(rounding: RoundingMode) -> Self {
        Self::new(AdderConfig::new(format_config::SINGLE, rounding))
    }

    pub const fn double(rounding: RoundingMode) -> Self {
        Self::new(AdderConfig::new(format_config::DOUBLE, rounding))
    }

    pub fn config(&self) -> AdderConfig {
        self.config
    }

    pub fn format(&self) -> Format {
        self.config.format
    }

    pub fn is_nan(&self, x: u64) -> bool {
        let Fields {
            exponent, fraction, ..
        } = self.format().unpack(x);
        self.format().is_nan(exponent, fraction)
    }

    pub fn is_inf(&self, x: u64) -> bool {
        let Fields {
            exponent, fraction, ..
        } = self.format().unpack(x);
        self.format().is_inf(exponent, fraction)
    }

    pub fn is_subnormal(&self, x: u64) -> bool {
        self.format().is_subnormal(self.format().unpack(x).exponent)
    }

    /// Adds two packed values. Defined for every bit pattern; bits above the
    /// format width are ignored.
    pub fn add(&self, x: u64, y: u64) -> u64 {
        let format = self.format();
        let x_fields = format.unpack(x);
        let y_fields = format.unpack(y);

        if let Some(special) = self.special_sum(x, x_fields, y, y_fields) {
            log::trace!("{x:#x} + {y:#x}: special operand, result {special:#x}");
            return special;
        }

        let (x_ext, y_ext) = self.align(x_fields, y_fields);
        let Some(sum) = self.combine(x_ext, y_ext) else {
            return self.zero_sum(x_fields.sign, y_fields.sign);
        };
        let (exponent, mantissa) = self.round(sum);
        self.assemble(sum.sign, exponent, mantissa)
    }

    /// [`SoftAdder::add`] on host floats of the matching layout.
    pub fn add_native<F: NativeFloat>(&self, x: F, y: F) -> Result<F, AddError> {
        if self.format() != F::FORMAT {
            return Err(AddError::FormatMismatch {
                adder: self.format(),
                native: F::NAME,
            });
        }
        Ok(F::from_packed(self.add(x.to_packed(), y.to_packed())))
    }

    /// NaN and infinity operands never reach the arithmetic stages.
    fn special_sum(&self, x: u64, x_fields: Fields, y: u64, y_fields: Fields) -> Option<u64> {
        let format = self.format();

        if format.is_nan(x_fields.exponent, x_fields.fraction)
            || format.is_nan(y_fields.exponent, y_fields.fraction)
        {
            return Some(format.canonical_nan());
        }

        match (
            format.is_inf(x_fields.exponent, x_fields.fraction),
            format.is_inf(y_fields.exponent, y_fields.fraction),
        ) {
            (false, false) => None,
            (true, false) => Some(x & format.value_mask()),
            (false, true) => Some(y & format.value_mask()),
            (true, true) if x_fields.sign == y_fields.sign => Some(x & format.value_mask()),
            (true, true) => Some(format.canonical_nan()),
        }
    }

    fn extend(&self, fields: Fields) -> Extended {
        let mantissa = self.format().true_mantissa(fields.exponent, fields.fraction) as i64;
        Extended {
            sign: fields.sign,
            exponent: fields.exponent.max(1),
            mantissa: mantissa << GRS_BITS,
        }
    }

    /// Brings both operands to the larger exponent.
    fn align(&self, x_fields: Fields, y_fields: Fields) -> (Extended, Extended) {
        let mut x = self.extend(x_fields);
        let mut y = self.extend(y_fields);
        let limit = self.format().max_align_shift();

        let shift = x.exponent - y.exponent;
        if shift > 0 {
            y.mantissa = shift_right_sticky(y.mantissa, shift.unsigned_abs().min(limit));
            y.exponent = x.exponent;
        } else if shift < 0 {
            x.mantissa = shift_right_sticky(x.mantissa, shift.unsigned_abs().min(limit));
            x.exponent = y.exponent;
        }

        debug_assert_eq!(x.exponent, y.exponent);
        (x, y)
    }

    /// Signed mantissa sum, renormalized so the implied bit is set.
    /// `None` when the operands cancel exactly.
    fn combine(&self, x: Extended, y: Extended) -> Option<Extended> {
        let format = self.format();

        let mut mantissa = if x.sign != y.sign {
            x.mantissa - y.mantissa
        } else {
            x.mantissa + y.mantissa
        };
        if mantissa == 0 {
            return None;
        }

        let mut sign = x.sign;
        if mantissa < 0 {
            mantissa = -mantissa;
            sign = !sign;
        }

        let mut exponent = x.exponent;
        if mantissa & overflow_bit(format) != 0 {
            mantissa = (mantissa >> 1) | (mantissa & S);
            exponent += 1;
        }

        while mantissa & implied_bit(format) == 0 {
            mantissa <<= 1;
            exponent -= 1;
        }

        Some(Extended {
            sign,
            exponent,
            mantissa,
        })
    }

    fn zero_sum(&self, x_sign: bool, y_sign: bool) -> u64 {
        let sign = match self.config.zero_sign {
            ZeroSign::AlwaysPositive => false,
            ZeroSign::Ieee if x_sign == y_sign => x_sign,
            ZeroSign::Ieee => self.config.rounding == RoundingMode::TowardNegative,
        };
        self.format().zero(sign)
    }

    /// Applies the rounding policy and drops the guard, round and sticky bits.
    /// Returns the biased exponent and a `P`-bit mantissa with the implied bit set.
    fn round(&self, sum: Extended) -> (i32, u64) {
        let Extended {
            sign,
            mut exponent,
            mut mantissa,
        } = sum;

        let inexact = mantissa & (G | R | S) != 0;
        let round_up = match self.config.rounding {
            RoundingMode::NearestTiesToEven => mantissa & G != 0 && mantissa & (R | S | LSB) != 0,
            RoundingMode::TowardNegative => sign && inexact,
            RoundingMode::TowardPositive => !sign && inexact,
            RoundingMode::TowardZero => false,
        };
        if round_up {
            mantissa += LSB;
        }

        let significand_bits = self.format().significand_bits();
        let mut mantissa = (mantissa >> GRS_BITS) as u64;
        if mantissa & (1 << significand_bits) != 0 {
            // Rounding carried into the next binade.
            mantissa >>= 1;
            exponent += 1;
        }

        debug_assert!(
            mantissa & (1 << (significand_bits - 1)) != 0,
            "implied bit lost while rounding {sum:?}"
        );
        (exponent, mantissa)
    }

    /// Packs a rounded result, saturating to infinity above the largest
    /// binade and denormalizing below the smallest.
    fn assemble(&self, sign: bool, exponent: i32, mantissa: u64) -> u64 {
        let format = self.format();

        if exponent >= format.exponent_mask() {
            return format.infinity(sign);
        }
        if exponent >= 1 {
            return format.pack(sign, exponent, mantissa);
        }

        // A sum in the subnormal range is a multiple of the smallest
        // subnormal, so nothing is shifted out here.
        let shift = (1 - exponent) as u32;
        debug_assert!(
            mantissa.trailing_zeros() >= shift,
            "inexact denormalization of {mantissa:#x} by {shift}"
        );
        log::trace!("denormalizing {mantissa:#x} by {shift}");
        format.pack(sign, 0, mantissa.checked_shr(shift).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::format_config::{BFLOAT16, DOUBLE, HALF, SINGLE};

    fn adder(rounding: RoundingMode) -> SoftAdder {
        SoftAdder::single(rounding)
    }

    fn add_f32(rounding: RoundingMode, x: u32, y: u32) -> u32 {
        adder(rounding).add(x as u64, y as u64) as u32
    }

    #[test]
    fn test_simple_arith() {
        let adder = adder(RoundingMode::NearestTiesToEven);
        assert_eq!(adder.add_native(2.0f32, 3.0f32), Ok(5.0f32));
        assert_eq!(adder.add_native(3.0f32, -1.0f32), Ok(2.0f32));
        assert_eq!(adder.add_native(-1.0f32, 3.0f32), Ok(2.0f32));
        assert_eq!(adder.add_native(1.5f32, 0.25f32), Ok(1.75f32));
        assert_eq!(adder.add_native(-1.5f32, -0.25f32), Ok(-1.75f32));
        assert_eq!(adder.add_native(1.0f32, -1.75f32), Ok(-0.75f32));

        let double = SoftAdder::double(RoundingMode::NearestTiesToEven);
        assert_eq!(double.add_native(0.1f64, 0.2f64), Ok(0.1f64 + 0.2f64));
    }

    #[test]
    fn test_format_mismatch() {
        let adder = adder(RoundingMode::NearestTiesToEven);
        assert_eq!(
            adder.add_native(1.0f64, 1.0f64),
            Err(AddError::FormatMismatch {
                adder: SINGLE,
                native: "f64",
            })
        );
    }

    #[test]
    fn test_special_values() {
        let rtne = RoundingMode::NearestTiesToEven;
        let one = 0x3f80_0000;
        let inf = 0x7f80_0000;
        let neg_inf = 0xff80_0000;

        assert_eq!(add_f32(rtne, 0x7fc0_1234, one), 0x7f80_0001);
        assert_eq!(add_f32(rtne, one, 0xff80_0001), 0x7f80_0001);
        assert_eq!(add_f32(rtne, inf, one), inf);
        assert_eq!(add_f32(rtne, one, neg_inf), neg_inf);
        assert_eq!(add_f32(rtne, inf, inf), inf);
        assert_eq!(add_f32(rtne, neg_inf, neg_inf), neg_inf);
        assert_eq!(add_f32(rtne, inf, neg_inf), 0x7f80_0001);
        assert_eq!(add_f32(rtne, neg_inf, 0x7f80_0002), 0x7f80_0001);
    }

    #[test]
    fn test_predicates_on_packed_values() {
        let adder = adder(RoundingMode::NearestTiesToEven);
        assert!(adder.is_nan(0x7fc0_0000));
        assert!(!adder.is_nan(0x7f80_0000));
        assert!(adder.is_inf(0xff80_0000));
        assert!(adder.is_subnormal(0x8000_0001));
        assert!(adder.is_subnormal(0));
        assert!(!adder.is_subnormal(0x0080_0000));
    }

    #[test]
    fn test_rounding_policies() {
        // 1.0 + 2^-24 is exactly halfway between 1.0 and its successor.
        let one = 0x3f80_0000;
        let half_ulp = 0x3380_0000;
        let neg = |bits: u32| bits | 0x8000_0000;

        assert_eq!(add_f32(RoundingMode::NearestTiesToEven, one, half_ulp), one);
        assert_eq!(add_f32(RoundingMode::TowardZero, one, half_ulp), one);
        assert_eq!(add_f32(RoundingMode::TowardNegative, one, half_ulp), one);
        assert_eq!(
            add_f32(RoundingMode::TowardPositive, one, half_ulp),
            0x3f80_0001
        );

        assert_eq!(
            add_f32(RoundingMode::TowardNegative, neg(one), neg(half_ulp)),
            0xbf80_0001
        );
        assert_eq!(
            add_f32(RoundingMode::TowardPositive, neg(one), neg(half_ulp)),
            neg(one)
        );
        assert_eq!(
            add_f32(RoundingMode::TowardZero, neg(one), neg(half_ulp)),
            neg(one)
        );
    }

    #[test]
    fn test_ties_to_even() {
        let rtne = RoundingMode::NearestTiesToEven;
        let half_ulp = 0x3380_0000;

        // Odd retained value rounds up to even.
        assert_eq!(add_f32(rtne, 0x3f80_0001, half_ulp), 0x3f80_0002);
        // Even retained value stays.
        assert_eq!(add_f32(rtne, 0x3f80_0002, half_ulp), 0x3f80_0002);
        // Slightly above half rounds up.
        assert_eq!(add_f32(rtne, 0x3f80_0000, 0x3380_0001), 0x3f80_0001);
    }

    #[test]
    fn test_rounding_carry() {
        // (2 - 2^-23) + 2^-24 ties to the even neighbour 2.0, carrying into the next binade.
        assert_eq!(
            add_f32(RoundingMode::NearestTiesToEven, 0x3fff_ffff, 0x3380_0000),
            0x4000_0000
        );
        assert_eq!(
            add_f32(RoundingMode::TowardPositive, 0x3fff_ffff, 0x0000_0001),
            0x4000_0000
        );
        assert_eq!(
            add_f32(RoundingMode::TowardZero, 0x3fff_ffff, 0x3380_0000),
            0x3fff_ffff
        );
    }

    #[test]
    fn test_overflow_saturates() {
        for rounding in RoundingMode::ALL {
            assert_eq!(add_f32(rounding, 0x7f7f_ffff, 0x7f7f_ffff), 0x7f80_0000);
            assert_eq!(add_f32(rounding, 0xff7f_ffff, 0xff7f_ffff), 0xff80_0000);
        }
    }

    #[test]
    fn test_zero_results() {
        let rtne = RoundingMode::NearestTiesToEven;
        assert_eq!(add_f32(rtne, 0x0000_0001, 0x8000_0001), 0);
        assert_eq!(add_f32(rtne, 0x3f80_0000, 0xbf80_0000), 0);
        assert_eq!(add_f32(rtne, 0x8000_0000, 0x8000_0000), 0);
        assert_eq!(add_f32(RoundingMode::TowardNegative, 0x3f80_0000, 0xbf80_0000), 0);
    }

    #[test]
    fn test_ieee_zero_sign() {
        let ieee = |rounding| {
            SoftAdder::new(AdderConfig::new(SINGLE, rounding).with_zero_sign(ZeroSign::Ieee))
        };

        let down = ieee(RoundingMode::TowardNegative);
        assert_eq!(down.add(0x3f80_0000, 0xbf80_0000), 0x8000_0000);
        assert_eq!(down.add(0, 0x8000_0000), 0x8000_0000);
        assert_eq!(down.add(0, 0), 0);

        let nearest = ieee(RoundingMode::NearestTiesToEven);
        assert_eq!(nearest.add(0x3f80_0000, 0xbf80_0000), 0);
        assert_eq!(nearest.add(0x8000_0000, 0x8000_0000), 0x8000_0000);
        assert_eq!(nearest.add(0x8000_0000, 0), 0);
    }

    #[test]
    fn test_subnormals() {
        let rtne = RoundingMode::NearestTiesToEven;
        // Two subnormals summing into the normal range.
        assert_eq!(add_f32(rtne, 0x007f_ffff, 0x0000_0001), 0x0080_0000);
        assert_eq!(add_f32(rtne, 0x0040_0000, 0x0040_0000), 0x0080_0000);
        // Subnormal plus subnormal staying subnormal.
        assert_eq!(add_f32(rtne, 0x0000_0003, 0x0000_0004), 0x0000_0007);
        // Normal minus nearly equal normal, cancelling into the subnormal range.
        assert_eq!(add_f32(rtne, 0x0100_0000, 0x80ff_ffff), 0x0000_0001);
        assert_eq!(add_f32(rtne, 0x0080_0001, 0x8080_0000), 0x0000_0001);
        assert_eq!(add_f32(rtne, 0x8080_0000, 0x0000_0001), 0x807f_ffff);
    }

    #[test]
    fn test_large_exponent_gap() {
        let one = 0x3f80_0000;
        let tiny = 0x0000_0001;
        assert_eq!(add_f32(RoundingMode::NearestTiesToEven, one, tiny), one);
        assert_eq!(add_f32(RoundingMode::TowardPositive, one, tiny), 0x3f80_0001);
        assert_eq!(
            add_f32(RoundingMode::TowardNegative, one, tiny | 0x8000_0000),
            0x3f7f_ffff
        );
        assert_eq!(add_f32(RoundingMode::TowardZero, tiny, one), one);
    }

    #[test]
    fn test_other_formats() {
        let half = SoftAdder::new(AdderConfig::new(HALF, RoundingMode::NearestTiesToEven));
        // 1.0 + 1.0 = 2.0, 65504 + 65504 = inf
        assert_eq!(half.add(0x3c00, 0x3c00), 0x4000);
        assert_eq!(half.add(0x7bff, 0x7bff), 0x7c00);

        let bf16 = SoftAdder::new(AdderConfig::new(BFLOAT16, RoundingMode::NearestTiesToEven));
        // 1.0 + 0.5 = 1.5
        assert_eq!(bf16.add(0x3f80, 0x3f00), 0x3fc0);

        let double = SoftAdder::new(AdderConfig::new(DOUBLE, RoundingMode::TowardZero));
        assert_eq!(
            double.add(f64::MAX.to_bits(), f64::MAX.to_bits()),
            f64::INFINITY.to_bits()
        );
        assert_eq!(double.add(1, 1), 2);
    }

    #[test]
    fn test_assemble_matches_scaled_composition() {
        use rand::{Rng, SeedableRng};
        use rand_chacha::ChaCha12Rng;

        let mut rng = ChaCha12Rng::seed_from_u64(0721);
        for rounding in RoundingMode::ALL {
            let adder = adder(rounding);
            for _ in 0..20_000 {
                let x = rng.random::<u32>() as u64;
                let y = rng.random::<u32>() as u64;
                let x_fields = SINGLE.unpack(x);
                let y_fields = SINGLE.unpack(y);
                if adder.special_sum(x, x_fields, y, y_fields).is_some() {
                    continue;
                }
                let (x_ext, y_ext) = adder.align(x_fields, y_fields);
                let Some(sum) = adder.combine(x_ext, y_ext) else {
                    continue;
                };
                let (exponent, mantissa) = adder.round(sum);

                let packed = adder.assemble(sum.sign, exponent, mantissa) as u32;
                let scaled = SINGLE.scale(sum.sign, exponent, mantissa) as f32;
                assert_eq!(packed, scaled.to_bits(), "{x:#x} + {y:#x}");
            }
        }
    }
}
