#![cfg(test)]
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;

use crate::{
    config::{AdderConfig, Format, ZeroSign},
    fpu::{RoundingMode, SoftAdder, apfloat},
};

pub(super) struct AddTester {
    rng: ChaCha12Rng,
    adder: SoftAdder,
}

impl AddTester {
    pub(super) fn new(config: AdderConfig) -> Self {
        Self {
            rng: ChaCha12Rng::seed_from_u64(0721),
            adder: SoftAdder::new(config),
        }
    }

    pub(super) fn with(format: Format, rounding: RoundingMode) -> Self {
        Self::new(AdderConfig::new(format, rounding))
    }

    fn format(&self) -> Format {
        self.adder.format()
    }

    pub(super) fn rand_pattern(&mut self) -> u64 {
        self.rng.random::<u64>() & self.format().value_mask()
    }

    pub(super) fn rand_finite(&mut self) -> u64 {
        loop {
            let bits = self.rand_pattern();
            if !self.adder.is_nan(bits) && !self.adder.is_inf(bits) {
                return bits;
            }
        }
    }

    pub(super) fn rand_subnormal(&mut self) -> u64 {
        let format = self.format();
        let fraction = self.rng.random_range(1..=format.fraction_mask());
        format.pack(self.rng.random(), 0, fraction)
    }

    /// A finite value whose exponent lies within `spread` of `exponent`,
    /// so sums and differences with it exercise cancellation.
    pub(super) fn rand_near(&mut self, exponent: i32, spread: i32) -> u64 {
        let format = self.format();
        let low = (exponent - spread).max(0);
        let high = (exponent + spread).min(format.exponent_mask() - 1);
        let exponent = self.rng.random_range(low..=high);
        let fraction = self.rng.random_range(0..=format.fraction_mask());
        format.pack(self.rng.random(), exponent, fraction)
    }

    pub(super) fn add(&self, x: u64, y: u64) -> u64 {
        self.adder.add(x, y)
    }

    pub(super) fn check_with(&self, x: u64, y: u64, expected: u64) {
        let got = self.adder.add(x, y);
        let format = self.format();
        assert_eq!(
            got,
            expected,
            "{x:#x} + {y:#x}: got [{}], expected [{}]",
            format.unpack(got),
            format.unpack(expected),
        );
    }

    /// Compares against `rustc_apfloat`. Sums beyond the finite range are
    /// skipped under directed rounding because the adder saturates to infinity there.
    pub(super) fn check_apfloat(&self, x: u64, y: u64) {
        let config = self.adder.config();
        let expected = apfloat::add(config.format, x, y, config.rounding)
            .expect("format has no rustc_apfloat counterpart");
        let got = self.adder.add(x, y);

        if self.adder.is_nan(got) && self.adder.is_nan(expected.value) {
            return;
        }
        if config.rounding != RoundingMode::NearestTiesToEven
            && apfloat::overflows(config.format, x, y) == Some(true)
        {
            return;
        }
        if config.zero_sign == ZeroSign::AlwaysPositive && got == 0 {
            let fields = config.format.unpack(expected.value);
            if fields.exponent == 0 && fields.fraction == 0 {
                return;
            }
        }
        self.check_with(x, y, expected.value);
    }

    pub(super) fn check_rand_apfloat(&mut self, iterations: usize) {
        for _ in 0..iterations {
            let (x, y) = (self.rand_pattern(), self.rand_pattern());
            self.check_apfloat(x, y);
        }
    }

    pub(super) fn check_rand_cancellation(&mut self, iterations: usize) {
        for _ in 0..iterations {
            let x = self.rand_near(1, 3);
            let y = self.format().negate(self.rand_near(1, 3));
            self.check_apfloat(x, y);
        }
    }
}

mod tests {
    use super::*;
    use crate::config::format_config::{DOUBLE, HALF, SINGLE};

    #[test]
    fn test_commutativity() {
        for rounding in RoundingMode::ALL {
            let mut tester = AddTester::with(SINGLE, rounding);
            for _ in 0..50_000 {
                let (x, y) = (tester.rand_pattern(), tester.rand_pattern());
                let forward = tester.add(x, y);
                if tester.adder.is_nan(forward) {
                    continue;
                }
                tester.check_with(y, x, forward);
            }
        }
    }

    #[test]
    fn test_identity() {
        let mut tester = AddTester::with(SINGLE, RoundingMode::NearestTiesToEven);
        for _ in 0..50_000 {
            let x = tester.rand_finite();
            if x & SINGLE.fraction_mask() == 0 && SINGLE.unpack(x).exponent == 0 {
                continue;
            }
            tester.check_with(x, 0, x);
            tester.check_with(0, x, x);
        }
        let subnormal = tester.rand_subnormal();
        tester.check_with(subnormal, 0, subnormal);
    }

    #[test]
    fn test_infinity_absorption_and_nan() {
        let mut tester = AddTester::with(DOUBLE, RoundingMode::TowardZero);
        let inf = DOUBLE.infinity(false);
        let nan = DOUBLE.canonical_nan();
        for _ in 0..1_000 {
            let x = tester.rand_finite();
            tester.check_with(inf, x, inf);
            tester.check_with(x, DOUBLE.infinity(true), DOUBLE.infinity(true));
            tester.check_with(x, f64::NAN.to_bits(), nan);
            tester.check_with(0xfff0_0000_dead_beef, x, nan);
        }
        tester.check_with(inf, DOUBLE.infinity(true), nan);
        tester.check_with(inf, inf, inf);
    }

    #[test]
    fn test_single_matches_native() {
        let mut tester = AddTester::with(SINGLE, RoundingMode::NearestTiesToEven);
        for _ in 0..200_000 {
            let (x, y) = (tester.rand_pattern(), tester.rand_pattern());
            let expected = f32::from_bits(x as u32) + f32::from_bits(y as u32);
            let got = f32::from_bits(tester.add(x, y) as u32);
            assert!(
                got == expected || (got.is_nan() && expected.is_nan()),
                "{x:#x} + {y:#x}: got {got:e}, expected {expected:e}"
            );
        }
    }

    #[test]
    fn test_double_matches_native() {
        let mut tester = AddTester::with(DOUBLE, RoundingMode::NearestTiesToEven);
        for _ in 0..200_000 {
            let (x, y) = (tester.rand_pattern(), tester.rand_pattern());
            let expected = f64::from_bits(x) + f64::from_bits(y);
            let got = f64::from_bits(tester.add(x, y));
            assert!(
                got == expected || (got.is_nan() && expected.is_nan()),
                "{x:#x} + {y:#x}: got {got:e}, expected {expected:e}"
            );
        }
    }

    #[test]
    fn test_all_modes_match_apfloat() {
        for format in [HALF, SINGLE, DOUBLE] {
            for rounding in RoundingMode::ALL {
                let mut tester = AddTester::with(format, rounding);
                tester.check_rand_apfloat(50_000);
                tester.check_rand_cancellation(10_000);
            }
        }
    }

    #[test]
    fn test_overflow_in_every_mode() {
        for format in [HALF, SINGLE, DOUBLE] {
            for rounding in RoundingMode::ALL {
                let tester = AddTester::with(format, rounding);
                for sign in [false, true] {
                    let max = format.max_finite(sign);
                    let below_max = format.pack(sign, format.exponent_mask() - 1, 1);
                    tester.check_apfloat(max, max);
                    tester.check_apfloat(max, below_max);
                    if rounding != RoundingMode::NearestTiesToEven {
                        tester.check_with(max, max, format.infinity(sign));
                    }
                }
            }
        }
    }

    #[test]
    fn test_ieee_zero_sign_matches_apfloat() {
        for rounding in RoundingMode::ALL {
            let config = AdderConfig::new(HALF, rounding).with_zero_sign(ZeroSign::Ieee);
            let mut tester = AddTester::new(config);
            for _ in 0..20_000 {
                let x = tester.rand_near(1, 2);
                tester.check_apfloat(x, HALF.negate(x));
                tester.check_apfloat(x, x);
            }
            tester.check_apfloat(HALF.zero(true), HALF.zero(true));
            tester.check_apfloat(HALF.zero(true), HALF.zero(false));
        }
    }
}
