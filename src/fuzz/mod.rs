//! Randomized and targeted comparison of [`SoftAdder`](crate::fpu::SoftAdder)
//! against an independent reference adder.

mod harness;

use rand::{RngCore, SeedableRng, rand_core::impls::fill_bytes_via_next};

use crate::config::Format;

pub use harness::{Expected, FuzzHarness, FuzzReport, HarnessError, Mismatch, Oracle, Verdict};

const MULTIPLIER: u128 = (0xc580_cadd_u128 << 64) | 0x754f_7336_d2ea_a27d;

/// 128-bit linear congruential generator producing raw bit patterns.
///
/// Every step computes `state = state * M + M` and hands out the top bits,
/// so a given seed always yields the same operand stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lcg128 {
    state: u128,
}

impl Lcg128 {
    pub const fn new(seed: u128) -> Self {
        Self { state: seed }
    }

    /// Top `width` bits of the next state, `1 <= width <= 64`.
    pub fn next_bits(&mut self, width: u32) -> u64 {
        debug_assert!((1..=64).contains(&width));
        self.state = self.state.wrapping_mul(MULTIPLIER).wrapping_add(MULTIPLIER);
        (self.state >> (128 - width)) as u64
    }

    /// A packed value of `format`, uniformly over all bit patterns.
    pub fn next_pattern(&mut self, format: Format) -> u64 {
        self.next_bits(format.width())
    }
}

impl Default for Lcg128 {
    fn default() -> Self {
        Self::new(0)
    }
}

impl RngCore for Lcg128 {
    fn next_u32(&mut self) -> u32 {
        self.next_bits(32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.next_bits(64)
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        fill_bytes_via_next(self, dst)
    }
}

impl SeedableRng for Lcg128 {
    type Seed = [u8; 16];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::new(u128::from_le_bytes(seed))
    }
}

/// A hand-picked operand pair exercising one edge of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryCase {
    pub name: &'static str,
    pub x: u64,
    pub y: u64,
}

/// Packed `2^exponent`, normal or subnormal, if the format can hold it exactly.
fn power_of_two(format: Format, exponent: i32) -> Option<u64> {
    let biased = exponent + format.bias();
    if biased >= format.exponent_mask() {
        return None;
    }
    if biased >= 1 {
        return Some(format.pack(false, biased, 0));
    }
    let shift = biased + format.significand_bits() as i32 - 2;
    (shift >= 0).then(|| format.pack(false, 0, 1 << shift))
}

/// Edge cases every adder must get right, for any format. The ties around one
/// are left out when half an ulp of one is not representable.
pub fn boundary_cases(format: Format) -> Vec<BoundaryCase> {
    let case = |name, x, y| BoundaryCase { name, x, y };
    let one = format.one(false);

    let mut cases = vec![
        case(
            "max finite + max finite",
            format.max_finite(false),
            format.max_finite(false),
        ),
        case(
            "-max finite + -max finite",
            format.max_finite(true),
            format.max_finite(true),
        ),
        case(
            "min subnormal + its negation",
            format.min_subnormal(false),
            format.min_subnormal(true),
        ),
        case(
            "subnormals summing into the normal range",
            format.pack(false, 0, format.fraction_mask()),
            format.min_subnormal(false),
        ),
        case(
            "near-equal normals cancelling into the subnormal range",
            format.pack(false, 2, 0),
            format.pack(true, 1, format.fraction_mask()),
        ),
        case(
            "min normal - min subnormal",
            format.min_normal(false),
            format.min_subnormal(true),
        ),
    ];

    if let Some(half_ulp_of_one) = power_of_two(format, -(format.significand_bits() as i32)) {
        cases.extend([
            case("1 + half ulp (tie, even)", one, half_ulp_of_one),
            case(
                "(1 + ulp) + half ulp (tie, odd)",
                format.pack(false, format.bias(), 1),
                half_ulp_of_one,
            ),
            case(
                "largest below 2 + half ulp (rounding carry)",
                format.pack(false, format.bias(), format.fraction_mask()),
                half_ulp_of_one,
            ),
        ]);
    }

    cases.extend([
        case("1 + -1", one, format.one(true)),
        case("-0 + -0", format.zero(true), format.zero(true)),
        case("inf + -inf", format.infinity(false), format.infinity(true)),
        case("inf + max finite", format.infinity(false), format.max_finite(true)),
        case("nan + 1", format.pack(true, -1, format.quiet_bit()), one),
    ]);
    cases
}
