//! Bridge to `rustc_apfloat`, used as an independent reference adder for
//! every rounding mode, and as a decimal parser/printer for the presets it
//! knows about.

use rustc_apfloat::{
    Float, ParseError, Round as APFloatRound, Status, StatusAnd,
    ieee::{Double, Half, Single},
};

use crate::{
    config::{Format, format_config},
    fpu::RoundingMode,
};

impl From<RoundingMode> for APFloatRound {
    fn from(value: RoundingMode) -> Self {
        match value {
            RoundingMode::NearestTiesToEven => APFloatRound::NearestTiesToEven,
            RoundingMode::TowardNegative => APFloatRound::TowardNegative,
            RoundingMode::TowardPositive => APFloatRound::TowardPositive,
            RoundingMode::TowardZero => APFloatRound::TowardZero,
        }
    }
}

/// Adds two packed values of format `F` with `rustc_apfloat`.
pub fn add_as<F: Float>(x: u64, y: u64, round: RoundingMode) -> StatusAnd<u64> {
    let a = F::from_bits(x as u128);
    let b = F::from_bits(y as u128);
    let StatusAnd { status, value } = a.add_r(b, round.into());
    status.and(value.to_bits() as u64)
}

/// Whether the exact sum of two finite values lies beyond the finite range
/// of `F`. Decided under ties-to-even, the only mode in which `rustc_apfloat`
/// flags every such sum: directed modes that clamp to the largest finite value
/// report only `INEXACT`.
pub fn exceeds_range<F: Float>(x: u64, y: u64) -> bool {
    add_as::<F>(x, y, RoundingMode::NearestTiesToEven)
        .status
        .contains(Status::OVERFLOW)
}

/// Signature shared by every per-format reference adder.
pub type ReferenceAdd = fn(u64, u64, RoundingMode) -> StatusAnd<u64>;

/// Reference adder for `format`, if `rustc_apfloat` models it.
pub fn reference_for(format: Format) -> Option<ReferenceAdd> {
    if format == format_config::HALF {
        Some(add_as::<Half> as ReferenceAdd)
    } else if format == format_config::SINGLE {
        Some(add_as::<Single> as ReferenceAdd)
    } else if format == format_config::DOUBLE {
        Some(add_as::<Double> as ReferenceAdd)
    } else {
        None
    }
}

pub fn add(format: Format, x: u64, y: u64, round: RoundingMode) -> Option<StatusAnd<u64>> {
    reference_for(format).map(|reference| reference(x, y, round))
}

/// [`exceeds_range`] for a runtime format.
pub fn overflows(format: Format, x: u64, y: u64) -> Option<bool> {
    add(format, x, y, RoundingMode::NearestTiesToEven)
        .map(|sum| sum.status.contains(Status::OVERFLOW))
}

fn parse_as<F: Float>(literal: &str) -> Result<u64, ParseError> {
    literal.parse::<F>().map(|f| f.to_bits() as u64)
}

/// Parses a decimal literal into a packed value, rounding to nearest.
/// `None` when the format has no `rustc_apfloat` counterpart.
pub fn parse_decimal(format: Format, literal: &str) -> Option<Result<u64, ParseError>> {
    if format == format_config::HALF {
        Some(parse_as::<Half>(literal))
    } else if format == format_config::SINGLE {
        Some(parse_as::<Single>(literal))
    } else if format == format_config::DOUBLE {
        Some(parse_as::<Double>(literal))
    } else {
        None
    }
}

/// Decimal rendering of a packed value, when the format is known to `rustc_apfloat`.
pub fn display(format: Format, bits: u64) -> Option<String> {
    let bits = bits as u128;
    if format == format_config::HALF {
        Some(Half::from_bits(bits).to_string())
    } else if format == format_config::SINGLE {
        Some(Single::from_bits(bits).to_string())
    } else if format == format_config::DOUBLE {
        Some(Double::from_bits(bits).to_string())
    } else {
        None
    }
}
