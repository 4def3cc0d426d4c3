use std::{
    fmt::{Debug, Display},
    ops::*,
};

use crate::config::{Format, format_config};

/// Shift right, OR-ing every bit shifted away into bit 0 so a rounder can
/// still tell the value was inexact.
pub fn shift_right_sticky(value: i64, shift: u32) -> i64 {
    debug_assert!(value >= 0 && shift < i64::BITS - 1);
    let lost = value & ((1i64 << shift) - 1);
    (value >> shift) | (lost != 0) as i64
}

pub trait TruncateFrom<T>: Sized {
    fn truncate_from(value: T) -> Self;
}

macro_rules! impl_truncate_from {
    ($from:ty, $to:ty) => {
        impl TruncateFrom<$from> for $to {
            fn truncate_from(val: $from) -> Self {
                val as $to
            }
        }
    };
}

impl_truncate_from!(u64, u32);
impl_truncate_from!(u64, u64);

pub trait InBits<U> {
    fn from_bits(x: U) -> Self;
    fn to_bits(self) -> U;
}

impl InBits<u32> for f32 {
    #[inline]
    fn from_bits(x: u32) -> Self {
        f32::from_bits(x)
    }

    #[inline]
    fn to_bits(self) -> u32 {
        self.to_bits()
    }
}

impl InBits<u64> for f64 {
    #[inline]
    fn from_bits(x: u64) -> Self {
        f64::from_bits(x)
    }

    #[inline]
    fn to_bits(self) -> u64 {
        self.to_bits()
    }
}

/// A host float type whose layout matches one of the [`format_config`] presets.
pub trait NativeFloat:
    Add<Output = Self> + PartialEq + Copy + Debug + Display + InBits<Self::BitsType>
{
    type BitsType: Copy + Into<u64> + TruncateFrom<u64>;

    const FORMAT: Format;
    const NAME: &'static str;

    #[inline]
    fn to_packed(self) -> u64 {
        self.to_bits().into()
    }

    #[inline]
    fn from_packed(bits: u64) -> Self {
        Self::from_bits(Self::BitsType::truncate_from(bits))
    }
}

impl NativeFloat for f32 {
    type BitsType = u32;

    const FORMAT: Format = format_config::SINGLE;
    const NAME: &'static str = "f32";
}

impl NativeFloat for f64 {
    type BitsType = u64;

    const FORMAT: Format = format_config::DOUBLE;
    const NAME: &'static str = "f64";
}
