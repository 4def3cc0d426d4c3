use crate::{config::Format, fpu::Classification};

impl Format {
    #[inline]
    pub fn is_nan(self, exponent: i32, fraction: u64) -> bool {
        exponent == self.exponent_mask() && fraction != 0
    }

    #[inline]
    pub fn is_inf(self, exponent: i32, fraction: u64) -> bool {
        exponent == self.exponent_mask() && fraction == 0
    }

    /// True for subnormals and for both zeros: the implicit bit is absent.
    #[inline]
    pub fn is_subnormal(self, exponent: i32) -> bool {
        exponent == 0
    }

    /// Significand with the implicit bit made explicit.
    #[inline]
    pub fn true_mantissa(self, exponent: i32, fraction: u64) -> u64 {
        if self.is_subnormal(exponent) {
            fraction
        } else {
            self.implicit_bit() | fraction
        }
    }

    pub fn classify(self, bits: u64) -> Classification {
        let fields = self.unpack(bits);
        let negative = fields.sign;

        if self.is_nan(fields.exponent, fields.fraction) {
            if fields.fraction & self.quiet_bit() != 0 {
                Classification::QuietNaN
            } else {
                Classification::SignalingNaN
            }
        } else if self.is_inf(fields.exponent, fields.fraction) {
            if negative {
                Classification::NegativeInfinity
            } else {
                Classification::PositiveInfinity
            }
        } else if !self.is_subnormal(fields.exponent) {
            if negative {
                Classification::NormalNegative
            } else {
                Classification::NormalPositive
            }
        } else if fields.fraction == 0 {
            if negative {
                Classification::NegativeZero
            } else {
                Classification::PositiveZero
            }
        } else if negative {
            Classification::SubnormalNegative
        } else {
            Classification::SubnormalPositive
        }
    }
}
