//! Compile-time integer and float values.
//!
//! A [`CompIntegerValue`] is a tagged integer: the low bit of the
//! representation is 0 for inlined values and reserved 1 for a future
//! big-integer extension. Inlined values span −2^62 … 2^62−1; every
//! arithmetic operation faults fatally when a result leaves that range.
//! Division and modulus by zero report failure to the caller instead,
//! and bitwise operations require non-negative operands.
//!
//! [`CompFloatValue`] wraps an IEEE-754 double. Its arithmetic, and the
//! conversions between comp-integers and comp-floats, are deliberately
//! unimplemented.

use crate::diagnostics::fatal;

pub const COMP_INTEGER_MAX: i64 = (1 << 62) - 1;
pub const COMP_INTEGER_MIN: i64 = -(1 << 62);

/// Tagged compile-time integer. Low representation bit clear means the
/// value is inlined in the remaining 63 bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompIntegerValue(u64);

impl CompIntegerValue {
    pub const ZERO: CompIntegerValue = CompIntegerValue(0);

    fn is_inlined(self) -> bool {
        self.0 & 1 == 0
    }

    fn require_inlined(self) {
        if !self.is_inlined() {
            fatal(format_args!("unexpected non-inlined compile-time integer"));
        }
    }

    fn rep_i64(self) -> i64 {
        self.0 as i64
    }

    /// The inlined value.
    pub fn value(self) -> i64 {
        self.require_inlined();

        self.rep_i64() >> 1
    }

    pub fn to_bits(self) -> u64 {
        self.0
    }

    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub fn from_u64(value: u64) -> Self {
        if value > COMP_INTEGER_MAX as u64 {
            fatal(format_args!(
                "value {} exceeds the supported maximum compile-time integer {}",
                value, COMP_INTEGER_MAX
            ));
        }

        Self(value << 1)
    }

    pub fn from_s64(value: i64) -> Self {
        if !(COMP_INTEGER_MIN..=COMP_INTEGER_MAX).contains(&value) {
            fatal(format_args!(
                "value {} exceeds the supported range of compile-time integers",
                value
            ));
        }

        Self((value as u64) << 1)
    }

    /// Narrows to an unsigned `bits`-wide integer; `None` when the
    /// value is negative or does not fit.
    pub fn as_u64(self, bits: u8) -> Option<u64> {
        debug_assert!(bits <= 64);

        self.require_inlined();

        let value = self.value();

        if value < 0 {
            return None;
        }

        let value = value as u64;

        if bits != 64 && value >= 1u64 << bits {
            return None;
        }

        Some(value)
    }

    /// Narrows to a signed `bits`-wide integer; `None` when the value
    /// does not fit.
    pub fn as_s64(self, bits: u8) -> Option<i64> {
        debug_assert!(bits >= 1 && bits <= 64);

        self.require_inlined();

        let value = self.value();

        if bits == 64 {
            return Some(value);
        }

        if value < -(1i64 << (bits - 1)) || value >= 1i64 << (bits - 1) {
            return None;
        }

        Some(value)
    }

    pub fn add(self, rhs: Self) -> Self {
        self.require_inlined();
        rhs.require_inlined();

        // Both representations have the tag bit clear, so adding them
        // adds the shifted values; i64 overflow is exactly a range
        // overflow of the sum.
        match self.rep_i64().checked_add(rhs.rep_i64()) {
            Some(rep) => Self(rep as u64),
            None => fatal(format_args!(
                "sum of compile-time integers exceeds the supported range"
            )),
        }
    }

    pub fn sub(self, rhs: Self) -> Self {
        self.require_inlined();
        rhs.require_inlined();

        match self.rep_i64().checked_sub(rhs.rep_i64()) {
            Some(rep) => Self(rep as u64),
            None => fatal(format_args!(
                "difference of compile-time integers exceeds the supported range"
            )),
        }
    }

    pub fn mul(self, rhs: Self) -> Self {
        self.require_inlined();
        rhs.require_inlined();

        match self.rep_i64().checked_mul(rhs.value()) {
            Some(rep) => Self(rep as u64),
            None => fatal(format_args!(
                "product of compile-time integers exceeds the supported range"
            )),
        }
    }

    /// `None` when `rhs` is zero.
    pub fn div(self, rhs: Self) -> Option<Self> {
        self.require_inlined();
        rhs.require_inlined();

        if rhs.value() == 0 {
            return None;
        }

        Some(Self::from_s64(self.value() / rhs.value()))
    }

    /// `None` when `rhs` is zero.
    pub fn rem(self, rhs: Self) -> Option<Self> {
        self.require_inlined();
        rhs.require_inlined();

        if rhs.value() == 0 {
            return None;
        }

        Some(Self::from_s64(self.value() % rhs.value()))
    }

    pub fn neg(self) -> Self {
        self.require_inlined();

        Self::from_s64(match self.value().checked_neg() {
            Some(value) => value,
            None => fatal(format_args!(
                "negation of compile-time integer exceeds the supported range"
            )),
        })
    }

    /// `None` when the shift count is negative.
    pub fn shl(self, rhs: Self) -> Option<Self> {
        self.require_inlined();
        rhs.require_inlined();

        let shift = rhs.value();

        if shift < 0 {
            return None;
        }

        let value = self.value();

        if value == 0 {
            return Some(Self::ZERO);
        }

        if shift >= 63 {
            fatal(format_args!(
                "left-shift of compile-time integer exceeds the supported range"
            ));
        }

        let shifted = value << shift;

        if shifted >> shift != value {
            fatal(format_args!(
                "left-shift of compile-time integer exceeds the supported range"
            ));
        }

        Some(Self::from_s64(shifted))
    }

    /// `None` when the shift count is negative.
    pub fn shr(self, rhs: Self) -> Option<Self> {
        self.require_inlined();
        rhs.require_inlined();

        let shift = rhs.value();

        if shift < 0 {
            return None;
        }

        Some(Self::from_s64(if shift >= 63 {
            self.value() >> 62 >> 1
        } else {
            self.value() >> shift
        }))
    }

    /// `None` when either operand is negative.
    pub fn bit_and(self, rhs: Self) -> Option<Self> {
        self.bitwise(rhs, |a, b| a & b)
    }

    /// `None` when either operand is negative.
    pub fn bit_or(self, rhs: Self) -> Option<Self> {
        self.bitwise(rhs, |a, b| a | b)
    }

    /// `None` when either operand is negative.
    pub fn bit_xor(self, rhs: Self) -> Option<Self> {
        self.bitwise(rhs, |a, b| a ^ b)
    }

    fn bitwise(self, rhs: Self, op: fn(u64, u64) -> u64) -> Option<Self> {
        self.require_inlined();
        rhs.require_inlined();

        if self.value() < 0 || rhs.value() < 0 {
            return None;
        }

        // Tag bits are clear on both sides, so the representation-level
        // operation is the value-level one.
        Some(Self(op(self.0, rhs.0)))
    }

    pub fn compare(self, rhs: Self) -> std::cmp::Ordering {
        self.value().cmp(&rhs.value())
    }
}

/// Compile-time float. Arithmetic is deliberately unimplemented.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompFloatValue(f64);

impl CompFloatValue {
    pub fn from_f64(value: f64) -> Self {
        Self(value)
    }

    pub fn to_bits(self) -> u64 {
        self.0.to_bits()
    }

    pub fn from_bits(bits: u64) -> Self {
        Self(f64::from_bits(bits))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn add(self, _rhs: Self) -> Self {
        fatal(format_args!(
            "compile-time float arithmetic is not implemented yet"
        ))
    }

    pub fn sub(self, _rhs: Self) -> Self {
        fatal(format_args!(
            "compile-time float arithmetic is not implemented yet"
        ))
    }

    pub fn mul(self, _rhs: Self) -> Self {
        fatal(format_args!(
            "compile-time float arithmetic is not implemented yet"
        ))
    }

    pub fn div(self, _rhs: Self) -> Self {
        fatal(format_args!(
            "compile-time float arithmetic is not implemented yet"
        ))
    }

    pub fn neg(self) -> Self {
        fatal(format_args!(
            "compile-time float arithmetic is not implemented yet"
        ))
    }

    /// Conversion from a compile-time integer is deliberately
    /// unimplemented.
    pub fn from_comp_integer(_value: CompIntegerValue) -> Self {
        fatal(format_args!(
            "conversion between compile-time integers and floats is not implemented yet"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ci(value: i64) -> CompIntegerValue {
        CompIntegerValue::from_s64(value)
    }

    #[test]
    fn identities() {
        for value in [-5i64, 0, 1, 7, COMP_INTEGER_MAX, COMP_INTEGER_MIN] {
            assert_eq!(ci(value).add(ci(0)), ci(value));
            assert_eq!(ci(value).mul(ci(1)), ci(value));
            assert_eq!(ci(value).sub(ci(value)), ci(0));
        }
    }

    #[test]
    fn division_and_modulus_by_zero_fail_without_fault() {
        assert!(ci(10).div(ci(0)).is_none());
        assert!(ci(10).rem(ci(0)).is_none());
    }

    #[test]
    fn bitwise_requires_non_negative_operands() {
        assert!(ci(-1).bit_and(ci(1)).is_none());
        assert!(ci(1).bit_or(ci(-1)).is_none());
        assert_eq!(ci(0b1100).bit_and(ci(0b1010)).unwrap(), ci(0b1000));
        assert_eq!(ci(0b1100).bit_or(ci(0b1010)).unwrap(), ci(0b1110));
        assert_eq!(ci(0b1100).bit_xor(ci(0b1010)).unwrap(), ci(0b0110));
    }

    #[test]
    fn shifts() {
        assert_eq!(ci(3).shl(ci(4)).unwrap(), ci(48));
        assert_eq!(ci(48).shr(ci(4)).unwrap(), ci(3));
        assert_eq!(ci(-8).shr(ci(1)).unwrap(), ci(-4));
        assert!(ci(1).shl(ci(-1)).is_none());
        assert!(ci(1).shr(ci(-1)).is_none());
    }

    #[test]
    fn narrowing_checks_range_and_sign() {
        assert_eq!(ci(255).as_u64(8), Some(255));
        assert_eq!(ci(256).as_u64(8), None);
        assert_eq!(ci(-1).as_u64(8), None);
        assert_eq!(ci(-128).as_s64(8), Some(-128));
        assert_eq!(ci(128).as_s64(8), None);
        assert_eq!(ci(127).as_s64(8), Some(127));
    }

    #[test]
    fn comparisons_follow_value_order() {
        assert_eq!(ci(-3).compare(ci(3)), std::cmp::Ordering::Less);
        assert_eq!(ci(3).compare(ci(3)), std::cmp::Ordering::Equal);
        assert_eq!(ci(4).compare(ci(3)), std::cmp::Ordering::Greater);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        // Half the inline range keeps sums and differences inlined.
        const BOUND: i64 = COMP_INTEGER_MAX / 2;

        proptest! {
            #[test]
            fn additive_identities(a in -BOUND..BOUND) {
                prop_assert_eq!(ci(a).add(ci(0)), ci(a));
                prop_assert_eq!(ci(a).sub(ci(a)), ci(0));
                prop_assert_eq!(ci(a).mul(ci(1)), ci(a));
            }

            #[test]
            fn division_round_trips(a in -BOUND..BOUND, b in prop_oneof![-1000i64..-1, 1i64..1000]) {
                let quotient = ci(a).div(ci(b)).unwrap();
                let remainder = ci(a).rem(ci(b)).unwrap();

                prop_assert_eq!(quotient.mul(ci(b)).add(remainder), ci(a));
            }

            #[test]
            fn u64_round_trip(a in 0u64..(COMP_INTEGER_MAX as u64)) {
                prop_assert_eq!(CompIntegerValue::from_u64(a).as_u64(64), Some(a));
            }
        }
    }
}
