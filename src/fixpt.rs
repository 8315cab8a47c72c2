//! Saturating Q1.15 arithmetic with a Q2.30 accumulator.
//!
//! All controller-visible quantities (setpoint, feedback, error, gains, duty
//! command) live in the same Q1.15 per-unit format; products and the
//! integrator use the double-width Q2.30 accumulator so that no intermediate
//! result is rounded twice. Every narrowing operation rounds to nearest and
//! clamps instead of wrapping.

use fixed::types::{I1F15, I2F30};

/// Single-width per-unit value in [-1, 1 - 2^-15].
pub type Q15 = I1F15;

/// Double-width accumulator. Holds the full product of two [`Q15`] values
/// and the integrator, without rounding.
pub type Q30 = I2F30;

/// Fractional bits of the single-width format.
pub const FRAC_BITS: u32 = 15;

/// Mid-point added before the narrowing shift (round-to-nearest).
const ROUND_HALF: i32 = 1 << (FRAC_BITS - 1);

/// Narrows a raw Q30 bit pattern to Q15, rounding to nearest and clamping
/// to the Q15 rails.
fn narrow(wide: i32) -> Q15 {
    let rounded = wide.saturating_add(ROUND_HALF) >> FRAC_BITS;
    Q15::from_bits(rounded.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16)
}

/// Full-width product of two single-width values.
fn wide_product(a: Q15, b: Q15) -> i32 {
    i32::from(a.to_bits()) * i32::from(b.to_bits())
}

/// Fixed-point multiply.
///
/// The product is formed at double width and then rounded to nearest before
/// the single-width result is produced. This is the one rounding policy used
/// throughout the crate. `-1.0 * -1.0` saturates to `Q15::MAX` rather than
/// wrapping.
pub fn mul(a: Q15, b: Q15) -> Q15 {
    narrow(wide_product(a, b))
}

/// Multiply-accumulate into the double-width accumulator.
///
/// The product is accumulated at full width, with no intermediate rounding.
/// Accumulation saturates at the Q30 rails instead of wrapping.
pub fn mac(a: Q15, b: Q15, acc: Q30) -> Q30 {
    Q30::from_bits(acc.to_bits().saturating_add(wide_product(a, b)))
}

/// Widens a single-width value to the accumulator format, exactly.
pub fn widen(x: Q15) -> Q30 {
    Q30::from_bits(i32::from(x.to_bits()) << FRAC_BITS)
}

/// Clamps an accumulator value to the representable Q15 range.
///
/// Rounds to nearest, then clamps. Always produces an in-range result and
/// signals nothing; saturation is reported by the caller where it matters.
pub fn saturate(x: Q30) -> Q15 {
    narrow(x.to_bits())
}

/// Whether [`saturate`] would clamp `x` (its rounded value falls outside the
/// Q15 range).
pub fn out_of_range(x: Q30) -> bool {
    let rounded = x.to_bits().saturating_add(ROUND_HALF) >> FRAC_BITS;
    rounded > i32::from(i16::MAX) || rounded < i32::from(i16::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_rounds_to_nearest() {
        // 0.5 * (1 LSB) = half an LSB, rounds up to 1 LSB.
        let half = Q15::from_num(0.5);
        let lsb = Q15::from_bits(1);
        assert_eq!(mul(half, lsb), lsb);

        let a = Q15::from_num(0.25);
        let b = Q15::from_num(0.5);
        assert_eq!(mul(a, b), Q15::from_num(0.125));
    }

    #[test]
    fn mul_saturates_at_negative_one_squared() {
        let neg_one = Q15::MIN;
        assert_eq!(mul(neg_one, neg_one), Q15::MAX);
    }

    #[test]
    fn saturate_is_idempotent() {
        for bits in [i32::MIN, -(1 << 30), -1, 0, 1, 1 << 30, i32::MAX] {
            let x = Q30::from_bits(bits);
            let once = saturate(x);
            assert_eq!(saturate(widen(once)), once);
        }
    }

    #[test]
    fn saturate_clamps_to_rails() {
        assert_eq!(saturate(Q30::from_bits(i32::MAX)), Q15::MAX);
        assert_eq!(saturate(Q30::from_bits(i32::MIN)), Q15::MIN);
        assert!(out_of_range(Q30::from_bits(i32::MAX)));
        assert!(!out_of_range(widen(Q15::from_num(0.75))));
    }

    #[test]
    fn mac_with_zero_is_identity() {
        let acc = Q30::from_num(0.123);
        assert_eq!(mac(Q15::ZERO, Q15::from_num(0.9), acc), acc);
        assert_eq!(mac(Q15::from_num(0.9), Q15::ZERO, acc), acc);
    }

    #[test]
    fn mac_matches_mul_within_one_rounding_unit() {
        let cases = [
            (0.5, 0.1, 0.25),
            (-0.7, 0.3, 0.5),
            (0.9, -0.9, -0.1),
            (0.001, 0.001, 0.0),
        ];
        for (a, b, acc) in cases {
            let a = Q15::from_num(a);
            let b = Q15::from_num(b);
            let acc = Q30::from_num(acc);

            let fused = mac(a, b, acc);
            let twice_rounded = Q30::from_bits(
                acc.to_bits().saturating_add(widen(mul(a, b)).to_bits()),
            );

            // The fused path skips the intermediate rounding, so the two may
            // differ by at most half a Q15 LSB expressed in Q30.
            let diff = (fused.to_bits() - twice_rounded.to_bits()).unsigned_abs();
            assert!(diff <= ROUND_HALF as u32, "diff {diff} for ({a}, {b})");
        }
    }

    #[test]
    fn mac_saturates_instead_of_wrapping() {
        let mut acc = Q30::ZERO;
        let max = Q15::MAX;
        for _ in 0..10 {
            acc = mac(max, max, acc);
        }
        assert_eq!(acc, Q30::from_bits(i32::MAX));
    }
}
