//! Fixed-point helpers shared by every control stage.
//!
//! Physical quantities (percentages, currents, voltages, frequencies) are
//! carried as [`Fp`], a signed 32-bit value with 10 fractional bits
//! (resolution 1/1024, range about ±2 097 152). Conversions go through
//! `from_num`/`to_num`; products are formed at double width and rescaled by
//! the `fixed` crate, and `to_num::<i32>()` truncates toward negative
//! infinity. Arithmetic is not saturating: every caller keeps its operands
//! inside the documented ranges instead.

use fixed::types::{I22F10, I54F10};

/// Fixed-point type used for all physical quantities.
pub type Fp = I22F10;

/// Wide accumulator type with the same resolution as [`Fp`].
pub type FpWide = I54F10;

/// Number of bits of the electrical angle; `1 << ANGLE_BITS` is one revolution.
pub const ANGLE_BITS: u32 = 16;

/// Builds an [`Fp`] from an integer in const context.
pub const fn fp(value: i32) -> Fp {
    Fp::const_from_int(value)
}

/// Builds an [`Fp`] from thousandths in const context (`fp_milli(250)` is 0.25).
pub const fn fp_milli(value: i32) -> Fp {
    Fp::from_bits(value * (1 << Fp::FRAC_NBITS) / 1000)
}

/// Single-pole IIR low-pass: `old + (new - old) / 2^shift`.
///
/// A shift of zero passes `new` through unchanged.
#[inline]
pub fn iir_filter(old: Fp, new: Fp, shift: u32) -> Fp {
    old + ((new - old) >> shift)
}

/// Square root of a non-negative value. Negative inputs yield zero.
#[inline]
pub fn fp_sqrt(value: Fp) -> Fp {
    if value <= Fp::ZERO {
        return Fp::ZERO;
    }
    Fp::from_num(libm::sqrtf(value.to_num::<f32>()))
}

/// Float to [`Fp`], saturating at the range ends. NaN maps to zero.
#[inline]
pub fn fp_from_f32(value: f32) -> Fp {
    if value.is_nan() {
        return Fp::ZERO;
    }
    Fp::saturating_from_num(value)
}

/// Electrical angle step per control period for a frequency in Hz.
///
/// Equivalent to `(frq << 16) / pwmfrq`, evaluated at double width so that
/// the shift cannot overflow.
pub fn frq_to_angle(frq: Fp, pwmfrq: u32) -> i32 {
    if pwmfrq == 0 {
        return 0;
    }
    let scaled = FpWide::from_num(frq) * (1i64 << ANGLE_BITS) / i64::from(pwmfrq);
    scaled.to_num::<i32>()
}

/// Converts a 16-bit electrical angle to degrees.
pub fn digit_to_degree(angle: u16) -> Fp {
    Fp::from_num(FpWide::from_num(u32::from(angle) * 360) >> ANGLE_BITS)
}

/// Applies a signed step to a wrapping 16-bit angle.
#[inline]
pub fn advance_angle(angle: u16, step: i32) -> u16 {
    angle.wrapping_add(step as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iir_zero_shift_passes_through() {
        assert_eq!(iir_filter(fp(10), fp(42), 0), fp(42));
    }

    #[test]
    fn iir_converges_toward_input() {
        let mut y = Fp::ZERO;
        for _ in 0..200 {
            y = iir_filter(y, fp(100), 3);
        }
        assert!(y > fp(99) && y <= fp(100));
    }

    #[test]
    fn milli_constants() {
        assert_eq!(fp_milli(500), Fp::from_num(0.5));
        assert_eq!(fp_milli(-2000), fp(-2));
    }

    #[test]
    fn sqrt_of_square() {
        let r = fp_sqrt(fp(25));
        assert!((r - fp(5)).abs() < Fp::from_num(0.01));
        assert_eq!(fp_sqrt(fp(-4)), Fp::ZERO);
    }

    #[test]
    fn float_conversion_saturates() {
        assert_eq!(fp_from_f32(1.5), Fp::from_num(1.5));
        assert_eq!(fp_from_f32(f32::NAN), Fp::ZERO);
        assert_eq!(fp_from_f32(1.0e12), Fp::MAX);
    }

    #[test]
    fn frq_to_angle_matches_shift_formula() {
        // 1 Hz at 8 kHz: 65536 / 8000 = 8.192
        assert_eq!(frq_to_angle(fp(1), 8000), 8);
        assert_eq!(frq_to_angle(fp(100), 8000), 819);
        assert_eq!(frq_to_angle(fp(5), 0), 0);
    }

    #[test]
    fn degree_conversion() {
        assert_eq!(digit_to_degree(0), Fp::ZERO);
        assert_eq!(digit_to_degree(16384), fp(90));
        assert_eq!(digit_to_degree(32768), fp(180));
    }

    #[test]
    fn angle_wraps_both_ways() {
        assert_eq!(advance_angle(65530, 10), 4);
        assert_eq!(advance_angle(4, -10), 65530);
    }
}
