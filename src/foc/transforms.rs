// Coordinate transformations for FOC (Field Oriented Control)
// Clarke/Park on measured currents, inverse Park on the voltage commands

use libm::sqrtf;

use super::svpwm::modulate;
use super::CoordinateTransform;
use crate::math::Fp;

/// Largest voltage vector amplitude [digits] the modulator can produce
/// without clipping: 65536 / sqrt(3), minus a little rounding headroom.
pub const MAX_MODULATION_INDEX: i32 = 37813;

/// 1/sqrt(3) in Q31
const ONE_DIV_SQRT3_Q31: i64 = 1_239_850_262;

/// Sine and cosine of a 16-bit electrical angle in Q31
///
/// Uses idsp::cossin() (fast, ~40 cycles on Cortex-M). The 16-bit angle is
/// the top half of idsp's 32-bit phase, so one electrical revolution maps
/// onto the full phase range.
#[inline]
fn cos_sin(angle: u16) -> (i64, i64) {
    let phase = (u32::from(angle) << 16) as i32;
    let (cos, sin) = idsp::cossin(phase);
    (i64::from(cos), i64::from(sin))
}

/// Q31 product, rounded towards negative infinity
#[inline]
fn mul_q31(value: i64, factor: i64) -> i64 {
    (value * factor) >> 31
}

/// Clarke transformation (two phase currents → αβ)
///
/// Assumes a balanced load, the third current is `-(il1 + il2)`.
///
/// # Returns
/// Tuple of (i_alpha, i_beta) as raw fixed-point bits
pub fn clarke(il1: Fp, il2: Fp) -> (i64, i64) {
    let a = i64::from(il1.to_bits());
    let b = i64::from(il2.to_bits());
    let alpha = a;
    let beta = mul_q31(a + 2 * b, ONE_DIV_SQRT3_Q31);
    (alpha, beta)
}

/// Park transformation (αβ → dq)
pub fn park(alpha: i64, beta: i64, angle: u16) -> (i64, i64) {
    let (cos, sin) = cos_sin(angle);
    let d = mul_q31(alpha, cos) + mul_q31(beta, sin);
    let q = mul_q31(beta, cos) - mul_q31(alpha, sin);
    (d, q)
}

/// Inverse Park transformation (dq → αβ)
///
/// Transforms from the rotating dq reference frame to the stationary αβ frame
///
/// # Arguments
/// * `ud` - d-axis voltage (aligned with rotor flux)
/// * `uq` - q-axis voltage (perpendicular to rotor flux, produces torque)
/// * `angle` - Electrical angle, 65536 digits per revolution
pub fn inverse_park(ud: i32, uq: i32, angle: u16) -> (i32, i32) {
    let (cos, sin) = cos_sin(angle);
    let (ud, uq) = (i64::from(ud), i64::from(uq));
    let alpha = mul_q31(ud, cos) - mul_q31(uq, sin);
    let beta = mul_q31(ud, sin) + mul_q31(uq, cos);
    (alpha as i32, beta as i32)
}

/// Reference transform used by the firmware.
#[derive(Debug, Clone, Default)]
pub struct Foc {
    angle: u16,
}

impl Foc {
    pub const fn new() -> Self {
        Self { angle: 0 }
    }

    pub fn angle(&self) -> u16 {
        self.angle
    }
}

impl CoordinateTransform for Foc {
    fn set_angle(&mut self, angle: u16) {
        self.angle = angle;
    }

    fn park_clarke(&mut self, il1: Fp, il2: Fp) -> (Fp, Fp) {
        let (alpha, beta) = clarke(il1, il2);
        let (d, q) = park(alpha, beta, self.angle);
        (Fp::from_bits(d as i32), Fp::from_bits(q as i32))
    }

    fn inv_park_clarke(&mut self, ud: i32, uq: i32) -> [u16; 3] {
        let (alpha, beta) = inverse_park(ud, uq, self.angle);
        modulate(alpha, beta)
    }

    /// Circular voltage limit: `sqrt(max² - ud²)`
    fn q_limit(&self, ud: i32) -> i32 {
        let max = MAX_MODULATION_INDEX as f32;
        let ud = (ud.unsigned_abs() as f32).min(max);
        sqrtf(max * max - ud * ud) as i32
    }

    fn max_modulation_index(&self) -> i32 {
        MAX_MODULATION_INDEX
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::fp;

    fn approx_eq(a: Fp, b: Fp) -> bool {
        (a - b).abs() < Fp::from_num(0.05)
    }

    #[test]
    fn test_park_clarke_zero_angle() {
        let mut foc = Foc::new();
        // ia = 10, ib = ic = -5: current vector on the alpha axis
        let (id, iq) = foc.park_clarke(fp(10), fp(-5));
        assert!(approx_eq(id, fp(10)));
        assert!(approx_eq(iq, fp(0)));
    }

    #[test]
    fn test_park_clarke_quarter_turn() {
        let mut foc = Foc::new();
        foc.set_angle(16384);
        // same phase currents, rotor 90° ahead: vector lies on -q
        let (id, iq) = foc.park_clarke(fp(10), fp(-5));
        assert!(approx_eq(id, fp(0)));
        assert!(approx_eq(iq, fp(-10)));
    }

    #[test]
    fn test_inverse_park_zero_angle() {
        let (alpha, beta) = inverse_park(10000, 0, 0);
        assert!((alpha - 10000).abs() <= 1);
        assert!(beta.abs() <= 1);
    }

    #[test]
    fn test_q_limit() {
        let foc = Foc::new();
        assert_eq!(foc.q_limit(0), MAX_MODULATION_INDEX);
        assert_eq!(foc.q_limit(MAX_MODULATION_INDEX), 0);
        assert_eq!(foc.q_limit(-2 * MAX_MODULATION_INDEX), 0);
        let q = foc.q_limit(20000);
        assert!((q - 32091).abs() <= 1);
    }

    #[test]
    fn test_zero_voltage_is_centered() {
        let mut foc = Foc::new();
        foc.set_angle(12345);
        assert_eq!(foc.inv_park_clarke(0, 0), [32768; 3]);
    }
}
