// Space Vector PWM (SVPWM) generation
//
// Min/max zero-sequence injection: the three sinusoidal phase voltages are
// shifted by the mean of their extremes, which yields the same switching
// pattern as the sector-based algorithm in calebfletcher/foc without any
// sector decision. Integer only, it runs in the PWM interrupt.

/// sqrt(3)/2 in Q16
const SQRT3_DIV_2_Q16: i64 = 56_756;

/// Duty cycle for a zero phase voltage (50 %)
pub const DUTY_CENTER: i32 = 32768;

/// Inverse Clarke transformation (αβ → uvw)
///
/// # Returns
/// Tuple of (v_u, v_v, v_w) three-phase voltages
pub fn inverse_clarke(v_alpha: i32, v_beta: i32) -> (i32, i32, i32) {
    let alpha = i64::from(v_alpha);
    let beta = (i64::from(v_beta) * SQRT3_DIV_2_Q16) >> 16;

    let v_u = alpha;
    let v_v = -alpha / 2 + beta;
    let v_w = -alpha / 2 - beta;

    (v_u as i32, v_v as i32, v_w as i32)
}

/// Calculate Space Vector PWM duty cycles
///
/// # Arguments
/// * `v_alpha` - Alpha-axis voltage command [modulation digits]
/// * `v_beta` - Beta-axis voltage command [modulation digits]
///
/// # Returns
/// Duty cycles of phase U, V, W in 16-bit resolution, centered on 32768.
/// Amplitudes beyond the maximum modulation index clip at 0 and 65535.
pub fn modulate(v_alpha: i32, v_beta: i32) -> [u16; 3] {
    let (u, v, w) = inverse_clarke(v_alpha, v_beta);

    let max = u.max(v).max(w);
    let min = u.min(v).min(w);
    let offset = (max + min) / 2;

    [u, v, w].map(|phase| (phase - offset + DUTY_CENTER).clamp(0, u16::MAX as i32) as u16)
}
