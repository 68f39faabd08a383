// PI (Proportional-Integral) controller with anti-windup

use crate::math::{Fp, FpWide};

/// Current loop PI regulator.
///
/// Works on fixed-point feedback with integer gains and produces an integer
/// actuator value (modulation-index digits for the current loops). The
/// integral term is `esum / calling_frequency * ki`, so `ki` is per second
/// independent of the loop rate.
///
/// Anti-windup by back-calculation: when the output is clamped the error of
/// this step is removed from the integrator again.
#[derive(Debug, Clone)]
pub struct PiController {
    /// Proportional gain
    kp: i32,
    /// Integral gain [1/s]
    ki: i32,
    /// Integral accumulator (sum of errors)
    esum: FpWide,
    /// Reference value
    ref_val: Fp,
    /// Minimum output limit
    min_y: i32,
    /// Maximum output limit
    max_y: i32,
    /// Calls per second
    frequency: i32,
}

impl Default for PiController {
    fn default() -> Self {
        Self::new()
    }
}

impl PiController {
    /// Create a controller with zero gains, zero output range and a calling
    /// frequency of 1 Hz
    pub const fn new() -> Self {
        Self {
            kp: 0,
            ki: 0,
            esum: FpWide::ZERO,
            ref_val: Fp::ZERO,
            min_y: 0,
            max_y: 0,
            frequency: 1,
        }
    }

    /// Set the proportional and integral gains
    pub fn set_gains(&mut self, kp: i32, ki: i32) {
        self.kp = kp;
        self.ki = ki;
    }

    pub fn set_proportional_gain(&mut self, kp: i32) {
        self.kp = kp;
    }

    pub fn set_integral_gain(&mut self, ki: i32) {
        self.ki = ki;
    }

    pub fn set_ref(&mut self, value: Fp) {
        self.ref_val = value;
    }

    pub fn get_ref(&self) -> Fp {
        self.ref_val
    }

    /// Set the output limits
    pub fn set_min_max_y(&mut self, min_y: i32, max_y: i32) {
        self.min_y = min_y;
        self.max_y = max_y;
    }

    /// Set how often `run` is called per second. Zero is treated as 1 Hz.
    pub fn set_calling_frequency(&mut self, frequency: u32) {
        self.frequency = i32::try_from(frequency).unwrap_or(i32::MAX).max(1);
    }

    /// Reset the integral term to zero
    pub fn reset_integrator(&mut self) {
        self.esum = FpWide::ZERO;
    }

    /// Update the controller with the measured value and return the clamped
    /// output
    pub fn run(&mut self, cur_val: Fp) -> i32 {
        let err = FpWide::from_num(self.ref_val) - FpWide::from_num(cur_val);
        self.esum += err;

        let y = err * i64::from(self.kp) + self.esum / i64::from(self.frequency) * i64::from(self.ki);
        let y = y.to_num::<i64>();

        // max/min instead of clamp: a misconfigured min > max must not panic
        let ylim = y.max(i64::from(self.min_y)).min(i64::from(self.max_y));

        if ylim != y {
            self.esum -= err;
        }

        ylim as i32
    }

    /// Get the current integral accumulator
    pub fn integrator(&self) -> FpWide {
        self.esum
    }
}
