// FOC (Field Oriented Control) module
// Collaborator interfaces of the motor cycle plus the reference transform

pub mod hall_sensor;
pub mod pi_controller;
pub mod svpwm;
pub mod transforms;

use crate::math::Fp;

// Re-export main types for easier access
pub use hall_sensor::HallSensor;
pub use pi_controller::PiController;
pub use transforms::{Foc, MAX_MODULATION_INDEX};

/// Rotor position source.
///
/// `update_rotor_angle` is called once per control period before any of the
/// getters.
pub trait Encoder {
    /// Control period frequency the encoder uses to scale its estimates [Hz]
    fn set_pwm_frequency(&mut self, pwmfrq: u32);

    fn update_rotor_angle(&mut self, dir: i32);

    /// Absolute angle reference seen, i.e. `rotor_angle` is trustworthy.
    fn seen_north_signal(&self) -> bool;

    /// Rotor angle, 65536 digits per revolution of the sensor
    fn rotor_angle(&self) -> u16;

    /// Rotor frequency [Hz]
    fn rotor_frequency(&self) -> Fp;
}

/// Clarke/Park transforms and space vector modulation.
///
/// Voltages are modulation-index digits: `max_modulation_index()` is the
/// largest vector amplitude the modulator can produce without clipping.
/// Duty cycles are 16 bit, 32768 is 50 %.
pub trait CoordinateTransform {
    /// Electrical angle for the following transforms
    fn set_angle(&mut self, angle: u16);

    /// Two measured phase currents to `(id, iq)`.
    fn park_clarke(&mut self, il1: Fp, il2: Fp) -> (Fp, Fp);

    /// `(ud, uq)` to three duty cycles.
    fn inv_park_clarke(&mut self, ud: i32, uq: i32) -> [u16; 3];

    /// Voltage left for the q axis once `ud` is applied.
    fn q_limit(&self, ud: i32) -> i32;

    fn max_modulation_index(&self) -> i32;
}

/// Three-phase bridge.
pub trait PwmOutput {
    /// Connect the gate drivers (main output enable).
    fn enable_output(&mut self);

    /// Disconnect the gate drivers; all switches open.
    fn disable_output(&mut self);

    /// Compare value for timer channel `channel` (0..3) at timer resolution.
    fn set_duty(&mut self, channel: usize, duty: u16);
}
