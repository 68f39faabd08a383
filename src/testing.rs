//! Test doubles for the collaborator traits.

use crate::fault::{Fault, FaultSink};
use crate::foc::{CoordinateTransform, Encoder, PwmOutput, MAX_MODULATION_INDEX};
use crate::math::Fp;

/// Encoder returning fixed readings.
#[derive(Debug, Clone, Default)]
pub struct ScriptedEncoder {
    pub north: bool,
    pub angle: u16,
    pub frequency: Fp,
    /// Last value passed to `set_pwm_frequency`
    pub pwmfrq: u32,
}

impl Encoder for ScriptedEncoder {
    fn set_pwm_frequency(&mut self, pwmfrq: u32) {
        self.pwmfrq = pwmfrq;
    }

    fn update_rotor_angle(&mut self, _dir: i32) {}

    fn seen_north_signal(&self) -> bool {
        self.north
    }

    fn rotor_angle(&self) -> u16 {
        self.angle
    }

    fn rotor_frequency(&self) -> Fp {
        self.frequency
    }
}

/// Bridge that remembers its last state.
#[derive(Debug, Clone, Default)]
pub struct RecordingPwm {
    pub enabled: bool,
    pub enable_calls: u32,
    pub disable_calls: u32,
    /// Indexed by timer channel
    pub duties: [u16; 3],
}

impl PwmOutput for RecordingPwm {
    fn enable_output(&mut self) {
        self.enabled = true;
        self.enable_calls += 1;
    }

    fn disable_output(&mut self) {
        self.enabled = false;
        self.disable_calls += 1;
    }

    fn set_duty(&mut self, channel: usize, duty: u16) {
        self.duties[channel] = duty;
    }
}

#[derive(Debug, Clone, Default)]
pub struct CountingFaults {
    pub posted: Vec<Fault>,
}

impl FaultSink for CountingFaults {
    fn post(&mut self, fault: Fault) {
        self.posted.push(fault);
    }
}

/// Transform that passes values straight through.
///
/// `park_clarke(a, b)` is `(a, b)`; `inv_park_clarke(ud, uq)` puts `ud` on
/// phase U and `uq` on phase V around the 50 % point, W stays centered.
#[derive(Debug, Clone, Default)]
pub struct IdentityTransform {
    pub angle: u16,
}

impl CoordinateTransform for IdentityTransform {
    fn set_angle(&mut self, angle: u16) {
        self.angle = angle;
    }

    fn park_clarke(&mut self, il1: Fp, il2: Fp) -> (Fp, Fp) {
        (il1, il2)
    }

    fn inv_park_clarke(&mut self, ud: i32, uq: i32) -> [u16; 3] {
        let center = |u: i32| (u + 32768).clamp(0, i32::from(u16::MAX)) as u16;
        [center(ud), center(uq), 32768]
    }

    fn q_limit(&self, ud: i32) -> i32 {
        (MAX_MODULATION_INDEX - ud.abs()).max(0)
    }

    fn max_modulation_index(&self) -> i32 {
        MAX_MODULATION_INDEX
    }
}
