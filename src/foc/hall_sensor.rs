// Hall sensor rotor position encoder
//
// Three digital Hall inputs give the rotor position in 60 degree sectors.
// Edge intervals are counted in control periods; between edges the angle is
// interpolated from the sector boundary at the measured frequency.

use crate::foc::Encoder;
use crate::math::{frq_to_angle, Fp};

/// Width of one Hall sector [dig]
const SECTOR_WIDTH: i32 = 65536 / 6;

const fn degrees(deg: u32) -> u16 {
    (deg * 65536 / 360) as u16
}

/// Hall state to sector center angle
/// Hall state format: (H3 << 2) | (H2 << 1) | H1
/// Valid states are 1-6, 0b000 and 0b111 are wiring faults
const HALL_ANGLE_TABLE: [Option<u16>; 8] = [
    None,
    Some(degrees(30)),
    Some(degrees(90)),
    Some(degrees(150)),
    Some(degrees(210)),
    Some(degrees(270)),
    Some(degrees(330)),
    None,
];

/// Hall sensor encoder polled once per control period
#[derive(Debug, Clone)]
pub struct HallSensor {
    pwmfrq: u32,
    /// Latest sampled Hall state (0-7)
    state: u8,
    prev_state: u8,
    /// Angle at the last edge (sector boundary) or sector center at standstill
    base_angle: u16,
    angle: u16,
    frequency: Fp,
    periods_since_edge: u32,
    /// An edge has been seen since the last timeout
    edge_seen: bool,
}

impl HallSensor {
    pub const fn new() -> Self {
        Self {
            pwmfrq: 1,
            state: 0,
            prev_state: 0,
            base_angle: 0,
            angle: 0,
            frequency: Fp::ZERO,
            periods_since_edge: 0,
            edge_seen: false,
        }
    }

    pub fn is_valid_state(state: u8) -> bool {
        (1..=6).contains(&state)
    }

    /// Latches the Hall inputs for the next `update_rotor_angle`
    pub fn set_hall_state(&mut self, state: u8) {
        self.state = state & 0b111;
    }

    pub fn hall_state(&self) -> u8 {
        self.state
    }

    /// No edge for one second means standstill
    fn timed_out(&self) -> bool {
        self.periods_since_edge > self.pwmfrq
    }
}

impl Default for HallSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder for HallSensor {
    fn set_pwm_frequency(&mut self, pwmfrq: u32) {
        self.pwmfrq = pwmfrq.max(1);
    }

    fn update_rotor_angle(&mut self, dir: i32) {
        self.periods_since_edge = self.periods_since_edge.saturating_add(1);

        let Some(center) = HALL_ANGLE_TABLE[usize::from(self.state)] else {
            // keep the last angle, frequency decays through the timeout
            if self.timed_out() {
                self.frequency = Fp::ZERO;
                self.edge_seen = false;
            }
            return;
        };

        if self.state != self.prev_state {
            let entered = Self::is_valid_state(self.prev_state);
            if entered && self.edge_seen {
                // six edges per electrical revolution
                let periods = i32::try_from(self.periods_since_edge).unwrap_or(i32::MAX);
                let pwmfrq = i32::try_from(self.pwmfrq).unwrap_or(i32::MAX);
                self.frequency = Fp::from_num(pwmfrq) / (6 * periods);
            }
            self.base_angle = if entered {
                center.wrapping_add((-dir * SECTOR_WIDTH / 2) as u16)
            } else {
                center
            };
            self.periods_since_edge = 0;
            self.edge_seen = entered;
            self.prev_state = self.state;
        } else if self.timed_out() {
            self.frequency = Fp::ZERO;
            self.edge_seen = false;
            self.base_angle = center;
        }

        if self.edge_seen {
            let per_period = frq_to_angle(self.frequency, self.pwmfrq);
            let periods = i32::try_from(self.periods_since_edge).unwrap_or(i32::MAX);
            let travelled = per_period.saturating_mul(periods).min(SECTOR_WIDTH);
            self.angle = self.base_angle.wrapping_add((dir * travelled) as u16);
        } else {
            self.angle = self.base_angle;
        }
    }

    fn seen_north_signal(&self) -> bool {
        Self::is_valid_state(self.state)
    }

    fn rotor_angle(&self) -> u16 {
        self.angle
    }

    fn rotor_frequency(&self) -> Fp {
        self.frequency
    }
}
