//! Phase current sensor offset calibration.
//!
//! While the bridge is switched off both current channels read their zero
//! offset. Averaging a fixed number of raw samples gives the new offsets; the
//! accumulator then starts over for as long as the output stays disabled.

use crate::config::OFFSET_SAMPLES;

#[derive(Debug, Clone, Default)]
pub struct OffsetCalibration {
    il1_sum: i32,
    il2_sum: i32,
    samples: i32,
}

impl OffsetCalibration {
    pub const fn new() -> Self {
        Self {
            il1_sum: 0,
            il2_sum: 0,
            samples: 0,
        }
    }

    /// Adds one raw sample per channel. Returns the averaged offsets when
    /// this sample completes a pass.
    pub fn add_sample(&mut self, il1_raw: i32, il2_raw: i32) -> Option<(i32, i32)> {
        self.il1_sum += il1_raw;
        self.il2_sum += il2_raw;
        self.samples += 1;

        if self.samples < OFFSET_SAMPLES {
            return None;
        }

        let offsets = (self.il1_sum / OFFSET_SAMPLES, self.il2_sum / OFFSET_SAMPLES);
        self.reset();
        Some(offsets)
    }

    /// Drops a partial pass.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn samples(&self) -> i32 {
        self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_after_full_pass() {
        let mut cal = OffsetCalibration::new();
        for i in 0..OFFSET_SAMPLES - 1 {
            // alternating around 2048 / 2000
            let jitter = if i % 2 == 0 { 3 } else { -3 };
            assert_eq!(cal.add_sample(2048 + jitter, 2000 - jitter), None);
        }
        assert_eq!(cal.add_sample(2045, 2003), Some((2048, 2000)));
        assert_eq!(cal.samples(), 0);
    }

    #[test]
    fn test_rearms_after_pass() {
        let mut cal = OffsetCalibration::new();
        for _ in 0..OFFSET_SAMPLES {
            cal.add_sample(100, 200);
        }
        for _ in 0..OFFSET_SAMPLES - 1 {
            assert_eq!(cal.add_sample(300, 400), None);
        }
        assert_eq!(cal.add_sample(300, 400), Some((300, 400)));
    }

    #[test]
    fn test_reset_discards_partial_pass() {
        let mut cal = OffsetCalibration::new();
        for _ in 0..100 {
            cal.add_sample(4095, 4095);
        }
        cal.reset();
        for _ in 0..OFFSET_SAMPLES {
            cal.add_sample(10, 20);
        }
        assert_eq!(cal.samples(), 0);
    }
}
