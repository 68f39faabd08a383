//! Electrical angle and frequency synchronizer.
//!
//! Two states, re-evaluated every control period without hysteresis:
//!
//! * synced: the encoder has seen its absolute reference, the angle follows
//!   the rotor (scaled by the pole pair ratio) plus a latency compensating
//!   offset that grows with frequency.
//! * slipping: no reference, the angle free-runs at the configured slip
//!   frequency.

use crate::config::{Param, ParamStore, FRQ_FILTER_SHIFT};
use crate::foc::Encoder;
use crate::math::{advance_angle, frq_to_angle, iir_filter, Fp};

/// Angle/frequency state owned by the motor cycle.
#[derive(Debug, Clone, Default)]
pub struct AngleSync {
    angle: u16,
    frq: Fp,
    frq_filtered: Fp,
    fslip: Fp,
    slip_incr: i32,
    pole_pair_ratio: i32,
}

impl AngleSync {
    pub fn new() -> Self {
        Self {
            pole_pair_ratio: 1,
            ..Default::default()
        }
    }

    /// Loads slip frequency and pole pair ratio, derives the slip increment
    /// for the control frequency `pwmfrq`.
    pub fn configure<S: ParamStore + ?Sized>(&mut self, pwmfrq: u32, params: &S) {
        self.fslip = params.get(Param::FSlip);
        self.slip_incr = frq_to_angle(self.fslip, pwmfrq);

        let res_pole_pairs = params.get_int(Param::ResPolePairs).max(1);
        self.pole_pair_ratio = (params.get_int(Param::PolePairs) / res_pole_pairs).max(1);
    }

    /// Advances angle and frequency by one control period.
    pub fn calc_next_angle<E, S>(&mut self, dir: i32, encoder: &E, params: &mut S)
    where
        E: Encoder + ?Sized,
        S: ParamStore + ?Sized,
    {
        self.frq_filtered = iir_filter(self.frq_filtered, self.frq, FRQ_FILTER_SHIFT);

        if encoder.seen_north_signal() {
            let syncadv = self.sync_advance(params);
            params.set_int(Param::SyncAdvFinal, syncadv);

            // rotor movement between sampling and actuation
            let advance = (self.frq_filtered * syncadv).max(Fp::ZERO);
            let sync_ofs = (params.get_int(Param::SyncOfs) as u16)
                .wrapping_add((advance * dir).to_num::<i32>() as u16);
            params.set_int(Param::SyncOffFinal, i32::from(sync_ofs));

            let ratio = self.pole_pair_ratio as u16;
            self.angle = ratio.wrapping_mul(encoder.rotor_angle()).wrapping_add(sync_ofs);
            self.frq = encoder.rotor_frequency() * self.pole_pair_ratio;
        } else {
            self.frq = self.fslip;
            self.angle = advance_angle(self.angle, dir * self.slip_incr);
        }
    }

    /// Sync advance, reduced by `syncadvOffs` across the start..end band.
    fn sync_advance<S: ParamStore + ?Sized>(&self, params: &S) -> i32 {
        let syncadv = params.get_int(Param::SyncAdv);
        let offs = params.get_int(Param::SyncAdvOffs);
        let start = params.get(Param::SyncAdvStart);
        let end = params.get(Param::SyncAdvEnd);

        if self.frq > end {
            syncadv - offs
        } else if self.frq > start {
            // frq <= end here, so end > start
            syncadv - ((self.frq - start) * offs / (end - start)).to_num::<i32>()
        } else {
            syncadv
        }
    }

    pub fn angle(&self) -> u16 {
        self.angle
    }

    /// Electrical frequency [Hz]
    pub fn frequency(&self) -> Fp {
        self.frq
    }

    pub fn filtered_frequency(&self) -> Fp {
        self.frq_filtered
    }

    pub fn slip_increment(&self) -> i32 {
        self.slip_incr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParamTable;
    use crate::math::fp;
    use crate::testing::ScriptedEncoder;
    use proptest::prelude::*;

    fn params() -> ParamTable {
        let mut p = ParamTable::new();
        p.set_int(Param::FSlip, 5);
        p.set_int(Param::PolePairs, 4);
        p.set_int(Param::ResPolePairs, 1);
        p.set_int(Param::SyncOfs, 1000);
        p.set_int(Param::SyncAdv, 10);
        p.set_int(Param::SyncAdvOffs, 4);
        p.set_int(Param::SyncAdvStart, 100);
        p.set_int(Param::SyncAdvEnd, 200);
        p
    }

    #[test]
    fn test_slip_increment_from_frequency() {
        let mut sync = AngleSync::new();
        sync.configure(8000, &params());
        // 5 Hz at 8 kHz: 65536 * 5 / 8000
        assert_eq!(sync.slip_increment(), 40);
    }

    #[test]
    fn test_synced_angle_uses_pole_pair_ratio_and_offset() {
        let mut p = params();
        let mut sync = AngleSync::new();
        sync.configure(8000, &p);

        let encoder = ScriptedEncoder {
            north: true,
            angle: 1000,
            frequency: fp(25),
            ..Default::default()
        };
        sync.calc_next_angle(1, &encoder, &mut p);

        // filtered frequency still zero: no advance yet
        assert_eq!(sync.angle(), 4 * 1000 + 1000);
        assert_eq!(sync.frequency(), fp(100));
        assert_eq!(p.get_int(Param::SyncOffFinal), 1000);
        assert_eq!(p.get_int(Param::SyncAdvFinal), 10);
    }

    #[test]
    fn test_sync_advance_band() {
        let mut p = params();
        let mut sync = AngleSync::new();
        sync.configure(8000, &p);
        let mut encoder = ScriptedEncoder {
            north: true,
            angle: 0,
            frequency: fp(0),
            ..Default::default()
        };

        // first call latches frq = 4 * 37.5 = 150, halfway through the band
        encoder.frequency = Fp::from_num(37.5);
        sync.calc_next_angle(1, &encoder, &mut p);
        sync.calc_next_angle(1, &encoder, &mut p);
        assert_eq!(p.get_int(Param::SyncAdvFinal), 8);

        // beyond the band the full offset applies
        encoder.frequency = fp(100);
        sync.calc_next_angle(1, &encoder, &mut p);
        sync.calc_next_angle(1, &encoder, &mut p);
        assert_eq!(p.get_int(Param::SyncAdvFinal), 6);
    }

    #[test]
    fn test_advance_is_direction_signed() {
        let mut p = params();
        p.set_int(Param::SyncAdvOffs, 0);
        let encoder = ScriptedEncoder {
            north: true,
            angle: 0,
            frequency: fp(256),
            ..Default::default()
        };

        let mut forward = AngleSync::new();
        forward.configure(8000, &p);
        let mut reverse = forward.clone();
        // second period: filtered frequency is 1024 >> 8 = 4 Hz, advance 40
        for _ in 0..2 {
            forward.calc_next_angle(1, &encoder, &mut p);
            reverse.calc_next_angle(-1, &encoder, &mut p);
        }
        let fwd_ofs = forward.angle().wrapping_sub(1000) as i16;
        let rev_ofs = reverse.angle().wrapping_sub(1000) as i16;
        assert!(fwd_ofs > 0);
        assert_eq!(fwd_ofs, -rev_ofs);
    }

    #[test]
    fn test_falls_back_to_slip_without_north() {
        let mut p = params();
        let mut sync = AngleSync::new();
        sync.configure(8000, &p);

        let mut encoder = ScriptedEncoder {
            north: true,
            angle: 100,
            frequency: fp(50),
            ..Default::default()
        };
        sync.calc_next_angle(1, &encoder, &mut p);
        let synced = sync.angle();

        encoder.north = false;
        sync.calc_next_angle(1, &encoder, &mut p);
        assert_eq!(sync.frequency(), fp(5));
        assert_eq!(sync.angle(), synced.wrapping_add(40));
    }

    proptest! {
        #[test]
        fn prop_slip_advances_exactly(
            periods in 0u32..5000,
            dir in prop_oneof![Just(1i32), Just(-1i32)],
            fslip in 1i32..50,
            pwmfrq in 2000u32..20000,
        ) {
            let mut p = params();
            p.set_int(Param::FSlip, fslip);
            let mut sync = AngleSync::new();
            sync.configure(pwmfrq, &p);
            let encoder = ScriptedEncoder { north: false, ..Default::default() };

            let start = sync.angle();
            for _ in 0..periods {
                sync.calc_next_angle(dir, &encoder, &mut p);
            }

            let expected = i64::from(start)
                + i64::from(periods) * i64::from(dir) * i64::from(sync.slip_increment());
            prop_assert_eq!(sync.angle(), expected.rem_euclid(65536) as u16);
        }
    }
}
