//! Throttle command pipeline.
//!
//! Turns the raw pedal/brake-lever pot readings into a signed torque command
//! in percent: positive is traction, negative is regen. Sensor faults are
//! recovered by clamping inside the same call and reported as `bool`.

use crate::config::{Param, ParamStore, DUAL_THROTTLE_TOLERANCE, POT_SLACK};
use crate::fault::{Fault, FaultSink};
use crate::limiters::{LimitInputs, Limiters};
use crate::math::{fp, iir_filter, Fp};

const HUNDRED: Fp = fp(100);

/// `100 * (value - min) / (max - min)`, zero for an empty span.
fn percent(value: i32, min: i32, max: i32) -> i32 {
    let span = max - min;
    if span == 0 {
        return 0;
    }
    100 * (value - min) / span
}

/// Pot calibration and speed-loop tuning.
#[derive(Debug, Clone, Copy)]
pub struct Throttle {
    potmin: [i32; 2],
    potmax: [i32; 2],
    brknom: Fp,
    brknompedal: Fp,
    brkmax: Fp,
    idle_speed: i32,
    cruise_speed: i32,
    speedkp: Fp,
    speedflt: u32,
    idle_throt_lim: Fp,
    speed_filtered: Fp,
}

impl Throttle {
    pub fn new<S: ParamStore + ?Sized>(params: &S) -> Self {
        let mut throttle = Self {
            potmin: [0; 2],
            potmax: [0; 2],
            brknom: Fp::ZERO,
            brknompedal: Fp::ZERO,
            brkmax: Fp::ZERO,
            idle_speed: 0,
            cruise_speed: 0,
            speedkp: Fp::ZERO,
            speedflt: 0,
            idle_throt_lim: Fp::ZERO,
            speed_filtered: Fp::ZERO,
        };
        throttle.load(params);
        throttle
    }

    /// Reloads calibration from the store. Filter state is kept.
    pub fn load<S: ParamStore + ?Sized>(&mut self, params: &S) {
        self.potmin = [params.get_int(Param::PotMin), params.get_int(Param::Pot2Min)];
        self.potmax = [params.get_int(Param::PotMax), params.get_int(Param::Pot2Max)];
        self.brknom = params.get(Param::BrkNom);
        self.brknompedal = params.get(Param::BrkNomPedal);
        self.brkmax = params.get(Param::BrkMax);
        self.idle_speed = params.get_int(Param::IdleSpeed);
        self.cruise_speed = params.get_int(Param::CruiseSpeed);
        self.speedkp = params.get(Param::SpeedKp);
        self.speedflt = params.get_int(Param::SpeedFlt).clamp(0, 16) as u32;
        self.idle_throt_lim = params.get(Param::IdleThrotLim);
    }

    /// Clamps `pot` into the calibrated span of channel `idx`.
    ///
    /// `min` may exceed `max` for an inverted channel. Returns `false` when the
    /// reading is more than [`POT_SLACK`] outside the span; the value is then
    /// forced to the lower bound.
    pub fn check_and_limit_range(&self, pot: &mut i32, idx: usize) -> bool {
        let lo = self.potmin[idx].min(self.potmax[idx]);
        let hi = self.potmin[idx].max(self.potmax[idx]);

        if *pot + POT_SLACK < lo || *pot > hi + POT_SLACK {
            *pot = lo;
            return false;
        }

        *pot = (*pot).clamp(lo, hi);
        true
    }

    /// Redundancy check between the two throttle channels.
    ///
    /// Both are normalized to 0..100 % (channel 2 may run inverted). On a
    /// mismatch of more than 10 % `pot` is forced to its calibrated minimum
    /// and `false` is returned.
    pub fn check_dual_throttle(&self, pot: &mut i32, pot2: i32) -> bool {
        let potnom2 = if self.potmin[1] > self.potmax[1] {
            100 - percent(pot2, self.potmax[1], self.potmin[1])
        } else {
            percent(pot2, self.potmin[1], self.potmax[1])
        };
        let potnom1 = percent(*pot, self.potmin[0], self.potmax[0]);

        if (potnom2 - potnom1).abs() > DUAL_THROTTLE_TOLERANCE {
            *pot = self.potmin[0];
            return false;
        }
        true
    }

    /// Maps the pedal to `[-brknom, 100]` %.
    ///
    /// The negative end of the pedal and the brake pedal switch both select
    /// regen; the brake lever (second pot), when pulled, scales the regen
    /// ceiling. The lever scale is biased by one percent so that a fully
    /// released lever never commands exactly zero.
    pub fn calc_throttle(&self, pot: i32, pot2: i32, brake_pedal: bool) -> Fp {
        let mut scaled_brk_max = if brake_pedal {
            self.brknompedal
        } else {
            self.brkmax
        };

        if pot2 > self.potmin[1] {
            let potnom2 = percent(pot2, self.potmin[1], self.potmax[1]);
            scaled_brk_max = scaled_brk_max * potnom2 / 100 - fp(1);
        }

        let span = self.potmax[0] - self.potmin[0];
        let mut potnom = if span == 0 {
            Fp::ZERO
        } else {
            Fp::from_num(pot - self.potmin[0]) * (HUNDRED + self.brknom) / span
        };
        potnom -= self.brknom;

        if potnom < Fp::ZERO && self.brknom > Fp::ZERO {
            scaled_brk_max = -(potnom * scaled_brk_max) / self.brknom;
        }

        if brake_pedal || potnom < Fp::ZERO {
            potnom = scaled_brk_max;
        }

        potnom
    }

    /// Idle speed controller, capped at the idle torque limit.
    pub fn calc_idle_speed(&self, speed: i32) -> Fp {
        let speederr = self.idle_speed - speed;
        (self.speedkp * speederr).min(self.idle_throt_lim)
    }

    /// Cruise controller on the low-pass filtered speed, bounded to
    /// `[brkmax, 100]`.
    pub fn calc_cruise_speed(&mut self, speed: i32) -> Fp {
        self.speed_filtered = iir_filter(self.speed_filtered, Fp::from_num(speed), self.speedflt);
        let speederr = Fp::from_num(self.cruise_speed) - self.speed_filtered;
        (self.speedkp * speederr).clamp(self.brkmax.min(Fp::ZERO), HUNDRED)
    }

    /// Seeds the cruise filter so that engaging cruise starts from `speed`.
    pub fn track_speed(&mut self, speed: i32) {
        self.speed_filtered = Fp::from_num(speed);
    }

    pub fn idle_enabled(&self) -> bool {
        self.idle_speed > 0
    }

    pub fn cruise_enabled(&self) -> bool {
        self.cruise_speed > 0
    }

    pub fn pot_min(&self, idx: usize) -> i32 {
        self.potmin[idx]
    }
}

/// Vehicle-side inputs sampled once per command tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandInputs {
    /// Throttle pot [raw]
    pub pot: i32,
    /// Brake lever or redundant throttle channel [raw]
    pub pot2: i32,
    pub brake_pedal: bool,
    pub cruise_active: bool,
    /// Motor speed [rpm]
    pub speed: i32,
    pub limits: LimitInputs,
}

/// Result of one command tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandOutput {
    /// Final torque command [%]
    pub spnt: Fp,
    /// Pedal position before overlays and limiters [%]
    pub potnom: Fp,
    pub pot_ok: bool,
    pub pot2_ok: bool,
    pub derating: bool,
}

/// Throttle, idle/cruise overlays and the limiter cascade composed into one
/// command tick.
pub struct ThrottlePipeline {
    throttle: Throttle,
    limiters: Limiters,
}

impl ThrottlePipeline {
    pub fn new<S: ParamStore + ?Sized>(params: &S) -> Self {
        Self {
            throttle: Throttle::new(params),
            limiters: Limiters::from_params(params),
        }
    }

    pub fn throttle(&self) -> &Throttle {
        &self.throttle
    }

    /// Computes the torque command for this tick and publishes `potnom`,
    /// `finalSpnt` and `tmpDerate`.
    ///
    /// A failed pot check zeroes the pedal request before overlays and posts
    /// the matching fault.
    pub fn process<S, F>(&mut self, inputs: &CommandInputs, params: &mut S, faults: &mut F) -> CommandOutput
    where
        S: ParamStore + ?Sized,
        F: FaultSink + ?Sized,
    {
        self.throttle.load(params);
        self.limiters = Limiters::from_params(params);

        let mut pot = inputs.pot;
        let mut pot2 = inputs.pot2;
        let dual_channel = params.get_int(Param::PotMode) == 1;

        let pot_ok = self.throttle.check_and_limit_range(&mut pot, 0);
        if !pot_ok {
            warn!("Throttle pot out of range: {}", inputs.pot);
            faults.post(Fault::ThrottleRange);
        }

        let pot2_ok = if dual_channel {
            let ok = self.throttle.check_dual_throttle(&mut pot, pot2);
            if !ok {
                warn!("Throttle channels disagree: {} / {}", inputs.pot, inputs.pot2);
                faults.post(Fault::ThrottleMismatch);
            }
            // the second channel is redundant, not a brake lever
            pot2 = self.throttle.pot_min(1);
            ok
        } else {
            let ok = self.throttle.check_and_limit_range(&mut pot2, 1);
            if !ok {
                warn!("Brake pot out of range: {}", inputs.pot2);
                faults.post(Fault::BrakeRange);
            }
            ok
        };

        let mut potnom = if pot_ok && pot2_ok {
            self.throttle.calc_throttle(pot, pot2, inputs.brake_pedal)
        } else {
            Fp::ZERO
        };
        params.set(Param::PotNom, potnom);

        if self.throttle.idle_enabled() && !inputs.brake_pedal {
            potnom = potnom.max(self.throttle.calc_idle_speed(inputs.speed));
        }

        if inputs.cruise_active && self.throttle.cruise_enabled() && !inputs.brake_pedal {
            potnom = potnom.max(self.throttle.calc_cruise_speed(inputs.speed));
        } else {
            self.throttle.track_speed(inputs.speed);
        }

        let mut spnt = potnom.clamp(-HUNDRED, HUNDRED);
        let derating = self.limiters.apply_all(&mut spnt, &inputs.limits);

        params.set(Param::FinalSpnt, spnt);
        params.set_int(Param::TmpDerate, i32::from(derating));

        CommandOutput {
            spnt,
            potnom,
            pot_ok,
            pot2_ok,
            derating,
        }
    }
}
