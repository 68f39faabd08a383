//! Field-oriented motor cycle.
//!
//! [`PwmGeneration`] owns every piece of state that lives across control
//! periods: synchronizer, current and field-weakening controllers, filters,
//! offset calibration and the start-up window. Hardware and parameters are
//! lent to it for one call at a time through [`RunContext`].

use crate::calibration::OffsetCalibration;
use crate::config::{
    pinswap, OpMode, Param, ParamStore, DC_CURRENT_FACTOR, FRQ_FILTER_SHIFT, MOD_INDEX_MARGIN,
};
use crate::fault::{Fault, FaultSink};
use crate::fieldweak::FieldWeakening;
use crate::foc::{CoordinateTransform, Encoder, PiController, PwmOutput};
use crate::math::{digit_to_degree, iir_filter, Fp, FpWide};
use crate::sync::AngleSync;

/// Calling frequency of the field-weakening controller [Hz]
const FW_CONTROLLER_FREQUENCY: u32 = 100;

/// Raw ADC readings of the two measured phase currents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CurrentSample {
    pub il1: i32,
    pub il2: i32,
}

/// Collaborators lent to the motor cycle for one period.
pub struct RunContext<'a, E: ?Sized, P: ?Sized, S: ?Sized, F: ?Sized> {
    pub encoder: &'a mut E,
    pub pwm: &'a mut P,
    pub params: &'a mut S,
    pub faults: &'a mut F,
}

pub struct PwmGeneration<T> {
    foc: T,
    sync: AngleSync,
    fw: FieldWeakening,
    d_controller: PiController,
    q_controller: PiController,
    fw_controller: PiController,
    calibration: OffsetCalibration,
    ilofs: [i32; 2],
    /// Control periods left in the start-up window
    initwait: i32,
    frq_filtered: Fp,
    idc_filtered: Fp,
    curkp: i32,
    curki: i32,
    /// Timer channel of phase U, V, W
    channels: [usize; 3],
    shift_for_timer: u32,
    output_enabled: bool,
    tripped: bool,
}

impl<T: CoordinateTransform> PwmGeneration<T> {
    pub fn new(foc: T) -> Self {
        Self {
            foc,
            sync: AngleSync::new(),
            fw: FieldWeakening::new(),
            d_controller: PiController::new(),
            q_controller: PiController::new(),
            fw_controller: PiController::new(),
            calibration: OffsetCalibration::new(),
            ilofs: [0; 2],
            initwait: 0,
            frq_filtered: Fp::ZERO,
            idc_filtered: Fp::ZERO,
            curkp: 0,
            curki: 0,
            channels: [0, 1, 2],
            shift_for_timer: 0,
            output_enabled: false,
            tripped: false,
        }
    }

    /// Prepares a (re)start at control frequency `pwmfrq`.
    ///
    /// Opens a half second start-up window during which the bridge stays off
    /// and the current offsets are calibrated. Clears the overcurrent latch.
    pub fn init<E, S>(&mut self, pwmfrq: u32, shift_for_timer: u32, encoder: &mut E, params: &S)
    where
        E: Encoder + ?Sized,
        S: ParamStore + ?Sized,
    {
        let max_vd = self.foc.max_modulation_index() - MOD_INDEX_MARGIN;

        self.sync.configure(pwmfrq, params);
        encoder.set_pwm_frequency(pwmfrq);
        self.initwait = i32::try_from(pwmfrq / 2).unwrap_or(i32::MAX);
        self.shift_for_timer = shift_for_timer;
        self.tripped = false;
        self.calibration.reset();

        for controller in [&mut self.d_controller, &mut self.q_controller] {
            controller.reset_integrator();
            controller.set_calling_frequency(pwmfrq);
            controller.set_min_max_y(-max_vd, max_vd);
        }

        // up to 100 % of the throttle current for extra field weakening
        let throtcur = params.get(Param::ThrotCur);
        self.fw_controller.reset_integrator();
        self.fw_controller.set_calling_frequency(FW_CONTROLLER_FREQUENCY);
        self.fw_controller
            .set_min_max_y((throtcur * -100).to_num::<i32>(), 0);

        let swap = params.get_int(Param::PinSwap);
        self.channels = if swap & pinswap::SWAP_PWM13 != 0 {
            [2, 1, 0]
        } else if swap & pinswap::SWAP_PWM23 != 0 {
            [0, 2, 1]
        } else {
            [0, 1, 2]
        };

        info!(
            "PWM init: {} Hz, start-up window {} periods, slip increment {}",
            pwmfrq,
            self.initwait,
            self.sync.slip_increment()
        );
    }

    /// Base gains of the current loops and gains of the field-weakening
    /// controller.
    pub fn set_controller_gains(&mut self, kp: i32, ki: i32, fwkp: i32, fwki: i32) {
        self.q_controller.set_gains(kp, ki);
        self.d_controller.set_gains(kp, ki);
        self.fw_controller.set_gains(fwkp, fwki);
        self.curkp = kp;
        self.curki = ki;
    }

    /// Maps a torque command [%] to the d/q current references.
    pub fn set_torque_percent<S: ParamStore + ?Sized>(&mut self, torque: f32, params: &mut S) {
        let refs = self.fw.currents(torque, self.sync.frequency(), params);
        self.q_controller.set_ref(refs.iq);
        self.d_controller.set_ref(refs.id);
    }

    /// Zero-current ADC readings of both channels.
    pub fn set_current_offset(&mut self, il1: i32, il2: i32) {
        self.ilofs = [il1, il2];
    }

    /// One control period.
    ///
    /// RUN and MANUAL execute the current control cycle. The power stage
    /// modes BOOST, BUCK and AC-HEAT only end the start-up window. OFF
    /// switches the bridge off once and otherwise does nothing.
    pub fn run<E, P, S, F>(&mut self, ctx: &mut RunContext<'_, E, P, S, F>, sample: CurrentSample)
    where
        E: Encoder + ?Sized,
        P: PwmOutput + ?Sized,
        S: ParamStore + ?Sized,
        F: FaultSink + ?Sized,
    {
        match ctx.params.op_mode() {
            mode @ (OpMode::Run | OpMode::Manual) => self.run_foc(mode, ctx, sample),
            OpMode::Boost | OpMode::Buck | OpMode::AcHeat => self.initwait = 0,
            OpMode::Off => {
                if self.output_enabled {
                    self.set_output(&mut *ctx.pwm, false);
                }
            }
        }
    }

    fn run_foc<E, P, S, F>(&mut self, mode: OpMode, ctx: &mut RunContext<'_, E, P, S, F>, sample: CurrentSample)
    where
        E: Encoder + ?Sized,
        P: PwmOutput + ?Sized,
        S: ParamStore + ?Sized,
        F: FaultSink + ?Sized,
    {
        let dir = ctx.params.get_int(Param::Dir);
        let kpfrqgain = ctx.params.get(Param::CurKpFrqGain);
        let kifrqgain = ctx.params.get(Param::CurKiFrqGain);

        ctx.encoder.update_rotor_angle(dir);
        self.sync.calc_next_angle(dir, &*ctx.encoder, &mut *ctx.params);
        self.foc.set_angle(self.sync.angle());

        let frq = self.sync.frequency();
        self.frq_filtered = iir_filter(self.frq_filtered, frq, FRQ_FILTER_SHIFT);
        let frq_int = self.frq_filtered.to_num::<i32>();

        let kp = self.curkp + (kpfrqgain * frq_int).to_num::<i32>();
        let ki = self.curki + (kifrqgain * frq_int).to_num::<i32>();
        for controller in [&mut self.d_controller, &mut self.q_controller] {
            controller.set_proportional_gain(kp);
            controller.set_integral_gain(ki);
        }

        let (id, iq) = match self.process_currents(sample, &mut *ctx.params, &mut *ctx.faults) {
            Ok(currents) => currents,
            Err(_) => {
                self.set_output(&mut *ctx.pwm, false);
                return;
            }
        };

        if mode == OpMode::Manual {
            self.d_controller.set_ref(ctx.params.get(Param::ManualId));
            self.q_controller.set_ref(ctx.params.get(Param::ManualIq));
        }

        let ud = self.d_controller.run(id);
        let qlimit = self.foc.q_limit(ud);
        let neg_q_lim = ctx.params.get_int(Param::NegQLim);
        let min_uq = if dir < 0 { -qlimit } else { -neg_q_lim * qlimit };
        let max_uq = if dir > 0 { qlimit } else { neg_q_lim * qlimit };
        self.q_controller.set_min_max_y(min_uq, max_uq);
        let uq = self.q_controller.run(iq);

        let duties = self.foc.inv_park_clarke(ud, uq);

        let idc = self.dc_current(id, iq, ud, uq);
        let idcflt = ctx.params.get_int(Param::IdcFlt).clamp(0, 16) as u32;
        self.idc_filtered = iir_filter(self.idc_filtered, idc, idcflt);

        ctx.params.set(Param::FStat, frq);
        ctx.params.set(Param::Angle, digit_to_degree(self.sync.angle()));
        ctx.params.set(Param::Idc, self.idc_filtered);
        ctx.params.set_int(Param::Amp, qlimit);
        ctx.params.set_int(Param::Uq, uq);
        ctx.params.set_int(Param::Ud, ud);

        let stopped = frq == Fp::ZERO
            && self.d_controller.get_ref() == Fp::ZERO
            && self.q_controller.get_ref() == Fp::ZERO;

        if stopped || self.initwait > 0 {
            self.set_output(&mut *ctx.pwm, false);
            self.d_controller.reset_integrator();
            self.q_controller.reset_integrator();
            self.fw_controller.reset_integrator();
            self.run_offset_calibration(sample);
        } else {
            self.set_output(&mut *ctx.pwm, true);
        }

        for (phase, &duty) in duties.iter().enumerate() {
            ctx.pwm.set_duty(self.channels[phase], duty >> self.shift_for_timer);
        }
    }

    /// Converts the raw sample, transforms it to `(id, iq)` and checks the
    /// overcurrent limit. On overcurrent the mode is forced to OFF and the
    /// fault is posted.
    pub fn process_currents<S, F>(&mut self, sample: CurrentSample, params: &mut S, faults: &mut F) -> Result<(Fp, Fp), Fault>
    where
        S: ParamStore + ?Sized,
        F: FaultSink + ?Sized,
    {
        let ocurlim = params.get(Param::OcurLim).abs();

        if self.initwait > 0 {
            self.initwait -= 1;
        }

        let il1 = phase_current(sample.il1, self.ilofs[0], params.get(Param::Il1Gain));
        let il2 = phase_current(sample.il2, self.ilofs[1], params.get(Param::Il2Gain));

        let (id, iq) = if params.get_int(Param::PinSwap) & pinswap::SWAP_CURRENTS != 0 {
            self.foc.park_clarke(il2, il1)
        } else {
            self.foc.park_clarke(il1, il2)
        };

        params.set(Param::Id, id);
        params.set(Param::Iq, iq);
        params.set(Param::Il1, il1);
        params.set(Param::Il2, il2);

        if il1.abs() > ocurlim || il2.abs() > ocurlim {
            error!(
                "Overcurrent trip: il1={} A il2={} A",
                il1.to_num::<f32>(),
                il2.to_num::<f32>()
            );
            params.set_op_mode(OpMode::Off);
            self.tripped = true;
            faults.post(Fault::OvercurrentSw);
            return Err(Fault::OvercurrentSw);
        }

        Ok((id, iq))
    }

    /// Power balance estimate `(iq·uq + id·ud) / modMax` including inverter
    /// losses.
    fn dc_current(&self, id: Fp, iq: Fp, ud: i32, uq: i32) -> Fp {
        let mod_max = i64::from(self.foc.max_modulation_index().max(1));
        let power = FpWide::from_num(iq) * i64::from(uq) + FpWide::from_num(id) * i64::from(ud);
        Fp::saturating_from_num(power / mod_max).saturating_mul(Fp::from_num(DC_CURRENT_FACTOR))
    }

    fn run_offset_calibration(&mut self, sample: CurrentSample) {
        if let Some((il1, il2)) = self.calibration.add_sample(sample.il1, sample.il2) {
            debug!("Current offsets calibrated: {} / {}", il1, il2);
            self.set_current_offset(il1, il2);
        }
    }

    fn set_output<P: PwmOutput + ?Sized>(&mut self, pwm: &mut P, enable: bool) {
        if enable {
            pwm.enable_output();
            if !self.output_enabled {
                info!("PWM output enabled");
                // next disabled window starts a fresh calibration pass
                self.calibration.reset();
            }
        } else {
            pwm.disable_output();
            if self.output_enabled {
                info!("PWM output disabled");
            }
        }
        self.output_enabled = enable;
    }

    /// Overcurrent latch, cleared by [`init`](Self::init).
    pub fn is_tripped(&self) -> bool {
        self.tripped
    }

    pub fn output_enabled(&self) -> bool {
        self.output_enabled
    }

    /// Control periods left in the start-up window
    pub fn init_wait(&self) -> i32 {
        self.initwait
    }

    pub fn current_offsets(&self) -> (i32, i32) {
        (self.ilofs[0], self.ilofs[1])
    }

    pub fn sync(&self) -> &AngleSync {
        &self.sync
    }

    pub fn transform(&self) -> &T {
        &self.foc
    }

    pub fn d_controller(&self) -> &PiController {
        &self.d_controller
    }

    pub fn q_controller(&self) -> &PiController {
        &self.q_controller
    }
}

/// `(raw - offset) / gain` [A]; zero for a zero gain.
fn phase_current(raw: i32, offset: i32, gain: Fp) -> Fp {
    if gain == Fp::ZERO {
        return Fp::ZERO;
    }
    Fp::from_num(raw - offset) / gain
}
