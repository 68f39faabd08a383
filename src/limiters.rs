//! Cascaded safety limiters.
//!
//! Each limiter is a one-sided clamp on the signed torque command: traction
//! (positive) and regen (negative) are bounded independently, a limiter never
//! flips the sign of the command and never increases its magnitude. The bound
//! each limiter computes depends only on its own inputs, so the cascade gives
//! the same result in any order and re-applying a limiter changes nothing.

use crate::config::{Param, ParamStore, TMPHS_DERATE_BAND, TMPHS_MAX};
use crate::math::{fp, Fp};

const HUNDRED: Fp = fp(100);
const UDC_GAIN: i32 = 5;
const IDC_GAIN: i32 = 10;

/// Measurements feeding the limiter cascade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LimitInputs {
    /// Heat sink temperature [°C]
    pub tmphs: Fp,
    /// Battery management limit signal asserted
    pub bms_active: bool,
    /// DC bus voltage [V]
    pub udc: Fp,
    /// DC link current [A]
    pub idc: Fp,
    /// AC phase current amplitude [A]
    pub iac: Fp,
}

/// Clamps `spnt` into `[-limit, limit]` on the side matching its sign.
#[inline]
fn clamp_signed(spnt: &mut Fp, pos_bound: Fp, neg_bound: Fp) {
    if *spnt >= Fp::ZERO {
        *spnt = (*spnt).min(pos_bound.max(Fp::ZERO));
    } else {
        *spnt = (*spnt).max(neg_bound.min(Fp::ZERO));
    }
}

/// Heat sink derating: full command up to [`TMPHS_MAX`], 50% in the following
/// two degrees, nothing above.
///
/// Returns `true` while derating is active.
pub fn temperature_derate(tmphs: Fp, spnt: &mut Fp) -> bool {
    let limit = if tmphs <= TMPHS_MAX {
        HUNDRED
    } else if tmphs < TMPHS_MAX + TMPHS_DERATE_BAND {
        fp(50)
    } else {
        Fp::ZERO
    };

    clamp_signed(spnt, limit, -limit);
    limit < HUNDRED
}

/// Limiter thresholds loaded from the parameter store.
#[derive(Debug, Clone, Copy)]
pub struct Limiters {
    bmslimhigh: Fp,
    bmslimlow: Fp,
    udcmin: Fp,
    udcmax: Fp,
    idcmin: Fp,
    idcmax: Fp,
    iacmax: Fp,
    iackp: Fp,
}

impl Limiters {
    pub fn from_params<S: ParamStore + ?Sized>(params: &S) -> Self {
        Self {
            bmslimhigh: params.get(Param::BmsLimHigh).clamp(Fp::ZERO, HUNDRED),
            // stored negative, only the magnitude matters
            bmslimlow: params.get(Param::BmsLimLow).abs().min(HUNDRED),
            udcmin: params.get(Param::UdcMin),
            udcmax: params.get(Param::UdcMax),
            idcmin: params.get(Param::IdcMin),
            idcmax: params.get(Param::IdcMax),
            iacmax: params.get(Param::IacMax),
            iackp: params.get(Param::IacKp),
        }
    }

    /// Battery interlock: while the BMS signal is asserted traction is capped
    /// at `bmslimhigh` percent and regen at `bmslimlow` percent of full scale.
    pub fn bms_limit_command(&self, spnt: &mut Fp, dinbms: bool) {
        if dinbms {
            clamp_signed(spnt, self.bmslimhigh, -self.bmslimlow);
        }
    }

    /// DC bus voltage limit: traction fades out 5 %/V as the bus sags towards
    /// `udcmin`, regen fades out 5 %/V as it rises towards `udcmax`.
    pub fn udc_limit_command(&self, spnt: &mut Fp, udc: Fp) {
        let pos = (udc - self.udcmin) * UDC_GAIN;
        let neg = (udc - self.udcmax) * UDC_GAIN;
        clamp_signed(spnt, pos, neg);
    }

    /// DC current limit: 10 %/A of headroom towards `idcmax` (traction) and
    /// `idcmin` (regen).
    pub fn idc_limit_command(&self, spnt: &mut Fp, idc: Fp) {
        let pos = (self.idcmax - idc) * IDC_GAIN;
        let neg = (self.idcmin - idc) * IDC_GAIN;
        clamp_signed(spnt, pos, neg);
    }

    /// AC current limit: proportional loop between the current the driver
    /// request asks for (`iacmax * request / 100`) and the measured amplitude.
    ///
    /// `request` is the command before the cascade; the bound does not depend
    /// on the value being limited.
    pub fn iac_limit_command(&self, spnt: &mut Fp, request: Fp, iac: Fp) {
        let iacspnt = self.iacmax * request.abs() / 100;
        let iacerr = iacspnt - iac.abs();
        let res = (iacerr * self.iackp).max(Fp::ZERO);
        clamp_signed(spnt, res, -res);
    }

    /// Runs the whole cascade. Returns `true` while temperature derating is
    /// active.
    pub fn apply_all(&self, spnt: &mut Fp, inputs: &LimitInputs) -> bool {
        let request = *spnt;
        let derating = temperature_derate(inputs.tmphs, spnt);
        self.bms_limit_command(spnt, inputs.bms_active);
        self.udc_limit_command(spnt, inputs.udc);
        self.idc_limit_command(spnt, inputs.idc);
        self.iac_limit_command(spnt, request, inputs.iac);
        derating
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParamTable;
    use crate::math::fp_milli;
    use proptest::prelude::*;

    fn limiters() -> Limiters {
        let mut params = ParamTable::new();
        params.set(Param::BmsLimHigh, fp(50));
        params.set(Param::BmsLimLow, fp(-20));
        params.set(Param::UdcMin, fp(300));
        params.set(Param::UdcMax, fp(400));
        params.set(Param::IdcMin, fp(-100));
        params.set(Param::IdcMax, fp(200));
        params.set(Param::IacMax, fp(300));
        params.set(Param::IacKp, fp(1));
        Limiters::from_params(&params)
    }

    fn quiet_inputs() -> LimitInputs {
        LimitInputs {
            tmphs: fp(25),
            bms_active: false,
            udc: fp(350),
            idc: fp(0),
            iac: fp(0),
        }
    }

    #[test]
    fn test_temperature_bands() {
        let eps = fp_milli(1);

        let mut spnt = fp(80);
        assert!(!temperature_derate(TMPHS_MAX - eps, &mut spnt));
        assert_eq!(spnt, fp(80));

        let mut spnt = fp(80);
        assert!(temperature_derate(TMPHS_MAX + fp(1), &mut spnt));
        assert_eq!(spnt, fp(50));

        let mut spnt = fp(-80);
        assert!(temperature_derate(TMPHS_MAX + fp(1), &mut spnt));
        assert_eq!(spnt, fp(-50));

        let mut spnt = fp(80);
        assert!(temperature_derate(TMPHS_MAX + fp(2), &mut spnt));
        assert_eq!(spnt, Fp::ZERO);
    }

    #[test]
    fn test_bms_caps_each_direction_independently() {
        let l = limiters();

        let mut spnt = fp(90);
        l.bms_limit_command(&mut spnt, true);
        assert_eq!(spnt, fp(50));

        let mut spnt = fp(-90);
        l.bms_limit_command(&mut spnt, true);
        assert_eq!(spnt, fp(-20));

        let mut spnt = fp(90);
        l.bms_limit_command(&mut spnt, false);
        assert_eq!(spnt, fp(90));
    }

    #[test]
    fn test_udc_limits() {
        let l = limiters();

        // 4 V above udcmin -> at most 20 %
        let mut spnt = fp(100);
        l.udc_limit_command(&mut spnt, fp(304));
        assert_eq!(spnt, fp(20));

        // below udcmin -> no traction at all
        let mut spnt = fp(100);
        l.udc_limit_command(&mut spnt, fp(250));
        assert_eq!(spnt, Fp::ZERO);

        // 2 V below udcmax -> regen limited to -10 %
        let mut spnt = fp(-100);
        l.udc_limit_command(&mut spnt, fp(398));
        assert_eq!(spnt, fp(-10));

        // regen is not affected by a sagging bus
        let mut spnt = fp(-30);
        l.udc_limit_command(&mut spnt, fp(250));
        assert_eq!(spnt, fp(-30));
    }

    #[test]
    fn test_idc_limits() {
        let l = limiters();

        let mut spnt = fp(100);
        l.idc_limit_command(&mut spnt, fp(195));
        assert_eq!(spnt, fp(50));

        let mut spnt = fp(-100);
        l.idc_limit_command(&mut spnt, fp(-98));
        assert_eq!(spnt, fp(-20));
    }

    #[test]
    fn test_iac_limit_follows_request() {
        let l = limiters();

        // request 50 % -> 150 A target, 140 A measured -> 10 % bound
        let mut spnt = fp(50);
        l.iac_limit_command(&mut spnt, fp(50), fp(140));
        assert_eq!(spnt, fp(10));

        let mut spnt = fp(-50);
        l.iac_limit_command(&mut spnt, fp(-50), fp(140));
        assert_eq!(spnt, fp(-10));

        // measured above target -> nothing left
        let mut spnt = fp(50);
        l.iac_limit_command(&mut spnt, fp(50), fp(200));
        assert_eq!(spnt, Fp::ZERO);
    }

    #[test]
    fn test_cascade_quiet_inputs_pass_through() {
        let l = limiters();
        let mut spnt = fp(40);
        let derating = l.apply_all(&mut spnt, &LimitInputs { iac: fp(0), ..quiet_inputs() });
        assert!(!derating);
        assert_eq!(spnt, fp(40));
    }

    fn any_inputs() -> impl Strategy<Value = (i32, i32, bool, i32, i32, i32)> {
        (-100i32..=100, 0i32..=100, any::<bool>(), 200i32..=500, -200i32..=300, 0i32..=400)
    }

    proptest! {
        #[test]
        fn prop_each_limiter_idempotent_and_tightening(
            (cmd, tmphs, bms, udc, idc, iac) in any_inputs()
        ) {
            let l = limiters();
            let start = fp(cmd);
            let stages: [&dyn Fn(&mut Fp); 5] = [
                &|s: &mut Fp| { temperature_derate(fp(tmphs), s); },
                &|s: &mut Fp| l.bms_limit_command(s, bms),
                &|s: &mut Fp| l.udc_limit_command(s, fp(udc)),
                &|s: &mut Fp| l.idc_limit_command(s, fp(idc)),
                &|s: &mut Fp| l.iac_limit_command(s, start, fp(iac)),
            ];

            for stage in stages {
                let mut once = start;
                stage(&mut once);
                let mut twice = once;
                stage(&mut twice);

                prop_assert_eq!(once, twice);
                prop_assert!(once.abs() <= start.abs());
                prop_assert!(once == Fp::ZERO || once.signum() == start.signum());
            }
        }

        #[test]
        fn prop_cascade_order_does_not_matter(
            (cmd, tmphs, bms, udc, idc, iac) in any_inputs()
        ) {
            let l = limiters();
            let inputs = LimitInputs {
                tmphs: fp(tmphs),
                bms_active: bms,
                udc: fp(udc),
                idc: fp(idc),
                iac: fp(iac),
            };

            let mut forward = fp(cmd);
            l.apply_all(&mut forward, &inputs);

            let request = fp(cmd);
            let mut reverse = request;
            l.iac_limit_command(&mut reverse, request, inputs.iac);
            l.idc_limit_command(&mut reverse, inputs.idc);
            l.udc_limit_command(&mut reverse, inputs.udc);
            l.bms_limit_command(&mut reverse, inputs.bms_active);
            temperature_derate(inputs.tmphs, &mut reverse);

            prop_assert_eq!(forward, reverse);
        }
    }
}
