//! Torque to d/q current mapping with field weakening.
//!
//! The torque request is split into a d and a q share. Above the start
//! frequency extra field-weakening current is scheduled on top, then the
//! whole vector is scaled back isotropically to the overdrive ceiling.

use libm::sqrtf;

use crate::config::{Param, ParamStore};
use crate::math::{fp_from_f32, iir_filter, Fp};

/// Three-segment field-weakening schedule over electrical frequency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FwSchedule {
    pub frq_start: f32,
    pub frq_mid: f32,
    pub frq_end: f32,
    pub id_mid: f32,
    pub id_end: f32,
    pub iq_mid: f32,
    pub iq_end: f32,
}

impl FwSchedule {
    pub fn from_params<S: ParamStore + ?Sized>(params: &S) -> Self {
        Self {
            frq_start: params.get_float(Param::FwFrqStart),
            frq_mid: params.get_float(Param::FwFrqMid),
            frq_end: params.get_float(Param::FwFrqEnd),
            id_mid: params.get_float(Param::FwIdMid),
            id_end: params.get_float(Param::FwIdEnd),
            iq_mid: params.get_float(Param::FwIqMid),
            iq_end: params.get_float(Param::FwIqEnd),
        }
    }

    /// `(fw_id, fw_iq)` at frequency `frq`.
    ///
    /// Zero up to `frq_start`, ramp to the mid values at `frq_mid`, ramp to
    /// the end values at `frq_end`, constant beyond. Each branch is only
    /// reached with a non-empty segment, so a degenerate schedule collapses
    /// into steps instead of dividing by zero.
    pub fn at(&self, frq: f32) -> (f32, f32) {
        if frq > self.frq_end {
            (self.id_end, self.iq_end)
        } else if frq > self.frq_mid {
            let t = (frq - self.frq_mid) / (self.frq_end - self.frq_mid);
            (
                self.id_mid + (self.id_end - self.id_mid) * t,
                self.iq_mid + (self.iq_end - self.iq_mid) * t,
            )
        } else if frq > self.frq_start {
            let t = (frq - self.frq_start) / (self.frq_mid - self.frq_start);
            (self.id_mid * t, self.iq_mid * t)
        } else {
            (0.0, 0.0)
        }
    }
}

/// Current references for the d and q loops.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CurrentRefs {
    pub id: Fp,
    pub iq: Fp,
}

/// Torque to current mapper, owns its frequency filter.
#[derive(Debug, Clone, Default)]
pub struct FieldWeakening {
    frq_filtered: Fp,
}

impl FieldWeakening {
    pub const fn new() -> Self {
        Self {
            frq_filtered: Fp::ZERO,
        }
    }

    /// Maps `torque` [%] at electrical frequency `frq` to current references.
    ///
    /// `throtcur` [A/%] scales the request, `idiqsplit` [%] is the d share,
    /// `overdrive` multiplies the 100 % ceiling. The d reference is never
    /// positive; the q reference carries the sign of the torque request.
    /// Publishes `ifw ifwq iAbs norm is idReq iqReq`.
    pub fn currents<S: ParamStore + ?Sized>(&mut self, torque: f32, frq: Fp, params: &mut S) -> CurrentRefs {
        let shift = params.get_int(Param::FwFrqFlt).clamp(0, 16) as u32;
        self.frq_filtered = iir_filter(self.frq_filtered, frq, shift);

        let throtcur = params.get_float(Param::ThrotCur);
        let split = params.get_float(Param::IdIqSplit);
        let overdrive = params.get_float(Param::Overdrive);

        let (fw_id, fw_iq) = FwSchedule::from_params(params).at(self.frq_filtered.to_num());
        params.set_float(Param::Ifw, fw_id);
        params.set_float(Param::Ifwq, fw_iq);

        // magnitude only, the sign is applied to iq at the end
        let mut is = throtcur * torque.abs();

        let id = (-(split * is / 100.0).abs() - fw_id).max(-100.0 * throtcur);
        let iq = ((100.0 - split) * is / 100.0 + fw_iq).abs().min(100.0 * throtcur);

        is += fw_id.abs() + fw_iq.abs();
        is = is.min(overdrive * throtcur).max(0.0);

        let i_abs = sqrtf(iq * iq + id * id);
        let norm = if i_abs > is { is / i_abs } else { 1.0 };

        params.set_float(Param::IAbs, i_abs);
        params.set_float(Param::Norm, norm);
        params.set_float(Param::Is, is);
        params.set_float(Param::IdReq, id * norm);
        params.set_float(Param::IqReq, iq);

        let sign = if torque < 0.0 { -1.0 } else { 1.0 };
        CurrentRefs {
            id: fp_from_f32(id * norm),
            iq: fp_from_f32(sign * (iq * norm).abs()),
        }
    }

    pub fn filtered_frequency(&self) -> Fp {
        self.frq_filtered
    }
}
