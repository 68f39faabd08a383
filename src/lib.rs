//! Inverter control core
//!
//! Throttle command pipeline, cascaded safety limiters and the field-oriented
//! current control cycle of a motor-drive inverter. Everything in here runs
//! from a single periodic context; hardware is reached through the
//! collaborator traits in [`foc`] and [`fault`].

#![cfg_attr(not(test), no_std)]

mod fmt;

pub mod calibration;
pub mod config;
pub mod fault;
pub mod fieldweak;
pub mod foc;
pub mod limiters;
pub mod math;
pub mod pwm_generation;
pub mod sync;
pub mod throttle;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{OpMode, Param, ParamStore, ParamTable};
pub use fault::{Fault, FaultSink};
pub use math::Fp;
pub use pwm_generation::{CurrentSample, PwmGeneration, RunContext};
pub use throttle::{CommandInputs, CommandOutput, Throttle, ThrottlePipeline};
