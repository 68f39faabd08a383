//! Fault codes and the fire-and-forget reporting seam.

/// Faults the control core can post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fault {
    /// Phase current exceeded the software overcurrent limit; the drive was
    /// switched off.
    OvercurrentSw,
    /// Throttle pot outside its calibrated span plus slack.
    ThrottleRange,
    /// Brake/second pot outside its calibrated span plus slack.
    BrakeRange,
    /// Redundant throttle channels disagree.
    ThrottleMismatch,
}

impl Fault {
    /// Stable numeric code used by the fault log transport.
    pub fn code(self) -> u8 {
        match self {
            Fault::OvercurrentSw => 1,
            Fault::ThrottleRange => 2,
            Fault::BrakeRange => 3,
            Fault::ThrottleMismatch => 4,
        }
    }

    /// Whether the fault ends the current run.
    pub fn is_fatal(self) -> bool {
        matches!(self, Fault::OvercurrentSw)
    }
}

/// Receiver for posted faults. Posting never blocks and returns nothing.
pub trait FaultSink {
    fn post(&mut self, fault: Fault);
}
