//! The duty lifecycle state machine:
//! `unscheduled` → `scheduled` → `canceled`.
//!
//! There is no direct `unscheduled` → `canceled` transition: cancellation
//! requires the duty to have been scheduled first. Both transitions also
//! require the start time to still be in the future — a duty already
//! underway or finished is frozen.

use crate::model::{Duty, DutyStatus, Ms};

use super::EngineError;

pub fn can_schedule(duty: &Duty, now: Ms) -> bool {
    duty.status == DutyStatus::Unscheduled && duty.window.start > now
}

pub fn can_cancel(duty: &Duty, now: Ms) -> bool {
    duty.status == DutyStatus::Scheduled && duty.window.start > now
}

/// Structural edits (timing, bounds, constraints, headcount) are only
/// permitted before scheduling.
pub fn can_modify(duty: &Duty) -> bool {
    duty.status == DutyStatus::Unscheduled
}

pub fn ensure_schedulable(duty: &Duty, now: Ms) -> Result<(), EngineError> {
    if can_schedule(duty, now) {
        Ok(())
    } else {
        Err(EngineError::InvalidTransition {
            from: duty.status,
            action: "schedule",
        })
    }
}

pub fn ensure_cancelable(duty: &Duty, now: Ms) -> Result<(), EngineError> {
    if can_cancel(duty, now) {
        Ok(())
    } else {
        Err(EngineError::InvalidTransition {
            from: duty.status,
            action: "cancel",
        })
    }
}

pub fn ensure_modifiable(duty: &Duty) -> Result<(), EngineError> {
    if can_modify(duty) {
        Ok(())
    } else {
        Err(EngineError::InvalidTransition {
            from: duty.status,
            action: "modify",
        })
    }
}
