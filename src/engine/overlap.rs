use std::collections::HashSet;

use ulid::Ulid;

use crate::limits::*;
use crate::model::{SoldierId, Span};

use super::{Engine, EngineError, SharedDuty};

pub(crate) fn validate_span(span: &Span) -> Result<(), EngineError> {
    if span.end <= span.start {
        return Err(EngineError::Validation("endTime must be after startTime"));
    }
    if span.start < MIN_VALID_TIMESTAMP_MS || span.end > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    if span.duration_ms() > MAX_SPAN_DURATION_MS {
        return Err(EngineError::LimitExceeded("duty window too wide"));
    }
    Ok(())
}

impl Engine {
    /// Soldiers already committed to any *other* duty whose window
    /// intersects `window`. A physical time conflict is absolute, so the
    /// other duty's own constraints are irrelevant; only non-empty
    /// `soldiers` sets (i.e. scheduled duties) contribute. The duty
    /// under evaluation is excluded — no self-conflict.
    pub async fn committed_elsewhere(&self, duty_id: Ulid, window: &Span) -> HashSet<SoldierId> {
        let arcs: Vec<SharedDuty> = self.duties.iter().map(|e| e.value().clone()).collect();
        let mut committed = HashSet::new();
        for arc in arcs {
            let guard = arc.read().await;
            if guard.id == duty_id {
                continue;
            }
            if guard.window.overlaps(window) {
                committed.extend(guard.soldiers.iter().cloned());
            }
        }
        committed
    }
}
