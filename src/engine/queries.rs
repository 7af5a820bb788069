use ulid::Ulid;

use crate::model::*;

use super::{Engine, EngineError, SharedDuty, SharedSoldier};

/// Conjunctive soldier listing filter; `None`/empty means "any".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SoldierFilter {
    pub name: Option<String>,
    pub rank: Option<Rank>,
    /// Every listed tag must be present on the soldier.
    pub limitations: Vec<String>,
}

/// Conjunctive duty listing filter; `None` means "any".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DutyFilter {
    pub name: Option<String>,
    pub status: Option<DutyStatus>,
}

impl Engine {
    pub async fn soldier_snapshot(&self, id: &SoldierId) -> Result<Soldier, EngineError> {
        let soldier = self
            .get_soldier(id)
            .ok_or_else(|| EngineError::SoldierNotFound(id.clone()))?;
        let guard = soldier.read().await;
        Ok(guard.clone())
    }

    pub async fn duty_snapshot(&self, id: &Ulid) -> Result<Duty, EngineError> {
        let duty = self.get_duty(id).ok_or(EngineError::NotFound(*id))?;
        let guard = duty.read().await;
        Ok(guard.clone())
    }

    pub async fn list_soldiers(&self, filter: &SoldierFilter) -> Vec<Soldier> {
        let arcs: Vec<SharedSoldier> = self.soldiers.iter().map(|e| e.value().clone()).collect();
        let mut soldiers = Vec::new();
        for arc in arcs {
            let guard = arc.read().await;
            if let Some(ref name) = filter.name
                && guard.name != *name
            {
                continue;
            }
            if let Some(rank) = filter.rank
                && guard.rank != rank
            {
                continue;
            }
            if !filter
                .limitations
                .iter()
                .all(|tag| guard.limitations.contains(tag))
            {
                continue;
            }
            soldiers.push(guard.clone());
        }
        soldiers.sort_by(|a, b| a.id.cmp(&b.id));
        soldiers
    }

    pub async fn list_duties(&self, filter: &DutyFilter) -> Vec<Duty> {
        let arcs: Vec<SharedDuty> = self.duties.iter().map(|e| e.value().clone()).collect();
        let mut duties = Vec::new();
        for arc in arcs {
            let guard = arc.read().await;
            if let Some(ref name) = filter.name
                && guard.name != *name
            {
                continue;
            }
            if let Some(status) = filter.status
                && guard.status != status
            {
                continue;
            }
            duties.push(guard.clone());
        }
        duties.sort_by(|a, b| a.id.cmp(&b.id));
        duties
    }

    /// Ids of scheduled duties that have not started yet and list the
    /// soldier. With `tags` non-empty, only duties whose constraints
    /// intersect the tags are returned — the guard query behind
    /// soldier deletion and limitation updates.
    pub(super) async fn scheduled_future_duties(
        &self,
        soldier_id: &SoldierId,
        tags: &[String],
        now: Ms,
    ) -> Vec<Ulid> {
        let arcs: Vec<SharedDuty> = self.duties.iter().map(|e| e.value().clone()).collect();
        let mut hits = Vec::new();
        for arc in arcs {
            let guard = arc.read().await;
            if guard.status != DutyStatus::Scheduled
                || guard.window.start < now
                || !guard.soldiers.contains(soldier_id)
            {
                continue;
            }
            if !tags.is_empty() && !tags.iter().any(|t| guard.constraints.contains(t)) {
                continue;
            }
            hits.push(guard.id);
        }
        hits.sort();
        hits
    }
}
