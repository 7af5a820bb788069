use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::lifecycle;
use super::overlap::validate_span;
use super::{justice, Engine, EngineError, SharedDuty, SharedSoldier};

fn validate_name(name: &str) -> Result<(), EngineError> {
    let len = name.chars().count();
    if !(MIN_NAME_LEN..=MAX_NAME_LEN).contains(&len) {
        return Err(EngineError::Validation("name must be 3 to 50 characters"));
    }
    Ok(())
}

fn validate_tags(tags: &[String]) -> Result<(), EngineError> {
    if tags.len() > MAX_TAGS_PER_ENTITY {
        return Err(EngineError::LimitExceeded("too many tags"));
    }
    for tag in tags {
        if tag.is_empty() {
            return Err(EngineError::Validation("empty tag"));
        }
        if tag.len() > MAX_TAG_LEN {
            return Err(EngineError::LimitExceeded("tag too long"));
        }
    }
    Ok(())
}

/// Limitations are stored lower-cased; constraints verbatim.
fn normalize_limitations(tags: Vec<String>) -> Result<Vec<String>, EngineError> {
    validate_tags(&tags)?;
    Ok(tags.into_iter().map(|t| t.to_lowercase()).collect())
}

fn validate_value(value: f64) -> Result<(), EngineError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(EngineError::Validation("value must be a positive number"));
    }
    Ok(())
}

fn validate_headcount(required: u32) -> Result<(), EngineError> {
    if required == 0 {
        return Err(EngineError::Validation("soldiersRequired must be at least 1"));
    }
    if required > MAX_SOLDIERS_PER_DUTY {
        return Err(EngineError::LimitExceeded("soldiersRequired too large"));
    }
    Ok(())
}

fn validate_rank_bounds(min: Option<Rank>, max: Option<Rank>) -> Result<(), EngineError> {
    if let (Some(min), Some(max)) = (min, max)
        && min > max
    {
        return Err(EngineError::Validation("minRank cannot exceed maxRank"));
    }
    Ok(())
}

impl Engine {
    // ── Soldier intake and maintenance ───────────────────────

    pub async fn create_soldier(
        &self,
        id: SoldierId,
        name: String,
        rank: Rank,
        limitations: Vec<String>,
    ) -> Result<Soldier, EngineError> {
        if self.soldiers.len() >= MAX_SOLDIERS_PER_TENANT {
            return Err(EngineError::LimitExceeded("too many soldiers"));
        }
        validate_name(&name)?;
        let limitations = normalize_limitations(limitations)?;
        if self.soldiers.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }

        let now = self.now();
        let event = Event::SoldierCreated {
            id: id.clone(),
            name: name.clone(),
            rank,
            limitations: limitations.clone(),
            at: now,
        };
        self.wal_append(&event).await?;
        let soldier = Soldier::new(id.clone(), name, rank, limitations.into_iter().collect(), now);
        self.soldiers
            .insert(id, Arc::new(RwLock::new(soldier.clone())));
        Ok(soldier)
    }

    pub async fn update_soldier(
        &self,
        id: SoldierId,
        patch: SoldierPatch,
    ) -> Result<Soldier, EngineError> {
        if let Some(ref name) = patch.name {
            validate_name(name)?;
        }
        let limitations = match patch.limitations {
            Some(tags) => Some(normalize_limitations(tags)?),
            None => None,
        };
        let soldier = self
            .get_soldier(&id)
            .ok_or_else(|| EngineError::SoldierNotFound(id.clone()))?;
        let mut guard = soldier.write().await;

        let event = Event::SoldierUpdated {
            id,
            name: patch.name,
            rank: patch.rank,
            limitations,
            at: self.now(),
        };
        self.persist_and_apply_soldier(&mut guard, &event).await?;
        Ok(guard.clone())
    }

    /// Union new limitations into the soldier's set. Rejected if any of
    /// them collides with the constraints of a scheduled duty the
    /// soldier is committed to that has not started yet.
    pub async fn add_limitations(
        &self,
        id: SoldierId,
        limitations: Vec<String>,
    ) -> Result<Soldier, EngineError> {
        let limitations = normalize_limitations(limitations)?;
        let soldier = self
            .get_soldier(&id)
            .ok_or_else(|| EngineError::SoldierNotFound(id.clone()))?;

        let conflicting = self
            .scheduled_future_duties(&id, &limitations, self.now())
            .await;
        if !conflicting.is_empty() {
            return Err(EngineError::HasFutureDuty(id));
        }

        let mut guard = soldier.write().await;
        let event = Event::SoldierLimitationsAdded {
            id,
            limitations,
            at: self.now(),
        };
        self.persist_and_apply_soldier(&mut guard, &event).await?;
        Ok(guard.clone())
    }

    /// A soldier committed to a future scheduled duty cannot be removed.
    pub async fn delete_soldier(&self, id: SoldierId) -> Result<(), EngineError> {
        if !self.soldiers.contains_key(&id) {
            return Err(EngineError::SoldierNotFound(id));
        }
        let future_duties = self.scheduled_future_duties(&id, &[], self.now()).await;
        if !future_duties.is_empty() {
            return Err(EngineError::HasFutureDuty(id));
        }

        let event = Event::SoldierDeleted { id: id.clone() };
        self.wal_append(&event).await?;
        self.soldiers.remove(&id);
        Ok(())
    }

    // ── Duty intake and maintenance ──────────────────────────

    pub async fn create_duty(&self, draft: DutyDraft) -> Result<Duty, EngineError> {
        if self.duties.len() >= MAX_DUTIES_PER_TENANT {
            return Err(EngineError::LimitExceeded("too many duties"));
        }
        validate_name(&draft.name)?;
        if draft.description.len() > MAX_DESCRIPTION_LEN {
            return Err(EngineError::LimitExceeded("description too long"));
        }
        if !draft.location.in_bounds() {
            return Err(EngineError::Validation("location out of bounds"));
        }
        validate_span(&draft.window)?;
        let now = self.now();
        if draft.window.start <= now {
            return Err(EngineError::Validation("startTime must be in the future"));
        }
        validate_rank_bounds(draft.min_rank, draft.max_rank)?;
        let constraint_vec: Vec<String> = draft.constraints.iter().cloned().collect();
        validate_tags(&constraint_vec)?;
        validate_headcount(draft.soldiers_required)?;
        validate_value(draft.value)?;

        let id = self.next_duty_id();
        let event = Event::DutyCreated {
            id,
            draft: draft.clone(),
            at: now,
        };
        self.wal_append(&event).await?;
        let duty = Duty::new(id, draft, now);
        self.duties.insert(id, Arc::new(RwLock::new(duty.clone())));
        Ok(duty)
    }

    /// Structural edit; only permitted while the duty is unscheduled.
    pub async fn update_duty(&self, id: Ulid, patch: DutyPatch) -> Result<Duty, EngineError> {
        let duty = self.get_duty(&id).ok_or(EngineError::NotFound(id))?;
        let mut guard = duty.write().await;
        lifecycle::ensure_modifiable(&guard)?;

        if let Some(ref name) = patch.name {
            validate_name(name)?;
        }
        if let Some(ref description) = patch.description
            && description.len() > MAX_DESCRIPTION_LEN
        {
            return Err(EngineError::LimitExceeded("description too long"));
        }
        if let Some(location) = patch.location
            && !location.in_bounds()
        {
            return Err(EngineError::Validation("location out of bounds"));
        }

        let window = if patch.start.is_some() || patch.end.is_some() {
            let window = Span {
                start: patch.start.unwrap_or(guard.window.start),
                end: patch.end.unwrap_or(guard.window.end),
            };
            validate_span(&window)?;
            if window.start <= self.now() {
                return Err(EngineError::Validation("startTime must be in the future"));
            }
            Some(window)
        } else {
            None
        };

        validate_rank_bounds(
            patch.min_rank.or(guard.min_rank),
            patch.max_rank.or(guard.max_rank),
        )?;
        if let Some(ref constraints) = patch.constraints {
            validate_tags(constraints)?;
        }
        if let Some(required) = patch.soldiers_required {
            validate_headcount(required)?;
        }
        if let Some(value) = patch.value {
            validate_value(value)?;
        }

        let event = Event::DutyUpdated {
            id,
            name: patch.name,
            description: patch.description,
            location: patch.location,
            window,
            min_rank: patch.min_rank,
            max_rank: patch.max_rank,
            constraints: patch.constraints,
            soldiers_required: patch.soldiers_required,
            value: patch.value,
            at: self.now(),
        };
        self.persist_and_apply_duty(&mut guard, &event).await?;
        Ok(guard.clone())
    }

    /// Union new constraints into the duty's set (structural edit).
    pub async fn add_constraints(
        &self,
        id: Ulid,
        constraints: Vec<String>,
    ) -> Result<Duty, EngineError> {
        validate_tags(&constraints)?;
        let duty = self.get_duty(&id).ok_or(EngineError::NotFound(id))?;
        let mut guard = duty.write().await;
        lifecycle::ensure_modifiable(&guard)?;

        let event = Event::DutyConstraintsAdded {
            id,
            constraints,
            at: self.now(),
        };
        self.persist_and_apply_duty(&mut guard, &event).await?;
        Ok(guard.clone())
    }

    /// Scheduled duties cannot be deleted; cancel first.
    pub async fn delete_duty(&self, id: Ulid) -> Result<(), EngineError> {
        let duty = self.get_duty(&id).ok_or(EngineError::NotFound(id))?;
        {
            let guard = duty.read().await;
            if guard.status == DutyStatus::Scheduled {
                return Err(EngineError::InvalidTransition {
                    from: guard.status,
                    action: "delete",
                });
            }
        }

        let event = Event::DutyDeleted { id };
        self.wal_append(&event).await?;
        self.duties.remove(&id);
        self.notify.remove(&id);
        Ok(())
    }

    // ── Allocation ───────────────────────────────────────────

    /// Assign soldiers to one duty and move it to `scheduled`.
    ///
    /// The eligibility/overlap/fairness reads run without holding the
    /// duty's lock; the commit then takes the write lock and re-checks
    /// the duty's version. A concurrent mutation of the same duty loses
    /// exactly one of the two races and surfaces as
    /// `PersistenceConflict`, which is safe to retry — nothing was
    /// committed. Reads of other duties stay best-effort.
    pub async fn schedule_duty(&self, id: Ulid) -> Result<Duty, EngineError> {
        let duty = self.get_duty(&id).ok_or(EngineError::NotFound(id))?;
        let snapshot = duty.read().await.clone();

        lifecycle::ensure_schedulable(&snapshot, self.now())?;

        let eligible = self.eligible_soldiers(&snapshot).await;
        let required = snapshot.soldiers_required;
        if eligible.len() < required as usize {
            return Err(EngineError::InsufficientCapacity {
                required,
                available: eligible.len(),
            });
        }

        let board = self.justice_board().await;
        let chosen = justice::rank_by_justice(eligible, &board, required as usize);

        let mut guard = duty.write().await;
        if guard.version != snapshot.version {
            return Err(EngineError::PersistenceConflict(id));
        }
        lifecycle::ensure_schedulable(&guard, self.now())?;

        let event = Event::DutyScheduled {
            id,
            soldiers: chosen,
            at: self.now(),
        };
        self.persist_and_apply_duty(&mut guard, &event).await?;
        metrics::counter!(crate::observability::DUTIES_SCHEDULED_TOTAL).increment(1);
        Ok(guard.clone())
    }

    /// Clear the assignment and move the duty to `canceled`. Clearing
    /// `soldiers` retroactively removes this duty's contribution from
    /// the affected soldiers' justice scores.
    pub async fn cancel_duty(&self, id: Ulid) -> Result<Duty, EngineError> {
        let duty = self.get_duty(&id).ok_or(EngineError::NotFound(id))?;
        let mut guard = duty.write().await;
        lifecycle::ensure_cancelable(&guard, self.now())?;

        let event = Event::DutyCanceled { id, at: self.now() };
        self.persist_and_apply_duty(&mut guard, &event).await?;
        Ok(guard.clone())
    }

    /// Greedy batch pass over every unscheduled duty with a future
    /// start, in ascending duty-id (creation) order. Each commit is
    /// final: an earlier duty can consume a soldier a later duty also
    /// needed. That is the stated trade-off — the pass is locally
    /// optimal per duty, not globally optimal across the batch.
    pub async fn schedule_all_unscheduled(&self) -> BTreeMap<Ulid, ScheduleOutcome> {
        let now = self.now();
        let arcs: Vec<SharedDuty> = self.duties.iter().map(|e| e.value().clone()).collect();
        let mut candidates = Vec::new();
        for arc in arcs {
            let guard = arc.read().await;
            if lifecycle::can_schedule(&guard, now) {
                candidates.push(guard.id);
            }
        }
        candidates.sort();

        let mut results = BTreeMap::new();
        for id in candidates {
            let outcome = match self.schedule_duty(id).await {
                Ok(duty) => ScheduleOutcome::Assigned(duty.soldiers.into_iter().collect()),
                Err(e) => ScheduleOutcome::Skipped(e.to_string()),
            };
            results.insert(id, outcome);
        }
        results
    }

    // ── WAL maintenance ──────────────────────────────────────

    /// Rewrite the WAL with the minimal event set that recreates the
    /// current state: one create per record, plus the transitions still
    /// visible in each duty's status history.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let mut events = Vec::new();

        let soldier_arcs: Vec<SharedSoldier> =
            self.soldiers.iter().map(|e| e.value().clone()).collect();
        for arc in soldier_arcs {
            let s = arc.read().await;
            events.push(Event::SoldierCreated {
                id: s.id.clone(),
                name: s.name.clone(),
                rank: s.rank,
                limitations: s.limitations.iter().cloned().collect(),
                at: s.created_at,
            });
            if s.updated_at != s.created_at {
                events.push(Event::SoldierUpdated {
                    id: s.id.clone(),
                    name: None,
                    rank: None,
                    limitations: None,
                    at: s.updated_at,
                });
            }
        }

        let duty_arcs: Vec<SharedDuty> = self.duties.iter().map(|e| e.value().clone()).collect();
        for arc in duty_arcs {
            let d = arc.read().await;
            events.push(Event::DutyCreated {
                id: d.id,
                draft: DutyDraft {
                    name: d.name.clone(),
                    description: d.description.clone(),
                    location: d.location,
                    window: d.window,
                    min_rank: d.min_rank,
                    max_rank: d.max_rank,
                    constraints: d.constraints.clone(),
                    soldiers_required: d.soldiers_required,
                    value: d.value,
                },
                at: d.created_at,
            });
            for change in &d.status_history[1..] {
                match change.status {
                    DutyStatus::Scheduled => events.push(Event::DutyScheduled {
                        id: d.id,
                        soldiers: if d.status == DutyStatus::Scheduled {
                            d.soldiers.iter().cloned().collect()
                        } else {
                            Vec::new() // membership was cleared on cancel
                        },
                        at: change.at,
                    }),
                    DutyStatus::Canceled => events.push(Event::DutyCanceled {
                        id: d.id,
                        at: change.at,
                    }),
                    DutyStatus::Unscheduled => {}
                }
            }
            if d.status_history.len() == 1 && d.updated_at != d.created_at {
                events.push(Event::DutyUpdated {
                    id: d.id,
                    name: None,
                    description: None,
                    location: None,
                    window: None,
                    min_rank: None,
                    max_rank: None,
                    constraints: None,
                    soldiers_required: None,
                    value: None,
                    at: d.updated_at,
                });
            }
        }

        let mut wal = self.wal.lock().await;
        wal.compact(&events)
            .map_err(|e| EngineError::WalError(e.to_string()))
    }
}
