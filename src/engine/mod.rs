mod eligibility;
mod error;
mod justice;
mod lifecycle;
mod mutations;
mod overlap;
mod queries;
#[cfg(test)]
mod tests;

pub use eligibility::{is_eligible, limitations_compatible, rank_within_bounds};
pub use error::EngineError;
pub use justice::rank_by_justice;
pub use lifecycle::{can_cancel, can_modify, can_schedule};
pub use queries::{DutyFilter, SoldierFilter};

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock};
use ulid::Ulid;

use crate::clock::Clock;
use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

pub type SharedSoldier = Arc<RwLock<Soldier>>;
pub type SharedDuty = Arc<RwLock<Duty>>;

/// One tenant's roster: soldiers and duties in memory, every committed
/// mutation appended to the WAL first.
///
/// Locking discipline: a duty's write lock is the atomicity boundary
/// for that duty. Reads of *other* duties and of soldiers during
/// eligibility/overlap computation are taken one at a time and never
/// while a duty write lock is held, so those reads are best-effort by
/// design — the schedule commit re-checks its own duty's version under
/// the write lock.
pub struct Engine {
    pub soldiers: DashMap<SoldierId, SharedSoldier>,
    pub duties: DashMap<Ulid, SharedDuty>,
    wal: Mutex<Wal>,
    pub notify: Arc<NotifyHub>,
    clock: Arc<dyn Clock>,
    /// Monotonic duty ids: ascending id order is creation order even
    /// within one millisecond, which keeps batch enumeration stable.
    id_gen: std::sync::Mutex<ulid::Generator>,
}

enum EventTarget<'a> {
    Soldier(&'a SoldierId),
    Duty(Ulid),
}

/// Which record a non-create/delete event mutates.
fn event_target(event: &Event) -> Option<EventTarget<'_>> {
    match event {
        Event::SoldierUpdated { id, .. } | Event::SoldierLimitationsAdded { id, .. } => {
            Some(EventTarget::Soldier(id))
        }
        Event::DutyUpdated { id, .. }
        | Event::DutyConstraintsAdded { id, .. }
        | Event::DutyScheduled { id, .. }
        | Event::DutyCanceled { id, .. } => Some(EventTarget::Duty(*id)),
        Event::SoldierCreated { .. }
        | Event::SoldierDeleted { .. }
        | Event::DutyCreated { .. }
        | Event::DutyDeleted { .. } => None,
    }
}

/// Apply an event directly to a Duty (no locking — caller holds the lock).
fn apply_to_duty(duty: &mut Duty, event: &Event) {
    match event {
        Event::DutyUpdated {
            name,
            description,
            location,
            window,
            min_rank,
            max_rank,
            constraints,
            soldiers_required,
            value,
            at,
            ..
        } => {
            if let Some(n) = name {
                duty.name = n.clone();
            }
            if let Some(d) = description {
                duty.description = d.clone();
            }
            if let Some(l) = location {
                duty.location = *l;
            }
            if let Some(w) = window {
                duty.window = *w;
            }
            if let Some(r) = min_rank {
                duty.min_rank = Some(*r);
            }
            if let Some(r) = max_rank {
                duty.max_rank = Some(*r);
            }
            if let Some(c) = constraints {
                duty.constraints = c.iter().cloned().collect();
            }
            if let Some(n) = soldiers_required {
                duty.soldiers_required = *n;
            }
            if let Some(v) = value {
                duty.value = *v;
            }
            duty.updated_at = *at;
            duty.version += 1;
        }
        Event::DutyConstraintsAdded { constraints, at, .. } => {
            duty.constraints.extend(constraints.iter().cloned());
            duty.updated_at = *at;
            duty.version += 1;
        }
        Event::DutyScheduled { soldiers, at, .. } => {
            // Set union: re-adding a present id is a no-op.
            duty.soldiers.extend(soldiers.iter().cloned());
            duty.status = DutyStatus::Scheduled;
            duty.status_history.push(StatusChange {
                status: DutyStatus::Scheduled,
                at: *at,
            });
            duty.updated_at = *at;
            duty.version += 1;
        }
        Event::DutyCanceled { at, .. } => {
            duty.soldiers.clear();
            duty.status = DutyStatus::Canceled;
            duty.status_history.push(StatusChange {
                status: DutyStatus::Canceled,
                at: *at,
            });
            duty.updated_at = *at;
            duty.version += 1;
        }
        _ => {}
    }
}

/// Apply an event directly to a Soldier (no locking — caller holds the lock).
fn apply_to_soldier(soldier: &mut Soldier, event: &Event) {
    match event {
        Event::SoldierUpdated {
            name,
            rank,
            limitations,
            at,
            ..
        } => {
            if let Some(n) = name {
                soldier.name = n.clone();
            }
            if let Some(r) = rank {
                soldier.rank = *r;
            }
            if let Some(l) = limitations {
                soldier.limitations = l.iter().cloned().collect();
            }
            soldier.updated_at = *at;
        }
        Event::SoldierLimitationsAdded { limitations, at, .. } => {
            soldier.limitations.extend(limitations.iter().cloned());
            soldier.updated_at = *at;
        }
        _ => {}
    }
}

impl Engine {
    pub fn new(
        wal_path: PathBuf,
        notify: Arc<NotifyHub>,
        clock: Arc<dyn Clock>,
    ) -> std::io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;

        let engine = Self {
            soldiers: DashMap::new(),
            duties: DashMap::new(),
            wal: Mutex::new(wal),
            notify,
            clock,
            id_gen: std::sync::Mutex::new(ulid::Generator::new()),
        };

        // Replay — we're the sole owner of these Arcs, so try_write always
        // succeeds instantly. Never block here: this may run inside an
        // async context (lazy tenant creation).
        for event in &events {
            match event {
                Event::SoldierCreated {
                    id,
                    name,
                    rank,
                    limitations,
                    at,
                } => {
                    let soldier = Soldier::new(
                        id.clone(),
                        name.clone(),
                        *rank,
                        limitations.iter().cloned().collect(),
                        *at,
                    );
                    engine
                        .soldiers
                        .insert(id.clone(), Arc::new(RwLock::new(soldier)));
                }
                Event::SoldierDeleted { id } => {
                    engine.soldiers.remove(id);
                }
                Event::DutyCreated { id, draft, at } => {
                    let duty = Duty::new(*id, draft.clone(), *at);
                    engine.duties.insert(*id, Arc::new(RwLock::new(duty)));
                }
                Event::DutyDeleted { id } => {
                    engine.duties.remove(id);
                }
                other => match event_target(other) {
                    Some(EventTarget::Soldier(id)) => {
                        if let Some(entry) = engine.soldiers.get(id) {
                            let arc = entry.value().clone();
                            drop(entry);
                            let mut guard =
                                arc.try_write().expect("replay: uncontended write");
                            apply_to_soldier(&mut guard, other);
                        }
                    }
                    Some(EventTarget::Duty(id)) => {
                        if let Some(entry) = engine.duties.get(&id) {
                            let arc = entry.value().clone();
                            drop(entry);
                            let mut guard =
                                arc.try_write().expect("replay: uncontended write");
                            apply_to_duty(&mut guard, other);
                        }
                    }
                    None => {}
                },
            }
        }

        Ok(engine)
    }

    pub(crate) fn now(&self) -> Ms {
        self.clock.now_ms()
    }

    pub(super) fn next_duty_id(&self) -> Ulid {
        self.id_gen
            .lock()
            .expect("ulid generator lock poisoned")
            .generate()
            .unwrap_or_else(|_| Ulid::new())
    }

    pub fn get_soldier(&self, id: &SoldierId) -> Option<SharedSoldier> {
        self.soldiers.get(id).map(|e| e.value().clone())
    }

    pub fn get_duty(&self, id: &Ulid) -> Option<SharedDuty> {
        self.duties.get(id).map(|e| e.value().clone())
    }

    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        self.wal
            .lock()
            .await
            .append(event)
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        self.wal.lock().await.appends_since_compact()
    }

    /// WAL-append + apply + notify in one call, for duty mutations.
    pub(super) async fn persist_and_apply_duty(
        &self,
        duty: &mut Duty,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        let duty_id = duty.id;
        apply_to_duty(duty, event);
        self.notify.send(duty_id, event);
        Ok(())
    }

    /// WAL-append + apply for soldier mutations (not broadcast).
    pub(super) async fn persist_and_apply_soldier(
        &self,
        soldier: &mut Soldier,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_soldier(soldier, event);
        Ok(())
    }
}
