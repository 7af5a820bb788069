use crate::model::{Duty, Soldier, SoldierId};

use super::{Engine, SharedSoldier};

/// Absent bounds impose no restriction.
pub fn rank_within_bounds(duty: &Duty, soldier: &Soldier) -> bool {
    if let Some(min) = duty.min_rank
        && soldier.rank < min
    {
        return false;
    }
    if let Some(max) = duty.max_rank
        && soldier.rank > max
    {
        return false;
    }
    true
}

/// A soldier is excluded iff any limitation appears verbatim in the
/// duty's constraint set. An empty constraint set admits everyone.
pub fn limitations_compatible(duty: &Duty, soldier: &Soldier) -> bool {
    soldier
        .limitations
        .iter()
        .all(|l| !duty.constraints.contains(l))
}

pub fn is_eligible(duty: &Duty, soldier: &Soldier) -> bool {
    rank_within_bounds(duty, soldier) && limitations_compatible(duty, soldier)
}

impl Engine {
    /// Soldiers satisfying rank bounds and constraint compatibility,
    /// minus those already committed to an overlapping duty. Pure read,
    /// returned in ascending id order.
    pub async fn eligible_soldiers(&self, duty: &Duty) -> Vec<SoldierId> {
        let committed = self.committed_elsewhere(duty.id, &duty.window).await;

        let arcs: Vec<SharedSoldier> = self.soldiers.iter().map(|e| e.value().clone()).collect();
        let mut eligible = Vec::new();
        for arc in arcs {
            let guard = arc.read().await;
            if committed.contains(&guard.id) {
                continue;
            }
            if is_eligible(duty, &guard) {
                eligible.push(guard.id.clone());
            }
        }
        eligible.sort();
        eligible
    }
}
