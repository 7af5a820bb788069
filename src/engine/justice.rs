//! The justice board: cumulative assigned-duty value per soldier.
//!
//! The score is derived, never stored — it is a fold over the duties
//! currently listing the soldier. Cancellation clears a duty's soldier
//! set, so canceled duties stop contributing the moment they are
//! canceled; the board reflects present assignment load, not history.

use std::collections::HashMap;

use crate::model::{JusticeEntry, SoldierId};

use super::{Engine, EngineError, SharedDuty, SharedSoldier};

/// Order `eligible` by ascending justice score and keep the first
/// `needed`. Soldiers missing from the board score 0. Tie-break is
/// ascending soldier id, which makes the ranking reproducible.
pub fn rank_by_justice(
    mut eligible: Vec<SoldierId>,
    board: &HashMap<SoldierId, f64>,
    needed: usize,
) -> Vec<SoldierId> {
    eligible.sort_by(|a, b| {
        let score_a = board.get(a).copied().unwrap_or(0.0);
        let score_b = board.get(b).copied().unwrap_or(0.0);
        score_a.total_cmp(&score_b).then_with(|| a.cmp(b))
    });
    eligible.truncate(needed);
    eligible
}

impl Engine {
    /// Score map over every soldier in the store: the sum of `value`
    /// across all duties currently listing the soldier, 0 if none.
    pub async fn justice_board(&self) -> HashMap<SoldierId, f64> {
        let mut board: HashMap<SoldierId, f64> = HashMap::new();

        let soldier_arcs: Vec<SharedSoldier> =
            self.soldiers.iter().map(|e| e.value().clone()).collect();
        for arc in soldier_arcs {
            let guard = arc.read().await;
            board.insert(guard.id.clone(), 0.0);
        }

        let duty_arcs: Vec<SharedDuty> = self.duties.iter().map(|e| e.value().clone()).collect();
        for arc in duty_arcs {
            let guard = arc.read().await;
            for soldier_id in &guard.soldiers {
                // Assignments of since-deleted soldiers don't get entries.
                if let Some(score) = board.get_mut(soldier_id) {
                    *score += guard.value;
                }
            }
        }

        board
    }

    /// Board sorted by ascending soldier id, for listing.
    pub async fn justice_board_entries(&self) -> Vec<JusticeEntry> {
        let board = self.justice_board().await;
        let mut entries: Vec<JusticeEntry> = board
            .into_iter()
            .map(|(soldier_id, score)| JusticeEntry { soldier_id, score })
            .collect();
        entries.sort_by(|a, b| a.soldier_id.cmp(&b.soldier_id));
        entries
    }

    pub async fn justice_score(&self, soldier_id: &SoldierId) -> Result<f64, EngineError> {
        if !self.soldiers.contains_key(soldier_id) {
            return Err(EngineError::SoldierNotFound(soldier_id.clone()));
        }
        let board = self.justice_board().await;
        Ok(board.get(soldier_id).copied().unwrap_or(0.0))
    }
}
