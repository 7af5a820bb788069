use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::engine::Engine;
use crate::model::ScheduleOutcome;

/// Background task that periodically schedules every unscheduled duty
/// with a future start time.
pub async fn run_auto_scheduler(engine: Arc<Engine>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let results = engine.schedule_all_unscheduled().await;
        metrics::counter!(crate::observability::SCHEDULING_RUNS_TOTAL).increment(1);
        for (duty_id, outcome) in &results {
            match outcome {
                ScheduleOutcome::Assigned(soldiers) => {
                    info!("auto-scheduled duty {duty_id} with {} soldiers", soldiers.len());
                }
                ScheduleOutcome::Skipped(reason) => {
                    // Expected between runs — capacity may free up later
                    debug!("auto-schedule skipped duty {duty_id}: {reason}");
                }
            }
        }
    }
}

/// Background task that compacts the WAL once enough appends accumulate.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(60));
    loop {
        ticker.tick().await;
        if engine.wal_appends_since_compact().await < threshold {
            continue;
        }
        match engine.compact_wal().await {
            Ok(()) => {
                metrics::counter!(crate::observability::WAL_COMPACTIONS_TOTAL).increment(1);
                info!("WAL compacted");
            }
            Err(e) => warn!("WAL compaction failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    use super::*;
    use crate::clock::ManualClock;
    use crate::model::*;
    use crate::notify::NotifyHub;

    const H: Ms = 3_600_000;
    const T0: Ms = 1_750_000_000_000;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("rosterd_test_scheduler");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn draft(start: Ms, required: u32) -> DutyDraft {
        DutyDraft {
            name: "guard post".into(),
            description: String::new(),
            location: Location { lat: 31.77, lon: 35.23 },
            window: Span::new(start, start + 4 * H),
            min_rank: None,
            max_rank: None,
            constraints: BTreeSet::new(),
            soldiers_required: required,
            value: 1.0,
        }
    }

    #[tokio::test]
    async fn batch_pass_schedules_what_it_can() {
        let clock = Arc::new(ManualClock::new(T0));
        let engine = Arc::new(
            Engine::new(
                test_wal_path("batch_pass.wal"),
                Arc::new(NotifyHub::new()),
                clock,
            )
            .unwrap(),
        );

        engine
            .create_soldier(
                SoldierId::parse("1000001").unwrap(),
                "Noa Bar".into(),
                Rank::Corporal,
                vec![],
            )
            .await
            .unwrap();

        // Two non-overlapping duties: both can get the one soldier.
        let a = engine.create_duty(draft(T0 + 2 * H, 1)).await.unwrap();
        let b = engine.create_duty(draft(T0 + 10 * H, 1)).await.unwrap();
        // Needs two soldiers — must be skipped.
        let c = engine.create_duty(draft(T0 + 20 * H, 2)).await.unwrap();

        let results = engine.schedule_all_unscheduled().await;
        assert_eq!(results.len(), 3);
        assert!(matches!(results[&a.id], ScheduleOutcome::Assigned(_)));
        assert!(matches!(results[&b.id], ScheduleOutcome::Assigned(_)));
        assert!(matches!(results[&c.id], ScheduleOutcome::Skipped(_)));
    }
}
