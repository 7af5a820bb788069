use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use ulid::Ulid;

use super::*;
use crate::clock::ManualClock;
use crate::model::*;
use crate::notify::NotifyHub;

const H: Ms = 3_600_000; // 1 hour in ms
const T0: Ms = 1_750_000_000_000;

fn test_wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("rosterd_test_engine");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

fn test_engine(name: &str) -> (Engine, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(T0));
    let engine = Engine::new(
        test_wal_path(name),
        Arc::new(NotifyHub::new()),
        clock.clone(),
    )
    .unwrap();
    (engine, clock)
}

fn sid(s: &str) -> SoldierId {
    SoldierId::parse(s).unwrap()
}

async fn add_soldier(engine: &Engine, id: &str, rank: Rank, limitations: &[&str]) -> SoldierId {
    let soldier = engine
        .create_soldier(
            sid(id),
            format!("Soldier {id}"),
            rank,
            limitations.iter().map(|s| s.to_string()).collect(),
        )
        .await
        .unwrap();
    soldier.id
}

fn make_draft(start: Ms, end: Ms, required: u32, value: f64) -> DutyDraft {
    DutyDraft {
        name: "gate watch".into(),
        description: "north gate".into(),
        location: Location { lat: 32.08, lon: 34.78 },
        window: Span::new(start, end),
        min_rank: None,
        max_rank: None,
        constraints: BTreeSet::new(),
        soldiers_required: required,
        value,
    }
}

// ── Soldier intake ───────────────────────────────────────────────

#[tokio::test]
async fn engine_create_and_query_soldier() {
    let (engine, _) = test_engine("create_soldier.wal");

    engine
        .create_soldier(sid("1234567"), "Dana Levi".into(), Rank::Sergeant, vec![])
        .await
        .unwrap();

    let soldier = engine.soldier_snapshot(&sid("1234567")).await.unwrap();
    assert_eq!(soldier.name, "Dana Levi");
    assert_eq!(soldier.rank, Rank::Sergeant);
    assert_eq!(soldier.created_at, T0);
}

#[tokio::test]
async fn engine_duplicate_soldier_rejected() {
    let (engine, _) = test_engine("dup_soldier.wal");

    add_soldier(&engine, "1234567", Rank::Private, &[]).await;
    let result = engine
        .create_soldier(sid("1234567"), "Someone Else".into(), Rank::Major, vec![])
        .await;
    assert!(matches!(result, Err(EngineError::AlreadyExists(_))));
}

#[tokio::test]
async fn engine_soldier_name_length_enforced() {
    let (engine, _) = test_engine("soldier_name.wal");

    let result = engine
        .create_soldier(sid("1234567"), "ab".into(), Rank::Private, vec![])
        .await;
    assert!(matches!(result, Err(EngineError::Validation(_))));

    let result = engine
        .create_soldier(sid("1234567"), "x".repeat(51), Rank::Private, vec![])
        .await;
    assert!(matches!(result, Err(EngineError::Validation(_))));
}

#[tokio::test]
async fn engine_limitations_lowercased_at_intake() {
    let (engine, _) = test_engine("limitations_lower.wal");

    engine
        .create_soldier(
            sid("1234567"),
            "Dana Levi".into(),
            Rank::Private,
            vec!["GUN".into(), "Night Driving".into()],
        )
        .await
        .unwrap();

    let soldier = engine.soldier_snapshot(&sid("1234567")).await.unwrap();
    assert!(soldier.limitations.contains("gun"));
    assert!(soldier.limitations.contains("night driving"));
    assert!(!soldier.limitations.contains("GUN"));
}

#[tokio::test]
async fn engine_update_soldier_patches_fields() {
    let (engine, clock) = test_engine("update_soldier.wal");

    add_soldier(&engine, "1234567", Rank::Private, &[]).await;
    clock.advance(1000);

    let updated = engine
        .update_soldier(
            sid("1234567"),
            SoldierPatch {
                rank: Some(Rank::Corporal),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.rank, Rank::Corporal);
    assert_eq!(updated.name, "Soldier 1234567"); // untouched
    assert_eq!(updated.updated_at, T0 + 1000);
    assert_eq!(updated.created_at, T0);
}

// ── Duty intake and validation ───────────────────────────────────

#[tokio::test]
async fn engine_create_duty_assigns_id_and_history() {
    let (engine, _) = test_engine("create_duty.wal");

    let duty = engine
        .create_duty(make_draft(T0 + 2 * H, T0 + 4 * H, 2, 1.5))
        .await
        .unwrap();
    assert_eq!(duty.status, DutyStatus::Unscheduled);
    assert_eq!(duty.status_history.len(), 1);
    assert!(duty.soldiers.is_empty());
    assert!(engine.get_duty(&duty.id).is_some());
}

#[tokio::test]
async fn engine_duty_start_must_be_future() {
    let (engine, _) = test_engine("duty_past_start.wal");

    let result = engine.create_duty(make_draft(T0 - H, T0 + H, 1, 1.0)).await;
    assert!(matches!(result, Err(EngineError::Validation(_))));

    // start == now also rejected
    let result = engine.create_duty(make_draft(T0, T0 + H, 1, 1.0)).await;
    assert!(matches!(result, Err(EngineError::Validation(_))));
}

#[tokio::test]
async fn engine_duty_window_must_be_ordered() {
    let (engine, _) = test_engine("duty_window.wal");

    let mut draft = make_draft(T0 + 2 * H, T0 + 4 * H, 1, 1.0);
    draft.window = Span { start: T0 + 4 * H, end: T0 + 2 * H };
    assert!(matches!(
        engine.create_duty(draft).await,
        Err(EngineError::Validation(_))
    ));
}

#[tokio::test]
async fn engine_duty_rank_bounds_must_be_ordered() {
    let (engine, _) = test_engine("duty_bounds.wal");

    let mut draft = make_draft(T0 + 2 * H, T0 + 4 * H, 1, 1.0);
    draft.min_rank = Some(Rank::Major);
    draft.max_rank = Some(Rank::Corporal);
    assert!(matches!(
        engine.create_duty(draft).await,
        Err(EngineError::Validation(_))
    ));
}

#[tokio::test]
async fn engine_duty_rejects_bad_location_headcount_value() {
    let (engine, _) = test_engine("duty_validation.wal");

    let mut draft = make_draft(T0 + 2 * H, T0 + 4 * H, 1, 1.0);
    draft.location = Location { lat: 99.0, lon: 0.0 };
    assert!(engine.create_duty(draft).await.is_err());

    let draft = make_draft(T0 + 2 * H, T0 + 4 * H, 0, 1.0);
    assert!(engine.create_duty(draft).await.is_err());

    let draft = make_draft(T0 + 2 * H, T0 + 4 * H, 1, 0.0);
    assert!(engine.create_duty(draft).await.is_err());

    let draft = make_draft(T0 + 2 * H, T0 + 4 * H, 1, -2.0);
    assert!(engine.create_duty(draft).await.is_err());
}

#[tokio::test]
async fn engine_update_duty_only_while_unscheduled() {
    let (engine, _) = test_engine("update_scheduled.wal");

    add_soldier(&engine, "1234567", Rank::Private, &[]).await;
    let duty = engine
        .create_duty(make_draft(T0 + 2 * H, T0 + 4 * H, 1, 1.0))
        .await
        .unwrap();
    engine.schedule_duty(duty.id).await.unwrap();

    let result = engine
        .update_duty(
            duty.id,
            DutyPatch {
                name: Some("new name".into()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(
        result,
        Err(EngineError::InvalidTransition { from: DutyStatus::Scheduled, .. })
    ));
}

#[tokio::test]
async fn engine_update_duty_moves_window() {
    let (engine, _) = test_engine("update_window.wal");

    let duty = engine
        .create_duty(make_draft(T0 + 2 * H, T0 + 4 * H, 1, 1.0))
        .await
        .unwrap();

    let updated = engine
        .update_duty(
            duty.id,
            DutyPatch {
                start: Some(T0 + 6 * H),
                end: Some(T0 + 8 * H),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.window, Span::new(T0 + 6 * H, T0 + 8 * H));
    assert_eq!(updated.version, duty.version + 1);

    // Moving only the start past the current end is rejected
    let result = engine
        .update_duty(
            duty.id,
            DutyPatch {
                start: Some(T0 + 9 * H),
                ..Default::default()
            },
        )
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn engine_merged_rank_bounds_validated_on_update() {
    let (engine, _) = test_engine("update_bounds.wal");

    let mut draft = make_draft(T0 + 2 * H, T0 + 4 * H, 1, 1.0);
    draft.min_rank = Some(Rank::Captain);
    let duty = engine.create_duty(draft).await.unwrap();

    // maxRank below the existing minRank
    let result = engine
        .update_duty(
            duty.id,
            DutyPatch {
                max_rank: Some(Rank::Sergeant),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(EngineError::Validation(_))));
}

#[tokio::test]
async fn engine_add_constraints_unions() {
    let (engine, _) = test_engine("add_constraints.wal");

    let mut draft = make_draft(T0 + 2 * H, T0 + 4 * H, 1, 1.0);
    draft.constraints = ["gun".to_string()].into_iter().collect();
    let duty = engine.create_duty(draft).await.unwrap();

    let updated = engine
        .add_constraints(duty.id, vec!["gun".into(), "heights".into()])
        .await
        .unwrap();
    assert_eq!(updated.constraints.len(), 2); // union, no duplicate
    assert!(updated.constraints.contains("heights"));
}

#[tokio::test]
async fn engine_delete_duty_rejected_while_scheduled() {
    let (engine, _) = test_engine("delete_scheduled.wal");

    add_soldier(&engine, "1234567", Rank::Private, &[]).await;
    let duty = engine
        .create_duty(make_draft(T0 + 2 * H, T0 + 4 * H, 1, 1.0))
        .await
        .unwrap();
    engine.schedule_duty(duty.id).await.unwrap();

    assert!(matches!(
        engine.delete_duty(duty.id).await,
        Err(EngineError::InvalidTransition { .. })
    ));

    // After cancellation, deletion is allowed
    engine.cancel_duty(duty.id).await.unwrap();
    engine.delete_duty(duty.id).await.unwrap();
    assert!(engine.get_duty(&duty.id).is_none());
}

// ── Allocation ───────────────────────────────────────────────────

#[tokio::test]
async fn engine_schedule_fills_exact_headcount() {
    let (engine, _) = test_engine("schedule_headcount.wal");

    for i in 0..5 {
        add_soldier(&engine, &format!("100000{i}"), Rank::Private, &[]).await;
    }
    let duty = engine
        .create_duty(make_draft(T0 + 2 * H, T0 + 4 * H, 3, 1.0))
        .await
        .unwrap();

    let scheduled = engine.schedule_duty(duty.id).await.unwrap();
    assert_eq!(scheduled.status, DutyStatus::Scheduled);
    assert_eq!(scheduled.soldiers.len(), 3);
    assert_eq!(scheduled.status_history.len(), 2);
    assert_eq!(scheduled.status_history[1].status, DutyStatus::Scheduled);
}

#[tokio::test]
async fn engine_schedule_unknown_duty_not_found() {
    let (engine, _) = test_engine("schedule_missing.wal");
    assert!(matches!(
        engine.schedule_duty(Ulid::new()).await,
        Err(EngineError::NotFound(_))
    ));
}

#[tokio::test]
async fn engine_reschedule_is_invalid_and_leaves_assignment_alone() {
    let (engine, _) = test_engine("reschedule.wal");

    add_soldier(&engine, "1234567", Rank::Private, &[]).await;
    let duty = engine
        .create_duty(make_draft(T0 + 2 * H, T0 + 4 * H, 1, 1.0))
        .await
        .unwrap();
    let first = engine.schedule_duty(duty.id).await.unwrap();

    let result = engine.schedule_duty(duty.id).await;
    assert!(matches!(result, Err(EngineError::InvalidTransition { .. })));

    let after = engine.duty_snapshot(&duty.id).await.unwrap();
    assert_eq!(after.soldiers, first.soldiers);
    assert_eq!(after.status_history.len(), 2);
}

#[tokio::test]
async fn engine_insufficient_capacity_is_non_mutating() {
    let (engine, _) = test_engine("insufficient.wal");

    add_soldier(&engine, "1234567", Rank::Private, &[]).await;
    let duty = engine
        .create_duty(make_draft(T0 + 2 * H, T0 + 4 * H, 2, 1.0))
        .await
        .unwrap();

    let result = engine.schedule_duty(duty.id).await;
    assert!(matches!(
        result,
        Err(EngineError::InsufficientCapacity { required: 2, available: 1 })
    ));

    let after = engine.duty_snapshot(&duty.id).await.unwrap();
    assert_eq!(after.status, DutyStatus::Unscheduled);
    assert!(after.soldiers.is_empty());
    assert_eq!(after.status_history.len(), 1);
}

#[tokio::test]
async fn engine_schedule_past_start_rejected() {
    let (engine, clock) = test_engine("schedule_past.wal");

    add_soldier(&engine, "1234567", Rank::Private, &[]).await;
    let duty = engine
        .create_duty(make_draft(T0 + 2 * H, T0 + 4 * H, 1, 1.0))
        .await
        .unwrap();

    clock.set(T0 + 3 * H); // duty already underway
    assert!(matches!(
        engine.schedule_duty(duty.id).await,
        Err(EngineError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn engine_rank_bounds_filter_assignment() {
    // Scenario A: bounds [3,6]; soldiers with ranks 2 and 4 → only the
    // rank-4 soldier is eligible.
    let (engine, _) = test_engine("scenario_a.wal");

    add_soldier(&engine, "1000001", Rank::Sergeant, &[]).await; // 2
    let captain = add_soldier(&engine, "1000002", Rank::Captain, &[]).await; // 4

    let mut draft = make_draft(T0 + 2 * H, T0 + 4 * H, 1, 1.0);
    draft.min_rank = Some(Rank::Lieutenant);
    draft.max_rank = Some(Rank::Colonel);
    let duty = engine.create_duty(draft).await.unwrap();

    let scheduled = engine.schedule_duty(duty.id).await.unwrap();
    assert_eq!(
        scheduled.soldiers.into_iter().collect::<Vec<_>>(),
        vec![captain]
    );
}

#[tokio::test]
async fn engine_constraint_collision_excludes_soldier() {
    // Scenario B: duty constraints ["gun"], sole soldier limited by
    // "gun" → InsufficientCapacity.
    let (engine, _) = test_engine("scenario_b.wal");

    add_soldier(&engine, "1000001", Rank::Private, &["gun"]).await;

    let mut draft = make_draft(T0 + 2 * H, T0 + 4 * H, 1, 1.0);
    draft.constraints = ["gun".to_string()].into_iter().collect();
    let duty = engine.create_duty(draft).await.unwrap();

    assert!(matches!(
        engine.schedule_duty(duty.id).await,
        Err(EngineError::InsufficientCapacity { .. })
    ));
}

#[tokio::test]
async fn engine_overlapping_duty_consumes_soldier() {
    // Scenario C: windows [t+2h,t+4h] and [t+3h,t+5h]; one soldier.
    let (engine, _) = test_engine("scenario_c.wal");

    add_soldier(&engine, "1000001", Rank::Private, &[]).await;
    let first = engine
        .create_duty(make_draft(T0 + 2 * H, T0 + 4 * H, 1, 1.0))
        .await
        .unwrap();
    let second = engine
        .create_duty(make_draft(T0 + 3 * H, T0 + 5 * H, 1, 1.0))
        .await
        .unwrap();

    engine.schedule_duty(first.id).await.unwrap();
    assert!(matches!(
        engine.schedule_duty(second.id).await,
        Err(EngineError::InsufficientCapacity { .. })
    ));
}

#[tokio::test]
async fn engine_touching_windows_share_soldier() {
    let (engine, _) = test_engine("touching_windows.wal");

    let soldier = add_soldier(&engine, "1000001", Rank::Private, &[]).await;
    let first = engine
        .create_duty(make_draft(T0 + 2 * H, T0 + 4 * H, 1, 1.0))
        .await
        .unwrap();
    let second = engine
        .create_duty(make_draft(T0 + 4 * H, T0 + 6 * H, 1, 1.0))
        .await
        .unwrap();

    let a = engine.schedule_duty(first.id).await.unwrap();
    let b = engine.schedule_duty(second.id).await.unwrap();
    assert!(a.soldiers.contains(&soldier));
    assert!(b.soldiers.contains(&soldier));
}

#[tokio::test]
async fn engine_no_soldier_double_booked_across_overlaps() {
    let (engine, _) = test_engine("no_double_booking.wal");

    for i in 0..4 {
        add_soldier(&engine, &format!("100000{i}"), Rank::Private, &[]).await;
    }
    let first = engine
        .create_duty(make_draft(T0 + 2 * H, T0 + 6 * H, 2, 1.0))
        .await
        .unwrap();
    let second = engine
        .create_duty(make_draft(T0 + 4 * H, T0 + 8 * H, 2, 1.0))
        .await
        .unwrap();

    let a = engine.schedule_duty(first.id).await.unwrap();
    let b = engine.schedule_duty(second.id).await.unwrap();
    assert!(a.soldiers.is_disjoint(&b.soldiers));
}

#[tokio::test]
async fn engine_lowest_justice_scores_win() {
    // Scenario D: scores 0, 5, 10 → a duty needing 2 takes the 0- and
    // 5-scored soldiers.
    let (engine, _) = test_engine("scenario_d.wal");

    let s1 = add_soldier(&engine, "1000001", Rank::Private, &[]).await;
    let s2 = add_soldier(&engine, "1000002", Rank::Private, &[]).await;
    let s3 = add_soldier(&engine, "1000003", Rank::Private, &[]).await;

    // Seed scores: all tie at 0, so ids break ties — s1 takes the
    // value-5 duty, then s2 takes the value-10 duty.
    let d1 = engine
        .create_duty(make_draft(T0 + 2 * H, T0 + 3 * H, 1, 5.0))
        .await
        .unwrap();
    engine.schedule_duty(d1.id).await.unwrap();
    let d2 = engine
        .create_duty(make_draft(T0 + 4 * H, T0 + 5 * H, 1, 10.0))
        .await
        .unwrap();
    engine.schedule_duty(d2.id).await.unwrap();

    let board = engine.justice_board().await;
    assert_eq!(board[&s1], 5.0);
    assert_eq!(board[&s2], 10.0);
    assert_eq!(board[&s3], 0.0);

    let d3 = engine
        .create_duty(make_draft(T0 + 6 * H, T0 + 8 * H, 2, 1.0))
        .await
        .unwrap();
    let scheduled = engine.schedule_duty(d3.id).await.unwrap();
    let chosen: BTreeSet<SoldierId> = scheduled.soldiers;
    assert!(chosen.contains(&s3)); // score 0
    assert!(chosen.contains(&s1)); // score 5
    assert!(!chosen.contains(&s2)); // score 10 sits this one out
}

#[tokio::test]
async fn engine_concurrent_schedule_commits_once() {
    let (engine, _) = test_engine("concurrent_schedule.wal");
    let engine = Arc::new(engine);

    add_soldier(&engine, "1000001", Rank::Private, &[]).await;
    let duty = engine
        .create_duty(make_draft(T0 + 2 * H, T0 + 4 * H, 1, 1.0))
        .await
        .unwrap();

    let (r1, r2) = tokio::join!(engine.schedule_duty(duty.id), engine.schedule_duty(duty.id));
    assert_eq!(r1.is_ok() as u8 + r2.is_ok() as u8, 1, "exactly one commit");

    let after = engine.duty_snapshot(&duty.id).await.unwrap();
    assert_eq!(after.soldiers.len(), 1);
    assert_eq!(after.status_history.len(), 2);
}

// ── Cancellation and the round trip ──────────────────────────────

#[tokio::test]
async fn engine_cancel_clears_assignment_and_score() {
    let (engine, _) = test_engine("cancel_clears.wal");

    let soldier = add_soldier(&engine, "1000001", Rank::Private, &[]).await;
    let duty = engine
        .create_duty(make_draft(T0 + 2 * H, T0 + 4 * H, 1, 7.5))
        .await
        .unwrap();
    engine.schedule_duty(duty.id).await.unwrap();
    assert_eq!(engine.justice_score(&soldier).await.unwrap(), 7.5);

    let canceled = engine.cancel_duty(duty.id).await.unwrap();
    assert_eq!(canceled.status, DutyStatus::Canceled);
    assert!(canceled.soldiers.is_empty());
    assert_eq!(canceled.status_history.len(), 3);
    // Canceled duties stop contributing to the justice score
    assert_eq!(engine.justice_score(&soldier).await.unwrap(), 0.0);
}

#[tokio::test]
async fn engine_cancel_requires_scheduled() {
    let (engine, _) = test_engine("cancel_unscheduled.wal");

    let duty = engine
        .create_duty(make_draft(T0 + 2 * H, T0 + 4 * H, 1, 1.0))
        .await
        .unwrap();

    // No unscheduled → canceled path
    assert!(matches!(
        engine.cancel_duty(duty.id).await,
        Err(EngineError::InvalidTransition { from: DutyStatus::Unscheduled, .. })
    ));
}

#[tokio::test]
async fn engine_cancel_after_start_rejected() {
    let (engine, clock) = test_engine("cancel_late.wal");

    add_soldier(&engine, "1000001", Rank::Private, &[]).await;
    let duty = engine
        .create_duty(make_draft(T0 + 2 * H, T0 + 4 * H, 1, 1.0))
        .await
        .unwrap();
    engine.schedule_duty(duty.id).await.unwrap();

    clock.set(T0 + 3 * H); // underway
    assert!(matches!(
        engine.cancel_duty(duty.id).await,
        Err(EngineError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn engine_cancel_then_reschedule_round_trip() {
    let (engine, _) = test_engine("round_trip.wal");

    add_soldier(&engine, "1000001", Rank::Private, &[]).await;
    let duty = engine
        .create_duty(make_draft(T0 + 2 * H, T0 + 4 * H, 1, 1.0))
        .await
        .unwrap();
    engine.schedule_duty(duty.id).await.unwrap();
    engine.cancel_duty(duty.id).await.unwrap();

    let between = engine.duty_snapshot(&duty.id).await.unwrap();
    assert!(between.soldiers.is_empty());

    // Canceled is terminal: the duty itself cannot be rescheduled…
    assert!(engine.schedule_duty(duty.id).await.is_err());

    // …but the freed soldier is available to an equivalent new duty.
    let replacement = engine
        .create_duty(make_draft(T0 + 2 * H, T0 + 4 * H, 1, 1.0))
        .await
        .unwrap();
    let scheduled = engine.schedule_duty(replacement.id).await.unwrap();
    assert_eq!(scheduled.soldiers.len(), 1);
}

// ── Soldier guard rails ──────────────────────────────────────────

#[tokio::test]
async fn engine_delete_soldier_blocked_by_future_duty() {
    let (engine, clock) = test_engine("delete_guard.wal");

    let soldier = add_soldier(&engine, "1000001", Rank::Private, &[]).await;
    let duty = engine
        .create_duty(make_draft(T0 + 2 * H, T0 + 4 * H, 1, 1.0))
        .await
        .unwrap();
    engine.schedule_duty(duty.id).await.unwrap();

    assert!(matches!(
        engine.delete_soldier(soldier.clone()).await,
        Err(EngineError::HasFutureDuty(_))
    ));

    // Once the duty has started, the guard no longer applies
    clock.set(T0 + 3 * H);
    engine.delete_soldier(soldier.clone()).await.unwrap();
    assert!(engine.get_soldier(&soldier).is_none());
}

#[tokio::test]
async fn engine_limitation_conflicting_with_scheduled_duty_rejected() {
    let (engine, _) = test_engine("limitation_guard.wal");

    let soldier = add_soldier(&engine, "1000001", Rank::Private, &[]).await;
    let mut draft = make_draft(T0 + 2 * H, T0 + 4 * H, 1, 1.0);
    draft.constraints = ["gun".to_string()].into_iter().collect();
    let duty = engine.create_duty(draft).await.unwrap();
    engine.schedule_duty(duty.id).await.unwrap();

    // "gun" collides with the scheduled duty's constraints
    assert!(matches!(
        engine
            .add_limitations(soldier.clone(), vec!["GUN".into()])
            .await,
        Err(EngineError::HasFutureDuty(_))
    ));

    // An unrelated limitation is fine
    let updated = engine
        .add_limitations(soldier, vec!["driving".into()])
        .await
        .unwrap();
    assert!(updated.limitations.contains("driving"));
}

// ── Listings ─────────────────────────────────────────────────────

#[tokio::test]
async fn engine_list_filters() {
    let (engine, _) = test_engine("list_filters.wal");

    add_soldier(&engine, "1000001", Rank::Private, &["gun"]).await;
    add_soldier(&engine, "1000002", Rank::Major, &[]).await;

    let by_rank = engine
        .list_soldiers(&SoldierFilter {
            rank: Some(Rank::Major),
            ..Default::default()
        })
        .await;
    assert_eq!(by_rank.len(), 1);
    assert_eq!(by_rank[0].id, sid("1000002"));

    let by_tag = engine
        .list_soldiers(&SoldierFilter {
            limitations: vec!["gun".into()],
            ..Default::default()
        })
        .await;
    assert_eq!(by_tag.len(), 1);
    assert_eq!(by_tag[0].id, sid("1000001"));

    let scheduled = engine
        .create_duty(make_draft(T0 + 2 * H, T0 + 3 * H, 1, 1.0))
        .await
        .unwrap();
    engine.schedule_duty(scheduled.id).await.unwrap();
    engine
        .create_duty(make_draft(T0 + 5 * H, T0 + 6 * H, 1, 1.0))
        .await
        .unwrap();

    let unscheduled = engine
        .list_duties(&DutyFilter {
            name: None,
            status: Some(DutyStatus::Unscheduled),
        })
        .await;
    assert_eq!(unscheduled.len(), 1);
    assert_eq!(unscheduled[0].status, DutyStatus::Unscheduled);
}

// ── Justice board ────────────────────────────────────────────────

#[tokio::test]
async fn engine_justice_score_unknown_soldier() {
    let (engine, _) = test_engine("justice_missing.wal");
    assert!(matches!(
        engine.justice_score(&sid("9999999")).await,
        Err(EngineError::SoldierNotFound(_))
    ));
}

#[tokio::test]
async fn engine_justice_board_lists_unassigned_at_zero() {
    let (engine, _) = test_engine("justice_zero.wal");

    add_soldier(&engine, "1000002", Rank::Private, &[]).await;
    add_soldier(&engine, "1000001", Rank::Private, &[]).await;

    let entries = engine.justice_board_entries().await;
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].soldier_id, sid("1000001")); // sorted by id
    assert_eq!(entries[0].score, 0.0);
    assert_eq!(entries[1].score, 0.0);
}

// ── Durability ───────────────────────────────────────────────────

#[tokio::test]
async fn engine_state_survives_restart() {
    let path = test_wal_path("restart.wal");
    let clock = Arc::new(ManualClock::new(T0));

    let duty_id;
    let soldier = sid("1000001");
    {
        let engine = Engine::new(path.clone(), Arc::new(NotifyHub::new()), clock.clone()).unwrap();
        engine
            .create_soldier(soldier.clone(), "Dana Levi".into(), Rank::Sergeant, vec![])
            .await
            .unwrap();
        let duty = engine
            .create_duty(make_draft(T0 + 2 * H, T0 + 4 * H, 1, 2.0))
            .await
            .unwrap();
        duty_id = duty.id;
        engine.schedule_duty(duty_id).await.unwrap();
    }

    let engine = Engine::new(path, Arc::new(NotifyHub::new()), clock).unwrap();
    let duty = engine.duty_snapshot(&duty_id).await.unwrap();
    assert_eq!(duty.status, DutyStatus::Scheduled);
    assert!(duty.soldiers.contains(&soldier));
    assert_eq!(duty.status_history.len(), 2);
    assert_eq!(engine.justice_score(&soldier).await.unwrap(), 2.0);
}

#[tokio::test]
async fn engine_compaction_preserves_state() {
    let path = test_wal_path("compact_state.wal");
    let clock = Arc::new(ManualClock::new(T0));

    let (duty_id, canceled_id) = {
        let engine = Engine::new(path.clone(), Arc::new(NotifyHub::new()), clock.clone()).unwrap();
        engine
            .create_soldier(sid("1000001"), "Dana Levi".into(), Rank::Private, vec![])
            .await
            .unwrap();
        let kept = engine
            .create_duty(make_draft(T0 + 2 * H, T0 + 4 * H, 1, 2.0))
            .await
            .unwrap();
        engine.schedule_duty(kept.id).await.unwrap();

        let canceled = engine
            .create_duty(make_draft(T0 + 6 * H, T0 + 8 * H, 1, 3.0))
            .await
            .unwrap();
        engine.schedule_duty(canceled.id).await.unwrap();
        engine.cancel_duty(canceled.id).await.unwrap();

        engine.compact_wal().await.unwrap();
        assert_eq!(engine.wal_appends_since_compact().await, 0);
        (kept.id, canceled.id)
    };

    let engine = Engine::new(path, Arc::new(NotifyHub::new()), clock).unwrap();
    let kept = engine.duty_snapshot(&duty_id).await.unwrap();
    assert_eq!(kept.status, DutyStatus::Scheduled);
    assert_eq!(kept.soldiers.len(), 1);
    assert_eq!(kept.status_history.len(), 2);

    let canceled = engine.duty_snapshot(&canceled_id).await.unwrap();
    assert_eq!(canceled.status, DutyStatus::Canceled);
    assert!(canceled.soldiers.is_empty());
    assert_eq!(canceled.status_history.len(), 3);
}

// ── Notifications ────────────────────────────────────────────────

#[tokio::test]
async fn engine_schedule_broadcasts_event() {
    let (engine, _) = test_engine("notify_schedule.wal");

    add_soldier(&engine, "1000001", Rank::Private, &[]).await;
    let duty = engine
        .create_duty(make_draft(T0 + 2 * H, T0 + 4 * H, 1, 1.0))
        .await
        .unwrap();

    let mut rx = engine.notify.subscribe(duty.id);
    engine.schedule_duty(duty.id).await.unwrap();

    let event = rx.recv().await.unwrap();
    assert!(matches!(event, Event::DutyScheduled { id, .. } if id == duty.id));
}
