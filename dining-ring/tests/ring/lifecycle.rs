//! Run, pause and reset behavior of a spawned ring.

use std::sync::Arc;
use std::time::Duration;

use dining_ring::{invariant_fn, ActorState, RingBuilder, RingConfiguration, RunState};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::support::{fast_ring, initial_snapshot, wait_for};

#[tokio::test(start_paused = true)]
async fn test_reset_round_trip_from_many_states() {
    let ring = fast_ring(5);
    let initial = initial_snapshot(5, RunState::Reset);

    for round in 0..12u64 {
        ring.run();
        tokio::time::sleep(Duration::from_millis(7 + round * 23)).await;
        if round % 3 == 1 {
            ring.pause();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        ring.reset().await;
        assert_eq!(ring.snapshot(), initial, "round {round}");
    }

    ring.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_invariants_hold_while_reset_is_in_flight() {
    let ring = Arc::new(fast_ring(13));
    let stop = CancellationToken::new();
    let watcher = {
        let ring = ring.clone();
        let stop = stop.clone();
        let mut changes = ring.changes();
        tokio::spawn(async move {
            let mut checked = 0u64;
            let mut violations = Vec::new();
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    changed = changes.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
                let _ = changes.borrow_and_update();
                checked += 1;
                violations.extend(ring.check_invariants());
            }
            (checked, violations)
        })
    };

    for round in 0..20u64 {
        ring.run();
        tokio::time::sleep(Duration::from_millis(11 + round * 17)).await;
        ring.reset().await;
        assert_eq!(ring.snapshot(), initial_snapshot(5, RunState::Reset));
    }
    stop.cancel();

    let (checked, violations) = watcher.await.unwrap();
    assert!(checked > 0);
    assert!(violations.is_empty(), "{violations:?}");
    if let Ok(ring) = Arc::try_unwrap(ring) {
        ring.shutdown().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_reset_before_first_run() {
    let ring = fast_ring(0);
    let report = ring.reset().await;
    assert_eq!(report.samples, 0);
    assert_eq!(ring.snapshot(), initial_snapshot(5, RunState::Reset));
    ring.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_back_to_back_resets() {
    let ring = fast_ring(9);
    ring.run();
    tokio::time::sleep(Duration::from_millis(300)).await;

    ring.reset().await;
    ring.reset().await;
    assert_eq!(ring.snapshot(), initial_snapshot(5, RunState::Reset));

    // The ring runs again after a reset.
    ring.run();
    wait_for(&ring, Duration::from_secs(5), |s| s.eating() > 0)
        .await
        .expect("nobody ate after reset");
    ring.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_pause_freezes_state_and_resume_completes_meal() {
    let ring = fast_ring(8);
    ring.run();

    let eating = wait_for(&ring, Duration::from_secs(5), |s| s.eating() > 0)
        .await
        .expect("nobody ate");
    let eater = eating
        .actors
        .iter()
        .position(|a| a.state == ActorState::Eating)
        .unwrap();
    ring.pause();

    tokio::time::sleep(Duration::from_millis(10)).await;
    let frozen = ring.snapshot();
    assert_eq!(frozen.run_state, RunState::Paused);
    assert_eq!(frozen.actors[eater].state, ActorState::Eating);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(ring.snapshot(), frozen);

    ring.run();
    let done = wait_for(&ring, Duration::from_secs(1), |s| {
        s.actors[eater].state != ActorState::Eating
    })
    .await
    .expect("meal never finished");
    assert_eq!(done.actors[eater].state, ActorState::Thinking);
    assert!(ring.check_invariants().is_empty());

    ring.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_resumed_delay_runs_half_its_planned_length() {
    let config = RingConfiguration {
        jitter: 0.0,
        ..RingConfiguration::fast_local()
    };
    let ring = RingBuilder::new().configuration(config).build().unwrap();
    ring.run();

    let eating = wait_for(&ring, Duration::from_secs(5), |s| s.eating() > 0)
        .await
        .expect("nobody ate");
    let eater = eating
        .actors
        .iter()
        .position(|a| a.state == ActorState::Eating)
        .unwrap();
    ring.pause();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let resumed = Instant::now();
    ring.run();
    wait_for(&ring, Duration::from_secs(1), |s| {
        s.actors[eater].state != ActorState::Eating
    })
    .await
    .expect("meal never finished");

    // 30ms meal, resumed for half of it.
    let elapsed = resumed.elapsed();
    assert!(
        elapsed >= Duration::from_millis(14) && elapsed <= Duration::from_millis(17),
        "finished {elapsed:?} after resume"
    );
    ring.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_pause_discards_epoch_statistics() {
    let ring = fast_ring(4);
    ring.run();
    tokio::time::sleep(Duration::from_millis(205)).await;
    assert_eq!(ring.report().samples, 20);

    ring.pause();
    assert_eq!(ring.report().samples, 0);

    ring.run();
    tokio::time::sleep(Duration::from_millis(55)).await;
    assert_eq!(ring.report().samples, 5);
    ring.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_registered_invariant_violations_reach_report() {
    let ring = RingBuilder::new()
        .configuration(RingConfiguration::fast_local())
        .invariant(invariant_fn("nobody_eats", |s| {
            if s.eating() > 0 {
                return Err(format!("{} eating", s.eating()));
            }
            Ok(())
        }))
        .build()
        .unwrap();
    ring.run();
    tokio::time::sleep(Duration::from_secs(2)).await;

    let report = ring.report();
    assert!(!report.invariant_violations.is_empty());
    assert!(report
        .invariant_violations
        .iter()
        .all(|v| v.starts_with("nobody_eats: ")));
    ring.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_changes_signal_redraws() {
    let ring = fast_ring(2);
    let mut changes = ring.changes();
    ring.run();
    changes.changed().await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    let version = *changes.borrow_and_update();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(*changes.borrow() > version);
    ring.shutdown().await;
}
