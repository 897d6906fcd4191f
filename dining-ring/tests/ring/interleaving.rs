//! Randomized interleavings of protocol steps.
//!
//! Each step advances one actor chosen by a seeded RNG. Every built-in
//! invariant is checked after every step, and every actor must keep eating.

use dining_ring::invariants::{builtin, check_all};
use dining_ring::{ActorState, ChangeFeed, RunState, Seat, Table};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const STEPS: usize = 20_000;

/// Advance `seat` by one protocol step.
fn step(seat: &Seat, rng: &mut ChaCha8Rng) {
    match seat.view().state {
        ActorState::Thinking => {
            if rng.random_bool(0.3) {
                seat.begin_fumbling();
            } else {
                seat.serve_requests();
            }
        }
        ActorState::Fumbling => {
            if rng.random_bool(0.5) {
                seat.begin_hunger();
            } else {
                seat.serve_requests();
            }
        }
        ActorState::Hungry => {
            if seat.negotiate() {
                assert!(seat.begin_eating());
            }
        }
        ActorState::Eating => {
            if rng.random_bool(0.5) {
                seat.finish_eating();
            }
        }
    }
}

fn run_interleaving(size: usize, seed: u64) {
    let table = Table::new(size, ChangeFeed::new()).unwrap();
    let invariants = builtin();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut meals = vec![0u64; size];

    for n in 0..STEPS {
        let id = rng.random_range(0..size);
        let seat = table.seat(id).unwrap();
        let was_eating = seat.view().is_eating();
        step(seat, &mut rng);
        if !was_eating && seat.view().is_eating() {
            meals[id] += 1;
        }

        let violations = check_all(&invariants, &table.snapshot(RunState::Running));
        assert!(
            violations.is_empty(),
            "size {size} seed {seed} step {n}: {violations:?}"
        );
    }

    for (id, count) in meals.iter().enumerate() {
        assert!(
            *count > 0,
            "size {size} seed {seed}: actor {id} never ate ({meals:?})"
        );
    }
}

#[test]
fn test_random_interleavings_stay_safe_and_live() {
    for size in 3..=8 {
        for seed in 0..5 {
            run_interleaving(size, seed * 31 + size as u64);
        }
    }
}

#[test]
fn test_everyone_hungry_at_once_makes_progress() {
    for size in 3..=10 {
        let table = Table::new(size, ChangeFeed::new()).unwrap();
        for seat in table.seats() {
            seat.begin_fumbling();
            seat.begin_hunger();
        }

        // Round-robin negotiation until somebody eats.
        let mut rounds = 0;
        while !table.seats().iter().any(|s| s.view().is_eating()) {
            for seat in table.seats() {
                if seat.negotiate() {
                    seat.begin_eating();
                }
            }
            rounds += 1;
            assert!(rounds < 4, "size {size}: no progress after {rounds} rounds");
        }
        let snapshot = table.snapshot(RunState::Running);
        assert!(check_all(&builtin(), &snapshot).is_empty());
    }
}

fn assert_safe(table: &Table, context: &str) {
    let violations = check_all(&builtin(), &table.snapshot(RunState::Reset));
    assert!(violations.is_empty(), "{context}: {violations:?}");
}

#[test]
fn test_reset_mid_interleaving_restores_initial() {
    let table = Table::new(6, ChangeFeed::new()).unwrap();
    let initial = table.snapshot(RunState::Reset);
    let mut rng = ChaCha8Rng::seed_from_u64(77);

    for _ in 0..500 {
        let id = rng.random_range(0..6);
        step(table.seat(id).unwrap(), &mut rng);
    }
    for seat in table.seats() {
        seat.restore();
        assert_safe(&table, &format!("restored actor {}", seat.id()));
    }
    table.reset_resources();
    assert_eq!(table.snapshot(RunState::Reset), initial);
}

#[test]
fn test_restore_beside_an_eating_neighbor() {
    let table = Table::new(5, ChangeFeed::new()).unwrap();
    let initial = table.snapshot(RunState::Reset);
    let seat = |id: usize| table.seat(id).unwrap();

    // Actor 1 gives resource 2 to actor 2, actor 3 gives it resource 3.
    seat(1).begin_fumbling();
    seat(1).begin_hunger();
    seat(2).begin_fumbling();
    seat(2).begin_hunger();
    assert!(!seat(1).negotiate());
    seat(3).serve_requests();
    assert!(seat(2).negotiate());
    assert!(seat(2).begin_eating());

    // Actor 1 initially holds resource 2 but must not take it from the eater.
    seat(1).restore();
    assert_safe(&table, "actor 1 restored");
    assert!(seat(2).view().is_eating());
    assert!(!seat(1).view().has_right);

    for id in [3, 2, 0, 4] {
        seat(id).restore();
        assert_safe(&table, &format!("actor {id} restored"));
    }
    table.reset_resources();
    assert_eq!(table.snapshot(RunState::Reset), initial);
}

#[test]
fn test_staggered_restore_while_others_keep_stepping() {
    for size in 3..=8 {
        for seed in 0..5 {
            let table = Table::new(size, ChangeFeed::new()).unwrap();
            let initial = table.snapshot(RunState::Reset);
            let mut rng = ChaCha8Rng::seed_from_u64(seed * 17 + size as u64);

            for _ in 0..300 {
                let id = rng.random_range(0..size);
                step(table.seat(id).unwrap(), &mut rng);
            }

            // Restore in random order. Actors not yet restored keep taking
            // protocol steps in between.
            let mut order: Vec<usize> = (0..size).collect();
            order.shuffle(&mut rng);
            for (n, &id) in order.iter().enumerate() {
                table.seat(id).unwrap().restore();
                assert_safe(&table, &format!("size {size} seed {seed} restored {id}"));
                for _ in 0..10 {
                    let other = order[rng.random_range(n..size)];
                    if other != id {
                        step(table.seat(other).unwrap(), &mut rng);
                        assert_safe(&table, &format!("size {size} seed {seed} stepped {other}"));
                    }
                }
            }
            table.reset_resources();
            assert_eq!(
                table.snapshot(RunState::Reset),
                initial,
                "size {size} seed {seed}"
            );
        }
    }
}
