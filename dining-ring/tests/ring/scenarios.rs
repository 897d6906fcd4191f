//! Hand-off scenarios on a five-actor ring.

use std::time::Duration;

use dining_ring::{ActorState, ChangeFeed, Hand, RunState, Side, Table};

use crate::support::{fast_ring, initial_snapshot, wait_for};

#[test]
fn test_scenario_a_initial_assignment() {
    let table = Table::new(5, ChangeFeed::new()).unwrap();
    let view = |id: usize| table.seat(id).unwrap().view();

    assert!(view(0).has_left && view(0).has_right);
    assert!(view(3).has_left && view(3).has_right);
    assert!(!view(2).has_right);
    assert!(!view(4).has_right);
    assert!(table.resources().iter().all(|r| r.state().dirty));
}

#[test]
fn test_scenario_a_first_meal_leaves_both_dirty() {
    let table = Table::new(5, ChangeFeed::new()).unwrap();
    let actor = table.seat(0).unwrap();

    actor.begin_fumbling();
    actor.begin_hunger();
    assert!(actor.negotiate());
    assert!(actor.begin_eating());
    assert!(actor.view().is_eating());

    actor.finish_eating();
    let view = actor.view();
    assert_eq!(view.state, ActorState::Thinking);
    // Nobody asked, so both stay in hand.
    assert!(view.has_left && view.has_right);
    assert!(actor.resource(Hand::Left).state().dirty);
    assert!(actor.resource(Hand::Right).state().dirty);
}

#[tokio::test(start_paused = true)]
async fn test_scenario_a_actor_zero_eats_after_resume() {
    let ring = fast_ring(3);
    ring.run();

    let eating = wait_for(&ring, Duration::from_secs(5), |s| {
        s.actors[0].state == ActorState::Eating
    })
    .await
    .expect("actor 0 never ate");
    assert!(eating.actors[0].has_left && eating.actors[0].has_right);
    assert_eq!(eating.resources[0].state.held_by, Some(Side::Right));
    assert_eq!(eating.resources[1].state.held_by, Some(Side::Left));

    assert!(ring.check_invariants().is_empty());
    ring.shutdown().await;
}

#[test]
fn test_scenario_b_dirty_shared_resource_goes_to_requester() {
    let table = Table::new(5, ChangeFeed::new()).unwrap();
    let a1 = table.seat(1).unwrap();
    let a2 = table.seat(2).unwrap();
    let a3 = table.seat(3).unwrap();
    let shared = table.resources()[2].clone();
    assert_eq!(shared.state().held_by, Some(Side::Left));

    a1.begin_hunger();
    a2.begin_hunger();
    assert!(shared.state().requested_by(Side::Right));

    // a1 cannot eat yet; its dirty resource goes to a2 at once.
    assert!(!a1.negotiate());
    let state = shared.state();
    assert!(state.released_to(Side::Right));
    assert!(!state.dirty);
    assert!(state.requested_by(Side::Left));

    // a3 is thinking and hands over its dirty left resource.
    a3.serve_requests();
    assert!(a2.negotiate());
    assert!(a2.begin_eating());
    assert_eq!(shared.state().held_by, Some(Side::Right));

    // The clean resource stays with a2 until it has eaten.
    assert!(!a1.negotiate());
    assert_eq!(a1.view().state, ActorState::Hungry);

    a2.finish_eating();
    // a0 still holds a1's other resource, dirty and requested.
    table.seat(0).unwrap().serve_requests();
    assert!(a1.negotiate());
    assert!(a1.begin_eating());
    assert_eq!(shared.state().held_by, Some(Side::Left));
}

#[tokio::test(start_paused = true)]
async fn test_scenario_c_reset_while_eating() {
    let ring = fast_ring(11);
    ring.run();

    let eating = wait_for(&ring, Duration::from_secs(5), |s| s.eating() > 0)
        .await
        .expect("nobody ate");
    assert!(eating.eating() > 0);

    ring.reset().await;
    let after = ring.snapshot();
    assert_eq!(after, initial_snapshot(5, RunState::Reset));
    assert!(after.actors.iter().all(|a| a.state == ActorState::Thinking));

    ring.shutdown().await;
}
