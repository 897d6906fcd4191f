//! Shared helpers for ring tests.

use std::time::Duration;

use dining_ring::{
    ChangeFeed, Ring, RingBuilder, RingConfiguration, RingSnapshot, RunState, Table,
};

/// A fast ring with every built-in invariant registered.
pub fn fast_ring(seed: u64) -> Ring {
    RingBuilder::new()
        .configuration(RingConfiguration::fast_local().with_seed(seed))
        .build()
        .expect("valid configuration")
}

/// Snapshot of a freshly wired table of `size`, as a ring in `run_state`
/// would report it.
pub fn initial_snapshot(size: usize, run_state: RunState) -> RingSnapshot {
    Table::new(size, ChangeFeed::new())
        .expect("valid size")
        .snapshot(run_state)
}

/// Poll `ring` every millisecond of virtual time until `predicate` holds.
///
/// Returns the matching snapshot, or `None` after `limit`.
pub async fn wait_for(
    ring: &Ring,
    limit: Duration,
    predicate: impl Fn(&RingSnapshot) -> bool,
) -> Option<RingSnapshot> {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        let snapshot = ring.snapshot();
        if predicate(&snapshot) {
            return Some(snapshot);
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    None
}
