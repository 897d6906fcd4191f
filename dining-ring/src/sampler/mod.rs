//! Periodic fairness sampling.
//!
//! A [`Sampler`] lives for one run epoch. Every tick it looks at which
//! actors are hungry and which are eating, tallies eaters, and classifies the
//! tick as optimal or not. After `cap` ticks it stops counting but stays
//! queryable.

mod report;

pub use report::FairnessReport;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::actor::ActorState;
use crate::invariants::{self, Invariant};
use crate::observe::RingSnapshot;
use crate::ring::Shared;

/// Per-epoch eating tallies.
#[derive(Debug, Clone)]
pub struct Sampler {
    cap: u64,
    samples: u64,
    eat_counts: Vec<u64>,
    optimal: u64,
    suboptimal: u64,
    violations: Vec<String>,
}

impl Sampler {
    /// Fresh tallies for `size` actors, counting at most `cap` ticks.
    pub fn new(size: usize, cap: u64) -> Self {
        Self {
            cap,
            samples: 0,
            eat_counts: vec![0; size],
            optimal: 0,
            suboptimal: 0,
            violations: Vec::new(),
        }
    }

    /// Ticks counted so far.
    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Whether the cap has been reached.
    pub fn is_capped(&self) -> bool {
        self.samples >= self.cap
    }

    /// Count one tick over the actor states in seat order.
    ///
    /// A tick is suboptimal when some hungry actor has neither neighbor
    /// eating while fewer than two actors eat. Returns `false` without
    /// counting once capped.
    pub fn tick(&mut self, states: &[ActorState]) -> bool {
        if self.is_capped() {
            return false;
        }
        self.samples += 1;

        let n = states.len();
        let eating = |i: usize| states[i] == ActorState::Eating;
        let mut eaters = 0;
        for (i, count) in self.eat_counts.iter_mut().enumerate() {
            if eating(i) {
                *count += 1;
                eaters += 1;
            }
        }

        let stalled = (0..n).any(|i| {
            states[i] == ActorState::Hungry && !eating((i + 1) % n) && !eating((i + n - 1) % n)
        });
        if stalled && eaters < 2 {
            self.suboptimal += 1;
        } else {
            self.optimal += 1;
        }
        true
    }

    /// Record an invariant violation seen during this epoch.
    pub fn record_violation(&mut self, violation: String) {
        self.violations.push(violation);
    }

    /// Snapshot of the tallies.
    pub fn report(&self) -> FairnessReport {
        FairnessReport::new(
            self.samples,
            self.eat_counts.clone(),
            self.optimal,
            self.suboptimal,
            self.violations.clone(),
        )
    }
}

/// Tick `sampler` every `period` until `stop` fires or the cap is reached.
///
/// Invariants are checked against the same snapshot on every counted tick.
pub(crate) async fn sample_epoch(
    shared: Arc<Shared>,
    sampler: Arc<Mutex<Sampler>>,
    invariants: Arc<Vec<Box<dyn Invariant>>>,
    period: Duration,
    stop: CancellationToken,
) {
    let mut ticker = time::interval_at(time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = stop.cancelled() => {
                debug!("sampler stopped");
                return;
            }
            _ = ticker.tick() => {}
        }

        let snapshot = shared.snapshot();
        let mut sampler = sampler.lock().unwrap_or_else(PoisonError::into_inner);
        if !sampler.tick(&states(&snapshot)) {
            continue;
        }
        for violation in invariants::check_all(&invariants, &snapshot) {
            warn!(samples = sampler.samples(), %violation, "invariant violated");
            sampler.record_violation(violation);
        }
        if sampler.is_capped() {
            info!(samples = sampler.samples(), "sampler reached its cap");
            return;
        }
    }
}

fn states(snapshot: &RingSnapshot) -> Vec<ActorState> {
    snapshot.actors.iter().map(|actor| actor.state).collect()
}
