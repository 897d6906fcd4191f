//! Ring construction and the command surface.
//!
//! A [`Table`] is the fixed wiring of N actors and N resources: actor `i`
//! holds resource `i` in its left hand and resource `i + 1` in its right.
//! A [`Ring`] puts a tokio task behind every seat of a table and exposes the
//! three commands `run`, `pause` and `reset` plus read-only observation.

use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::actor::{ActorCell, ActorTask, Hand, Seat, Timings};
use crate::config::{RingConfiguration, MIN_RING_SIZE};
use crate::control::{RunController, RunState};
use crate::error::{RingError, RingResult};
use crate::invariants::{self, Invariant};
use crate::observe::{
    actor_position, resource_position, ActorSnapshot, ChangeFeed, ResourceSnapshot, RingSnapshot,
};
use crate::resource::{Resource, Side};
use crate::sampler::{self, FairnessReport, Sampler};
use crate::timing::Jitter;

/// Initial holder of resource `id`.
///
/// Every third resource starts with the actor that uses it as its left hand,
/// the others with the actor that uses it as its right hand. Actor 0 thus
/// starts with both resources, and the holders never all face the same way
/// around the ring, so the initial wait-for graph is acyclic.
pub fn initial_owner(id: usize) -> Side {
    if id % 3 == 0 {
        Side::Right
    } else {
        Side::Left
    }
}

/// Fixed wiring of actors and resources.
#[derive(Debug)]
pub struct Table {
    cells: Vec<Arc<ActorCell>>,
    resources: Vec<Arc<Resource>>,
    seats: Vec<Seat>,
}

impl Table {
    /// Wire `size` actors and resources in a cycle with the initial
    /// ownership of [`initial_owner`].
    pub fn new(size: usize, changes: ChangeFeed) -> RingResult<Self> {
        if size < MIN_RING_SIZE {
            return Err(RingError::TooSmall {
                size,
                min: MIN_RING_SIZE,
            });
        }

        let resources: Vec<Arc<Resource>> = (0..size)
            .map(|id| Arc::new(Resource::new(id, initial_owner(id), changes.clone())))
            .collect();

        let mut cells = Vec::with_capacity(size);
        let mut seats = Vec::with_capacity(size);
        for id in 0..size {
            let left = resources[id].clone();
            let right = resources[(id + 1) % size].clone();
            let cell = Arc::new(ActorCell::new(
                id,
                left.initial().held_by == Some(Hand::Left.side()),
                right.initial().held_by == Some(Hand::Right.side()),
                changes.clone(),
            ));
            cells.push(cell.clone());
            seats.push(Seat::new(cell, left, right));
        }

        let table = Self {
            cells,
            resources,
            seats,
        };
        table.check_wiring()?;
        Ok(table)
    }

    /// Number of actors.
    pub fn size(&self) -> usize {
        self.seats.len()
    }

    /// Seat of actor `id`.
    pub fn seat(&self, id: usize) -> Option<&Seat> {
        self.seats.get(id)
    }

    /// All seats in order.
    pub fn seats(&self) -> &[Seat] {
        &self.seats
    }

    /// All resources in order.
    pub fn resources(&self) -> &[Arc<Resource>] {
        &self.resources
    }

    /// Capture every actor and resource.
    ///
    /// Each resource entry is read under that resource's lock together with
    /// both neighbors' hold flags.
    pub fn snapshot(&self, run_state: RunState) -> RingSnapshot {
        let n = self.size();
        let actors = self
            .cells
            .iter()
            .map(|cell| {
                let view = cell.view();
                ActorSnapshot {
                    id: cell.id(),
                    state: view.state,
                    has_left: view.has_left,
                    has_right: view.has_right,
                    position: actor_position(cell.id(), n),
                }
            })
            .collect();
        let resources = self
            .resources
            .iter()
            .enumerate()
            .map(|(id, resource)| {
                let left = &self.cells[(id + n - 1) % n];
                let right = &self.cells[id];
                resource.inspect(|state| ResourceSnapshot {
                    id,
                    state: *state,
                    left_holds: left.view().has_right,
                    right_holds: right.view().has_left,
                    position: resource_position(id, n, state.held_by),
                })
            })
            .collect();
        RingSnapshot {
            run_state,
            actors,
            resources,
        }
    }

    /// Put every resource and both neighbors' hold flags back in the initial
    /// assignment.
    ///
    /// Only call this while no actor is taking protocol steps, such as after
    /// every actor has acknowledged a reset.
    pub fn reset_resources(&self) {
        let n = self.size();
        for (id, resource) in self.resources.iter().enumerate() {
            let initial = resource.initial();
            let left = &self.cells[(id + n - 1) % n];
            let right = &self.cells[id];
            resource.update(|state| {
                *state = initial;
                left.set_holding(Hand::Right, initial.held_by == Some(Hand::Right.side()));
                right.set_holding(Hand::Left, initial.held_by == Some(Hand::Left.side()));
            });
        }
    }

    fn check_wiring(&self) -> RingResult<()> {
        let n = self.size();
        for (id, seat) in self.seats.iter().enumerate() {
            let left = seat.resource(Hand::Left).id();
            let right = seat.resource(Hand::Right).id();
            if left != id || right != (id + 1) % n {
                return Err(RingError::InconsistentWiring {
                    actor: id,
                    reason: format!("seated between resources {left} and {right}"),
                });
            }
            if seat.cell().id() != id {
                return Err(RingError::InconsistentWiring {
                    actor: id,
                    reason: format!("cell reports id {}", seat.cell().id()),
                });
            }
        }
        let facing_left = self
            .resources
            .iter()
            .filter(|resource| resource.initial().held_by == Some(Side::Left))
            .count();
        if facing_left == 0 || facing_left == n {
            return Err(RingError::InconsistentWiring {
                actor: 0,
                reason: "initial holders all face the same way".to_string(),
            });
        }
        Ok(())
    }
}

/// State shared between the ring handle, its actors and its sampler.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) control: Arc<RunController>,
    pub(crate) table: Table,
    pub(crate) changes: ChangeFeed,
}

impl Shared {
    pub(crate) fn snapshot(&self) -> RingSnapshot {
        self.table.snapshot(self.control.state())
    }
}

struct Epoch {
    sampler: Arc<Mutex<Sampler>>,
    stop: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Epoch {
    fn new(config: &RingConfiguration) -> Self {
        Self {
            sampler: Arc::new(Mutex::new(Sampler::new(config.size, config.sample_cap))),
            stop: CancellationToken::new(),
            task: None,
        }
    }

    fn report(&self) -> FairnessReport {
        self.sampler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .report()
    }
}

/// Builder for a running [`Ring`].
///
/// # Example
///
/// ```rust
/// use dining_ring::{RingBuilder, RingConfiguration};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), dining_ring::RingError> {
/// let ring = RingBuilder::new()
///     .configuration(RingConfiguration::fast_local().with_seed(7))
///     .build()?;
/// ring.run();
/// ring.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct RingBuilder {
    config: RingConfiguration,
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for RingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RingBuilder {
    /// Default configuration with every built-in invariant registered.
    pub fn new() -> Self {
        Self {
            config: RingConfiguration::default(),
            invariants: invariants::builtin(),
        }
    }

    /// Replace the configuration.
    pub fn configuration(mut self, config: RingConfiguration) -> Self {
        self.config = config;
        self
    }

    /// Register an additional invariant checked on every sampler tick.
    pub fn invariant(mut self, invariant: Box<dyn Invariant>) -> Self {
        self.invariants.push(invariant);
        self
    }

    /// Drop every registered invariant, built-ins included.
    pub fn without_invariants(mut self) -> Self {
        self.invariants.clear();
        self
    }

    /// Validate, wire the table and spawn one task per actor.
    ///
    /// The ring starts `Paused`. Must be called from within a tokio runtime.
    #[instrument(skip(self), fields(size = self.config.size, seed = self.config.seed))]
    pub fn build(self) -> RingResult<Ring> {
        self.config.validate()?;

        let changes = ChangeFeed::new();
        let shared = Arc::new(Shared {
            control: Arc::new(RunController::new()),
            table: Table::new(self.config.size, changes.clone())?,
            changes,
        });

        let timings = Timings::from(&self.config);
        let actors = shared
            .table
            .seats()
            .iter()
            .map(|seat| {
                let jitter = Jitter::new(self.config.seed, seat.id(), self.config.jitter);
                let task = ActorTask::new(seat.clone(), shared.control.clone(), timings, jitter);
                tokio::spawn(task.run())
            })
            .collect();

        info!("ring built");
        Ok(Ring {
            epoch: Mutex::new(Epoch::new(&self.config)),
            shared,
            config: self.config,
            invariants: Arc::new(self.invariants),
            actors,
        })
    }
}

/// A running ring of actors.
///
/// Dropping the handle stops every task at its next suspension point.
pub struct Ring {
    shared: Arc<Shared>,
    config: RingConfiguration,
    invariants: Arc<Vec<Box<dyn Invariant>>>,
    epoch: Mutex<Epoch>,
    actors: Vec<JoinHandle<()>>,
}

impl Ring {
    /// Resume every actor and start sampling.
    pub fn run(&self) {
        self.shared.control.resume();
        let mut epoch = self.epoch();
        if epoch.task.is_none() {
            epoch.task = Some(tokio::spawn(sampler::sample_epoch(
                self.shared.clone(),
                epoch.sampler.clone(),
                self.invariants.clone(),
                self.config.sample_interval,
                epoch.stop.clone(),
            )));
        }
        self.shared.changes.bump();
        info!("running");
    }

    /// Suspend every actor at its next suspension point.
    ///
    /// Ownership is untouched. Sampling statistics of the current epoch are
    /// discarded; the next [`run`](Self::run) starts a fresh epoch.
    pub fn pause(&self) {
        self.shared.control.pause();
        let discarded = self.next_epoch();
        self.shared.changes.bump();
        info!(samples = discarded.report().samples, "paused");
    }

    /// Cancel whatever every actor is doing and restore the initial
    /// assignment.
    ///
    /// Resolves once every actor has restored itself. The ring is then in
    /// `Reset` with every resource and actor in its initial configuration;
    /// [`run`](Self::run) starts it again. Returns the report of the epoch
    /// that was running.
    pub async fn reset(&self) -> FairnessReport {
        let finished = self.next_epoch();
        let generation = self.shared.control.reset();
        debug!(generation, "reset issued");

        self.await_restored(generation).await;
        self.shared.table.reset_resources();
        self.shared.changes.bump();

        let report = finished.report();
        info!(generation, "reset complete\n{report}");
        report
    }

    /// Current global run state.
    pub fn state(&self) -> RunState {
        self.shared.control.state()
    }

    /// Configuration the ring was built with.
    pub fn configuration(&self) -> &RingConfiguration {
        &self.config
    }

    /// The wiring behind this ring.
    pub fn table(&self) -> &Table {
        &self.shared.table
    }

    /// Point-in-time view of every actor and resource.
    pub fn snapshot(&self) -> RingSnapshot {
        self.shared.snapshot()
    }

    /// Receiver that wakes whenever visible state changes.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.shared.changes.subscribe()
    }

    /// Statistics of the current sampling epoch.
    pub fn report(&self) -> FairnessReport {
        self.epoch().report()
    }

    /// Check every registered invariant against a fresh snapshot.
    pub fn check_invariants(&self) -> Vec<String> {
        invariants::check_all(&self.invariants, &self.snapshot())
    }

    /// Stop every task and wait for them to finish.
    pub async fn shutdown(mut self) {
        self.shared.control.shutdown();
        let sampler = {
            let mut epoch = self.epoch();
            epoch.stop.cancel();
            epoch.task.take()
        };
        if let Some(task) = sampler {
            join_logged(task, "sampler").await;
        }
        for (id, actor) in mem::take(&mut self.actors).into_iter().enumerate() {
            join_logged(actor, &format!("actor {id}")).await;
        }
        info!("ring shut down");
    }

    fn epoch(&self) -> MutexGuard<'_, Epoch> {
        self.epoch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stop the current sampling epoch and install a fresh, idle one.
    fn next_epoch(&self) -> Epoch {
        let finished = mem::replace(&mut *self.epoch(), Epoch::new(&self.config));
        finished.stop.cancel();
        finished
    }

    async fn await_restored(&self, generation: u64) {
        for cell in &self.shared.table.cells {
            let mut restored = cell.restored();
            loop {
                if *restored.borrow_and_update() >= generation {
                    break;
                }
                tokio::select! {
                    changed = restored.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = self.shared.control.shut_down() => return,
                }
            }
        }
    }
}

/// Wait for `task`, logging a panic or cancellation. Returns whether it
/// finished cleanly.
async fn join_logged(task: JoinHandle<()>, name: &str) -> bool {
    match task.await {
        Ok(()) => true,
        Err(err) => {
            warn!(task = name, %err, "task failed");
            false
        }
    }
}

impl Drop for Ring {
    fn drop(&mut self) {
        self.shared.control.shutdown();
        self.epoch().stop.cancel();
    }
}
