//! Global run-state controller.
//!
//! `RunController` is the monitor every actor passes through at each
//! suspension point. The phase lives in a [`tokio::sync::watch`] channel:
//! the channel's internal lock is the single exclusive region serializing
//! commands against `gate()`, and publishing a new phase is the broadcast
//! wake. A reset additionally bumps a generation counter so that actors can
//! acknowledge which reset they have restored from.

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::Cancelled;

/// Global run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    /// Actors block at their next suspension point.
    Paused,
    /// Actors make progress.
    Running,
    /// Actors abandon what they are doing and restore initial state.
    Reset,
}

/// Run state plus the number of resets issued so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Phase {
    pub(crate) state: RunState,
    pub(crate) generation: u64,
}

/// Three-state run machine with a broadcast-wake suspension gate.
#[derive(Debug)]
pub struct RunController {
    phase: watch::Sender<Phase>,
    shutdown: CancellationToken,
}

impl Default for RunController {
    fn default() -> Self {
        Self::new()
    }
}

impl RunController {
    /// Create a controller in the `Paused` state.
    pub fn new() -> Self {
        let (phase, _) = watch::channel(Phase {
            state: RunState::Paused,
            generation: 0,
        });
        Self {
            phase,
            shutdown: CancellationToken::new(),
        }
    }

    /// Current run state.
    pub fn state(&self) -> RunState {
        self.phase.borrow().state
    }

    /// Number of resets issued so far.
    pub fn generation(&self) -> u64 {
        self.phase.borrow().generation
    }

    /// Suspend progress at the next gate.
    pub fn pause(&self) {
        self.phase.send_modify(|phase| phase.state = RunState::Paused);
    }

    /// Resume progress and wake every blocked caller.
    pub fn resume(&self) {
        self.phase.send_modify(|phase| phase.state = RunState::Running);
    }

    /// Enter `Reset` and wake every blocked caller so each observes the
    /// cancellation. Returns the new reset generation.
    pub fn reset(&self) -> u64 {
        let mut generation = 0;
        self.phase.send_modify(|phase| {
            phase.state = RunState::Reset;
            phase.generation += 1;
            generation = phase.generation;
        });
        generation
    }

    /// Stop every gate for good.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Resolves once [`shutdown`](Self::shutdown) has been called.
    pub async fn shut_down(&self) {
        self.shutdown.cancelled().await;
    }

    /// Cooperative suspension point.
    ///
    /// Returns `Ok(false)` immediately when running, `Ok(true)` after having
    /// blocked through a pause, and `Err(Cancelled::Reset)` as soon as the
    /// state is `Reset`.
    pub async fn gate(&self) -> Result<bool, Cancelled> {
        let mut phase = self.phase.subscribe();
        let mut waited = false;
        loop {
            if self.shutdown.is_cancelled() {
                return Err(Cancelled::Shutdown);
            }
            let state = phase.borrow_and_update().state;
            match state {
                RunState::Running => return Ok(waited),
                RunState::Reset => return Err(Cancelled::Reset),
                RunState::Paused => {
                    waited = true;
                    tokio::select! {
                        changed = phase.changed() => {
                            changed.map_err(|_| Cancelled::Shutdown)?;
                        }
                        _ = self.shutdown.cancelled() => return Err(Cancelled::Shutdown),
                    }
                }
            }
        }
    }

    /// Resolves once the state leaves `Running` or shutdown begins.
    ///
    /// Used as a `select!` arm next to interruptible delays so a pause or
    /// reset is noticed without waiting the delay out.
    pub async fn interrupted(&self) {
        let mut phase = self.phase.subscribe();
        loop {
            if phase.borrow_and_update().state != RunState::Running {
                return;
            }
            tokio::select! {
                changed = phase.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                _ = self.shutdown.cancelled() => return,
            }
        }
    }

    /// Park until the state is `Running` again.
    ///
    /// `restore` is invoked with the generation of every reset observed while
    /// parked (including the current one on entry), so a parked actor keeps
    /// acknowledging resets issued back to back.
    pub(crate) async fn park(&self, mut restore: impl FnMut(u64)) -> Result<(), Cancelled> {
        let mut phase = self.phase.subscribe();
        let mut acknowledged = None;
        loop {
            if self.shutdown.is_cancelled() {
                return Err(Cancelled::Shutdown);
            }
            let current = *phase.borrow_and_update();
            if acknowledged != Some(current.generation) {
                restore(current.generation);
                acknowledged = Some(current.generation);
            }
            if current.state == RunState::Running {
                return Ok(());
            }
            tokio::select! {
                changed = phase.changed() => {
                    changed.map_err(|_| Cancelled::Shutdown)?;
                }
                _ = self.shutdown.cancelled() => return Err(Cancelled::Shutdown),
            }
        }
    }
}
