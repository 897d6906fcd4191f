//! Contended resources shared by two ring neighbors.
//!
//! A resource sits between two actors. Seen from the resource, the actor
//! holding it as its *right* hand is the [`Side::Left`] neighbor and the
//! actor holding it as its *left* hand is the [`Side::Right`] neighbor.
//!
//! Every transition is applied under the resource's own mutex. Neighbors are
//! woken through one [`Notify`] per side whenever a flag changes, so a hungry
//! actor does not have to spin to notice a request or a release.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::Notify;

use crate::observe::ChangeFeed;

/// One of the two neighbors of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Side {
    /// The neighbor for which this is the right-hand resource.
    Left,
    /// The neighbor for which this is the left-hand resource.
    Right,
}

impl Side {
    /// The other neighbor.
    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    fn index(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }
}

/// Ownership, priority and pending handoff flags of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResourceState {
    /// Used since it was last handed over.
    pub dirty: bool,
    /// The left neighbor is waiting for this resource.
    pub request_from_left: bool,
    /// The right neighbor is waiting for this resource.
    pub request_from_right: bool,
    /// Handed to the left neighbor, not yet claimed.
    pub released_to_left: bool,
    /// Handed to the right neighbor, not yet claimed.
    pub released_to_right: bool,
    /// Current holder, if any.
    pub held_by: Option<Side>,
}

impl ResourceState {
    /// Initial state: held by `owner`, dirty, nothing pending.
    pub fn held(owner: Side) -> Self {
        Self {
            dirty: true,
            request_from_left: false,
            request_from_right: false,
            released_to_left: false,
            released_to_right: false,
            held_by: Some(owner),
        }
    }

    /// Whether `side` has an outstanding request.
    pub fn requested_by(&self, side: Side) -> bool {
        match side {
            Side::Left => self.request_from_left,
            Side::Right => self.request_from_right,
        }
    }

    /// Whether a release to `side` is waiting to be claimed.
    pub fn released_to(&self, side: Side) -> bool {
        match side {
            Side::Left => self.released_to_left,
            Side::Right => self.released_to_right,
        }
    }

    fn request_flag(&mut self, side: Side) -> &mut bool {
        match side {
            Side::Left => &mut self.request_from_left,
            Side::Right => &mut self.request_from_right,
        }
    }

    fn release_flag(&mut self, side: Side) -> &mut bool {
        match side {
            Side::Left => &mut self.released_to_left,
            Side::Right => &mut self.released_to_right,
        }
    }

    /// Record that `side` wants this resource.
    pub fn request_from(&mut self, side: Side) {
        *self.request_flag(side) = true;
    }

    /// Hand the resource over to `to`.
    ///
    /// Ownership is cleared until `to` claims it. The resource travels clean,
    /// so the receiver keeps it until it has used it.
    pub fn yield_to(&mut self, to: Side) {
        self.held_by = None;
        *self.release_flag(to) = true;
        *self.request_flag(to) = false;
        self.mark_idle();
    }

    /// Take a pending release addressed to `by`.
    ///
    /// Returns `false` and changes nothing when no release is pending.
    pub fn claim(&mut self, by: Side) -> bool {
        if !self.released_to(by) {
            return false;
        }
        self.held_by = Some(by);
        *self.release_flag(by) = false;
        *self.request_flag(by) = false;
        true
    }

    /// Drop the request from `side` and any release addressed to it.
    pub fn withdraw(&mut self, side: Side) {
        *self.request_flag(side) = false;
        *self.release_flag(side) = false;
    }

    /// The holder finished using the resource.
    pub fn mark_used(&mut self) {
        self.dirty = true;
    }

    /// The resource is handed on without having been used.
    pub fn mark_idle(&mut self) {
        self.dirty = false;
    }

    /// Whether any release is waiting to be claimed.
    pub fn has_pending_release(&self) -> bool {
        self.released_to_left || self.released_to_right
    }
}

/// A contended unit shared by exactly two ring neighbors.
#[derive(Debug)]
pub struct Resource {
    id: usize,
    initial: ResourceState,
    state: Mutex<ResourceState>,
    waiters: [Notify; 2],
    changes: ChangeFeed,
}

impl Resource {
    /// Create a resource held by `owner` in its initial configuration.
    pub fn new(id: usize, owner: Side, changes: ChangeFeed) -> Self {
        let initial = ResourceState::held(owner);
        Self {
            id,
            initial,
            state: Mutex::new(initial),
            waiters: [Notify::new(), Notify::new()],
            changes,
        }
    }

    /// Position of this resource in the ring.
    pub fn id(&self) -> usize {
        self.id
    }

    /// The configuration restored by [`reset`](Self::reset).
    pub fn initial(&self) -> ResourceState {
        self.initial
    }

    /// Copy of the current state.
    pub fn state(&self) -> ResourceState {
        *self.lock()
    }

    /// Apply `f` under the resource lock. If the state changed, wake both
    /// neighbors and publish a change.
    ///
    /// Callers must keep `f` short and must not acquire another resource
    /// inside it.
    pub fn update<R>(&self, f: impl FnOnce(&mut ResourceState) -> R) -> R {
        let (out, changed) = {
            let mut state = self.lock();
            let before = *state;
            let out = f(&mut *state);
            (out, *state != before)
        };
        if changed {
            for waiter in &self.waiters {
                waiter.notify_one();
            }
            self.changes.bump();
        }
        out
    }

    /// Read under the resource lock without publishing anything.
    pub fn inspect<R>(&self, f: impl FnOnce(&ResourceState) -> R) -> R {
        f(&*self.lock())
    }

    /// Resolves when the state changed since `side` last waited.
    pub async fn notified(&self, side: Side) {
        self.waiters[side.index()].notified().await;
    }

    /// Record that `side` wants this resource.
    pub fn request_from(&self, side: Side) {
        self.update(|state| state.request_from(side));
    }

    /// Hand the resource over to `to`.
    pub fn yield_to(&self, to: Side) {
        self.update(|state| state.yield_to(to));
    }

    /// Take a pending release addressed to `by`.
    pub fn claim(&self, by: Side) -> bool {
        self.update(|state| state.claim(by))
    }

    /// The holder finished using the resource.
    pub fn mark_used(&self) {
        self.update(ResourceState::mark_used);
    }

    /// Restore ownership, dirty flag and pending flags to the initial
    /// assignment.
    pub fn reset(&self) {
        let initial = self.initial;
        self.update(|state| *state = initial);
    }

    fn lock(&self) -> MutexGuard<'_, ResourceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
