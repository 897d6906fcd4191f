//! Synchronous protocol steps of one actor.
//!
//! Every step locks at most one resource at a time and updates the actor's
//! hold flag inside that lock, so a snapshot never shows a resource in two
//! hands or in none while its holder still claims it.

use std::sync::Arc;

use tracing::{debug, trace};

use super::{ActorCell, ActorState, ActorView, Hand};
use crate::resource::Resource;

/// An actor's place at the ring: its cell and its two adjacent resources.
#[derive(Debug, Clone)]
pub struct Seat {
    cell: Arc<ActorCell>,
    left: Arc<Resource>,
    right: Arc<Resource>,
}

impl Seat {
    /// Seat `cell` between `left` (resource `i`) and `right` (resource `i + 1`).
    pub fn new(cell: Arc<ActorCell>, left: Arc<Resource>, right: Arc<Resource>) -> Self {
        Self { cell, left, right }
    }

    /// Seat index.
    pub fn id(&self) -> usize {
        self.cell.id()
    }

    /// The actor's observable fields.
    pub fn cell(&self) -> &Arc<ActorCell> {
        &self.cell
    }

    /// Current state and hold flags.
    pub fn view(&self) -> ActorView {
        self.cell.view()
    }

    /// Resource in `hand`.
    pub fn resource(&self, hand: Hand) -> &Arc<Resource> {
        match hand {
            Hand::Left => &self.left,
            Hand::Right => &self.right,
        }
    }

    /// Whether the initial assignment puts a resource in `hand`.
    pub fn initially_holds(&self, hand: Hand) -> bool {
        self.resource(hand).initial().held_by == Some(hand.side())
    }

    /// Enter THINKING.
    pub fn begin_thinking(&self) {
        self.cell.set_state(ActorState::Thinking);
    }

    /// Enter FUMBLING.
    pub fn begin_fumbling(&self) {
        self.cell.set_state(ActorState::Fumbling);
    }

    /// Enter HUNGRY and request every resource not already in hand.
    pub fn begin_hunger(&self) {
        self.cell.set_state(ActorState::Hungry);
        for hand in Hand::BOTH {
            if !self.view().holds(hand) {
                let side = hand.side();
                self.resource(hand).update(|state| state.request_from(side));
                trace!(actor = self.id(), resource = self.resource(hand).id(), "requested");
            }
        }
    }

    /// One negotiation round while HUNGRY.
    ///
    /// Claims releases addressed to this actor. If both resources are then
    /// in hand, returns `true`. Otherwise gives up every held resource that
    /// is dirty and requested by the neighbor, re-requesting it in the same
    /// step, and returns `false`.
    pub fn negotiate(&self) -> bool {
        for hand in Hand::BOTH {
            if !self.view().holds(hand) {
                self.claim(hand);
            }
        }
        let view = self.view();
        if view.has_left && view.has_right {
            return true;
        }
        for hand in Hand::BOTH {
            if self.view().holds(hand) {
                self.yield_if_requested(hand, true);
            }
        }
        false
    }

    /// Enter EATING. Fails when a hand is empty.
    pub fn begin_eating(&self) -> bool {
        let eating = self.cell.try_begin_eating();
        if eating {
            debug!(actor = self.id(), "eating");
        }
        eating
    }

    /// Leave EATING: both resources become dirty, the actor thinks again and
    /// hands over whatever is requested. Unrequested resources stay in hand.
    pub fn finish_eating(&self) {
        for hand in Hand::BOTH {
            self.resource(hand).update(|state| state.mark_used());
        }
        self.cell.set_state(ActorState::Thinking);
        self.serve_requests();
    }

    /// Hand over every held dirty resource the neighbor is waiting for.
    ///
    /// Called while THINKING or FUMBLING.
    pub fn serve_requests(&self) {
        for hand in Hand::BOTH {
            if self.view().holds(hand) {
                self.yield_if_requested(hand, false);
            }
        }
    }

    /// Return to THINKING and let go of everything outside the initial
    /// assignment.
    ///
    /// Only this actor's side of each resource is touched: its request, a
    /// release addressed to it and its own hold. A resource the neighbor
    /// holds is left alone, so the neighbor may keep eating until it restores
    /// too. An initially held resource is taken back only when nobody holds
    /// it and nothing is in transit. [`Table::reset_resources`] completes the
    /// assignment once every actor has restored.
    ///
    /// [`Table::reset_resources`]: crate::Table::reset_resources
    pub fn restore(&self) {
        self.cell.set_state(ActorState::Thinking);
        for hand in Hand::BOTH {
            let side = hand.side();
            let keep = self.initially_holds(hand);
            self.resource(hand).update(|state| {
                state.withdraw(side);
                let holding = state.held_by == Some(side);
                if holding && !keep {
                    state.held_by = None;
                } else if keep && state.held_by.is_none() && !state.has_pending_release() {
                    state.held_by = Some(side);
                }
                self.cell.set_holding(hand, state.held_by == Some(side));
            });
        }
        debug!(actor = self.id(), "restored");
    }

    fn claim(&self, hand: Hand) {
        let side = hand.side();
        let claimed = self.resource(hand).update(|state| {
            let claimed = state.claim(side);
            if claimed {
                self.cell.set_holding(hand, true);
            }
            claimed
        });
        if claimed {
            trace!(actor = self.id(), resource = self.resource(hand).id(), "claimed");
        }
    }

    fn yield_if_requested(&self, hand: Hand, rerequest: bool) {
        let side = hand.side();
        let other = side.opposite();
        let yielded = self.resource(hand).update(|state| {
            if state.held_by != Some(side) || !state.dirty || !state.requested_by(other) {
                return false;
            }
            state.yield_to(other);
            if rerequest {
                state.request_from(side);
            }
            self.cell.set_holding(hand, false);
            true
        });
        if yielded {
            trace!(actor = self.id(), resource = self.resource(hand).id(), "yielded");
        }
    }
}
