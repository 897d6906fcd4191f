//! Ring actors.
//!
//! An actor cycles THINKING → FUMBLING → HUNGRY → EATING → THINKING. Its
//! observable fields live in an [`ActorCell`] and the hand-off protocol is a
//! set of synchronous steps on a [`Seat`]. Each ring actor is a tokio task
//! driving those steps between interruptible delays.
//!
//! ## Hand-off protocol
//!
//! - Every resource starts dirty with a deterministic owner.
//! - A hungry actor requests each resource it lacks, claims releases
//!   addressed to it, and gives up any *dirty* resource a neighbor requests
//!   (re-requesting it at once). Clean resources stay put until used.
//! - Eating marks both resources dirty. Afterwards a resource is yielded only
//!   if it is requested; otherwise it is kept (lazy release).

mod seat;
mod task;

pub use seat::Seat;
pub(crate) use task::{ActorTask, Timings};

use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;
use tokio::sync::watch;

use crate::observe::ChangeFeed;
use crate::resource::Side;

/// Lifecycle state of an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActorState {
    /// Idle; answers requests for resources it holds.
    Thinking,
    /// Onset of hunger, before negotiation starts.
    Fumbling,
    /// Negotiating for both adjacent resources.
    Hungry,
    /// Holding and using both adjacent resources.
    Eating,
}

impl ActorState {
    /// One-letter code used in compact status lines.
    pub fn code(self) -> char {
        match self {
            ActorState::Thinking => 'T',
            ActorState::Fumbling => 'F',
            ActorState::Hungry => 'H',
            ActorState::Eating => 'E',
        }
    }

    fn to_bits(self) -> u8 {
        match self {
            ActorState::Thinking => 0,
            ActorState::Fumbling => 1,
            ActorState::Hungry => 2,
            ActorState::Eating => 3,
        }
    }

    fn from_bits(bits: u8) -> Self {
        match bits & STATE_MASK {
            0 => ActorState::Thinking,
            1 => ActorState::Fumbling,
            2 => ActorState::Hungry,
            _ => ActorState::Eating,
        }
    }
}

/// One of an actor's two hands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hand {
    /// Resource `i` for actor `i`.
    Left,
    /// Resource `i + 1` for actor `i`.
    Right,
}

impl Hand {
    /// Both hands, left first.
    pub const BOTH: [Hand; 2] = [Hand::Left, Hand::Right];

    /// Which neighbor of the resource this hand makes the actor.
    pub fn side(self) -> Side {
        match self {
            Hand::Left => Side::Right,
            Hand::Right => Side::Left,
        }
    }

    fn bit(self) -> u8 {
        match self {
            Hand::Left => HAS_LEFT,
            Hand::Right => HAS_RIGHT,
        }
    }
}

const STATE_MASK: u8 = 0b0011;
const HAS_LEFT: u8 = 0b0100;
const HAS_RIGHT: u8 = 0b1000;

/// Consistent copy of an actor's observable fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorView {
    /// Lifecycle state.
    pub state: ActorState,
    /// Holds its left-hand resource.
    pub has_left: bool,
    /// Holds its right-hand resource.
    pub has_right: bool,
}

impl ActorView {
    fn from_bits(bits: u8) -> Self {
        Self {
            state: ActorState::from_bits(bits),
            has_left: bits & HAS_LEFT != 0,
            has_right: bits & HAS_RIGHT != 0,
        }
    }

    /// Negotiating and not eating.
    pub fn is_hungry(&self) -> bool {
        self.state == ActorState::Hungry
    }

    /// Currently eating.
    pub fn is_eating(&self) -> bool {
        self.state == ActorState::Eating
    }

    /// Whether `hand` holds its resource.
    pub fn holds(&self, hand: Hand) -> bool {
        match hand {
            Hand::Left => self.has_left,
            Hand::Right => self.has_right,
        }
    }
}

/// Observable fields of an actor, packed in one atomic so readers never see
/// a state that disagrees with the hold flags.
///
/// Only the owning actor writes to its cell, except for the table putting
/// hold flags back after a reset. Hold flags are written while the matching
/// resource is locked.
#[derive(Debug)]
pub struct ActorCell {
    id: usize,
    bits: AtomicU8,
    restored: watch::Sender<u64>,
    changes: ChangeFeed,
}

impl ActorCell {
    /// A thinking actor holding the given hands.
    pub fn new(id: usize, has_left: bool, has_right: bool, changes: ChangeFeed) -> Self {
        let mut bits = ActorState::Thinking.to_bits();
        if has_left {
            bits |= HAS_LEFT;
        }
        if has_right {
            bits |= HAS_RIGHT;
        }
        let (restored, _) = watch::channel(0);
        Self {
            id,
            bits: AtomicU8::new(bits),
            restored,
            changes,
        }
    }

    /// Seat index.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Read state and hold flags in one load.
    pub fn view(&self) -> ActorView {
        ActorView::from_bits(self.bits.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: ActorState) {
        self.modify(|bits| (bits & !STATE_MASK) | state.to_bits());
    }

    pub(crate) fn set_holding(&self, hand: Hand, holding: bool) {
        self.modify(|bits| {
            if holding {
                bits | hand.bit()
            } else {
                bits & !hand.bit()
            }
        });
    }

    /// Switch to `Eating` if and only if both hands are full.
    pub(crate) fn try_begin_eating(&self) -> bool {
        let full = HAS_LEFT | HAS_RIGHT;
        let result = self
            .bits
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                (bits & full == full).then_some((bits & !STATE_MASK) | ActorState::Eating.to_bits())
            });
        if result.is_ok() {
            self.changes.bump();
        }
        result.is_ok()
    }

    /// Publish that this actor has restored itself after reset `generation`.
    pub(crate) fn acknowledge(&self, generation: u64) {
        self.restored.send_replace(generation);
    }

    /// Highest reset generation this actor has restored from.
    pub fn restored_generation(&self) -> u64 {
        *self.restored.borrow()
    }

    pub(crate) fn restored(&self) -> watch::Receiver<u64> {
        self.restored.subscribe()
    }

    fn modify(&self, f: impl Fn(u8) -> u8) {
        let previous = self.bits.load(Ordering::Acquire);
        let next = f(previous);
        if next != previous {
            self.bits.store(next, Ordering::Release);
            self.changes.bump();
        }
    }
}
