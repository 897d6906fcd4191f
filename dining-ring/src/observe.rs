//! Read-only observation surface.
//!
//! Presentation collaborators never touch actors or resources directly. They
//! take a [`RingSnapshot`] and subscribe to [`ChangeFeed`] to learn when a
//! redraw is needed.

use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::actor::ActorState;
use crate::control::RunState;
use crate::resource::{ResourceState, Side};

/// Version counter bumped on every visible mutation.
///
/// Cheap to clone; every actor and resource of a ring shares one feed.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    version: Arc<watch::Sender<u64>>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed {
    /// Create a feed at version zero.
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            version: Arc::new(version),
        }
    }

    /// Signal "redraw needed".
    pub fn bump(&self) {
        self.version.send_modify(|v| *v = v.wrapping_add(1));
    }

    /// Current version.
    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    /// Receiver that wakes on every bump.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }
}

/// Position on the unit canvas, origin top-left, `y` growing downwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    /// Horizontal coordinate in `[0, 1]`.
    pub x: f64,
    /// Vertical coordinate in `[0, 1]`.
    pub y: f64,
}

impl Point {
    fn on_circle(radius: f64, angle: f64) -> Self {
        Self {
            x: 0.5 + radius * angle.cos(),
            y: 0.5 - radius * angle.sin(),
        }
    }

    fn midpoint(self, other: Point) -> Self {
        Self {
            x: (self.x + other.x) / 2.0,
            y: (self.y + other.y) / 2.0,
        }
    }
}

/// Seat of actor `id` in a ring of `size`.
pub fn actor_position(id: usize, size: usize) -> Point {
    let angle = PI / 2.0 + 2.0 * PI / size as f64 * id as f64;
    Point::on_circle(1.0 / 3.0, angle)
}

/// Resting place of resource `id` in a ring of `size`, between actors
/// `id - 1` and `id`.
pub fn resource_home(id: usize, size: usize) -> Point {
    let angle = PI / 2.0 + 2.0 * PI / size as f64 * (id as f64 - 0.5);
    Point::on_circle(1.0 / 6.0, angle)
}

/// Drawn position of resource `id`: pulled halfway toward its holder.
pub fn resource_position(id: usize, size: usize, held_by: Option<Side>) -> Point {
    let home = resource_home(id, size);
    match held_by {
        None => home,
        Some(Side::Left) => home.midpoint(actor_position((id + size - 1) % size, size)),
        Some(Side::Right) => home.midpoint(actor_position(id, size)),
    }
}

/// Observable state of one actor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActorSnapshot {
    /// Seat index.
    pub id: usize,
    /// Lifecycle state.
    pub state: ActorState,
    /// Holds its left-hand resource.
    pub has_left: bool,
    /// Holds its right-hand resource.
    pub has_right: bool,
    /// Canvas position.
    pub position: Point,
}

/// Observable state of one resource.
///
/// `left_holds` and `right_holds` are the neighbors' own hold flags, read
/// under the same lock as `state`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceSnapshot {
    /// Resource index.
    pub id: usize,
    /// Flags and ownership.
    pub state: ResourceState,
    /// The left neighbor believes it holds this resource.
    pub left_holds: bool,
    /// The right neighbor believes it holds this resource.
    pub right_holds: bool,
    /// Canvas position.
    pub position: Point,
}

/// Point-in-time view of a whole ring.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RingSnapshot {
    /// Global run state.
    pub run_state: RunState,
    /// Actors in seat order.
    pub actors: Vec<ActorSnapshot>,
    /// Resources in ring order; resource `i` is actor `i`'s left hand.
    pub resources: Vec<ResourceSnapshot>,
}

impl RingSnapshot {
    /// Number of actors currently eating.
    pub fn eating(&self) -> usize {
        self.actors
            .iter()
            .filter(|a| a.state == ActorState::Eating)
            .count()
    }
}

impl fmt::Display for RingSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}]", self.run_state)?;
        for actor in &self.actors {
            let hands = match (actor.has_left, actor.has_right) {
                (true, true) => "<>",
                (true, false) => "< ",
                (false, true) => " >",
                (false, false) => "  ",
            };
            write!(f, " {}:{}{}", actor.id, actor.state.code(), hands)?;
        }
        Ok(())
    }
}
