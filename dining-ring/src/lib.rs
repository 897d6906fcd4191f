//! # Dining Ring
//!
//! A fixed ring of actors contending for pairwise shared resources under the
//! dirty/clean hand-off protocol, with an externally driven run state and
//! live fairness statistics.
//!
//! ## Guarantees
//!
//! - **Mutual exclusion**: a resource is never held by both neighbors.
//! - **Deadlock freedom**: the initial assignment is acyclic and a dirty
//!   resource always yields to a requesting neighbor, so some hungry actor
//!   can always make progress.
//! - **Starvation freedom**: a resource that changes hands travels clean and
//!   stays with the receiver until used.
//!
//! ## Core Components
//!
//! - [`RingBuilder`] / [`Ring`]: wire the ring, spawn one tokio task per
//!   actor, and drive it with `run`, `pause` and `reset`.
//! - [`RunController`]: the gate every actor passes through at each
//!   suspension point.
//! - [`Resource`] and [`Seat`]: the per-resource state machine and the
//!   synchronous protocol steps of one actor.
//! - [`Sampler`] / [`FairnessReport`]: per-epoch eating statistics.
//! - [`Invariant`]: safety properties checked on every sampler tick.
//! - [`RingSnapshot`]: the read-only observation surface.
//!
//! ## Quick Start
//!
//! ```rust
//! use dining_ring::{RingBuilder, RingConfiguration, RunState};
//!
//! # #[tokio::main(flavor = "current_thread", start_paused = true)]
//! # async fn main() -> Result<(), dining_ring::RingError> {
//! let ring = RingBuilder::new()
//!     .configuration(RingConfiguration::fast_local())
//!     .build()?;
//!
//! ring.run();
//! tokio::time::sleep(std::time::Duration::from_millis(500)).await;
//! assert!(ring.check_invariants().is_empty());
//!
//! let report = ring.reset().await;
//! assert_eq!(ring.state(), RunState::Reset);
//! println!("{report}");
//! ring.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

pub mod actor;
pub mod config;
pub mod control;
pub mod error;
pub mod invariants;
pub mod observe;
pub mod resource;
pub mod ring;
pub mod sampler;
pub mod timing;

pub use actor::{ActorCell, ActorState, ActorView, Hand, Seat};
pub use config::{RingConfiguration, MIN_RING_SIZE};
pub use control::{RunController, RunState};
pub use error::{Cancelled, RingError, RingResult};
pub use invariants::{
    invariant_fn, HolderAgreement, Invariant, MutualExclusion, NoPartialEating,
    ReleaseImpliesUnheld,
};
pub use observe::{ActorSnapshot, ChangeFeed, Point, ResourceSnapshot, RingSnapshot};
pub use resource::{Resource, ResourceState, Side};
pub use ring::{initial_owner, Ring, RingBuilder, Table};
pub use sampler::{FairnessReport, Sampler};
pub use timing::Jitter;
