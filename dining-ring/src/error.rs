//! Error types for the dining ring.

use thiserror::Error;

/// Configuration faults detected while building a ring.
///
/// All of these are raised before any actor task is spawned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RingError {
    /// Ring has too few seats to form a cycle with distinct neighbors.
    #[error("ring needs at least {min} actors, got {size}")]
    TooSmall {
        /// Requested ring size.
        size: usize,
        /// Smallest accepted ring size.
        min: usize,
    },

    /// Neighbor wiring or initial ownership does not line up.
    #[error("inconsistent wiring at actor {actor}: {reason}")]
    InconsistentWiring {
        /// Actor whose seat failed the check.
        actor: usize,
        /// What did not line up.
        reason: String,
    },

    /// A configuration value is outside its accepted range.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Result alias for ring construction.
pub type RingResult<T> = Result<T, RingError>;

/// Cancellation delivered through a suspension point.
///
/// This is not a fault. `Reset` is the designed restart mechanism and is
/// recovered by each actor locally; `Shutdown` ends the actor task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Cancelled {
    /// The run was reset; restore initial state and wait for the next run.
    #[error("run was reset")]
    Reset,

    /// The ring is shutting down.
    #[error("ring is shutting down")]
    Shutdown,
}
