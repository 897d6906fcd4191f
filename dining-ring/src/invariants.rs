//! Safety properties checked against ring snapshots.
//!
//! Invariants registered on a [`RingBuilder`](crate::RingBuilder) are
//! evaluated by the sampler on every counted tick. A violation is not a
//! panic: it is logged and recorded in the epoch's
//! [`FairnessReport`](crate::FairnessReport).

use crate::actor::ActorState;
use crate::observe::RingSnapshot;
use crate::resource::Side;

/// A named property every reachable ring state must satisfy.
///
/// # Example
///
/// ```
/// use dining_ring::{Invariant, RingSnapshot};
///
/// struct AtMostHalfEating;
///
/// impl Invariant for AtMostHalfEating {
///     fn name(&self) -> &str {
///         "at_most_half_eating"
///     }
///
///     fn check(&self, snapshot: &RingSnapshot) -> Result<(), String> {
///         let limit = snapshot.actors.len() / 2;
///         match snapshot.eating() {
///             n if n <= limit => Ok(()),
///             n => Err(format!("{n} actors eating, limit {limit}")),
///         }
///     }
/// }
/// ```
pub trait Invariant: Send + Sync {
    /// The human-readable name of this invariant.
    fn name(&self) -> &str;

    /// Check the snapshot, describing the first violation found.
    fn check(&self, snapshot: &RingSnapshot) -> Result<(), String>;
}

/// Create a boxed invariant from a name and closure.
///
/// ```
/// use dining_ring::invariant_fn;
///
/// let two_eaters = invariant_fn("no_more_than_two", |snapshot| {
///     if snapshot.eating() > 2 {
///         return Err(format!("{} eating", snapshot.eating()));
///     }
///     Ok(())
/// });
/// assert_eq!(two_eaters.name(), "no_more_than_two");
/// ```
pub fn invariant_fn<F>(name: &str, check: F) -> Box<dyn Invariant>
where
    F: Fn(&RingSnapshot) -> Result<(), String> + Send + Sync + 'static,
{
    Box::new(FnInvariant {
        name: name.to_string(),
        check,
    })
}

struct FnInvariant<F> {
    name: String,
    check: F,
}

impl<F> Invariant for FnInvariant<F>
where
    F: Fn(&RingSnapshot) -> Result<(), String> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, snapshot: &RingSnapshot) -> Result<(), String> {
        (self.check)(snapshot)
    }
}

/// No resource is held by both neighbors.
pub struct MutualExclusion;

impl Invariant for MutualExclusion {
    fn name(&self) -> &str {
        "mutual_exclusion"
    }

    fn check(&self, snapshot: &RingSnapshot) -> Result<(), String> {
        for resource in &snapshot.resources {
            if resource.left_holds && resource.right_holds {
                return Err(format!("resource {} held by both neighbors", resource.id));
            }
        }
        Ok(())
    }
}

/// An eating actor holds both of its resources.
pub struct NoPartialEating;

impl Invariant for NoPartialEating {
    fn name(&self) -> &str {
        "no_partial_eating"
    }

    fn check(&self, snapshot: &RingSnapshot) -> Result<(), String> {
        for actor in &snapshot.actors {
            if actor.state == ActorState::Eating && !(actor.has_left && actor.has_right) {
                return Err(format!(
                    "actor {} eating with left={} right={}",
                    actor.id, actor.has_left, actor.has_right
                ));
            }
        }
        Ok(())
    }
}

/// A resource in transit has no holder and travels to one side only.
pub struct ReleaseImpliesUnheld;

impl Invariant for ReleaseImpliesUnheld {
    fn name(&self) -> &str {
        "release_implies_unheld"
    }

    fn check(&self, snapshot: &RingSnapshot) -> Result<(), String> {
        for resource in &snapshot.resources {
            let state = &resource.state;
            if state.released_to_left && state.released_to_right {
                return Err(format!("resource {} released to both sides", resource.id));
            }
            if state.has_pending_release()
                && (state.held_by.is_some() || resource.left_holds || resource.right_holds)
            {
                return Err(format!(
                    "resource {} released but still held ({:?})",
                    resource.id, state.held_by
                ));
            }
        }
        Ok(())
    }
}

/// The recorded holder of a resource is exactly the neighbor that believes
/// it holds it.
pub struct HolderAgreement;

impl Invariant for HolderAgreement {
    fn name(&self) -> &str {
        "holder_agreement"
    }

    fn check(&self, snapshot: &RingSnapshot) -> Result<(), String> {
        for resource in &snapshot.resources {
            let expected = match (resource.left_holds, resource.right_holds) {
                (true, false) => Some(Side::Left),
                (false, true) => Some(Side::Right),
                (false, false) => None,
                (true, true) => continue,
            };
            if resource.state.held_by != expected {
                return Err(format!(
                    "resource {} records holder {:?}, neighbors say {:?}",
                    resource.id, resource.state.held_by, expected
                ));
            }
        }
        Ok(())
    }
}

/// Every built-in invariant.
pub fn builtin() -> Vec<Box<dyn Invariant>> {
    vec![
        Box::new(MutualExclusion),
        Box::new(NoPartialEating),
        Box::new(ReleaseImpliesUnheld),
        Box::new(HolderAgreement),
    ]
}

/// Run `invariants` against `snapshot`, returning one line per violation.
pub fn check_all(invariants: &[Box<dyn Invariant>], snapshot: &RingSnapshot) -> Vec<String> {
    invariants
        .iter()
        .filter_map(|invariant| {
            invariant
                .check(snapshot)
                .err()
                .map(|message| format!("{}: {}", invariant.name(), message))
        })
        .collect()
}
