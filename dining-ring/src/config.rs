//! # Ring Configuration
//!
//! Timing and sizing knobs for a dining ring.
//!
//! | Field | Default | Meaning |
//! |-------|---------|---------|
//! | `size` | 5 | Actors (and Resources) in the cycle |
//! | `think_time` | 4s | Nominal THINKING delay |
//! | `fumble_time` | 2s | Nominal FUMBLING delay (onset of hunger) |
//! | `eat_time` | 3s | Nominal EATING delay |
//! | `jitter` | 0.2 | Each delay is drawn uniformly from `nominal * (1 ± jitter)` |
//! | `negotiation_poll` | 10ms | Longest a hungry actor waits before re-checking its resources |
//! | `sample_interval` | 10ms | Sampler tick period |
//! | `sample_cap` | 1000 | Ticks after which the sampler stops counting |
//! | `seed` | 0 | Base seed for the per-actor jitter generators |
//!
//! ## Configuration Examples
//!
//! ```rust
//! use dining_ring::RingConfiguration;
//! use std::time::Duration;
//!
//! let mut config = RingConfiguration::fast_local();
//! config.size = 7;
//! config.think_time = Duration::from_millis(80);
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

use crate::error::{RingError, RingResult};

/// Smallest ring in which every actor has two distinct neighbors.
pub const MIN_RING_SIZE: usize = 3;

/// Configuration for a dining ring.
#[derive(Debug, Clone, PartialEq)]
pub struct RingConfiguration {
    /// Number of actors, and of resources, in the cycle.
    pub size: usize,
    /// Nominal THINKING delay.
    pub think_time: Duration,
    /// Nominal FUMBLING delay between the onset of hunger and negotiation.
    pub fumble_time: Duration,
    /// Nominal EATING delay.
    pub eat_time: Duration,
    /// Symmetric jitter fraction applied to every delay, in `[0, 1)`.
    pub jitter: f64,
    /// Upper bound between two negotiation re-checks of a hungry actor.
    pub negotiation_poll: Duration,
    /// Sampler tick period.
    pub sample_interval: Duration,
    /// Number of ticks after which the sampler stops counting.
    pub sample_cap: u64,
    /// Base seed for the per-actor jitter generators.
    pub seed: u64,
}

impl Default for RingConfiguration {
    fn default() -> Self {
        Self {
            size: 5,
            think_time: Duration::from_secs(4),
            fumble_time: Duration::from_secs(2),
            eat_time: Duration::from_secs(3),
            jitter: 0.2,
            negotiation_poll: Duration::from_millis(10),
            sample_interval: Duration::from_millis(10),
            sample_cap: 1000,
            seed: 0,
        }
    }
}

impl RingConfiguration {
    /// Delays scaled down 100x, for tests and quick demos.
    ///
    /// Sampler cadence and cap are unchanged, so a full sampling epoch still
    /// spans `sample_cap` ticks.
    pub fn fast_local() -> Self {
        Self {
            think_time: Duration::from_millis(40),
            fumble_time: Duration::from_millis(20),
            eat_time: Duration::from_millis(30),
            negotiation_poll: Duration::from_millis(2),
            ..Self::default()
        }
    }

    /// Builder-style seed override.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Builder-style size override.
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// Check every field against its accepted range.
    pub fn validate(&self) -> RingResult<()> {
        if self.size < MIN_RING_SIZE {
            return Err(RingError::TooSmall {
                size: self.size,
                min: MIN_RING_SIZE,
            });
        }
        if !(0.0..1.0).contains(&self.jitter) {
            return Err(RingError::InvalidConfiguration(format!(
                "jitter must be in [0, 1), got {}",
                self.jitter
            )));
        }
        for (name, value) in [
            ("think_time", self.think_time),
            ("fumble_time", self.fumble_time),
            ("eat_time", self.eat_time),
            ("negotiation_poll", self.negotiation_poll),
            ("sample_interval", self.sample_interval),
        ] {
            if value.is_zero() {
                return Err(RingError::InvalidConfiguration(format!(
                    "{name} must be non-zero"
                )));
            }
        }
        if self.sample_cap == 0 {
            return Err(RingError::InvalidConfiguration(
                "sample_cap must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
