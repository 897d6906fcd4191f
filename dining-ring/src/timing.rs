//! Randomized delay sampling.
//!
//! Each actor owns a [`Jitter`] seeded from the ring seed and its seat, so
//! a given seed reproduces the same sequence of nominal delays per actor.

use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Draws delays uniformly from `nominal * [1 - fraction, 1 + fraction)`.
#[derive(Debug, Clone)]
pub struct Jitter {
    rng: ChaCha8Rng,
    fraction: f64,
}

impl Jitter {
    /// Create a generator for seat `actor` of a ring seeded with `seed`.
    pub fn new(seed: u64, actor: usize, fraction: f64) -> Self {
        let stream = seed ^ (actor as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        Self {
            rng: ChaCha8Rng::seed_from_u64(stream),
            fraction,
        }
    }

    /// Sample one delay around `nominal`.
    pub fn sample(&mut self, nominal: Duration) -> Duration {
        if self.fraction <= 0.0 || nominal.is_zero() {
            return nominal;
        }
        let factor = self
            .rng
            .random_range((1.0 - self.fraction)..(1.0 + self.fraction));
        nominal.mul_f64(factor)
    }
}
