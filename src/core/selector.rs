// src/core/selector.rs — Pick one (callable, params) pair from a resolved pool

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::steps::{PoolEntry, StepConfig};

/// Picks pool entries with an injectable random source.
///
/// A fixed pool (one entry) never consumes randomness, so adding a second
/// generator to one step does not perturb the picks of the others.
pub struct GeneratorSelector<R: Rng = StdRng> {
    rng: R,
}

impl GeneratorSelector<StdRng> {
    /// Seeded selector; `None` draws the seed from OS entropy.
    pub fn seeded(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }
}

impl<R: Rng> GeneratorSelector<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    pub fn pick<'a, C>(&mut self, config: &'a StepConfig<C>) -> &'a PoolEntry<C> {
        pick_from(config.pool(), &mut self.rng)
    }

    /// Shared access to the random source for the caller's other choices.
    pub fn rng(&mut self) -> &mut R {
        &mut self.rng
    }
}

/// Uniform pick; panics only on an empty pool, which `StepConfig` rules out.
pub fn pick_from<'a, C, R: Rng + ?Sized>(pool: &'a [PoolEntry<C>], rng: &mut R) -> &'a PoolEntry<C> {
    if pool.len() == 1 {
        return &pool[0];
    }
    &pool[rng.gen_range(0..pool.len())]
}
