//! Injectable randomness.
//!
//! Every probabilistic step draws exactly one uniform value in [0, 1) from a
//! [`RandomSource`]; a trial passes when the draw is strictly below its chance.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Supplier of uniform draws in [0, 1).
pub trait RandomSource {
    fn next_unit(&mut self) -> f64;
}

impl<T: RandomSource + ?Sized> RandomSource for &mut T {
    fn next_unit(&mut self) -> f64 {
        (**self).next_unit()
    }
}

/// Adapter over any `rand` generator.
#[derive(Clone, Debug)]
pub struct RngSource<R>(pub R);

impl<R: Rng> RandomSource for RngSource<R> {
    fn next_unit(&mut self) -> f64 {
        self.0.gen::<f64>()
    }
}

/// Deterministic source seeded for reproducible sessions.
pub fn seeded(seed: u64) -> RngSource<ChaCha8Rng> {
    RngSource(ChaCha8Rng::seed_from_u64(seed))
}

/// Draw that passes any trial with a chance above zero.
pub const FORCED_PASS: f64 = 0.0;
/// Draw that fails any trial with a chance below one.
pub const FORCED_FAIL: f64 = 0.999_999;

/// Replays a fixed sequence of draws, then repeats `fallback` forever.
#[derive(Clone, Debug)]
pub struct ScriptedRandom {
    draws: Vec<f64>,
    cursor: usize,
    fallback: f64,
}

impl ScriptedRandom {
    pub fn new(draws: Vec<f64>, fallback: f64) -> Self {
        Self {
            draws,
            cursor: 0,
            fallback,
        }
    }

    /// Always returns `value`.
    pub fn always(value: f64) -> Self {
        Self::new(Vec::new(), value)
    }

    pub fn always_pass() -> Self {
        Self::always(FORCED_PASS)
    }

    pub fn always_fail() -> Self {
        Self::always(FORCED_FAIL)
    }

    /// One forced result per trial, in order; trials past the script fail.
    pub fn from_outcomes(outcomes: &[bool]) -> Self {
        let draws = outcomes
            .iter()
            .map(|&pass| if pass { FORCED_PASS } else { FORCED_FAIL })
            .collect();
        Self::new(draws, FORCED_FAIL)
    }

    /// Number of draws consumed so far.
    pub fn consumed(&self) -> usize {
        self.cursor
    }
}

impl RandomSource for ScriptedRandom {
    fn next_unit(&mut self) -> f64 {
        let v = self.draws.get(self.cursor).copied().unwrap_or(self.fallback);
        self.cursor += 1;
        v
    }
}

/// Single Bernoulli trial. Returns whether it passed and the draw used.
pub fn bernoulli<R: RandomSource + ?Sized>(rng: &mut R, chance: f64) -> (bool, f64) {
    let roll = rng.next_unit();
    (roll < chance, roll)
}
