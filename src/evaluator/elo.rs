// src/evaluator/elo.rs — Elo rating math

use crate::core::callable::Outcome;

pub const DEFAULT_K_FACTOR: f64 = 32.0;
pub const DEFAULT_RATING: f64 = 1000.0;

/// Expected score of a player rated `rating` against `opponent`.
pub fn expected_score(rating: f64, opponent: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((opponent - rating) / 400.0))
}

/// Rating deltas `(first, second)` for one decided pairing.
///
/// The second delta is the exact negation of the first, so every pairing is
/// zero-sum, ties included.
pub fn rating_deltas(first: f64, second: f64, outcome: Outcome, k_factor: f64) -> (f64, f64) {
    let expected = expected_score(first, second);
    let delta = k_factor * (outcome.first_score() - expected);
    (delta, -delta)
}
