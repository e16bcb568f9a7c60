// src/evaluator/tournament.rs — Pairwise Elo tournament over one generation
//
// Comparisons of a round are dispatched together; rating updates are applied
// afterwards, one pairing at a time in submission order, so the result does
// not depend on which comparator answered first.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::elo::{rating_deltas, DEFAULT_K_FACTOR, DEFAULT_RATING};
use crate::core::budget::{Acquired, BudgetThrottle, DEFAULT_WINDOW};
use crate::core::callable::{Comparator, Judgement, Outcome};
use crate::core::selector::pick_from;
use crate::core::steps::{PoolEntry, StepConfig};
use crate::core::types::{Candidate, CandidateId};
use crate::infra::errors::EvolveError;

#[derive(Debug, Clone)]
pub struct TournamentConfig {
    pub k_factor: f64,
    pub initial_rating: f64,
    /// How many pairings each candidate takes part in per round (approximately, for odd N).
    pub pairings_per_candidate: usize,
}

impl Default for TournamentConfig {
    fn default() -> Self {
        Self {
            k_factor: DEFAULT_K_FACTOR,
            initial_rating: DEFAULT_RATING,
            pairings_per_candidate: 2,
        }
    }
}

impl From<&crate::infra::config::TournamentConfig> for TournamentConfig {
    fn from(cfg: &crate::infra::config::TournamentConfig) -> Self {
        Self {
            k_factor: cfg.k_factor,
            initial_rating: cfg.initial_rating,
            pairings_per_candidate: cfg.pairings_per_candidate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PairingStatus {
    Decided(Outcome),
    Skipped { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairingRecord {
    pub first: CandidateId,
    pub second: CandidateId,
    pub comparator: String,
    pub status: PairingStatus,
    pub first_delta: f64,
    pub second_delta: f64,
    pub cost_usd: f64,
}

/// What one evaluation round did.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TournamentResult {
    pub pairings: Vec<PairingRecord>,
    /// Candidate ids, best first.
    pub ranking: Vec<CandidateId>,
    /// Some pairings were skipped because the budget could not admit them.
    pub budget_limited: bool,
    pub cancelled: bool,
    /// Pairings skipped because the comparator failed.
    pub failed: usize,
}

impl TournamentResult {
    pub fn decided(&self) -> usize {
        self.pairings
            .iter()
            .filter(|p| matches!(p.status, PairingStatus::Decided(_)))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.pairings.len() - self.decided()
    }

    pub fn total_cost(&self) -> f64 {
        self.pairings.iter().map(|p| p.cost_usd).sum()
    }
}

/// Plan which candidate indices meet this round.
///
/// Runs `per_candidate` random perfect matchings (an odd leftover meets a
/// random other candidate), never pairs a candidate with itself, and rejects
/// unordered duplicates. Target size is `min(ceil(n·p/2), n(n−1)/2)`.
pub fn plan_pairings<R: Rng + ?Sized>(
    n: usize,
    per_candidate: usize,
    rng: &mut R,
) -> Vec<(usize, usize)> {
    if n < 2 || per_candidate == 0 {
        return Vec::new();
    }
    let max_unique = n * (n - 1) / 2;
    let target = ((n * per_candidate + 1) / 2).min(max_unique);

    let mut pairs = Vec::with_capacity(target);
    let mut seen = HashSet::new();
    let mut order: Vec<usize> = (0..n).collect();

    'rounds: for _ in 0..per_candidate {
        order.shuffle(rng);
        for chunk in order.chunks(2) {
            if pairs.len() >= target {
                break 'rounds;
            }
            match chunk {
                [a, b] => {
                    push_unique(&mut pairs, &mut seen, *a, *b);
                }
                [a] => {
                    let b = other_than(*a, n, rng);
                    push_unique(&mut pairs, &mut seen, *a, b);
                }
                _ => {}
            }
        }
    }

    // Top up whatever duplicates cost us.
    let mut attempts = 0;
    while pairs.len() < target && attempts < target * 8 {
        let a = rng.gen_range(0..n);
        let b = other_than(a, n, rng);
        push_unique(&mut pairs, &mut seen, a, b);
        attempts += 1;
    }

    pairs
}

fn other_than<R: Rng + ?Sized>(a: usize, n: usize, rng: &mut R) -> usize {
    let b = rng.gen_range(0..n - 1);
    if b >= a {
        b + 1
    } else {
        b
    }
}

fn push_unique(
    pairs: &mut Vec<(usize, usize)>,
    seen: &mut HashSet<(usize, usize)>,
    a: usize,
    b: usize,
) -> bool {
    let key = (a.min(b), a.max(b));
    if a == b || !seen.insert(key) {
        return false;
    }
    pairs.push((a, b));
    true
}

/// Candidate ids in ranking order.
pub fn rank(candidates: &[Candidate]) -> Vec<CandidateId> {
    let mut ranked: Vec<&Candidate> = candidates.iter().collect();
    ranked.sort_by(|a, b| a.rank_cmp(b));
    ranked.into_iter().map(|c| c.id()).collect()
}

enum Attempt {
    Decided { judgement: Judgement, comparator: String },
    Failed {
        message: String,
        comparator: String,
        cost_usd: f64,
    },
    Unfunded { comparator: String },
    Cancelled { comparator: String },
}

/// Runs evaluation rounds with comparators drawn from the `evaluation` step pool.
pub struct Tournament {
    config: TournamentConfig,
    comparators: StepConfig<Arc<dyn Comparator>>,
    throttle: Option<Arc<BudgetThrottle>>,
    max_wait: Duration,
    cancel: CancellationToken,
}

impl Tournament {
    pub fn new(config: TournamentConfig, comparators: StepConfig<Arc<dyn Comparator>>) -> Self {
        Self {
            config,
            comparators,
            throttle: None,
            max_wait: DEFAULT_WINDOW,
            cancel: CancellationToken::new(),
        }
    }

    /// Gate every comparison through `throttle`, waiting at most `max_wait` per admission.
    pub fn with_throttle(mut self, throttle: Arc<BudgetThrottle>, max_wait: Duration) -> Self {
        self.throttle = Some(throttle);
        self.max_wait = max_wait;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &TournamentConfig {
        &self.config
    }

    /// One round with randomly planned pairings.
    pub async fn run<R: Rng + ?Sized>(
        &self,
        generation: usize,
        candidates: &mut [Candidate],
        rng: &mut R,
    ) -> Result<TournamentResult, EvolveError> {
        let pairs = plan_pairings(candidates.len(), self.config.pairings_per_candidate, rng);
        self.run_pairings(generation, candidates, &pairs, rng).await
    }

    /// One round over explicit pairings of candidate indices.
    pub async fn run_pairings<R: Rng + ?Sized>(
        &self,
        generation: usize,
        candidates: &mut [Candidate],
        pairs: &[(usize, usize)],
        rng: &mut R,
    ) -> Result<TournamentResult, EvolveError> {
        if let Some(&(a, b)) = pairs
            .iter()
            .find(|(a, b)| a == b || *a >= candidates.len() || *b >= candidates.len())
        {
            return Err(EvolveError::config(format!(
                "invalid pairing ({}, {}) for {} candidates",
                a,
                b,
                candidates.len()
            )));
        }

        let picks: Vec<&PoolEntry<Arc<dyn Comparator>>> = pairs
            .iter()
            .map(|_| pick_from(self.comparators.pool(), rng))
            .collect();

        let attempts = {
            let view: &[Candidate] = candidates;
            join_all(pairs.iter().zip(&picks).map(|(&(a, b), entry)| {
                self.compare_one(view[a].content(), view[b].content(), entry)
            }))
            .await
        };

        let mut result = TournamentResult::default();
        let mut failed = 0;
        let mut fatal = None;

        for (&(a, b), attempt) in pairs.iter().zip(attempts) {
            let first = candidates[a].id();
            let second = candidates[b].id();
            let attempt = match attempt {
                Ok(attempt) => attempt,
                Err(e) => {
                    fatal.get_or_insert(e);
                    continue;
                }
            };

            let record = match attempt {
                Attempt::Decided {
                    judgement,
                    comparator,
                } => {
                    let (da, db) = rating_deltas(
                        candidates[a].rating(),
                        candidates[b].rating(),
                        judgement.outcome,
                        self.config.k_factor,
                    );
                    let ra = candidates[a].rating() + da;
                    let rb = candidates[b].rating() + db;
                    candidates[a].set_rating(ra);
                    candidates[b].set_rating(rb);
                    PairingRecord {
                        first,
                        second,
                        comparator,
                        status: PairingStatus::Decided(judgement.outcome),
                        first_delta: da,
                        second_delta: db,
                        cost_usd: judgement.cost_usd,
                    }
                }
                Attempt::Failed {
                    message,
                    comparator,
                    cost_usd,
                } => {
                    failed += 1;
                    tracing::warn!(
                        generation,
                        first = %first,
                        second = %second,
                        cost_usd,
                        "Pairing skipped: {}",
                        message
                    );
                    PairingRecord {
                        cost_usd,
                        ..skipped(first, second, comparator, message)
                    }
                }
                Attempt::Unfunded { comparator } => {
                    result.budget_limited = true;
                    skipped(first, second, comparator, "budget exhausted".into())
                }
                Attempt::Cancelled { comparator } => {
                    result.cancelled = true;
                    skipped(first, second, comparator, "cancelled".into())
                }
            };
            result.pairings.push(record);
        }

        if let Some(e) = fatal {
            return Err(e);
        }
        // Only pairings that reached a comparator count as attempted.
        let attempted = result.decided() + failed;
        if attempted > 0 && failed == attempted {
            return Err(EvolveError::EvaluationFailure {
                generation,
                attempted,
            });
        }

        result.failed = failed;
        result.ranking = rank(candidates);
        tracing::info!(
            generation,
            pairings = result.pairings.len(),
            decided = result.decided(),
            skipped = result.skipped(),
            "Tournament round complete"
        );
        Ok(result)
    }

    async fn compare_one(
        &self,
        first: &str,
        second: &str,
        entry: &PoolEntry<Arc<dyn Comparator>>,
    ) -> Result<Attempt, EvolveError> {
        let comparator = entry.callable.name().to_string();
        let reservation = match &self.throttle {
            Some(throttle) => {
                let estimate = entry.callable.estimate_cost(first, second, &entry.params);
                match throttle.acquire(estimate, self.max_wait, &self.cancel).await? {
                    Acquired::Ready(r) => Some(r),
                    Acquired::Exhausted { .. } => return Ok(Attempt::Unfunded { comparator }),
                    Acquired::Cancelled => return Ok(Attempt::Cancelled { comparator }),
                }
            }
            None if self.cancel.is_cancelled() => {
                return Ok(Attempt::Cancelled { comparator });
            }
            None => None,
        };

        let outcome = entry.callable.compare(first, second, &entry.params).await;
        match (outcome, &self.throttle, reservation) {
            (Ok(judgement), Some(throttle), Some(r)) => {
                throttle.record(r, judgement.cost_usd);
                Ok(Attempt::Decided {
                    judgement,
                    comparator,
                })
            }
            (Ok(judgement), _, _) => Ok(Attempt::Decided {
                judgement,
                comparator,
            }),
            (Err(e), throttle, reservation) => {
                let cost_usd = e.billed_cost();
                if let (Some(throttle), Some(r)) = (throttle, reservation) {
                    if cost_usd > 0.0 {
                        throttle.record(r, cost_usd);
                    } else {
                        throttle.release(r);
                    }
                }
                Ok(Attempt::Failed {
                    message: e.to_string(),
                    comparator,
                    cost_usd,
                })
            }
        }
    }
}

fn skipped(first: CandidateId, second: CandidateId, comparator: String, reason: String) -> PairingRecord {
    PairingRecord {
        first,
        second,
        comparator,
        status: PairingStatus::Skipped { reason },
        first_delta: 0.0,
        second_delta: 0.0,
        cost_usd: 0.0,
    }
}
