// src/core/callable.rs — Pluggable generator and comparator boundaries

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::types::Params;
use crate::infra::errors::EvolveError;

/// Content returned by a generator call, with what it cost.
#[derive(Debug, Clone)]
pub struct Generated {
    pub content: String,
    pub cost_usd: f64,
}

impl Generated {
    pub fn new(content: impl Into<String>, cost_usd: f64) -> Self {
        Self {
            content: content.into(),
            cost_usd,
        }
    }
}

/// Produces new content from an input string (a task, a parent, or two parents rendered together).
#[async_trait]
pub trait Generator: Send + Sync {
    fn name(&self) -> &str;

    /// Best-effort cost estimate used for budget admission before the call is made.
    fn estimate_cost(&self, input: &str, params: &Params) -> f64;

    async fn generate(&self, input: &str, params: &Params) -> Result<Generated, EvolveError>;
}

/// Outcome of comparing two contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    FirstWins,
    SecondWins,
    Tie,
}

impl Outcome {
    /// Elo actual score for the first contestant.
    pub fn first_score(&self) -> f64 {
        match self {
            Outcome::FirstWins => 1.0,
            Outcome::SecondWins => 0.0,
            Outcome::Tie => 0.5,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::FirstWins => write!(f, "first-wins"),
            Outcome::SecondWins => write!(f, "second-wins"),
            Outcome::Tie => write!(f, "tie"),
        }
    }
}

/// A comparator verdict with what it cost.
#[derive(Debug, Clone, Copy)]
pub struct Judgement {
    pub outcome: Outcome,
    pub cost_usd: f64,
}

impl Judgement {
    pub fn new(outcome: Outcome, cost_usd: f64) -> Self {
        Self { outcome, cost_usd }
    }
}

/// Decides which of two contents is better. `params` may carry an `evaluation_prompt`.
#[async_trait]
pub trait Comparator: Send + Sync {
    fn name(&self) -> &str;

    fn estimate_cost(&self, first: &str, second: &str, params: &Params) -> f64;

    async fn compare(
        &self,
        first: &str,
        second: &str,
        params: &Params,
    ) -> Result<Judgement, EvolveError>;
}
