// src/core/types.rs — Core domain types

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::budget::BudgetConfig;
use super::prompts::PromptTemplates;
use crate::evaluator::tournament::{TournamentConfig, TournamentResult};

/// Free-form call parameters (option name → value). Ordered so merges and
/// comparisons are deterministic.
pub type Params = BTreeMap<String, serde_json::Value>;

/// Sequential candidate identifier, unique within a run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct CandidateId(pub u64);

impl std::fmt::Display for CandidateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// How a candidate came to be.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lineage {
    Seeded,
    Mutated { parent: CandidateId },
    Crossed { first: CandidateId, second: CandidateId },
}

impl Lineage {
    pub fn parents(&self) -> Vec<CandidateId> {
        match self {
            Lineage::Seeded => vec![],
            Lineage::Mutated { parent } => vec![*parent],
            Lineage::Crossed { first, second } => vec![*first, *second],
        }
    }
}

/// One artifact in the evolving population.
///
/// Content and lineage are fixed at creation; the rating is only ever moved by
/// the tournament evaluator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    id: CandidateId,
    generation: usize,
    content: String,
    lineage: Lineage,
    rating: f64,
    cost_usd: f64,
    generator: String,
    created_at: DateTime<Utc>,
}

impl Candidate {
    pub fn new(
        id: CandidateId,
        generation: usize,
        content: impl Into<String>,
        lineage: Lineage,
        generator: impl Into<String>,
        cost_usd: f64,
        rating: f64,
    ) -> Self {
        Self {
            id,
            generation,
            content: content.into(),
            lineage,
            rating,
            cost_usd,
            generator: generator.into(),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> CandidateId {
        self.id
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn lineage(&self) -> &Lineage {
        &self.lineage
    }

    pub fn rating(&self) -> f64 {
        self.rating
    }

    pub fn cost_usd(&self) -> f64 {
        self.cost_usd
    }

    pub fn generator(&self) -> &str {
        &self.generator
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub(crate) fn set_rating(&mut self, rating: f64) {
        self.rating = rating;
    }

    /// Ranking order: rating descending, then earlier generation, then lower id.
    pub fn rank_cmp(&self, other: &Candidate) -> Ordering {
        other
            .rating
            .total_cmp(&self.rating)
            .then(self.generation.cmp(&other.generation))
            .then(self.id.cmp(&other.id))
    }
}

/// One population snapshot advanced together through evaluation and recombination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generation {
    pub index: usize,
    pub candidates: Vec<Candidate>,
    pub tournament: Option<TournamentResult>,
}

impl Generation {
    pub fn new(index: usize, candidates: Vec<Candidate>) -> Self {
        Self {
            index,
            candidates,
            tournament: None,
        }
    }

    pub fn is_evaluated(&self) -> bool {
        self.tournament.is_some()
    }

    /// Candidates sorted by `Candidate::rank_cmp`.
    pub fn ranked(&self) -> Vec<&Candidate> {
        let mut ranked: Vec<&Candidate> = self.candidates.iter().collect();
        ranked.sort_by(|a, b| a.rank_cmp(b));
        ranked
    }

    pub fn total_cost(&self) -> f64 {
        self.candidates.iter().map(|c| c.cost_usd).sum()
    }
}

/// The named steps a run is configured by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Seeding,
    Evaluation,
    Mutation,
    Crossover,
}

impl Step {
    pub const ALL: [Step; 4] = [
        Step::Seeding,
        Step::Evaluation,
        Step::Mutation,
        Step::Crossover,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Seeding => "seeding",
            Step::Evaluation => "evaluation",
            Step::Mutation => "mutation",
            Step::Crossover => "crossover",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    Seeding,
    Evaluating,
    Selecting,
    Recombining,
    Done,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Seeding => write!(f, "SEEDING"),
            EngineState::Evaluating => write!(f, "EVALUATING"),
            EngineState::Selecting => write!(f, "SELECTING"),
            EngineState::Recombining => write!(f, "RECOMBINING"),
            EngineState::Done => write!(f, "DONE"),
        }
    }
}

/// Why a run stopped without a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    MaxGenerations,
    BudgetExhausted,
    Cancelled,
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Termination::MaxGenerations => write!(f, "max generations reached"),
            Termination::BudgetExhausted => write!(f, "budget exhausted"),
            Termination::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Real-time progress notifications emitted by the engine.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    StateChanged {
        state: EngineState,
        generation: usize,
    },
    SlotFailed {
        generation: usize,
        slot: usize,
        message: String,
    },
    GenerationEvaluated {
        generation: usize,
        size: usize,
        best_rating: f64,
        skipped_pairings: usize,
        spent_usd: f64,
    },
    Terminated {
        reason: Termination,
        generations_completed: usize,
        cost: f64,
    },
}

/// Final result of a run.
#[derive(Debug, Clone)]
pub struct EvolutionOutcome {
    pub run_id: String,
    pub best: Option<Candidate>,
    pub state: EngineState,
    pub termination: Termination,
    pub generations_completed: usize,
    pub total_cost_usd: f64,
    /// Every generation observed, oldest first. Empty unless history was requested.
    pub history: Vec<Generation>,
}

/// Configuration for the evolution engine.
#[derive(Debug, Clone)]
pub struct EvolutionEngineConfig {
    pub population_size: usize,
    /// Slots per recombination round. `None` means `population_size`.
    pub offspring_per_generation: Option<usize>,
    pub survivor_fraction: f64,
    /// Explicit survivor count; overrides `survivor_fraction`.
    pub survivors: Option<usize>,
    pub min_survivors: usize,
    pub crossover_rate: f64,
    pub max_generations: usize,
    pub seed: Option<u64>,
    pub keep_history: bool,
    pub evaluate_final_generation: bool,
    /// Longest admission wait the engine accepts before treating the budget as exhausted.
    pub max_wait: Duration,
    pub budget: BudgetConfig,
    pub tournament: TournamentConfig,
    pub prompts: PromptTemplates,
}

impl Default for EvolutionEngineConfig {
    fn default() -> Self {
        Self {
            population_size: 8,
            offspring_per_generation: None,
            survivor_fraction: 0.5,
            survivors: None,
            min_survivors: 2,
            crossover_rate: 0.5,
            max_generations: 5,
            seed: None,
            keep_history: false,
            evaluate_final_generation: true,
            max_wait: Duration::from_secs(3600),
            budget: BudgetConfig::default(),
            tournament: TournamentConfig::default(),
            prompts: PromptTemplates::default(),
        }
    }
}

impl EvolutionEngineConfig {
    pub fn offspring(&self) -> usize {
        self.offspring_per_generation.unwrap_or(self.population_size)
    }

    /// Number of survivors kept from a ranked generation of `n` candidates.
    pub fn survivor_count(&self, n: usize) -> usize {
        let k = match self.survivors {
            Some(k) => k,
            None => ((n as f64) * self.survivor_fraction).ceil() as usize,
        };
        k.max(self.min_survivors).min(n)
    }
}

impl From<&crate::infra::config::Config> for EvolutionEngineConfig {
    fn from(cfg: &crate::infra::config::Config) -> Self {
        let evo = &cfg.evolution;
        Self {
            population_size: evo.population_size,
            offspring_per_generation: evo.offspring_per_generation,
            survivor_fraction: evo.survivor_fraction,
            survivors: evo.survivors,
            min_survivors: evo.min_survivors,
            crossover_rate: evo.crossover_rate,
            max_generations: evo.max_generations,
            seed: evo.seed,
            keep_history: evo.keep_history,
            evaluate_final_generation: evo.evaluate_final_generation,
            max_wait: Duration::from_secs(cfg.budget.max_wait_secs),
            budget: BudgetConfig::from(&cfg.budget),
            tournament: TournamentConfig::from(&cfg.tournament),
            prompts: PromptTemplates::from(&cfg.prompts),
        }
    }
}
