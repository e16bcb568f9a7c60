// src/infra/config.rs — Configuration loading (TOML)

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::prompts::{DEFAULT_CROSSOVER, DEFAULT_MUTATION, DEFAULT_SEEDING};
use crate::core::types::{Params, Step};
use crate::infra::errors::EvolveError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub evolution: EvolutionConfig,

    #[serde(default)]
    pub budget: BudgetConfig,

    #[serde(default)]
    pub tournament: TournamentConfig,

    #[serde(default)]
    pub prompts: PromptsConfig,

    /// Base parameters passed to every callable unless a step overrides them.
    #[serde(default)]
    pub params: Params,

    /// Per-step override specs keyed by step name (`seeding`, `evaluation`,
    /// `mutation`, `crossover`).
    #[serde(default)]
    pub steps: BTreeMap<String, StepSpecConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    pub population_size: usize,
    pub offspring_per_generation: Option<usize>,
    pub survivor_fraction: f64,
    pub survivors: Option<usize>,
    pub min_survivors: usize,
    pub crossover_rate: f64,
    pub max_generations: usize,
    pub seed: Option<u64>,
    pub keep_history: bool,
    pub evaluate_final_generation: bool,
}

impl Default for EvolutionConfig {
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
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    pub usd_per_hour: f64,
    /// Rolling window length in seconds.
    pub window_secs: u64,
    /// Longest admission wait before the budget counts as exhausted.
    pub max_wait_secs: u64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            usd_per_hour: 2.0,
            window_secs: 3600,
            max_wait_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TournamentConfig {
    pub k_factor: f64,
    pub initial_rating: f64,
    pub pairings_per_candidate: usize,
}

impl Default for TournamentConfig {
    fn default() -> Self {
        Self {
            k_factor: 32.0,
            initial_rating: 1000.0,
            pairings_per_candidate: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    pub seeding: String,
    pub mutation: String,
    pub crossover: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            seeding: DEFAULT_SEEDING.into(),
            mutation: DEFAULT_MUTATION.into(),
            crossover: DEFAULT_CROSSOVER.into(),
        }
    }
}

/// A callable named in a step spec, optionally bound to its own params.
///
/// ```toml
/// [steps.mutation]
/// generators = ["plain", { name = "hot", params = { temperature = 1.5 } }]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GeneratorRef {
    Name(String),
    Bound {
        name: String,
        #[serde(default)]
        params: Params,
    },
}

impl GeneratorRef {
    pub fn name(&self) -> &str {
        match self {
            GeneratorRef::Name(name) | GeneratorRef::Bound { name, .. } => name,
        }
    }
}

/// A step override spec as written in TOML. Keys other than `generator` and
/// `generators` are plain parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepSpecConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator: Option<GeneratorRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generators: Option<Vec<GeneratorRef>>,
    #[serde(flatten)]
    pub params: Params,
}

impl Config {
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), EvolveError> {
        let evo = &self.evolution;
        if evo.population_size == 0 {
            return Err(EvolveError::config("evolution.population_size must be at least 1"));
        }
        if evo.offspring_per_generation == Some(0) {
            return Err(EvolveError::config(
                "evolution.offspring_per_generation must be at least 1",
            ));
        }
        if !(evo.survivor_fraction > 0.0 && evo.survivor_fraction <= 1.0) {
            return Err(EvolveError::config(
                "evolution.survivor_fraction must be in (0, 1]",
            ));
        }
        if evo.survivors == Some(0) {
            return Err(EvolveError::config("evolution.survivors must be at least 1"));
        }
        if !(0.0..=1.0).contains(&evo.crossover_rate) {
            return Err(EvolveError::config(
                "evolution.crossover_rate must be in [0, 1]",
            ));
        }
        if !(self.budget.usd_per_hour.is_finite() && self.budget.usd_per_hour > 0.0) {
            return Err(EvolveError::config("budget.usd_per_hour must be positive"));
        }
        if self.budget.window_secs == 0 {
            return Err(EvolveError::config("budget.window_secs must be positive"));
        }
        if !(self.tournament.k_factor.is_finite() && self.tournament.k_factor > 0.0) {
            return Err(EvolveError::config("tournament.k_factor must be positive"));
        }
        for name in self.steps.keys() {
            step_from_name(name)?;
        }
        Ok(())
    }

    pub fn step(&self, step: Step) -> Option<&StepSpecConfig> {
        self.steps.get(step.as_str())
    }
}

fn step_from_name(name: &str) -> Result<Step, EvolveError> {
    Step::ALL
        .into_iter()
        .find(|s| s.as_str() == name)
        .ok_or_else(|| EvolveError::config(format!("unknown step '{name}'")))
}
