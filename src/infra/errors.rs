// src/infra/errors.rs — Error types for evokoi

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvolveError {
    // Configuration errors (fatal, raised before any generation begins)
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Prompt template error: {0}")]
    Template(String),

    // Per-call failures (absorbed at slot/pairing granularity)
    // `cost_usd` is what the call was billed before it failed.
    #[error("Generator '{generator}' failed: {message}")]
    Generation {
        generator: String,
        message: String,
        cost_usd: f64,
    },

    #[error("Comparator '{comparator}' failed: {message}")]
    Comparison {
        comparator: String,
        message: String,
        cost_usd: f64,
    },

    #[error("Provider '{provider}' error: {message}")]
    Provider { provider: String, message: String },

    // Population-wide failures (fatal)
    #[error("Population collapsed: every slot of generation {generation} failed")]
    PopulationCollapse { generation: usize },

    #[error("Evaluation failed: all {attempted} pairings of generation {generation} failed")]
    EvaluationFailure { generation: usize, attempted: usize },

    #[error("No candidate was produced before the run ended")]
    NoCandidate,

    // Infra
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EvolveError {
    /// Whether this error ends a run, as opposed to dropping a single slot or pairing.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            EvolveError::Generation { .. }
                | EvolveError::Comparison { .. }
                | EvolveError::Provider { .. }
        )
    }

    pub fn config(message: impl Into<String>) -> Self {
        EvolveError::Configuration(message.into())
    }

    /// Spend a failed call still incurred, to be recorded against the budget.
    pub fn billed_cost(&self) -> f64 {
        match self {
            EvolveError::Generation { cost_usd, .. } | EvolveError::Comparison { cost_usd, .. } => {
                cost_usd.max(0.0)
            }
            _ => 0.0,
        }
    }
}

impl From<minijinja::Error> for EvolveError {
    fn from(e: minijinja::Error) -> Self {
        EvolveError::Template(e.to_string())
    }
}
