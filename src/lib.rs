// src/lib.rs — Library root for evokoi

pub mod core;
pub mod evaluator;
pub mod infra;
pub mod provider;

pub use crate::core::callable::{Comparator, Generated, Generator, Judgement, Outcome};
pub use crate::core::{EngineSetup, EvolutionEngine};
pub use crate::infra::errors::EvolveError;
