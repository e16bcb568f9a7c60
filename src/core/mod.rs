// src/core/mod.rs — Evolution engine and its building blocks

pub mod budget;
pub mod callable;
pub mod cost;
pub mod orchestrator;
pub mod prompts;
pub mod selector;
pub mod steps;
pub mod termination;
pub mod types;

pub use orchestrator::{EngineSetup, EvolutionEngine};
