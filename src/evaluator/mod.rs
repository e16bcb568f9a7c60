// src/evaluator/mod.rs — Pairwise evaluation (Elo tournaments and judges)

pub mod elo;
pub mod judge;
pub mod parser;
pub mod tournament;

pub use judge::LlmJudge;
pub use tournament::{Tournament, TournamentConfig, TournamentResult};
