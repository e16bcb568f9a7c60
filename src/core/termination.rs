// src/core/termination.rs — Loop stop conditions

use super::types::Termination;

/// What the engine knows at the top of a loop iteration.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopStatus {
    pub cancelled: bool,
    /// A call could not be funded within the allowed wait.
    pub budget_exhausted: bool,
    /// Recombination cycles finished so far.
    pub cycles_completed: usize,
}

/// Checks the stop conditions in priority order: cancellation, budget, cycle cap.
#[derive(Debug, Clone)]
pub struct TerminationChecker {
    pub max_generations: usize,
}

impl TerminationChecker {
    pub fn new(max_generations: usize) -> Self {
        Self { max_generations }
    }

    pub fn check(&self, status: &LoopStatus) -> Option<Termination> {
        if status.cancelled {
            return Some(Termination::Cancelled);
        }

        if status.budget_exhausted {
            return Some(Termination::BudgetExhausted);
        }

        if status.cycles_completed >= self.max_generations {
            return Some(Termination::MaxGenerations);
        }

        None
    }
}
