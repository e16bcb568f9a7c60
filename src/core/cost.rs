// src/core/cost.rs — Cost tracking and analytics

use std::collections::HashMap;

use super::types::Step;

/// Tracks spend across steps and callables for one run.
#[derive(Debug, Clone, Default)]
pub struct CostTracker {
    pub total_usd: f64,
    pub by_step: HashMap<Step, f64>,
    pub by_callable: HashMap<String, f64>,
    /// Number of completed calls per callable.
    pub calls_by_callable: HashMap<String, u64>,
    /// Calls that failed after admission, per step.
    pub failures_by_step: HashMap<Step, u64>,
}

impl CostTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, step: Step, callable: &str, cost_usd: f64) {
        self.total_usd += cost_usd;
        *self.by_step.entry(step).or_default() += cost_usd;
        *self.by_callable.entry(callable.into()).or_default() += cost_usd;
        *self.calls_by_callable.entry(callable.into()).or_default() += 1;
    }

    pub fn record_failure(&mut self, step: Step) {
        *self.failures_by_step.entry(step).or_default() += 1;
    }

    pub fn step_cost(&self, step: Step) -> f64 {
        self.by_step.get(&step).copied().unwrap_or(0.0)
    }

    pub fn total_calls(&self) -> u64 {
        self.calls_by_callable.values().sum()
    }

    pub fn total_failures(&self) -> u64 {
        self.failures_by_step.values().sum()
    }

    pub fn summary(&self) -> String {
        format!(
            "${:.4} total ({} calls, {} callables)",
            self.total_usd,
            self.total_calls(),
            self.by_callable.len()
        )
    }

    // ─── Analytics ──────────────────────────────────────────────

    /// Cost per step as a vec of (step, cost_usd), most expensive first.
    pub fn step_breakdown(&self) -> Vec<(Step, f64)> {
        let mut steps: Vec<_> = self.by_step.iter().map(|(k, v)| (*k, *v)).collect();
        steps.sort_by(|a, b| b.1.total_cmp(&a.1));
        steps
    }

    /// Callable breakdown, most expensive first.
    pub fn callable_breakdown(&self) -> Vec<CallableCostEntry> {
        let mut entries: Vec<_> = self
            .by_callable
            .iter()
            .map(|(name, cost)| CallableCostEntry {
                name: name.clone(),
                cost_usd: *cost,
                calls: self.calls_by_callable.get(name).copied().unwrap_or(0),
            })
            .collect();
        entries.sort_by(|a, b| b.cost_usd.total_cmp(&a.cost_usd));
        entries
    }

    pub fn analytics_report(&self) -> String {
        let mut report = String::new();
        report.push_str("═══ Cost Analytics ═══\n");
        report.push_str(&format!("Total: ${:.4}\n", self.total_usd));
        report.push_str(&format!("Total calls: {}\n", self.total_calls()));
        report.push_str(&format!("Failed calls: {}\n", self.total_failures()));

        if !self.by_step.is_empty() {
            report.push_str("\nBy Step:\n");
            for (step, cost) in self.step_breakdown() {
                let pct = if self.total_usd > 0.0 {
                    cost / self.total_usd * 100.0
                } else {
                    0.0
                };
                report.push_str(&format!("  {}: ${:.4} ({:.1}%)\n", step, cost, pct));
            }
        }

        if !self.by_callable.is_empty() {
            report.push_str("\nBy Callable:\n");
            for entry in self.callable_breakdown() {
                report.push_str(&format!(
                    "  {}: ${:.4} ({} calls)\n",
                    entry.name, entry.cost_usd, entry.calls
                ));
            }
        }

        report
    }
}

#[derive(Debug, Clone)]
pub struct CallableCostEntry {
    pub name: String,
    pub cost_usd: f64,
    pub calls: u64,
}
