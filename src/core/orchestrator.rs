// src/core/orchestrator.rs — Evolution engine (seed → evaluate → select → recombine)

use std::cmp::Ordering;
use std::sync::Arc;

use futures::future::join_all;
use rand::seq::SliceRandom;
use rand::Rng;
use tokio_util::sync::CancellationToken;

use super::budget::{Acquired, BudgetThrottle};
use super::callable::{Comparator, Generated, Generator};
use super::cost::CostTracker;
use super::prompts::PromptRenderer;
use super::selector::GeneratorSelector;
use super::steps::{resolve, PoolEntry, StepConfig, StepSpec};
use super::termination::{LoopStatus, TerminationChecker};
use super::types::*;
use crate::evaluator::tournament::Tournament;
use crate::infra::config::Config;
use crate::infra::errors::EvolveError;
use crate::provider::registry::CallableRegistry;

/// Everything needed to build an engine.
pub struct EngineSetup {
    pub default_generator: Arc<dyn Generator>,
    pub default_comparator: Arc<dyn Comparator>,
    /// Base parameters every step starts from.
    pub params: Params,
    pub seeding: StepSpec<Arc<dyn Generator>>,
    pub evaluation: StepSpec<Arc<dyn Comparator>>,
    pub mutation: StepSpec<Arc<dyn Generator>>,
    pub crossover: StepSpec<Arc<dyn Generator>>,
    pub config: EvolutionEngineConfig,
}

impl EngineSetup {
    pub fn new(
        default_generator: Arc<dyn Generator>,
        default_comparator: Arc<dyn Comparator>,
    ) -> Self {
        Self {
            default_generator,
            default_comparator,
            params: Params::new(),
            seeding: StepSpec::new(),
            evaluation: StepSpec::new(),
            mutation: StepSpec::new(),
            crossover: StepSpec::new(),
            config: EvolutionEngineConfig::default(),
        }
    }

    /// Build from a loaded config file, looking up named callables in `registry`.
    pub fn from_config(
        cfg: &Config,
        registry: &CallableRegistry,
        default_generator: Arc<dyn Generator>,
        default_comparator: Arc<dyn Comparator>,
    ) -> Result<Self, EvolveError> {
        cfg.validate()?;
        Ok(Self {
            default_generator,
            default_comparator,
            params: cfg.params.clone(),
            seeding: registry.generator_spec(cfg.step(Step::Seeding))?,
            evaluation: registry.comparator_spec(cfg.step(Step::Evaluation))?,
            mutation: registry.generator_spec(cfg.step(Step::Mutation))?,
            crossover: registry.generator_spec(cfg.step(Step::Crossover))?,
            config: EvolutionEngineConfig::from(cfg),
        })
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn with_seeding(mut self, spec: StepSpec<Arc<dyn Generator>>) -> Self {
        self.seeding = spec;
        self
    }

    pub fn with_evaluation(mut self, spec: StepSpec<Arc<dyn Comparator>>) -> Self {
        self.evaluation = spec;
        self
    }

    pub fn with_mutation(mut self, spec: StepSpec<Arc<dyn Generator>>) -> Self {
        self.mutation = spec;
        self
    }

    pub fn with_crossover(mut self, spec: StepSpec<Arc<dyn Generator>>) -> Self {
        self.crossover = spec;
        self
    }

    pub fn with_config(mut self, config: EvolutionEngineConfig) -> Self {
        self.config = config;
        self
    }
}

/// One generator call planned for a generation.
struct SlotPlan {
    slot: usize,
    step: Step,
    entry: PoolEntry<Arc<dyn Generator>>,
    input: String,
    lineage: Lineage,
}

enum SlotOutcome {
    Produced(Generated),
    Failed { message: String, cost_usd: f64 },
    Unfunded,
    Cancelled,
}

/// Drives a population through generations under a spend ceiling.
pub struct EvolutionEngine {
    config: EvolutionEngineConfig,
    seeding: StepConfig<Arc<dyn Generator>>,
    evaluation: StepConfig<Arc<dyn Comparator>>,
    mutation: StepConfig<Arc<dyn Generator>>,
    crossover: StepConfig<Arc<dyn Generator>>,
    prompts: PromptRenderer,
    throttle: Arc<BudgetThrottle>,
    selector: GeneratorSelector,
    termination: TerminationChecker,
    cost_tracker: CostTracker,
    cancel: CancellationToken,
    state: EngineState,
    run_id: String,
    next_id: u64,
    evaluated: usize,
    best: Option<Candidate>,
    history: Vec<Generation>,
    /// Optional callback for real-time progress events.
    on_progress: Option<Box<dyn Fn(ProgressEvent) + Send + Sync>>,
}

impl EvolutionEngine {
    /// Resolve every step and check the templates. Any problem here is a
    /// configuration error; nothing has been spent yet.
    pub fn new(setup: EngineSetup) -> Result<Self, EvolveError> {
        validate(&setup.config)?;

        let seeding = resolve(
            Step::Seeding,
            &setup.params,
            &setup.default_generator,
            &setup.seeding,
        )?;
        let evaluation = resolve(
            Step::Evaluation,
            &setup.params,
            &setup.default_comparator,
            &setup.evaluation,
        )?;
        let mutation = resolve(
            Step::Mutation,
            &setup.params,
            &setup.default_generator,
            &setup.mutation,
        )?;
        let crossover = resolve(
            Step::Crossover,
            &setup.params,
            &setup.default_generator,
            &setup.crossover,
        )?;
        let prompts = PromptRenderer::new(setup.config.prompts.clone())?;

        let config = setup.config;
        Ok(Self {
            throttle: Arc::new(BudgetThrottle::new(&config.budget)),
            selector: GeneratorSelector::seeded(config.seed),
            termination: TerminationChecker::new(config.max_generations),
            seeding,
            evaluation,
            mutation,
            crossover,
            prompts,
            cost_tracker: CostTracker::new(),
            cancel: CancellationToken::new(),
            state: EngineState::Seeding,
            run_id: String::new(),
            next_id: 0,
            evaluated: 0,
            best: None,
            history: Vec::new(),
            on_progress: None,
            config,
        })
    }

    /// Share a budget with other engines in the same process.
    pub fn with_throttle(mut self, throttle: Arc<BudgetThrottle>) -> Self {
        self.throttle = throttle;
        self
    }

    /// Set a callback for real-time progress events.
    pub fn with_progress(mut self, cb: impl Fn(ProgressEvent) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(cb));
        self
    }

    /// Fire a progress event if a callback is set.
    fn emit(&self, event: ProgressEvent) {
        if let Some(ref cb) = self.on_progress {
            cb(event);
        }
    }

    /// Token that stops the run at the next check; in-flight calls are drained.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Best candidate observed so far, readable after a fatal error too.
    pub fn best(&self) -> Option<&Candidate> {
        self.best.as_ref()
    }

    /// Evaluated generations, oldest first. Empty unless `keep_history` is set.
    pub fn history(&self) -> &[Generation] {
        &self.history
    }

    pub fn budget(&self) -> &BudgetThrottle {
        &self.throttle
    }

    pub fn cost(&self) -> &CostTracker {
        &self.cost_tracker
    }

    /// Effective plain parameters of a step.
    pub fn step_params(&self, step: Step) -> &Params {
        match step {
            Step::Seeding => &self.seeding.params,
            Step::Evaluation => &self.evaluation.params,
            Step::Mutation => &self.mutation.params,
            Step::Crossover => &self.crossover.params,
        }
    }

    fn set_state(&mut self, state: EngineState, generation: usize) {
        self.state = state;
        tracing::debug!(run_id = %self.run_id, generation, "State → {}", state);
        self.emit(ProgressEvent::StateChanged { state, generation });
    }

    fn next_candidate_id(&mut self) -> CandidateId {
        let id = CandidateId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Run to termination and return the full outcome.
    pub async fn run(&mut self, task: &str) -> Result<EvolutionOutcome, EvolveError> {
        self.run_id = uuid::Uuid::new_v4().to_string();
        self.selector = GeneratorSelector::seeded(self.config.seed);
        self.cost_tracker = CostTracker::new();
        self.next_id = 0;
        self.evaluated = 0;
        self.best = None;
        self.history.clear();

        tracing::info!(
            run_id = %self.run_id,
            population = self.config.population_size,
            max_generations = self.config.max_generations,
            ceiling_usd = self.throttle.ceiling(),
            "Evolution run started"
        );

        let mut status = LoopStatus::default();
        let mut current = self.seed(task, &mut status).await?;

        loop {
            status.cancelled |= self.cancel.is_cancelled();
            if current.candidates.is_empty() && !status.budget_exhausted && !status.cancelled {
                return Err(EvolveError::PopulationCollapse {
                    generation: current.index,
                });
            }

            if let Some(reason) = self.termination.check(&status) {
                if reason == Termination::MaxGenerations
                    && self.config.evaluate_final_generation
                    && !current.is_evaluated()
                    && !current.candidates.is_empty()
                {
                    self.evaluate(&mut current, &mut status).await?;
                }
                return Ok(self.finish(reason, &current, status.cycles_completed));
            }

            if !current.is_evaluated() {
                self.evaluate(&mut current, &mut status).await?;
                continue;
            }

            self.set_state(EngineState::Selecting, current.index);
            let k = self.config.survivor_count(current.candidates.len());
            let survivors = select_survivors(&current, k);
            tracing::debug!(
                generation = current.index,
                survivors = survivors.len(),
                "Survivors selected"
            );

            current = self
                .recombine(task, current.index + 1, &survivors, &mut status)
                .await?;
            status.cycles_completed += 1;
        }
    }

    /// Run and return the best candidate's content.
    pub async fn evolve(&mut self, task: &str) -> Result<String, EvolveError> {
        let outcome = self.run(task).await?;
        outcome
            .best
            .map(|c| c.content().to_string())
            .ok_or(EvolveError::NoCandidate)
    }

    /// Blocking form of [`evolve`](Self::evolve). Must not be called from
    /// inside a tokio runtime.
    pub fn evolve_blocking(&mut self, task: &str) -> Result<String, EvolveError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.evolve(task))
    }

    // ─── Steps ──────────────────────────────────────────────────

    async fn seed(&mut self, task: &str, status: &mut LoopStatus) -> Result<Generation, EvolveError> {
        self.set_state(EngineState::Seeding, 0);
        let input = self.prompts.seeding(task)?;

        let plans: Vec<SlotPlan> = (0..self.config.population_size)
            .map(|slot| SlotPlan {
                slot,
                step: Step::Seeding,
                entry: self.selector.pick(&self.seeding).clone(),
                input: input.clone(),
                lineage: Lineage::Seeded,
            })
            .collect();

        self.run_slots(0, plans, status).await
    }

    async fn evaluate(
        &mut self,
        generation: &mut Generation,
        status: &mut LoopStatus,
    ) -> Result<(), EvolveError> {
        self.set_state(EngineState::Evaluating, generation.index);

        let tournament = Tournament::new(self.config.tournament.clone(), self.evaluation.clone())
            .with_throttle(self.throttle.clone(), self.config.max_wait)
            .with_cancellation(self.cancel.clone());
        let result = tournament
            .run(generation.index, &mut generation.candidates, self.selector.rng())
            .await?;

        for pairing in &result.pairings {
            let decided = matches!(
                pairing.status,
                crate::evaluator::tournament::PairingStatus::Decided(_)
            );
            if decided || pairing.cost_usd > 0.0 {
                self.cost_tracker
                    .record(Step::Evaluation, &pairing.comparator, pairing.cost_usd);
            }
        }
        for _ in 0..result.failed {
            self.cost_tracker.record_failure(Step::Evaluation);
        }

        status.budget_exhausted |= result.budget_limited;
        status.cancelled |= result.cancelled;
        let skipped = result.skipped();
        generation.tournament = Some(result);
        self.observe(generation, skipped);
        Ok(())
    }

    async fn recombine(
        &mut self,
        task: &str,
        generation: usize,
        survivors: &[Candidate],
        status: &mut LoopStatus,
    ) -> Result<Generation, EvolveError> {
        self.set_state(EngineState::Recombining, generation);

        let mut plans = Vec::with_capacity(self.config.offspring());
        for slot in 0..self.config.offspring() {
            let crossover =
                survivors.len() >= 2 && self.selector.rng().gen_bool(self.config.crossover_rate);

            let plan = if crossover {
                let parents: Vec<&Candidate> =
                    survivors.choose_multiple(self.selector.rng(), 2).collect();
                let (first, second) = (parents[0], parents[1]);
                SlotPlan {
                    slot,
                    step: Step::Crossover,
                    entry: self.selector.pick(&self.crossover).clone(),
                    input: self
                        .prompts
                        .crossover(task, first.content(), second.content())?,
                    lineage: Lineage::Crossed {
                        first: first.id(),
                        second: second.id(),
                    },
                }
            } else {
                let Some(parent) = survivors.choose(self.selector.rng()) else {
                    break;
                };
                SlotPlan {
                    slot,
                    step: Step::Mutation,
                    entry: self.selector.pick(&self.mutation).clone(),
                    input: self.prompts.mutation(task, parent.content())?,
                    lineage: Lineage::Mutated { parent: parent.id() },
                }
            };
            plans.push(plan);
        }

        self.run_slots(generation, plans, status).await
    }

    /// Dispatch every planned slot together and collect the survivors in slot order.
    async fn run_slots(
        &mut self,
        generation: usize,
        plans: Vec<SlotPlan>,
        status: &mut LoopStatus,
    ) -> Result<Generation, EvolveError> {
        let outcomes = {
            let this: &Self = self;
            join_all(plans.iter().map(|plan| this.run_slot(plan))).await
        };

        let mut candidates = Vec::with_capacity(plans.len());
        let mut fatal = None;

        for (plan, outcome) in plans.into_iter().zip(outcomes) {
            let generator = plan.entry.callable.name().to_string();
            match outcome {
                Ok(SlotOutcome::Produced(generated)) => {
                    self.cost_tracker
                        .record(plan.step, &generator, generated.cost_usd);
                    let id = self.next_candidate_id();
                    candidates.push(Candidate::new(
                        id,
                        generation,
                        generated.content,
                        plan.lineage,
                        generator,
                        generated.cost_usd,
                        self.config.tournament.initial_rating,
                    ));
                }
                Ok(SlotOutcome::Failed { message, cost_usd }) => {
                    if cost_usd > 0.0 {
                        self.cost_tracker.record(plan.step, &generator, cost_usd);
                    }
                    self.cost_tracker.record_failure(plan.step);
                    tracing::warn!(
                        generation,
                        slot = plan.slot,
                        step = %plan.step,
                        generator = %generator,
                        "Slot dropped: {}",
                        message
                    );
                    self.emit(ProgressEvent::SlotFailed {
                        generation,
                        slot: plan.slot,
                        message,
                    });
                }
                Ok(SlotOutcome::Unfunded) => {
                    status.budget_exhausted = true;
                    tracing::debug!(generation, slot = plan.slot, "Slot unfunded");
                }
                Ok(SlotOutcome::Cancelled) => status.cancelled = true,
                Err(e) => {
                    fatal.get_or_insert(e);
                }
            }
        }

        if let Some(e) = fatal {
            return Err(e);
        }
        Ok(Generation::new(generation, candidates))
    }

    async fn run_slot(&self, plan: &SlotPlan) -> Result<SlotOutcome, EvolveError> {
        if self.cancel.is_cancelled() {
            return Ok(SlotOutcome::Cancelled);
        }

        let generator = &plan.entry.callable;
        let estimate = generator.estimate_cost(&plan.input, &plan.entry.params);
        let reservation = match self
            .throttle
            .acquire(estimate, self.config.max_wait, &self.cancel)
            .await?
        {
            Acquired::Ready(r) => r,
            Acquired::Exhausted { wait } => {
                tracing::debug!(
                    wait_ms = wait.as_millis() as u64,
                    estimate_usd = estimate,
                    "Admission wait exceeds limit"
                );
                return Ok(SlotOutcome::Unfunded);
            }
            Acquired::Cancelled => return Ok(SlotOutcome::Cancelled),
        };

        match generator.generate(&plan.input, &plan.entry.params).await {
            Ok(generated) => {
                self.throttle.record(reservation, generated.cost_usd);
                Ok(SlotOutcome::Produced(generated))
            }
            Err(e) => {
                let cost_usd = e.billed_cost();
                if cost_usd > 0.0 {
                    self.throttle.record(reservation, cost_usd);
                } else {
                    self.throttle.release(reservation);
                }
                Ok(SlotOutcome::Failed {
                    message: e.to_string(),
                    cost_usd,
                })
            }
        }
    }

    // ─── Bookkeeping ────────────────────────────────────────────

    fn observe(&mut self, generation: &Generation, skipped_pairings: usize) {
        self.evaluated += 1;

        let top = generation.ranked().first().map(|c| (*c).clone());
        if let Some(top) = &top {
            let improves = self
                .best
                .as_ref()
                .map_or(true, |best| top.rank_cmp(best) == Ordering::Less);
            if improves {
                self.best = Some(top.clone());
            }
        }

        if self.config.keep_history {
            self.history.push(generation.clone());
        }

        let best_rating = top.map(|c| c.rating()).unwrap_or(0.0);
        tracing::info!(
            run_id = %self.run_id,
            generation = generation.index,
            size = generation.candidates.len(),
            best_rating,
            spent_usd = self.cost_tracker.total_usd,
            "Generation evaluated"
        );
        self.emit(ProgressEvent::GenerationEvaluated {
            generation: generation.index,
            size: generation.candidates.len(),
            best_rating,
            skipped_pairings,
            spent_usd: self.cost_tracker.total_usd,
        });
    }

    fn finish(
        &mut self,
        reason: Termination,
        current: &Generation,
        cycles_completed: usize,
    ) -> EvolutionOutcome {
        // Nothing was evaluated: fall back to the first candidate produced.
        if self.best.is_none() {
            self.best = current.ranked().first().map(|c| (*c).clone());
        }

        self.set_state(EngineState::Done, current.index);
        tracing::info!(
            run_id = %self.run_id,
            reason = %reason,
            cycles_completed,
            generations_evaluated = self.evaluated,
            cost = %self.cost_tracker.summary(),
            "Evolution run finished"
        );
        self.emit(ProgressEvent::Terminated {
            reason,
            generations_completed: self.evaluated,
            cost: self.cost_tracker.total_usd,
        });

        EvolutionOutcome {
            run_id: self.run_id.clone(),
            best: self.best.clone(),
            state: self.state,
            termination: reason,
            generations_completed: self.evaluated,
            total_cost_usd: self.cost_tracker.total_usd,
            history: self.history.clone(),
        }
    }
}

/// Top `k` candidates of a generation by rank.
pub fn select_survivors(generation: &Generation, k: usize) -> Vec<Candidate> {
    generation
        .ranked()
        .into_iter()
        .take(k)
        .cloned()
        .collect()
}

fn validate(config: &EvolutionEngineConfig) -> Result<(), EvolveError> {
    if config.population_size == 0 {
        return Err(EvolveError::config("population size must be at least 1"));
    }
    if config.offspring() == 0 {
        return Err(EvolveError::config("offspring per generation must be at least 1"));
    }
    if !(0.0..=1.0).contains(&config.crossover_rate) {
        return Err(EvolveError::config(format!(
            "crossover rate {} is outside [0, 1]",
            config.crossover_rate
        )));
    }
    if !(config.survivor_fraction > 0.0 && config.survivor_fraction <= 1.0) {
        return Err(EvolveError::config(format!(
            "survivor fraction {} is outside (0, 1]",
            config.survivor_fraction
        )));
    }
    if config.survivors == Some(0) {
        return Err(EvolveError::config("survivor count must be at least 1"));
    }
    let ceiling = config.budget.ceiling();
    if !(ceiling.is_finite() && ceiling > 0.0) {
        return Err(EvolveError::config(format!(
            "budget ceiling must be positive, got ${ceiling}"
        )));
    }
    if config.budget.window.is_zero() {
        return Err(EvolveError::config("budget window must be positive"));
    }
    let k = config.tournament.k_factor;
    if !(k.is_finite() && k > 0.0) {
        return Err(EvolveError::config(format!(
            "tournament k-factor must be positive, got {k}"
        )));
    }
    let rating = config.tournament.initial_rating;
    if !rating.is_finite() {
        return Err(EvolveError::config(format!(
            "initial rating must be finite, got {rating}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::callable::{Judgement, Outcome};
    use crate::core::steps::GeneratorEntry;
    use async_trait::async_trait;
    use std::time::Duration;

    struct Echo;

    #[async_trait]
    impl Generator for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn estimate_cost(&self, _input: &str, _params: &Params) -> f64 {
            0.0
        }

        async fn generate(&self, input: &str, _params: &Params) -> Result<Generated, EvolveError> {
            Ok(Generated::new(format!("{input}+"), 0.0))
        }
    }

    struct Coin;

    #[async_trait]
    impl Comparator for Coin {
        fn name(&self) -> &str {
            "coin"
        }

        fn estimate_cost(&self, _first: &str, _second: &str, _params: &Params) -> f64 {
            0.0
        }

        async fn compare(
            &self,
            _first: &str,
            _second: &str,
            _params: &Params,
        ) -> Result<Judgement, EvolveError> {
            Ok(Judgement::new(Outcome::Tie, 0.0))
        }
    }

    fn setup() -> EngineSetup {
        EngineSetup::new(Arc::new(Echo), Arc::new(Coin))
    }

    fn candidate(id: u64, generation: usize, rating: f64) -> Candidate {
        Candidate::new(
            CandidateId(id),
            generation,
            format!("c{id}"),
            Lineage::Seeded,
            "echo",
            0.0,
            rating,
        )
    }

    #[test]
    fn test_conflicting_step_spec_fails_at_construction() {
        let g: Arc<dyn Generator> = Arc::new(Echo);
        let spec = StepSpec::new()
            .with_generator(GeneratorEntry::Bare(g.clone()))
            .with_generators(vec![GeneratorEntry::Bare(g)]);
        let result = EvolutionEngine::new(setup().with_mutation(spec));
        assert!(matches!(result, Err(EvolveError::Configuration(_))));
    }

    #[test]
    fn test_broken_template_fails_at_construction() {
        let mut config = EvolutionEngineConfig::default();
        config.prompts.mutation = "{% if %}".into();
        let result = EvolutionEngine::new(setup().with_config(config));
        assert!(matches!(result, Err(EvolveError::Template(_))));
    }

    #[test]
    fn test_invalid_shape_rejected() {
        let config = EvolutionEngineConfig {
            population_size: 0,
            ..Default::default()
        };
        assert!(EvolutionEngine::new(setup().with_config(config)).is_err());

        let config = EvolutionEngineConfig {
            crossover_rate: 2.0,
            ..Default::default()
        };
        assert!(EvolutionEngine::new(setup().with_config(config)).is_err());
    }

    #[test]
    fn test_empty_selection_rejected() {
        let config = EvolutionEngineConfig {
            survivors: Some(0),
            ..Default::default()
        };
        let result = EvolutionEngine::new(setup().with_config(config));
        assert!(matches!(result, Err(EvolveError::Configuration(m)) if m.contains("survivor")));

        // No explicit count, no minimum and no fraction keeps nobody.
        let config = EvolutionEngineConfig {
            survivor_fraction: 0.0,
            min_survivors: 0,
            ..Default::default()
        };
        let result = EvolutionEngine::new(setup().with_config(config));
        assert!(matches!(result, Err(EvolveError::Configuration(_))));

        let config = EvolutionEngineConfig {
            survivor_fraction: f64::NAN,
            ..Default::default()
        };
        assert!(EvolutionEngine::new(setup().with_config(config)).is_err());
    }

    #[test]
    fn test_tournament_settings_validated() {
        for k_factor in [0.0, -8.0, f64::INFINITY, f64::NAN] {
            let mut config = EvolutionEngineConfig::default();
            config.tournament.k_factor = k_factor;
            let result = EvolutionEngine::new(setup().with_config(config));
            assert!(
                matches!(result, Err(EvolveError::Configuration(_))),
                "k_factor {k_factor} accepted"
            );
        }

        let mut config = EvolutionEngineConfig::default();
        config.tournament.initial_rating = f64::NAN;
        assert!(EvolutionEngine::new(setup().with_config(config)).is_err());

        let mut config = EvolutionEngineConfig::default();
        config.budget.window = Duration::ZERO;
        assert!(EvolutionEngine::new(setup().with_config(config)).is_err());
    }

    #[test]
    fn test_step_params_are_layered() {
        let mut base = Params::new();
        base.insert("temperature".into(), serde_json::json!(0.2));
        let engine = EvolutionEngine::new(
            setup()
                .with_params(base)
                .with_mutation(StepSpec::new().with_param("temperature", 1.1)),
        )
        .unwrap();
        assert_eq!(
            engine.step_params(Step::Seeding)["temperature"],
            serde_json::json!(0.2)
        );
        assert_eq!(
            engine.step_params(Step::Mutation)["temperature"],
            serde_json::json!(1.1)
        );
    }

    #[test]
    fn test_select_survivors_takes_exactly_k() {
        let generation = Generation::new(
            0,
            vec![
                candidate(0, 0, 990.0),
                candidate(1, 0, 1030.0),
                candidate(2, 0, 1000.0),
                candidate(3, 0, 980.0),
            ],
        );
        let survivors = select_survivors(&generation, 2);
        let ids: Vec<u64> = survivors.iter().map(|c| c.id().0).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(select_survivors(&generation, 10).len(), 4);
    }

    #[test]
    fn test_select_survivors_breaks_ties_by_id() {
        let generation = Generation::new(
            0,
            vec![candidate(5, 0, 1000.0), candidate(2, 0, 1000.0), candidate(9, 0, 1000.0)],
        );
        let ids: Vec<u64> = select_survivors(&generation, 2)
            .iter()
            .map(|c| c.id().0)
            .collect();
        assert_eq!(ids, vec![2, 5]);
    }

    #[tokio::test]
    async fn test_ids_are_sequential() {
        let config = EvolutionEngineConfig {
            population_size: 3,
            max_generations: 1,
            keep_history: true,
            seed: Some(1),
            ..Default::default()
        };
        let mut engine = EvolutionEngine::new(setup().with_config(config)).unwrap();
        engine.run("t").await.unwrap();

        let ids: Vec<u64> = engine
            .history()
            .iter()
            .flat_map(|g| g.candidates.iter().map(|c| c.id().0))
            .collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4, 5]);
    }
}
