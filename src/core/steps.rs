// src/core/steps.rs — Step configuration resolution
//
// Merges base parameters with a step's override spec into one effective
// parameter set and an ordered pool of (callable, params) pairs. Resolution is
// pure: the same inputs always produce the same pool.

use super::types::{Params, Step};
use crate::infra::errors::EvolveError;

/// One element of a step's generator list: a bare callable that inherits the
/// step's parameters, or a callable bound to its own parameter overrides.
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratorEntry<C> {
    Bare(C),
    WithParams(C, Params),
}

impl<C> GeneratorEntry<C> {
    pub fn callable(&self) -> &C {
        match self {
            GeneratorEntry::Bare(c) | GeneratorEntry::WithParams(c, _) => c,
        }
    }

    fn overrides(&self) -> Option<&Params> {
        match self {
            GeneratorEntry::Bare(_) => None,
            GeneratorEntry::WithParams(_, p) => Some(p),
        }
    }
}

/// Per-step override spec as supplied by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct StepSpec<C> {
    pub generator: Option<GeneratorEntry<C>>,
    pub generators: Option<Vec<GeneratorEntry<C>>>,
    /// Plain parameters layered over the base parameters.
    pub params: Params,
}

impl<C> Default for StepSpec<C> {
    fn default() -> Self {
        Self {
            generator: None,
            generators: None,
            params: Params::new(),
        }
    }
}

impl<C> StepSpec<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_generator(mut self, entry: GeneratorEntry<C>) -> Self {
        self.generator = Some(entry);
        self
    }

    pub fn with_generators(mut self, entries: Vec<GeneratorEntry<C>>) -> Self {
        self.generators = Some(entries);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// A (callable, effective params) pair ready to invoke.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolEntry<C> {
    pub callable: C,
    pub params: Params,
}

/// Resolved, step-scoped configuration. The pool is never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct StepConfig<C> {
    pub step: Step,
    /// Base parameters with the step's plain parameters layered on top.
    pub params: Params,
    pool: Vec<PoolEntry<C>>,
}

impl<C> StepConfig<C> {
    pub fn pool(&self) -> &[PoolEntry<C>] {
        &self.pool
    }

    pub fn is_fixed(&self) -> bool {
        self.pool.len() == 1
    }
}

/// Shallow overwrite: keys in `over` replace the same keys in `base`.
pub fn layer(base: &Params, over: &Params) -> Params {
    let mut merged = base.clone();
    for (k, v) in over {
        merged.insert(k.clone(), v.clone());
    }
    merged
}

/// Resolve one step's effective configuration.
///
/// Precedence: a single `generator` entry, else the `generators` list, else the
/// default callable with the step's plain parameters.
pub fn resolve<C: Clone>(
    step: Step,
    base: &Params,
    default: &C,
    spec: &StepSpec<C>,
) -> Result<StepConfig<C>, EvolveError> {
    let step_params = layer(base, &spec.params);

    let entries: Vec<&GeneratorEntry<C>> = match (&spec.generator, &spec.generators) {
        (Some(_), Some(_)) => {
            return Err(EvolveError::config(format!(
                "step '{}' sets both `generator` and `generators`",
                step
            )));
        }
        (Some(entry), None) => vec![entry],
        (None, Some(list)) if list.is_empty() => {
            return Err(EvolveError::config(format!(
                "step '{}' has an empty `generators` list",
                step
            )));
        }
        (None, Some(list)) => list.iter().collect(),
        (None, None) => {
            return Ok(StepConfig {
                step,
                pool: vec![PoolEntry {
                    callable: default.clone(),
                    params: step_params.clone(),
                }],
                params: step_params,
            });
        }
    };

    let pool = entries
        .into_iter()
        .map(|entry| PoolEntry {
            callable: entry.callable().clone(),
            params: match entry.overrides() {
                Some(over) => layer(&step_params, over),
                None => step_params.clone(),
            },
        })
        .collect();

    Ok(StepConfig {
        step,
        params: step_params,
        pool,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn params(pairs: &[(&str, serde_json::Value)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn base() -> Params {
        params(&[("temperature", json!(0.7)), ("model", json!("base-model"))])
    }

    #[test]
    fn test_plain_overrides_use_default_callable() {
        let spec = StepSpec::new().with_param("temperature", 0.2);
        let cfg = resolve(Step::Mutation, &base(), &"default", &spec).unwrap();

        assert!(cfg.is_fixed());
        assert_eq!(cfg.pool()[0].callable, "default");
        assert_eq!(cfg.pool()[0].params["temperature"], json!(0.2));
        assert_eq!(cfg.pool()[0].params["model"], json!("base-model"));
        assert_eq!(cfg.params, cfg.pool()[0].params);
    }

    #[test]
    fn test_empty_spec_inherits_base() {
        let cfg = resolve(Step::Seeding, &base(), &"default", &StepSpec::new()).unwrap();
        assert_eq!(cfg.pool()[0].params, base());
    }

    #[test]
    fn test_single_generator_layers_its_params() {
        let spec = StepSpec::new().with_generator(GeneratorEntry::WithParams(
            "creative",
            params(&[("temperature", json!(1.2))]),
        ));
        let cfg = resolve(Step::Crossover, &base(), &"default", &spec).unwrap();

        assert_eq!(cfg.pool().len(), 1);
        assert_eq!(cfg.pool()[0].callable, "creative");
        assert_eq!(cfg.pool()[0].params["temperature"], json!(1.2));
        assert_eq!(cfg.pool()[0].params["model"], json!("base-model"));
    }

    #[test]
    fn test_generator_list_mixes_bare_and_bound() {
        let spec = StepSpec::new().with_generators(vec![
            GeneratorEntry::Bare("plain"),
            GeneratorEntry::WithParams("hot", params(&[("temperature", json!(1.5))])),
        ]);
        let cfg = resolve(Step::Seeding, &base(), &"default", &spec).unwrap();

        assert_eq!(cfg.pool().len(), 2);
        assert_eq!(cfg.pool()[0].callable, "plain");
        assert_eq!(cfg.pool()[0].params, base());
        assert_eq!(cfg.pool()[1].callable, "hot");
        assert_eq!(cfg.pool()[1].params["temperature"], json!(1.5));
        assert_eq!(cfg.pool()[1].params["model"], json!("base-model"));
    }

    #[test]
    fn test_step_params_sit_between_base_and_entry() {
        let spec = StepSpec::new()
            .with_param("max_tokens", 256)
            .with_param("temperature", 0.1)
            .with_generator(GeneratorEntry::WithParams(
                "g",
                params(&[("temperature", json!(0.9))]),
            ));
        let cfg = resolve(Step::Mutation, &base(), &"default", &spec).unwrap();
        let p = &cfg.pool()[0].params;
        assert_eq!(p["max_tokens"], json!(256));
        assert_eq!(p["temperature"], json!(0.9));
        assert_eq!(cfg.params["temperature"], json!(0.1));
    }

    #[test]
    fn test_generator_and_generators_conflict() {
        let spec = StepSpec::new()
            .with_generator(GeneratorEntry::Bare("a"))
            .with_generators(vec![GeneratorEntry::Bare("b")]);
        let err = resolve(Step::Mutation, &base(), &"default", &spec).unwrap_err();
        assert!(matches!(err, EvolveError::Configuration(_)));
        assert!(err.to_string().contains("mutation"));
    }

    #[test]
    fn test_empty_generators_rejected() {
        let spec: StepSpec<&str> = StepSpec::new().with_generators(vec![]);
        assert!(resolve(Step::Seeding, &base(), &"default", &spec).is_err());
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let spec = StepSpec::new()
            .with_param("top_p", 0.95)
            .with_generators(vec![
                GeneratorEntry::Bare("a"),
                GeneratorEntry::WithParams("b", params(&[("seed", json!(7))])),
            ]);
        let first = resolve(Step::Evaluation, &base(), &"default", &spec).unwrap();
        let second = resolve(Step::Evaluation, &base(), &"default", &spec).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_layer_does_not_touch_inputs() {
        let b = base();
        let over = params(&[("model", json!("other"))]);
        let merged = layer(&b, &over);
        assert_eq!(merged["model"], json!("other"));
        assert_eq!(b["model"], json!("base-model"));
    }
}
