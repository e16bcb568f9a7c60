// src/provider/registry.rs — Named callables for config-driven step specs

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::callable::{Comparator, Generator};
use crate::core::steps::{GeneratorEntry, StepSpec};
use crate::infra::config::{GeneratorRef, StepSpecConfig};
use crate::infra::errors::EvolveError;

/// Maps the names used in `[steps.<name>]` tables to live callables.
#[derive(Default)]
pub struct CallableRegistry {
    generators: HashMap<String, Arc<dyn Generator>>,
    comparators: HashMap<String, Arc<dyn Comparator>>,
}

impl CallableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under the callable's own name.
    pub fn register_generator(&mut self, generator: Arc<dyn Generator>) {
        self.generators.insert(generator.name().to_string(), generator);
    }

    pub fn register_comparator(&mut self, comparator: Arc<dyn Comparator>) {
        self.comparators
            .insert(comparator.name().to_string(), comparator);
    }

    pub fn generator(&self, name: &str) -> Result<Arc<dyn Generator>, EvolveError> {
        self.generators.get(name).cloned().ok_or_else(|| {
            EvolveError::config(format!("unknown generator '{name}'"))
        })
    }

    pub fn comparator(&self, name: &str) -> Result<Arc<dyn Comparator>, EvolveError> {
        self.comparators.get(name).cloned().ok_or_else(|| {
            EvolveError::config(format!("unknown comparator '{name}'"))
        })
    }

    /// Build a typed generator step spec from its TOML form.
    pub fn generator_spec(
        &self,
        cfg: Option<&StepSpecConfig>,
    ) -> Result<StepSpec<Arc<dyn Generator>>, EvolveError> {
        build_spec(cfg, |name| self.generator(name))
    }

    /// Build a typed comparator step spec from its TOML form.
    pub fn comparator_spec(
        &self,
        cfg: Option<&StepSpecConfig>,
    ) -> Result<StepSpec<Arc<dyn Comparator>>, EvolveError> {
        build_spec(cfg, |name| self.comparator(name))
    }
}

fn build_spec<C>(
    cfg: Option<&StepSpecConfig>,
    lookup: impl Fn(&str) -> Result<C, EvolveError>,
) -> Result<StepSpec<C>, EvolveError> {
    let Some(cfg) = cfg else {
        return Ok(StepSpec::new());
    };

    let entry = |r: &GeneratorRef| -> Result<GeneratorEntry<C>, EvolveError> {
        let callable = lookup(r.name())?;
        Ok(match r {
            GeneratorRef::Name(_) => GeneratorEntry::Bare(callable),
            GeneratorRef::Bound { params, .. } => GeneratorEntry::WithParams(callable, params.clone()),
        })
    };

    Ok(StepSpec {
        generator: cfg.generator.as_ref().map(&entry).transpose()?,
        generators: cfg
            .generators
            .as_ref()
            .map(|refs| refs.iter().map(&entry).collect::<Result<Vec<_>, _>>())
            .transpose()?,
        params: cfg.params.clone(),
    })
}
