// src/core/prompts.rs — Generator input templates (minijinja)

use minijinja::{context, Environment};

use crate::infra::errors::EvolveError;

pub const DEFAULT_SEEDING: &str = "{{ task }}";
pub const DEFAULT_MUTATION: &str = "{{ parent }}";
pub const DEFAULT_CROSSOVER: &str = "{{ first }}\n\n---\n\n{{ second }}";

/// Template sources for each generator-driven step.
///
/// Seeding sees `task`; mutation sees `task` and `parent`; crossover sees
/// `task`, `first` and `second`.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplates {
    pub seeding: String,
    pub mutation: String,
    pub crossover: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            seeding: DEFAULT_SEEDING.into(),
            mutation: DEFAULT_MUTATION.into(),
            crossover: DEFAULT_CROSSOVER.into(),
        }
    }
}

impl From<&crate::infra::config::PromptsConfig> for PromptTemplates {
    fn from(cfg: &crate::infra::config::PromptsConfig) -> Self {
        Self {
            seeding: cfg.seeding.clone(),
            mutation: cfg.mutation.clone(),
            crossover: cfg.crossover.clone(),
        }
    }
}

/// Renders generator inputs. Templates are syntax-checked on construction.
pub struct PromptRenderer {
    env: Environment<'static>,
    templates: PromptTemplates,
}

impl PromptRenderer {
    pub fn new(templates: PromptTemplates) -> Result<Self, EvolveError> {
        let env = Environment::new();
        // A dry render with no variables surfaces syntax errors up front.
        for source in [&templates.seeding, &templates.mutation, &templates.crossover] {
            env.render_str(source, context! {})?;
        }
        Ok(Self { env, templates })
    }

    pub fn seeding(&self, task: &str) -> Result<String, EvolveError> {
        Ok(self
            .env
            .render_str(&self.templates.seeding, context! { task })?)
    }

    pub fn mutation(&self, task: &str, parent: &str) -> Result<String, EvolveError> {
        Ok(self
            .env
            .render_str(&self.templates.mutation, context! { task, parent })?)
    }

    pub fn crossover(&self, task: &str, first: &str, second: &str) -> Result<String, EvolveError> {
        Ok(self.env.render_str(
            &self.templates.crossover,
            context! { task, first, second },
        )?)
    }
}
