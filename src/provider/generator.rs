// src/provider/generator.rs — Model-backed generator

use std::sync::Arc;

use async_trait::async_trait;

use super::{estimate_tokens, find_model, ChatOptions, ChatRequest, Message, ModelProvider};
use crate::core::callable::{Generated, Generator};
use crate::core::types::Params;
use crate::infra::errors::EvolveError;

const DEFAULT_MAX_TOKENS: u32 = 1024;

/// A `Generator` that sends its input as a single user message to a model.
///
/// Recognized params: `model` (overrides the default model), `temperature`,
/// `max_tokens`, `system`.
pub struct LlmGenerator {
    name: String,
    provider: Arc<dyn ModelProvider>,
    model: String,
}

impl LlmGenerator {
    pub fn new(provider: Arc<dyn ModelProvider>, model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            name: format!("{}/{}", provider.id(), model),
            provider,
            model,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn request(&self, input: &str, params: &Params) -> ChatRequest {
        let opts = ChatOptions::from_params(params);
        ChatRequest {
            model: opts.model.unwrap_or_else(|| self.model.clone()),
            messages: vec![Message::user(input)],
            max_tokens: Some(opts.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)),
            temperature: opts.temperature,
            system: opts.system,
        }
    }
}

#[async_trait]
impl Generator for LlmGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    /// Prices the input plus a full `max_tokens` completion.
    fn estimate_cost(&self, input: &str, params: &Params) -> f64 {
        let request = self.request(input, params);
        let Some(info) = find_model(self.provider.as_ref(), &request.model) else {
            return 0.0;
        };
        let system = request.system.as_deref().map(estimate_tokens).unwrap_or(0);
        let usage = super::TokenUsage {
            input_tokens: estimate_tokens(input) + system,
            output_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        };
        info.cost(&usage)
    }

    async fn generate(&self, input: &str, params: &Params) -> Result<Generated, EvolveError> {
        let request = self.request(input, params);
        let model = request.model.clone();

        let response = self.provider.chat(request).await.map_err(|e| {
            EvolveError::Generation {
                generator: self.name.clone(),
                message: e.to_string(),
                cost_usd: 0.0,
            }
        })?;

        let cost = find_model(self.provider.as_ref(), &model)
            .map(|info| info.cost(&response.usage))
            .unwrap_or(0.0);

        if response.content.trim().is_empty() {
            return Err(EvolveError::Generation {
                generator: self.name.clone(),
                message: "empty completion".into(),
                cost_usd: cost,
            });
        }

        tracing::debug!(
            generator = %self.name,
            model = %model,
            tokens = response.usage.total(),
            cost_usd = cost,
            "generation complete"
        );

        Ok(Generated::new(response.content, cost))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChatResponse, ModelInfo, StopReason, TokenUsage};
    use serde_json::json;
    use std::sync::Mutex;

    struct EchoProvider {
        seen: Mutex<Vec<ChatRequest>>,
        reply: String,
    }

    impl EchoProvider {
        fn new(reply: &str) -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
                reply: reply.into(),
            }
        }
    }

    #[async_trait]
    impl ModelProvider for EchoProvider {
        fn id(&self) -> &str {
            "echo"
        }

        fn models(&self) -> Vec<ModelInfo> {
            vec![ModelInfo {
                id: "small".into(),
                context_window: 8_000,
                max_output_tokens: 2_000,
                input_price_per_mtok: 1.0,
                output_price_per_mtok: 2.0,
            }]
        }

        async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, EvolveError> {
            self.seen.lock().unwrap().push(request);
            Ok(ChatResponse {
                content: self.reply.clone(),
                usage: TokenUsage {
                    input_tokens: 1_000,
                    output_tokens: 500,
                },
                stop_reason: StopReason::EndTurn,
            })
        }
    }

    #[tokio::test]
    async fn test_generate_prices_usage() {
        let provider = Arc::new(EchoProvider::new("a poem"));
        let g = LlmGenerator::new(provider.clone(), "small");
        assert_eq!(g.name(), "echo/small");

        let out = g.generate("write", &Params::new()).await.unwrap();
        assert_eq!(out.content, "a poem");
        // 1000 in @ $1/M + 500 out @ $2/M
        assert!((out.cost_usd - 0.002).abs() < 1e-12);

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[0].max_tokens, Some(DEFAULT_MAX_TOKENS));
        assert_eq!(seen[0].messages[0].content, "write");
    }

    #[tokio::test]
    async fn test_params_flow_into_request() {
        let provider = Arc::new(EchoProvider::new("ok"));
        let g = LlmGenerator::new(provider.clone(), "small").with_name("writer");
        let mut params = Params::new();
        params.insert("temperature".into(), json!(0.9));
        params.insert("system".into(), json!("be brief"));
        params.insert("max_tokens".into(), json!(64));
        g.generate("x", &params).await.unwrap();

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[0].system.as_deref(), Some("be brief"));
        assert_eq!(seen[0].max_tokens, Some(64));
        assert!((seen[0].temperature.unwrap() - 0.9).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_empty_completion_is_generation_error() {
        let g = LlmGenerator::new(Arc::new(EchoProvider::new("  ")), "small");
        let err = g.generate("x", &Params::new()).await.unwrap_err();
        assert!(matches!(err, EvolveError::Generation { .. }));
        assert!(!err.is_fatal());
        // The tokens were still billed.
        assert!((err.billed_cost() - 0.002).abs() < 1e-12);
    }

    #[test]
    fn test_estimate_uses_max_tokens() {
        let g = LlmGenerator::new(Arc::new(EchoProvider::new("ok")), "small");
        let mut params = Params::new();
        params.insert("max_tokens".into(), json!(1_000_000));
        // 1M output tokens @ $2/M dominates
        let est = g.estimate_cost("abcd", &params);
        assert!((est - 2.000001).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_model_estimates_zero() {
        let g = LlmGenerator::new(Arc::new(EchoProvider::new("ok")), "missing");
        assert_eq!(g.estimate_cost("abcd", &Params::new()), 0.0);
    }
}
