// src/evaluator/judge.rs — Model-backed pairwise judge

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::callable::{Comparator, Judgement};
use crate::core::types::Params;
use crate::infra::errors::EvolveError;
use crate::provider::{
    estimate_tokens, find_model, ChatOptions, ChatRequest, Message, ModelProvider, TokenUsage,
};

const DEFAULT_RUBRIC: &str = "Which response better accomplishes its purpose? \
Consider correctness, clarity and completeness.";

const VERDICT_MAX_TOKENS: u32 = 400;

/// A `Comparator` that asks a model to pick between two contents.
///
/// The rubric comes from the `evaluation_prompt` param when present. The model
/// must end its reply with `WINNER: A`, `WINNER: B` or `WINNER: TIE`.
pub struct LlmJudge {
    name: String,
    provider: Arc<dyn ModelProvider>,
    model: String,
}

impl LlmJudge {
    pub fn new(provider: Arc<dyn ModelProvider>, model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            name: format!("judge:{}/{}", provider.id(), model),
            provider,
            model,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn prompt(first: &str, second: &str, params: &Params) -> String {
        let rubric = params
            .get("evaluation_prompt")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_RUBRIC);

        format!(
            "You are comparing two responses. Use the following rubric.\n\n\
             ## Rubric\n{}\n\n\
             ## Response A\n{}\n\n\
             ## Response B\n{}\n\n\
             Briefly explain your reasoning, then finish with exactly one line:\n\
             WINNER: A | B | TIE",
            rubric, first, second
        )
    }

    fn request(&self, first: &str, second: &str, params: &Params) -> ChatRequest {
        let opts = ChatOptions::from_params(params);
        ChatRequest {
            model: opts.model.unwrap_or_else(|| self.model.clone()),
            messages: vec![Message::user(Self::prompt(first, second, params))],
            max_tokens: Some(opts.max_tokens.unwrap_or(VERDICT_MAX_TOKENS)),
            temperature: Some(opts.temperature.unwrap_or(0.1)),
            system: opts.system,
        }
    }
}

#[async_trait]
impl Comparator for LlmJudge {
    fn name(&self) -> &str {
        &self.name
    }

    fn estimate_cost(&self, first: &str, second: &str, params: &Params) -> f64 {
        let request = self.request(first, second, params);
        let Some(info) = find_model(self.provider.as_ref(), &request.model) else {
            return 0.0;
        };
        let input: u32 = request
            .messages
            .iter()
            .map(|m| estimate_tokens(&m.content))
            .sum();
        info.cost(&TokenUsage {
            input_tokens: input,
            output_tokens: request.max_tokens.unwrap_or(VERDICT_MAX_TOKENS),
        })
    }

    async fn compare(
        &self,
        first: &str,
        second: &str,
        params: &Params,
    ) -> Result<Judgement, EvolveError> {
        let request = self.request(first, second, params);
        let model = request.model.clone();

        let response = self
            .provider
            .chat(request)
            .await
            .map_err(|e| EvolveError::Comparison {
                comparator: self.name.clone(),
                message: e.to_string(),
                cost_usd: 0.0,
            })?;

        let cost = find_model(self.provider.as_ref(), &model)
            .map(|info| info.cost(&response.usage))
            .unwrap_or(0.0);

        let outcome = super::parser::parse_verdict(&response.content).ok_or_else(|| {
            EvolveError::Comparison {
                comparator: self.name.clone(),
                message: "unrecognized verdict".into(),
                cost_usd: cost,
            }
        })?;

        Ok(Judgement::new(outcome, cost))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::callable::Outcome;
    use crate::provider::{ChatResponse, ModelInfo, StopReason};
    use serde_json::json;
    use std::sync::Mutex;

    struct ScriptedProvider {
        reply: Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.into()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(message.into()),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ModelProvider for ScriptedProvider {
        fn id(&self) -> &str {
            "scripted"
        }

        fn models(&self) -> Vec<ModelInfo> {
            vec![ModelInfo {
                id: "judge-model".into(),
                context_window: 32_000,
                max_output_tokens: 4_000,
                input_price_per_mtok: 10.0,
                output_price_per_mtok: 10.0,
            }]
        }

        async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, EvolveError> {
            self.prompts
                .lock()
                .unwrap()
                .push(request.messages[0].content.clone());
            match &self.reply {
                Ok(text) => Ok(ChatResponse {
                    content: text.clone(),
                    usage: TokenUsage {
                        input_tokens: 100,
                        output_tokens: 100,
                    },
                    stop_reason: StopReason::EndTurn,
                }),
                Err(msg) => Err(EvolveError::Provider {
                    provider: "scripted".into(),
                    message: msg.clone(),
                }),
            }
        }
    }

    #[tokio::test]
    async fn test_compare_parses_winner() {
        let judge = LlmJudge::new(
            ScriptedProvider::replying("B is tighter.\nWINNER: B"),
            "judge-model",
        );
        let j = judge.compare("long", "short", &Params::new()).await.unwrap();
        assert_eq!(j.outcome, Outcome::SecondWins);
        // 200 tokens @ $10/M
        assert!((j.cost_usd - 0.002).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_rubric_from_params() {
        let provider = ScriptedProvider::replying("WINNER: TIE");
        let judge = LlmJudge::new(provider.clone(), "judge-model");
        let mut params = Params::new();
        params.insert("evaluation_prompt".into(), json!("Prefer rhyming poems."));
        judge.compare("x", "y", &params).await.unwrap();

        let prompts = provider.prompts.lock().unwrap();
        assert!(prompts[0].contains("Prefer rhyming poems."));
        assert!(prompts[0].contains("## Response A\nx"));
        assert!(!prompts[0].contains(DEFAULT_RUBRIC));
    }

    #[tokio::test]
    async fn test_unparseable_verdict_is_comparison_error() {
        let judge = LlmJudge::new(ScriptedProvider::replying("both are fine"), "judge-model");
        let err = judge.compare("a", "b", &Params::new()).await.unwrap_err();
        match err {
            EvolveError::Comparison {
                message, cost_usd, ..
            } => {
                assert_eq!(message, "unrecognized verdict");
                // 200 tokens @ $10/M
                assert!((cost_usd - 0.002).abs() < 1e-12);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_provider_error_becomes_comparison_error() {
        let judge = LlmJudge::new(ScriptedProvider::failing("rate limited"), "judge-model")
            .with_name("strict");
        let err = judge.compare("a", "b", &Params::new()).await.unwrap_err();
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("strict"));
        assert!(err.to_string().contains("rate limited"));
        assert_eq!(err.billed_cost(), 0.0);
    }

    #[test]
    fn test_estimate_is_positive_for_known_model() {
        let judge = LlmJudge::new(ScriptedProvider::replying(""), "judge-model");
        assert!(judge.estimate_cost("a", "b", &Params::new()) > 0.0);
    }
}
