// src/provider/mod.rs — Model provider boundary and provider-backed callables
//
// Concrete vendor clients live outside this crate. Anything implementing
// `ModelProvider` can back a generator (`LlmGenerator`) or a comparator
// (`crate::evaluator::judge::LlmJudge`).

pub mod generator;
pub mod registry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::infra::errors::EvolveError;

/// Core trait that model providers implement.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    fn id(&self) -> &str;
    fn models(&self) -> Vec<ModelInfo>;

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, EvolveError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub context_window: u32,
    pub max_output_tokens: u32,
    pub input_price_per_mtok: f64,
    pub output_price_per_mtok: f64,
}

impl ModelInfo {
    /// Cost in USD for the given usage at this model's catalog prices.
    pub fn cost(&self, usage: &TokenUsage) -> f64 {
        let input = usage.input_tokens as f64 / 1_000_000.0 * self.input_price_per_mtok;
        let output = usage.output_tokens as f64 / 1_000_000.0 * self.output_price_per_mtok;
        input + output
    }
}

/// Look up a model in a provider's catalog.
pub fn find_model(provider: &dyn ModelProvider, model_id: &str) -> Option<ModelInfo> {
    provider.models().into_iter().find(|m| m.id == model_id)
}

/// Rough token estimate (4 chars ≈ 1 token).
pub fn estimate_tokens(text: &str) -> u32 {
    (text.chars().count() as f32 / 4.0).ceil() as u32
}

#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub system: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub usage: TokenUsage,
    pub stop_reason: StopReason,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
    #[default]
    Unknown,
}

/// Reads the shared chat options (`model`, `temperature`, `max_tokens`, `system`) from call params.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatOptions {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub system: Option<String>,
}

impl ChatOptions {
    pub fn from_params(params: &crate::core::types::Params) -> Self {
        Self {
            model: params.get("model").and_then(|v| v.as_str()).map(String::from),
            temperature: params
                .get("temperature")
                .and_then(|v| v.as_f64())
                .map(|t| t as f32),
            max_tokens: params
                .get("max_tokens")
                .and_then(|v| v.as_u64())
                .map(|t| t.min(u32::MAX as u64) as u32),
            system: params.get("system").and_then(|v| v.as_str()).map(String::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Params;
    use serde_json::json;

    fn info() -> ModelInfo {
        ModelInfo {
            id: "m".into(),
            context_window: 128_000,
            max_output_tokens: 4096,
            input_price_per_mtok: 3.0,
            output_price_per_mtok: 15.0,
        }
    }

    #[test]
    fn test_model_cost() {
        let usage = TokenUsage {
            input_tokens: 1_000_000,
            output_tokens: 500_000,
        };
        // $3 + $7.50
        assert!((info().cost(&usage) - 10.5).abs() < 1e-9);
        assert_eq!(info().cost(&TokenUsage::default()), 0.0);
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn test_token_usage_total() {
        let u = TokenUsage {
            input_tokens: 100,
            output_tokens: 50,
        };
        assert_eq!(u.total(), 150);
    }

    #[test]
    fn test_message_constructors() {
        assert_eq!(Message::system("s").role, Role::System);
        assert_eq!(Message::user("u").role, Role::User);
        assert_eq!(Message::assistant("a").content, "a");
    }

    #[test]
    fn test_chat_options_from_params() {
        let mut params = Params::new();
        params.insert("model".into(), json!("fast-model"));
        params.insert("temperature".into(), json!(0.3));
        params.insert("max_tokens".into(), json!(512));
        let opts = ChatOptions::from_params(&params);
        assert_eq!(opts.model.as_deref(), Some("fast-model"));
        assert!((opts.temperature.unwrap() - 0.3).abs() < 1e-6);
        assert_eq!(opts.max_tokens, Some(512));
        assert!(opts.system.is_none());
    }

    #[test]
    fn test_chat_options_ignore_wrong_types() {
        let mut params = Params::new();
        params.insert("temperature".into(), json!("hot"));
        params.insert("max_tokens".into(), json!(-5));
        assert_eq!(ChatOptions::from_params(&params), ChatOptions::default());
    }
}
