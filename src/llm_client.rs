use async_trait::async_trait;
use failsafe::futures::CircuitBreaker;
use serde_json::json;
use std::fmt;
use std::time::Duration;

use crate::circuit_breaker::{create_llm_circuit_breaker, LlmCircuitBreaker};
use crate::errors::AppError;
use crate::models::{Message, Role};
use crate::prompts::{
    EMPTY_REPLY_FALLBACK, SERVICE_UNAVAILABLE_REPLY, TECHNICAL_ERROR_REPLY, WARMING_UP_REPLY,
};

/// Most recent messages sent to the model; older turns are dropped from the prompt.
pub const MAX_PROMPT_MESSAGES: usize = 16;

/// What the model is asked to continue.
#[derive(Debug, Clone)]
pub struct ChatPrompt {
    /// Persona plus qualification context.
    pub system: String,
    pub messages: Vec<Message>,
}

/// Non-fatal failures of the language model. Each maps to a canned reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// Cold start (HTTP 503) or circuit open.
    Unavailable(String),
    /// The API token was rejected.
    Unauthorized,
    Timeout,
    /// Any other transport, status, or decoding failure.
    Failed(String),
    /// The model answered with an empty text.
    EmptyResponse,
}

impl LlmError {
    /// Text shown to the prospect instead of a generated reply.
    pub fn fallback_reply(&self) -> &'static str {
        match self {
            LlmError::Unavailable(_) => WARMING_UP_REPLY,
            LlmError::Unauthorized => SERVICE_UNAVAILABLE_REPLY,
            LlmError::Timeout | LlmError::Failed(_) => TECHNICAL_ERROR_REPLY,
            LlmError::EmptyResponse => EMPTY_REPLY_FALLBACK,
        }
    }
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::Unavailable(msg) => write!(f, "model unavailable: {}", msg),
            LlmError::Unauthorized => write!(f, "model API token rejected"),
            LlmError::Timeout => write!(f, "model call timed out"),
            LlmError::Failed(msg) => write!(f, "model call failed: {}", msg),
            LlmError::EmptyResponse => write!(f, "model returned an empty reply"),
        }
    }
}

impl std::error::Error for LlmError {}

/// Text-generation collaborator.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &ChatPrompt) -> Result<String, LlmError>;
}

/// Sampling parameters sent with every inference request.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub max_new_tokens: u32,
    pub temperature: f32,
}

/// Client for the Hugging Face Inference API serving a Mistral-Instruct model.
pub struct HuggingFaceClient {
    client: reqwest::Client,
    api_url: String,
    token: String,
    params: GenerationParams,
    breaker: LlmCircuitBreaker,
}

impl HuggingFaceClient {
    /// Creates a new `HuggingFaceClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Inference API root (`https://api-inference.huggingface.co`).
    /// * `model` - Model id, e.g. `mistralai/Mistral-7B-Instruct-v0.2`.
    /// * `token` - API token sent as a bearer token.
    /// * `params` - Sampling parameters.
    /// * `timeout` - Per-request timeout.
    pub fn new(
        base_url: &str,
        model: &str,
        token: String,
        params: GenerationParams,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create inference client: {}", e))
            })?;

        Ok(Self {
            client,
            api_url: format!("{}/models/{}", base_url.trim_end_matches('/'), model),
            token,
            params,
            breaker: create_llm_circuit_breaker(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    async fn request(&self, inputs: String) -> Result<String, LlmError> {
        let body = json!({
            "inputs": inputs,
            "parameters": {
                "max_new_tokens": self.params.max_new_tokens,
                "temperature": self.params.temperature,
                "top_p": 0.95,
                "do_sample": true,
                "return_full_text": false,
                "repetition_penalty": 1.2
            }
        });

        tracing::info!("📡 Calling inference API: {}", self.api_url);

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.token))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Failed(format!("request failed: {}", e))
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            tracing::warn!("⏳ Model is loading");
            return Err(LlmError::Unavailable("model loading".to_string()));
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            tracing::error!("❌ Inference API token rejected");
            return Err(LlmError::Unauthorized);
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("❌ Inference API returned {}: {}", status, error_text);
            return Err(LlmError::Failed(format!("status {}", status)));
        }

        let data: serde_json::Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout
            } else {
                LlmError::Failed(format!("invalid response body: {}", e))
            }
        })?;

        let text = data
            .get(0)
            .and_then(|first| first.get("generated_text"))
            .and_then(|t| t.as_str())
            .ok_or_else(|| LlmError::Failed("response missing generated_text".to_string()))?
            .trim()
            .to_string();

        if text.is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        tracing::info!("✅ Reply generated ({} chars)", text.chars().count());
        Ok(text)
    }
}

#[async_trait]
impl LanguageModel for HuggingFaceClient {
    async fn generate(&self, prompt: &ChatPrompt) -> Result<String, LlmError> {
        let inputs = build_mistral_prompt(prompt);

        match self.breaker.call(self.request(inputs)).await {
            Ok(text) => Ok(text),
            Err(failsafe::Error::Inner(e)) => Err(e),
            Err(failsafe::Error::Rejected) => {
                tracing::warn!("⚡ Inference circuit open, skipping call");
                Err(LlmError::Unavailable("circuit open".to_string()))
            }
        }
    }
}

/// Renders a chat in the Mistral-Instruct format:
/// `<s>[INST] {system}\n\n{user} [/INST] {assistant}</s><s>[INST] {user} [/INST]`
pub fn build_mistral_prompt(prompt: &ChatPrompt) -> String {
    let skip = prompt.messages.len().saturating_sub(MAX_PROMPT_MESSAGES);
    let messages = &prompt.messages[skip..];

    let mut out = format!("<s>[INST] {}\n\n", prompt.system);
    let last = messages.len().saturating_sub(1);

    for (i, msg) in messages.iter().enumerate() {
        match msg.role {
            Role::User => {
                out.push_str(&msg.content);
                out.push_str(" [/INST]");
                if i != last {
                    out.push(' ');
                }
            }
            Role::Assistant => {
                out.push_str(&msg.content);
                out.push_str("</s>");
                if i != last {
                    out.push_str("<s>[INST] ");
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_client_creation() {
        let client = HuggingFaceClient::new(
            "https://api-inference.huggingface.co/",
            "mistralai/Mistral-7B-Instruct-v0.2",
            "token".to_string(),
            GenerationParams {
                max_new_tokens: 512,
                temperature: 0.7,
            },
            Duration::from_secs(60),
        );
        assert!(client.is_ok());
        assert_eq!(
            client.unwrap().api_url(),
            "https://api-inference.huggingface.co/models/mistralai/Mistral-7B-Instruct-v0.2"
        );
    }

    #[test]
    fn test_mistral_prompt_format() {
        let prompt = ChatPrompt {
            system: "SYS".to_string(),
            messages: vec![
                Message::assistant("Bonjour"),
                Message::user("un riad"),
                Message::assistant("À Marrakech ?"),
                Message::user("oui"),
            ],
        };

        assert_eq!(
            build_mistral_prompt(&prompt),
            "<s>[INST] SYS\n\nBonjour</s><s>[INST] un riad [/INST] À Marrakech ?</s><s>[INST] oui [/INST]"
        );
    }

    #[test]
    fn test_prompt_keeps_recent_messages_only() {
        let messages: Vec<_> = (0..40).map(|i| Message::user(format!("m{}", i))).collect();
        let rendered = build_mistral_prompt(&ChatPrompt {
            system: String::new(),
            messages,
        });
        assert!(!rendered.contains("m23 "));
        assert!(rendered.contains("m24 [/INST]"));
        assert!(rendered.ends_with("m39 [/INST]"));
    }

    #[test]
    fn test_fallback_replies() {
        assert_eq!(
            LlmError::Unavailable("x".into()).fallback_reply(),
            WARMING_UP_REPLY
        );
        assert_eq!(
            LlmError::Unauthorized.fallback_reply(),
            SERVICE_UNAVAILABLE_REPLY
        );
        assert_eq!(LlmError::Timeout.fallback_reply(), TECHNICAL_ERROR_REPLY);
        assert_eq!(
            LlmError::Failed("boom".into()).fallback_reply(),
            TECHNICAL_ERROR_REPLY
        );
    }
}
