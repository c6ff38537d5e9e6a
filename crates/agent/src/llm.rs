use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use tripwise_core::config::LlmConfig;
use tripwise_core::domain::flight::FlightQuery;
use tripwise_core::domain::hotel::HotelQuery;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Anthropic Messages API client. One user message per call, no streaming.
pub struct AnthropicClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl AnthropicClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build language model http client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            messages: [Message { role: "user", content: prompt }],
        };

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .context("language model request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("language model returned {status}: {}", body.chars().take(200).collect::<String>());
        }

        let payload: MessagesResponse =
            response.json().await.context("failed to decode language model response")?;
        let text: String = payload
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect();

        if text.trim().is_empty() {
            return Err(anyhow!("language model returned no text content"));
        }
        Ok(text)
    }
}

/// A type the model can be asked to produce as JSON.
pub trait ExtractionSchema: DeserializeOwned {
    const NAME: &'static str;

    fn json_schema() -> Value;
}

impl ExtractionSchema for FlightQuery {
    const NAME: &'static str = "FlightQuery";

    fn json_schema() -> Value {
        FlightQuery::json_schema()
    }
}

impl ExtractionSchema for HotelQuery {
    const NAME: &'static str = "HotelQuery";

    fn json_schema() -> Value {
        HotelQuery::json_schema()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("language model call failed: {0}")]
    Completion(String),
    #[error("output does not match {schema}: {cause}")]
    SchemaViolation { schema: &'static str, cause: String },
}

#[derive(Clone)]
pub struct Gateway {
    client: Arc<dyn LlmClient>,
}

impl Gateway {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    pub async fn invoke(&self, prompt: &str) -> Result<String, GatewayError> {
        debug!(event_name = "agent.llm.invoke", prompt_chars = prompt.len(), "invoking model");
        self.client
            .complete(prompt)
            .await
            .map_err(|error| GatewayError::Completion(format!("{error:#}")))
    }

    pub async fn invoke_structured<T: ExtractionSchema>(
        &self,
        prompt: &str,
    ) -> Result<T, GatewayError> {
        let raw = self.invoke(prompt).await?;
        parse_structured(&raw)
    }
}

/// Instructions appended to extraction prompts so the model answers with a bare
/// JSON object matching `T`.
pub fn format_instructions<T: ExtractionSchema>() -> String {
    let schema = serde_json::to_string_pretty(&T::json_schema()).unwrap_or_default();
    format!(
        "Answer with a single JSON object that conforms to the {} schema below. \
         Use null for unknown optional fields. Do not add any text outside the JSON.\n\n{schema}",
        T::NAME
    )
}

/// Tolerates markdown code fences and prose around the first JSON object.
pub fn parse_structured<T: ExtractionSchema>(raw: &str) -> Result<T, GatewayError> {
    let violation = |cause: String| GatewayError::SchemaViolation { schema: T::NAME, cause };

    let start = raw.find('{').ok_or_else(|| violation("no JSON object in output".to_string()))?;
    let end = raw.rfind('}').filter(|end| *end > start).ok_or_else(|| {
        violation("unterminated JSON object in output".to_string())
    })?;

    serde_json::from_str::<T>(&raw[start..=end]).map_err(|error| violation(error.to_string()))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::LlmClient;

    /// Answers prompts from a fixed script and keeps every prompt it was given.
    #[derive(Default)]
    pub(crate) struct ScriptedLlm {
        state: Mutex<ScriptedLlmState>,
    }

    #[derive(Default)]
    struct ScriptedLlmState {
        answers: VecDeque<Result<String, String>>,
        prompts: Vec<String>,
    }

    impl ScriptedLlm {
        pub(crate) fn with_answers(answers: &[&str]) -> Self {
            Self::with_script(answers.iter().map(|answer| Ok(answer.to_string())).collect())
        }

        pub(crate) fn with_script(answers: Vec<Result<String, String>>) -> Self {
            Self {
                state: Mutex::new(ScriptedLlmState { answers: answers.into(), prompts: Vec::new() }),
            }
        }

        pub(crate) async fn prompts(&self) -> Vec<String> {
            self.state.lock().await.prompts.clone()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, prompt: &str) -> Result<String> {
            let mut state = self.state.lock().await;
            state.prompts.push(prompt.to_string());
            match state.answers.pop_front() {
                Some(Ok(answer)) => Ok(answer),
                Some(Err(message)) => Err(anyhow!(message)),
                None => Err(anyhow!("scripted llm has no answer left")),
            }
        }
    }
}
