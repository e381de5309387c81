use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use arma_core::config::{LlmConfig, LlmProvider};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm client misconfigured: {0}")]
    Config(String),
    #[error("llm request failed: {0}")]
    Transport(String),
    #[error("llm returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("llm response contained no completion")]
    EmptyCompletion,
}

impl From<reqwest::Error> for LlmError {
    fn from(error: reqwest::Error) -> Self {
        Self::Transport(error.to_string())
    }
}

/// The single seam between the pipeline and a language model. Both prompts
/// in this system are one system message plus one user message; streaming is
/// never needed.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_message: &str) -> Result<String, LlmError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

fn chat_messages<'a>(system_prompt: &'a str, user_message: &'a str) -> Vec<ChatMessage<'a>> {
    vec![
        ChatMessage { role: "system", content: system_prompt },
        ChatMessage { role: "user", content: user_message },
    ]
}

async fn read_completion(response: reqwest::Response) -> Result<String, LlmError> {
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        return Err(LlmError::Api { status, message });
    }
    let body: ChatResponse = response.json().await?;
    body.choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or(LlmError::EmptyCompletion)
}

/// Chat-completions client for api.openai.com.
pub struct OpenAiClient {
    client: Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(client: Client, api_key: SecretString, model: impl Into<String>) -> Self {
        Self { client, api_key, model: model.into(), base_url: OPENAI_BASE_URL.to_string() }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, system_prompt: &str, user_message: &str) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: Some(self.model.as_str()),
            messages: chat_messages(system_prompt, user_message),
            temperature: 0.0,
        };
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;
        read_completion(response).await
    }
}

/// Chat-completions client for an Azure OpenAI deployment. The deployment
/// name replaces the model in the URL; authentication is the `api-key`
/// header rather than a bearer token.
pub struct AzureOpenAiClient {
    client: Client,
    api_key: SecretString,
    endpoint: String,
    deployment: String,
    api_version: String,
}

impl AzureOpenAiClient {
    pub fn new(
        client: Client,
        api_key: SecretString,
        endpoint: impl Into<String>,
        deployment: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key,
            endpoint: endpoint.into(),
            deployment: deployment.into(),
            api_version: api_version.into(),
        }
    }
}

#[async_trait]
impl LlmClient for AzureOpenAiClient {
    async fn complete(&self, system_prompt: &str, user_message: &str) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: None,
            messages: chat_messages(system_prompt, user_message),
            temperature: 0.0,
        };
        let url = format!(
            "{}/openai/deployments/{}/chat/completions",
            self.endpoint.trim_end_matches('/'),
            self.deployment
        );
        let response = self
            .client
            .post(url)
            .query(&[("api-version", self.api_version.as_str())])
            .header("api-key", self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;
        read_completion(response).await
    }
}

/// Selects the provider from configuration. Validation has already checked
/// the provider-specific required fields; the checks here only guard against
/// a hand-built config skipping `validate()`.
pub fn build_llm_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    let api_key = config
        .api_key
        .clone()
        .ok_or_else(|| LlmError::Config("llm.api_key is required".to_string()))?;
    let client = Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|error| LlmError::Config(error.to_string()))?;

    match config.provider {
        LlmProvider::OpenAi => Ok(Arc::new(OpenAiClient::new(client, api_key, &config.model))),
        LlmProvider::Azure => {
            let endpoint = config
                .endpoint
                .clone()
                .ok_or_else(|| LlmError::Config("llm.endpoint is required".to_string()))?;
            let deployment = config
                .deployment
                .clone()
                .ok_or_else(|| LlmError::Config("llm.deployment is required".to_string()))?;
            Ok(Arc::new(AzureOpenAiClient::new(
                client,
                api_key,
                endpoint,
                deployment,
                &config.api_version,
            )))
        }
    }
}

/// Models wrap JSON answers in markdown fences often enough that every
/// completion is stripped before parsing.
pub fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim().to_string()
}
