use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use paintquote_core::config::{LlmConfig, LlmProvider};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";
const DEFAULT_ANTHROPIC_URL: &str = "https://api.anthropic.com";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Text-in, text-out completion. Clients are asked for a JSON object and
/// return the raw model text; parsing happens in the extraction layer.
#[async_trait]
pub trait LlmClient: Send + Sync {
    fn name(&self) -> &'static str;
    async fn complete(&self, prompt: &str) -> Result<String>;
}

pub fn client_from_config(config: &LlmConfig) -> Result<Box<dyn LlmClient>> {
    let timeout = Duration::from_secs(config.timeout_secs);
    let client: Box<dyn LlmClient> = match config.provider {
        LlmProvider::Ollama => Box::new(OllamaClient::new(
            config.base_url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL),
            &config.model,
            timeout,
        )?),
        LlmProvider::OpenAi => Box::new(OpenAiClient::new(
            config.base_url.as_deref().unwrap_or(DEFAULT_OPENAI_URL),
            &config.model,
            required_key(config)?,
            timeout,
        )?),
        LlmProvider::Anthropic => Box::new(AnthropicClient::new(
            config.base_url.as_deref().unwrap_or(DEFAULT_ANTHROPIC_URL),
            &config.model,
            required_key(config)?,
            timeout,
        )?),
    };
    Ok(client)
}

fn required_key(config: &LlmConfig) -> Result<SecretString> {
    config
        .api_key
        .clone()
        .ok_or_else(|| anyhow!("llm.api_key is required for provider {}", config.provider.as_str()))
}

fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder().timeout(timeout).build().context("failed to build HTTP client")
}

async fn read_json(response: reqwest::Response, provider: &str) -> Result<Value> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("{provider} returned HTTP {}: {body}", status.as_u16());
    }
    response.json::<Value>().await.with_context(|| format!("{provider} response was not JSON"))
}

/// Local Ollama instance via `/api/generate` in JSON mode.
pub struct OllamaClient {
    base_url: String,
    model: String,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    format: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            model: model.to_owned(),
            http: http_client(timeout)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest { model: &self.model, prompt, format: "json", stream: false };

        let response = self.http.post(&url).json(&body).send().await.map_err(|error| {
            if error.is_connect() {
                anyhow!("cannot reach ollama at {}", self.base_url)
            } else if error.is_timeout() {
                anyhow!("ollama request timed out")
            } else {
                anyhow!(error)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("ollama returned HTTP {}: {body}", status.as_u16());
        }
        let parsed: GenerateResponse =
            response.json().await.context("ollama response did not match /api/generate")?;
        Ok(parsed.response)
    }
}

/// OpenAI-compatible chat completions endpoint in JSON-object mode.
pub struct OpenAiClient {
    base_url: String,
    model: String,
    api_key: SecretString,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(base_url: &str, model: &str, api_key: SecretString, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            model: model.to_owned(),
            api_key,
            http: http_client(timeout)?,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn name(&self) -> &'static str {
        "open_ai"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "temperature": 0,
            "response_format": {"type": "json_object"},
            "messages": [{"role": "user", "content": prompt}],
        });
        let response = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .context("openai request failed")?;

        let payload = read_json(response, "openai").await?;
        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| anyhow!("openai response carried no message content"))
    }
}

/// Anthropic messages API.
pub struct AnthropicClient {
    base_url: String,
    model: String,
    api_key: SecretString,
    http: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(base_url: &str, model: &str, api_key: SecretString, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            model: model.to_owned(),
            api_key,
            http: http_client(timeout)?,
        })
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "max_tokens": 1024,
            "temperature": 0,
            "messages": [{"role": "user", "content": prompt}],
        });
        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .context("anthropic request failed")?;

        let payload = read_json(response, "anthropic").await?;
        payload["content"]
            .as_array()
            .and_then(|blocks| blocks.iter().find_map(|block| block["text"].as_str()))
            .map(str::to_owned)
            .ok_or_else(|| anyhow!("anthropic response carried no text block"))
    }
}
