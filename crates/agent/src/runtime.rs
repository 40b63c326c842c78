use std::time::Duration;

use anyhow::{Context, Result};
use paintquote_core::config::{AppConfig, EngineConfig, LlmConfig};
use paintquote_core::domain::conversation::ConversationTurn;
use paintquote_core::extraction::{DeterministicExtractor, FallbackExtractor};
use paintquote_core::{QuoteEngine, QuoteEngineResult, QuoteRequest};

use crate::extraction::{build_extraction_prompt, ModelOutputExtractor};
use crate::guardrails::ExtractionGuardrails;
use crate::llm::{client_from_config, LlmClient};

/// Async shell around the synchronous engine: asks the model first, under a
/// timeout with bounded retries, and always has the deterministic
/// extractor to fall back on.
pub struct AgentRuntime {
    client: Option<Box<dyn LlmClient>>,
    engine_config: EngineConfig,
    guardrails: ExtractionGuardrails,
    timeout: Duration,
    max_retries: u32,
}

impl AgentRuntime {
    /// Runtime that never consults a model.
    pub fn deterministic(engine_config: EngineConfig) -> Self {
        Self {
            client: None,
            engine_config,
            guardrails: ExtractionGuardrails::default(),
            timeout: Duration::from_secs(LlmConfig::default().timeout_secs),
            max_retries: 0,
        }
    }

    pub fn new(client: Box<dyn LlmClient>, engine_config: EngineConfig, llm: &LlmConfig) -> Self {
        Self {
            client: Some(client),
            engine_config,
            guardrails: ExtractionGuardrails::new(llm.model_can_set_rates),
            timeout: Duration::from_secs(llm.timeout_secs),
            max_retries: llm.max_retries,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        if !config.llm.enabled {
            return Ok(Self::deterministic(config.engine.clone()));
        }
        let client = client_from_config(&config.llm).context("failed to build the llm client")?;
        Ok(Self::new(client, config.engine.clone(), &config.llm))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn uses_model(&self) -> bool {
        self.client.is_some()
    }

    pub async fn process_turns(&self, request: &QuoteRequest) -> Result<QuoteEngineResult> {
        let processed = match self.consult_model(&request.turns).await {
            Some(model) => {
                let extractor = FallbackExtractor::new(model, DeterministicExtractor::new());
                QuoteEngine::with_extractor(self.engine_config.clone(), extractor).process(request)
            }
            None => QuoteEngine::new(self.engine_config.clone()).process(request),
        };
        processed.context("quote engine rejected the turn")
    }

    /// `None` when no model is configured or every attempt failed.
    async fn consult_model(&self, turns: &[ConversationTurn]) -> Option<ModelOutputExtractor> {
        let client = self.client.as_ref()?;

        let prompt = build_extraction_prompt(turns);
        let attempts = self.max_retries + 1;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match tokio::time::timeout(self.timeout, client.complete(&prompt)).await {
                Ok(Ok(reply)) => {
                    tracing::debug!(
                        event_name = "agent.model_replied",
                        client = client.name(),
                        attempt,
                        "model replied"
                    );
                    return Some(ModelOutputExtractor::new(reply, self.guardrails.clone()));
                }
                Ok(Err(error)) => last_error = format!("{error:#}"),
                Err(_) => last_error = format!("timed out after {:?}", self.timeout),
            }
            tracing::debug!(
                event_name = "agent.model_attempt_failed",
                client = client.name(),
                attempt,
                attempts,
                error = %last_error,
                "model attempt failed"
            );
        }

        tracing::warn!(
            event_name = "agent.extraction_fallback",
            client = client.name(),
            attempts,
            error = %last_error,
            "model unavailable, falling back to deterministic extraction"
        );
        None
    }
}
