//! Optional model-assisted extraction for the painting quote engine.
//!
//! The model is strictly a reader of the conversation. It never prices
//! anything: its output is parsed into `ProjectData`, capped by
//! [`guardrails::ExtractionGuardrails`], merged with the deterministic
//! extractor and then handed to the synchronous `QuoteEngine`, which owns
//! every calculation.
//!
//! - [`llm`]: the `LlmClient` seam and HTTP clients per provider
//! - [`extraction`]: prompt construction and model-output parsing
//! - [`runtime`]: timeout, retry and fallback around one engine turn

pub mod extraction;
pub mod guardrails;
pub mod llm;
pub mod runtime;

pub use extraction::{build_extraction_prompt, ModelOutputExtractor};
pub use guardrails::{ExtractionGuardrails, GuardrailReport};
pub use llm::{client_from_config, LlmClient, OllamaClient};
pub use runtime::AgentRuntime;
