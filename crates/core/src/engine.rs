//! Single entry point wiring extraction, completeness, staging and pricing
//! together for one inbound turn.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::assembler::{AssemblyParts, QuoteAssembler, QuoteEngineResult};
use crate::completeness::{CompletenessEvaluator, CompletenessReport};
use crate::config::EngineConfig;
use crate::domain::conversation::ConversationTurn;
use crate::domain::project::ProjectData;
use crate::domain::quote::{CalculatedQuote, PricingMode};
use crate::domain::rates::RateSchedule;
use crate::errors::{DomainError, EngineError};
use crate::extraction::{detect_signals, DeterministicExtractor, Extractor};
use crate::flows::{StageAction, StageContext, StageCursor, StageMachine, StageOverride};
use crate::pricing::PricingCalculator;
use crate::quantity::QuantityResolver;

/// Everything the caller supplies for one turn.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub turns: Vec<ConversationTurn>,
    #[serde(default)]
    pub rate_schedule: RateSchedule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_cursor: Option<StageCursor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_override: Option<StageOverride>,
}

impl QuoteRequest {
    pub fn new(turns: Vec<ConversationTurn>, rate_schedule: RateSchedule) -> Self {
        Self { turns, rate_schedule, stage_cursor: None, stage_override: None }
    }

    pub fn with_cursor(mut self, cursor: StageCursor) -> Self {
        self.stage_cursor = Some(cursor);
        self
    }

    pub fn with_override(mut self, stage_override: StageOverride) -> Self {
        self.stage_override = Some(stage_override);
        self
    }
}

pub struct QuoteEngine<E = DeterministicExtractor> {
    config: EngineConfig,
    extractor: E,
    fallback: DeterministicExtractor,
    evaluator: CompletenessEvaluator,
    calculator: PricingCalculator,
    machine: StageMachine,
    assembler: QuoteAssembler,
}

impl QuoteEngine<DeterministicExtractor> {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_extractor(config, DeterministicExtractor::new())
    }
}

impl Default for QuoteEngine<DeterministicExtractor> {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl<E> QuoteEngine<E>
where
    E: Extractor,
{
    pub fn with_extractor(config: EngineConfig, extractor: E) -> Self {
        let resolver = QuantityResolver::new(&config);
        Self {
            evaluator: CompletenessEvaluator::new(resolver.clone()),
            calculator: PricingCalculator::new(resolver),
            config,
            extractor,
            fallback: DeterministicExtractor::new(),
            machine: StageMachine::default(),
            assembler: QuoteAssembler,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Processes the conversation as it stands after the latest turn.
    /// Identical requests produce identical results.
    pub fn process(&self, request: &QuoteRequest) -> Result<QuoteEngineResult, EngineError> {
        let schedule = &request.rate_schedule;
        schedule.validate()?;

        let project = self.extract(&request.turns);
        let signals = detect_signals(&request.turns);
        let report = self.evaluator.evaluate(&project, schedule);

        let context = StageContext {
            blocked: report.blocked_stages().into_iter().collect(),
            accepted: signals.confirmation,
            ready_for_calculation: report.ready_for_calculation,
            preview_pricing: self.config.preview_pricing,
        };
        let outcome = self.machine.step(
            request.stage_cursor.as_ref(),
            request.stage_override.as_ref(),
            &context,
        )?;

        let priced = if outcome.has_action(StageAction::CalculateQuote)
            && report.ready_for_calculation
        {
            let quote = self.calculator.calculate(&project, schedule)?;
            Some((quote, PricingMode::Final))
        } else if outcome.has_action(StageAction::PreviewPricing) {
            match self.calculator.calculate(&project, schedule) {
                Ok(quote) => Some((quote, PricingMode::Preview)),
                Err(error) => {
                    tracing::warn!(
                        event_name = "pricing.preview_skipped",
                        stage = %outcome.stage(),
                        error = %error,
                        "preview pricing skipped"
                    );
                    None
                }
            }
        } else {
            None
        };

        let input_checksum = input_checksum(request)?;
        let result = self.assembler.assemble(AssemblyParts {
            project,
            report,
            outcome,
            priced,
            input_checksum,
        })?;

        tracing::info!(
            event_name = "engine.turn_processed",
            extractor = self.extractor.name(),
            turns = request.turns.len(),
            stage = %result.stage,
            confidence = result.confidence.label(),
            missing = result.missing_fields.len(),
            pricing_mode = ?result.pricing_mode,
            final_price = ?result.calculated_quote.as_ref().map(|quote| quote.final_price),
            checksum = %result.input_checksum,
            "turn processed"
        );
        Ok(result)
    }

    /// Gated calculation: refuses with `CalculationPrecondition` until the
    /// evaluator reports the project ready.
    pub fn finalize_quote(
        &self,
        project: &ProjectData,
        schedule: &RateSchedule,
    ) -> Result<CalculatedQuote, EngineError> {
        let report = self.evaluator.evaluate(project, schedule);
        report.calculation_permit()?;
        Ok(self.calculator.calculate(project, schedule)?)
    }

    pub fn evaluate(&self, project: &ProjectData, schedule: &RateSchedule) -> CompletenessReport {
        self.evaluator.evaluate(project, schedule)
    }

    /// Runs the configured extractor, falling back to the deterministic one
    /// when it fails.
    pub fn extract(&self, turns: &[ConversationTurn]) -> ProjectData {
        match self.extractor.extract(turns) {
            Ok(project) => project,
            Err(failure) => {
                tracing::warn!(
                    event_name = "extraction.fallback",
                    extractor = self.extractor.name(),
                    error = %failure,
                    "extractor failed, using deterministic extraction"
                );
                self.fallback.project_from(turns)
            }
        }
    }
}

/// `sha256:` digest of the canonical JSON form of a request.
pub fn input_checksum(request: &QuoteRequest) -> Result<String, DomainError> {
    checksum_of(request)
}

fn checksum_of<T: Serialize>(value: &T) -> Result<String, DomainError> {
    let canonical = serde_json::to_vec(value).map_err(|error| {
        tracing::error!(
            event_name = "engine.checksum_failed",
            error = %error,
            "request could not be serialized for checksum"
        );
        DomainError::InvariantViolation(format!("request is not serializable: {error}"))
    })?;
    Ok(format!("sha256:{:x}", Sha256::digest(&canonical)))
}
