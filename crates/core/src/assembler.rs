use serde::Serialize;

use crate::completeness::{ClarificationQuestion, CompletenessReport, RequiredField};
use crate::domain::field::Confidence;
use crate::domain::project::ProjectData;
use crate::domain::quote::{CalculatedQuote, PricingMode};
use crate::errors::DomainError;
use crate::flows::{ConversationStage, StageCursor, StageOutcome, StageTransition};

/// Everything the engine hands back for one turn. Built once, never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QuoteEngineResult {
    pub project_data: ProjectData,
    pub calculated_quote: Option<CalculatedQuote>,
    pub pricing_mode: Option<PricingMode>,
    pub stage: ConversationStage,
    pub stage_cursor: StageCursor,
    pub transitions: Vec<StageTransition>,
    pub missing_fields: Vec<RequiredField>,
    pub next_clarification_question: Option<ClarificationQuestion>,
    pub clarification_questions: Vec<ClarificationQuestion>,
    pub confidence: Confidence,
    pub input_checksum: String,
}

impl QuoteEngineResult {
    pub fn is_final(&self) -> bool {
        self.pricing_mode == Some(PricingMode::Final)
    }
}

#[derive(Clone, Debug)]
pub struct AssemblyParts {
    pub project: ProjectData,
    pub report: CompletenessReport,
    pub outcome: StageOutcome,
    pub priced: Option<(CalculatedQuote, PricingMode)>,
    pub input_checksum: String,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct QuoteAssembler;

impl QuoteAssembler {
    pub fn assemble(&self, parts: AssemblyParts) -> Result<QuoteEngineResult, DomainError> {
        let AssemblyParts { project, report, outcome, priced, input_checksum } = parts;

        if priced.is_some() && !report.ready_for_calculation {
            return Err(DomainError::InvariantViolation(
                "a priced quote was assembled for an incomplete project".to_owned(),
            ));
        }
        if let Some((_, PricingMode::Final)) = &priced {
            if !outcome.stage().prices_final() {
                return Err(DomainError::InvariantViolation(format!(
                    "final pricing is not allowed at stage {}",
                    outcome.stage()
                )));
            }
        }

        let next_clarification_question = report.next_question().cloned();
        let (calculated_quote, pricing_mode) = match priced {
            Some((quote, mode)) => (Some(quote), Some(mode)),
            None => (None, None),
        };

        Ok(QuoteEngineResult {
            project_data: project,
            calculated_quote,
            pricing_mode,
            stage: outcome.stage(),
            stage_cursor: outcome.cursor,
            transitions: outcome.transitions,
            missing_fields: report.missing_fields,
            next_clarification_question,
            clarification_questions: report.clarification_questions,
            confidence: report.confidence,
            input_checksum,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::completeness::CompletenessEvaluator;
    use crate::domain::project::ProjectData;
    use crate::domain::quote::{CalculatedQuote, PricingMode};
    use crate::domain::rates::RateSchedule;
    use crate::errors::DomainError;
    use crate::flows::{ConversationStage, StageAction, StageCursor, StageOutcome};

    use super::{AssemblyParts, QuoteAssembler};

    fn empty_quote() -> CalculatedQuote {
        CalculatedQuote {
            paint_gallons: Default::default(),
            paint: Vec::new(),
            materials_cost: Default::default(),
            labor_cost: Default::default(),
            overhead_cost: Default::default(),
            subtotal: Default::default(),
            markup_pct: Default::default(),
            markup_amount: Default::default(),
            tax_rate_pct: Default::default(),
            tax_on_materials_only: false,
            tax_amount: Default::default(),
            final_price: Default::default(),
            line_items: Vec::new(),
        }
    }

    fn parts(priced: Option<(CalculatedQuote, PricingMode)>) -> AssemblyParts {
        let project = ProjectData::new();
        let report = CompletenessEvaluator::default().evaluate(&project, &RateSchedule::default());
        AssemblyParts {
            project,
            report,
            outcome: StageOutcome {
                cursor: StageCursor::at(ConversationStage::CustomerInfo),
                transitions: Vec::new(),
                actions: vec![StageAction::SolicitFields],
            },
            priced,
            input_checksum: "sha256:00".to_owned(),
        }
    }

    #[test]
    fn incomplete_project_assembles_with_next_question_and_no_quote() {
        let result = QuoteAssembler.assemble(parts(None)).expect("assembled");

        assert_eq!(result.stage, ConversationStage::CustomerInfo);
        assert!(result.calculated_quote.is_none());
        assert!(result.pricing_mode.is_none());
        assert_eq!(
            result.next_clarification_question.as_ref().map(|q| q.missing_field.to_string()),
            Some("customer_name".to_owned())
        );

        let json = serde_json::to_value(&result).expect("serializable");
        assert_eq!(json["stage"], "customer_info");
        assert_eq!(json["missing_fields"][0], "customer_name");
        assert!(json["calculated_quote"].is_null());
    }

    #[test]
    fn refuses_to_carry_a_quote_for_an_incomplete_project() {
        let error = QuoteAssembler
            .assemble(parts(Some((empty_quote(), PricingMode::Preview))))
            .expect_err("invariant");
        assert!(matches!(error, DomainError::InvariantViolation(_)));
    }
}
