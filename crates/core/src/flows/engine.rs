use thiserror::Error;

use crate::flows::states::{
    ConversationStage, StageAction, StageContext, StageCursor, StageEvent, StageOutcome,
    StageOverride, StageTransition,
};

pub trait StageFlow {
    fn name(&self) -> &'static str;
    fn initial_cursor(&self) -> StageCursor;
    /// Moves the cursor as far as the turn's data allows. `prior` is `None`
    /// on the first turn of a conversation.
    fn advance(
        &self,
        prior: Option<&StageCursor>,
        context: &StageContext,
    ) -> Result<StageOutcome, StageTransitionError>;
    fn reset(
        &self,
        current: &StageCursor,
        request: &StageOverride,
        context: &StageContext,
    ) -> Result<StageOutcome, StageTransitionError>;
}

/// customer_info -> project_type -> measurements -> paint_selection ->
/// rate_confirmation -> quote_review -> complete, with clarification
/// detours.
#[derive(Clone, Debug, Default)]
pub struct GuidedQuoteFlow;

impl StageFlow for GuidedQuoteFlow {
    fn name(&self) -> &'static str {
        "guided_quote"
    }

    fn initial_cursor(&self) -> StageCursor {
        StageCursor::default()
    }

    fn advance(
        &self,
        prior: Option<&StageCursor>,
        context: &StageContext,
    ) -> Result<StageOutcome, StageTransitionError> {
        let (start, carried) = match prior {
            Some(cursor) => (*cursor, true),
            None => (self.initial_cursor(), false),
        };
        validate_cursor(&start)?;
        advance_guided(start, carried, context)
    }

    fn reset(
        &self,
        current: &StageCursor,
        request: &StageOverride,
        context: &StageContext,
    ) -> Result<StageOutcome, StageTransitionError> {
        validate_cursor(current)?;
        let target = request.target;
        let earlier = match (target.position(), current.working_stage().position()) {
            (Some(target), Some(working)) => target < working,
            _ => false,
        };
        if !earlier {
            return Err(StageTransitionError::InvalidOverride { from: current.stage, to: target });
        }

        let cursor = StageCursor::at(target);
        Ok(StageOutcome {
            cursor,
            transitions: vec![transition(current.stage, target, StageEvent::EditRequested)],
            actions: actions_for(&cursor, context),
        })
    }
}

pub struct StageMachine<F = GuidedQuoteFlow> {
    flow: F,
}

impl<F> StageMachine<F>
where
    F: StageFlow,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn flow_name(&self) -> &'static str {
        self.flow.name()
    }

    pub fn initial_cursor(&self) -> StageCursor {
        self.flow.initial_cursor()
    }

    /// One turn: an override resets, otherwise the cursor advances.
    pub fn step(
        &self,
        prior: Option<&StageCursor>,
        stage_override: Option<&StageOverride>,
        context: &StageContext,
    ) -> Result<StageOutcome, StageTransitionError> {
        let result = match stage_override {
            Some(request) => {
                let current = prior.copied().unwrap_or_else(|| self.flow.initial_cursor());
                self.flow.reset(&current, request, context)
            }
            None => self.flow.advance(prior, context),
        };

        match &result {
            Ok(outcome) => {
                for applied in &outcome.transitions {
                    tracing::info!(
                        event_name = "stage.transition_applied",
                        flow = self.flow.name(),
                        from = %applied.from,
                        to = %applied.to,
                        event = ?applied.event,
                        "stage transition applied"
                    );
                }
            }
            Err(error) => {
                tracing::warn!(
                    event_name = "stage.transition_rejected",
                    flow = self.flow.name(),
                    error = %error,
                    "stage transition rejected"
                );
            }
        }
        result
    }
}

impl Default for StageMachine<GuidedQuoteFlow> {
    fn default() -> Self {
        Self::new(GuidedQuoteFlow)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StageTransitionError {
    #[error("cannot override from {from} to {to}: only earlier stages can be revisited")]
    InvalidOverride { from: ConversationStage, to: ConversationStage },
    #[error("inconsistent stage cursor: {stage} interrupted {interrupted:?}")]
    InvalidCursor { stage: ConversationStage, interrupted: Option<ConversationStage> },
}

fn validate_cursor(cursor: &StageCursor) -> Result<(), StageTransitionError> {
    let consistent = match (cursor.stage, cursor.interrupted) {
        (ConversationStage::Clarification, Some(interrupted)) => {
            interrupted.is_data_stage() || interrupted == ConversationStage::QuoteReview
        }
        (_, None) => true,
        (_, Some(_)) => false,
    };
    if consistent {
        Ok(())
    } else {
        Err(StageTransitionError::InvalidCursor {
            stage: cursor.stage,
            interrupted: cursor.interrupted,
        })
    }
}

fn advance_guided(
    start: StageCursor,
    carried: bool,
    context: &StageContext,
) -> Result<StageOutcome, StageTransitionError> {
    use ConversationStage::{Clarification, Complete, QuoteReview};

    if start.stage == Complete {
        return Ok(StageOutcome {
            cursor: start,
            transitions: Vec::new(),
            actions: actions_for(&start, context),
        });
    }

    let mut transitions = Vec::new();
    let mut current = start.working_stage();
    let mut reached_this_turn = !carried;

    if start.stage == Clarification {
        if context.is_blocked(current) {
            return Ok(StageOutcome {
                cursor: start,
                transitions,
                actions: actions_for(&start, context),
            });
        }
        transitions.push(transition(Clarification, current, StageEvent::ClarificationResolved));
        reached_this_turn = true;
    }

    while current.is_data_stage() && !context.is_blocked(current) {
        let next = current.next();
        transitions.push(transition(current, next, StageEvent::FieldsCollected));
        current = next;
        reached_this_turn = true;
    }

    let mut cursor = StageCursor::at(current);
    let stalled = context.is_blocked(current);
    if stalled && (!reached_this_turn || current == QuoteReview) {
        transitions.push(transition(current, Clarification, StageEvent::FieldsMissing));
        cursor = StageCursor { stage: Clarification, interrupted: Some(current) };
    } else if current == QuoteReview && !stalled && !reached_this_turn && context.accepted {
        transitions.push(transition(QuoteReview, Complete, StageEvent::QuoteAccepted));
        cursor = StageCursor::at(Complete);
    }

    Ok(StageOutcome { cursor, transitions, actions: actions_for(&cursor, context) })
}

fn transition(
    from: ConversationStage,
    to: ConversationStage,
    event: StageEvent,
) -> StageTransition {
    StageTransition { from, to, event, actions: entry_actions(to) }
}

fn entry_actions(stage: ConversationStage) -> Vec<StageAction> {
    match stage {
        ConversationStage::Clarification => vec![StageAction::AskClarification],
        ConversationStage::QuoteReview => {
            vec![StageAction::CalculateQuote, StageAction::PresentQuote]
        }
        ConversationStage::Complete => vec![StageAction::FinalizeQuote],
        _ => vec![StageAction::SolicitFields],
    }
}

fn actions_for(cursor: &StageCursor, context: &StageContext) -> Vec<StageAction> {
    let mut actions = match cursor.stage {
        ConversationStage::QuoteReview => {
            vec![StageAction::CalculateQuote, StageAction::PresentQuote]
        }
        ConversationStage::Complete if context.ready_for_calculation => {
            vec![StageAction::CalculateQuote, StageAction::FinalizeQuote]
        }
        ConversationStage::Complete | ConversationStage::Clarification => {
            vec![StageAction::AskClarification]
        }
        _ => vec![StageAction::SolicitFields],
    };

    if !cursor.stage.prices_final() && context.preview_pricing && context.ready_for_calculation {
        actions.push(StageAction::PreviewPricing);
    }
    actions
}
