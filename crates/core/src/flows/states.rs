use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStage {
    CustomerInfo,
    ProjectType,
    Measurements,
    PaintSelection,
    RateConfirmation,
    QuoteReview,
    Complete,
    Clarification,
}

impl ConversationStage {
    /// Stages that solicit project data, in the order they are asked.
    pub const DATA: [ConversationStage; 5] = [
        ConversationStage::CustomerInfo,
        ConversationStage::ProjectType,
        ConversationStage::Measurements,
        ConversationStage::PaintSelection,
        ConversationStage::RateConfirmation,
    ];

    /// Position on the main line; `clarification` is a detour and has none.
    pub fn position(self) -> Option<usize> {
        match self {
            Self::CustomerInfo => Some(0),
            Self::ProjectType => Some(1),
            Self::Measurements => Some(2),
            Self::PaintSelection => Some(3),
            Self::RateConfirmation => Some(4),
            Self::QuoteReview => Some(5),
            Self::Complete => Some(6),
            Self::Clarification => None,
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::CustomerInfo => Self::ProjectType,
            Self::ProjectType => Self::Measurements,
            Self::Measurements => Self::PaintSelection,
            Self::PaintSelection => Self::RateConfirmation,
            Self::RateConfirmation => Self::QuoteReview,
            Self::QuoteReview | Self::Complete => Self::Complete,
            Self::Clarification => Self::Clarification,
        }
    }

    pub fn is_data_stage(self) -> bool {
        Self::DATA.contains(&self)
    }

    /// Whether the calculator runs as a final (not preview) pricing here.
    pub fn prices_final(self) -> bool {
        matches!(self, Self::QuoteReview | Self::Complete)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CustomerInfo => "customer_info",
            Self::ProjectType => "project_type",
            Self::Measurements => "measurements",
            Self::PaintSelection => "paint_selection",
            Self::RateConfirmation => "rate_confirmation",
            Self::QuoteReview => "quote_review",
            Self::Complete => "complete",
            Self::Clarification => "clarification",
        }
    }
}

impl fmt::Display for ConversationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The only state carried between turns. `interrupted` names the stage a
/// clarification detour returns to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCursor {
    pub stage: ConversationStage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interrupted: Option<ConversationStage>,
}

impl StageCursor {
    pub fn at(stage: ConversationStage) -> Self {
        Self { stage, interrupted: None }
    }

    /// The main-line stage this cursor is working on.
    pub fn working_stage(&self) -> ConversationStage {
        match (self.stage, self.interrupted) {
            (ConversationStage::Clarification, Some(interrupted)) => interrupted,
            (ConversationStage::Clarification, None) => ConversationStage::CustomerInfo,
            (stage, _) => stage,
        }
    }
}

impl Default for StageCursor {
    fn default() -> Self {
        Self::at(ConversationStage::CustomerInfo)
    }
}

/// Explicit edit command resetting the conversation to an earlier stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOverride {
    pub target: ConversationStage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageEvent {
    FieldsCollected,
    FieldsMissing,
    ClarificationResolved,
    QuoteAccepted,
    EditRequested,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageAction {
    SolicitFields,
    AskClarification,
    PreviewPricing,
    CalculateQuote,
    PresentQuote,
    FinalizeQuote,
}

/// What the stage machine sees of the current turn.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StageContext {
    /// Data stages with at least one blocking gap.
    pub blocked: Vec<ConversationStage>,
    pub accepted: bool,
    pub ready_for_calculation: bool,
    pub preview_pricing: bool,
}

impl StageContext {
    pub fn is_blocked(&self, stage: ConversationStage) -> bool {
        match stage {
            ConversationStage::QuoteReview | ConversationStage::Complete => {
                !self.blocked.is_empty()
            }
            stage => self.blocked.contains(&stage),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTransition {
    pub from: ConversationStage,
    pub to: ConversationStage,
    pub event: StageEvent,
    pub actions: Vec<StageAction>,
}

/// Result of one turn through the machine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOutcome {
    pub cursor: StageCursor,
    pub transitions: Vec<StageTransition>,
    pub actions: Vec<StageAction>,
}

impl StageOutcome {
    pub fn stage(&self) -> ConversationStage {
        self.cursor.stage
    }

    pub fn has_action(&self, action: StageAction) -> bool {
        self.actions.contains(&action)
    }
}
