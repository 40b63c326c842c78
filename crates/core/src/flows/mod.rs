pub mod engine;
pub mod states;

pub use engine::{GuidedQuoteFlow, StageFlow, StageMachine, StageTransitionError};
pub use states::{
    ConversationStage, StageAction, StageContext, StageCursor, StageEvent, StageOutcome,
    StageOverride, StageTransition,
};
