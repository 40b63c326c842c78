pub mod assembler;
pub mod completeness;
pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod extraction;
pub mod flows;
pub mod pricing;
pub mod quantity;

pub use assembler::{QuoteAssembler, QuoteEngineResult};
pub use completeness::{
    ClarificationQuestion, CompletenessEvaluator, CompletenessReport, GapReason, RequiredField,
};
pub use config::{AppConfig, ConfigError, ConfigOverrides, EngineConfig, LlmConfig, LoadOptions};
pub use domain::conversation::{ConversationTurn, Role};
pub use domain::field::{Confidence, ExtractedField, FieldKey};
pub use domain::project::{LaborRate, PaintCategory, ProjectData, ProjectType, Surface};
pub use domain::quote::{CalculatedQuote, LineItemCategory, PricingMode, QuoteLineItem};
pub use domain::rates::RateSchedule;
pub use engine::{input_checksum, QuoteEngine, QuoteRequest};
pub use errors::{
    ApplicationError, DomainError, EngineError, InterfaceError, PricingError, ResolutionError,
};
pub use extraction::{DeterministicExtractor, ExtractionFailure, Extractor, FallbackExtractor};
pub use flows::{ConversationStage, StageCursor, StageMachine, StageOverride};
pub use pricing::PricingCalculator;
pub use quantity::QuantityResolver;
