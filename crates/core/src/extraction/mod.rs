pub mod deterministic;
pub mod patterns;
pub mod text;

use thiserror::Error;

use crate::domain::conversation::ConversationTurn;
use crate::domain::field::Confidence;
use crate::domain::project::ProjectData;

pub use deterministic::{detect_signals, DeterministicExtractor, TurnSignals};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ExtractionFailure {
    #[error("extractor unavailable: {0}")]
    Unavailable(String),
    #[error("extractor returned malformed output: {0}")]
    Malformed(String),
    #[error("extractor produced no usable fields")]
    NoUsableFields,
}

/// Turns the accumulated conversation into project data. Implementations
/// must be side-effect free from the engine's point of view.
pub trait Extractor: Send + Sync {
    fn name(&self) -> &'static str;
    fn extract(&self, turns: &[ConversationTurn]) -> Result<ProjectData, ExtractionFailure>;
}

impl<E> Extractor for &E
where
    E: Extractor + ?Sized,
{
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn extract(&self, turns: &[ConversationTurn]) -> Result<ProjectData, ExtractionFailure> {
        (**self).extract(turns)
    }
}

/// Runs `primary` first and lets `fallback` fill the gaps. When the primary
/// fails, or yields nothing at medium confidence or better, the fallback
/// result is used on its own.
#[derive(Clone, Debug, Default)]
pub struct FallbackExtractor<P, F> {
    primary: P,
    fallback: F,
}

impl<P, F> FallbackExtractor<P, F>
where
    P: Extractor,
    F: Extractor,
{
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }

    pub fn primary(&self) -> &P {
        &self.primary
    }

    pub fn fallback(&self) -> &F {
        &self.fallback
    }
}

impl<P, F> Extractor for FallbackExtractor<P, F>
where
    P: Extractor,
    F: Extractor,
{
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn extract(&self, turns: &[ConversationTurn]) -> Result<ProjectData, ExtractionFailure> {
        let fallback = self.fallback.extract(turns)?;

        let primary = match self.primary.extract(turns) {
            Ok(project) if project.count_fields_at_least(Confidence::Medium) > 0 => project,
            Ok(_) => {
                tracing::warn!(
                    event_name = "extraction.primary_unusable",
                    primary = self.primary.name(),
                    fallback = self.fallback.name(),
                    "primary extractor produced no usable fields; using fallback"
                );
                return Ok(fallback);
            }
            Err(error) => {
                tracing::warn!(
                    event_name = "extraction.primary_failed",
                    primary = self.primary.name(),
                    fallback = self.fallback.name(),
                    error = %error,
                    "primary extractor failed; using fallback"
                );
                return Ok(fallback);
            }
        };

        let mut merged = primary;
        merged.fill_from(&fallback);
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::domain::conversation::ConversationTurn;
    use crate::domain::field::{Confidence, ExtractedField};
    use crate::domain::project::ProjectData;
    use crate::extraction::{DeterministicExtractor, ExtractionFailure, Extractor, FallbackExtractor};

    struct Scripted(Result<ProjectData, ExtractionFailure>);

    impl Extractor for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn extract(&self, _turns: &[ConversationTurn]) -> Result<ProjectData, ExtractionFailure> {
            self.0.clone()
        }
    }

    fn turns() -> Vec<ConversationTurn> {
        vec![ConversationTurn::user("Customer: Cici Zhang. Walls are 4500 sqft")]
    }

    #[test]
    fn failing_primary_falls_back_to_deterministic() {
        let extractor = FallbackExtractor::new(
            Scripted(Err(ExtractionFailure::Unavailable("connection refused".to_owned()))),
            DeterministicExtractor::new(),
        );

        let project = extractor.extract(&turns()).expect("fallback always succeeds");
        assert_eq!(project.customer_name.map(|f| f.value), Some("Cici Zhang".to_owned()));
        assert_eq!(project.measurements.square_feet.map(|f| f.value), Some(Decimal::new(4500, 0)));
    }

    #[test]
    fn primary_without_medium_fields_is_discarded() {
        let mut weak = ProjectData::new();
        weak.customer_name = Some(ExtractedField::new("Wrong".to_owned(), Confidence::Low, 0, 1));
        weak.timeline = Some(ExtractedField::new("someday".to_owned(), Confidence::Low, 0, 1));

        let extractor = FallbackExtractor::new(Scripted(Ok(weak)), DeterministicExtractor::new());
        let project = extractor.extract(&turns()).expect("fallback");

        assert_eq!(project.customer_name.map(|f| f.value), Some("Cici Zhang".to_owned()));
        assert!(project.timeline.is_none());
    }

    #[test]
    fn deterministic_fills_gaps_and_labeled_matches_win() {
        let mut primary = ProjectData::new();
        primary.customer_name =
            Some(ExtractedField::new("Cici Z.".to_owned(), Confidence::Medium, 0, 2));
        primary.address =
            Some(ExtractedField::new("412 Maple Ave".to_owned(), Confidence::Medium, 0, 2));

        let extractor = FallbackExtractor::new(Scripted(Ok(primary)), DeterministicExtractor::new());
        let project = extractor.extract(&turns()).expect("merged");

        assert_eq!(project.customer_name.map(|f| f.value), Some("Cici Zhang".to_owned()));
        assert_eq!(project.address.map(|f| f.value), Some("412 Maple Ave".to_owned()));
        assert_eq!(project.measurements.square_feet.map(|f| f.value), Some(Decimal::new(4500, 0)));
    }

    #[test]
    fn later_labeled_correction_beats_stale_primary_value() {
        let turns = vec![
            ConversationTurn::user("Customer: Cici Zhang"),
            ConversationTurn::user("Sorry, customer: Roberta Diaz"),
        ];
        let mut primary = ProjectData::new();
        primary.customer_name =
            Some(ExtractedField::new("Cici Zhang".to_owned(), Confidence::Medium, 1, 2));

        let extractor = FallbackExtractor::new(Scripted(Ok(primary)), DeterministicExtractor::new());
        let project = extractor.extract(&turns).expect("merged");

        let name = project.customer_name.expect("name present");
        assert_eq!(name.value, "Roberta Diaz");
        assert_eq!(name.source_turn_index, 1);
    }
}
