use std::collections::BTreeMap;

use paintquote_core::domain::conversation::{ConversationTurn, Role};
use paintquote_core::domain::field::{Confidence, ExtractedField};
use paintquote_core::domain::project::{LaborRate, PaintFinish, ProjectData, ProjectType, Surface};
use paintquote_core::extraction::{ExtractionFailure, Extractor};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::guardrails::ExtractionGuardrails;

/// Priority given to model-sourced fields. Explicit statements picked up
/// by the deterministic rules outrank it.
const MODEL_PRIORITY: u8 = 2;

const INSTRUCTIONS: &str = "You read a conversation between a painting contractor and an \
assistant and report the project details the contractor stated. Reply with one JSON object and \
nothing else. Use null for anything not stated; never guess or compute values.

Schema:
{
  \"customer_name\": string|null,
  \"address\": string|null,
  \"project_type\": \"interior\"|\"exterior\"|\"both\"|null,
  \"surfaces\": [\"walls\"|\"ceilings\"|\"trim\"|\"doors\"|\"cabinets\"],
  \"measurements\": {\"linear_feet\": number|null, \"ceiling_height\": number|null, \
\"square_feet\": number|null, \"ceiling_square_feet\": number|null, \"trim_linear_feet\": number|null, \
\"door_count\": integer|null, \"cabinet_count\": integer|null, \"room_count\": integer|null},
  \"paint\": {\"brand\": string|null, \"finish\": \"flat\"|\"matte\"|\"eggshell\"|\"satin\"|\"semi_gloss\"|\"gloss\"|null, \
\"price_per_gallon\": number|null, \"coverage_sqft_per_gallon\": number|null, \"coats\": integer|null},
  \"labor_rates\": {\"<surface>\": {\"rate\": number} or {\"hours\": number, \"hourly_rate\": number}},
  \"markup_pct\": number|null,
  \"tax_rate_pct\": number|null,
  \"timeline\": string|null
}";

/// Prompt asking the model for the project details as JSON.
pub fn build_extraction_prompt(turns: &[ConversationTurn]) -> String {
    let mut prompt = String::from(INSTRUCTIONS);
    prompt.push_str("\n\nConversation:\n");
    for turn in turns {
        let speaker = match turn.role {
            Role::User => "contractor",
            Role::Assistant => "assistant",
        };
        prompt.push_str(speaker);
        prompt.push_str(": ");
        prompt.push_str(turn.text.trim());
        prompt.push('\n');
    }
    prompt
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ModelPayload {
    customer_name: Option<String>,
    address: Option<String>,
    project_type: Option<ProjectType>,
    surfaces: Vec<Surface>,
    measurements: ModelMeasurements,
    paint: ModelPaint,
    labor_rates: BTreeMap<Surface, ModelLaborRate>,
    markup_pct: Option<Decimal>,
    tax_rate_pct: Option<Decimal>,
    timeline: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ModelMeasurements {
    linear_feet: Option<Decimal>,
    ceiling_height: Option<Decimal>,
    square_feet: Option<Decimal>,
    ceiling_square_feet: Option<Decimal>,
    trim_linear_feet: Option<Decimal>,
    door_count: Option<u32>,
    cabinet_count: Option<u32>,
    room_count: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ModelPaint {
    brand: Option<String>,
    finish: Option<PaintFinish>,
    price_per_gallon: Option<Decimal>,
    coverage_sqft_per_gallon: Option<Decimal>,
    coats: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ModelLaborRate {
    Hourly { hours: Decimal, hourly_rate: Decimal },
    PerUnit { rate: Decimal },
}

impl From<ModelLaborRate> for LaborRate {
    fn from(value: ModelLaborRate) -> Self {
        match value {
            ModelLaborRate::Hourly { hours, hourly_rate } => Self::Hourly { hours, hourly_rate },
            ModelLaborRate::PerUnit { rate } => Self::PerUnit { rate },
        }
    }
}

/// Extractor over one model reply. The reply is obtained up front by the
/// async runtime; parsing and guardrails run synchronously inside the
/// engine like any other extractor.
#[derive(Clone, Debug)]
pub struct ModelOutputExtractor {
    reply: String,
    guardrails: ExtractionGuardrails,
}

impl ModelOutputExtractor {
    pub fn new(reply: String, guardrails: ExtractionGuardrails) -> Self {
        Self { reply, guardrails }
    }

    pub fn parse(
        &self,
        reply: &str,
        turns: &[ConversationTurn],
    ) -> Result<ProjectData, ExtractionFailure> {
        let payload: ModelPayload = serde_json::from_str(strip_code_fence(reply))
            .map_err(|error| ExtractionFailure::Malformed(error.to_string()))?;

        let source = turns.iter().rposition(|turn| turn.role == Role::User).unwrap_or(0);
        let project = into_project(payload, source);
        if project.is_empty() {
            return Err(ExtractionFailure::NoUsableFields);
        }
        Ok(self.guardrails.apply(project).project)
    }
}

impl Extractor for ModelOutputExtractor {
    fn name(&self) -> &'static str {
        "model"
    }

    fn extract(&self, turns: &[ConversationTurn]) -> Result<ProjectData, ExtractionFailure> {
        self.parse(&self.reply, turns)
    }
}

/// Models sometimes wrap JSON in a markdown fence despite being told not to.
fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

fn model_field<T>(value: T, source: usize) -> ExtractedField<T> {
    ExtractedField::new(value, Confidence::Medium, source, MODEL_PRIORITY)
}

fn text_field(value: Option<String>, source: usize) -> Option<ExtractedField<String>> {
    let value = value?.trim().to_owned();
    (!value.is_empty()).then(|| model_field(value, source))
}

fn into_project(payload: ModelPayload, source: usize) -> ProjectData {
    let mut project = ProjectData::new();
    project.customer_name = text_field(payload.customer_name, source);
    project.address = text_field(payload.address, source);
    project.timeline = text_field(payload.timeline, source);
    project.project_type = payload.project_type.map(|value| model_field(value, source));
    project.surfaces = payload
        .surfaces
        .into_iter()
        .map(|surface| (surface, model_field(true, source)))
        .collect();

    let measured = payload.measurements;
    let measurements = &mut project.measurements;
    measurements.linear_feet = measured.linear_feet.map(|v| model_field(v, source));
    measurements.ceiling_height = measured.ceiling_height.map(|v| model_field(v, source));
    measurements.square_feet = measured.square_feet.map(|v| model_field(v, source));
    measurements.ceiling_square_feet = measured.ceiling_square_feet.map(|v| model_field(v, source));
    measurements.trim_linear_feet = measured.trim_linear_feet.map(|v| model_field(v, source));
    measurements.door_count = measured.door_count.map(|v| model_field(v, source));
    measurements.cabinet_count = measured.cabinet_count.map(|v| model_field(v, source));
    measurements.room_count = measured.room_count.map(|v| model_field(v, source));

    let paint = payload.paint;
    project.paint.brand = text_field(paint.brand, source);
    project.paint.finish = paint.finish.map(|v| model_field(v, source));
    project.paint.price_per_gallon = paint.price_per_gallon.map(|v| model_field(v, source));
    project.paint.coverage_sqft_per_gallon =
        paint.coverage_sqft_per_gallon.map(|v| model_field(v, source));
    project.paint.coats = paint.coats.map(|v| model_field(v, source));

    project.labor_rates = payload
        .labor_rates
        .into_iter()
        .map(|(surface, rate)| (surface, model_field(LaborRate::from(rate), source)))
        .collect();
    project.markup_pct = payload.markup_pct.map(|v| model_field(v, source));
    project.tax_rate_pct = payload.tax_rate_pct.map(|v| model_field(v, source));
    project
}

#[cfg(test)]
mod tests {
    use paintquote_core::domain::conversation::ConversationTurn;
    use paintquote_core::domain::field::Confidence;
    use paintquote_core::domain::project::{LaborRate, Surface};
    use paintquote_core::extraction::{ExtractionFailure, Extractor};
    use rust_decimal::Decimal;

    use super::{build_extraction_prompt, ModelOutputExtractor};
    use crate::guardrails::ExtractionGuardrails;

    fn turns() -> Vec<ConversationTurn> {
        vec![
            ConversationTurn::assistant("Who is the customer?"),
            ConversationTurn::user("It's for Cici Zhang, walls only, 4500 sqft."),
        ]
    }

    #[test]
    fn prompt_lists_every_turn_with_its_speaker() {
        let prompt = build_extraction_prompt(&turns());
        assert!(prompt.contains("assistant: Who is the customer?"));
        assert!(prompt.contains("contractor: It's for Cici Zhang, walls only, 4500 sqft."));
        assert!(prompt.contains("\"labor_rates\""));
    }

    #[test]
    fn parses_fenced_json_into_medium_confidence_fields() {
        let reply = "```json\n{\"customer_name\": \"Cici Zhang\", \"surfaces\": [\"walls\"], \
                     \"measurements\": {\"square_feet\": 4500}, \"paint\": {\"finish\": \"semi_gloss\"}}\n```";
        let extractor = ModelOutputExtractor::new(reply.to_owned(), ExtractionGuardrails::default());

        let project = extractor.extract(&turns()).expect("parsed");

        let name = project.customer_name.as_ref().expect("name");
        assert_eq!(name.value, "Cici Zhang");
        assert_eq!(name.confidence, Confidence::Medium);
        assert_eq!(name.source_turn_index, 1);
        assert_eq!(project.selected_surfaces(), vec![Surface::Walls]);
        assert_eq!(project.measurements.square_feet.map(|f| f.value), Some(Decimal::new(4500, 0)));
    }

    #[test]
    fn labor_rates_parse_both_modes_when_allowed() {
        let reply = r#"{"labor_rates": {"walls": {"rate": 1.5}, "doors": {"hours": 6, "hourly_rate": 55}}}"#;
        let guardrails = ExtractionGuardrails { model_can_set_rates: true };
        let project = ModelOutputExtractor::new(reply.to_owned(), guardrails)
            .extract(&turns())
            .expect("parsed");

        assert_eq!(
            project.labor_rates.get(&Surface::Walls).map(|f| f.value),
            Some(LaborRate::PerUnit { rate: Decimal::new(15, 1) })
        );
        assert_eq!(
            project.labor_rates.get(&Surface::Doors).map(|f| f.value),
            Some(LaborRate::Hourly { hours: Decimal::new(6, 0), hourly_rate: Decimal::new(55, 0) })
        );
    }

    #[test]
    fn prose_reply_is_malformed() {
        let extractor = ModelOutputExtractor::new(
            "The customer is Cici.".to_owned(),
            ExtractionGuardrails::default(),
        );
        assert!(matches!(extractor.extract(&turns()), Err(ExtractionFailure::Malformed(_))));
    }

    #[test]
    fn empty_object_has_no_usable_fields() {
        let extractor = ModelOutputExtractor::new("{}".to_owned(), ExtractionGuardrails::default());
        assert_eq!(extractor.extract(&turns()), Err(ExtractionFailure::NoUsableFields));
    }
}
