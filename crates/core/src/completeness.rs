//! Decides what the quote still needs and phrases the next question.

use std::collections::BTreeSet;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

use crate::domain::field::{Confidence, ExtractedField, FieldKey};
use crate::domain::project::{LaborRate, PaintCategory, ProjectData, Surface};
use crate::domain::rates::RateSchedule;
use crate::errors::{DomainError, ResolutionError};
use crate::flows::ConversationStage;
use crate::quantity::{QuantityResolver, ValueSource};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GapReason {
    Missing,
    LowConfidence,
    Ambiguous,
    Invalid,
}

impl GapReason {
    /// Missing, ambiguous and invalid inputs pull overall confidence to low.
    pub fn is_blocking_hard(self) -> bool {
        !matches!(self, Self::LowConfidence)
    }
}

/// An input the quote depends on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RequiredField {
    CustomerName,
    Address,
    Surfaces,
    Measurements,
    Quantity(Surface),
    Measurement(FieldKey),
    PaintPrice(PaintCategory),
    LaborRate(Surface),
    MarkupPct,
    TaxRatePct,
    PaintBrand,
    PaintFinish,
}

impl RequiredField {
    pub fn stage(self) -> ConversationStage {
        match self {
            Self::CustomerName | Self::Address => ConversationStage::CustomerInfo,
            Self::Surfaces => ConversationStage::ProjectType,
            Self::Measurement(FieldKey::PaintCoats | FieldKey::PaintCoverage)
            | Self::PaintPrice(_)
            | Self::PaintBrand
            | Self::PaintFinish => ConversationStage::PaintSelection,
            Self::Measurements | Self::Quantity(_) | Self::Measurement(_) => {
                ConversationStage::Measurements
            }
            Self::LaborRate(_) | Self::MarkupPct | Self::TaxRatePct => {
                ConversationStage::RateConfirmation
            }
        }
    }
}

impl fmt::Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CustomerName => f.write_str("customer_name"),
            Self::Address => f.write_str("address"),
            Self::Surfaces => f.write_str("surfaces"),
            Self::Measurements => f.write_str("measurements"),
            Self::Quantity(surface) => write!(f, "quantity.{}", surface.key()),
            Self::Measurement(key) => write!(f, "{key}"),
            Self::PaintPrice(category) => write!(f, "paint_price.{}", category.key()),
            Self::LaborRate(surface) => write!(f, "labor_rate.{}", surface.key()),
            Self::MarkupPct => f.write_str("markup_pct"),
            Self::TaxRatePct => f.write_str("tax_rate_pct"),
            Self::PaintBrand => f.write_str("paint.brand"),
            Self::PaintFinish => f.write_str("paint.finish"),
        }
    }
}

impl Serialize for RequiredField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Gap {
    pub field: RequiredField,
    pub reason: GapReason,
    pub stage: ConversationStage,
    pub prompt: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClarificationQuestion {
    pub missing_field: RequiredField,
    pub prompt_text: String,
    pub priority_order: u32,
    pub reason: GapReason,
    pub required: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CompletenessReport {
    pub missing_fields: Vec<RequiredField>,
    pub confidence: Confidence,
    pub clarification_questions: Vec<ClarificationQuestion>,
    pub ready_for_calculation: bool,
    pub gaps: Vec<Gap>,
    /// Required inputs satisfied only by the company rate schedule.
    pub defaulted: Vec<RequiredField>,
}

impl CompletenessReport {
    /// First required question; optional solicitations never qualify.
    pub fn next_question(&self) -> Option<&ClarificationQuestion> {
        self.clarification_questions.iter().find(|question| question.required)
    }

    pub fn blocked_stages(&self) -> BTreeSet<ConversationStage> {
        self.gaps.iter().map(|gap| gap.stage).collect()
    }

    pub fn stage_is_blocked(&self, stage: ConversationStage) -> bool {
        self.gaps.iter().any(|gap| gap.stage == stage)
    }

    pub fn calculation_permit(&self) -> Result<(), DomainError> {
        if self.ready_for_calculation {
            return Ok(());
        }
        Err(DomainError::CalculationPrecondition {
            missing_fields: self.missing_fields.iter().map(ToString::to_string).collect(),
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct CompletenessEvaluator {
    resolver: QuantityResolver,
}

impl CompletenessEvaluator {
    pub fn new(resolver: QuantityResolver) -> Self {
        Self { resolver }
    }

    pub fn evaluate(&self, project: &ProjectData, schedule: &RateSchedule) -> CompletenessReport {
        let mut scan = Scan::default();
        let selected = project.selected_surfaces();

        self.customer_info(project, &mut scan);
        self.project_type(project, &selected, &mut scan);
        self.measurements(project, schedule, &selected, &mut scan);
        self.paint_selection(project, schedule, &selected, &mut scan);
        self.rate_confirmation(project, schedule, &selected, &mut scan);

        let confidence = if scan.gaps.iter().any(|gap| gap.reason.is_blocking_hard()) {
            Confidence::Low
        } else if !scan.gaps.is_empty() || !scan.defaulted.is_empty() {
            Confidence::Medium
        } else {
            Confidence::High
        };

        let mut questions = Vec::new();
        for stage in ConversationStage::DATA {
            let required = scan.gaps.iter().filter(|gap| gap.stage == stage).map(|gap| {
                (gap.field, gap.prompt.clone(), gap.reason, true)
            });
            let optional = scan
                .optional
                .iter()
                .filter(|(field, _)| field.stage() == stage)
                .map(|(field, prompt)| (*field, prompt.clone(), GapReason::Missing, false));
            for (field, prompt_text, reason, is_required) in required.chain(optional) {
                questions.push(ClarificationQuestion {
                    missing_field: field,
                    prompt_text,
                    priority_order: questions.len() as u32 + 1,
                    reason,
                    required: is_required,
                });
            }
        }

        let mut missing_fields = Vec::new();
        for gap in &scan.gaps {
            if !missing_fields.contains(&gap.field) {
                missing_fields.push(gap.field);
            }
        }

        let report = CompletenessReport {
            missing_fields,
            confidence,
            ready_for_calculation: scan.gaps.is_empty(),
            clarification_questions: questions,
            gaps: scan.gaps,
            defaulted: scan.defaulted,
        };

        tracing::debug!(
            event_name = "completeness.evaluated",
            confidence = report.confidence.label(),
            gaps = report.gaps.len(),
            ready = report.ready_for_calculation,
            "completeness evaluated"
        );
        report
    }

    fn customer_info(&self, project: &ProjectData, scan: &mut Scan) {
        match &project.customer_name {
            None => scan.gap(RequiredField::CustomerName, GapReason::Missing, "What is the customer's name?"),
            Some(name) if !name.is_trusted() => scan.gap(
                RequiredField::CustomerName,
                GapReason::LowConfidence,
                format!("I have the customer's name as {}. Is that right?", name.value),
            ),
            Some(_) => {}
        }
        match &project.address {
            None => scan.gap(
                RequiredField::Address,
                GapReason::Missing,
                "What is the address of the property?",
            ),
            Some(address) if !address.is_trusted() => scan.gap(
                RequiredField::Address,
                GapReason::LowConfidence,
                format!("Is the property at {}?", address.value),
            ),
            Some(_) => {}
        }
    }

    fn project_type(&self, project: &ProjectData, selected: &[Surface], scan: &mut Scan) {
        if selected.is_empty() {
            let prompt = if project.project_type.is_none() {
                "Which surfaces are we painting (walls, ceilings, trim, doors, cabinets), and is the job interior or exterior?"
            } else {
                "Which surfaces are we painting: walls, ceilings, trim, doors or cabinets?"
            };
            scan.gap(RequiredField::Surfaces, GapReason::Missing, prompt);
            return;
        }

        let unsure: Vec<&str> = selected
            .iter()
            .filter(|surface| {
                project.surface_selection(**surface).is_some_and(|selection| !selection.is_trusted())
            })
            .map(|surface| surface.key())
            .collect();
        if !unsure.is_empty() {
            scan.gap(
                RequiredField::Surfaces,
                GapReason::LowConfidence,
                format!("Just to confirm, we are painting the {}?", unsure.join(" and ")),
            );
        }
    }

    fn measurements(
        &self,
        project: &ProjectData,
        schedule: &RateSchedule,
        selected: &[Surface],
        scan: &mut Scan,
    ) {
        let measurements = &project.measurements;

        if let Err(ResolutionError::InvalidMeasurement { field, value }) =
            self.resolver.validate_measurements(measurements)
        {
            scan.gap(
                RequiredField::Measurement(field),
                GapReason::Invalid,
                format!(
                    "{} came through as {value}, but it has to be greater than zero. What is the correct value?",
                    measurement_label(field)
                ),
            );
            return;
        }

        if let Err(ResolutionError::AmbiguousMeasurement { stated_sqft, derived_sqft, .. }) =
            self.resolver.wall_area(measurements)
        {
            scan.gap(
                RequiredField::Quantity(Surface::Walls),
                GapReason::Ambiguous,
                format!(
                    "The walls were given as {stated_sqft} sqft, but the length and height work out to {derived_sqft} sqft. Which should I use?"
                ),
            );
        }

        if selected.is_empty() {
            if !has_wall_area_measurement(project) {
                scan.gap(
                    RequiredField::Measurements,
                    GapReason::Missing,
                    "What are the measurements? Square footage, or linear feet of wall and the ceiling height, both work.",
                );
            }
            return;
        }

        for surface in selected {
            if *surface == Surface::Walls && scan.has(RequiredField::Quantity(Surface::Walls)) {
                continue;
            }
            match self.resolver.surface_quantity(project, schedule, *surface) {
                Ok(Some(_)) => {
                    for (key, confidence) in quantity_sources(project, *surface) {
                        if confidence < Confidence::Medium {
                            scan.gap(
                                RequiredField::Measurement(key),
                                GapReason::LowConfidence,
                                format!(
                                    "Can you confirm the {}?",
                                    measurement_label(key).to_ascii_lowercase()
                                ),
                            );
                        }
                    }
                }
                Ok(None) => scan.gap(
                    RequiredField::Quantity(*surface),
                    GapReason::Missing,
                    quantity_prompt(project, *surface),
                ),
                Err(_) => {}
            }
        }

        if let Err(ResolutionError::Overflow { field }) = self.resolver.resolve(project, schedule) {
            scan.gap(
                RequiredField::Measurement(field),
                GapReason::Invalid,
                format!(
                    "{} is too large to work with. What is the correct value?",
                    measurement_label(field)
                ),
            );
        }
    }

    fn paint_selection(
        &self,
        project: &ProjectData,
        schedule: &RateSchedule,
        selected: &[Surface],
        scan: &mut Scan,
    ) {
        if let Err(ResolutionError::InvalidMeasurement { field, value }) = self.resolver.coats(project) {
            scan.gap(
                RequiredField::Measurement(field),
                GapReason::Invalid,
                format!("{value} coats will not cover anything. How many coats should I plan for?"),
            );
        }

        let categories: BTreeSet<PaintCategory> =
            selected.iter().map(|surface| surface.paint_category()).collect();
        for category in categories {
            if let Err(ResolutionError::InvalidMeasurement { value, .. }) =
                self.resolver.coverage_for(project, schedule, category)
            {
                if !scan.has(RequiredField::Measurement(FieldKey::PaintCoverage)) {
                    scan.gap(
                        RequiredField::Measurement(FieldKey::PaintCoverage),
                        GapReason::Invalid,
                        format!(
                            "A coverage of {value} sqft per gallon is not possible. What does the paint cover per gallon?"
                        ),
                    );
                }
            }

            match self.resolver.price_for(project, schedule, category) {
                None => scan.gap(
                    RequiredField::PaintPrice(category),
                    GapReason::Missing,
                    format!("What does the {} paint cost per gallon?", category_label(category)),
                ),
                Some((price, _)) if price < Decimal::ZERO => scan.gap(
                    RequiredField::PaintPrice(category),
                    GapReason::Invalid,
                    format!(
                        "A paint price of ${price} per gallon cannot be negative. What does the {} paint cost?",
                        category_label(category)
                    ),
                ),
                Some((price, ValueSource::Conversation)) => {
                    if project.paint.price_per_gallon.as_ref().is_some_and(|f| !f.is_trusted()) {
                        scan.gap(
                            RequiredField::PaintPrice(category),
                            GapReason::LowConfidence,
                            format!("Is the paint ${price} per gallon?"),
                        );
                    }
                }
                Some(_) => scan.defaulted.push(RequiredField::PaintPrice(category)),
            }
        }

        if project.paint.brand.is_none() {
            scan.optional.push((
                RequiredField::PaintBrand,
                "Is there a paint brand the customer prefers?".to_owned(),
            ));
        }
        if project.paint.finish.is_none() {
            scan.optional.push((
                RequiredField::PaintFinish,
                "Which finish would they like: flat, eggshell, satin or semi-gloss?".to_owned(),
            ));
        }
    }

    fn rate_confirmation(
        &self,
        project: &ProjectData,
        schedule: &RateSchedule,
        selected: &[Surface],
        scan: &mut Scan,
    ) {
        for surface in selected {
            let field = RequiredField::LaborRate(*surface);
            match project.labor_rates.get(surface) {
                Some(rate) if labor_rate_is_negative(&rate.value) => scan.gap(
                    field,
                    GapReason::Invalid,
                    format!(
                        "A labor rate of {} for the {surface} cannot be negative. What should I charge?",
                        rate.value
                    ),
                ),
                Some(rate) if !rate.is_trusted() => scan.gap(
                    field,
                    GapReason::LowConfidence,
                    format!("Is labor for the {surface} {}?", rate.value),
                ),
                Some(_) => {}
                None if schedule.labor_rates.for_surface(*surface).is_some() => {
                    scan.defaulted.push(field);
                }
                None => scan.gap(
                    field,
                    GapReason::Missing,
                    format!(
                        "What is the labor rate for the {surface}? A rate per {} or hours at an hourly rate both work.",
                        unit_word(*surface)
                    ),
                ),
            }
        }

        percentage_gap(&project.markup_pct, RequiredField::MarkupPct, "markup", scan);
        percentage_gap(&project.tax_rate_pct, RequiredField::TaxRatePct, "tax rate", scan);
    }
}

#[derive(Default)]
struct Scan {
    gaps: Vec<Gap>,
    optional: Vec<(RequiredField, String)>,
    defaulted: Vec<RequiredField>,
}

impl Scan {
    fn gap(&mut self, field: RequiredField, reason: GapReason, prompt: impl Into<String>) {
        self.gaps.push(Gap { field, reason, stage: field.stage(), prompt: prompt.into() });
    }

    fn has(&self, field: RequiredField) -> bool {
        self.gaps.iter().any(|gap| gap.field == field)
    }
}

fn percentage_gap(
    slot: &Option<ExtractedField<Decimal>>,
    field: RequiredField,
    label: &str,
    scan: &mut Scan,
) {
    let Some(pct) = slot else {
        return;
    };
    if pct.value < Decimal::ZERO || pct.value > Decimal::ONE_HUNDRED {
        scan.gap(
            field,
            GapReason::Invalid,
            format!("A {label} of {}% is outside 0-100%. What {label} should I use?", pct.value),
        );
    } else if !pct.is_trusted() {
        scan.gap(
            field,
            GapReason::LowConfidence,
            format!("Is the {label} {}%?", pct.value),
        );
    }
}

fn labor_rate_is_negative(rate: &LaborRate) -> bool {
    match rate {
        LaborRate::PerUnit { rate } => *rate < Decimal::ZERO,
        LaborRate::Hourly { hours, hourly_rate } => {
            *hours < Decimal::ZERO || *hourly_rate < Decimal::ZERO
        }
    }
}

/// Square footage, or wall length together with height.
fn has_wall_area_measurement(project: &ProjectData) -> bool {
    let m = &project.measurements;
    m.square_feet.is_some() || (m.linear_feet.is_some() && m.ceiling_height.is_some())
}

/// Raw fields a surface's quantity is read from, with their confidence.
fn quantity_sources(project: &ProjectData, surface: Surface) -> Vec<(FieldKey, Confidence)> {
    let m = &project.measurements;
    let sources = match surface {
        Surface::Walls => match (&m.linear_feet, &m.ceiling_height) {
            (Some(length), Some(height)) => vec![
                (FieldKey::LinearFeet, Some(length.confidence)),
                (FieldKey::CeilingHeight, Some(height.confidence)),
            ],
            _ => vec![(FieldKey::SquareFeet, m.square_feet.as_ref().map(|f| f.confidence))],
        },
        Surface::Ceilings => {
            vec![(FieldKey::CeilingSquareFeet, m.ceiling_square_feet.as_ref().map(|f| f.confidence))]
        }
        Surface::Trim => {
            vec![(FieldKey::TrimLinearFeet, m.trim_linear_feet.as_ref().map(|f| f.confidence))]
        }
        Surface::Doors => vec![(FieldKey::DoorCount, m.door_count.as_ref().map(|f| f.confidence))],
        Surface::Cabinets => {
            vec![(FieldKey::CabinetCount, m.cabinet_count.as_ref().map(|f| f.confidence))]
        }
    };
    sources.into_iter().filter_map(|(key, confidence)| confidence.map(|c| (key, c))).collect()
}

fn quantity_prompt(project: &ProjectData, surface: Surface) -> String {
    let m = &project.measurements;
    match surface {
        Surface::Walls if m.linear_feet.is_some() => "How tall are the walls?".to_owned(),
        Surface::Walls if m.ceiling_height.is_some() => {
            "How many linear feet of wall are there, or what is the total wall square footage?"
                .to_owned()
        }
        Surface::Walls => {
            "How many square feet of wall are we painting? Linear feet plus wall height also works."
                .to_owned()
        }
        Surface::Ceilings => "How many square feet of ceiling are we painting?".to_owned(),
        Surface::Trim => "How many linear feet of trim are there?".to_owned(),
        Surface::Doors => "How many doors are we painting?".to_owned(),
        Surface::Cabinets => "How many cabinets are we painting?".to_owned(),
    }
}

fn measurement_label(key: FieldKey) -> &'static str {
    match key {
        FieldKey::LinearFeet => "The wall length",
        FieldKey::CeilingHeight => "The wall height",
        FieldKey::SquareFeet => "The wall area",
        FieldKey::CeilingSquareFeet => "The ceiling area",
        FieldKey::TrimLinearFeet => "The trim length",
        FieldKey::DoorCount => "The door count",
        FieldKey::CabinetCount => "The cabinet count",
        FieldKey::RoomCount => "The room count",
        FieldKey::PaintCoverage => "The paint coverage",
        FieldKey::PaintCoats => "The number of coats",
        _ => "That measurement",
    }
}

fn category_label(category: PaintCategory) -> &'static str {
    match category {
        PaintCategory::Wall => "wall",
        PaintCategory::Ceiling => "ceiling",
        PaintCategory::Trim => "trim",
    }
}

fn unit_word(surface: Surface) -> &'static str {
    match surface {
        Surface::Walls | Surface::Ceilings => "square foot",
        Surface::Trim => "linear foot",
        Surface::Doors => "door",
        Surface::Cabinets => "cabinet",
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::domain::field::{Confidence, ExtractedField, FieldKey};
    use crate::domain::project::{LaborRate, PaintCategory, ProjectData, Surface};
    use crate::domain::rates::RateSchedule;
    use crate::errors::DomainError;
    use crate::flows::ConversationStage;

    use super::{CompletenessEvaluator, GapReason, RequiredField};

    fn high<T>(value: T) -> Option<ExtractedField<T>> {
        Some(ExtractedField::matched(value, 3, 0))
    }

    fn complete_project() -> ProjectData {
        let mut project = ProjectData::new();
        project.customer_name = high("Cici Zhang".to_owned());
        project.address = high("412 Maple Ave".to_owned());
        project.surfaces.insert(Surface::Walls, ExtractedField::matched(true, 3, 0));
        project.measurements.linear_feet = high(Decimal::new(500, 0));
        project.measurements.ceiling_height = high(Decimal::new(9, 0));
        project.paint.price_per_gallon = high(Decimal::new(50, 0));
        project.labor_rates.insert(
            Surface::Walls,
            ExtractedField::matched(LaborRate::PerUnit { rate: Decimal::new(150, 2) }, 3, 0),
        );
        project
    }

    #[test]
    fn empty_project_asks_in_stage_order() {
        let report = CompletenessEvaluator::default().evaluate(&ProjectData::new(), &RateSchedule::default());

        assert_eq!(report.confidence, Confidence::Low);
        assert!(!report.ready_for_calculation);
        let fields: Vec<RequiredField> =
            report.clarification_questions.iter().map(|q| q.missing_field).collect();
        assert_eq!(
            fields,
            vec![
                RequiredField::CustomerName,
                RequiredField::Address,
                RequiredField::Surfaces,
                RequiredField::Measurements,
                RequiredField::PaintBrand,
                RequiredField::PaintFinish,
            ]
        );
        let orders: Vec<u32> =
            report.clarification_questions.iter().map(|q| q.priority_order).collect();
        assert_eq!(orders, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(
            report.next_question().map(|q| q.missing_field),
            Some(RequiredField::CustomerName)
        );
    }

    #[test]
    fn complete_explicit_project_is_high_confidence_and_ready() {
        let mut project = complete_project();
        project.paint.brand = high("Sherwin-Williams".to_owned());
        let report = CompletenessEvaluator::default().evaluate(&project, &RateSchedule::default());

        assert!(report.ready_for_calculation);
        assert_eq!(report.confidence, Confidence::High);
        assert!(report.missing_fields.is_empty());
        assert!(report.calculation_permit().is_ok());
        assert!(report.next_question().is_none());
        let optional: Vec<RequiredField> =
            report.clarification_questions.iter().map(|q| q.missing_field).collect();
        assert_eq!(optional, vec![RequiredField::PaintFinish]);
        assert!(report.clarification_questions.iter().all(|q| !q.required));
    }

    #[test]
    fn schedule_defaults_satisfy_rates_at_medium_confidence() {
        let mut project = complete_project();
        project.labor_rates.clear();
        project.paint.price_per_gallon = None;
        let mut schedule = RateSchedule::default();
        schedule.labor_rates.walls = Some(Decimal::new(125, 2));
        schedule.paint_products.wall = Some(crate::domain::rates::PaintProduct {
            name: "House flat".to_owned(),
            brand: None,
            price_per_gallon: Decimal::new(38, 0),
            coverage_sqft_per_gallon: None,
        });

        let report = CompletenessEvaluator::default().evaluate(&project, &schedule);

        assert!(report.ready_for_calculation);
        assert_eq!(report.confidence, Confidence::Medium);
        assert_eq!(
            report.defaulted,
            vec![
                RequiredField::PaintPrice(PaintCategory::Wall),
                RequiredField::LaborRate(Surface::Walls)
            ]
        );
    }

    #[test]
    fn low_confidence_name_needs_confirmation_and_blocks() {
        let mut project = complete_project();
        project.customer_name = Some(ExtractedField::matched("Maple Ave".to_owned(), 1, 0));

        let report = CompletenessEvaluator::default().evaluate(&project, &RateSchedule::default());

        assert_eq!(report.confidence, Confidence::Medium);
        assert!(!report.ready_for_calculation);
        let question = report.next_question().expect("confirmation question");
        assert_eq!(question.reason, GapReason::LowConfidence);
        assert!(question.prompt_text.contains("Maple Ave"));
        assert!(report.stage_is_blocked(ConversationStage::CustomerInfo));
    }

    #[test]
    fn ambiguous_wall_area_becomes_a_question() {
        let mut project = complete_project();
        project.measurements.square_feet = high(Decimal::new(3000, 0));

        let report = CompletenessEvaluator::default().evaluate(&project, &RateSchedule::default());

        assert_eq!(report.confidence, Confidence::Low);
        let question = report.next_question().expect("ambiguity question");
        assert_eq!(question.missing_field, RequiredField::Quantity(Surface::Walls));
        assert_eq!(question.reason, GapReason::Ambiguous);
        assert!(question.prompt_text.contains("3000"));
        assert!(question.prompt_text.contains("4500"));
    }

    #[test]
    fn negative_measurement_is_invalid_not_clamped() {
        let mut project = complete_project();
        project.measurements.linear_feet = high(Decimal::new(-500, 0));

        let report = CompletenessEvaluator::default().evaluate(&project, &RateSchedule::default());

        let question = report.next_question().expect("invalid question");
        assert_eq!(question.missing_field, RequiredField::Measurement(FieldKey::LinearFeet));
        assert_eq!(question.reason, GapReason::Invalid);
        assert!(matches!(
            report.calculation_permit(),
            Err(DomainError::CalculationPrecondition { ref missing_fields })
                if missing_fields == &vec!["measurements.linear_feet".to_owned()]
        ));
    }

    #[test]
    fn trim_and_door_counts_alone_do_not_satisfy_the_area_gate() {
        let mut project = ProjectData::new();
        project.customer_name = high("Cici Zhang".to_owned());
        project.address = high("412 Maple Ave".to_owned());
        project.measurements.trim_linear_feet = high(Decimal::new(180, 0));
        project.measurements.door_count = high(3);
        project.measurements.ceiling_height = high(Decimal::new(9, 0));

        let report = CompletenessEvaluator::default().evaluate(&project, &RateSchedule::default());
        assert!(report.missing_fields.contains(&RequiredField::Measurements));

        project.measurements.linear_feet = high(Decimal::new(500, 0));
        let report = CompletenessEvaluator::default().evaluate(&project, &RateSchedule::default());
        assert!(!report.missing_fields.contains(&RequiredField::Measurements));
    }

    #[test]
    fn oversized_wall_length_becomes_an_invalid_measurement_question() {
        let mut project = complete_project();
        project.measurements.linear_feet = high(Decimal::new(9_000_000_000_000_000, 0));
        project.measurements.ceiling_height = high(Decimal::new(9_000_000_000_000_000, 0));

        let report = CompletenessEvaluator::default().evaluate(&project, &RateSchedule::default());

        assert!(!report.ready_for_calculation);
        assert_eq!(report.confidence, Confidence::Low);
        let question = report
            .clarification_questions
            .iter()
            .find(|q| q.missing_field == RequiredField::Measurement(FieldKey::LinearFeet))
            .expect("overflow surfaces as a question");
        assert_eq!(question.reason, GapReason::Invalid);
        assert!(question.prompt_text.starts_with("The wall length is too large"));
    }

    #[test]
    fn missing_height_asks_for_height_and_each_surface_needs_a_rate() {
        let mut project = complete_project();
        project.measurements.ceiling_height = None;
        project.surfaces.insert(Surface::Trim, ExtractedField::matched(true, 3, 0));
        project.measurements.trim_linear_feet = high(Decimal::new(180, 0));

        let report = CompletenessEvaluator::default().evaluate(&project, &RateSchedule::default());

        assert_eq!(
            report.missing_fields,
            vec![RequiredField::Quantity(Surface::Walls), RequiredField::LaborRate(Surface::Trim)]
        );
        assert_eq!(
            report.next_question().map(|q| q.prompt_text.as_str()),
            Some("How tall are the walls?")
        );
        assert!(report.stage_is_blocked(ConversationStage::Measurements));
        assert!(report.stage_is_blocked(ConversationStage::RateConfirmation));
        // the stated $50 also prices the trim paint when no product is configured
        assert!(!report.stage_is_blocked(ConversationStage::PaintSelection));
    }

    #[test]
    fn out_of_range_markup_is_an_invalid_rate_question() {
        let mut project = complete_project();
        project.markup_pct = high(Decimal::new(150, 0));

        let report = CompletenessEvaluator::default().evaluate(&project, &RateSchedule::default());

        assert_eq!(report.missing_fields, vec![RequiredField::MarkupPct]);
        assert_eq!(report.gaps[0].reason, GapReason::Invalid);
        assert_eq!(report.gaps[0].stage, ConversationStage::RateConfirmation);
    }
}
