use paintquote_core::domain::field::{Confidence, ExtractedField, FieldKey};
use paintquote_core::domain::project::ProjectData;

/// Highest priority a model-sourced field may carry.
const MODEL_PRIORITY_CAP: u8 = 2;

/// Limits on what model output may contribute to a project. The model
/// reads; it never decides money.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractionGuardrails {
    /// Lets model output carry prices, labor rates, markup and tax.
    pub model_can_set_rates: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardrailReport {
    pub project: ProjectData,
    /// Fields removed because the model may not set them.
    pub stripped: Vec<FieldKey>,
}

impl ExtractionGuardrails {
    pub fn new(model_can_set_rates: bool) -> Self {
        Self { model_can_set_rates }
    }

    pub fn apply(&self, mut project: ProjectData) -> GuardrailReport {
        let mut stripped = Vec::new();
        if !self.model_can_set_rates {
            for (surface, _) in std::mem::take(&mut project.labor_rates) {
                stripped.push(FieldKey::LaborRate(surface));
            }
            if project.paint.price_per_gallon.take().is_some() {
                stripped.push(FieldKey::PaintPricePerGallon);
            }
            if project.markup_pct.take().is_some() {
                stripped.push(FieldKey::MarkupPct);
            }
            if project.tax_rate_pct.take().is_some() {
                stripped.push(FieldKey::TaxRatePct);
            }
        }

        cap_all(&mut project);

        if !stripped.is_empty() {
            tracing::warn!(
                event_name = "agent.guardrail_stripped",
                fields = ?stripped.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "model output tried to set rates"
            );
        }
        GuardrailReport { project, stripped }
    }
}

fn cap<T>(slot: &mut Option<ExtractedField<T>>) {
    if let Some(field) = slot {
        cap_field(field);
    }
}

fn cap_field<T>(field: &mut ExtractedField<T>) {
    field.priority = field.priority.min(MODEL_PRIORITY_CAP);
    field.confidence = field.confidence.min(Confidence::Medium);
}

fn cap_all(project: &mut ProjectData) {
    cap(&mut project.customer_name);
    cap(&mut project.address);
    cap(&mut project.project_type);
    project.surfaces.values_mut().for_each(cap_field);

    let measurements = &mut project.measurements;
    cap(&mut measurements.linear_feet);
    cap(&mut measurements.ceiling_height);
    cap(&mut measurements.square_feet);
    cap(&mut measurements.ceiling_square_feet);
    cap(&mut measurements.trim_linear_feet);
    cap(&mut measurements.door_count);
    cap(&mut measurements.cabinet_count);
    cap(&mut measurements.room_count);

    let paint = &mut project.paint;
    cap(&mut paint.brand);
    cap(&mut paint.finish);
    cap(&mut paint.price_per_gallon);
    cap(&mut paint.coverage_sqft_per_gallon);
    cap(&mut paint.coats);

    project.labor_rates.values_mut().for_each(cap_field);
    cap(&mut project.markup_pct);
    cap(&mut project.tax_rate_pct);
    cap(&mut project.timeline);
}

#[cfg(test)]
mod tests {
    use paintquote_core::domain::field::{Confidence, ExtractedField, FieldKey};
    use paintquote_core::domain::project::{LaborRate, ProjectData, Surface};
    use rust_decimal::Decimal;

    use super::ExtractionGuardrails;

    fn confident_project() -> ProjectData {
        let mut project = ProjectData::new();
        project.customer_name =
            Some(ExtractedField::new("Cici Zhang".to_owned(), Confidence::High, 0, 4));
        project.paint.price_per_gallon =
            Some(ExtractedField::new(Decimal::new(50, 0), Confidence::High, 0, 3));
        project.labor_rates.insert(
            Surface::Walls,
            ExtractedField::new(LaborRate::PerUnit { rate: Decimal::new(150, 2) }, Confidence::High, 0, 3),
        );
        project.markup_pct = Some(ExtractedField::new(Decimal::new(20, 0), Confidence::High, 0, 3));
        project
    }

    #[test]
    fn rates_are_stripped_by_default() {
        let report = ExtractionGuardrails::default().apply(confident_project());

        assert!(report.project.labor_rates.is_empty());
        assert!(report.project.paint.price_per_gallon.is_none());
        assert!(report.project.markup_pct.is_none());
        assert_eq!(
            report.stripped,
            vec![FieldKey::LaborRate(Surface::Walls), FieldKey::PaintPricePerGallon, FieldKey::MarkupPct]
        );
    }

    #[test]
    fn confidence_is_capped_at_medium() {
        let report = ExtractionGuardrails::new(true).apply(confident_project());

        let name = report.project.customer_name.expect("name kept");
        assert_eq!(name.confidence, Confidence::Medium);
        assert_eq!(name.priority, 2);
        let rate = report.project.labor_rates.get(&Surface::Walls).expect("rate kept");
        assert_eq!(rate.confidence, Confidence::Medium);
        assert!(report.stripped.is_empty());
    }
}
