//! Deterministic pricing of a resolved painting project.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::domain::field::ExtractedField;
use crate::domain::project::{LaborRate, ProjectData, Surface};
use crate::domain::quote::{CalculatedQuote, LineItemCategory, PaintRequirement, QuoteLineItem};
use crate::domain::rates::{percentage, OverheadRule, RateSchedule};
use crate::errors::PricingError;
use crate::quantity::{QuantityResolver, ResolvedQuantities, SurfaceQuantity};

#[derive(Clone, Debug, Default)]
pub struct PricingCalculator {
    resolver: QuantityResolver,
}

impl PricingCalculator {
    pub fn new(resolver: QuantityResolver) -> Self {
        Self { resolver }
    }

    /// Prices the project. Arithmetic stays exact until the final price is
    /// rounded to cents; a rounding line keeps the items summing to it.
    pub fn calculate(
        &self,
        project: &ProjectData,
        schedule: &RateSchedule,
    ) -> Result<CalculatedQuote, PricingError> {
        schedule.validate()?;

        if project.selected_surfaces().is_empty() {
            return Err(PricingError::MissingInput { field: "surfaces".to_owned() });
        }
        let resolved = self.resolver.resolve(project, schedule)?;

        let mut line_items = Vec::new();
        let (paint, materials_cost) = materials(&resolved, &mut line_items)?;
        let labor_cost = labor(project, schedule, &resolved, &mut line_items)?;
        let direct_cost = add("direct cost", materials_cost, labor_cost)?;
        let overhead_cost = overhead(project, schedule, direct_cost, &mut line_items)?;
        let subtotal = add("subtotal", direct_cost, overhead_cost)?;

        let markup_pct = effective_pct(&project.markup_pct, schedule.markup_pct, "markup_pct")?;
        let markup_amount = share("markup", subtotal, markup_pct)?;
        if !markup_amount.is_zero() {
            line_items.push(QuoteLineItem::lump(
                LineItemCategory::Markup,
                format!("Markup {markup_pct}%"),
                markup_amount,
            ));
        }

        let tax_rate_pct =
            effective_pct(&project.tax_rate_pct, schedule.tax_rate_pct, "tax_rate_pct")?;
        let tax_base = if schedule.tax_on_materials_only {
            materials_cost
        } else {
            add("taxable amount", subtotal, markup_amount)?
        };
        let tax_amount = share("tax", tax_base, tax_rate_pct)?;
        if !tax_amount.is_zero() {
            let base = if schedule.tax_on_materials_only { "materials" } else { "subtotal and markup" };
            line_items.push(QuoteLineItem::lump(
                LineItemCategory::Tax,
                format!("Tax {tax_rate_pct}% on {base}"),
                tax_amount,
            ));
        }

        let exact_total = add("final price", subtotal, markup_amount)
            .and_then(|total| add("final price", total, tax_amount))?;
        let final_price =
            exact_total.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let rounding = final_price - exact_total;
        if !rounding.is_zero() {
            line_items.push(QuoteLineItem::lump(
                LineItemCategory::Rounding,
                "Rounding to the cent",
                rounding,
            ));
        }

        let quote = CalculatedQuote {
            paint_gallons: resolved
                .total_gallons()
                .ok_or_else(|| PricingError::Overflow { step: "paint gallons".to_owned() })?,
            paint,
            materials_cost,
            labor_cost,
            overhead_cost,
            subtotal,
            markup_pct,
            markup_amount,
            tax_rate_pct,
            tax_on_materials_only: schedule.tax_on_materials_only,
            tax_amount,
            final_price,
            line_items,
        };

        tracing::info!(
            event_name = "pricing.quote_calculated",
            gallons = %quote.paint_gallons,
            subtotal = %quote.subtotal,
            final_price = %quote.final_price,
            line_items = quote.line_items.len(),
            "quote calculated"
        );
        Ok(quote)
    }
}

fn materials(
    resolved: &ResolvedQuantities,
    line_items: &mut Vec<QuoteLineItem>,
) -> Result<(Vec<PaintRequirement>, Decimal), PricingError> {
    let mut paint = Vec::with_capacity(resolved.paint.len());
    let mut total = Decimal::ZERO;

    for category in &resolved.paint {
        let (price_per_gallon, _) = category.price_per_gallon.ok_or_else(|| {
            PricingError::MissingInput {
                field: format!("paint.price_per_gallon.{}", category.category.key()),
            }
        })?;
        if price_per_gallon < Decimal::ZERO {
            return Err(PricingError::InvalidRate {
                field: "paint.price_per_gallon".to_owned(),
                value: price_per_gallon,
                reason: "must not be negative".to_owned(),
            });
        }

        let cost = mul("materials", category.gallons, price_per_gallon)?;
        total = add("materials", total, cost)?;
        line_items.push(QuoteLineItem {
            category: LineItemCategory::Materials,
            description: format!(
                "{} ({} gal, {} coats over {} sqft)",
                category.category.key().replace('_', " "),
                category.gallons,
                category.coats,
                category.area_sqft
            ),
            surface: None,
            quantity: Some(category.gallons),
            unit: Some("gal".to_owned()),
            unit_price: Some(price_per_gallon),
            amount: cost,
        });
        paint.push(PaintRequirement {
            category: category.category,
            surfaces: category.surfaces.clone(),
            area_sqft: category.area_sqft,
            coats: category.coats,
            coverage_sqft_per_gallon: category.coverage_sqft_per_gallon,
            gallons: category.gallons,
            price_per_gallon,
            cost,
        });
    }

    Ok((paint, total))
}

fn labor(
    project: &ProjectData,
    schedule: &RateSchedule,
    resolved: &ResolvedQuantities,
    line_items: &mut Vec<QuoteLineItem>,
) -> Result<Decimal, PricingError> {
    let mut total = Decimal::ZERO;

    for quantity in &resolved.surfaces {
        let surface = quantity.surface;
        let rate = match project.labor_rates.get(&surface) {
            Some(field) => field.value,
            None => schedule
                .labor_rates
                .for_surface(surface)
                .map(|rate| LaborRate::PerUnit { rate })
                .ok_or_else(|| PricingError::MissingInput {
                    field: format!("labor_rate.{}", surface.key()),
                })?,
        };

        let item = labor_line(quantity, rate)?;
        total = add("labor", total, item.amount)?;
        line_items.push(item);
    }

    Ok(total)
}

fn labor_line(quantity: &SurfaceQuantity, rate: LaborRate) -> Result<QuoteLineItem, PricingError> {
    let surface = quantity.surface;
    let field = |suffix: &str| format!("labor_rate.{}{suffix}", surface.key());
    let unit = surface.unit().label();

    match rate {
        LaborRate::PerUnit { rate } => {
            reject_negative(field(""), rate)?;
            Ok(QuoteLineItem {
                category: LineItemCategory::Labor,
                description: format!("{} labor ({} {unit} at ${rate}/{unit})", title(surface), quantity.quantity),
                surface: Some(surface),
                quantity: Some(quantity.quantity),
                unit: Some(unit.to_owned()),
                unit_price: Some(rate),
                amount: mul("labor", quantity.quantity, rate)?,
            })
        }
        LaborRate::Hourly { hours, hourly_rate } => {
            reject_negative(field(".hours"), hours)?;
            reject_negative(field(".hourly_rate"), hourly_rate)?;
            Ok(QuoteLineItem {
                category: LineItemCategory::Labor,
                description: format!("{} labor ({hours} h at ${hourly_rate}/h)", title(surface)),
                surface: Some(surface),
                quantity: Some(hours),
                unit: Some("h".to_owned()),
                unit_price: Some(hourly_rate),
                amount: mul("labor", hours, hourly_rate)?,
            })
        }
    }
}

fn overhead(
    project: &ProjectData,
    schedule: &RateSchedule,
    direct_cost: Decimal,
    line_items: &mut Vec<QuoteLineItem>,
) -> Result<Decimal, PricingError> {
    let (category, description, amount) = match &schedule.overhead {
        Some(OverheadRule::Flat { amount }) => {
            (LineItemCategory::Overhead, "Overhead".to_owned(), *amount)
        }
        Some(OverheadRule::Percentage { pct }) => (
            LineItemCategory::Overhead,
            format!("Overhead {pct}% of materials and labor"),
            share("overhead", direct_cost, *pct)?,
        ),
        None => match &project.measurements.room_count {
            Some(ExtractedField { value: rooms, .. }) => (
                LineItemCategory::Sundries,
                format!("Sundries ({rooms} rooms at ${})", schedule.sundries.per_room),
                mul("sundries", schedule.sundries.per_room, Decimal::from(*rooms))?,
            ),
            None => (LineItemCategory::Sundries, "Sundries".to_owned(), schedule.sundries.per_job),
        },
    };

    if !amount.is_zero() {
        line_items.push(QuoteLineItem::lump(category, description, amount));
    }
    Ok(amount)
}

fn add(step: &str, left: Decimal, right: Decimal) -> Result<Decimal, PricingError> {
    left.checked_add(right).ok_or_else(|| PricingError::Overflow { step: step.to_owned() })
}

fn mul(step: &str, left: Decimal, right: Decimal) -> Result<Decimal, PricingError> {
    left.checked_mul(right).ok_or_else(|| PricingError::Overflow { step: step.to_owned() })
}

/// `pct` percent of `base`.
fn share(step: &str, base: Decimal, pct: Decimal) -> Result<Decimal, PricingError> {
    mul(step, base, pct)?
        .checked_div(Decimal::ONE_HUNDRED)
        .ok_or_else(|| PricingError::Overflow { step: step.to_owned() })
}

fn effective_pct(
    stated: &Option<ExtractedField<Decimal>>,
    fallback: Decimal,
    field: &str,
) -> Result<Decimal, PricingError> {
    let value = stated.as_ref().map_or(fallback, |stated| stated.value);
    percentage(field, value)?;
    Ok(value)
}

fn reject_negative(field: String, value: Decimal) -> Result<(), PricingError> {
    if value < Decimal::ZERO {
        return Err(PricingError::InvalidRate {
            field,
            value,
            reason: "must not be negative".to_owned(),
        });
    }
    Ok(())
}

fn title(surface: Surface) -> &'static str {
    match surface {
        Surface::Walls => "Walls",
        Surface::Ceilings => "Ceilings",
        Surface::Trim => "Trim",
        Surface::Doors => "Doors",
        Surface::Cabinets => "Cabinets",
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::domain::field::ExtractedField;
    use crate::domain::project::{LaborRate, PaintCategory, ProjectData, Surface};
    use crate::domain::quote::LineItemCategory;
    use crate::domain::rates::{OverheadRule, PaintProduct, RateSchedule};
    use crate::errors::{PricingError, ResolutionError};

    use super::PricingCalculator;

    fn high<T>(value: T) -> Option<ExtractedField<T>> {
        Some(ExtractedField::matched(value, 3, 0))
    }

    fn cici() -> ProjectData {
        let mut project = ProjectData::new();
        project.customer_name = high("Cici Zhang".to_owned());
        project.surfaces.insert(Surface::Walls, ExtractedField::matched(true, 3, 0));
        project.measurements.linear_feet = high(Decimal::new(500, 0));
        project.measurements.ceiling_height = high(Decimal::new(9, 0));
        project.paint.price_per_gallon = high(Decimal::new(50, 0));
        project.labor_rates.insert(
            Surface::Walls,
            ExtractedField::matched(LaborRate::PerUnit { rate: Decimal::new(150, 2) }, 3, 0),
        );
        project.markup_pct = high(Decimal::new(20, 0));
        project
    }

    fn no_overhead() -> RateSchedule {
        RateSchedule {
            overhead: Some(OverheadRule::Flat { amount: Decimal::ZERO }),
            ..RateSchedule::default()
        }
    }

    #[test]
    fn amounts_beyond_decimal_range_are_typed_errors() {
        let mut project = cici();
        project.labor_rates.insert(
            Surface::Walls,
            ExtractedField::matched(LaborRate::PerUnit { rate: Decimal::MAX }, 3, 0),
        );
        let error = PricingCalculator::default()
            .calculate(&project, &no_overhead())
            .expect_err("labor overflows");
        assert_eq!(error, PricingError::Overflow { step: "labor".to_owned() });

        let mut project = cici();
        project.paint.price_per_gallon = high(Decimal::MAX);
        let error = PricingCalculator::default()
            .calculate(&project, &no_overhead())
            .expect_err("materials overflow");
        assert_eq!(error, PricingError::Overflow { step: "materials".to_owned() });
    }

    #[test]
    fn cici_walls_only_quote() {
        let quote = PricingCalculator::default().calculate(&cici(), &no_overhead()).expect("priced");

        assert_eq!(quote.paint_gallons, Decimal::new(26, 0));
        assert_eq!(quote.materials_cost, Decimal::new(1300, 0));
        assert_eq!(quote.labor_cost, Decimal::new(6750, 0));
        assert_eq!(quote.subtotal, Decimal::new(8050, 0));
        assert_eq!(quote.markup_amount, Decimal::new(1610, 0));
        assert_eq!(quote.tax_amount, Decimal::ZERO);
        assert_eq!(quote.final_price, Decimal::new(9660, 0));
        assert_eq!(quote.final_price, quote.subtotal * Decimal::new(12, 1) + quote.tax_amount);
        assert_eq!(quote.line_item_total(), quote.final_price);
        assert_eq!(quote.gallons_for(PaintCategory::Wall), Some(Decimal::new(26, 0)));
    }

    #[test]
    fn tax_on_materials_only_and_rounding_line_keeps_items_exact() {
        let mut schedule = no_overhead();
        schedule.tax_rate_pct = Decimal::new(8375, 3);
        schedule.tax_on_materials_only = true;
        let mut project = cici();
        project.paint.price_per_gallon = high(Decimal::new(4999, 2));

        let quote = PricingCalculator::default().calculate(&project, &schedule).expect("priced");

        // 26 x 49.99 = 1299.74; tax 8.375% = 108.853225
        assert_eq!(quote.tax_amount, Decimal::new(108_853_225, 6));
        assert_eq!(quote.final_price.scale(), 2);
        assert_eq!(quote.line_item_total(), quote.final_price);
        assert!(quote
            .line_items
            .iter()
            .any(|item| item.category == LineItemCategory::Rounding));
    }

    #[test]
    fn tax_applies_to_subtotal_plus_markup_by_default() {
        let mut schedule = no_overhead();
        schedule.tax_rate_pct = Decimal::new(5, 0);

        let quote = PricingCalculator::default().calculate(&cici(), &schedule).expect("priced");

        assert_eq!(quote.tax_amount, Decimal::new(483, 0));
        assert_eq!(quote.final_price, Decimal::new(10143, 0));
    }

    #[test]
    fn markup_outside_range_is_invalid_rate() {
        let mut project = cici();
        project.markup_pct = high(Decimal::new(150, 0));

        let error = PricingCalculator::default()
            .calculate(&project, &no_overhead())
            .expect_err("markup must be rejected");

        assert_eq!(
            error,
            PricingError::InvalidRate {
                field: "markup_pct".to_owned(),
                value: Decimal::new(150, 0),
                reason: "must be between 0 and 100".to_owned(),
            }
        );
    }

    #[test]
    fn hourly_labor_and_schedule_defaults_combine() {
        let mut project = cici();
        project.surfaces.insert(Surface::Doors, ExtractedField::matched(true, 3, 0));
        project.measurements.door_count = high(6);
        project.labor_rates.insert(
            Surface::Walls,
            ExtractedField::matched(
                LaborRate::Hourly { hours: Decimal::new(40, 0), hourly_rate: Decimal::new(65, 0) },
                3,
                1,
            ),
        );
        let mut schedule = no_overhead();
        schedule.labor_rates.doors = Some(Decimal::new(85, 0));
        schedule.paint_products.trim = Some(PaintProduct {
            name: "Door enamel".to_owned(),
            brand: None,
            price_per_gallon: Decimal::new(70, 0),
            coverage_sqft_per_gallon: None,
        });

        let quote = PricingCalculator::default().calculate(&project, &schedule).expect("priced");

        // walls 40h x 65 = 2600; doors 6 x 85 = 510
        assert_eq!(quote.labor_cost, Decimal::new(3110, 0));
        // trim paint: 6 doors x 42 sqft x 2 coats / 350 -> 2 gal x 70
        assert_eq!(quote.gallons_for(PaintCategory::Trim), Some(Decimal::new(2, 0)));
        assert_eq!(quote.materials_cost, Decimal::new(1440, 0));
        assert_eq!(quote.line_item_total(), quote.final_price);
    }

    #[test]
    fn sundries_fallback_uses_room_count_when_known() {
        let mut project = cici();
        project.measurements.room_count = high(3);

        let quote =
            PricingCalculator::default().calculate(&project, &RateSchedule::default()).expect("priced");
        assert_eq!(quote.overhead_cost, Decimal::new(45, 0));

        let per_job = PricingCalculator::default()
            .calculate(&cici(), &RateSchedule::default())
            .expect("priced");
        assert_eq!(per_job.overhead_cost, Decimal::new(35, 0));
        assert!(per_job
            .line_items
            .iter()
            .any(|item| item.category == LineItemCategory::Sundries));
    }

    #[test]
    fn percentage_overhead_is_charged_on_direct_costs() {
        let schedule = RateSchedule {
            overhead: Some(OverheadRule::Percentage { pct: Decimal::new(10, 0) }),
            ..RateSchedule::default()
        };

        let quote = PricingCalculator::default().calculate(&cici(), &schedule).expect("priced");
        assert_eq!(quote.overhead_cost, Decimal::new(805, 0));
        assert_eq!(quote.subtotal, Decimal::new(8855, 0));
    }

    #[test]
    fn missing_inputs_are_typed_errors() {
        let mut project = cici();
        project.labor_rates.clear();
        assert_eq!(
            PricingCalculator::default().calculate(&project, &no_overhead()),
            Err(PricingError::MissingInput { field: "labor_rate.walls".to_owned() })
        );

        let mut project = cici();
        project.measurements.linear_feet = high(Decimal::ZERO);
        assert!(matches!(
            PricingCalculator::default().calculate(&project, &no_overhead()),
            Err(PricingError::Resolution(ResolutionError::InvalidMeasurement { .. }))
        ));

        let mut schedule = no_overhead();
        schedule.labor_rates.trim = Some(Decimal::new(-1, 0));
        assert!(matches!(
            PricingCalculator::default().calculate(&cici(), &schedule),
            Err(PricingError::InvalidRate { ref field, .. }) if field == "labor_rates.trim"
        ));
    }
}
