//! Turns raw measurements into paintable areas and paint volumes.

use std::collections::BTreeMap;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::domain::field::{ExtractedField, FieldKey};
use crate::domain::project::{MeasureUnit, PaintCategory, ProjectData, RawMeasurements, Surface};
use crate::domain::rates::RateSchedule;
use crate::errors::ResolutionError;

/// Where a resolved input came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    Conversation,
    Schedule,
    Default,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SurfaceQuantity {
    pub surface: Surface,
    /// Quantity in the surface's own billing unit.
    pub quantity: Decimal,
    pub unit: MeasureUnit,
    pub paint_area_sqft: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CategoryPaint {
    pub category: PaintCategory,
    pub surfaces: Vec<Surface>,
    pub area_sqft: Decimal,
    pub coats: u32,
    pub coverage_sqft_per_gallon: Decimal,
    pub coverage_source: ValueSource,
    pub gallons: Decimal,
    pub price_per_gallon: Option<(Decimal, ValueSource)>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedQuantities {
    pub wall_area_sqft: Option<Decimal>,
    pub surfaces: Vec<SurfaceQuantity>,
    pub paint: Vec<CategoryPaint>,
}

impl ResolvedQuantities {
    pub fn surface(&self, surface: Surface) -> Option<&SurfaceQuantity> {
        self.surfaces.iter().find(|quantity| quantity.surface == surface)
    }

    /// `None` if the sum does not fit a `Decimal`.
    pub fn total_gallons(&self) -> Option<Decimal> {
        self.paint.iter().try_fold(Decimal::ZERO, |total, paint| total.checked_add(paint.gallons))
    }
}

/// Wall area from perimeter and height.
pub fn wall_area(linear_feet: Decimal, height: Decimal) -> Result<Decimal, ResolutionError> {
    linear_feet.checked_mul(height).ok_or(ResolutionError::Overflow { field: FieldKey::LinearFeet })
}

/// Whole gallons needed to cover `area` with `coats`, always rounded up.
pub fn gallons_required(
    area: Decimal,
    coats: u32,
    coverage: Decimal,
) -> Result<Decimal, ResolutionError> {
    if coverage <= Decimal::ZERO {
        return Err(ResolutionError::InvalidMeasurement {
            field: FieldKey::PaintCoverage,
            value: coverage,
        });
    }
    let needed = area
        .checked_mul(Decimal::from(coats))
        .ok_or(ResolutionError::Overflow { field: FieldKey::SquareFeet })?
        .checked_div(coverage)
        .ok_or(ResolutionError::Overflow { field: FieldKey::PaintCoverage })?;
    Ok(needed.round_dp_with_strategy(0, RoundingStrategy::AwayFromZero))
}

/// Raw field a surface's quantity is measured in.
pub fn quantity_key(surface: Surface) -> FieldKey {
    match surface {
        Surface::Walls => FieldKey::SquareFeet,
        Surface::Ceilings => FieldKey::CeilingSquareFeet,
        Surface::Trim => FieldKey::TrimLinearFeet,
        Surface::Doors => FieldKey::DoorCount,
        Surface::Cabinets => FieldKey::CabinetCount,
    }
}

fn converted(
    surface: Surface,
    quantity: Decimal,
    sqft_per_unit: Decimal,
) -> Result<(Decimal, Decimal), ResolutionError> {
    let area = quantity
        .checked_mul(sqft_per_unit)
        .ok_or(ResolutionError::Overflow { field: quantity_key(surface) })?;
    Ok((quantity, area))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuantityResolver {
    tolerance_pct: Decimal,
    default_coats: u32,
    default_coverage: Decimal,
}

impl Default for QuantityResolver {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl QuantityResolver {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            tolerance_pct: config.measurement_tolerance_pct,
            default_coats: config.default_coats,
            default_coverage: config.default_coverage_sqft_per_gallon,
        }
    }

    /// Rejects every present raw measurement that is zero or negative.
    pub fn validate_measurements(
        &self,
        measurements: &RawMeasurements,
    ) -> Result<(), ResolutionError> {
        let lengths = [
            (FieldKey::LinearFeet, &measurements.linear_feet),
            (FieldKey::CeilingHeight, &measurements.ceiling_height),
            (FieldKey::SquareFeet, &measurements.square_feet),
            (FieldKey::CeilingSquareFeet, &measurements.ceiling_square_feet),
            (FieldKey::TrimLinearFeet, &measurements.trim_linear_feet),
        ];
        for (field, slot) in lengths {
            if let Some(ExtractedField { value, .. }) = slot {
                if *value <= Decimal::ZERO {
                    return Err(ResolutionError::InvalidMeasurement { field, value: *value });
                }
            }
        }

        let counts = [
            (FieldKey::DoorCount, &measurements.door_count),
            (FieldKey::CabinetCount, &measurements.cabinet_count),
            (FieldKey::RoomCount, &measurements.room_count),
        ];
        for (field, slot) in counts {
            if let Some(ExtractedField { value: 0, .. }) = slot {
                return Err(ResolutionError::InvalidMeasurement { field, value: Decimal::ZERO });
            }
        }
        Ok(())
    }

    /// Wall area in sqft: length x height when both are known, else the
    /// stated area. A stated area that disagrees with the derived one by more
    /// than the tolerance is ambiguous.
    pub fn wall_area(
        &self,
        measurements: &RawMeasurements,
    ) -> Result<Option<Decimal>, ResolutionError> {
        self.validate_measurements(measurements)?;

        let derived = match (&measurements.linear_feet, &measurements.ceiling_height) {
            (Some(length), Some(height)) => Some(wall_area(length.value, height.value)?),
            _ => None,
        };
        let stated = measurements.square_feet.as_ref().map(|field| field.value);

        match (derived, stated) {
            (Some(derived), Some(stated)) => {
                let larger = derived.max(stated);
                let difference_pct = (derived - stated)
                    .abs()
                    .checked_div(larger)
                    .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
                    .ok_or(ResolutionError::Overflow { field: FieldKey::SquareFeet })?;
                if difference_pct > self.tolerance_pct {
                    return Err(ResolutionError::AmbiguousMeasurement {
                        stated_sqft: stated,
                        derived_sqft: derived,
                        difference_pct: difference_pct.round_dp(2),
                    });
                }
                Ok(Some(derived))
            }
            (Some(area), None) | (None, Some(area)) => Ok(Some(area)),
            (None, None) => Ok(None),
        }
    }

    pub fn surface_quantity(
        &self,
        project: &ProjectData,
        schedule: &RateSchedule,
        surface: Surface,
    ) -> Result<Option<SurfaceQuantity>, ResolutionError> {
        let measurements = &project.measurements;
        let conversions = &schedule.conversions;
        let count = |slot: &Option<ExtractedField<u32>>| slot.as_ref().map(|f| Decimal::from(f.value));

        let resolved = match surface {
            Surface::Walls => self.wall_area(measurements)?.map(|area| (area, area)),
            Surface::Ceilings => {
                measurements.ceiling_square_feet.as_ref().map(|field| (field.value, field.value))
            }
            Surface::Trim => measurements
                .trim_linear_feet
                .as_ref()
                .map(|field| converted(surface, field.value, conversions.sqft_per_linear_foot))
                .transpose()?,
            Surface::Doors => count(&measurements.door_count)
                .map(|doors| converted(surface, doors, conversions.sqft_per_door))
                .transpose()?,
            Surface::Cabinets => count(&measurements.cabinet_count)
                .map(|cabinets| converted(surface, cabinets, conversions.sqft_per_cabinet))
                .transpose()?,
        };

        Ok(resolved.map(|(quantity, paint_area_sqft)| SurfaceQuantity {
            surface,
            quantity,
            unit: surface.unit(),
            paint_area_sqft,
        }))
    }

    pub fn coats(&self, project: &ProjectData) -> Result<(u32, ValueSource), ResolutionError> {
        match &project.paint.coats {
            Some(field) if field.value == 0 => Err(ResolutionError::InvalidMeasurement {
                field: FieldKey::PaintCoats,
                value: Decimal::ZERO,
            }),
            Some(field) => Ok((field.value, ValueSource::Conversation)),
            None => Ok((self.default_coats, ValueSource::Default)),
        }
    }

    /// Coverage for a category. The conversation's coverage describes the
    /// wall paint; other categories prefer their schedule product.
    pub fn coverage_for(
        &self,
        project: &ProjectData,
        schedule: &RateSchedule,
        category: PaintCategory,
    ) -> Result<(Decimal, ValueSource), ResolutionError> {
        let stated = match &project.paint.coverage_sqft_per_gallon {
            Some(field) if field.value <= Decimal::ZERO => {
                return Err(ResolutionError::InvalidMeasurement {
                    field: FieldKey::PaintCoverage,
                    value: field.value,
                });
            }
            Some(field) => Some((field.value, ValueSource::Conversation)),
            None => None,
        };
        let product = schedule
            .paint_products
            .for_category(category)
            .and_then(|product| product.coverage_sqft_per_gallon)
            .map(|coverage| (coverage, ValueSource::Schedule));

        let chosen = if category == PaintCategory::Wall {
            stated.or(product)
        } else {
            product.or(stated)
        };
        Ok(chosen.unwrap_or((self.default_coverage, ValueSource::Default)))
    }

    /// Price per gallon for a category, with the same precedence as coverage.
    pub fn price_for(
        &self,
        project: &ProjectData,
        schedule: &RateSchedule,
        category: PaintCategory,
    ) -> Option<(Decimal, ValueSource)> {
        let stated = project
            .paint
            .price_per_gallon
            .as_ref()
            .map(|field| (field.value, ValueSource::Conversation));
        let product = schedule
            .paint_products
            .for_category(category)
            .map(|product| (product.price_per_gallon, ValueSource::Schedule));

        if category == PaintCategory::Wall {
            stated.or(product)
        } else {
            product.or(stated)
        }
    }

    /// Quantities for every selected surface and paint per category in use.
    pub fn resolve(
        &self,
        project: &ProjectData,
        schedule: &RateSchedule,
    ) -> Result<ResolvedQuantities, ResolutionError> {
        self.validate_measurements(&project.measurements)?;
        let (coats, _) = self.coats(project)?;

        let mut resolved = ResolvedQuantities {
            wall_area_sqft: self.wall_area(&project.measurements)?,
            ..ResolvedQuantities::default()
        };

        let mut by_category: BTreeMap<PaintCategory, (Vec<Surface>, Decimal)> = BTreeMap::new();
        for surface in project.selected_surfaces() {
            let quantity = self
                .surface_quantity(project, schedule, surface)?
                .ok_or(ResolutionError::MissingQuantity { surface })?;
            let entry = by_category
                .entry(surface.paint_category())
                .or_insert_with(|| (Vec::new(), Decimal::ZERO));
            entry.0.push(surface);
            entry.1 = entry
                .1
                .checked_add(quantity.paint_area_sqft)
                .ok_or(ResolutionError::Overflow { field: quantity_key(surface) })?;
            resolved.surfaces.push(quantity);
        }

        for (category, (surfaces, area_sqft)) in by_category {
            let (coverage, coverage_source) = self.coverage_for(project, schedule, category)?;
            resolved.paint.push(CategoryPaint {
                category,
                surfaces,
                area_sqft,
                coats,
                coverage_sqft_per_gallon: coverage,
                coverage_source,
                gallons: gallons_required(area_sqft, coats, coverage)?,
                price_per_gallon: self.price_for(project, schedule, category),
            });
        }

        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::config::EngineConfig;
    use crate::domain::field::{ExtractedField, FieldKey};
    use crate::domain::project::{PaintCategory, ProjectData, Surface};
    use crate::domain::rates::{PaintProduct, RateSchedule, SurfaceConversions};
    use crate::errors::ResolutionError;

    use super::{gallons_required, wall_area, QuantityResolver, ValueSource};

    fn field<T>(value: T) -> Option<ExtractedField<T>> {
        Some(ExtractedField::matched(value, 3, 0))
    }

    fn select(project: &mut ProjectData, surfaces: &[Surface]) {
        for surface in surfaces {
            project.surfaces.insert(*surface, ExtractedField::matched(true, 3, 0));
        }
    }

    #[test]
    fn wall_area_and_gallons_follow_the_rounding_rule() {
        let area = wall_area(Decimal::new(500, 0), Decimal::new(9, 0)).expect("area fits");
        assert_eq!(area, Decimal::new(4500, 0));
        assert_eq!(
            gallons_required(area, 2, Decimal::new(350, 0)),
            Ok(Decimal::new(26, 0))
        );
        assert_eq!(
            gallons_required(Decimal::new(700, 0), 1, Decimal::new(350, 0)),
            Ok(Decimal::new(2, 0))
        );
        assert!(gallons_required(area, 2, Decimal::ZERO).is_err());
    }

    #[test]
    fn oversized_measurements_report_overflow_instead_of_panicking() {
        let huge = Decimal::new(9_000_000_000_000_000, 0);
        assert_eq!(
            wall_area(huge, huge),
            Err(ResolutionError::Overflow { field: FieldKey::LinearFeet })
        );
        assert_eq!(
            gallons_required(Decimal::MAX, 2, Decimal::new(350, 0)),
            Err(ResolutionError::Overflow { field: FieldKey::SquareFeet })
        );
        assert_eq!(
            gallons_required(Decimal::MAX, 1, Decimal::new(1, 3)),
            Err(ResolutionError::Overflow { field: FieldKey::PaintCoverage })
        );

        let resolver = QuantityResolver::default();
        let mut project = ProjectData::new();
        select(&mut project, &[Surface::Trim]);
        project.measurements.trim_linear_feet = field(Decimal::MAX);
        let schedule = RateSchedule {
            conversions: SurfaceConversions {
                sqft_per_linear_foot: Decimal::new(3, 0),
                ..SurfaceConversions::default()
            },
            ..RateSchedule::default()
        };
        assert_eq!(
            resolver.resolve(&project, &schedule),
            Err(ResolutionError::Overflow { field: FieldKey::TrimLinearFeet })
        );
    }

    #[test]
    fn derived_area_wins_when_within_tolerance() {
        let resolver = QuantityResolver::default();
        let mut project = ProjectData::new();
        project.measurements.linear_feet = field(Decimal::new(500, 0));
        project.measurements.ceiling_height = field(Decimal::new(9, 0));
        project.measurements.square_feet = field(Decimal::new(4200, 0));

        assert_eq!(resolver.wall_area(&project.measurements), Ok(Some(Decimal::new(4500, 0))));
    }

    #[test]
    fn disagreeing_areas_are_ambiguous() {
        let resolver = QuantityResolver::default();
        let mut project = ProjectData::new();
        project.measurements.linear_feet = field(Decimal::new(500, 0));
        project.measurements.ceiling_height = field(Decimal::new(9, 0));
        project.measurements.square_feet = field(Decimal::new(3000, 0));

        match resolver.wall_area(&project.measurements) {
            Err(ResolutionError::AmbiguousMeasurement { stated_sqft, derived_sqft, difference_pct }) => {
                assert_eq!(stated_sqft, Decimal::new(3000, 0));
                assert_eq!(derived_sqft, Decimal::new(4500, 0));
                assert_eq!(difference_pct, Decimal::new(3333, 2));
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }

        let loose = QuantityResolver::new(&EngineConfig {
            measurement_tolerance_pct: Decimal::new(40, 0),
            ..EngineConfig::default()
        });
        assert_eq!(loose.wall_area(&project.measurements), Ok(Some(Decimal::new(4500, 0))));
    }

    #[test]
    fn zero_and_negative_measurements_are_rejected() {
        let resolver = QuantityResolver::default();
        let mut project = ProjectData::new();
        project.measurements.square_feet = field(Decimal::new(-200, 0));
        assert_eq!(
            resolver.wall_area(&project.measurements),
            Err(ResolutionError::InvalidMeasurement {
                field: FieldKey::SquareFeet,
                value: Decimal::new(-200, 0)
            })
        );

        let mut project = ProjectData::new();
        project.measurements.door_count = field(0);
        assert!(matches!(
            resolver.validate_measurements(&project.measurements),
            Err(ResolutionError::InvalidMeasurement { field: FieldKey::DoorCount, .. })
        ));

        let mut project = ProjectData::new();
        project.paint.coats = field(0);
        assert!(resolver.coats(&project).is_err());
    }

    #[test]
    fn non_wall_surfaces_use_schedule_conversions_and_share_trim_paint() {
        let resolver = QuantityResolver::default();
        let mut project = ProjectData::new();
        select(&mut project, &[Surface::Trim, Surface::Doors, Surface::Ceilings]);
        project.measurements.trim_linear_feet = field(Decimal::new(200, 0));
        project.measurements.door_count = field(4);
        project.measurements.ceiling_square_feet = field(Decimal::new(1200, 0));

        let resolved = resolver
            .resolve(&project, &RateSchedule::default())
            .expect("all quantities known");

        let trim = resolved.surface(Surface::Trim).expect("trim");
        assert_eq!(trim.quantity, Decimal::new(200, 0));
        assert_eq!(trim.paint_area_sqft, Decimal::new(100, 0));
        let doors = resolved.surface(Surface::Doors).expect("doors");
        assert_eq!(doors.paint_area_sqft, Decimal::new(168, 0));

        let categories: Vec<PaintCategory> = resolved.paint.iter().map(|p| p.category).collect();
        assert_eq!(categories, vec![PaintCategory::Ceiling, PaintCategory::Trim]);
        let trim_paint = &resolved.paint[1];
        assert_eq!(trim_paint.area_sqft, Decimal::new(268, 0));
        assert_eq!(trim_paint.gallons, Decimal::new(2, 0));
        assert_eq!(resolved.paint[0].gallons, Decimal::new(7, 0));
    }

    #[test]
    fn selected_surface_without_quantity_is_reported() {
        let resolver = QuantityResolver::default();
        let mut project = ProjectData::new();
        select(&mut project, &[Surface::Walls, Surface::Cabinets]);
        project.measurements.square_feet = field(Decimal::new(800, 0));

        assert_eq!(
            resolver.resolve(&project, &RateSchedule::default()),
            Err(ResolutionError::MissingQuantity { surface: Surface::Cabinets })
        );
    }

    #[test]
    fn conversation_coverage_rules_walls_while_products_rule_other_categories() {
        let resolver = QuantityResolver::default();
        let mut project = ProjectData::new();
        project.paint.coverage_sqft_per_gallon = field(Decimal::new(400, 0));
        project.paint.price_per_gallon = field(Decimal::new(50, 0));

        let mut schedule = RateSchedule::default();
        schedule.paint_products.wall = Some(PaintProduct {
            name: "House wall".to_owned(),
            brand: None,
            price_per_gallon: Decimal::new(42, 0),
            coverage_sqft_per_gallon: Some(Decimal::new(300, 0)),
        });
        schedule.paint_products.trim = Some(PaintProduct {
            name: "House enamel".to_owned(),
            brand: None,
            price_per_gallon: Decimal::new(65, 0),
            coverage_sqft_per_gallon: Some(Decimal::new(250, 0)),
        });

        assert_eq!(
            resolver.coverage_for(&project, &schedule, PaintCategory::Wall),
            Ok((Decimal::new(400, 0), ValueSource::Conversation))
        );
        assert_eq!(
            resolver.coverage_for(&project, &schedule, PaintCategory::Trim),
            Ok((Decimal::new(250, 0), ValueSource::Schedule))
        );
        assert_eq!(
            resolver.price_for(&project, &schedule, PaintCategory::Wall),
            Some((Decimal::new(50, 0), ValueSource::Conversation))
        );
        assert_eq!(
            resolver.price_for(&project, &schedule, PaintCategory::Trim),
            Some((Decimal::new(65, 0), ValueSource::Schedule))
        );
        assert_eq!(
            resolver.price_for(&project, &schedule, PaintCategory::Ceiling),
            Some((Decimal::new(50, 0), ValueSource::Conversation))
        );

        let bare = ProjectData::new();
        assert_eq!(
            resolver.coverage_for(&bare, &RateSchedule::default(), PaintCategory::Ceiling),
            Ok((Decimal::new(350, 0), ValueSource::Default))
        );
    }
}
