use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::project::{PaintCategory, Surface};
use crate::errors::PricingError;

/// Company-level pricing defaults. Supplied per computation and never
/// mutated by the engine.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateSchedule {
    #[serde(default)]
    pub labor_rates: SurfaceLaborRates,
    #[serde(default)]
    pub paint_products: PaintProducts,
    #[serde(default)]
    pub markup_pct: Decimal,
    #[serde(default)]
    pub tax_rate_pct: Decimal,
    #[serde(default)]
    pub tax_on_materials_only: bool,
    #[serde(default)]
    pub overhead: Option<OverheadRule>,
    #[serde(default)]
    pub sundries: Sundries,
    #[serde(default)]
    pub conversions: SurfaceConversions,
}

/// Default per-unit labor rate for each surface, in dollars per native unit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceLaborRates {
    pub walls: Option<Decimal>,
    pub ceilings: Option<Decimal>,
    pub trim: Option<Decimal>,
    pub doors: Option<Decimal>,
    pub cabinets: Option<Decimal>,
}

impl SurfaceLaborRates {
    pub fn for_surface(&self, surface: Surface) -> Option<Decimal> {
        match surface {
            Surface::Walls => self.walls,
            Surface::Ceilings => self.ceilings,
            Surface::Trim => self.trim,
            Surface::Doors => self.doors,
            Surface::Cabinets => self.cabinets,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaintProduct {
    pub name: String,
    #[serde(default)]
    pub brand: Option<String>,
    pub price_per_gallon: Decimal,
    #[serde(default)]
    pub coverage_sqft_per_gallon: Option<Decimal>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaintProducts {
    pub wall: Option<PaintProduct>,
    pub ceiling: Option<PaintProduct>,
    pub trim: Option<PaintProduct>,
}

impl PaintProducts {
    pub fn for_category(&self, category: PaintCategory) -> Option<&PaintProduct> {
        match category {
            PaintCategory::Wall => self.wall.as_ref(),
            PaintCategory::Ceiling => self.ceiling.as_ref(),
            PaintCategory::Trim => self.trim.as_ref(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OverheadRule {
    Flat { amount: Decimal },
    /// Percentage of materials + labor.
    Percentage { pct: Decimal },
}

/// Fallback overhead used when the schedule carries no overhead rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sundries {
    pub per_room: Decimal,
    pub per_job: Decimal,
}

impl Default for Sundries {
    fn default() -> Self {
        Self { per_room: Decimal::new(15, 0), per_job: Decimal::new(35, 0) }
    }
}

/// Area equivalents used to buy paint for surfaces not measured in sqft.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceConversions {
    pub sqft_per_linear_foot: Decimal,
    pub sqft_per_door: Decimal,
    pub sqft_per_cabinet: Decimal,
}

impl Default for SurfaceConversions {
    fn default() -> Self {
        Self {
            sqft_per_linear_foot: Decimal::new(5, 1),
            sqft_per_door: Decimal::new(42, 0),
            sqft_per_cabinet: Decimal::new(15, 0),
        }
    }
}

impl RateSchedule {
    pub fn validate(&self) -> Result<(), PricingError> {
        for surface in Surface::ALL {
            if let Some(rate) = self.labor_rates.for_surface(surface) {
                non_negative(&format!("labor_rates.{}", surface.key()), rate)?;
            }
        }

        for (category, product) in [
            (PaintCategory::Wall, &self.paint_products.wall),
            (PaintCategory::Ceiling, &self.paint_products.ceiling),
            (PaintCategory::Trim, &self.paint_products.trim),
        ] {
            let Some(product) = product else {
                continue;
            };
            let prefix = format!("paint_products.{}", category.key());
            non_negative(&format!("{prefix}.price_per_gallon"), product.price_per_gallon)?;
            if let Some(coverage) = product.coverage_sqft_per_gallon {
                positive(&format!("{prefix}.coverage_sqft_per_gallon"), coverage)?;
            }
        }

        percentage("markup_pct", self.markup_pct)?;
        percentage("tax_rate_pct", self.tax_rate_pct)?;

        match &self.overhead {
            Some(OverheadRule::Flat { amount }) => non_negative("overhead.amount", *amount)?,
            Some(OverheadRule::Percentage { pct }) => percentage("overhead.pct", *pct)?,
            None => {}
        }

        non_negative("sundries.per_room", self.sundries.per_room)?;
        non_negative("sundries.per_job", self.sundries.per_job)?;

        positive("conversions.sqft_per_linear_foot", self.conversions.sqft_per_linear_foot)?;
        positive("conversions.sqft_per_door", self.conversions.sqft_per_door)?;
        positive("conversions.sqft_per_cabinet", self.conversions.sqft_per_cabinet)?;

        Ok(())
    }
}

pub(crate) fn percentage(field: &str, value: Decimal) -> Result<(), PricingError> {
    if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
        return Err(PricingError::InvalidRate {
            field: field.to_owned(),
            value,
            reason: "must be between 0 and 100".to_owned(),
        });
    }
    Ok(())
}

fn non_negative(field: &str, value: Decimal) -> Result<(), PricingError> {
    if value < Decimal::ZERO {
        return Err(PricingError::InvalidRate {
            field: field.to_owned(),
            value,
            reason: "must not be negative".to_owned(),
        });
    }
    Ok(())
}

fn positive(field: &str, value: Decimal) -> Result<(), PricingError> {
    if value <= Decimal::ZERO {
        return Err(PricingError::InvalidRate {
            field: field.to_owned(),
            value,
            reason: "must be greater than zero".to_owned(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::errors::PricingError;

    use super::{OverheadRule, RateSchedule};

    const SCHEDULE_TOML: &str = r#"
markup_pct = "20"
tax_rate_pct = "8.25"

[labor_rates]
walls = "1.50"
trim = "2.25"

[paint_products.wall]
name = "Duration Interior"
brand = "Sherwin-Williams"
price_per_gallon = "50"

[overhead]
kind = "flat"
amount = "120"
"#;

    #[test]
    fn parses_schedule_from_toml_with_defaults() {
        let schedule: RateSchedule = toml::from_str(SCHEDULE_TOML).expect("schedule parses");

        assert_eq!(schedule.labor_rates.walls, Some(Decimal::new(150, 2)));
        assert_eq!(schedule.labor_rates.ceilings, None);
        assert_eq!(schedule.tax_rate_pct, Decimal::new(825, 2));
        assert_eq!(schedule.overhead, Some(OverheadRule::Flat { amount: Decimal::new(120, 0) }));
        assert_eq!(schedule.sundries.per_job, Decimal::new(35, 0));
        assert_eq!(schedule.conversions.sqft_per_door, Decimal::new(42, 0));
        schedule.validate().expect("schedule is valid");
    }

    #[test]
    fn markup_above_one_hundred_is_invalid_rate() {
        let schedule = RateSchedule { markup_pct: Decimal::new(150, 0), ..RateSchedule::default() };

        let error = schedule.validate().expect_err("markup out of range");
        assert!(matches!(error, PricingError::InvalidRate { ref field, .. } if field == "markup_pct"));
    }

    #[test]
    fn negative_labor_rate_is_invalid_rate() {
        let mut schedule = RateSchedule::default();
        schedule.labor_rates.doors = Some(Decimal::new(-40, 0));

        let error = schedule.validate().expect_err("negative rate");
        assert!(
            matches!(error, PricingError::InvalidRate { ref field, .. } if field == "labor_rates.doors")
        );
    }
}
