use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::project::{PaintCategory, Surface};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingMode {
    /// Computed before quote review; informational only.
    Preview,
    Final,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineItemCategory {
    Materials,
    Labor,
    Overhead,
    Sundries,
    Markup,
    Tax,
    Rounding,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteLineItem {
    pub category: LineItemCategory,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surface: Option<Surface>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<Decimal>,
    pub amount: Decimal,
}

impl QuoteLineItem {
    pub fn lump(category: LineItemCategory, description: impl Into<String>, amount: Decimal) -> Self {
        Self {
            category,
            description: description.into(),
            surface: None,
            quantity: None,
            unit: None,
            unit_price: None,
            amount,
        }
    }
}

/// Paint purchase for one category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaintRequirement {
    pub category: PaintCategory,
    pub surfaces: Vec<Surface>,
    pub area_sqft: Decimal,
    pub coats: u32,
    pub coverage_sqft_per_gallon: Decimal,
    pub gallons: Decimal,
    pub price_per_gallon: Decimal,
    pub cost: Decimal,
}

/// Deterministic price breakdown. Every amount except `final_price` and the
/// rounding line item is exact; `line_items` always sum to `final_price`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculatedQuote {
    pub paint_gallons: Decimal,
    pub paint: Vec<PaintRequirement>,
    pub materials_cost: Decimal,
    pub labor_cost: Decimal,
    pub overhead_cost: Decimal,
    pub subtotal: Decimal,
    pub markup_pct: Decimal,
    pub markup_amount: Decimal,
    pub tax_rate_pct: Decimal,
    pub tax_on_materials_only: bool,
    pub tax_amount: Decimal,
    pub final_price: Decimal,
    pub line_items: Vec<QuoteLineItem>,
}

impl CalculatedQuote {
    pub fn line_item_total(&self) -> Decimal {
        self.line_items.iter().map(|item| item.amount).sum()
    }

    pub fn gallons_for(&self, category: PaintCategory) -> Option<Decimal> {
        self.paint.iter().find(|requirement| requirement.category == category).map(|r| r.gallons)
    }
}
