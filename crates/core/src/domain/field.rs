use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::project::Surface;

/// Confidence tier attached to every extracted datum and to the overall
/// completeness report. Ordered `Low < Medium < High`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    /// Confidence implied by a matcher priority. Priority 1 is the weakest
    /// heuristic, 2 a contextual or loosely anchored match, 3+ an explicit one.
    pub fn for_priority(priority: u8) -> Self {
        match priority {
            0 | 1 => Self::Low,
            2 => Self::Medium,
            _ => Self::High,
        }
    }

    pub fn is_trusted(self) -> bool {
        self >= Self::Medium
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// A value pulled out of the conversation, with provenance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedField<T> {
    pub value: T,
    pub confidence: Confidence,
    pub source_turn_index: usize,
    pub priority: u8,
}

impl<T> ExtractedField<T> {
    pub fn new(value: T, confidence: Confidence, source_turn_index: usize, priority: u8) -> Self {
        Self { value, confidence, source_turn_index, priority }
    }

    /// Field produced by a pattern match; confidence follows the priority.
    pub fn matched(value: T, priority: u8, source_turn_index: usize) -> Self {
        Self::new(value, Confidence::for_priority(priority), source_turn_index, priority)
    }

    pub fn is_trusted(&self) -> bool {
        self.confidence.is_trusted()
    }
}

/// Logical identity of a `ProjectData` leaf, used by the override log and
/// by the completeness evaluator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    CustomerName,
    Address,
    ProjectType,
    Surface(Surface),
    LinearFeet,
    CeilingHeight,
    SquareFeet,
    CeilingSquareFeet,
    TrimLinearFeet,
    DoorCount,
    CabinetCount,
    RoomCount,
    PaintBrand,
    PaintFinish,
    PaintPricePerGallon,
    PaintCoverage,
    PaintCoats,
    LaborRate(Surface),
    MarkupPct,
    TaxRatePct,
    Timeline,
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CustomerName => f.write_str("customer_name"),
            Self::Address => f.write_str("address"),
            Self::ProjectType => f.write_str("project_type"),
            Self::Surface(surface) => write!(f, "surface.{}", surface.key()),
            Self::LinearFeet => f.write_str("measurements.linear_feet"),
            Self::CeilingHeight => f.write_str("measurements.ceiling_height"),
            Self::SquareFeet => f.write_str("measurements.square_feet"),
            Self::CeilingSquareFeet => f.write_str("measurements.ceiling_square_feet"),
            Self::TrimLinearFeet => f.write_str("measurements.trim_linear_feet"),
            Self::DoorCount => f.write_str("measurements.door_count"),
            Self::CabinetCount => f.write_str("measurements.cabinet_count"),
            Self::RoomCount => f.write_str("measurements.room_count"),
            Self::PaintBrand => f.write_str("paint.brand"),
            Self::PaintFinish => f.write_str("paint.finish"),
            Self::PaintPricePerGallon => f.write_str("paint.price_per_gallon"),
            Self::PaintCoverage => f.write_str("paint.coverage_sqft_per_gallon"),
            Self::PaintCoats => f.write_str("paint.coats"),
            Self::LaborRate(surface) => write!(f, "labor_rate.{}", surface.key()),
            Self::MarkupPct => f.write_str("markup_pct"),
            Self::TaxRatePct => f.write_str("tax_rate_pct"),
            Self::Timeline => f.write_str("timeline"),
        }
    }
}

/// Record of one value replacing another for the same logical field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOverride {
    pub field: FieldKey,
    pub previous_value: String,
    pub previous_turn_index: usize,
    pub new_value: String,
    pub new_turn_index: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    Restated,
    Overridden,
    Ignored,
}

/// Applies the override law to one slot: an incoming value replaces the
/// current one only when its priority is at least as strong. Value changes are
/// appended to `log`; a restatement of the same value only refreshes provenance.
pub fn merge_field<T>(
    slot: &mut Option<ExtractedField<T>>,
    incoming: ExtractedField<T>,
    key: FieldKey,
    log: &mut Vec<FieldOverride>,
) -> MergeOutcome
where
    T: PartialEq + fmt::Display,
{
    let Some(existing) = slot.as_mut() else {
        *slot = Some(incoming);
        return MergeOutcome::Inserted;
    };

    if incoming.priority < existing.priority {
        return MergeOutcome::Ignored;
    }

    if existing.value == incoming.value {
        existing.source_turn_index = incoming.source_turn_index;
        existing.priority = incoming.priority;
        existing.confidence = existing.confidence.max(incoming.confidence);
        return MergeOutcome::Restated;
    }

    let record = FieldOverride {
        field: key,
        previous_value: existing.value.to_string(),
        previous_turn_index: existing.source_turn_index,
        new_value: incoming.value.to_string(),
        new_turn_index: incoming.source_turn_index,
    };
    tracing::debug!(
        event_name = "extraction.field_overridden",
        field = %record.field,
        previous_turn_index = record.previous_turn_index,
        new_turn_index = record.new_turn_index,
        "field value overridden by later turn"
    );
    log.push(record);
    *existing = incoming;
    MergeOutcome::Overridden
}

/// `merge_field` for keyed collections such as per-surface selections.
pub fn merge_keyed<K, T>(
    map: &mut BTreeMap<K, ExtractedField<T>>,
    map_key: K,
    incoming: ExtractedField<T>,
    key: FieldKey,
    log: &mut Vec<FieldOverride>,
) -> MergeOutcome
where
    K: Ord,
    T: PartialEq + fmt::Display,
{
    let mut slot = map.remove(&map_key);
    let outcome = merge_field(&mut slot, incoming, key, log);
    if let Some(field) = slot {
        map.insert(map_key, field);
    }
    outcome
}
