use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::field::{Confidence, ExtractedField, FieldKey, FieldOverride};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectType {
    Interior,
    Exterior,
    Both,
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Interior => "interior",
            Self::Exterior => "exterior",
            Self::Both => "both",
        })
    }
}

/// Unit a surface is natively measured in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasureUnit {
    SquareFeet,
    LinearFeet,
    Each,
}

impl MeasureUnit {
    pub fn label(self) -> &'static str {
        match self {
            Self::SquareFeet => "sqft",
            Self::LinearFeet => "lnft",
            Self::Each => "each",
        }
    }
}

/// Paint product bucket; gallons are purchased per category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaintCategory {
    Wall,
    Ceiling,
    Trim,
}

impl PaintCategory {
    pub fn key(self) -> &'static str {
        match self {
            Self::Wall => "wall_paint",
            Self::Ceiling => "ceiling_paint",
            Self::Trim => "trim_paint",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    Walls,
    Ceilings,
    Trim,
    Doors,
    Cabinets,
}

impl Surface {
    pub const ALL: [Surface; 5] =
        [Surface::Walls, Surface::Ceilings, Surface::Trim, Surface::Doors, Surface::Cabinets];

    pub fn key(self) -> &'static str {
        match self {
            Self::Walls => "walls",
            Self::Ceilings => "ceilings",
            Self::Trim => "trim",
            Self::Doors => "doors",
            Self::Cabinets => "cabinets",
        }
    }

    pub fn unit(self) -> MeasureUnit {
        match self {
            Self::Walls | Self::Ceilings => MeasureUnit::SquareFeet,
            Self::Trim => MeasureUnit::LinearFeet,
            Self::Doors | Self::Cabinets => MeasureUnit::Each,
        }
    }

    pub fn paint_category(self) -> PaintCategory {
        match self {
            Self::Walls => PaintCategory::Wall,
            Self::Ceilings => PaintCategory::Ceiling,
            Self::Trim | Self::Doors | Self::Cabinets => PaintCategory::Trim,
        }
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaintFinish {
    Flat,
    Matte,
    Eggshell,
    Satin,
    SemiGloss,
    Gloss,
}

impl fmt::Display for PaintFinish {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Flat => "flat",
            Self::Matte => "matte",
            Self::Eggshell => "eggshell",
            Self::Satin => "satin",
            Self::SemiGloss => "semi-gloss",
            Self::Gloss => "gloss",
        })
    }
}

/// How labor is charged for one surface. The two modes are exclusive, so a
/// surface can never be billed both per unit and by the hour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum LaborRate {
    /// Dollars per native unit of the surface (sqft, linear foot, door, cabinet).
    PerUnit { rate: Decimal },
    Hourly { hours: Decimal, hourly_rate: Decimal },
}

impl fmt::Display for LaborRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PerUnit { rate } => write!(f, "${rate}/unit"),
            Self::Hourly { hours, hourly_rate } => write!(f, "{hours}h x ${hourly_rate}/h"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMeasurements {
    pub linear_feet: Option<ExtractedField<Decimal>>,
    pub ceiling_height: Option<ExtractedField<Decimal>>,
    pub square_feet: Option<ExtractedField<Decimal>>,
    pub ceiling_square_feet: Option<ExtractedField<Decimal>>,
    pub trim_linear_feet: Option<ExtractedField<Decimal>>,
    pub door_count: Option<ExtractedField<u32>>,
    pub cabinet_count: Option<ExtractedField<u32>>,
    pub room_count: Option<ExtractedField<u32>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaintSpec {
    pub brand: Option<ExtractedField<String>>,
    pub finish: Option<ExtractedField<PaintFinish>>,
    pub price_per_gallon: Option<ExtractedField<Decimal>>,
    pub coverage_sqft_per_gallon: Option<ExtractedField<Decimal>>,
    pub coats: Option<ExtractedField<u32>>,
}

/// Everything known about one conversation's project. Rebuilt from the turn
/// history on every invocation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectData {
    pub customer_name: Option<ExtractedField<String>>,
    pub address: Option<ExtractedField<String>>,
    pub project_type: Option<ExtractedField<ProjectType>>,
    pub surfaces: BTreeMap<Surface, ExtractedField<bool>>,
    pub measurements: RawMeasurements,
    pub paint: PaintSpec,
    pub labor_rates: BTreeMap<Surface, ExtractedField<LaborRate>>,
    pub markup_pct: Option<ExtractedField<Decimal>>,
    pub tax_rate_pct: Option<ExtractedField<Decimal>>,
    pub timeline: Option<ExtractedField<String>>,
    pub overrides: Vec<FieldOverride>,
}

impl ProjectData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected_surfaces(&self) -> Vec<Surface> {
        self.surfaces
            .iter()
            .filter(|(_, selection)| selection.value)
            .map(|(surface, _)| *surface)
            .collect()
    }

    pub fn surface_selection(&self, surface: Surface) -> Option<&ExtractedField<bool>> {
        self.surfaces.get(&surface)
    }

    /// Confidence of every populated leaf, keyed by logical field.
    pub fn field_confidences(&self) -> Vec<(FieldKey, Confidence)> {
        let mut fields = Vec::new();
        let mut push = |key: FieldKey, confidence: Option<Confidence>| {
            if let Some(confidence) = confidence {
                fields.push((key, confidence));
            }
        };

        push(FieldKey::CustomerName, self.customer_name.as_ref().map(|f| f.confidence));
        push(FieldKey::Address, self.address.as_ref().map(|f| f.confidence));
        push(FieldKey::ProjectType, self.project_type.as_ref().map(|f| f.confidence));
        for (surface, selection) in &self.surfaces {
            push(FieldKey::Surface(*surface), Some(selection.confidence));
        }

        let m = &self.measurements;
        push(FieldKey::LinearFeet, m.linear_feet.as_ref().map(|f| f.confidence));
        push(FieldKey::CeilingHeight, m.ceiling_height.as_ref().map(|f| f.confidence));
        push(FieldKey::SquareFeet, m.square_feet.as_ref().map(|f| f.confidence));
        push(FieldKey::CeilingSquareFeet, m.ceiling_square_feet.as_ref().map(|f| f.confidence));
        push(FieldKey::TrimLinearFeet, m.trim_linear_feet.as_ref().map(|f| f.confidence));
        push(FieldKey::DoorCount, m.door_count.as_ref().map(|f| f.confidence));
        push(FieldKey::CabinetCount, m.cabinet_count.as_ref().map(|f| f.confidence));
        push(FieldKey::RoomCount, m.room_count.as_ref().map(|f| f.confidence));

        let p = &self.paint;
        push(FieldKey::PaintBrand, p.brand.as_ref().map(|f| f.confidence));
        push(FieldKey::PaintFinish, p.finish.as_ref().map(|f| f.confidence));
        push(FieldKey::PaintPricePerGallon, p.price_per_gallon.as_ref().map(|f| f.confidence));
        push(FieldKey::PaintCoverage, p.coverage_sqft_per_gallon.as_ref().map(|f| f.confidence));
        push(FieldKey::PaintCoats, p.coats.as_ref().map(|f| f.confidence));

        for (surface, rate) in &self.labor_rates {
            push(FieldKey::LaborRate(*surface), Some(rate.confidence));
        }
        push(FieldKey::MarkupPct, self.markup_pct.as_ref().map(|f| f.confidence));
        push(FieldKey::TaxRatePct, self.tax_rate_pct.as_ref().map(|f| f.confidence));
        push(FieldKey::Timeline, self.timeline.as_ref().map(|f| f.confidence));

        fields
    }

    pub fn is_empty(&self) -> bool {
        self.field_confidences().is_empty()
    }

    /// Number of populated fields at or above `floor`.
    pub fn count_fields_at_least(&self, floor: Confidence) -> usize {
        self.field_confidences().iter().filter(|(_, confidence)| *confidence >= floor).count()
    }

    /// Merges `other` into this project under the override law: absent
    /// fields are taken as-is, a higher priority wins, equal priorities go to
    /// the later turn, and low-confidence fields yield to anything at least
    /// as confident.
    pub fn fill_from(&mut self, other: &ProjectData) {
        fill_slot(&mut self.customer_name, &other.customer_name);
        fill_slot(&mut self.address, &other.address);
        fill_slot(&mut self.project_type, &other.project_type);
        fill_map(&mut self.surfaces, &other.surfaces);

        let (mine, theirs) = (&mut self.measurements, &other.measurements);
        fill_slot(&mut mine.linear_feet, &theirs.linear_feet);
        fill_slot(&mut mine.ceiling_height, &theirs.ceiling_height);
        fill_slot(&mut mine.square_feet, &theirs.square_feet);
        fill_slot(&mut mine.ceiling_square_feet, &theirs.ceiling_square_feet);
        fill_slot(&mut mine.trim_linear_feet, &theirs.trim_linear_feet);
        fill_slot(&mut mine.door_count, &theirs.door_count);
        fill_slot(&mut mine.cabinet_count, &theirs.cabinet_count);
        fill_slot(&mut mine.room_count, &theirs.room_count);

        let (mine, theirs) = (&mut self.paint, &other.paint);
        fill_slot(&mut mine.brand, &theirs.brand);
        fill_slot(&mut mine.finish, &theirs.finish);
        fill_slot(&mut mine.price_per_gallon, &theirs.price_per_gallon);
        fill_slot(&mut mine.coverage_sqft_per_gallon, &theirs.coverage_sqft_per_gallon);
        fill_slot(&mut mine.coats, &theirs.coats);

        fill_map(&mut self.labor_rates, &other.labor_rates);
        fill_slot(&mut self.markup_pct, &other.markup_pct);
        fill_slot(&mut self.tax_rate_pct, &other.tax_rate_pct);
        fill_slot(&mut self.timeline, &other.timeline);

        for record in &other.overrides {
            if !self.overrides.contains(record) {
                self.overrides.push(record.clone());
            }
        }
    }
}

fn fill_slot<T: Clone>(slot: &mut Option<ExtractedField<T>>, other: &Option<ExtractedField<T>>) {
    let Some(candidate) = other else {
        return;
    };
    let replace = match slot {
        None => true,
        Some(current) => {
            candidate.priority > current.priority
                || (candidate.priority == current.priority
                    && candidate.source_turn_index > current.source_turn_index)
                || (!current.is_trusted() && candidate.confidence >= current.confidence)
        }
    };
    if replace {
        *slot = Some(candidate.clone());
    }
}

fn fill_map<K: Ord + Copy, T: Clone>(
    map: &mut BTreeMap<K, ExtractedField<T>>,
    other: &BTreeMap<K, ExtractedField<T>>,
) {
    for (key, candidate) in other {
        let mut slot = map.get(key).cloned();
        fill_slot(&mut slot, &Some(candidate.clone()));
        if let Some(field) = slot {
            map.insert(*key, field);
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::domain::field::{Confidence, ExtractedField};

    use super::{ProjectData, Surface};

    #[test]
    fn selected_surfaces_ignore_explicit_deselections() {
        let mut project = ProjectData::new();
        project.surfaces.insert(Surface::Walls, ExtractedField::matched(true, 3, 0));
        project.surfaces.insert(Surface::Ceilings, ExtractedField::matched(false, 3, 1));

        assert_eq!(project.selected_surfaces(), vec![Surface::Walls]);
    }

    #[test]
    fn fill_from_follows_priority_then_turn_order() {
        let mut primary = ProjectData::new();
        primary.customer_name = Some(ExtractedField::matched("Cici".to_string(), 2, 3));
        primary.address = Some(ExtractedField::matched("Oak".to_string(), 1, 0));
        primary.timeline = Some(ExtractedField::matched("next week".to_string(), 2, 0));
        primary.markup_pct = Some(ExtractedField::matched(Decimal::new(20, 0), 2, 2));

        let mut fallback = ProjectData::new();
        fallback.customer_name = Some(ExtractedField::matched("Someone Else".to_string(), 2, 1));
        fallback.address = Some(ExtractedField::matched("12 Oak St".to_string(), 3, 0));
        fallback.timeline = Some(ExtractedField::matched("in june".to_string(), 2, 4));
        fallback.markup_pct = Some(ExtractedField::matched(Decimal::new(25, 0), 4, 1));
        fallback.measurements.square_feet =
            Some(ExtractedField::matched(Decimal::new(4500, 0), 3, 0));

        primary.fill_from(&fallback);

        assert_eq!(primary.customer_name.map(|f| f.value), Some("Cici".to_string()));
        assert_eq!(primary.address.map(|f| f.value), Some("12 Oak St".to_string()));
        assert_eq!(primary.timeline.map(|f| f.value), Some("in june".to_string()));
        assert_eq!(primary.markup_pct.map(|f| f.value), Some(Decimal::new(25, 0)));
        assert_eq!(
            primary.measurements.square_feet.map(|f| f.confidence),
            Some(Confidence::High)
        );
    }
}
