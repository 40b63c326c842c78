use std::collections::BTreeMap;
use std::ops::Range;

use regex::Regex;
use rust_decimal::Decimal;

use crate::domain::conversation::{ConversationTurn, Role};
use crate::domain::field::{merge_field, merge_keyed, ExtractedField, FieldKey};
use crate::domain::project::{
    LaborRate, PaintFinish, ProjectData, ProjectType, RawMeasurements, Surface,
};
use crate::extraction::patterns::*;
use crate::extraction::text::{parse_count, parse_signed, trim_value, TurnText};
use crate::extraction::{ExtractionFailure, Extractor};

const EXPLICIT: u8 = 3;
const CONTEXTUAL: u8 = 2;
const LABELED_NAME: u8 = 4;
const HEURISTIC: u8 = 1;

const NEGATIONS: &[&str] =
    &["no", "not", "skip", "skipping", "without", "excluding", "exclude", "except", "don't", "dont", "minus"];
const NEGATION_BARRIERS: &[&str] = &["but", "and", "plus", "also", "only", "just", "yes"];

const NAME_DELIMITERS: &[&str] = &[
    "at", "in", "on", "and", "with", "for", "who", "from", "about", "is", "to", "we", "i", "it",
    "her", "his", "their", "the", "of", "by", "wants", "needs", "would", "has", "have", "was",
    "will", "please", "re", "regarding", "lives", "house", "home",
];
const NAME_STOPWORDS: &[&str] = &[
    "hi", "hello", "hey", "thanks", "thank", "please", "the", "this", "that", "we", "our", "my",
    "can", "could", "would", "will", "let", "lets", "let's", "also", "and", "but", "so", "yes",
    "no", "ok", "okay", "sure", "great", "good", "looks", "sounds", "perfect", "walls", "wall",
    "ceilings", "ceiling", "trim", "doors", "door", "cabinets", "interior", "exterior", "paint",
    "labor", "quote", "estimate", "customer", "client", "just", "only", "need", "needs", "want",
    "wants", "send", "approve", "living", "dining", "master", "kitchen", "room", "bedroom",
    "bathroom", "family", "semi", "gloss", "satin", "eggshell", "matte", "flat", "next", "new",
    "sherwin", "williams", "benjamin", "moore", "behr", "valspar", "glidden", "kelly", "dunn",
    "edwards", "street", "st", "avenue", "ave", "road", "lane", "drive", "court", "way", "place",
    "boulevard", "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday",
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december", "mr", "mrs", "ms", "dr", "use", "tell", "hope", "how", "what", "when",
    "where", "why", "is", "are", "it", "i", "you", "they", "them", "a", "an", "in", "at", "for",
];
const CONFIRMATION_NEGATIONS: &[&str] =
    &["not", "don't", "dont", "no", "never", "isn't", "doesn't", "cannot", "can't", "won't", "yet"];

/// Signals carried by the latest user turn that steer the stage machine but
/// are not project data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TurnSignals {
    pub confirmation: bool,
}

/// Rule-based extractor. Pure and deterministic: the same history always
/// yields the same `ProjectData`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeterministicExtractor;

impl DeterministicExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Folds the entities of `turns[index]` into `project`. Assistant turns
    /// contribute nothing directly.
    pub fn extract_turn(&self, project: &mut ProjectData, turns: &[ConversationTurn], index: usize) {
        let Some(turn) = turns.get(index) else {
            return;
        };
        if turn.role != Role::User {
            return;
        }

        let found = scan_turn(turns, index);
        let populated = found.field_confidences().len();
        merge_turn(project, found);

        tracing::debug!(
            event_name = "extraction.turn_scanned",
            turn_index = index,
            fields_found = populated,
            "user turn scanned"
        );
    }

    /// Folds every turn of the history, oldest first.
    pub fn project_from(&self, turns: &[ConversationTurn]) -> ProjectData {
        let mut project = ProjectData::new();
        for index in 0..turns.len() {
            self.extract_turn(&mut project, turns, index);
        }
        project
    }

    pub fn signals(&self, turns: &[ConversationTurn]) -> TurnSignals {
        detect_signals(turns)
    }
}

impl Extractor for DeterministicExtractor {
    fn name(&self) -> &'static str {
        "deterministic"
    }

    fn extract(&self, turns: &[ConversationTurn]) -> Result<ProjectData, ExtractionFailure> {
        Ok(self.project_from(turns))
    }
}

/// Scans the most recent user turn for quote-acceptance phrases.
pub fn detect_signals(turns: &[ConversationTurn]) -> TurnSignals {
    let Some(turn) = turns.iter().rev().find(|turn| turn.role == Role::User) else {
        return TurnSignals::default();
    };
    let text = TurnText::new(&turn.text);
    let confirmation = CONFIRMATION.find_iter(text.normalized()).any(|hit| {
        let clause = text.clause_containing(hit.start());
        let asks = text.normalized()[clause.start..].chars().take(clause.len() + 1).any(|c| c == '?');
        !asks && !text.preceded_by_any(hit.start(), 3, CONFIRMATION_NEGATIONS, &[])
    });
    TurnSignals { confirmation }
}

struct TurnScan {
    text: TurnText,
    original: TurnText,
    index: usize,
    found: ProjectData,
}

struct DecimalHit {
    span: Range<usize>,
    value_at: usize,
    value: Decimal,
}

#[derive(Clone, Copy)]
enum HeightMask {
    Whole,
    FromValue,
}

fn scan_turn(turns: &[ConversationTurn], index: usize) -> ProjectData {
    let text = TurnText::new(&turns[index].text);
    let mut scan = TurnScan { original: text.clone(), text, index, found: ProjectData::new() };
    if scan.text.is_blank() {
        return scan.found;
    }

    scan_paint_costs(&mut scan);
    scan_labor_rates(&mut scan);
    scan_percentages(&mut scan);
    scan_heights(&mut scan);
    scan_measurements(&mut scan);
    scan_counts(&mut scan);
    scan_address(&mut scan);
    scan_names(&mut scan);
    scan_paint_spec(&mut scan);
    scan_surfaces(&mut scan);
    scan_project_type(&mut scan);
    scan_timeline(&mut scan);

    if let Some(previous) = index.checked_sub(1).and_then(|i| turns.get(i)) {
        if previous.role == Role::Assistant {
            scan_contextual_answer(&mut scan, &previous.text);
        }
    }

    scan.found
}

/// Keeps the first match at the strongest priority seen in this turn.
fn offer<T>(slot: &mut Option<ExtractedField<T>>, value: T, priority: u8, index: usize) {
    let stronger = slot.as_ref().map_or(true, |current| priority > current.priority);
    if stronger {
        *slot = Some(ExtractedField::matched(value, priority, index));
    }
}

fn offer_keyed<T>(
    map: &mut BTreeMap<Surface, ExtractedField<T>>,
    surface: Surface,
    value: T,
    priority: u8,
    index: usize,
) {
    let mut slot = map.remove(&surface);
    offer(&mut slot, value, priority, index);
    if let Some(field) = slot {
        map.insert(surface, field);
    }
}

/// Hits carrying two numbers, such as hours and rate or length and height.
fn paired_hits(pattern: &Regex, text: &TurnText, first: &str, second: &str) -> Vec<(DecimalHit, Decimal)> {
    let haystack = text.normalized();
    pattern
        .captures_iter(haystack)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let lead = caps.name(first)?;
            let other = caps.name(second)?;
            let hit = DecimalHit {
                span: whole.range(),
                value_at: lead.start(),
                value: parse_signed(haystack, lead)?,
            };
            Some((hit, parse_signed(haystack, other)?))
        })
        .collect()
}

fn decimal_hits(pattern: &Regex, text: &TurnText, group: &str) -> Vec<DecimalHit> {
    let haystack = text.normalized();
    pattern
        .captures_iter(haystack)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let value = caps.name(group)?;
            Some(DecimalHit {
                span: whole.range(),
                value_at: value.start(),
                value: parse_signed(haystack, value)?,
            })
        })
        .collect()
}

fn scan_paint_costs(scan: &mut TurnScan) {
    let index = scan.index;
    for pattern in [&*COVERAGE_PER_GALLON, &*COVERAGE_STATED] {
        for hit in decimal_hits(pattern, &scan.text, "coverage") {
            scan.text.mask(hit.span);
            offer(&mut scan.found.paint.coverage_sqft_per_gallon, hit.value, EXPLICIT, index);
        }
    }
    for pattern in [&*PRICE_PER_GALLON, &*GALLON_PRICED_AT] {
        for hit in decimal_hits(pattern, &scan.text, "amount") {
            scan.text.mask(hit.span);
            offer(&mut scan.found.paint.price_per_gallon, hit.value, EXPLICIT, index);
        }
    }
}

fn scan_labor_rates(scan: &mut TurnScan) {
    let index = scan.index;

    let per_sqft = decimal_hits(&RATE_PER_SQFT, &scan.text, "amount");
    let spans: Vec<Range<usize>> = per_sqft.iter().map(|hit| hit.span.clone()).collect();
    let routed = route_hits(&scan.text, &spans, &[Surface::Walls, Surface::Ceilings], Surface::Walls);
    for (hit, surfaces) in per_sqft.iter().zip(routed) {
        for surface in surfaces {
            let rate = LaborRate::PerUnit { rate: hit.value };
            offer_keyed(&mut scan.found.labor_rates, surface, rate, EXPLICIT, index);
        }
    }
    mask_all(&mut scan.text, &spans);

    for (pattern, surface) in [
        (&*RATE_PER_LINEAR_FOOT, Surface::Trim),
        (&*RATE_PER_DOOR, Surface::Doors),
        (&*RATE_PER_CABINET, Surface::Cabinets),
    ] {
        for hit in decimal_hits(pattern, &scan.text, "amount") {
            let rate = LaborRate::PerUnit { rate: hit.value };
            offer_keyed(&mut scan.found.labor_rates, surface, rate, EXPLICIT, index);
            scan.text.mask(hit.span);
        }
    }

    for pattern in [&*HOURLY_HOURS_FIRST, &*HOURLY_RATE_FIRST] {
        let hourly = paired_hits(pattern, &scan.text, "amount", "hours");
        let spans: Vec<Range<usize>> = hourly.iter().map(|(hit, _)| hit.span.clone()).collect();
        let routed = route_hits(&scan.text, &spans, &Surface::ALL, Surface::Walls);
        for ((hit, hours), surfaces) in hourly.iter().zip(routed) {
            for surface in surfaces {
                let rate = LaborRate::Hourly { hours: *hours, hourly_rate: hit.value };
                offer_keyed(&mut scan.found.labor_rates, surface, rate, EXPLICIT, index);
            }
        }
        mask_all(&mut scan.text, &spans);
    }

    for hit in decimal_hits(&PAINT_COST_LOOSE, &scan.text, "amount") {
        scan.text.mask(hit.span);
        offer(&mut scan.found.paint.price_per_gallon, hit.value, CONTEXTUAL, index);
    }
}

fn scan_percentages(scan: &mut TurnScan) {
    let index = scan.index;
    for pattern in [&*MARKUP_LABEL_FIRST, &*MARKUP_VALUE_FIRST] {
        for hit in decimal_hits(pattern, &scan.text, "pct") {
            scan.text.mask(hit.span);
            offer(&mut scan.found.markup_pct, hit.value, EXPLICIT, index);
        }
    }
    for pattern in [&*TAX_LABEL_FIRST, &*TAX_VALUE_FIRST] {
        for hit in decimal_hits(pattern, &scan.text, "pct") {
            scan.text.mask(hit.span);
            offer(&mut scan.found.tax_rate_pct, hit.value, EXPLICIT, index);
        }
    }
    let exempt: Vec<Range<usize>> =
        NO_TAX.find_iter(scan.text.normalized()).map(|hit| hit.range()).collect();
    for span in exempt {
        scan.text.mask(span);
        offer(&mut scan.found.tax_rate_pct, Decimal::ZERO, EXPLICIT, index);
    }
}

fn scan_heights(scan: &mut TurnScan) {
    let index = scan.index;

    for (length, height) in paired_hits(&DIMENSIONS, &scan.text, "length", "height") {
        offer(&mut scan.found.measurements.linear_feet, length.value, EXPLICIT, index);
        offer(&mut scan.found.measurements.ceiling_height, height, CONTEXTUAL, index);
        scan.text.mask(length.span);
    }

    for (pattern, priority, mask) in [
        (&*HEIGHT_LABEL, EXPLICIT, HeightMask::Whole),
        (&*HEIGHT_CEILINGS, CONTEXTUAL, HeightMask::Whole),
        (&*CEILINGS_ARE_HEIGHT, CONTEXTUAL, HeightMask::Whole),
        (&*HEIGHT_TALL, CONTEXTUAL, HeightMask::Whole),
        (&*WALLS_ARE_HEIGHT, CONTEXTUAL, HeightMask::FromValue),
    ] {
        for hit in decimal_hits(pattern, &scan.text, "height") {
            let span = match mask {
                HeightMask::Whole => hit.span.clone(),
                HeightMask::FromValue => hit.value_at..hit.span.end,
            };
            scan.text.mask(span);
            offer(&mut scan.found.measurements.ceiling_height, hit.value, priority, index);
        }
    }
}

fn scan_measurements(scan: &mut TurnScan) {
    let index = scan.index;

    let labeled: Vec<(DecimalHit, Option<Surface>)> = AREA_LABEL
        .captures_iter(scan.text.normalized())
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let value = caps.name("value")?;
            let surface = caps.name("surface").map(|named| {
                if named.as_str() == "ceiling" {
                    Surface::Ceilings
                } else {
                    Surface::Walls
                }
            });
            let hit = DecimalHit {
                span: whole.range(),
                value_at: value.start(),
                value: parse_signed(scan.text.normalized(), value)?,
            };
            Some((hit, surface))
        })
        .collect();
    for (hit, surface) in labeled {
        let surface = surface.or_else(|| nearest_surface(&scan.text, &hit.span, &Surface::ALL));
        assign_area(scan, surface, hit.value, index);
        scan.text.mask(hit.span);
    }

    for hit in decimal_hits(&AREA_VALUE, &scan.text, "value") {
        let surface = nearest_surface(&scan.text, &hit.span, &Surface::ALL);
        assign_area(scan, surface, hit.value, index);
        scan.text.mask(hit.span);
    }

    let surface_feet: Vec<(DecimalHit, bool)> = FEET_OF_SURFACE
        .captures_iter(scan.text.normalized())
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let value = caps.name("value")?;
            let is_wall = caps.name("what")?.as_str().starts_with("wall");
            let hit = DecimalHit {
                span: whole.range(),
                value_at: value.start(),
                value: parse_signed(scan.text.normalized(), value)?,
            };
            Some((hit, is_wall))
        })
        .collect();
    for (hit, is_wall) in surface_feet {
        let slot = if is_wall {
            &mut scan.found.measurements.linear_feet
        } else {
            &mut scan.found.measurements.trim_linear_feet
        };
        offer(slot, hit.value, EXPLICIT, index);
        scan.text.mask(hit.span);
    }

    for hit in decimal_hits(&LENGTH_VALUE, &scan.text, "value") {
        let slot = match nearest_surface(&scan.text, &hit.span, &Surface::ALL) {
            Some(Surface::Trim) => &mut scan.found.measurements.trim_linear_feet,
            _ => &mut scan.found.measurements.linear_feet,
        };
        offer(slot, hit.value, EXPLICIT, index);
        scan.text.mask(hit.span);
    }
}

fn assign_area(scan: &mut TurnScan, surface: Option<Surface>, value: Decimal, index: usize) {
    let slot = match surface {
        Some(Surface::Ceilings) => &mut scan.found.measurements.ceiling_square_feet,
        _ => &mut scan.found.measurements.square_feet,
    };
    offer(slot, value, EXPLICIT, index);
}

type CountSlot = fn(&mut RawMeasurements) -> &mut Option<ExtractedField<u32>>;

fn cabinet_slot(measurements: &mut RawMeasurements) -> &mut Option<ExtractedField<u32>> {
    &mut measurements.cabinet_count
}

fn door_slot(measurements: &mut RawMeasurements) -> &mut Option<ExtractedField<u32>> {
    &mut measurements.door_count
}

fn room_slot(measurements: &mut RawMeasurements) -> &mut Option<ExtractedField<u32>> {
    &mut measurements.room_count
}

/// Cabinets first so "2 bathroom cabinets" is never read as two rooms.
fn scan_counts(scan: &mut TurnScan) {
    let index = scan.index;
    let counters: [(&Regex, CountSlot); 3] = [
        (&*CABINET_COUNT, cabinet_slot as CountSlot),
        (&*DOOR_COUNT, door_slot as CountSlot),
        (&*ROOM_COUNT, room_slot as CountSlot),
    ];
    for (pattern, slot) in counters {
        let hits: Vec<(Range<usize>, u32)> = pattern
            .captures_iter(scan.text.normalized())
            .filter_map(|caps| Some((caps.get(0)?.range(), parse_count(caps.name("count")?.as_str())?)))
            .collect();
        for (span, count) in hits {
            offer(slot(&mut scan.found.measurements), count, EXPLICIT, index);
            scan.text.mask(span);
        }
    }
}

fn scan_address(scan: &mut TurnScan) {
    let index = scan.index;
    let normalized = scan.text.normalized();

    let street = STREET_ADDRESS.captures(normalized).and_then(|caps| {
        let street = caps.name("street")?;
        let mut span = street.range();
        if let (Some(tail), Some(state)) = (caps.name("tail"), caps.name("state")) {
            let code = scan.text.display_slice(state.range());
            if code.chars().all(|c| c.is_ascii_uppercase()) {
                span.end = tail.end();
            }
        }
        let priority = if ADDRESS_LABEL_BEFORE.is_match(&normalized[..span.start]) {
            EXPLICIT
        } else {
            CONTEXTUAL
        };
        Some((span, priority))
    });

    let located = street.or_else(|| {
        ADDRESS_LABELED_LOOSE
            .captures(normalized)
            .and_then(|caps| caps.name("street"))
            .map(|street| (street.range(), EXPLICIT))
    });

    if let Some((span, priority)) = located {
        let value = trim_value(scan.text.display_slice(span.clone())).to_owned();
        scan.text.mask(span);
        if !value.is_empty() {
            offer(&mut scan.found.address, value, priority, index);
        }
    }
}

fn scan_names(scan: &mut TurnScan) {
    let index = scan.index;
    let text = &scan.text;

    let labeled = CUSTOMER_LABEL.captures_iter(text.normalized()).find_map(|caps| {
        let name = caps.name("name")?;
        let needs_capital = caps.name("sep").is_some_and(|sep| sep.as_str() == "is");
        clean_name(text.display_slice(name.range()), needs_capital)
    });
    if let Some(name) = labeled {
        offer(&mut scan.found.customer_name, name, LABELED_NAME, index);
    }

    for (pattern, priority) in [(&*NAME_FOR_AT, EXPLICIT), (&*NAME_QUOTE_FOR, CONTEXTUAL)] {
        let candidate = pattern.captures_iter(text.normalized()).find_map(|caps| {
            let name = caps.name("name")?;
            clean_name(text.display_slice(name.range()), true)
        });
        if let Some(name) = candidate {
            offer(&mut scan.found.customer_name, name, priority, index);
        }
    }

    let bare = NAME_CAPITALIZED_PAIR.captures_iter(text.display()).find_map(|caps| {
        let name = caps.name("name")?.as_str();
        let ordinary = name
            .split_whitespace()
            .any(|word| NAME_STOPWORDS.contains(&word.to_ascii_lowercase().as_str()));
        (!ordinary).then(|| name.to_owned())
    });
    if let Some(name) = bare {
        offer(&mut scan.found.customer_name, name, HEURISTIC, index);
    }
}

/// Cuts a captured name at the first delimiter word and caps it at four
/// words. `needs_capital` rejects lower-case captures such as "the walls".
fn clean_name(raw: &str, needs_capital: bool) -> Option<String> {
    let mut words = Vec::new();
    for word in raw.split_whitespace() {
        let stripped = trim_value(word);
        let lower = stripped.to_ascii_lowercase();
        if stripped.is_empty() || NAME_DELIMITERS.contains(&lower.as_str()) {
            break;
        }
        words.push(stripped.to_owned());
        if words.len() == 4 || word.ends_with(',') || (word.ends_with('.') && stripped.len() > 1) {
            break;
        }
    }

    let first = words.first()?;
    if NAME_STOPWORDS.contains(&first.to_ascii_lowercase().as_str()) {
        return None;
    }
    if needs_capital && !first.starts_with(|c: char| c.is_ascii_uppercase()) {
        return None;
    }
    Some(words.join(" "))
}

fn scan_paint_spec(scan: &mut TurnScan) {
    let index = scan.index;
    let normalized = scan.text.normalized();

    if let Some(brand) = BRAND.captures(normalized).and_then(|caps| caps.name("brand")) {
        offer(&mut scan.found.paint.brand, canonical_brand(brand.as_str()), EXPLICIT, index);
    }

    let finish = FINISH
        .captures_iter(normalized)
        .filter(|caps| caps.name("pricing").is_none())
        .find_map(|caps| caps.name("finish").map(|finish| parse_finish(finish.as_str())));
    if let Some(finish) = finish {
        offer(&mut scan.found.paint.finish, finish, EXPLICIT, index);
    }

    let coats = COATS
        .captures(normalized)
        .and_then(|caps| caps.name("count"))
        .and_then(|count| parse_count(count.as_str()));
    if let Some(coats) = coats {
        offer(&mut scan.found.paint.coats, coats, EXPLICIT, index);
    }
}

fn canonical_brand(raw: &str) -> String {
    let name = match raw.split(|c: char| !c.is_ascii_alphanumeric()).next().unwrap_or_default() {
        "sherwin" | "sherwinwilliams" => "Sherwin-Williams",
        "benjamin" => "Benjamin Moore",
        "behr" => "Behr",
        "valspar" => "Valspar",
        "ppg" => "PPG",
        "glidden" => "Glidden",
        "dunn" | "dunnedwards" => "Dunn-Edwards",
        "kelly" | "kellymoore" => "Kelly-Moore",
        "farrow" => "Farrow & Ball",
        "diamond" => "Diamond Vogel",
        "pratt" => "Pratt & Lambert",
        _ => return raw.to_owned(),
    };
    name.to_owned()
}

fn parse_finish(raw: &str) -> PaintFinish {
    if raw.starts_with("semi") {
        PaintFinish::SemiGloss
    } else if raw.starts_with("high") || raw == "gloss" {
        PaintFinish::Gloss
    } else if raw == "satin" {
        PaintFinish::Satin
    } else if raw.starts_with("egg") {
        PaintFinish::Eggshell
    } else if raw == "matte" {
        PaintFinish::Matte
    } else {
        PaintFinish::Flat
    }
}

fn scan_surfaces(scan: &mut TurnScan) {
    let index = scan.index;
    let text = &scan.text;
    let mut selection: BTreeMap<Surface, bool> = BTreeMap::new();
    let mut exclusive: Vec<Surface> = Vec::new();

    for clause in text.clauses() {
        let mentions = surface_mentions(text, clause.clone());
        if mentions.is_empty() {
            continue;
        }
        let only = EXCLUSIVE.is_match(&text.normalized()[clause]);
        for (surface, span) in mentions {
            let negated = text.preceded_by_any(span.start, 4, NEGATIONS, NEGATION_BARRIERS);
            selection.insert(surface, !negated);
            if only && !negated && !exclusive.contains(&surface) {
                exclusive.push(surface);
            }
        }
    }

    if !exclusive.is_empty() {
        for surface in Surface::ALL {
            if !exclusive.contains(&surface) {
                selection.insert(surface, false);
            }
        }
    }

    for (surface, selected) in selection {
        offer_keyed(&mut scan.found.surfaces, surface, selected, EXPLICIT, index);
    }
}

fn scan_project_type(scan: &mut TurnScan) {
    let normalized = scan.text.normalized();
    let project_type = if BOTH_SIDES.is_match(normalized) {
        Some(ProjectType::Both)
    } else {
        match (INTERIOR.is_match(normalized), EXTERIOR.is_match(normalized)) {
            (true, true) => Some(ProjectType::Both),
            (true, false) => Some(ProjectType::Interior),
            (false, true) => Some(ProjectType::Exterior),
            (false, false) => None,
        }
    };
    if let Some(project_type) = project_type {
        offer(&mut scan.found.project_type, project_type, EXPLICIT, scan.index);
    }
}

fn scan_timeline(scan: &mut TurnScan) {
    let timeline = TIMELINE
        .captures(scan.text.normalized())
        .and_then(|caps| caps.name("timeline"))
        .map(|hit| trim_value(scan.text.display_slice(hit.range())).to_owned());
    if let Some(timeline) = timeline {
        offer(&mut scan.found.timeline, timeline, CONTEXTUAL, scan.index);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Solicited {
    Name,
    Address,
    Height,
}

fn solicited_field(assistant_text: &str) -> Option<Solicited> {
    let normalized = assistant_text.to_ascii_lowercase();
    [
        (&*ASKS_FOR_NAME, Solicited::Name),
        (&*ASKS_FOR_ADDRESS, Solicited::Address),
        (&*ASKS_FOR_HEIGHT, Solicited::Height),
    ]
    .into_iter()
    .filter_map(|(pattern, field)| pattern.find_iter(&normalized).last().map(|hit| (hit.start(), field)))
    .max_by_key(|(position, _)| *position)
    .map(|(_, field)| field)
}

/// A short reply to the question the assistant just asked is taken as that
/// field's value, at medium confidence.
fn scan_contextual_answer(scan: &mut TurnScan, assistant_text: &str) {
    let Some(field) = solicited_field(assistant_text) else {
        return;
    };
    let index = scan.index;
    let display = scan.original.display();
    let prefix_len = REPLY_PREFIX.find(scan.original.normalized()).map_or(0, |hit| hit.end());
    let reply = trim_value(&display[prefix_len..]);
    let word_count = reply.split_whitespace().count();

    match field {
        Solicited::Name => {
            let plain = !reply.chars().any(|c| c.is_ascii_digit())
                && !SURFACE_KEYWORD.is_match(&reply.to_ascii_lowercase())
                && reply.starts_with(|c: char| c.is_alphabetic());
            if plain && (1..=5).contains(&word_count) {
                offer(&mut scan.found.customer_name, reply.to_owned(), CONTEXTUAL, index);
            }
        }
        Solicited::Address => {
            let has_number = reply.chars().any(|c| c.is_ascii_digit());
            if has_number && (2..=12).contains(&word_count) {
                offer(&mut scan.found.address, reply.to_owned(), CONTEXTUAL, index);
            }
        }
        Solicited::Height => {
            if word_count > 6 {
                return;
            }
            let height = ANY_NUMBER
                .captures(scan.text.normalized())
                .and_then(|caps| caps.name("value"))
                .and_then(|value| parse_signed(scan.text.normalized(), value));
            if let Some(height) = height {
                offer(&mut scan.found.measurements.ceiling_height, height, CONTEXTUAL, index);
            }
        }
    }
}

fn surface_mentions(text: &TurnText, clause: Range<usize>) -> Vec<(Surface, Range<usize>)> {
    let offset = clause.start;
    SURFACE_KEYWORD
        .captures_iter(&text.normalized()[clause])
        .filter_map(|caps| {
            let (surface, hit) = [
                ("cabinets", Surface::Cabinets),
                ("ceilings", Surface::Ceilings),
                ("trim", Surface::Trim),
                ("doors", Surface::Doors),
                ("walls", Surface::Walls),
            ]
            .into_iter()
            .find_map(|(group, surface)| caps.name(group).map(|hit| (surface, hit)))?;
            Some((surface, offset + hit.start()..offset + hit.end()))
        })
        .collect()
}

/// Surface keyword closest to `span` within its clause, restricted to
/// `allowed`. Ties go to the keyword before the value.
fn nearest_surface(text: &TurnText, span: &Range<usize>, allowed: &[Surface]) -> Option<Surface> {
    let clause = text.clause_containing(span.start);
    surface_mentions(text, clause)
        .into_iter()
        .filter(|(surface, _)| allowed.contains(surface))
        .map(|(surface, keyword)| {
            let distance = if keyword.end <= span.start {
                (span.start - keyword.end, 0)
            } else {
                (keyword.start.saturating_sub(span.end), 1)
            };
            (distance, surface)
        })
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, surface)| surface)
}

/// Surfaces each rate applies to. A clause holding a single rate applies it
/// to every allowed surface the clause names, or failing that every allowed
/// surface the turn names. With several rates in one clause each goes to its
/// nearest surface.
fn route_hits(
    text: &TurnText,
    spans: &[Range<usize>],
    allowed: &[Surface],
    fallback: Surface,
) -> Vec<Vec<Surface>> {
    let named_in = |range: Range<usize>| -> Vec<Surface> {
        let mut unique = Vec::new();
        for (surface, _) in surface_mentions(text, range) {
            if allowed.contains(&surface) && !unique.contains(&surface) {
                unique.push(surface);
            }
        }
        unique
    };
    let whole_turn = named_in(0..text.normalized().len());

    spans
        .iter()
        .map(|span| {
            let clause = text.clause_containing(span.start);
            let rates_in_clause = spans.iter().filter(|other| clause.contains(&other.start)).count();
            let in_clause = named_in(clause);

            if rates_in_clause > 1 && !in_clause.is_empty() {
                vec![nearest_surface(text, span, allowed).unwrap_or(fallback)]
            } else if !in_clause.is_empty() {
                in_clause
            } else if !whole_turn.is_empty() {
                whole_turn.clone()
            } else {
                vec![fallback]
            }
        })
        .collect()
}

fn mask_all(text: &mut TurnText, spans: &[Range<usize>]) {
    for span in spans {
        text.mask(span.clone());
    }
}

/// Merges one turn's findings into the accumulated project under the
/// override law.
fn merge_turn(project: &mut ProjectData, found: ProjectData) {
    let log = &mut project.overrides;

    if let Some(field) = found.customer_name {
        merge_field(&mut project.customer_name, field, FieldKey::CustomerName, log);
    }
    if let Some(field) = found.address {
        merge_field(&mut project.address, field, FieldKey::Address, log);
    }
    if let Some(field) = found.project_type {
        merge_field(&mut project.project_type, field, FieldKey::ProjectType, log);
    }
    for (surface, field) in found.surfaces {
        merge_keyed(&mut project.surfaces, surface, field, FieldKey::Surface(surface), log);
    }

    let (mine, theirs) = (&mut project.measurements, found.measurements);
    if let Some(field) = theirs.linear_feet {
        merge_field(&mut mine.linear_feet, field, FieldKey::LinearFeet, log);
    }
    if let Some(field) = theirs.ceiling_height {
        merge_field(&mut mine.ceiling_height, field, FieldKey::CeilingHeight, log);
    }
    if let Some(field) = theirs.square_feet {
        merge_field(&mut mine.square_feet, field, FieldKey::SquareFeet, log);
    }
    if let Some(field) = theirs.ceiling_square_feet {
        merge_field(&mut mine.ceiling_square_feet, field, FieldKey::CeilingSquareFeet, log);
    }
    if let Some(field) = theirs.trim_linear_feet {
        merge_field(&mut mine.trim_linear_feet, field, FieldKey::TrimLinearFeet, log);
    }
    if let Some(field) = theirs.door_count {
        merge_field(&mut mine.door_count, field, FieldKey::DoorCount, log);
    }
    if let Some(field) = theirs.cabinet_count {
        merge_field(&mut mine.cabinet_count, field, FieldKey::CabinetCount, log);
    }
    if let Some(field) = theirs.room_count {
        merge_field(&mut mine.room_count, field, FieldKey::RoomCount, log);
    }

    let (mine, theirs) = (&mut project.paint, found.paint);
    if let Some(field) = theirs.brand {
        merge_field(&mut mine.brand, field, FieldKey::PaintBrand, log);
    }
    if let Some(field) = theirs.finish {
        merge_field(&mut mine.finish, field, FieldKey::PaintFinish, log);
    }
    if let Some(field) = theirs.price_per_gallon {
        merge_field(&mut mine.price_per_gallon, field, FieldKey::PaintPricePerGallon, log);
    }
    if let Some(field) = theirs.coverage_sqft_per_gallon {
        merge_field(&mut mine.coverage_sqft_per_gallon, field, FieldKey::PaintCoverage, log);
    }
    if let Some(field) = theirs.coats {
        merge_field(&mut mine.coats, field, FieldKey::PaintCoats, log);
    }

    for (surface, field) in found.labor_rates {
        merge_keyed(&mut project.labor_rates, surface, field, FieldKey::LaborRate(surface), log);
    }
    if let Some(field) = found.markup_pct {
        merge_field(&mut project.markup_pct, field, FieldKey::MarkupPct, log);
    }
    if let Some(field) = found.tax_rate_pct {
        merge_field(&mut project.tax_rate_pct, field, FieldKey::TaxRatePct, log);
    }
    if let Some(field) = found.timeline {
        merge_field(&mut project.timeline, field, FieldKey::Timeline, log);
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::domain::conversation::ConversationTurn;
    use crate::domain::field::{Confidence, FieldKey};
    use crate::domain::project::{LaborRate, PaintFinish, ProjectData, ProjectType, Surface};
    use crate::extraction::Extractor;

    use super::{detect_signals, DeterministicExtractor};

    fn extract(turns: &[ConversationTurn]) -> ProjectData {
        DeterministicExtractor::new().extract(turns).expect("deterministic extraction never fails")
    }

    fn value<T: Clone>(field: &Option<crate::domain::field::ExtractedField<T>>) -> Option<T> {
        field.as_ref().map(|field| field.value.clone())
    }

    #[test]
    fn extracts_cici_walls_only_request() {
        let project = extract(&[ConversationTurn::user(
            "New quote for Cici Zhang at 412 Maple Ave. Walls only, 500 linear feet with 9 ft ceilings. \
             Paint is $50/gallon, labor $1.50/sqft, 20% markup.",
        )]);

        assert_eq!(value(&project.customer_name), Some("Cici Zhang".to_string()));
        assert_eq!(project.customer_name.as_ref().map(|f| f.confidence), Some(Confidence::High));
        assert_eq!(value(&project.address), Some("412 Maple Ave".to_string()));
        assert_eq!(value(&project.measurements.linear_feet), Some(Decimal::new(500, 0)));
        assert_eq!(value(&project.measurements.ceiling_height), Some(Decimal::new(9, 0)));
        assert_eq!(value(&project.paint.price_per_gallon), Some(Decimal::new(50, 0)));
        assert_eq!(value(&project.markup_pct), Some(Decimal::new(20, 0)));
        assert_eq!(
            project.labor_rates.get(&Surface::Walls).map(|f| f.value),
            Some(LaborRate::PerUnit { rate: Decimal::new(150, 2) })
        );
        assert_eq!(project.selected_surfaces(), vec![Surface::Walls]);
        assert!(project.measurements.square_feet.is_none(), "rate unit must not become area");
    }

    #[test]
    fn coverage_and_rate_phrases_are_not_reread_as_measurements() {
        let project = extract(&[ConversationTurn::user(
            "Coverage is 400 sq ft per gallon and walls are 1,200 sqft at $2 per sq ft",
        )]);

        assert_eq!(value(&project.paint.coverage_sqft_per_gallon), Some(Decimal::new(400, 0)));
        assert_eq!(value(&project.measurements.square_feet), Some(Decimal::new(1200, 0)));
        assert_eq!(
            project.labor_rates.get(&Surface::Walls).map(|f| f.value),
            Some(LaborRate::PerUnit { rate: Decimal::new(2, 0) })
        );
    }

    #[test]
    fn routes_area_and_length_to_the_named_surface() {
        let project = extract(&[ConversationTurn::user(
            "Ceiling is 800 sqft, walls 2400 sqft. 300 lf of baseboard trim and 4 doors",
        )]);

        let m = &project.measurements;
        assert_eq!(value(&m.ceiling_square_feet), Some(Decimal::new(800, 0)));
        assert_eq!(value(&m.square_feet), Some(Decimal::new(2400, 0)));
        assert_eq!(value(&m.trim_linear_feet), Some(Decimal::new(300, 0)));
        assert_eq!(value(&m.linear_feet), None);
        assert_eq!(value(&m.door_count), Some(4));
    }

    #[test]
    fn ceiling_height_does_not_select_ceilings() {
        let project = extract(&[ConversationTurn::user("Walls with 9 ft ceilings, ceiling height 9")]);

        assert_eq!(project.selected_surfaces(), vec![Surface::Walls]);
        assert!(project.surface_selection(Surface::Ceilings).is_none());
    }

    #[test]
    fn negation_and_exclusivity_deselect_surfaces() {
        let project = extract(&[ConversationTurn::user(
            "Walls and trim please, no ceilings and skip the doors",
        )]);

        assert_eq!(project.selected_surfaces(), vec![Surface::Walls, Surface::Trim]);
        assert_eq!(project.surface_selection(Surface::Ceilings).map(|f| f.value), Some(false));
        assert_eq!(project.surface_selection(Surface::Doors).map(|f| f.value), Some(false));

        let exclusive = extract(&[
            ConversationTurn::user("Walls, ceilings and trim"),
            ConversationTurn::user("Actually walls only"),
        ]);
        assert_eq!(exclusive.selected_surfaces(), vec![Surface::Walls]);
        assert_eq!(exclusive.surface_selection(Surface::Trim).map(|f| f.source_turn_index), Some(1));
    }

    #[test]
    fn customer_name_precedence_prefers_labeled_forms() {
        let project = extract(&[ConversationTurn::user(
            "Estimate for Bob Jones. Customer: Roberta Jones, 9 rooms",
        )]);
        assert_eq!(value(&project.customer_name), Some("Roberta Jones".to_string()));
        assert_eq!(project.customer_name.as_ref().map(|f| f.priority), Some(4));
        assert_eq!(value(&project.measurements.room_count), Some(9));

        let bare = extract(&[ConversationTurn::user("Painting for Maria Lopez next week")]);
        assert_eq!(bare.customer_name.as_ref().map(|f| f.confidence), Some(Confidence::Low));
        assert_eq!(value(&bare.timeline), Some("next week".to_string()));
    }

    #[test]
    fn later_weaker_match_does_not_override_and_equal_match_is_logged() {
        let project = extract(&[
            ConversationTurn::user("Customer: Jon Smith"),
            ConversationTurn::user("Tell Mary Poppins hello"),
            ConversationTurn::user("Correction, customer: John Smith"),
        ]);

        let name = project.customer_name.as_ref().expect("name extracted");
        assert_eq!(name.value, "John Smith");
        assert_eq!(name.source_turn_index, 2);
        assert_eq!(project.overrides.len(), 1);
        assert_eq!(project.overrides[0].field, FieldKey::CustomerName);
        assert_eq!(project.overrides[0].previous_turn_index, 0);
    }

    #[test]
    fn paint_spec_accumulates_across_turns() {
        let project = extract(&[
            ConversationTurn::user("Use Benjamin Moore eggshell"),
            ConversationTurn::user("Two coats, $62 a gallon. Flat fee is fine"),
        ]);

        assert_eq!(value(&project.paint.brand), Some("Benjamin Moore".to_string()));
        assert_eq!(value(&project.paint.finish), Some(PaintFinish::Eggshell));
        assert_eq!(value(&project.paint.coats), Some(2));
        assert_eq!(value(&project.paint.price_per_gallon), Some(Decimal::new(62, 0)));
    }

    #[test]
    fn hourly_labor_replaces_per_unit_rate_for_the_same_surface() {
        let project = extract(&[
            ConversationTurn::user("Trim at $2/lf"),
            ConversationTurn::user("For the trim make it 12 hours at $45/hour"),
        ]);

        assert_eq!(
            project.labor_rates.get(&Surface::Trim).map(|f| f.value),
            Some(LaborRate::Hourly { hours: Decimal::new(12, 0), hourly_rate: Decimal::new(45, 0) })
        );
        assert_eq!(project.overrides.len(), 1);
    }

    #[test]
    fn negative_measurements_are_kept_for_validation() {
        let project = extract(&[ConversationTurn::user("walls are -500 sqft")]);
        assert_eq!(value(&project.measurements.square_feet), Some(Decimal::new(-500, 0)));
    }

    #[test]
    fn tax_and_project_type() {
        let project = extract(&[ConversationTurn::user("Interior job, tax rate 8.25%")]);
        assert_eq!(value(&project.tax_rate_pct), Some(Decimal::new(825, 2)));
        assert_eq!(value(&project.project_type), Some(ProjectType::Interior));

        let exempt = extract(&[ConversationTurn::user("Inside and out, no tax on this one")]);
        assert_eq!(value(&exempt.tax_rate_pct), Some(Decimal::ZERO));
        assert_eq!(value(&exempt.project_type), Some(ProjectType::Both));
    }

    #[test]
    fn short_reply_answers_the_assistant_question() {
        let project = extract(&[
            ConversationTurn::user("Need a quote for walls"),
            ConversationTurn::assistant("Sure. What is the customer's name?"),
            ConversationTurn::user("cici zhang"),
            ConversationTurn::assistant("Thanks! And the property address?"),
            ConversationTurn::user("88 Birch Hollow"),
            ConversationTurn::assistant("How tall are the walls?"),
            ConversationTurn::user("about 10 feet"),
        ]);

        let name = project.customer_name.as_ref().expect("name from reply");
        assert_eq!(name.value, "cici zhang");
        assert_eq!(name.confidence, Confidence::Medium);
        assert_eq!(value(&project.address), Some("88 Birch Hollow".to_string()));
        assert_eq!(value(&project.measurements.ceiling_height), Some(Decimal::new(10, 0)));
    }

    #[test]
    fn assistant_turns_are_never_mined() {
        let project = extract(&[ConversationTurn::assistant("Customer: Someone, 4000 sqft")]);
        assert!(project.is_empty());
    }

    #[test]
    fn extraction_is_byte_identical_on_rerun() {
        let turns = vec![
            ConversationTurn::user("Quote for Dana Price at 17 Elm St, Springfield, IL 62704"),
            ConversationTurn::user("walls and ceilings, 2000 sqft walls, ceiling 600 sqft, $1.25/sqft"),
        ];
        let first = serde_json::to_string(&extract(&turns)).expect("serialize");
        let second = serde_json::to_string(&extract(&turns)).expect("serialize");
        assert_eq!(first, second);

        let project = extract(&turns);
        assert_eq!(value(&project.address), Some("17 Elm St, Springfield, IL 62704".to_string()));
        assert_eq!(project.labor_rates.len(), 2);
    }

    #[test]
    fn confirmation_signal_reads_latest_user_turn_only() {
        assert!(detect_signals(&[ConversationTurn::user("Looks good, send it")]).confirmation);
        assert!(!detect_signals(&[ConversationTurn::user("That does not look good")]).confirmation);
        assert!(!detect_signals(&[ConversationTurn::user("Can you send it?")]).confirmation);
        assert!(!detect_signals(&[
            ConversationTurn::user("Approved"),
            ConversationTurn::user("Wait, change the trim"),
        ])
        .confirmation);
    }
}
