//! Compiled matchers for the deterministic extractor. Every pattern runs
//! against the lower-cased turn text unless its name says otherwise.

use std::sync::LazyLock;

use regex::Regex;

const NUM: &str = r"-?(?:\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?|\.\d+)";
const COUNT: &str =
    r"(?:\d+|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve|a single|single|double)";
const SQFT: &str = r"(?:square\s+(?:feet|foot|ft)|sq\.?\s*(?:ft|feet)|sqft|sf|ft\^?2)\b";
const LF: &str = r"(?:linear\s+(?:feet|foot|ft)|lin\.?\s*(?:ft|feet)|ln\.?\s*(?:ft|feet)|lnft|lf)\b";
const FT: &str = r"(?:(?:feet|foot|ft)\b|')";
const PER: &str = r"\s*(?:/|per\b|an?\b|each\b)\s*";
const MONEY: &str = r"\$?\s*(?P<amount>NUM)\s*(?:dollars?\b|bucks\b)?";
const NAME_WORDS: &str = r"[a-z][a-z'.-]*(?:\s+[a-z][a-z'.-]*){0,4}";
const STREET_SUFFIX: &str = r"(?:street|st|avenue|ave|road|rd|boulevard|blvd|lane|drive|dr|court|ct|way|place|pl|terrace|ter|circle|cir|parkway|pkwy|highway|hwy|trail|trl)";

fn compile(template: &str) -> Regex {
    let pattern = template
        .replace("MONEY", MONEY)
        .replace("NUM", NUM)
        .replace("COUNT", COUNT)
        .replace("SQFT", SQFT)
        .replace("LF", LF)
        .replace("FT", FT)
        .replace("PER", PER)
        .replace("NAME_WORDS", NAME_WORDS)
        .replace("STREET_SUFFIX", STREET_SUFFIX);
    Regex::new(&pattern).expect("extraction pattern compiles")
}

// Paint coverage and price.
pub static COVERAGE_PER_GALLON: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?P<coverage>NUM)\s*SQFT\.?PER(?:gallon|gal)\b"));
pub static COVERAGE_STATED: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"\b(?:coverage|covers|covering)\s*(?:rate\s*)?(?:of|is|:|=)?\s*(?:about\s+|around\s+|roughly\s+)?(?P<coverage>NUM)(?:\s*SQFT)?",
    )
});
pub static PRICE_PER_GALLON: LazyLock<Regex> =
    LazyLock::new(|| compile(r"MONEYPER(?:gallon|gal)\b"));
pub static GALLON_PRICED_AT: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"\b(?:gallons?|gal)\s+(?:is|are|costs?|runs?|at|for)\s+(?:about\s+)?\$\s*(?P<amount>NUM)")
});
pub static PAINT_COST_LOOSE: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"\bpaint\s+(?:is|costs?|runs?|at|price\s+(?:is|of))\s+(?:about\s+|around\s+)?\$\s*(?P<amount>NUM)",
    )
});

// Labor rates.
pub static RATE_PER_SQFT: LazyLock<Regex> = LazyLock::new(|| compile(r"MONEYPERSQFT"));
pub static RATE_PER_LINEAR_FOOT: LazyLock<Regex> =
    LazyLock::new(|| compile(r"MONEYPER(?:LF|(?:foot|ft)\s+of\s+(?:trim|baseboards?))"));
pub static RATE_PER_DOOR: LazyLock<Regex> = LazyLock::new(|| compile(r"MONEYPERdoor\b"));
pub static RATE_PER_CABINET: LazyLock<Regex> =
    LazyLock::new(|| compile(r"MONEYPERcabinet(?:\s+(?:door|box))?\b"));
pub static HOURLY_HOURS_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?P<hours>NUM)\s*(?:hours?|hrs?)\b\s*(?:at|@|x|times)\s*MONEY\s*(?:/|per\b|an?\b)\s*(?:hour|hr)\b")
});
pub static HOURLY_RATE_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"MONEY\s*(?:/|per\b|an?\b)\s*(?:hour|hr)\b\s*(?:for|x|times)\s*(?P<hours>NUM)\s*(?:hours?|hrs?)\b")
});

// Markup and tax.
pub static MARKUP_LABEL_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"\b(?:markup|mark-up|mark\s+up)\s*(?:of|is|at|to|:|=)?\s*(?:about\s+)?(?P<pct>NUM)\s*(?:%|percent\b|pct\b)")
});
pub static MARKUP_VALUE_FIRST: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?P<pct>NUM)\s*(?:%|percent\b|pct\b)\s*(?:markup|mark-up|mark\s+up)\b"));
pub static TAX_LABEL_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"\b(?:sales\s+)?tax(?:\s+rate)?\s*(?:of|is|at|:|=)?\s*(?:about\s+)?(?P<pct>NUM)\s*(?:%|percent\b|pct\b)")
});
pub static TAX_VALUE_FIRST: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?P<pct>NUM)\s*(?:%|percent\b|pct\b)\s*(?:sales\s+)?tax\b"));
pub static NO_TAX: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"\b(?:no\s+(?:sales\s+)?tax|tax[\s-]exempt|(?:without|skip)\s+(?:the\s+)?tax)\b")
});

// Heights. `DIMENSIONS` also yields the wall length.
pub static DIMENSIONS: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?P<length>NUM)\s*LF\s*(?:x|by|\*|at)\s*(?P<height>NUM)\s*FT")
});
pub static HEIGHT_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"\b(?:ceiling|wall)\s+heights?(?:\s*(?:is|are|of|:|=|at|about|around))*\s*(?P<height>NUM)(?:\s*FT)?",
    )
});
pub static HEIGHT_CEILINGS: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?P<height>NUM)\s*-?\s*FT\s*(?:(?:high|tall)\s+)?ceilings?\b")
});
pub static CEILINGS_ARE_HEIGHT: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"\bceilings?\s+(?:are|is)\s+(?:about\s+)?(?P<height>NUM)\s*FT(?:\s*(?:high|tall)\b)?")
});
pub static HEIGHT_TALL: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?P<height>NUM)\s*-?\s*FT\s*(?:high|tall)\b"));
pub static WALLS_ARE_HEIGHT: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"\bwalls?\s+(?:are|is)\s+(?:about\s+)?(?P<height>NUM)\s*FT(?:\s*(?:high|tall)\b)?")
});

// Measurements.
pub static AREA_VALUE: LazyLock<Regex> = LazyLock::new(|| compile(r"(?P<value>NUM)\s*SQFT"));
pub static AREA_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"\b(?:(?P<surface>wall|ceiling)\s+)?(?:square\s+footage|area)\s*(?:is|of|:|=)?\s*(?:about\s+|around\s+|roughly\s+)?(?P<value>NUM)(?:\s*SQFT)?",
    )
});
pub static LENGTH_VALUE: LazyLock<Regex> = LazyLock::new(|| compile(r"(?P<value>NUM)\s*LF"));
pub static FEET_OF_SURFACE: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"(?P<value>NUM)\s*(?:feet|foot|ft)\s+of\s+(?:the\s+)?(?P<what>trim|baseboards?|moldings?|mouldings?|crown(?:\s+molding)?|casings?|walls?)\b",
    )
});

// Counts.
pub static CABINET_COUNT: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"\b(?P<count>COUNT)\s+(?:(?:kitchen|bathroom|vanity|upper|lower|base|wall)\s+)?cabinets?(?:\s+(?:doors|boxes|fronts))?\b",
    )
});
pub static DOOR_COUNT: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"\b(?P<count>COUNT)\s+(?:(?:interior|exterior|closet|entry|front|bedroom|bifold|french|panel)\s+)?doors?\b",
    )
});
pub static ROOM_COUNT: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"\b(?P<count>COUNT)\s+(?:(?:bed|bath|living|dining|family|guest|spare)\s*)?rooms?\b")
});
pub static COATS: LazyLock<Regex> =
    LazyLock::new(|| compile(r"\b(?P<count>COUNT)\s*(?:-\s*)?coats?\b"));

// Identity.
pub static STREET_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"\b(?P<street>\d{1,6}[a-z]?\s+(?:[a-z0-9.'-]+\s+){0,3}?STREET_SUFFIX\b\.?(?:\s*,?\s*(?:apt|apartment|unit|suite|ste|#)\.?\s*#?[a-z0-9-]+)?)(?P<tail>,\s*[a-z][a-z .'-]*?,\s*(?P<state>[a-z]{2})\b(?:\s+\d{5}(?:-\d{4})?)?)?",
    )
});
pub static ADDRESS_LABEL_BEFORE: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"(?:\baddress|\blocated\s+at|\b(?:property|house|home|job|job\s+site)\s+(?:is\s+)?at|\blives\s+at)\s*(?:is\b)?\s*:?\s*$",
    )
});
pub static ADDRESS_LABELED_LOOSE: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"\baddress\s*(?:is\b)?\s*:?\s*(?P<street>\d{1,6}\s+[a-z0-9 .'#-]*[a-z0-9])")
});
pub static CUSTOMER_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"\b(?:customer|client|homeowner)(?:'s)?(?:\s+name)?\s*(?P<sep>:|=|\bis\b)\s*(?P<name>NAME_WORDS)",
    )
});
pub static NAME_FOR_AT: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"\bfor\s+(?P<name>[a-z][a-z'.-]*(?:\s+[a-z][a-z'.-]*){0,3}?)\s+at\b")
});
pub static NAME_QUOTE_FOR: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"\b(?:quote|estimate|bid|proposal)\s+for\s+(?P<name>NAME_WORDS)")
});
/// Runs on the original-case text.
pub static NAME_CAPITALIZED_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?P<name>[A-Z][a-z'-]+\s+[A-Z][a-z'-]+)\b").expect("extraction pattern compiles")
});

// Assistant prompts answered by the next user turn.
pub static ASKS_FOR_NAME: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"(?:customer|client)(?:'s)?\s+name|who\s+(?:is|'s)\s+the\s+(?:customer|client)|name\s+(?:of|for)\s+the\s+(?:customer|client)|who\s+(?:is|'s)\s+(?:this|the)\s+(?:quote|estimate)\s+for|what(?:'s|\s+is)\s+(?:their|the)\s+name",
    )
});
pub static ASKS_FOR_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"\baddress\b|where\s+is\s+the\s+(?:property|house|home|job)|(?:property|job)\s+location")
});
pub static ASKS_FOR_HEIGHT: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?:ceiling|wall)\s+height|how\s+(?:high|tall)"));
pub static REPLY_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"^(?:(?:it'?s|that'?s|this\s+is|the\s+(?:customer|client)\s+is|(?:customer|client)\s+is|(?:their\s+)?name\s+is|the\s+address\s+is|address\s+is|for|at)\s+)",
    )
});
pub static ANY_NUMBER: LazyLock<Regex> = LazyLock::new(|| compile(r"(?P<value>NUM)"));

// Surfaces, project type and paint specification.
pub static SURFACE_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"\b(?:(?P<cabinets>cabinet(?:s|ry)?(?:\s+doors?)?)|(?P<ceilings>ceilings?)|(?P<trim>trim|baseboards?|moldings?|mouldings?|casings?|crown)|(?P<doors>doors?)|(?P<walls>walls?))\b",
    )
});
pub static EXCLUSIVE: LazyLock<Regex> = LazyLock::new(|| compile(r"\b(?:only|just|exclusively)\b"));
pub static BOTH_SIDES: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"\b(?:inside\s+and\s+out(?:side)?|interior\s+and\s+exterior|exterior\s+and\s+interior|indoors?\s+and\s+outdoors?)\b",
    )
});
pub static INTERIOR: LazyLock<Regex> = LazyLock::new(|| compile(r"\b(?:interior|inside|indoors?)\b"));
pub static EXTERIOR: LazyLock<Regex> =
    LazyLock::new(|| compile(r"\b(?:exterior|outside|outdoors?|siding)\b"));
pub static BRAND: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"\b(?P<brand>sherwin[\s-]?williams|benjamin\s+moore|behr|valspar|ppg|glidden|dunn[\s-]?edwards|kelly[\s-]?moore|farrow\s*(?:&|and)\s*ball|diamond\s+vogel|pratt\s*(?:&|and)\s*lambert)\b",
    )
});
pub static FINISH: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"\b(?P<finish>semi[\s-]?gloss|high[\s-]?gloss|gloss|satin|egg\s?shell|matte|flat)\b(?P<pricing>\s+(?:fee|rate|price|charge|cost|amount|total)\b)?",
    )
});

pub static TIMELINE: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"\b(?P<timeline>asap|as\s+soon\s+as\s+possible|(?:next|this)\s+(?:week|month|monday|tuesday|wednesday|thursday|friday|saturday|sunday|spring|summer|fall|winter)|tomorrow|(?:within|in)\s+(?:\d+|one|two|three|four|five|six|a\s+few|a\s+couple(?:\s+of)?)\s+(?:days?|weeks?|months?)|(?:by|before)\s+(?:the\s+)?end\s+of\s+(?:the\s+)?(?:week|month|year)|(?:on|by|before|starting|start)\s+(?:monday|tuesday|wednesday|thursday|friday|saturday|sunday|(?:january|february|march|april|may|june|july|august|september|october|november|december)(?:\s+\d{1,2}(?:st|nd|rd|th)?)?))\b",
    )
});

pub static CONFIRMATION: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"\b(?:looks?\s+(?:good|great|fine)|sounds?\s+(?:good|great)|approved?|go\s+ahead|send\s+it(?:\s+over)?|let'?s\s+do\s+it|book\s+it|that\s+works|lgtm|accept(?:ed)?|confirmed)\b",
    )
});
