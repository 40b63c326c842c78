use std::ops::Range;
use std::str::FromStr;

use regex::Match;
use rust_decimal::Decimal;

/// A user turn prepared for matching. `normalized` is the ASCII-lowercased
/// form of `display`; both share byte offsets so a match found in one can be
/// sliced out of the other with its original casing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnText {
    display: String,
    normalized: String,
}

impl TurnText {
    /// Trims every line, collapses runs of blanks to one space and drops
    /// empty lines. Line breaks survive because they delimit clauses.
    pub fn new(raw: &str) -> Self {
        let display = raw
            .lines()
            .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        let normalized = display.to_ascii_lowercase();
        Self { display, normalized }
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    pub fn display_slice(&self, range: Range<usize>) -> &str {
        &self.display[range]
    }

    pub fn is_blank(&self) -> bool {
        self.normalized.trim().is_empty()
    }

    /// Blanks out a consumed span so later matchers cannot read it again.
    pub fn mask(&mut self, range: Range<usize>) {
        if range.is_empty() || range.end > self.normalized.len() {
            return;
        }
        let filler = " ".repeat(range.len());
        self.display.replace_range(range.clone(), &filler);
        self.normalized.replace_range(range, &filler);
    }

    /// Byte ranges of the clauses in this turn. A clause ends at sentence
    /// punctuation followed by whitespace, at ", ", at ";" or at a line break.
    pub fn clauses(&self) -> Vec<Range<usize>> {
        let bytes = self.normalized.as_bytes();
        let mut clauses = Vec::new();
        let mut start = 0;

        for (index, byte) in bytes.iter().enumerate() {
            let next_is_space = bytes.get(index + 1).map_or(true, |next| next.is_ascii_whitespace());
            let boundary = match byte {
                b'\n' | b';' => true,
                b'.' | b'!' | b'?' | b',' => next_is_space,
                _ => false,
            };
            if boundary {
                if index > start {
                    clauses.push(start..index);
                }
                start = index + 1;
            }
        }
        if start < bytes.len() {
            clauses.push(start..bytes.len());
        }
        clauses
    }

    pub fn clause_containing(&self, offset: usize) -> Range<usize> {
        self.clauses()
            .into_iter()
            .find(|clause| clause.start <= offset && offset < clause.end)
            .unwrap_or(offset..offset)
    }

    /// Whether one of `words` appears among the `window` words right before
    /// `offset`. The look-back stops at a clause boundary or at a `barriers` word.
    pub fn preceded_by_any(
        &self,
        offset: usize,
        window: usize,
        words: &[&str],
        barriers: &[&str],
    ) -> bool {
        let clause = self.clause_containing(offset);
        let start = clause.start.min(offset);
        self.normalized[start..offset]
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '\''))
            .filter(|word| !word.is_empty())
            .rev()
            .take(window)
            .take_while(|word| !barriers.contains(word))
            .any(|word| words.contains(&word))
    }
}

/// Parses a captured number. A leading minus is honoured only when it stands
/// on its own (start of text or after whitespace), so ranges like "10-12" and
/// compounds like "2-coat" never turn negative.
pub fn parse_signed(text: &str, capture: Match<'_>) -> Option<Decimal> {
    let raw = capture.as_str();
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => {
            let standalone = text[..capture.start()]
                .chars()
                .next_back()
                .map_or(true, char::is_whitespace);
            (standalone, rest)
        }
        None => (false, raw),
    };
    let value = parse_decimal(digits)?;
    Some(if negative { -value } else { value })
}

/// Parses an unsigned decimal, accepting thousands separators.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

/// Digits or a number word ("one" through "twelve", "single", "double").
pub fn parse_count(raw: &str) -> Option<u32> {
    let value = match raw.trim() {
        "a single" | "single" | "one" | "a" | "an" => 1,
        "double" | "two" | "a couple of" | "couple of" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        digits => return digits.replace(',', "").parse().ok(),
    };
    Some(value)
}

/// Strips trailing punctuation and surrounding quotes from a captured value.
pub fn trim_value(raw: &str) -> &str {
    raw.trim().trim_matches(|c: char| matches!(c, '"' | '\'' | ',' | '.' | '!' | '?' | ':' | ';')).trim()
}

#[cfg(test)]
mod tests {
    use regex::Regex;
    use rust_decimal::Decimal;

    use super::{parse_count, parse_decimal, parse_signed, trim_value, TurnText};

    #[test]
    fn normalizes_whitespace_and_keeps_offsets_aligned() {
        let text = TurnText::new("  Quote for   Cici Zhang \n\n  500 LF of walls  ");

        assert_eq!(text.display(), "Quote for Cici Zhang\n500 LF of walls");
        assert_eq!(text.normalized(), "quote for cici zhang\n500 lf of walls");
        let start = text.normalized().find("cici").expect("name present");
        assert_eq!(text.display_slice(start..start + 10), "Cici Zhang");
    }

    #[test]
    fn mask_blanks_both_copies() {
        let mut text = TurnText::new("Labor is $1.50/sqft and walls are 4500 sqft");
        let start = text.normalized().find('$').expect("rate present");
        text.mask(start..start + 11);

        assert!(!text.normalized().contains("1.50"));
        assert!(!text.display().contains("1.50"));
        assert!(text.normalized().contains("4500 sqft"));
    }

    #[test]
    fn clauses_split_on_sentences_commas_and_lines_but_not_numbers() {
        let text = TurnText::new("Walls are 4,500 sqft, ceilings 1.5 coats. Trim too\nno doors");
        let clauses: Vec<&str> =
            text.clauses().into_iter().map(|range| &text.normalized()[range]).collect();

        assert_eq!(clauses, vec!["walls are 4,500 sqft", " ceilings 1.5 coats", " trim too", "no doors"]);
    }

    #[test]
    fn negation_window_stays_inside_the_clause() {
        let text = TurnText::new("No ceilings. Walls please");
        let ceilings = text.normalized().find("ceilings").expect("present");
        let walls = text.normalized().find("walls").expect("present");

        assert!(text.preceded_by_any(ceilings, 3, &["no"], &[]));
        assert!(!text.preceded_by_any(walls, 3, &["no"], &[]));

        let barrier = TurnText::new("no ceilings but walls");
        let walls = barrier.normalized().find("walls").expect("present");
        assert!(!barrier.preceded_by_any(walls, 4, &["no"], &["but"]));
    }

    #[test]
    fn minus_sign_only_counts_when_standalone() {
        let pattern = Regex::new(r"-?\d+").expect("valid regex");
        let negative = "walls are -500 lf";
        let range = "rooms 10-12";

        let first = pattern.find(negative).expect("number");
        assert_eq!(parse_signed(negative, first), Some(Decimal::new(-500, 0)));

        let second = pattern.find_iter(range).nth(1).expect("second number");
        assert_eq!(parse_signed(range, second), Some(Decimal::new(12, 0)));
    }

    #[test]
    fn parses_separators_and_number_words() {
        assert_eq!(parse_decimal("4,500"), Some(Decimal::new(4500, 0)));
        assert_eq!(parse_decimal("1.50"), Some(Decimal::new(150, 2)));
        assert_eq!(parse_count("three"), Some(3));
        assert_eq!(parse_count("a single"), Some(1));
        assert_eq!(parse_count("12"), Some(12));
        assert_eq!(parse_count("many"), None);
        assert_eq!(trim_value(" Cici Zhang. "), "Cici Zhang");
    }
}
