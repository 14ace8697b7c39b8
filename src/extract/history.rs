//! Assessment history table
//!
//! Rows on the card look like `|2026 49,600 193,132 242,732 213,794c`: a year,
//! then land, building, assessed (SEV) and taxable values. The taxable column
//! carries a capped/uncapped marker letter that OCR keeps attached.

use crate::extract::currency::{parse_currency, Currency};
use serde::Serialize;

const FIRST_YEAR: u16 = 1990;
const LAST_YEAR: u16 = 2099;

/// One row of the assessment history table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssessmentYear {
    pub year: u16,
    pub land_value: Option<Currency>,
    pub building_value: Option<Currency>,
    pub sev: Option<Currency>,
    pub taxable: Option<Currency>,
}

impl AssessmentYear {
    pub fn new(year: u16) -> Self {
        Self {
            year,
            land_value: None,
            building_value: None,
            sev: None,
            taxable: None,
        }
    }
}

/// History rows ordered by year, at most one per year
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AssessmentHistory(Vec<AssessmentYear>);

impl AssessmentHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row, replacing any existing row for the same year
    pub fn upsert(&mut self, row: AssessmentYear) {
        match self.0.binary_search_by_key(&row.year, |r| r.year) {
            Ok(idx) => self.0[idx] = row,
            Err(idx) => self.0.insert(idx, row),
        }
    }

    pub fn get(&self, year: u16) -> Option<&AssessmentYear> {
        self.0
            .binary_search_by_key(&year, |r| r.year)
            .ok()
            .map(|idx| &self.0[idx])
    }

    pub fn latest_year(&self) -> Option<u16> {
        self.0.last().map(|r| r.year)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssessmentYear> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Scan page texts for history rows. Later rows for a year replace earlier ones.
pub fn scan_history(pages: &[&str]) -> AssessmentHistory {
    let mut history = AssessmentHistory::new();
    for page in pages {
        for line in page.lines() {
            if let Some(row) = parse_row(line) {
                history.upsert(row);
            }
        }
    }
    history
}

fn parse_row(line: &str) -> Option<AssessmentYear> {
    let line = line
        .trim_start()
        .trim_start_matches(['|', '(', '['])
        .trim_start();
    let mut tokens = line.split_whitespace();

    let year: u16 = tokens.next().filter(|t| t.len() == 4)?.parse().ok()?;
    if !(FIRST_YEAR..=LAST_YEAR).contains(&year) {
        return None;
    }

    let mut values = Vec::new();
    let mut capped = false;
    let mut all_year_like = true;
    for token in tokens {
        // Trailing capped/uncapped marker on the taxable column
        let (digits, marker) = match token.char_indices().last() {
            Some((idx, 'c' | 'C' | 's' | 'S')) => (&token[..idx], true),
            _ => (token, false),
        };
        let Ok(value) = parse_currency(digits) else {
            break;
        };
        let year_like = digits.len() == 4
            && digits
                .parse::<u16>()
                .is_ok_and(|y| (FIRST_YEAR..=LAST_YEAR).contains(&y));
        all_year_like &= year_like;
        values.push(value);
        if marker {
            capped = true;
            break;
        }
    }

    if values.is_empty() || (all_year_like && !capped) {
        return None;
    }

    let mut row = AssessmentYear::new(year);
    let n = values.len();
    match n {
        1 if capped => row.taxable = Some(values[0]),
        1 => row.sev = Some(values[0]),
        2 | 3 => {
            row.sev = Some(values[n - 2]);
            row.taxable = Some(values[n - 1]);
        }
        _ => {
            row.land_value = Some(values[0]);
            row.building_value = Some(values[1]);
            row.sev = Some(values[n - 2]);
            row.taxable = Some(values[n - 1]);
        }
    }
    Some(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dollars(d: u64) -> Option<Currency> {
        Some(Currency::from_dollars(d))
    }

    #[test]
    fn test_full_row_with_capped_marker() {
        let row = parse_row("|2026 49,600 193,132 242,732 213,794c").unwrap();
        assert_eq!(
            row,
            AssessmentYear {
                year: 2026,
                land_value: dollars(49_600),
                building_value: dollars(193_132),
                sev: dollars(242_732),
                taxable: dollars(213_794),
            }
        );
    }

    #[test]
    fn test_two_value_row() {
        let row = parse_row("(2024 231,890 198,400S").unwrap();
        assert_eq!(row.sev, dollars(231_890));
        assert_eq!(row.taxable, dollars(198_400));
        assert_eq!(row.land_value, None);
    }

    #[test]
    fn test_single_value_row() {
        assert_eq!(parse_row("2023 120,000").unwrap().sev, dollars(120_000));
        assert_eq!(parse_row("2023 110,000C").unwrap().taxable, dollars(110_000));
    }

    #[test]
    fn test_non_rows_are_ignored() {
        assert_eq!(parse_row("2026 Est TCV 485,465"), None);
        assert_eq!(parse_row("4512 MEADOW VIEW DR"), None);
        assert_eq!(parse_row("Year Land Building Assessed Taxable"), None);
        assert_eq!(parse_row("2024 2025 2026"), None);
        assert_eq!(parse_row("1875 10,000 20,000"), None);
        assert_eq!(parse_row(""), None);
    }

    #[test]
    fn test_values_after_capped_marker_are_ignored() {
        let row = parse_row("2025 48,900 192,337 241,237 231,890c 14 Other").unwrap();
        assert_eq!(row.taxable, dollars(231_890));
        assert_eq!(row.sev, dollars(241_237));
    }

    #[test]
    fn test_duplicate_year_last_seen_wins() {
        let page1 = "2025 48,900 192,337 241,237 231,890c\n2024 45,000 180,000 225,000 220,000c";
        let page2 = "2025 50,000 195,000 245,000 235,000c";
        let history = scan_history(&[page1, page2]);

        assert_eq!(history.len(), 2);
        let years: Vec<u16> = history.iter().map(|r| r.year).collect();
        assert_eq!(years, vec![2024, 2025]);
        assert_eq!(history.get(2025).unwrap().sev, dollars(245_000));
        assert_eq!(history.latest_year(), Some(2025));
    }

    #[test]
    fn test_history_serializes_as_list() {
        let mut history = AssessmentHistory::new();
        history.upsert(AssessmentYear::new(2026));
        let json = serde_json::to_value(&history).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["year"], 2026);
        assert!(json[0]["sev"].is_null());
    }
}
