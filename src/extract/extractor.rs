//! Strategy-ordered field extraction over a recognized transcript

use crate::error::{Error, Result};
use crate::extract::field::{Field, FieldValue};
use crate::extract::history::scan_history;
use crate::extract::profile::{Builtin, ExtractionProfile, Matcher, Strategy};
use crate::ocr::PAGE_BREAK;
use crate::record::{PropertyData, RecordSource};
use crate::resolve::Degradation;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

/// Separators tolerated between a label and its value
const LABEL_SEPARATOR: &str = r"[ \t]*[:=#.]?[ \t]*";

/// How a field ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FieldOutcome {
    Resolved { strategy: String },
    Unresolved { attempted: Vec<String> },
}

/// Result of running every strategy over one transcript
#[derive(Debug, Clone, PartialEq)]
pub struct FieldExtraction {
    pub record: PropertyData,
    pub outcomes: BTreeMap<Field, FieldOutcome>,
    pub warnings: Vec<Degradation>,
}

enum CompiledMatcher {
    Regex(Regex),
    Builtin(Builtin),
}

struct CompiledStrategy {
    name: String,
    matcher: CompiledMatcher,
}

/// Compiled form of an [`ExtractionProfile`]. Cheap to share across uploads.
pub struct FieldExtractor {
    tax_year: Option<u16>,
    strategies: Vec<(Field, Vec<CompiledStrategy>)>,
    digit_groups: Regex,
    dollar_gap: Regex,
    land_table: Regex,
    tcv_year: Regex,
}

impl std::fmt::Debug for FieldExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldExtractor")
            .field("tax_year", &self.tax_year)
            .field("fields", &self.strategies.len())
            .finish()
    }
}

fn invalid_profile(reason: String) -> Error {
    Error::InvalidProfile { reason }
}

fn compile_regex(field: Field, strategy: &str, pattern: &str) -> Result<Regex> {
    let regex = Regex::new(pattern).map_err(|e| {
        invalid_profile(format!("{}/{}: {}", field, strategy, e))
    })?;
    if regex.captures_len() != 2 {
        return Err(invalid_profile(format!(
            "{}/{}: expected exactly one capture group, found {}",
            field,
            strategy,
            regex.captures_len() - 1
        )));
    }
    Ok(regex)
}

fn compile_strategy(field: Field, strategy: &Strategy) -> Result<CompiledStrategy> {
    let matcher = match &strategy.matcher {
        Matcher::Labels(labels) => {
            if labels.is_empty() {
                return Err(invalid_profile(format!(
                    "{}/{}: no labels given",
                    field, strategy.name
                )));
            }
            let pattern = format!(
                r"(?m)(?i:\b(?:{})){}{}",
                labels.join("|"),
                LABEL_SEPARATOR,
                field.shape().capture()
            );
            CompiledMatcher::Regex(compile_regex(field, &strategy.name, &pattern)?)
        }
        Matcher::Pattern(pattern) => CompiledMatcher::Regex(compile_regex(
            field,
            &strategy.name,
            &format!("(?m){}", pattern),
        )?),
        Matcher::Builtin(builtin) => {
            if builtin.field() != field {
                return Err(invalid_profile(format!(
                    "{}/{}: builtin {:?} only applies to {}",
                    field,
                    strategy.name,
                    builtin,
                    builtin.field()
                )));
            }
            CompiledMatcher::Builtin(*builtin)
        }
    };
    Ok(CompiledStrategy {
        name: strategy.name.clone(),
        matcher,
    })
}

fn fixed_regex(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| invalid_profile(e.to_string()))
}

impl FieldExtractor {
    pub fn new(profile: &ExtractionProfile) -> Result<Self> {
        let mut strategies = Vec::with_capacity(Field::ALL.len());
        for field in Field::ALL {
            let compiled = profile
                .strategies(field)
                .iter()
                .map(|s| compile_strategy(field, s))
                .collect::<Result<Vec<_>>>()?;
            strategies.push((field, compiled));
        }

        Ok(Self {
            tax_year: profile.tax_year,
            strategies,
            digit_groups: fixed_regex(r"(\d)[ \t]*,[ \t]*(\d)")?,
            dollar_gap: fixed_regex(r"\$[ \t]+(\d)")?,
            land_table: fixed_regex(
                r"(?m)(?i:Land\s+Table)[ \t]+[A-Za-z0-9][A-Za-z0-9\-]{0,9}\.([^\n]*?)[ \t]*$",
            )?,
            tcv_year: fixed_regex(r"\b((?:19|20)\d{2})[ \t]+(?i:Est\.?[ \t]*TCV)\b")?,
        })
    }

    /// Undo OCR spacing inside numbers: `192 , 337` becomes `192,337`, `$ 145,200` becomes `$145,200`
    pub fn normalize_text(&self, text: &str) -> String {
        let mut current = text.to_string();
        // Overlapping groups like "1 , 234 , 567" need a second pass
        loop {
            let next = self.digit_groups.replace_all(&current, "$1,$2");
            if next == current {
                break;
            }
            current = next.into_owned();
        }
        self.dollar_gap
            .replace_all(&current, |caps: &regex::Captures| format!("${}", &caps[1]))
            .into_owned()
    }

    /// Run every field's strategies over a transcript text
    pub fn extract(&self, text: &str) -> FieldExtraction {
        let normalized = self.normalize_text(text);
        let pages: Vec<&str> = normalized.split(PAGE_BREAK).collect();

        let mut record = PropertyData::new(RecordSource::OcrExtracted);
        record.history = scan_history(&pages);
        record.tax_year = self.tax_year.or_else(|| self.printed_tax_year(&pages));

        let mut outcomes = BTreeMap::new();
        let mut warnings = Vec::new();

        for (field, strategies) in &self.strategies {
            let mut attempted = Vec::new();
            let mut resolved = None;

            for strategy in strategies {
                attempted.push(strategy.name.clone());
                let value = match &strategy.matcher {
                    CompiledMatcher::Regex(regex) => {
                        first_parsed(*field, &strategy.name, regex, &pages, &mut warnings)
                    }
                    CompiledMatcher::Builtin(builtin) => {
                        self.run_builtin(*builtin, &record, &pages)
                    }
                };
                tracing::trace!(
                    field = %field,
                    strategy = %strategy.name,
                    matched = value.is_some(),
                    "strategy attempted"
                );
                if let Some(value) = value {
                    record.assign(*field, field.normalize(value));
                    resolved = Some(strategy.name.clone());
                    break;
                }
            }

            let outcome = match resolved {
                Some(strategy) => FieldOutcome::Resolved { strategy },
                None => FieldOutcome::Unresolved { attempted },
            };
            outcomes.insert(*field, outcome);
        }

        tracing::debug!(
            resolved = outcomes
                .values()
                .filter(|o| matches!(o, FieldOutcome::Resolved { .. }))
                .count(),
            history_rows = record.history.len(),
            warnings = warnings.len(),
            "field extraction finished"
        );

        FieldExtraction {
            record,
            outcomes,
            warnings,
        }
    }

    /// Year printed on the card's `YYYY Est TCV` line. The history table never sets the tax year.
    fn printed_tax_year(&self, pages: &[&str]) -> Option<u16> {
        pages.iter().find_map(|page| {
            self.tcv_year
                .captures_iter(page)
                .filter_map(|caps| caps[1].parse::<u16>().ok())
                .find(|year| (1990..=2099).contains(year))
        })
    }

    fn run_builtin(&self, builtin: Builtin, record: &PropertyData, pages: &[&str]) -> Option<FieldValue> {
        match builtin {
            Builtin::HistorySev => record
                .tax_year
                .and_then(|year| record.history.get(year))
                .and_then(|row| row.sev)
                .map(FieldValue::Money),
            Builtin::HistoryTaxable => record
                .tax_year
                .and_then(|year| record.history.get(year))
                .and_then(|row| row.taxable)
                .map(FieldValue::Money),
            Builtin::HalfEstimatedTcv => record
                .true_cash_value
                .map(|tcv| FieldValue::Money(tcv.halved())),
            Builtin::LandTableSubdivision => pages.iter().find_map(|page| {
                self.land_table
                    .captures_iter(page)
                    .find_map(|caps| caps.get(1).and_then(|m| subdivision_name(m.as_str())))
                    .map(FieldValue::Text)
            }),
        }
    }
}

/// First match of `regex`, in document order, whose token parses for `field`
fn first_parsed(
    field: Field,
    strategy: &str,
    regex: &Regex,
    pages: &[&str],
    warnings: &mut Vec<Degradation>,
) -> Option<FieldValue> {
    for page in pages {
        for caps in regex.captures_iter(page) {
            let Some(token) = caps.get(1) else {
                continue;
            };
            match field.shape().parse(token.as_str()) {
                Ok(value) => return Some(value),
                Err(reason) => {
                    tracing::trace!(field = %field, strategy, token = token.as_str(), "value rejected");
                    warnings.push(Degradation::MalformedValue {
                        field,
                        strategy: strategy.to_string(),
                        token: token.as_str().to_string(),
                        reason,
                    });
                }
            }
        }
    }
    None
}

/// Turn the text after a land table code into a subdivision name.
/// `AR4-MEADOWS OF ARBOR RIDGE` becomes `MEADOWS OF ARBOR RIDGE`.
fn subdivision_name(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let without_code = match raw.split_once('-') {
        Some((code, rest))
            if !code.is_empty()
                && code
                    .chars()
                    .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()) =>
        {
            rest
        }
        _ => raw,
    };
    let name = without_code
        .replace(['-', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    (!name.is_empty()).then_some(name)
}
