//! Strategy tables: which matchers to try, per field, in which order
//!
//! The default table is tuned to Pittsfield Charter Township record cards and
//! the misreads Tesseract produces on them. Additional label spellings can be
//! layered on from a TOML file as new failure cases turn up:
//!
//! ```toml
//! tax_year = 2026
//!
//! [[strategy]]
//! field = "area_code"
//! name = "nbhd-label"
//! labels = ["Nbhd\\.?"]
//! position = "first"
//! ```

use crate::error::{Error, Result};
use crate::extract::field::Field;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Matchers that need more than a regex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Builtin {
    /// SEV column of the history row for the tax year
    HistorySev,
    /// Taxable column of the history row for the tax year
    HistoryTaxable,
    /// Half of the card's estimated true cash value
    HalfEstimatedTcv,
    /// Subdivision name trailing the land table code
    LandTableSubdivision,
}

impl Builtin {
    /// The only field this builtin can resolve
    pub fn field(self) -> Field {
        match self {
            Builtin::HistorySev | Builtin::HalfEstimatedTcv => Field::CurrentYearSev,
            Builtin::HistoryTaxable => Field::CurrentYearTaxable,
            Builtin::LandTableSubdivision => Field::Subdivision,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    /// Label variants (regex fragments, case-insensitive, no capture groups)
    /// followed on the same line by a value of the field's shape
    Labels(Vec<String>),
    /// Full regex; capture group 1 is the value
    Pattern(String),
    Builtin(Builtin),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Strategy {
    pub name: String,
    pub matcher: Matcher,
}

impl Strategy {
    pub fn labels(name: &str, labels: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            matcher: Matcher::Labels(labels.iter().map(|l| l.to_string()).collect()),
        }
    }

    pub fn pattern(name: &str, pattern: &str) -> Self {
        Self {
            name: name.to_string(),
            matcher: Matcher::Pattern(pattern.to_string()),
        }
    }

    pub fn builtin(name: &str, builtin: Builtin) -> Self {
        Self {
            name: name.to_string(),
            matcher: Matcher::Builtin(builtin),
        }
    }
}

/// Where an overlay strategy goes in its field's list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    First,
    #[default]
    Last,
}

/// One strategy as written in a profile overlay file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverlayStrategy {
    pub field: Field,
    pub name: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub builtin: Option<Builtin>,
    #[serde(default)]
    pub position: Position,
}

impl OverlayStrategy {
    fn into_strategy(self) -> Result<(Field, Position, Strategy)> {
        let matcher = match (self.labels.is_empty(), self.pattern, self.builtin) {
            (false, None, None) => Matcher::Labels(self.labels),
            (true, Some(pattern), None) => Matcher::Pattern(pattern),
            (true, None, Some(builtin)) => Matcher::Builtin(builtin),
            _ => {
                return Err(Error::InvalidProfile {
                    reason: format!(
                        "strategy {:?} must set exactly one of labels, pattern or builtin",
                        self.name
                    ),
                })
            }
        };
        Ok((
            self.field,
            self.position,
            Strategy {
                name: self.name,
                matcher,
            },
        ))
    }
}

/// Overlay file contents
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileOverlay {
    #[serde(default)]
    pub tax_year: Option<u16>,
    #[serde(default, rename = "strategy")]
    pub strategies: Vec<OverlayStrategy>,
}

/// Ordered extraction strategies per field, plus the tax year treated as current
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionProfile {
    /// Year whose history row supplies current values. `None` means the year
    /// printed on the card's `YYYY Est TCV` line.
    pub tax_year: Option<u16>,
    strategies: BTreeMap<Field, Vec<Strategy>>,
}

impl Default for ExtractionProfile {
    fn default() -> Self {
        Self::pittsfield()
    }
}

const STYLES: &str = "TWO|ONE|TRI|BI|SPLIT|RANCH|CAPE|COLONIAL|BUNGALOW";

impl ExtractionProfile {
    /// A profile with no strategies at all
    pub fn empty() -> Self {
        Self {
            tax_year: None,
            strategies: BTreeMap::new(),
        }
    }

    /// Label spellings observed on Pittsfield Charter Township record cards
    pub fn pittsfield() -> Self {
        let mut profile = Self::empty();

        profile.append(
            Field::ParcelId,
            Strategy::labels("parcel-number-label", &[r"Parcel\s*(?:Number|No\.?|#|ID)"]),
        );
        profile.append(
            Field::ParcelId,
            Strategy::pattern("township-parcel-format", r"\b([A-Z]-\d{2}-\d{2}-\d{3}-\d{3})\b"),
        );

        profile.append(
            Field::Address,
            Strategy::pattern(
                "property-address-label",
                r"(?i:Property\s+Address)[ \t]*:?\s*(\d{2,5}[ \t]+[A-Z][A-Z \t]*?[ \t](?:DR|LN|CT|RD|AVE|WAY|BLVD|CIR|ST|PL|TRL))\b",
            ),
        );
        profile.append(
            Field::Address,
            Strategy::pattern(
                "street-suffix",
                r"\b(\d{3,5}[ \t]+[A-Z][A-Z \t]*?[ \t](?:DR|LN|CT|RD|AVE|WAY|BLVD|CIR|ST|PL|TRL))\b",
            ),
        );

        profile.append(
            Field::AreaCode,
            Strategy::labels(
                "area-code-label",
                &[
                    r"(?:ECF\s+)?Area\s*Code",
                    r"ECF\s*Area",
                    r"ECF\s*Neighborhood",
                    r"Neighborhood\s*Code",
                ],
            ),
        );
        profile.append(
            Field::AreaCode,
            Strategy::pattern(
                "land-table-code",
                r"(?i:Land\s+Table)[ \t]+([A-Za-z0-9][A-Za-z0-9\-]{0,9})\.",
            ),
        );

        profile.append(
            Field::Subdivision,
            Strategy::builtin("land-table-subdivision", Builtin::LandTableSubdivision),
        );
        profile.append(
            Field::Subdivision,
            Strategy::labels("subdivision-label", &[r"Subdivision"]),
        );

        profile.append(
            Field::PropertyClass,
            Strategy::pattern(
                "property-class-label",
                r"(?i:Prop(?:erty)?\.?\s*Class(?:ification)?)[ \t]*[:#]?[ \t]*(\d{3})\b",
            ),
        );
        profile.append(
            Field::PropertyClass,
            Strategy::pattern(
                "residential-class-code",
                r"\b(4\d{2})[ \t]*[-.]?[ \t]*(?i:RESIDENTIAL)",
            ),
        );

        profile.append(
            Field::TrueCashValue,
            Strategy::pattern(
                "year-est-tcv",
                r"\b(?:19|20)\d{2}[ \t]+(?i:Est\.?[ \t]*TCV)[ \t]*:?[ \t]*([$\d]\S*)",
            ),
        );
        profile.append(
            Field::TrueCashValue,
            Strategy::labels(
                "true-cash-value-label",
                &[r"True\s+Cash\s+Value", r"Est\.?\s*TCV"],
            ),
        );

        profile.append(
            Field::LandValue,
            Strategy::labels("total-est-land-value", &[r"Total\s+Est\.?\s+Land\s+Value"]),
        );
        profile.append(
            Field::LandValue,
            Strategy::labels("land-value-label", &[r"Land\s+Value"]),
        );

        profile.append(
            Field::CurrentYearSev,
            Strategy::labels(
                "sev-label",
                &[r"S\.?\s*E\.?\s*V\b\.?", r"State\s+Equalized\s+Value"],
            ),
        );
        profile.append(
            Field::CurrentYearSev,
            Strategy::labels("assessed-value-label", &[r"Assessed\s+Value"]),
        );
        profile.append(
            Field::CurrentYearSev,
            Strategy::builtin("history-current-year", Builtin::HistorySev),
        );
        profile.append(
            Field::CurrentYearSev,
            Strategy::builtin("half-estimated-tcv", Builtin::HalfEstimatedTcv),
        );

        profile.append(
            Field::CurrentYearTaxable,
            Strategy::labels(
                "taxable-value-label",
                &[r"Taxable\s+Value", r"Taxable\s+Val\b\.?", r"Taxable"],
            ),
        );
        profile.append(
            Field::CurrentYearTaxable,
            Strategy::builtin("history-current-year", Builtin::HistoryTaxable),
        );

        profile.append(
            Field::BuildingStyle,
            Strategy::pattern(
                "building-style-label",
                &format!(r"(?i:Building\s+Style)[ \t]*:?\s*((?:{})[\w\-]*)", STYLES),
            ),
        );
        profile.append(
            Field::BuildingStyle,
            Strategy::pattern(
                "single-family-style",
                &format!(r"(?i:Single\s+Family)[ \t]+((?i:{})[\w\-]*)", STYLES),
            ),
        );

        profile.append(
            Field::Condition,
            Strategy::labels("condition-label", &[r"Condition"]),
        );

        profile.append(
            Field::YearBuilt,
            Strategy::pattern("blt-year", r"\bB[IlL1]t[ \t]+(\d{4})\b"),
        );
        profile.append(
            Field::YearBuilt,
            Strategy::pattern("actual-year", r"\b(\d{4})[ \t]*Actua"),
        );
        profile.append(
            Field::YearBuilt,
            Strategy::pattern("yr-built", r"(?i:Yr\.?[ \t]*Built)[^\n]*?\b(\d{4})\b"),
        );

        profile.append(
            Field::EffectiveAge,
            Strategy::labels("effective-age-label", &[r"Effec(?:tive|\.)?\s*Age"]),
        );

        profile.append(
            Field::FloorArea,
            Strategy::labels("floor-area-label", &[r"Floor\s+Area"]),
        );
        profile.append(
            Field::GroundArea,
            Strategy::pattern(
                "ground-area-sf",
                r"(?i:Ground\s+Area)[ \t]*[=:]?[ \t]*(\d[\d,]*)[ \t]*(?i:S\.?F)",
            ),
        );
        profile.append(
            Field::BasementArea,
            Strategy::pattern(
                "basement-sf",
                r"(?i:Basement)[ \t]*:?[ \t]*(\d[\d,]*)[ \t]*(?i:S\.?F)",
            ),
        );

        profile.append(
            Field::Ecf,
            Strategy::pattern("ecf-multiplier", r"(?:\bE\.?C\.?F\.?|\bX)[ \t]+(0\.\d{2,4})\b"),
        );

        profile.append(
            Field::TotalBaseNew,
            Strategy::labels("total-base-new-label", &[r"Total\s+Base\s+New"]),
        );
        profile.append(
            Field::TotalDepreciatedCost,
            Strategy::labels("total-depr-cost-label", &[r"Total\s+Depr(?:eciated|\.)?\s+Cost"]),
        );
        profile.append(
            Field::CostApproachTcv,
            Strategy::labels("estimated-tcv-label", &[r"Estimated\s+T\.?\s*C\.?\s*V\b\.?"]),
        );

        profile
    }

    /// Default table with an overlay parsed from TOML text
    pub fn with_overlay_toml(toml_text: &str) -> Result<Self> {
        let overlay: ProfileOverlay = toml::from_str(toml_text)?;
        let mut profile = Self::pittsfield();
        profile.apply_overlay(overlay)?;
        Ok(profile)
    }

    /// Default table with an overlay read from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::with_overlay_toml(&text)
    }

    pub fn apply_overlay(&mut self, overlay: ProfileOverlay) -> Result<()> {
        if overlay.tax_year.is_some() {
            self.tax_year = overlay.tax_year;
        }
        for entry in overlay.strategies {
            let (field, position, strategy) = entry.into_strategy()?;
            match position {
                Position::First => self.prepend(field, strategy),
                Position::Last => self.append(field, strategy),
            }
        }
        Ok(())
    }

    pub fn strategies(&self, field: Field) -> &[Strategy] {
        self.strategies.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn append(&mut self, field: Field, strategy: Strategy) {
        self.strategies.entry(field).or_default().push(strategy);
    }

    pub fn prepend(&mut self, field: Field, strategy: Strategy) {
        self.strategies.entry(field).or_default().insert(0, strategy);
    }

    /// Drop a strategy by name. Returns whether one was removed.
    pub fn remove(&mut self, field: Field, name: &str) -> bool {
        match self.strategies.get_mut(&field) {
            Some(list) => {
                let before = list.len();
                list.retain(|s| s.name != name);
                list.len() != before
            }
            None => false,
        }
    }
}
