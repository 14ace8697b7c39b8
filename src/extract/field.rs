//! Target fields and the value shapes recognized for them

use crate::extract::currency::{parse_currency, Currency};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Every field the extractor tries to resolve.
///
/// Declaration order is resolution order: fields consulted by builtin
/// strategies (the estimated TCV) come before the fields that use them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    ParcelId,
    Address,
    AreaCode,
    Subdivision,
    PropertyClass,
    TrueCashValue,
    LandValue,
    CurrentYearSev,
    CurrentYearTaxable,
    BuildingStyle,
    Condition,
    YearBuilt,
    EffectiveAge,
    FloorArea,
    GroundArea,
    BasementArea,
    Ecf,
    TotalBaseNew,
    TotalDepreciatedCost,
    CostApproachTcv,
}

impl Field {
    pub const ALL: [Field; 20] = [
        Field::ParcelId,
        Field::Address,
        Field::AreaCode,
        Field::Subdivision,
        Field::PropertyClass,
        Field::TrueCashValue,
        Field::LandValue,
        Field::CurrentYearSev,
        Field::CurrentYearTaxable,
        Field::BuildingStyle,
        Field::Condition,
        Field::YearBuilt,
        Field::EffectiveAge,
        Field::FloorArea,
        Field::GroundArea,
        Field::BasementArea,
        Field::Ecf,
        Field::TotalBaseNew,
        Field::TotalDepreciatedCost,
        Field::CostApproachTcv,
    ];

    /// Fields the analysis layer cannot work without
    pub const MANDATORY: [Field; 2] = [Field::AreaCode, Field::CurrentYearSev];

    pub fn as_str(self) -> &'static str {
        match self {
            Field::ParcelId => "parcel_id",
            Field::Address => "address",
            Field::AreaCode => "area_code",
            Field::Subdivision => "subdivision",
            Field::PropertyClass => "property_class",
            Field::TrueCashValue => "true_cash_value",
            Field::LandValue => "land_value",
            Field::CurrentYearSev => "current_year_sev",
            Field::CurrentYearTaxable => "current_year_taxable",
            Field::BuildingStyle => "building_style",
            Field::Condition => "condition",
            Field::YearBuilt => "year_built",
            Field::EffectiveAge => "effective_age",
            Field::FloorArea => "floor_area",
            Field::GroundArea => "ground_area",
            Field::BasementArea => "basement_area",
            Field::Ecf => "ecf",
            Field::TotalBaseNew => "total_base_new",
            Field::TotalDepreciatedCost => "total_depreciated_cost",
            Field::CostApproachTcv => "cost_approach_tcv",
        }
    }

    pub fn is_mandatory(self) -> bool {
        Self::MANDATORY.contains(&self)
    }

    pub fn shape(self) -> ValueShape {
        match self {
            Field::ParcelId => ValueShape::ParcelId,
            Field::Address | Field::Subdivision => ValueShape::Text,
            Field::AreaCode | Field::PropertyClass => ValueShape::Code,
            Field::TrueCashValue
            | Field::LandValue
            | Field::CurrentYearSev
            | Field::CurrentYearTaxable
            | Field::TotalBaseNew
            | Field::TotalDepreciatedCost
            | Field::CostApproachTcv => ValueShape::Currency,
            Field::BuildingStyle | Field::Condition => ValueShape::Word,
            Field::YearBuilt => ValueShape::Year,
            Field::EffectiveAge
            | Field::FloorArea
            | Field::GroundArea
            | Field::BasementArea => ValueShape::Integer,
            Field::Ecf => ValueShape::Factor,
        }
    }

    /// Field-specific casing applied after a value parses
    pub fn normalize(self, value: FieldValue) -> FieldValue {
        match (self, value) {
            (Field::BuildingStyle, FieldValue::Text(s)) => {
                FieldValue::Text(s.to_uppercase())
            }
            (Field::Condition, FieldValue::Text(s)) => {
                let lower = s.to_lowercase();
                let mut chars = lower.chars();
                let capitalized = match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                };
                FieldValue::Text(capitalized)
            }
            (_, value) => value,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Money(Currency),
    Integer(u32),
    Year(u16),
    Factor(f64),
}

/// The syntactic shape of a field's value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    Currency,
    Integer,
    Year,
    Factor,
    Code,
    ParcelId,
    Word,
    Text,
}

impl ValueShape {
    /// Regex fragment, with exactly one capture group, matching a value of this
    /// shape on the same line as its label
    pub fn capture(self) -> &'static str {
        match self {
            ValueShape::Currency => r"([$\d\-]\S*)",
            ValueShape::Integer => r"(\d[\d,]*)",
            ValueShape::Year => r"(\d{4})\b",
            ValueShape::Factor => r"(\d*\.\d+|\d+)\b",
            ValueShape::Code => r"([A-Za-z0-9][A-Za-z0-9\-]*)",
            ValueShape::ParcelId => r"([A-Za-z]{0,2}[ \t]*-?[ \t]*\d[\d \t\-]*\d)",
            ValueShape::Word => r"([A-Za-z][A-Za-z\-]*)",
            ValueShape::Text => r"(\S[^\n]*?)[ \t]*$",
        }
    }

    /// Parse a captured token. The error is a short reason suitable for warnings.
    pub fn parse(self, raw: &str) -> Result<FieldValue, String> {
        let raw = raw.trim();
        match self {
            ValueShape::Currency => parse_currency(raw)
                .map(FieldValue::Money)
                .map_err(|e| e.to_string()),
            ValueShape::Integer => raw
                .replace(',', "")
                .parse::<u32>()
                .map(FieldValue::Integer)
                .map_err(|_| format!("not a whole number: {:?}", raw)),
            ValueShape::Year => match raw.parse::<u16>() {
                Ok(year) if (1800..=2100).contains(&year) => Ok(FieldValue::Year(year)),
                _ => Err(format!("not a plausible year: {:?}", raw)),
            },
            ValueShape::Factor => match raw.parse::<f64>() {
                Ok(f) if f.is_finite() && (0.1..=5.0).contains(&f) => Ok(FieldValue::Factor(f)),
                _ => Err(format!("not a plausible factor: {:?}", raw)),
            },
            ValueShape::Code => {
                if raw.is_empty() || raw.len() > 10 {
                    Err(format!("not a code: {:?}", raw))
                } else {
                    Ok(FieldValue::Text(raw.to_string()))
                }
            }
            ValueShape::ParcelId => {
                let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
                if compact.chars().filter(|c| c.is_ascii_digit()).count() < 4 {
                    Err(format!("too few digits for a parcel number: {:?}", raw))
                } else {
                    Ok(FieldValue::Text(compact))
                }
            }
            ValueShape::Word => {
                if raw.is_empty() {
                    Err("empty word".to_string())
                } else {
                    Ok(FieldValue::Text(raw.to_string()))
                }
            }
            ValueShape::Text => {
                let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
                if collapsed.is_empty() {
                    Err("empty text".to_string())
                } else {
                    Ok(FieldValue::Text(collapsed))
                }
            }
        }
    }
}
