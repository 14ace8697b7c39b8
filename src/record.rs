//! The property record and user-entered corrections

use crate::error::{Error, Result};
use crate::extract::{AssessmentHistory, AssessmentYear, Currency, Field, FieldValue, ValueShape};
use rmcp::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Where a record's values came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RecordSource {
    OcrExtracted,
    Manual,
    OcrWithManualOverrides,
}

/// Structure details from the card's second page
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BuildingDetails {
    pub style: Option<String>,
    pub condition: Option<String>,
    pub year_built: Option<u16>,
    pub effective_age: Option<u32>,
    /// Square feet
    pub floor_area: Option<u32>,
    pub ground_area: Option<u32>,
    pub basement_area: Option<u32>,
    /// Economic condition factor applied to the cost approach
    pub ecf: Option<f64>,
}

/// Cost approach totals printed under the building sketch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CostApproach {
    pub total_base_new: Option<Currency>,
    pub total_depreciated_cost: Option<Currency>,
    /// Depreciated cost after the ECF ("Estimated T.C.V.")
    pub estimated_tcv: Option<Currency>,
}

/// Values read from one Record Card. Anything not found stays `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyData {
    pub parcel_id: Option<String>,
    pub address: Option<String>,
    pub area_code: Option<String>,
    pub subdivision: Option<String>,
    pub property_class: Option<String>,
    /// Year the current-year values refer to
    pub tax_year: Option<u16>,
    pub current_year_sev: Option<Currency>,
    pub current_year_taxable: Option<Currency>,
    pub true_cash_value: Option<Currency>,
    pub land_value: Option<Currency>,
    pub building: BuildingDetails,
    pub cost_approach: CostApproach,
    pub history: AssessmentHistory,
    pub source: RecordSource,
}

impl PropertyData {
    pub fn new(source: RecordSource) -> Self {
        Self {
            parcel_id: None,
            address: None,
            area_code: None,
            subdivision: None,
            property_class: None,
            tax_year: None,
            current_year_sev: None,
            current_year_taxable: None,
            true_cash_value: None,
            land_value: None,
            building: BuildingDetails::default(),
            cost_approach: CostApproach::default(),
            history: AssessmentHistory::new(),
            source,
        }
    }

    /// The stored value of a field, if resolved
    pub fn value(&self, field: Field) -> Option<FieldValue> {
        let text = |s: &Option<String>| s.clone().map(FieldValue::Text);
        let money = |c: Option<Currency>| c.map(FieldValue::Money);
        let integer = |n: Option<u32>| n.map(FieldValue::Integer);
        match field {
            Field::ParcelId => text(&self.parcel_id),
            Field::Address => text(&self.address),
            Field::AreaCode => text(&self.area_code),
            Field::Subdivision => text(&self.subdivision),
            Field::PropertyClass => text(&self.property_class),
            Field::TrueCashValue => money(self.true_cash_value),
            Field::LandValue => money(self.land_value),
            Field::CurrentYearSev => money(self.current_year_sev),
            Field::CurrentYearTaxable => money(self.current_year_taxable),
            Field::BuildingStyle => text(&self.building.style),
            Field::Condition => text(&self.building.condition),
            Field::YearBuilt => self.building.year_built.map(FieldValue::Year),
            Field::EffectiveAge => integer(self.building.effective_age),
            Field::FloorArea => integer(self.building.floor_area),
            Field::GroundArea => integer(self.building.ground_area),
            Field::BasementArea => integer(self.building.basement_area),
            Field::Ecf => self.building.ecf.map(FieldValue::Factor),
            Field::TotalBaseNew => money(self.cost_approach.total_base_new),
            Field::TotalDepreciatedCost => money(self.cost_approach.total_depreciated_cost),
            Field::CostApproachTcv => money(self.cost_approach.estimated_tcv),
        }
    }

    pub fn is_resolved(&self, field: Field) -> bool {
        self.value(field).is_some()
    }

    /// Store a parsed value. Returns false when the value's kind does not fit the field.
    pub fn assign(&mut self, field: Field, value: FieldValue) -> bool {
        match (field, value) {
            (Field::ParcelId, FieldValue::Text(s)) => self.parcel_id = Some(s),
            (Field::Address, FieldValue::Text(s)) => self.address = Some(s),
            (Field::AreaCode, FieldValue::Text(s)) => self.area_code = Some(s),
            (Field::Subdivision, FieldValue::Text(s)) => self.subdivision = Some(s),
            (Field::PropertyClass, FieldValue::Text(s)) => self.property_class = Some(s),
            (Field::TrueCashValue, FieldValue::Money(c)) => self.true_cash_value = Some(c),
            (Field::LandValue, FieldValue::Money(c)) => self.land_value = Some(c),
            (Field::CurrentYearSev, FieldValue::Money(c)) => self.current_year_sev = Some(c),
            (Field::CurrentYearTaxable, FieldValue::Money(c)) => {
                self.current_year_taxable = Some(c)
            }
            (Field::BuildingStyle, FieldValue::Text(s)) => self.building.style = Some(s),
            (Field::Condition, FieldValue::Text(s)) => self.building.condition = Some(s),
            (Field::YearBuilt, FieldValue::Year(y)) => self.building.year_built = Some(y),
            (Field::EffectiveAge, FieldValue::Integer(n)) => self.building.effective_age = Some(n),
            (Field::FloorArea, FieldValue::Integer(n)) => self.building.floor_area = Some(n),
            (Field::GroundArea, FieldValue::Integer(n)) => self.building.ground_area = Some(n),
            (Field::BasementArea, FieldValue::Integer(n)) => {
                self.building.basement_area = Some(n)
            }
            (Field::Ecf, FieldValue::Factor(f)) => self.building.ecf = Some(f),
            (Field::TotalBaseNew, FieldValue::Money(c)) => {
                self.cost_approach.total_base_new = Some(c)
            }
            (Field::TotalDepreciatedCost, FieldValue::Money(c)) => {
                self.cost_approach.total_depreciated_cost = Some(c)
            }
            (Field::CostApproachTcv, FieldValue::Money(c)) => {
                self.cost_approach.estimated_tcv = Some(c)
            }
            _ => return false,
        }
        true
    }

    /// Merge user-entered values over this record.
    ///
    /// Every value is validated before anything is written, so a rejected
    /// entry leaves the record untouched. Returns whether anything changed.
    pub fn apply_manual(&mut self, entry: &ManualEntry) -> Result<bool> {
        let validated = entry.validate()?;
        if validated.is_empty() {
            return Ok(false);
        }

        for (field, value) in validated.values {
            self.assign(field, value);
        }
        if let Some(year) = validated.tax_year {
            self.tax_year = Some(year);
        }
        for row in validated.history {
            self.history.upsert(row);
        }
        if self.source == RecordSource::OcrExtracted {
            self.source = RecordSource::OcrWithManualOverrides;
        }
        Ok(true)
    }

    /// Build a record purely from user input
    pub fn from_manual(entry: &ManualEntry) -> Result<Self> {
        let mut record = Self::new(RecordSource::Manual);
        record.apply_manual(entry)?;
        Ok(record)
    }
}

/// Values typed in by the user when OCR could not read the card.
/// Blank strings are treated as not provided.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ManualEntry {
    #[serde(default)]
    pub parcel_id: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    /// ECF area code exactly as printed on the card, e.g. "AR-4"
    #[serde(default)]
    pub area_code: Option<String>,
    #[serde(default)]
    pub subdivision: Option<String>,
    #[serde(default)]
    pub property_class: Option<String>,
    #[serde(default)]
    pub tax_year: Option<u16>,
    /// Current year assessed value (SEV), e.g. "$145,200"
    #[serde(default)]
    pub current_year_sev: Option<String>,
    #[serde(default)]
    pub current_year_taxable: Option<String>,
    #[serde(default)]
    pub true_cash_value: Option<String>,
    #[serde(default)]
    pub land_value: Option<String>,
    #[serde(default)]
    pub building_style: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub year_built: Option<u16>,
    #[serde(default)]
    pub effective_age: Option<u32>,
    #[serde(default)]
    pub floor_area: Option<u32>,
    #[serde(default)]
    pub ground_area: Option<u32>,
    #[serde(default)]
    pub basement_area: Option<u32>,
    #[serde(default)]
    pub ecf: Option<f64>,
    #[serde(default)]
    pub total_base_new: Option<String>,
    #[serde(default)]
    pub total_depreciated_cost: Option<String>,
    /// Cost approach "Estimated T.C.V.", e.g. "195,512"
    #[serde(default)]
    pub cost_approach_tcv: Option<String>,
    #[serde(default)]
    pub history: Vec<ManualHistoryRow>,
}

/// One history row entered by hand
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ManualHistoryRow {
    pub year: u16,
    #[serde(default)]
    pub land_value: Option<String>,
    #[serde(default)]
    pub building_value: Option<String>,
    #[serde(default)]
    pub sev: Option<String>,
    #[serde(default)]
    pub taxable: Option<String>,
}

struct ValidatedEntry {
    values: Vec<(Field, FieldValue)>,
    tax_year: Option<u16>,
    history: Vec<AssessmentYear>,
}

impl ValidatedEntry {
    fn is_empty(&self) -> bool {
        self.values.is_empty() && self.tax_year.is_none() && self.history.is_empty()
    }
}

fn provided(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn invalid(field: &str, reason: impl Into<String>) -> Error {
    Error::InvalidManualValue {
        field: field.to_string(),
        reason: reason.into(),
    }
}

fn manual_money(field: &str, raw: &Option<String>) -> Result<Option<Currency>> {
    match provided(raw) {
        Some(raw) => ValueShape::Currency
            .parse(raw)
            .map(|v| match v {
                FieldValue::Money(c) => Some(c),
                _ => None,
            })
            .map_err(|reason| invalid(field, reason)),
        None => Ok(None),
    }
}

impl ManualEntry {
    fn raw_values(&self) -> Vec<(Field, String)> {
        let text = [
            (Field::ParcelId, &self.parcel_id),
            (Field::Address, &self.address),
            (Field::AreaCode, &self.area_code),
            (Field::Subdivision, &self.subdivision),
            (Field::PropertyClass, &self.property_class),
            (Field::CurrentYearSev, &self.current_year_sev),
            (Field::CurrentYearTaxable, &self.current_year_taxable),
            (Field::TrueCashValue, &self.true_cash_value),
            (Field::LandValue, &self.land_value),
            (Field::BuildingStyle, &self.building_style),
            (Field::Condition, &self.condition),
            (Field::TotalBaseNew, &self.total_base_new),
            (Field::TotalDepreciatedCost, &self.total_depreciated_cost),
            (Field::CostApproachTcv, &self.cost_approach_tcv),
        ];

        let mut raw: Vec<(Field, String)> = text
            .into_iter()
            .filter_map(|(field, value)| provided(value).map(|s| (field, s.to_string())))
            .collect();
        if let Some(year) = self.year_built {
            raw.push((Field::YearBuilt, year.to_string()));
        }
        let counts = [
            (Field::EffectiveAge, self.effective_age),
            (Field::FloorArea, self.floor_area),
            (Field::GroundArea, self.ground_area),
            (Field::BasementArea, self.basement_area),
        ];
        for (field, count) in counts {
            if let Some(count) = count {
                raw.push((field, count.to_string()));
            }
        }
        if let Some(ecf) = self.ecf {
            raw.push((Field::Ecf, ecf.to_string()));
        }
        raw
    }

    fn validate(&self) -> Result<ValidatedEntry> {
        let mut values = Vec::new();
        for (field, raw) in self.raw_values() {
            let value = field
                .shape()
                .parse(&raw)
                .map_err(|reason| invalid(field.as_str(), reason))?;
            values.push((field, field.normalize(value)));
        }

        if let Some(year) = self.tax_year {
            if !(1990..=2099).contains(&year) {
                return Err(invalid("tax_year", format!("not a plausible tax year: {}", year)));
            }
        }

        let mut history = Vec::with_capacity(self.history.len());
        for row in &self.history {
            if !(1990..=2099).contains(&row.year) {
                return Err(invalid(
                    "history",
                    format!("not a plausible tax year: {}", row.year),
                ));
            }
            history.push(AssessmentYear {
                year: row.year,
                land_value: manual_money("history.land_value", &row.land_value)?,
                building_value: manual_money("history.building_value", &row.building_value)?,
                sev: manual_money("history.sev", &row.sev)?,
                taxable: manual_money("history.taxable", &row.taxable)?,
            });
        }

        Ok(ValidatedEntry {
            values,
            tax_year: self.tax_year,
            history,
        })
    }

    /// Whether the entry carries no values at all
    pub fn is_empty(&self) -> bool {
        self.raw_values().is_empty() && self.tax_year.is_none() && self.history.is_empty()
    }
}
